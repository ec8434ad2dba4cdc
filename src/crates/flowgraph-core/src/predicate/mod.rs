//! Restricted boolean expressions for `custom` conditional branches
//!
//! Expressions see exactly one variable, `value`, and can only read it: field
//! and index access, a handful of pure helper functions, comparisons and
//! boolean connectives. There is no assignment, no other name lookup and no
//! iteration, so a user-supplied branch rule cannot reach anything beyond the
//! value it is routing on.
//!
//! ```rust
//! use flowgraph_core::predicate::Predicate;
//! use serde_json::json;
//!
//! let rule = Predicate::parse("value.score >= 0.8 and 'urgent' in lower(value.tags[0])").unwrap();
//! assert!(rule.matches(&json!({"score": 0.9, "tags": ["URGENT"]})));
//! assert!(!rule.matches(&json!({"score": 0.1, "tags": ["urgent"]})));
//! ```
//!
//! Truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false, everything
//! else is true. Evaluation errors (type mismatches, missing fields, out of
//! range indexes) make [`Predicate::matches`] return `false`.
//!
//! Sources longer than [`MAX_SOURCE_LEN`] bytes or nested deeper than
//! [`MAX_DEPTH`] levels are rejected at parse time.

mod lexer;
mod parser;

use crate::state::value_to_text;
use parser::{CmpOp, Expr, Func, Parser};

pub use parser::MAX_DEPTH;

/// Longest accepted expression source, in bytes
pub const MAX_SOURCE_LEN: usize = 1024;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredicateError {
    #[error("unexpected character at offset {0}")]
    Lex(usize),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("evaluation error: {0}")]
    Eval(String),
}

/// A parsed branch expression
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, PredicateError> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(PredicateError::Parse(format!(
                "expression is longer than {} bytes",
                MAX_SOURCE_LEN
            )));
        }
        let tokens = lexer::tokenize(source).map_err(PredicateError::Lex)?;
        let expr = Parser::new(tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, value: &Value) -> Result<bool, PredicateError> {
        eval(&self.expr, value).map(|result| truthy(&result))
    }

    /// Like [`evaluate`](Self::evaluate), with errors read as "no match"
    pub fn matches(&self, value: &Value) -> bool {
        match self.evaluate(value) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(expression = %self.source, error = %e, "predicate evaluation failed");
                false
            }
        }
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Numeric view of a value: numbers, numeric strings and booleans
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn number(n: f64) -> Result<Value, PredicateError> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| PredicateError::Eval(format!("{} is not a finite number", n)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn eval(expr: &Expr, value: &Value) -> Result<Value, PredicateError> {
    match expr {
        Expr::Literal(literal) => Ok(literal.clone()),
        Expr::Value => Ok(value.clone()),
        Expr::Field(inner, name) => match eval(inner, value)? {
            Value::Object(mut map) => map
                .remove(name)
                .ok_or_else(|| PredicateError::Eval(format!("no field '{}'", name))),
            other => Err(PredicateError::Eval(format!(
                "cannot read field '{}' of {}",
                name,
                type_name(&other)
            ))),
        },
        Expr::Index(inner, index) => {
            let target = eval(inner, value)?;
            let index = eval(index, value)?;
            eval_index(target, &index)
        }
        Expr::Call(func, arg) => eval_call(*func, eval(arg, value)?),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, value)?))),
        Expr::Neg(inner) => match eval(inner, value)? {
            Value::Number(n) => number(-n.as_f64().unwrap_or(0.0)),
            other => Err(PredicateError::Eval(format!(
                "cannot negate {}",
                type_name(&other)
            ))),
        },
        Expr::And(left, right) => {
            if !truthy(&eval(left, value)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval(right, value)?)))
        }
        Expr::Or(left, right) => {
            if truthy(&eval(left, value)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval(right, value)?)))
        }
        Expr::Compare(op, left, right) => {
            let left = eval(left, value)?;
            let right = eval(right, value)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
    }
}

fn eval_index(target: Value, index: &Value) -> Result<Value, PredicateError> {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => {
            let position = resolve_position(n.as_f64(), items.len())?;
            Ok(items.into_iter().nth(position).unwrap_or(Value::Null))
        }
        (Value::String(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let position = resolve_position(n.as_f64(), chars.len())?;
            Ok(Value::String(chars[position].to_string()))
        }
        (Value::Object(mut map), Value::String(key)) => map
            .remove(key)
            .ok_or_else(|| PredicateError::Eval(format!("no key '{}'", key))),
        (target, index) => Err(PredicateError::Eval(format!(
            "cannot index {} with {}",
            type_name(&target),
            type_name(index)
        ))),
    }
}

/// Negative positions count from the end
fn resolve_position(index: Option<f64>, len: usize) -> Result<usize, PredicateError> {
    let index = index.ok_or_else(|| PredicateError::Eval("invalid index".to_string()))?;
    if index.fract() != 0.0 {
        return Err(PredicateError::Eval(format!("index {} is not an integer", index)));
    }
    let resolved = if index < 0.0 {
        len as f64 + index
    } else {
        index
    };
    if resolved < 0.0 || resolved >= len as f64 {
        return Err(PredicateError::Eval(format!("index {} out of range", index)));
    }
    Ok(resolved as usize)
}

fn eval_call(func: Func, arg: Value) -> Result<Value, PredicateError> {
    match func {
        Func::Len => match &arg {
            Value::String(s) => number(s.chars().count() as f64),
            Value::Array(items) => number(items.len() as f64),
            Value::Object(map) => number(map.len() as f64),
            other => Err(PredicateError::Eval(format!(
                "len() of {}",
                type_name(other)
            ))),
        },
        Func::Lower => match arg {
            Value::String(s) => Ok(Value::String(s.to_lowercase())),
            other => Err(PredicateError::Eval(format!(
                "lower() of {}",
                type_name(&other)
            ))),
        },
        Func::Upper => match arg {
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            other => Err(PredicateError::Eval(format!(
                "upper() of {}",
                type_name(&other)
            ))),
        },
        Func::Str => Ok(Value::String(value_to_text(&arg))),
        Func::Num => as_number(&arg)
            .ok_or_else(|| PredicateError::Eval(format!("num() of {}", type_name(&arg))))
            .and_then(number),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, PredicateError> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| {
                PredicateError::Eval(format!(
                    "cannot order {} and {}",
                    type_name(left),
                    type_name(right)
                ))
            })?;

            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::LtEq => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, PredicateError> {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => Ok(h.contains(n.as_str())),
        (Value::Array(items), needle) => Ok(items.iter().any(|item| values_equal(item, needle))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(PredicateError::Eval(format!(
            "'in' with {} on {}",
            type_name(needle),
            type_name(haystack)
        ))),
    }
}

//! Stateful engine facade
//!
//! [`FlowEngine`] pairs a [`FlowCompiler`] with the most recently built flow,
//! for hosts that validate, build and execute one flow at a time. Executing
//! before building is a [`FlowError::GraphNotBuilt`] misuse.
//!
//! ```text
//! validate ─▶ build ─▶ execute / execute_stream  (repeatable)
//! ```

use crate::compiled::{CompiledFlow, EventStream, FlowEvent, RunResult};
use crate::compiler::FlowCompiler;
use crate::definition::{FlowDefinition, RunInput};
use crate::error::{FlowError, Result};
use crate::validation::{self, ValidationReport};

#[derive(Debug, Clone)]
pub struct FlowEngine {
    compiler: FlowCompiler,
    flow: Option<CompiledFlow>,
}

impl FlowEngine {
    pub fn new(compiler: FlowCompiler) -> Self {
        Self { compiler, flow: None }
    }

    pub fn validate(&self, definition: &FlowDefinition) -> ValidationReport {
        validation::validate(definition, self.compiler.registry())
    }

    /// Compile `definition`, replacing any previously built flow
    ///
    /// On failure the previous flow is discarded as well.
    pub fn build(&mut self, definition: &FlowDefinition, user_id: Option<&str>) -> Result<&CompiledFlow> {
        self.flow = None;
        let flow = self.compiler.compile(definition, user_id)?;
        Ok(self.flow.insert(flow))
    }

    pub fn is_built(&self) -> bool {
        self.flow.is_some()
    }

    pub fn flow(&self) -> Result<&CompiledFlow> {
        self.flow.as_ref().ok_or(FlowError::GraphNotBuilt)
    }

    pub async fn execute(&self, input: RunInput) -> Result<RunResult> {
        Ok(self.flow()?.invoke(input).await)
    }

    /// Stream a run; a single terminal `error` event when nothing is built
    pub async fn execute_stream(&self, input: RunInput) -> EventStream {
        match &self.flow {
            Some(flow) => flow.stream(input).await,
            None => {
                tracing::warn!("stream requested before build");
                let event = FlowEvent::error(&FlowError::GraphNotBuilt);
                Box::pin(futures::stream::iter(vec![event]))
            }
        }
    }
}

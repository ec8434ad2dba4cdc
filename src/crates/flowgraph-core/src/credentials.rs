//! Credential context scoping for compilation
//!
//! Node factories may need a user's credentials while they create runtime
//! units. The compiler activates a credential context for the duration of one
//! compile and releases it on every exit path through [`CredentialGuard`].

use crate::error::{FlowError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// External credential capability
pub trait CredentialProvider: Send + Sync {
    fn activate(&self, context_id: &str, user_id: &str) -> Result<()>;

    /// Must not fail; called from `Drop`
    fn release(&self, context_id: &str);
}

/// Provider that grants nothing and holds nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCredentials;

impl CredentialProvider for NoopCredentials {
    fn activate(&self, _context_id: &str, _user_id: &str) -> Result<()> {
        Ok(())
    }

    fn release(&self, _context_id: &str) {}
}

/// Releases the context when dropped
pub struct CredentialGuard {
    provider: Arc<dyn CredentialProvider>,
    context_id: String,
    active: bool,
}

impl CredentialGuard {
    /// Activate `context_id` for `user_id`, or hold nothing when there is no user
    pub fn acquire(
        provider: Arc<dyn CredentialProvider>,
        context_id: impl Into<String>,
        user_id: Option<&str>,
    ) -> Result<Self> {
        let context_id = context_id.into();
        let active = match user_id {
            Some(user_id) => {
                provider.activate(&context_id, user_id)?;
                tracing::debug!(context_id = %context_id, "credential context activated");
                true
            }
            None => false,
        };
        Ok(Self {
            provider,
            context_id,
            active,
        })
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for CredentialGuard {
    fn drop(&mut self) {
        if self.active {
            self.provider.release(&self.context_id);
            tracing::debug!(context_id = %self.context_id, "credential context released");
        }
    }
}

/// Per-context credential store backed by a map of user secrets
///
/// Useful for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct InMemoryCredentialProvider {
    secrets: HashMap<String, HashMap<String, String>>,
    active: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, user_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .entry(user_id.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Secret visible to an active context
    pub fn secret(&self, context_id: &str, key: &str) -> Option<String> {
        let active = self.active.lock();
        let user_id = active.get(context_id)?;
        self.secrets.get(user_id)?.get(key).cloned()
    }

    pub fn active_contexts(&self) -> usize {
        self.active.lock().len()
    }
}

impl CredentialProvider for InMemoryCredentialProvider {
    fn activate(&self, context_id: &str, user_id: &str) -> Result<()> {
        if !self.secrets.contains_key(user_id) {
            return Err(FlowError::Credential(format!(
                "no credentials for user '{}'",
                user_id
            )));
        }
        self.active
            .lock()
            .insert(context_id.to_string(), user_id.to_string());
        Ok(())
    }

    fn release(&self, context_id: &str) {
        self.active.lock().remove(context_id);
    }
}

//! Blocking execution

use super::driver::RunContext;
use super::types::RunResult;
use super::CompiledFlow;
use crate::definition::RunInput;
use crate::state::FlowState;
use uuid::Uuid;

impl CompiledFlow {
    /// Run the flow to completion
    ///
    /// Never returns an error: failures are reported through
    /// [`RunResult::error`] with `success == false`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use flowgraph_core::{FlowCompiler, FlowDefinition, NodeRegistry, RunInput};
    /// use std::sync::Arc;
    ///
    /// # async fn example(registry: NodeRegistry, def: FlowDefinition) -> flowgraph_core::Result<()> {
    /// let compiler = FlowCompiler::new(Arc::new(registry));
    /// let flow = compiler.compile(&def, None)?;
    ///
    /// let result = flow.invoke(RunInput::new("hello")).await;
    /// println!("{} -> {}", result.session_id, result.output);
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, input), fields(session_id = tracing::field::Empty))]
    pub async fn invoke(&self, input: RunInput) -> RunResult {
        let state = self.initial_state(input);
        let session_id = state.session_id.clone();
        tracing::Span::current().record("session_id", session_id.as_str());
        tracing::info!(nodes = self.graph.node_ids().len(), "run started");

        let run = RunContext::new(
            self.graph.clone(),
            self.checkpoint_store.clone(),
            self.settings.clone(),
            None,
            session_id.clone(),
        );

        match run.run(state).await {
            Ok(final_state) => {
                let executed = run.executed();
                tracing::info!(executed = executed.len(), "run completed");
                RunResult::completed(final_state, executed)
            }
            Err(e) => {
                tracing::error!(error = %e, error_type = e.error_type(), "run failed");
                RunResult::failed(&e, session_id, run.executed())
            }
        }
    }

    /// Fresh state for a run; a session id is generated when none is given
    pub(crate) fn initial_state(&self, input: RunInput) -> FlowState {
        let session_id = input
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut state = FlowState::new(input.input, session_id);
        state.user_id = input.user_id;
        state.workflow_id = input.workflow_id;
        state.variables = input.variables;
        state
    }
}

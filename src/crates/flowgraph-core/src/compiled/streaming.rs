//! Streaming execution
//!
//! ```text
//! ┌──────────────┐   bounded channel (stream_buffer)   ┌──────────┐
//! │  run task    │ ──────────────────────────────────▶ │ consumer │
//! │ (tokio task) │            FlowEvent                └──────────┘
//! └──────────────┘
//! ```
//!
//! The run executes in a background task and blocks when the channel is
//! full. Dropping the stream aborts that task.

use super::driver::RunContext;
use super::types::{EventStream, FlowEvent};
use super::CompiledFlow;
use crate::definition::RunInput;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Aborts the background run when the consumer drops the stream
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl CompiledFlow {
    /// Run the flow in the background and stream its events
    ///
    /// The stream yields `start`, then `node_start`/`node_end`/`token`
    /// events, and ends after exactly one `complete` or `error` event.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use flowgraph_core::{CompiledFlow, FlowEvent, RunInput};
    /// use futures::StreamExt;
    ///
    /// # async fn example(flow: CompiledFlow) {
    /// let mut events = flow.stream(RunInput::new("hello")).await;
    /// while let Some(event) = events.next().await {
    ///     if let FlowEvent::Token { content, .. } = &event {
    ///         print!("{}", content);
    ///     }
    /// }
    /// # }
    /// ```
    pub async fn stream(&self, input: RunInput) -> EventStream {
        let (tx, mut rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let flow = self.clone();

        let handle = tokio::spawn(async move {
            let state = flow.initial_state(input);
            let session_id = state.session_id.clone();
            tracing::info!(session_id = %session_id, "streaming run started");

            if tx
                .send(FlowEvent::Start {
                    session_id: session_id.clone(),
                })
                .await
                .is_err()
            {
                return;
            }

            let run = RunContext::new(
                flow.graph.clone(),
                flow.checkpoint_store.clone(),
                flow.settings.clone(),
                Some(tx.clone()),
                session_id.clone(),
            );

            let terminal = match run.run(state).await {
                Ok(final_state) => {
                    let executed_nodes = run.executed();
                    tracing::info!(session_id = %session_id, executed = executed_nodes.len(), "streaming run completed");
                    FlowEvent::Complete {
                        result: final_state.last_output,
                        executed_nodes,
                        session_id,
                    }
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "streaming run failed");
                    FlowEvent::error(&e)
                }
            };
            let _ = tx.send(terminal).await;
        });

        let guard = AbortOnDrop(handle);
        let events = async_stream::stream! {
            let _guard = guard;
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        };

        Box::pin(events)
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use scribe_core::types::{OutcomeKind, RunId, SwarmStatus};

use crate::context::ContextSnapshot;
use crate::directive::Fault;
use crate::state::SwarmRunState;

/// One node invocation in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeHistoryEntry {
    pub node_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: OutcomeKind,
    pub elapsed_ms: u64,
}

/// Caller-facing outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwarmResult {
    pub run_id: RunId,
    pub status: SwarmStatus,
    /// Present only when `status` is `FAILED_ERROR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
    pub history: Vec<NodeHistoryEntry>,
    pub iteration_count: usize,
    pub handoff_count: usize,
    pub execution_time_ms: u64,
    pub context: ContextSnapshot,
}

impl SwarmResult {
    /// Node ids in invocation order.
    pub fn node_sequence(&self) -> Vec<&str> {
        self.history.iter().map(|h| h.node_id.as_str()).collect()
    }

    /// The last message left in the shared context.
    pub fn final_message(&self) -> Option<&str> {
        self.context.last_message()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Turns a finished run state into a [`SwarmResult`].
pub struct ResultBuilder;

impl ResultBuilder {
    /// Pure snapshot of `state`. Calling it twice on the same state gives
    /// equal results.
    pub fn build(state: &SwarmRunState) -> SwarmResult {
        debug_assert!(state.status().is_terminal(), "building result of a live run");

        SwarmResult {
            run_id: state.run_id().clone(),
            status: state.status(),
            fault: state.fault().cloned(),
            history: state.history().to_vec(),
            iteration_count: state.iteration_count(),
            handoff_count: state.handoff_count(),
            execution_time_ms: state.elapsed().as_millis() as u64,
            context: state.context().snapshot(),
        }
    }
}

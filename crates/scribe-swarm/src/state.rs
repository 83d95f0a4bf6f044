use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use scribe_core::error::{Result, ScribeError};
use scribe_core::types::{OutcomeKind, RunId, SwarmStatus};

use crate::context::ExecutionContext;
use crate::directive::Fault;
use crate::node::Node;
use crate::result::NodeHistoryEntry;

/// Marks the start of one node invocation.
#[derive(Debug, Clone, Copy)]
pub struct NodeStart {
    at: DateTime<Utc>,
    instant: Instant,
}

/// Mutable state of a single run. Owned by the dispatcher for the run's
/// lifetime and handed to the result builder once terminal.
#[derive(Debug)]
pub struct SwarmRunState {
    run_id: RunId,
    current: Arc<Node>,
    handoff_count: usize,
    iteration_count: usize,
    context: ExecutionContext,
    history: Vec<NodeHistoryEntry>,
    status: SwarmStatus,
    fault: Option<Fault>,
    started_at: DateTime<Utc>,
    start: Instant,
    end: Option<Instant>,
    ended_at: Option<DateTime<Utc>>,
}

impl SwarmRunState {
    /// Fresh `PENDING` state positioned at `entry`, with the context seeded by
    /// the caller's message.
    pub fn new(run_id: RunId, entry: Arc<Node>, initial_message: impl Into<String>) -> Self {
        Self {
            run_id,
            current: entry,
            handoff_count: 0,
            iteration_count: 0,
            context: ExecutionContext::seeded(initial_message),
            history: Vec::new(),
            status: SwarmStatus::Pending,
            fault: None,
            started_at: Utc::now(),
            start: Instant::now(),
            end: None,
            ended_at: None,
        }
    }

    /// Move to `to`. `PENDING` may only become `RUNNING`, `RUNNING` may only
    /// become a terminal status, and terminal statuses never change.
    pub fn transition(&mut self, to: SwarmStatus) -> Result<()> {
        let allowed = match self.status {
            SwarmStatus::Pending => to == SwarmStatus::Running,
            SwarmStatus::Running => to.is_terminal(),
            _ => false,
        };
        if !allowed {
            return Err(ScribeError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        self.status = to;
        if to.is_terminal() {
            self.end = Some(Instant::now());
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Terminate with `FAILED_ERROR`, keeping the fault for the result.
    pub fn fail(&mut self, fault: Fault) -> Result<()> {
        self.transition(SwarmStatus::FailedError)?;
        self.fault = Some(fault);
        Ok(())
    }

    pub fn begin_node(&self) -> NodeStart {
        NodeStart {
            at: Utc::now(),
            instant: Instant::now(),
        }
    }

    /// Close the current node's invocation: one history entry, one iteration.
    pub fn record(&mut self, start: NodeStart, outcome: OutcomeKind) -> &NodeHistoryEntry {
        self.iteration_count += 1;
        self.history.push(NodeHistoryEntry {
            node_id: self.current.id.clone(),
            started_at: start.at,
            ended_at: Utc::now(),
            outcome,
            elapsed_ms: start.instant.elapsed().as_millis() as u64,
        });
        &self.history[self.history.len() - 1]
    }

    /// Make `next` the active node and count the handoff.
    pub fn hand_off(&mut self, next: Arc<Node>) {
        self.handoff_count += 1;
        self.current = next;
    }

    /// Wall-clock time since the run started, measured now.
    pub fn running_for(&self) -> Duration {
        self.start.elapsed()
    }

    /// Duration of the finished run. Zero if the run has not ended.
    pub fn elapsed(&self) -> Duration {
        self.end
            .map(|end| end.duration_since(self.start))
            .unwrap_or_default()
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn current(&self) -> &Arc<Node> {
        &self.current
    }

    pub fn status(&self) -> SwarmStatus {
        self.status
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn handoff_count(&self) -> usize {
        self.handoff_count
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn history(&self) -> &[NodeHistoryEntry] {
        &self.history
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SwarmRunState {
        SwarmRunState::new(
            RunId::new(),
            Arc::new(Node::new("writer_agent", "Writes")),
            "topic",
        )
    }

    #[test]
    fn test_lifecycle_is_one_directional() {
        let mut s = state();
        assert_eq!(s.status(), SwarmStatus::Pending);
        assert!(s.transition(SwarmStatus::Completed).is_err());

        s.transition(SwarmStatus::Running).unwrap();
        assert!(s.transition(SwarmStatus::Pending).is_err());
        assert!(s.ended_at().is_none());

        s.transition(SwarmStatus::FailedMaxIterations).unwrap();
        assert!(s.ended_at().is_some());

        let err = s.transition(SwarmStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            ScribeError::InvalidTransition { ref from, ref to }
                if from == "FAILED_MAX_ITERATIONS" && to == "COMPLETED"
        ));
        assert_eq!(s.status(), SwarmStatus::FailedMaxIterations);
    }

    #[test]
    fn test_fail_keeps_fault() {
        let mut s = state();
        s.transition(SwarmStatus::Running).unwrap();
        s.fail(Fault::engine("LLM down")).unwrap();
        assert_eq!(s.status(), SwarmStatus::FailedError);
        assert_eq!(s.fault().unwrap().message, "LLM down");
    }

    #[test]
    fn test_record_and_hand_off() {
        let mut s = state();
        s.transition(SwarmStatus::Running).unwrap();

        let start = s.begin_node();
        let entry = s.record(start, OutcomeKind::Handoff);
        assert_eq!(entry.node_id, "writer_agent");
        s.hand_off(Arc::new(Node::new("image_agent", "Images")));

        assert_eq!(s.iteration_count(), 1);
        assert_eq!(s.handoff_count(), 1);
        assert_eq!(s.current().id, "image_agent");
        assert_eq!(s.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_is_frozen_at_end() {
        let mut s = state();
        s.transition(SwarmStatus::Running).unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        s.transition(SwarmStatus::Completed).unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(s.elapsed(), Duration::from_millis(1500));
        assert!(s.running_for() > s.elapsed());
    }
}

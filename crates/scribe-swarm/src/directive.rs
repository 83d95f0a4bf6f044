use serde::{Deserialize, Serialize};

use scribe_core::types::{FaultKind, OutcomeKind};

/// A classified node-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(FaultKind::EngineError, message)
    }

    pub fn unknown_target(target: &str) -> Self {
        Self::new(
            FaultKind::UnknownHandoffTarget,
            format!("handoff target '{}' is not a registered node", target),
        )
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// What a single node turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffDirective {
    /// Pass control to `target`, leaving `message` in the shared context.
    Handoff { target: String, message: String },
    /// The node finished the whole task.
    Complete { message: String },
    /// The node could not produce a usable outcome.
    Fault(Fault),
}

impl HandoffDirective {
    pub fn handoff(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handoff {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::Complete {
            message: message.into(),
        }
    }

    pub fn outcome(&self) -> OutcomeKind {
        match self {
            Self::Handoff { .. } => OutcomeKind::Handoff,
            Self::Complete { .. } => OutcomeKind::Completion,
            Self::Fault(_) => OutcomeKind::Fault,
        }
    }
}

/// Result of invoking a node under its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Directive(HandoffDirective),
    /// The node did not answer before the node timeout and was cancelled.
    TimedOut,
}

impl Invocation {
    pub fn outcome(&self) -> OutcomeKind {
        match self {
            Self::Directive(d) => d.outcome(),
            Self::TimedOut => OutcomeKind::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_kinds() {
        assert_eq!(
            HandoffDirective::handoff("image_agent", "draft ready").outcome(),
            OutcomeKind::Handoff
        );
        assert_eq!(
            HandoffDirective::complete("published").outcome(),
            OutcomeKind::Completion
        );
        assert_eq!(
            HandoffDirective::Fault(Fault::engine("boom")).outcome(),
            OutcomeKind::Fault
        );
        assert_eq!(Invocation::TimedOut.outcome(), OutcomeKind::Timeout);
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::unknown_target("Z");
        assert_eq!(fault.kind, FaultKind::UnknownHandoffTarget);
        assert!(fault.to_string().starts_with("UnknownHandoffTarget: "));
        assert!(fault.message.contains("'Z'"));
    }
}

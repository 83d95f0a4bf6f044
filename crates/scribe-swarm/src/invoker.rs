use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use scribe_core::error::Result;

use crate::context::ContextSnapshot;
use crate::directive::{Fault, HandoffDirective, Invocation};
use crate::node::{Node, NodeRegistry};

/// The reasoning/tool-use engine behind a node.
///
/// An engine reads the full context and decides whether to hand off, complete
/// or fail. It should watch `cancel` and stop issuing new work once it fires;
/// the invoker drops the returned future at the node deadline either way.
pub trait NodeEngine: Send + Sync + 'static {
    fn produce_directive(
        &self,
        node: Arc<Node>,
        context: ContextSnapshot,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<HandoffDirective>>;
}

/// Runs one node turn and classifies what came back.
pub struct NodeInvoker {
    registry: Arc<NodeRegistry>,
    engine: Arc<dyn NodeEngine>,
    node_timeout: Duration,
}

impl NodeInvoker {
    pub fn new(
        registry: Arc<NodeRegistry>,
        engine: Arc<dyn NodeEngine>,
        node_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            engine,
            node_timeout,
        }
    }

    /// Invoke `node` against `context`, bounded by the node timeout.
    ///
    /// Never fails: engine errors and handoffs to unregistered nodes come back
    /// as faults, an elapsed deadline as [`Invocation::TimedOut`].
    pub async fn invoke(&self, node: &Arc<Node>, context: ContextSnapshot) -> Invocation {
        let cancel = CancellationToken::new();
        let work = self
            .engine
            .produce_directive(Arc::clone(node), context, cancel.clone());

        let directive = match tokio::time::timeout(self.node_timeout, work).await {
            Ok(Ok(directive)) => directive,
            Ok(Err(e)) => {
                warn!(node_id = %node.id, error = %e, "Node engine failed");
                return Invocation::Directive(HandoffDirective::Fault(Fault::engine(
                    e.to_string(),
                )));
            }
            Err(_) => {
                cancel.cancel();
                warn!(
                    node_id = %node.id,
                    timeout_secs = self.node_timeout.as_secs_f64(),
                    "Node timed out"
                );
                return Invocation::TimedOut;
            }
        };

        if let HandoffDirective::Handoff { target, .. } = &directive {
            if !self.registry.contains(target) {
                warn!(node_id = %node.id, target = %target, "Handoff to unknown node");
                return Invocation::Directive(HandoffDirective::Fault(Fault::unknown_target(
                    target,
                )));
            }
        }

        debug!(node_id = %node.id, outcome = %directive.outcome(), "Node produced directive");
        Invocation::Directive(directive)
    }
}

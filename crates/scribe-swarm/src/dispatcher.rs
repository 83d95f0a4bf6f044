use std::sync::Arc;

use tracing::{debug, error, info, warn};

use scribe_core::config::SwarmConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::event::EventBus;
use scribe_core::types::{RunId, SwarmEvent, SwarmStatus};

use crate::context::{Author, ContextEntry};
use crate::directive::{Fault, HandoffDirective, Invocation};
use crate::invoker::{NodeEngine, NodeInvoker};
use crate::node::{Node, NodeRegistry};
use crate::result::{ResultBuilder, SwarmResult};
use crate::state::SwarmRunState;

/// Assembles a [`Swarm`]. Every construction problem surfaces from
/// [`SwarmBuilder::build`].
#[derive(Default)]
pub struct SwarmBuilder {
    registry: NodeRegistry,
    entry_point: Option<String>,
    config: Option<SwarmConfig>,
    engine: Option<Arc<dyn NodeEngine>>,
    event_bus: Option<Arc<EventBus>>,
    error: Option<ScribeError>,
}

impl SwarmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A duplicate id fails the build.
    pub fn node(mut self, node: Node) -> Self {
        if let Err(e) = self.registry.register(node) {
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn nodes(self, nodes: impl IntoIterator<Item = Node>) -> Self {
        nodes.into_iter().fold(self, |b, n| b.node(n))
    }

    pub fn entry_point(mut self, id: impl Into<String>) -> Self {
        self.entry_point = Some(id.into());
        self
    }

    pub fn config(mut self, config: SwarmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn NodeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Publish run progress on `bus`. A private bus is used otherwise.
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn build(mut self) -> Result<Swarm> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let config = self
            .config
            .ok_or_else(|| ScribeError::Config("swarm budgets are required".into()))?;
        config.validate()?;

        let engine = self
            .engine
            .ok_or_else(|| ScribeError::Config("a node engine is required".into()))?;

        let entry_id = self
            .entry_point
            .ok_or_else(|| ScribeError::InvalidEntryPoint("no entry point set".into()))?;
        self.registry.set_entry_point(&entry_id)?;
        let entry = self.registry.entry_point()?;

        let registry = Arc::new(self.registry);
        let invoker = NodeInvoker::new(Arc::clone(&registry), engine, config.node_timeout);

        Ok(Swarm {
            registry,
            entry,
            invoker,
            config,
            event_bus: self.event_bus.unwrap_or_default(),
        })
    }
}

/// A built swarm. Immutable; one instance can serve any number of runs.
pub struct Swarm {
    registry: Arc<NodeRegistry>,
    entry: Arc<Node>,
    invoker: NodeInvoker,
    config: SwarmConfig,
    event_bus: Arc<EventBus>,
}

impl Swarm {
    pub fn builder() -> SwarmBuilder {
        SwarmBuilder::new()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run the swarm from its entry point until a terminal status.
    ///
    /// Never fails: every outcome, including budget exhaustion, timeouts and
    /// node faults, is reported through the returned [`SwarmResult`].
    pub async fn run(&self, initial_message: impl Into<String>) -> SwarmResult {
        let mut state = SwarmRunState::new(RunId::new(), Arc::clone(&self.entry), initial_message);
        self.finish_or_log(&mut state, SwarmStatus::Running);

        info!(
            run_id = %state.run_id(),
            entry_node = %self.entry.id,
            max_handoffs = self.config.max_handoffs,
            max_iterations = self.config.max_iterations,
            "Swarm run started"
        );
        self.event_bus.publish(SwarmEvent::RunStarted {
            run_id: state.run_id().clone(),
            entry_node: self.entry.id.clone(),
        });

        while !state.status().is_terminal() {
            self.step(&mut state).await;
        }

        let result = ResultBuilder::build(&state);
        info!(
            run_id = %result.run_id,
            status = %result.status,
            iterations = result.iteration_count,
            handoffs = result.handoff_count,
            elapsed_ms = result.execution_time_ms,
            "Swarm run finished"
        );
        self.event_bus.publish(SwarmEvent::RunFinished {
            run_id: result.run_id.clone(),
            status: result.status,
            iterations: result.iteration_count,
            handoffs: result.handoff_count,
        });
        result
    }

    /// One pass of the dispatch loop: budget checks, then at most one node
    /// invocation.
    async fn step(&self, state: &mut SwarmRunState) {
        if state.running_for() > self.config.execution_timeout {
            warn!(
                run_id = %state.run_id(),
                timeout_secs = self.config.execution_timeout.as_secs_f64(),
                "Execution timeout reached"
            );
            self.finish_or_log(state, SwarmStatus::FailedTimeoutExecution);
            return;
        }
        if state.iteration_count() >= self.config.max_iterations {
            warn!(
                run_id = %state.run_id(),
                iterations = state.iteration_count(),
                "Iteration budget exhausted"
            );
            self.finish_or_log(state, SwarmStatus::FailedMaxIterations);
            return;
        }

        let node = Arc::clone(state.current());
        debug!(
            run_id = %state.run_id(),
            node_id = %node.id,
            iteration = state.iteration_count() + 1,
            "Dispatching node"
        );
        self.event_bus.publish(SwarmEvent::NodeStarted {
            run_id: state.run_id().clone(),
            node_id: node.id.clone(),
            iteration: state.iteration_count() + 1,
        });

        let start = state.begin_node();
        let invocation = self.invoker.invoke(&node, state.context().snapshot()).await;
        let elapsed_ms = state.record(start, invocation.outcome()).elapsed_ms;
        self.event_bus.publish(SwarmEvent::NodeFinished {
            run_id: state.run_id().clone(),
            node_id: node.id.clone(),
            outcome: invocation.outcome(),
            elapsed_ms,
        });

        match invocation {
            Invocation::TimedOut => {
                self.finish_or_log(state, SwarmStatus::FailedTimeoutNode);
            }
            Invocation::Directive(HandoffDirective::Fault(fault)) => {
                error!(run_id = %state.run_id(), node_id = %node.id, fault = %fault, "Node faulted");
                self.fail_or_log(state, fault);
            }
            Invocation::Directive(HandoffDirective::Complete { message }) => {
                state
                    .context_mut()
                    .append(ContextEntry::new(Author::Node(node.id.clone()), message));
                self.finish_or_log(state, SwarmStatus::Completed);
            }
            Invocation::Directive(HandoffDirective::Handoff { target, message }) => {
                state
                    .context_mut()
                    .append(ContextEntry::new(Author::Node(node.id.clone()), message));

                if state.handoff_count() >= self.config.max_handoffs {
                    warn!(
                        run_id = %state.run_id(),
                        from = %node.id,
                        to = %target,
                        handoffs = state.handoff_count(),
                        "Handoff budget exhausted"
                    );
                    self.finish_or_log(state, SwarmStatus::FailedMaxHandoffs);
                    return;
                }

                match self.registry.resolve(&target) {
                    Ok(next) => {
                        info!(run_id = %state.run_id(), from = %node.id, to = %next.id, "Handoff");
                        self.event_bus.publish(SwarmEvent::Handoff {
                            run_id: state.run_id().clone(),
                            from: node.id.clone(),
                            to: next.id.clone(),
                        });
                        state.hand_off(next);
                    }
                    Err(_) => self.fail_or_log(state, Fault::unknown_target(&target)),
                }
            }
        }
    }

    fn finish_or_log(&self, state: &mut SwarmRunState, status: SwarmStatus) {
        if let Err(e) = state.transition(status) {
            error!(run_id = %state.run_id(), error = %e, "Run state rejected transition");
        }
    }

    fn fail_or_log(&self, state: &mut SwarmRunState, fault: Fault) {
        if let Err(e) = state.fail(fault) {
            error!(run_id = %state.run_id(), error = %e, "Run state rejected transition");
        }
    }
}

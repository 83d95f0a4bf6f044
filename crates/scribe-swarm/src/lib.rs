//! Swarm orchestration.
//!
//! A [`Swarm`] owns a fixed set of [`Node`]s and runs them one at a time over
//! a shared, append-only [`ExecutionContext`]. Each node turn goes through the
//! [`NodeInvoker`], which asks a [`NodeEngine`] for a [`HandoffDirective`]
//! under the per-node deadline. The dispatcher applies the run budgets and the
//! [`ResultBuilder`] turns the finished run into a [`SwarmResult`].
//!
//! [`AgentEngine`] is the LLM-backed engine used for real runs.

pub mod agent_loop;
pub mod context;
pub mod directive;
pub mod dispatcher;
pub mod invoker;
pub mod node;
pub mod result;
pub mod state;

pub use agent_loop::{AgentEngine, HANDOFF_TOOL};
pub use context::{Author, ContextEntry, ContextSnapshot, ExecutionContext};
pub use directive::{Fault, HandoffDirective, Invocation};
pub use dispatcher::{Swarm, SwarmBuilder};
pub use invoker::{NodeEngine, NodeInvoker};
pub use node::{Node, NodeRegistry};
pub use result::{NodeHistoryEntry, ResultBuilder, SwarmResult};
pub use state::SwarmRunState;

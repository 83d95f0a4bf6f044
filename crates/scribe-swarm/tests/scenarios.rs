use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use scribe_core::config::SwarmConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::types::{FaultKind, OutcomeKind, SwarmStatus};
use scribe_swarm::{
    ContextSnapshot, HandoffDirective, Node, NodeEngine, Swarm, SwarmResult,
};

#[derive(Clone)]
enum Step {
    Reply(HandoffDirective),
    After(Duration, HandoffDirective),
    Hang,
    Fail(&'static str),
}

fn handoff(target: &str, message: &str) -> Step {
    Step::Reply(HandoffDirective::handoff(target, message))
}

fn complete(message: &str) -> Step {
    Step::Reply(HandoffDirective::complete(message))
}

/// Plays back a per-node script and records what every invocation saw.
#[derive(Default)]
struct ScriptedEngine {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    seen: Mutex<Vec<(String, ContextSnapshot)>>,
}

impl ScriptedEngine {
    fn new(scripts: Vec<(&str, Vec<Step>)>) -> Arc<Self> {
        let scripts = scripts
            .into_iter()
            .map(|(id, steps)| (id.to_string(), steps.into()))
            .collect();
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn invoked(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    fn snapshots(&self) -> Vec<ContextSnapshot> {
        self.seen.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }
}

impl NodeEngine for ScriptedEngine {
    fn produce_directive(
        &self,
        node: Arc<Node>,
        context: ContextSnapshot,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<HandoffDirective>> {
        self.seen.lock().unwrap().push((node.id.clone(), context));
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&node.id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| complete("done"));

        Box::pin(async move {
            match step {
                Step::Reply(d) => Ok(d),
                Step::After(delay, d) => {
                    tokio::time::sleep(delay).await;
                    Ok(d)
                }
                Step::Hang => futures::future::pending().await,
                Step::Fail(msg) => Err(ScribeError::LlmRequest(msg.into())),
            }
        })
    }
}

fn budgets(exec_secs: u64, node_secs: u64, max_handoffs: usize, max_iterations: usize) -> SwarmConfig {
    SwarmConfig::new(
        Duration::from_secs(exec_secs),
        Duration::from_secs(node_secs),
        max_handoffs,
        max_iterations,
    )
}

fn swarm(engine: Arc<ScriptedEngine>, config: SwarmConfig) -> Swarm {
    Swarm::builder()
        .nodes([
            Node::new("entry", "Starts the work"),
            Node::new("B", "Middle stage"),
            Node::new("C", "Final stage"),
        ])
        .entry_point("entry")
        .config(config)
        .engine(engine)
        .build()
        .unwrap()
}

fn outcomes(result: &SwarmResult) -> Vec<OutcomeKind> {
    result.history.iter().map(|h| h.outcome).collect()
}

fn assert_budget_invariants(result: &SwarmResult, config: &SwarmConfig) {
    assert!(result.status.is_terminal());
    assert!(result.handoff_count <= config.max_handoffs);
    assert!(result.iteration_count <= config.max_iterations);
    assert_eq!(result.history.len(), result.iteration_count);
}

#[tokio::test]
async fn immediate_completion() {
    let engine = ScriptedEngine::new(vec![("entry", vec![complete("finished")])]);
    let config = budgets(600, 300, 10, 15);
    let result = swarm(engine, config).run("hello").await;

    assert_eq!(result.status, SwarmStatus::Completed);
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.handoff_count, 0);
    assert_eq!(outcomes(&result), vec![OutcomeKind::Completion]);
    assert_eq!(result.final_message(), Some("finished"));
    assert!(result.fault.is_none());
    assert_budget_invariants(&result, &config);
}

#[tokio::test]
async fn handoff_chain_completes() {
    let engine = ScriptedEngine::new(vec![
        ("entry", vec![handoff("B", "draft ready")]),
        ("B", vec![handoff("C", "image ready")]),
        ("C", vec![complete("published")]),
    ]);
    let config = budgets(600, 300, 10, 15);
    let result = swarm(Arc::clone(&engine), config).run("write it").await;

    assert_eq!(result.status, SwarmStatus::Completed);
    assert_eq!(result.node_sequence(), vec!["entry", "B", "C"]);
    assert_eq!(result.handoff_count, 2);
    assert_eq!(result.handoff_count, result.history.len() - 1);
    assert_eq!(
        outcomes(&result),
        vec![OutcomeKind::Handoff, OutcomeKind::Handoff, OutcomeKind::Completion]
    );

    let messages: Vec<&str> = result
        .context
        .entries()
        .iter()
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(messages, vec!["write it", "draft ready", "image ready", "published"]);
    assert_budget_invariants(&result, &config);

    // Every node saw the full history up to its turn.
    let seen = engine.snapshots();
    assert_eq!(seen.iter().map(|s| s.len()).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn node_timeout() {
    let engine = ScriptedEngine::new(vec![
        ("entry", vec![handoff("B", "go")]),
        ("B", vec![Step::Hang]),
    ]);
    let config = budgets(600, 5, 10, 15);
    let result = swarm(engine, config).run("start").await;

    assert_eq!(result.status, SwarmStatus::FailedTimeoutNode);
    assert_eq!(result.history.last().unwrap().outcome, OutcomeKind::Timeout);
    assert_eq!(result.history.last().unwrap().node_id, "B");
    assert!(result.execution_time_ms >= 5_000);
    assert!(result.fault.is_none());
    assert_budget_invariants(&result, &config);
}

#[tokio::test]
async fn handoff_budget_stops_before_target_runs() {
    let engine = ScriptedEngine::new(vec![
        ("entry", vec![handoff("B", "first")]),
        ("B", vec![handoff("C", "second")]),
        ("C", vec![complete("should never run")]),
    ]);
    let config = budgets(600, 300, 1, 15);
    let result = swarm(Arc::clone(&engine), config).run("start").await;

    assert_eq!(result.status, SwarmStatus::FailedMaxHandoffs);
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.handoff_count, 1);
    assert_eq!(engine.invoked(), vec!["entry", "B"]);
    assert_budget_invariants(&result, &config);
}

#[tokio::test]
async fn completion_allowed_at_handoff_budget() {
    let engine = ScriptedEngine::new(vec![
        ("entry", vec![handoff("B", "first")]),
        ("B", vec![complete("done anyway")]),
    ]);
    let config = budgets(600, 300, 1, 15);
    let result = swarm(engine, config).run("start").await;

    assert_eq!(result.status, SwarmStatus::Completed);
    assert_eq!(result.handoff_count, 1);
}

#[tokio::test]
async fn unknown_handoff_target() {
    let engine = ScriptedEngine::new(vec![("entry", vec![handoff("Z", "anyone?")])]);
    let config = budgets(600, 300, 10, 15);
    let result = swarm(engine, config).run("start").await;

    assert_eq!(result.status, SwarmStatus::FailedError);
    let fault = result.fault.as_ref().unwrap();
    assert_eq!(fault.kind, FaultKind::UnknownHandoffTarget);
    assert_eq!(outcomes(&result), vec![OutcomeKind::Fault]);
    assert_eq!(result.handoff_count, 0);
}

#[tokio::test]
async fn engine_error_is_reported() {
    let engine = ScriptedEngine::new(vec![
        ("entry", vec![handoff("B", "go")]),
        ("B", vec![Step::Fail("HTTP 529 overloaded")]),
    ]);
    let config = budgets(600, 300, 10, 15);
    let result = swarm(engine, config).run("start").await;

    assert_eq!(result.status, SwarmStatus::FailedError);
    let fault = result.fault.as_ref().unwrap();
    assert_eq!(fault.kind, FaultKind::EngineError);
    assert!(fault.message.contains("HTTP 529 overloaded"));
    assert_eq!(result.node_sequence(), vec!["entry", "B"]);
}

#[tokio::test]
async fn iteration_budget() {
    let ping_pong = |target: &'static str| {
        (0..5).map(move |i| handoff(target, &format!("round {}", i))).collect::<Vec<_>>()
    };
    let engine = ScriptedEngine::new(vec![("entry", ping_pong("B")), ("B", ping_pong("entry"))]);
    let config = budgets(600, 300, 10, 3);
    let result = swarm(engine, config).run("start").await;

    assert_eq!(result.status, SwarmStatus::FailedMaxIterations);
    assert_eq!(result.iteration_count, 3);
    assert_eq!(result.node_sequence(), vec!["entry", "B", "entry"]);
    assert_budget_invariants(&result, &config);
}

#[tokio::test(start_paused = true)]
async fn execution_timeout_checked_between_nodes() {
    let engine = ScriptedEngine::new(vec![
        (
            "entry",
            vec![Step::After(Duration::from_secs(6), HandoffDirective::handoff("B", "slow"))],
        ),
        (
            "B",
            vec![Step::After(Duration::from_secs(6), HandoffDirective::handoff("C", "slower"))],
        ),
    ]);
    let config = budgets(10, 8, 10, 15);
    let result = swarm(Arc::clone(&engine), config).run("start").await;

    assert_eq!(result.status, SwarmStatus::FailedTimeoutExecution);
    assert_eq!(engine.invoked(), vec!["entry", "B"]);
    assert_eq!(result.history.len(), 2);
    assert!(result.execution_time_ms >= 12_000);
}

#[tokio::test]
async fn snapshots_are_prefixes() {
    let engine = ScriptedEngine::new(vec![
        ("entry", vec![handoff("B", "one"), complete("four")]),
        ("B", vec![handoff("C", "two")]),
        ("C", vec![handoff("entry", "three")]),
    ]);
    let config = budgets(600, 300, 10, 15);
    let result = swarm(Arc::clone(&engine), config).run("start").await;
    assert_eq!(result.status, SwarmStatus::Completed);

    let seen = engine.snapshots();
    for pair in seen.windows(2) {
        assert!(pair[0].is_prefix_of(&pair[1]));
    }
    assert!(seen.last().unwrap().is_prefix_of(&result.context));
}

#[tokio::test]
async fn shared_swarm_runs_are_independent() {
    let engine = ScriptedEngine::new(vec![]);
    let swarm = Arc::new(swarm(engine, budgets(600, 300, 10, 15)));

    let (a, b) = tokio::join!(swarm.run("first"), swarm.run("second"));
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.context.entries()[0].message, "first");
    assert_eq!(b.context.entries()[0].message, "second");
    assert_eq!(a.status, SwarmStatus::Completed);
    assert_eq!(b.status, SwarmStatus::Completed);
}

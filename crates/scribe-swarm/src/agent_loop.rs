use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scribe_core::config::{AgentConfig, ModelConfig};
use scribe_core::error::{Result, ScribeError};
use scribe_core::event::EventBus;
use scribe_core::traits::LlmClient;
use scribe_core::types::{
    ChatMessage, ContentBlock, Role, SwarmEvent, ToolContext, ToolDefinition, ToolResult,
};
use scribe_tools::ToolRegistry;

use crate::context::ContextSnapshot;
use crate::directive::HandoffDirective;
use crate::invoker::NodeEngine;
use crate::node::Node;

/// Name of the synthetic tool a node calls to pass control.
pub const HANDOFF_TOOL: &str = "handoff_to_agent";

#[derive(Deserialize)]
struct HandoffInput {
    agent_name: String,
    #[serde(default)]
    message: String,
}

/// A tool call requested by the LLM.
struct ToolCall {
    id: String,
    name: String,
    input: serde_json::Value,
}

/// What a node has said so far during one invocation.
#[derive(Default)]
struct Transcript {
    text: Vec<String>,
    tool_lines: Vec<String>,
}

impl Transcript {
    /// Text output, then one `[tool <name>] <json>` line per tool result, then
    /// the handoff message.
    fn fold(self, handoff_message: Option<&str>) -> String {
        let mut sections: Vec<String> = Vec::new();
        if !self.text.is_empty() {
            sections.push(self.text.join("\n\n"));
        }
        if !self.tool_lines.is_empty() {
            sections.push(self.tool_lines.join("\n"));
        }
        if let Some(msg) = handoff_message.filter(|m| !m.trim().is_empty()) {
            sections.push(msg.to_string());
        }
        sections.join("\n\n")
    }
}

/// LLM-backed node engine: a bounded ReAct loop per node invocation.
pub struct AgentEngine {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    tools: Arc<ToolRegistry>,
    roster: Vec<(String, String)>,
    config: AgentConfig,
    working_dir: PathBuf,
    event_bus: Arc<EventBus>,
}

impl AgentEngine {
    /// Create an engine for `nodes`. Every tool a node lists must be
    /// registered in `tools`.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
        tools: Arc<ToolRegistry>,
        nodes: &[Node],
    ) -> Result<Self> {
        for node in nodes {
            if let Some(missing) = node.tools.iter().find(|t| !tools.contains(t)) {
                return Err(ScribeError::ToolNotFound(format!(
                    "{} (required by node {})",
                    missing, node.id
                )));
            }
        }

        Ok(Self {
            llm,
            model,
            tools,
            roster: nodes
                .iter()
                .map(|n| (n.id.clone(), n.description.clone()))
                .collect(),
            config: AgentConfig::default(),
            working_dir: PathBuf::from("."),
            event_bus: Arc::new(EventBus::default()),
        })
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    fn peers<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a (String, String)> + 'a {
        self.roster.iter().filter(move |(id, _)| *id != node.id)
    }

    fn system_prompt(&self, node: &Node) -> String {
        let mut prompt = node.instructions.trim().to_string();

        let peers: Vec<String> = self
            .peers(node)
            .map(|(id, desc)| format!("- {}: {}", id, desc))
            .collect();
        if peers.is_empty() {
            return prompt;
        }

        prompt.push_str(&format!(
            "\n\n## Team\nYou are `{}`, one of several agents sharing a single conversation. \
             The other agents are:\n{}\n\n\
             To pass the work on, call `{}` with the agent's name and a message for it. \
             When the whole task is finished, reply without calling it.",
            node.id,
            peers.join("\n"),
            HANDOFF_TOOL
        ));
        prompt
    }

    fn handoff_definition(&self, node: &Node) -> Option<ToolDefinition> {
        let names: Vec<&str> = self.peers(node).map(|(id, _)| id.as_str()).collect();
        if names.is_empty() {
            return None;
        }
        Some(ToolDefinition {
            name: HANDOFF_TOOL.into(),
            description: "Hand control to another agent. The message is added to the shared \
                          conversation for it to read."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "agent_name": { "type": "string", "enum": names },
                    "message": { "type": "string", "description": "What the next agent needs to know" }
                },
                "required": ["agent_name", "message"]
            }),
        })
    }

    /// Run the node's tool calls, in parallel when allowed and there are
    /// several. Failures become error results.
    async fn execute_tools(
        &self,
        node: &Node,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>> {
        let ctx = ToolContext {
            node_id: node.id.clone(),
            working_dir: self.working_dir.clone(),
        };

        for call in calls {
            self.event_bus.publish(SwarmEvent::ToolStart {
                node_id: node.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }

        let run = async {
            if self.config.parallel_tools && calls.len() > 1 {
                let futs: Vec<_> = calls
                    .iter()
                    .map(|call| self.execute_one(call, ctx.clone()))
                    .collect();
                futures::future::join_all(futs).await
            } else {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(self.execute_one(call, ctx.clone()).await);
                }
                results
            }
        };

        let results = tokio::select! {
            results = run => results,
            _ = cancel.cancelled() => return Err(ScribeError::Cancelled),
        };

        for (call, result) in calls.iter().zip(results.iter()) {
            self.event_bus.publish(SwarmEvent::ToolEnd {
                node_id: node.id.clone(),
                name: call.name.clone(),
                result: result.clone(),
            });
        }
        Ok(results)
    }

    async fn execute_one(&self, call: &ToolCall, ctx: ToolContext) -> ToolResult {
        match self.tools.execute(&call.name, call.input.clone(), ctx).await {
            Ok(result) => result,
            Err(e) => {
                error!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    async fn run_node(
        &self,
        node: Arc<Node>,
        context: ContextSnapshot,
        cancel: CancellationToken,
    ) -> Result<HandoffDirective> {
        let mut tool_defs = self.tools.definitions_for(&node.tools)?;
        tool_defs.extend(self.handoff_definition(&node));

        let mut messages = vec![
            ChatMessage::system(self.system_prompt(&node)),
            ChatMessage::user(context.render()),
        ];
        let mut transcript = Transcript::default();
        let max_turns = self.config.max_turns;

        for turn in 0..max_turns {
            if cancel.is_cancelled() {
                return Err(ScribeError::Cancelled);
            }
            debug!(node_id = %node.id, turn, "Starting node turn");

            let response = tokio::select! {
                result = self.llm.chat(&self.model, messages.clone(), &tool_defs) => result?,
                _ = cancel.cancelled() => return Err(ScribeError::Cancelled),
            };

            let text = response.text();
            if !text.trim().is_empty() {
                transcript.text.push(text.trim().to_string());
            }

            let calls: Vec<ToolCall> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect();

            if calls.is_empty() {
                info!(node_id = %node.id, turns = turn + 1, "Node completed the task");
                return Ok(HandoffDirective::complete(transcript.fold(None)));
            }

            messages.push(ChatMessage::assistant(response.content.clone()));

            let (handoffs, tool_calls): (Vec<ToolCall>, Vec<ToolCall>) =
                calls.into_iter().partition(|c| c.name == HANDOFF_TOOL);

            let results = self.execute_tools(&node, &tool_calls, &cancel).await?;
            let mut blocks = Vec::with_capacity(results.len() + handoffs.len());
            for (call, result) in tool_calls.iter().zip(results.iter()) {
                transcript
                    .tool_lines
                    .push(format!("[tool {}] {}", call.name, result.to_content()));
                blocks.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.to_content(),
                    is_error: result.is_error(),
                });
            }

            if let Some(call) = handoffs.first() {
                match serde_json::from_value::<HandoffInput>(call.input.clone()) {
                    Ok(h) => {
                        info!(node_id = %node.id, target = %h.agent_name, "Node requested handoff");
                        return Ok(HandoffDirective::handoff(
                            h.agent_name,
                            transcript.fold(Some(h.message.as_str())),
                        ));
                    }
                    Err(e) => {
                        warn!(node_id = %node.id, error = %e, "Malformed handoff request");
                        for call in &handoffs {
                            blocks.push(ContentBlock::ToolResult {
                                tool_use_id: call.id.clone(),
                                content: ToolResult::error(format!(
                                    "invalid {} input: {}",
                                    HANDOFF_TOOL, e
                                ))
                                .to_content(),
                                is_error: true,
                            });
                        }
                    }
                }
            }

            messages.push(ChatMessage {
                role: Role::User,
                content: blocks,
                timestamp: Some(chrono::Utc::now()),
            });
        }

        warn!(node_id = %node.id, max_turns, "Node ran out of turns");
        Err(ScribeError::MaxTurnsExceeded(max_turns))
    }
}

impl NodeEngine for AgentEngine {
    fn produce_directive(
        &self,
        node: Arc<Node>,
        context: ContextSnapshot,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<HandoffDirective>> {
        Box::pin(self.run_node(node, context, cancel))
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a single swarm run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a swarm run.
///
/// `Pending` and `Running` are the only non-terminal states. Every other
/// variant is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwarmStatus {
    Pending,
    Running,
    Completed,
    FailedMaxHandoffs,
    FailedMaxIterations,
    FailedTimeoutNode,
    FailedTimeoutExecution,
    FailedError,
}

impl SwarmStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::FailedMaxHandoffs => "FAILED_MAX_HANDOFFS",
            Self::FailedMaxIterations => "FAILED_MAX_ITERATIONS",
            Self::FailedTimeoutNode => "FAILED_TIMEOUT_NODE",
            Self::FailedTimeoutExecution => "FAILED_TIMEOUT_EXECUTION",
            Self::FailedError => "FAILED_ERROR",
        }
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single node invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Handoff,
    Completion,
    Fault,
    Timeout,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Handoff => "handoff",
            Self::Completion => "completion",
            Self::Fault => "fault",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Classification of a node-level fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// The reasoning/tool-use engine behind the node raised an error.
    EngineError,
    /// The node asked to hand off to an identifier that is not registered.
    UnknownHandoffTarget,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EngineError => "EngineError",
            Self::UnknownHandoffTarget => "UnknownHandoffTarget",
        };
        f.write_str(s)
    }
}

/// Role in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A chat message sent to or received from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            timestamp: Some(Utc::now()),
        }
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Stop reason reported by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token accounting for a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A complete (non-streamed) LLM response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl ChatResponse {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// All tool use blocks as `(id, name, input)`.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// Outcome status carried by every tool result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Structured result of a tool execution.
///
/// Serializes flat: `{"status": "...", "message": "...", <payload fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub message: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            message: message.into(),
            payload: serde_json::Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            message: message.into(),
            payload: serde_json::Map::new(),
        }
    }

    /// Attach an operation-specific payload field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// JSON rendering fed back to the LLM and folded into node messages.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Context passed to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub node_id: String,
    pub working_dir: std::path::PathBuf,
}

/// Swarm event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum SwarmEvent {
    /// A run left PENDING.
    RunStarted { run_id: RunId, entry_node: String },
    /// A node invocation is about to start.
    NodeStarted {
        run_id: RunId,
        node_id: String,
        iteration: usize,
    },
    /// A node invocation ended.
    NodeFinished {
        run_id: RunId,
        node_id: String,
        outcome: OutcomeKind,
        elapsed_ms: u64,
    },
    /// Control passed from one node to another.
    Handoff {
        run_id: RunId,
        from: String,
        to: String,
    },
    /// A node started a tool call.
    ToolStart {
        node_id: String,
        name: String,
        input: serde_json::Value,
    },
    /// A node's tool call returned.
    ToolEnd {
        node_id: String,
        name: String,
        result: ToolResult,
    },
    /// The run reached a terminal status.
    RunFinished {
        run_id: RunId,
        status: SwarmStatus,
        iterations: usize,
        handoffs: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!SwarmStatus::Pending.is_terminal());
        assert!(!SwarmStatus::Running.is_terminal());
        assert!(SwarmStatus::Completed.is_terminal());
        assert!(SwarmStatus::FailedTimeoutExecution.is_terminal());
        assert!(SwarmStatus::Completed.is_success());
        assert!(!SwarmStatus::FailedError.is_success());
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&SwarmStatus::FailedMaxHandoffs).unwrap();
        assert_eq!(json, "\"FAILED_MAX_HANDOFFS\"");
        assert_eq!(SwarmStatus::FailedTimeoutNode.to_string(), "FAILED_TIMEOUT_NODE");
    }

    #[test]
    fn tool_result_flattens_payload() {
        let result = ToolResult::success("Image uploaded")
            .with("url", "https://i.ibb.co/x/cover.png")
            .with("delete_url", serde_json::Value::Null);

        let json: serde_json::Value = serde_json::from_str(&result.to_content()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Image uploaded");
        assert_eq!(json["url"], "https://i.ibb.co/x/cover.png");
        assert!(json["delete_url"].is_null());
        assert_eq!(result.get_str("url"), Some("https://i.ibb.co/x/cover.png"));
    }

    #[test]
    fn tool_result_error_parses_back() {
        let raw = r#"{"status":"error","message":"IMGBB_API_KEY not set","url":null}"#;
        let parsed: ToolResult = serde_json::from_str(raw).unwrap();
        assert!(parsed.is_error());
        assert_eq!(parsed.message, "IMGBB_API_KEY not set");
        assert!(parsed.payload.contains_key("url"));
    }

    #[test]
    fn chat_response_accessors() {
        let response = ChatResponse {
            content: vec![
                ContentBlock::Text { text: "Uploading ".into() },
                ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "upload_image".into(),
                    input: serde_json::json!({"image_path": "cover.png"}),
                },
                ContentBlock::Text { text: "now.".into() },
            ],
            stop_reason: Some(StopReason::ToolUse),
            usage: Usage::default(),
        };
        assert_eq!(response.text(), "Uploading now.");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "upload_image");
    }
}

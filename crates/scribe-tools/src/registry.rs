use std::collections::BTreeMap;
use std::sync::Arc;

use scribe_core::config::ToolsConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::Tool;
use scribe_core::types::{ToolContext, ToolDefinition, ToolResult};

use crate::builtin::{CreateDevtoArticleTool, GenerateImageTool, UploadImageTool};

/// Registry of the tools nodes may call.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Definitions of every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| definition(t.as_ref())).collect()
    }

    /// Definitions for `names`, in the given order. Fails on the first
    /// unknown name.
    pub fn definitions_for(&self, names: &[String]) -> Result<Vec<ToolDefinition>> {
        names
            .iter()
            .map(|name| {
                self.tools
                    .get(name)
                    .map(|t| definition(t.as_ref()))
                    .ok_or_else(|| ScribeError::ToolNotFound(name.clone()))
            })
            .collect()
    }

    /// Execute a tool by name, bounded by the tool's own timeout.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| ScribeError::ToolNotFound(name.to_string()))?;

        let timeout = std::time::Duration::from_secs(tool.timeout_secs());

        match tokio::time::timeout(timeout, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ScribeError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Registry with the publishing pipeline's tools, keyed from `config`.
    pub fn with_builtins(config: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(GenerateImageTool::new(
            config.image_key(),
            config.image_base_url.clone(),
            config.image_model.clone(),
        ));
        registry.register(UploadImageTool::new(config.imgbb_key()));
        registry.register(CreateDevtoArticleTool::new(config.devto_key()));
        registry
    }
}

fn definition(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        input_schema: tool.input_schema(),
    }
}

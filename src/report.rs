use std::fmt::Write;

use scribe_core::types::ToolResult;
use scribe_swarm::SwarmResult;

use crate::prompts::PUBLISHER;

const PUBLISH_TOOL_PREFIX: &str = "[tool create_devto_article] ";

/// The last `create_devto_article` result the publisher left in the context.
pub fn published_article(result: &SwarmResult) -> Option<ToolResult> {
    result
        .context
        .messages_from(PUBLISHER)
        .flat_map(|msg| msg.lines())
        .filter_map(|line| line.strip_prefix(PUBLISH_TOOL_PREFIX))
        .filter_map(|json| serde_json::from_str::<ToolResult>(json).ok())
        .last()
}

/// Human-readable run summary.
pub fn render(result: &SwarmResult) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Status:         {}", result.status);
    let _ = writeln!(out, "Agents:         {}", result.node_sequence().join(" -> "));
    let _ = writeln!(out, "Iterations:     {}", result.iteration_count);
    let _ = writeln!(out, "Handoffs:       {}", result.handoff_count);
    let _ = writeln!(out, "Execution time: {}ms", result.execution_time_ms);
    if let Some(fault) = &result.fault {
        let _ = writeln!(out, "Fault:          {}", fault);
    }

    if let Some(article) = published_article(result) {
        if article.is_error() {
            let _ = writeln!(out, "Publish failed: {}", article.message);
        } else {
            if let Some(url) = article.get_str("article_url") {
                let _ = writeln!(out, "Article:        {}", url);
            }
            if let Some(url) = article.get_str("edit_url") {
                let _ = writeln!(out, "Edit draft:     {}", url);
            }
        }
    }
    let _ = write!(out, "{}", rule);
    out
}

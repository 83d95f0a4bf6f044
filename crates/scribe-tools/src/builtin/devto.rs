use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{info, warn};

use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::Tool;
use scribe_core::types::{ToolContext, ToolResult};

use super::http_client;

const DEVTO_ARTICLES_URL: &str = "https://dev.to/api/articles";
const DEVTO_BASE_URL: &str = "https://dev.to";
const MAX_TAGS: usize = 4;
const MAX_DESCRIPTION_CHARS: usize = 140;

/// Creates a draft article on Dev.to.
pub struct CreateDevtoArticleTool {
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Deserialize)]
struct CreateArticleInput {
    title: String,
    body_markdown: String,
    /// Comma-separated.
    #[serde(default)]
    tags: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cover_image_url: Option<String>,
}

#[derive(Deserialize)]
struct CreatedArticle {
    id: Option<u64>,
    url: Option<String>,
    path: Option<String>,
    title: Option<String>,
}

impl CreateDevtoArticleTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            endpoint: DEVTO_ARTICLES_URL.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Lowercase, strip spaces, drop empties, keep the first four.
fn normalize_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|t| t.trim().to_lowercase().replace(' ', ""))
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect()
}

fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

fn article_payload(p: &CreateArticleInput) -> serde_json::Value {
    let mut article = serde_json::json!({
        "title": p.title,
        "body_markdown": p.body_markdown,
        "published": false,
        "tags": normalize_tags(&p.tags),
        "description": truncate_description(&p.description),
    });
    if let Some(cover) = p.cover_image_url.as_deref().filter(|c| !c.trim().is_empty()) {
        article["main_image"] = serde_json::Value::String(cover.to_string());
    }
    serde_json::json!({ "article": article })
}

impl Tool for CreateDevtoArticleTool {
    fn name(&self) -> &str {
        "create_devto_article"
    }
    fn description(&self) -> &str {
        "Create a draft article on Dev.to. Returns the article and edit URLs."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "body_markdown": { "type": "string", "description": "Full article body in markdown" },
                "tags": { "type": "string", "description": "Comma-separated tags, at most 4" },
                "description": { "type": "string", "description": "Short summary, at most 140 characters" },
                "cover_image_url": { "type": "string", "description": "Public URL of the cover image" }
            },
            "required": ["title", "body_markdown", "tags", "description"]
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: CreateArticleInput = serde_json::from_value(input)
                .map_err(|e| ScribeError::ToolValidation(e.to_string()))?;

            let Some(api_key) = self.api_key.as_deref() else {
                return Ok(ToolResult::error("DEV_TO_API_KEY is not set"));
            };

            let client = http_client(self.name(), 30)?;
            let resp = match client
                .post(&self.endpoint)
                .header("api-key", api_key)
                .json(&article_payload(&p))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Dev.to request failed");
                    return Ok(ToolResult::error(format!("Request failed: {}", e)));
                }
            };

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if status != reqwest::StatusCode::CREATED {
                warn!(status = status.as_u16(), "Dev.to rejected article");
                return Ok(ToolResult::error(format!(
                    "Failed to create article: {}",
                    status.as_u16()
                ))
                .with("details", body));
            }

            let created: CreatedArticle =
                serde_json::from_str(&body).map_err(|e| ScribeError::ToolExecution {
                    tool: "create_devto_article".into(),
                    message: format!("unexpected Dev.to response: {}", e),
                })?;

            let edit_url = created
                .path
                .as_deref()
                .map(|path| format!("{}/{}/edit", DEVTO_BASE_URL, path.trim_start_matches('/')));
            info!(article_id = ?created.id, "Article created as draft");

            Ok(ToolResult::success("Article created as draft")
                .with("article_id", created.id)
                .with("article_url", created.url)
                .with("edit_url", edit_url)
                .with("title", created.title))
        })
    }
}

use base64::Engine;
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::Tool;
use scribe_core::types::{ToolContext, ToolResult};

use super::{http_client, resolve};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "dall-e-3";

/// Generates an image through an OpenAI-compatible images endpoint and saves
/// it as a local PNG.
pub struct GenerateImageTool {
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateImageInput {
    prompt: String,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default = "default_size")]
    size: String,
}
fn default_size() -> String {
    "1024x1024".into()
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    b64_json: Option<String>,
    revised_prompt: Option<String>,
}

impl GenerateImageTool {
    pub fn new(api_key: Option<String>, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.into()),
        }
    }
}

impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }
    fn timeout_secs(&self) -> u64 {
        120
    }
    fn description(&self) -> &str {
        "Generate an image from a text prompt and save it locally as PNG. Returns image_path."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string", "description": "What the image should show" },
                "output_path": { "type": "string", "description": "Where to save the PNG (default: cover-<timestamp>.png)" },
                "size": { "type": "string", "description": "Image size (default: 1024x1024)" }
            },
            "required": ["prompt"]
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: GenerateImageInput = serde_json::from_value(input)
                .map_err(|e| ScribeError::ToolValidation(e.to_string()))?;
            if p.prompt.trim().is_empty() {
                return Err(ScribeError::ToolValidation("prompt must not be empty".into()));
            }

            let Some(api_key) = self.api_key.as_deref() else {
                return Ok(ToolResult::error(
                    "OPENAI_API_KEY is not set. No image was generated.",
                ));
            };

            let client = http_client(self.name(), self.timeout_secs())?;
            let url = format!("{}/v1/images/generations", self.base_url);
            debug!(model = %self.model, size = %p.size, "Generating image");

            let resp = match client
                .post(&url)
                .bearer_auth(api_key)
                .json(&serde_json::json!({
                    "model": self.model,
                    "prompt": p.prompt,
                    "n": 1,
                    "size": p.size,
                    "response_format": "b64_json",
                }))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Image generation request failed");
                    return Ok(ToolResult::error(format!("Request failed: {}", e)));
                }
            };

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                return Ok(ToolResult::error(format!(
                    "Image generation failed with status {}: {}",
                    status.as_u16(),
                    body
                )));
            }

            let parsed: ImagesResponse =
                serde_json::from_str(&body).map_err(|e| ScribeError::ToolExecution {
                    tool: "generate_image".into(),
                    message: format!("unexpected images response: {}", e),
                })?;
            let Some(image) = parsed.data.into_iter().next() else {
                return Ok(ToolResult::error("Image generation returned no images"));
            };
            let Some(encoded) = image.b64_json else {
                return Ok(ToolResult::error("Image generation returned no image data"));
            };

            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| ScribeError::ToolExecution {
                    tool: "generate_image".into(),
                    message: format!("invalid image data: {}", e),
                })?;

            let file_name = p.output_path.unwrap_or_else(|| {
                format!("cover-{}.png", chrono::Utc::now().format("%Y%m%d%H%M%S"))
            });
            let path = resolve(&file_name, &ctx.working_dir);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;

            Ok(ToolResult::success(format!("Image saved to {}", path.display()))
                .with("image_path", path.display().to_string())
                .with("revised_prompt", image.revised_prompt))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext {
            node_id: "image_agent".into(),
            working_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GenerateImageTool::new(None, None, None);
        let result = tool
            .execute(serde_json::json!({"prompt": "abstract network"}), ctx(dir.path()))
            .await
            .unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GenerateImageTool::new(Some("k".into()), None, None);
        let err = tool
            .execute(serde_json::json!({"prompt": "  "}), ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_writes_png() {
        let png = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a];
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(header("authorization", "Bearer img-key"))
            .and(body_partial_json(serde_json::json!({"response_format": "b64_json"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "b64_json": encoded, "revised_prompt": "a glowing network" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tool = GenerateImageTool::new(Some("img-key".into()), Some(server.uri()), None);
        let result = tool
            .execute(
                serde_json::json!({"prompt": "abstract network", "output_path": "out/cover.png"}),
                ctx(dir.path()),
            )
            .await
            .unwrap();

        assert!(!result.is_error(), "{}", result.message);
        let saved = dir.path().join("out/cover.png");
        assert_eq!(result.get_str("image_path"), Some(saved.display().to_string().as_str()));
        assert_eq!(std::fs::read(saved).unwrap(), png);
    }

    #[tokio::test]
    async fn test_http_failure_is_error_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("content policy"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tool = GenerateImageTool::new(Some("img-key".into()), Some(server.uri()), None);
        let result = tool
            .execute(serde_json::json!({"prompt": "x"}), ctx(dir.path()))
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.message.contains("400"));
    }
}

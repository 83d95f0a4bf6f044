use base64::Engine;
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::Tool;
use scribe_core::types::{ToolContext, ToolResult};

use super::{http_client, resolve};

const IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

/// Uploads a local image to ImgBB and returns its public URLs.
pub struct UploadImageTool {
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Deserialize)]
struct UploadImageInput {
    image_path: String,
}

#[derive(Deserialize)]
struct ImgbbResponse {
    #[serde(default)]
    success: bool,
    data: Option<ImgbbImage>,
    error: Option<ImgbbError>,
}

#[derive(Deserialize)]
struct ImgbbImage {
    url: String,
    delete_url: Option<String>,
    display_url: Option<String>,
}

#[derive(Deserialize)]
struct ImgbbError {
    message: Option<String>,
}

impl UploadImageTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            endpoint: IMGBB_UPLOAD_URL.into(),
        }
    }

    /// Point the tool at another upload endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Tool for UploadImageTool {
    fn name(&self) -> &str {
        "upload_image"
    }
    fn description(&self) -> &str {
        "Upload a local image file to ImgBB and get a public URL."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "image_path": { "type": "string", "description": "Path to the local image file" }
            },
            "required": ["image_path"]
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: UploadImageInput = serde_json::from_value(input)
                .map_err(|e| ScribeError::ToolValidation(e.to_string()))?;

            let Some(api_key) = self.api_key.as_deref() else {
                return Ok(ToolResult::error(
                    "IMGBB_API_KEY is not set. Image will not be uploaded.",
                )
                .with("url", serde_json::Value::Null));
            };

            let path = resolve(&p.image_path, &ctx.working_dir);
            if !path.exists() {
                return Ok(
                    ToolResult::error(format!("Image file not found: {}", p.image_path))
                        .with("url", serde_json::Value::Null),
                );
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    return Ok(
                        ToolResult::error(format!("Failed to read image file: {}", e))
                            .with("url", serde_json::Value::Null),
                    )
                }
            };
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            debug!(path = %path.display(), bytes = bytes.len(), "Uploading image");

            let client = http_client(self.name(), 30)?;
            let resp = match client
                .post(&self.endpoint)
                .form(&[("key", api_key), ("image", encoded.as_str())])
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Image upload request failed");
                    return Ok(ToolResult::error(format!("Request failed: {}", e))
                        .with("url", serde_json::Value::Null));
                }
            };

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if status != reqwest::StatusCode::OK {
                return Ok(ToolResult::error(format!(
                    "Upload failed with status {}: {}",
                    status.as_u16(),
                    body
                ))
                .with("url", serde_json::Value::Null));
            }

            let parsed: ImgbbResponse = serde_json::from_str(&body).map_err(|e| {
                ScribeError::ToolExecution {
                    tool: "upload_image".into(),
                    message: format!("unexpected ImgBB response: {}", e),
                }
            })?;

            match (parsed.success, parsed.data) {
                (true, Some(image)) => Ok(ToolResult::success("Image uploaded successfully")
                    .with("url", image.url)
                    .with("delete_url", image.delete_url)
                    .with("display_url", image.display_url)),
                _ => {
                    let reason = parsed
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "Unknown error".into());
                    Ok(ToolResult::error(format!("Upload failed: {}", reason))
                        .with("url", serde_json::Value::Null))
                }
            }
        })
    }
}

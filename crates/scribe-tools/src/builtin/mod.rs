pub mod devto;
pub mod generate_image;
pub mod image_upload;

pub use devto::CreateDevtoArticleTool;
pub use generate_image::GenerateImageTool;
pub use image_upload::UploadImageTool;

use std::path::{Path, PathBuf};
use std::time::Duration;

use scribe_core::error::{Result, ScribeError};

/// Resolve a tool path argument against the working directory.
fn resolve(p: &str, wd: &Path) -> PathBuf {
    let path = PathBuf::from(p);
    if path.is_absolute() {
        path
    } else {
        wd.join(path)
    }
}

fn http_client(tool: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ScribeError::ToolExecution {
            tool: tool.into(),
            message: e.to_string(),
        })
}

pub mod builtin;
pub mod registry;

pub use builtin::{CreateDevtoArticleTool, GenerateImageTool, UploadImageTool};
pub use registry::ToolRegistry;

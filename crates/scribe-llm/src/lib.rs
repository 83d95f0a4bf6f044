pub mod providers;
pub mod retry;

use std::sync::Arc;

use scribe_core::config::ModelConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::LlmClient;

pub use providers::anthropic::AnthropicClient;
pub use retry::RetryingClient;

/// Create an LLM client for the configured provider, wrapped in retry logic
/// when `[model.retry]` is set.
pub fn create_client(config: &ModelConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Box<dyn LlmClient> = match config.provider.as_str() {
        "anthropic" | "claude" => Box::new(AnthropicClient::new()),
        other => {
            return Err(ScribeError::Config(format!(
                "unsupported LLM provider '{}'",
                other
            )))
        }
    };

    Ok(match &config.retry {
        Some(retry) => Arc::new(RetryingClient::new(client, retry.clone())),
        None => Arc::from(client),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_by_provider() {
        let config = ModelConfig::default();
        assert!(create_client(&config).is_ok());

        let claude = ModelConfig {
            provider: "claude".into(),
            retry: Some(Default::default()),
            ..ModelConfig::default()
        };
        assert!(create_client(&claude).is_ok());

        let unknown = ModelConfig {
            provider: "bedrock".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(create_client(&unknown), Err(ScribeError::Config(_))));
    }
}

mod client;
mod resilient;
mod types;

pub use client::*;
pub use resilient::*;
pub use types::*;

use crate::config::LlmConfig;
use std::sync::Arc;

/// The hosted chat client wrapped with timeouts and retries, ready to share.
pub fn connect(config: &LlmConfig) -> Arc<dyn LlmClient> {
    let client = OpenAiClient::new(config.clone());
    tracing::info!(model = client.model(), "LLM client configured");
    Arc::new(ResilientLlmClient::new(
        client,
        config.retry.clone(),
        config.request_timeout(),
    ))
}

pub mod openai;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::OpenAiProvider;
pub use types::*;

/// A chat-completion backend. The boardroom only ever needs one
/// non-streaming completion per turn.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

//! Language model access.
//!
//! [`LanguageModel`] is the seam between the bot and the completion API:
//! [`OpenAiClient`] talks to an OpenAI-compatible endpoint, and
//! [`Interpreter`] turns numerology profiles into prompts for it.

mod interpreter;
mod openai;
pub mod prompts;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ChatMessage;

pub use interpreter::Interpreter;
pub use openai::OpenAiClient;
pub use prompts::ReportRequest;

/// A chat completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a conversation and return the reply text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

use async_trait::async_trait;

use super::errors::SummarizerError;

/// Capability interface for the generative summarization service.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a short text summary of `context`, bounded by `max_tokens`.
    async fn summarize(
        &self,
        system: &str,
        context: &str,
        max_tokens: u32,
    ) -> Result<String, SummarizerError>;
}

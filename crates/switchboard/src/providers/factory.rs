use std::sync::Arc;

use anyhow::Result;

use super::base::Summarizer;
use super::groq::GroqSummarizer;
use super::openai::OpenAiSummarizer;
use crate::config::Config;

pub const DEFAULT_PROVIDER: &str = "openai";

pub fn create(name: &str) -> Result<Arc<dyn Summarizer>> {
    match name {
        "openai" => Ok(Arc::new(OpenAiSummarizer::from_env()?)),
        "groq" => Ok(Arc::new(GroqSummarizer::from_env()?)),
        _ => Err(anyhow::anyhow!("unknown summarization provider: {}", name)),
    }
}

/// Build the provider selected by `SWITCHBOARD_SUMMARY_PROVIDER`.
pub fn from_config() -> Result<Arc<dyn Summarizer>> {
    let name: String = Config::global()
        .get_param("SWITCHBOARD_SUMMARY_PROVIDER")
        .unwrap_or_else(|_| DEFAULT_PROVIDER.to_string());
    create(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let err = create("parrot").err().unwrap();
        assert!(err.to_string().contains("unknown summarization provider"));
    }
}

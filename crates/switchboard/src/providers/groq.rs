use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::base::Summarizer;
use super::errors::SummarizerError;
use super::openai_compatible::{create_request, extract_text, handle_response};
use crate::config::Config;

/// Groq serves its OpenAI-compatible surface under the `/openai` prefix.
pub const GROQ_DEFAULT_HOST: &str = "https://api.groq.com/openai";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GroqSummarizer {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl GroqSummarizer {
    pub fn from_env() -> Result<Self> {
        let config = Config::global();
        let api_key = config.get_secret("GROQ_API_KEY")?;
        let host: String = config
            .get_param("GROQ_HOST")
            .unwrap_or_else(|_| GROQ_DEFAULT_HOST.to_string());
        let model: String = config
            .get_param("GROQ_SUMMARY_MODEL")
            .unwrap_or_else(|_| GROQ_DEFAULT_MODEL.to_string());
        Self::new(host, api_key, model)
    }

    pub fn new(host: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let host = host.into();
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn post(&self, payload: &Value) -> Result<Value, SummarizerError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.host))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;
        handle_response(response).await
    }
}

#[async_trait]
impl Summarizer for GroqSummarizer {
    fn name(&self) -> &str {
        "groq"
    }

    #[tracing::instrument(skip(self, system, context))]
    async fn summarize(
        &self,
        system: &str,
        context: &str,
        max_tokens: u32,
    ) -> Result<String, SummarizerError> {
        let payload = create_request(&self.model, system, context, max_tokens);
        let response = self.post(&payload).await?;
        extract_text(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn summarize_uses_groq_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(
                serde_json::json!({"model": "llama-3.3-70b-versatile"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "done"}}]
            })))
            .mount(&server)
            .await;

        let summarizer =
            GroqSummarizer::new(server.uri(), "gsk-test", GROQ_DEFAULT_MODEL).unwrap();
        let summary = summarizer.summarize("sys", "ctx", 500).await.unwrap();
        assert_eq!(summary, "done");
    }

    #[tokio::test]
    async fn server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let summarizer =
            GroqSummarizer::new(server.uri(), "gsk-test", GROQ_DEFAULT_MODEL).unwrap();
        let err = summarizer.summarize("sys", "ctx", 500).await.unwrap_err();
        assert_eq!(err.code(), "ProviderUnavailable");
    }
}

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::base::Summarizer;
use super::errors::SummarizerError;
use super::openai_compatible::{create_request, extract_text, handle_response};
use crate::config::Config;

pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiSummarizer {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn from_env() -> Result<Self> {
        let config = Config::global();
        let api_key = config.get_secret("OPENAI_API_KEY")?;
        let host: String = config
            .get_param("OPENAI_HOST")
            .unwrap_or_else(|_| OPENAI_DEFAULT_HOST.to_string());
        let model: String = config
            .get_param("OPENAI_SUMMARY_MODEL")
            .unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string());
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
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> &str {
        "openai"
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn summarizer_for(server: &MockServer) -> OpenAiSummarizer {
        OpenAiSummarizer::new(server.uri(), "sk-test", OPENAI_DEFAULT_MODEL).unwrap()
    }

    #[tokio::test]
    async fn summarize_parses_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(
                serde_json::json!({"model": "gpt-4o-mini"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Caller has a billing question"}}]
            })))
            .mount(&server)
            .await;

        let summary = summarizer_for(&server)
            .summarize("sys", "caller asked about billing", 500)
            .await
            .unwrap();
        assert_eq!(summary, "Caller has a billing question");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_json(serde_json::json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let err = summarizer_for(&server)
            .summarize("sys", "ctx", 500)
            .await
            .unwrap_err();
        assert_eq!(err.retry_delay(), Some(Duration::from_secs(7)));
        assert_eq!(err.code(), "RateLimited");
    }

    #[tokio::test]
    async fn bad_request_maps_to_invalid_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": {"message": "context too long"}})),
            )
            .mount(&server)
            .await;

        let err = summarizer_for(&server)
            .summarize("sys", "ctx", 500)
            .await
            .unwrap_err();
        assert_eq!(err, SummarizerError::InvalidContext("context too long".to_string()));
    }
}

//! Shared request/response handling for OpenAI-compatible chat-completions
//! providers.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde_json::{json, Value};

use super::errors::SummarizerError;

/// Matches the sampling the summaries were tuned with.
const TEMPERATURE: f64 = 0.3;

pub fn create_request(model: &str, system: &str, context: &str, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": context},
        ],
        "max_tokens": max_tokens,
        "temperature": TEMPERATURE,
    })
}

pub fn extract_text(response: &Value) -> Result<String, SummarizerError> {
    response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| {
            SummarizerError::RequestFailed("response carried no message content".to_string())
        })
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

async fn error_detail(response: Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => body
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => status.to_string(),
    }
}

pub async fn handle_response(response: Response) -> Result<Value, SummarizerError> {
    let status = response.status();
    match status {
        StatusCode::OK => response.json::<Value>().await.map_err(|err| {
            SummarizerError::RequestFailed(format!("response body is not valid JSON: {err}"))
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_delay = retry_after(&response);
            let details = error_detail(response).await;
            Err(SummarizerError::RateLimited {
                details,
                retry_delay,
            })
        }
        StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(SummarizerError::InvalidContext(error_detail(response).await))
        }
        s if s.is_server_error() => Err(SummarizerError::Unavailable(error_detail(response).await)),
        s => {
            let detail = error_detail(response).await;
            Err(SummarizerError::RequestFailed(format!("{s}: {detail}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_reads_first_choice() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "  a summary  "}}]
        });
        assert_eq!(extract_text(&response).unwrap(), "a summary");
    }

    #[test]
    fn extract_text_rejects_empty_choices() {
        let response = json!({"choices": []});
        assert!(matches!(
            extract_text(&response),
            Err(SummarizerError::RequestFailed(_))
        ));
    }

    #[test]
    fn request_shape_carries_system_and_context() {
        let payload = create_request("gpt-4o-mini", "sys", "ctx", 500);
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["messages"][0]["content"], "sys");
        assert_eq!(payload["messages"][1]["content"], "ctx");
        assert_eq!(payload["max_tokens"], 500);
    }
}

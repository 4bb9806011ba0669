use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummarizerError {
    #[error("summarization provider unavailable: {0}")]
    Unavailable(String),

    #[error("rate limit exceeded: {details}")]
    RateLimited {
        details: String,
        retry_delay: Option<Duration>,
    },

    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error("summarization request failed: {0}")]
    RequestFailed(String),
}

impl SummarizerError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SummarizerError::Unavailable(_) => "ProviderUnavailable",
            SummarizerError::RateLimited { .. } => "RateLimited",
            SummarizerError::InvalidContext(_) => "InvalidContext",
            SummarizerError::RequestFailed(_) => "ProviderRequestFailed",
        }
    }

    /// Server-provided retry hint, when the provider sent one.
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            SummarizerError::RateLimited { retry_delay, .. } => *retry_delay,
            _ => None,
        }
    }
}

fn is_network_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || (err.status().is_none() && err.is_request())
}

impl From<reqwest::Error> for SummarizerError {
    fn from(err: reqwest::Error) -> Self {
        if is_network_error(&err) {
            return SummarizerError::Unavailable(err.to_string());
        }
        SummarizerError::RequestFailed(err.to_string())
    }
}

//! Deterministic summarizer for hermetic tests.
//!
//! Replays a fixed, ordered sequence of outcomes; once the sequence is
//! exhausted it keeps returning the fallback, so retry loops see stable
//! behavior instead of a hard failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::base::Summarizer;
use super::errors::SummarizerError;

#[derive(Debug, Clone)]
pub enum FixtureOutcome {
    Text(String),
    Error(SummarizerError),
}

pub struct FixtureSummarizer {
    steps: Mutex<VecDeque<FixtureOutcome>>,
    fallback: FixtureOutcome,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureSummarizer {
    pub fn new(steps: Vec<FixtureOutcome>, fallback: FixtureOutcome) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Simulate a slow provider: every call takes `latency` to return.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call succeeds with `text`.
    pub fn always_ok(text: impl Into<String>) -> Self {
        Self::new(Vec::new(), FixtureOutcome::Text(text.into()))
    }

    /// Every call fails with `err`: the fault-injected summarizer.
    pub fn always_err(err: SummarizerError) -> Self {
        Self::new(Vec::new(), FixtureOutcome::Error(err))
    }

    /// Number of summarize calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FixtureSummarizer {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn summarize(
        &self,
        _system: &str,
        _context: &str,
        _max_tokens: u32,
    ) -> Result<String, SummarizerError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let outcome = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match outcome {
            FixtureOutcome::Text(text) => Ok(text),
            FixtureOutcome::Error(err) => Err(err),
        }
    }
}

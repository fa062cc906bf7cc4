//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] plays back scripted [`MockReply`]s in order, allowing
//! downstream consumers to write deterministic tests against this crate,
//! including transport failures and streams cut off mid-document.
//!
//! # Example
//!
//! ```
//! use script_pipeline::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::new(vec![r#"{"report":"ok"}"#.to_string()]);
//! let flaky = MockBackend::scripted(vec![
//!     MockReply::Fail { status: 503 },
//!     MockReply::chunks(&["{\"report\":", "\"ok\"}"]),
//! ]);
//! assert_eq!(flaky.call_count(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;

use super::{Backend, ChunkStream, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

/// One scripted transport behaviour.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Whole response, streamed as a single chunk.
    Text(String),
    /// Response delivered as these chunks.
    Chunks(Vec<String>),
    /// These chunks, then the connection drops.
    Interrupted(Vec<String>),
    /// Provider answers with a non-success status.
    Fail { status: u16 },
    /// Provider never answers in time.
    Timeout,
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn chunks(parts: &[&str]) -> Self {
        MockReply::Chunks(parts.iter().map(|p| p.to_string()).collect())
    }
}

fn reset() -> PipelineError {
    PipelineError::StreamInterrupted("mock connection reset".into())
}

fn http_failure(status: u16) -> PipelineError {
    PipelineError::HttpError {
        status,
        body: format!("mock status {}", status),
        retry_after: None,
    }
}

fn timeout() -> PipelineError {
    PipelineError::Timeout("mock timeout".into())
}

/// A test backend that plays back scripted replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
/// Every request is recorded and can be inspected with [`requests`](Self::requests).
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    seen: Mutex<Vec<LlmRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned text responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock from explicit replies, played in order.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of transport calls made so far (complete + stream).
    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Copies of every request received, in call order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_reply(&self, request: &LlmRequest) -> MockReply {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        let idx = self.index.fetch_add(1, Ordering::SeqCst) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let text = match self.next_reply(request) {
            MockReply::Text(text) => text,
            MockReply::Chunks(parts) => parts.concat(),
            MockReply::Interrupted(_) => return Err(reset()),
            MockReply::Fail { status } => return Err(http_failure(status)),
            MockReply::Timeout => return Err(timeout()),
        };
        Ok(LlmResponse {
            text,
            status: 200,
            metadata: None,
        })
    }

    async fn stream(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<ChunkStream> {
        let items: Vec<Result<String>> = match self.next_reply(request) {
            MockReply::Text(text) => vec![Ok(text)],
            MockReply::Chunks(parts) => parts.into_iter().map(Ok).collect(),
            MockReply::Interrupted(parts) => parts
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(reset())))
                .collect(),
            MockReply::Fail { status } => return Err(http_failure(status)),
            MockReply::Timeout => return Err(timeout()),
        };
        Ok(stream::iter(items).boxed())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

//! Transport: the provider boundary.
//!
//! The [`Backend`] trait abstracts over model providers, translating a
//! normalized [`LlmRequest`] into the provider's HTTP API and handing back
//! either the whole text ([`Backend::complete`]) or an ordered stream of text
//! fragments ([`Backend::stream`]). Built-in implementations:
//! [`OllamaBackend`], `OpenAiBackend` (feature `openai`), and [`MockBackend`].
//!
//! ## Architecture
//!
//! ```text
//! Generator ──► LlmRequest ──► Backend::stream()   ──► ChunkStream ──► aggregate()
//!                          └─► Backend::complete() ──► LlmResponse
//!                                    │
//!                         ┌──────────┴──────────┐
//!                    OllamaBackend         OpenAiBackend
//!                   /api/generate          /v1/chat/completions
//!                   /api/chat              SSE streaming
//!                   NDJSON streaming
//! ```
//!
//! Transports never retry; [`crate::retry::with_retry`] wraps them.

pub mod backoff;
pub mod mock;
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "openai")]
pub mod sse;

pub use backoff::{BackoffConfig, JitterStrategy};
pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;
#[cfg(feature = "openai")]
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::schema::SchemaDescriptor;
use crate::PipelineError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use std::collections::VecDeque;
use std::time::Duration;

/// Ordered stream of text fragments from one generation.
///
/// Ends with `None` after the provider signalled completion, or yields a
/// single `Err` (typically [`PipelineError::StreamInterrupted`]) and stops.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// A normalized generation request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"llama3.2:3b"`, `"gpt-4o"`).
    pub model: String,

    /// If `Some`, this is a chat-style call with a system prompt.
    pub system_prompt: Option<String>,

    /// The user prompt text.
    pub prompt: String,

    /// Output shape the provider should constrain its answer to.
    pub schema: Option<SchemaDescriptor>,

    /// Sampling configuration.
    pub config: LlmConfig,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            prompt: prompt.into(),
            schema: None,
            config: LlmConfig::default(),
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }
}

/// A normalized non-streaming response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, timing, model info).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over model providers.
///
/// Implementors must map failures onto [`PipelineError`] variants the retry
/// layer can classify: non-success statuses become
/// [`PipelineError::HttpError`], client timeouts [`PipelineError::Timeout`],
/// and a stream cut off before completion
/// [`PipelineError::StreamInterrupted`].
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming call and return the full text.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Execute a streaming call.
    ///
    /// Errors before the first byte (connection, status) are returned
    /// directly; failures mid-stream surface as an `Err` item.
    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<ChunkStream>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Parse a `Retry-After` header value given in whole seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Send a request, mapping transport failures and non-success statuses.
pub(crate) async fn send(builder: RequestBuilder, url: &str) -> Result<Response> {
    let resp = builder
        .send()
        .await
        .map_err(|e| PipelineError::from_transport(e, url))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = resp.text().await.unwrap_or_default();
        return Err(PipelineError::HttpError {
            status,
            body,
            retry_after,
        });
    }

    Ok(resp)
}

/// One decoded unit of a provider stream.
#[derive(Debug)]
pub(crate) enum Frame {
    Token(String),
    /// Provider signalled normal completion.
    Done,
    /// Provider reported an error inside the stream.
    Failed(PipelineError),
}

struct FrameState<D> {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decode: D,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl<D> FrameState<D> {
    fn absorb(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            if self.finished {
                break;
            }
            match frame {
                Frame::Token(t) if t.is_empty() => {}
                Frame::Token(t) => self.pending.push_back(Ok(t)),
                Frame::Done => self.finished = true,
                Frame::Failed(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            }
        }
    }
}

/// Turn a streaming HTTP body into a [`ChunkStream`].
///
/// `decode` is fed each raw body chunk as `Some(bytes)` and finally `None`
/// once the body ends so it can flush buffered data. A body that ends (or
/// errors) without a [`Frame::Done`] yields
/// [`PipelineError::StreamInterrupted`] after any tokens already decoded.
pub(crate) fn frame_stream<D>(resp: Response, decode: D) -> ChunkStream
where
    D: FnMut(Option<&[u8]>) -> Vec<Frame> + Send + 'static,
{
    let state = FrameState {
        body: resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
        decode,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let frames = (st.decode)(Some(&bytes));
                    st.absorb(frames);
                }
                Some(Err(e)) => {
                    st.pending
                        .push_back(Err(PipelineError::StreamInterrupted(e.to_string())));
                    st.finished = true;
                }
                None => {
                    let frames = (st.decode)(None);
                    st.absorb(frames);
                    if !st.finished {
                        st.pending.push_back(Err(PipelineError::StreamInterrupted(
                            "connection closed before the provider finished".into(),
                        )));
                        st.finished = true;
                    }
                }
            }
        }
    })
    .boxed()
}

//! Execution context shared across generation calls.
//!
//! [`ExecCtx`] carries the HTTP client, model backend, endpoint, model name,
//! sampling and retry configuration, cancellation handle, and optional event
//! handler. It is designed to be constructed once and shared by the
//! [`Generator`](crate::Generator) and
//! [`SeriesOrchestrator`](crate::SeriesOrchestrator).

use crate::backend::{Backend, BackoffConfig, OllamaBackend};
#[cfg(feature = "openai")]
use crate::backend::OpenAiBackend;
use crate::config::LlmConfig;
use crate::error::Result;
use crate::events::EventHandler;
use crate::PipelineError;
use reqwest::Client;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Shared execution context for generation calls.
///
/// # Example
///
/// ```
/// use script_pipeline::{BackoffConfig, ExecCtx};
///
/// let ctx = ExecCtx::builder("http://localhost:11434")
///     .model("llama3.1:8b")
///     .backoff(BackoffConfig::interactive())
///     .build()
///     .unwrap();
/// assert_eq!(ctx.model, "llama3.1:8b");
/// ```
pub struct ExecCtx {
    pub client: Client,
    /// Base URL for the model provider (e.g. `http://localhost:11434`).
    pub base_url: String,
    /// Model backend. Default: [`OllamaBackend`].
    pub backend: Arc<dyn Backend>,
    /// Transport retry configuration. Default: [`BackoffConfig::standard()`].
    pub backoff: BackoffConfig,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling configuration sent with every request.
    pub llm_config: LlmConfig,
    /// Whether to use the streaming transport. Default: `true`.
    pub streaming: bool,
    /// Optional cancellation flag, checked between suspension points.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Optional event handler for streaming chunks and lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            backoff: None,
            model: None,
            llm_config: None,
            streaming: true,
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// The flag in the form the retry loop takes.
    pub fn cancel_flag(&self) -> Option<&AtomicBool> {
        self.cancellation.as_deref()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("streaming", &self.streaming)
            .field("backoff", &self.backoff)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    model: Option<String>,
    llm_config: Option<LlmConfig>,
    streaming: bool,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Reuse an existing HTTP client.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the model backend. Default: [`OllamaBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Talk to an OpenAI-compatible server with this key.
    #[cfg(feature = "openai")]
    pub fn openai_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.backend = Some(Arc::new(OpenAiBackend::new().with_api_key(api_key)));
        self
    }

    /// Set the transport retry configuration. Default: [`BackoffConfig::standard()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Set the model identifier. Default: [`DEFAULT_MODEL`].
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling configuration.
    pub fn llm_config(mut self, config: LlmConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    /// Choose between the streaming and whole-response transports.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Whole-request timeout for the default client. Default: 120 seconds.
    /// Ignored when a client is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fails with [`PipelineError::InvalidConfig`] for an empty base URL or
    /// model name, or when the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ExecCtx> {
        let base_url = normalize_base_url(&self.base_url);
        if base_url.is_empty() {
            return Err(PipelineError::InvalidConfig("base URL is empty".into()));
        }
        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("model name is empty".into()));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
                .build()
                .map_err(|e| PipelineError::InvalidConfig(format!("HTTP client: {}", e)))?,
        };

        Ok(ExecCtx {
            client,
            base_url,
            backend: self.backend.unwrap_or_else(|| Arc::new(OllamaBackend)),
            backoff: self.backoff.unwrap_or_default(),
            model,
            llm_config: self.llm_config.unwrap_or_default(),
            streaming: self.streaming,
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        })
    }
}

/// Provider paths a caller may paste along with the host. Backends append
/// their own, so these are stripped. Longest first.
const PROVIDER_PATHS: [&str; 6] = [
    "/v1/chat/completions",
    "/v1/chat",
    "/v1",
    "/api/generate",
    "/api/chat",
    "/api",
];

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    PROVIDER_PATHS
        .iter()
        .find_map(|path| trimmed.strip_suffix(path))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        let cases = [
            ("http://localhost:11434", "http://localhost:11434"),
            ("http://localhost:11434/", "http://localhost:11434"),
            ("http://localhost:11434/api/", "http://localhost:11434"),
            ("http://localhost:11434/api/chat", "http://localhost:11434"),
            ("https://api.openai.com/v1", "https://api.openai.com"),
            ("https://api.openai.com/v1/chat/completions", "https://api.openai.com"),
            (" https://llm.internal/gateway/ ", "https://llm.internal/gateway"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_base_url(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_builder_defaults() {
        let ctx = ExecCtx::builder("http://localhost:11434/api/")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(ctx.base_url, "http://localhost:11434");
        assert_eq!(ctx.model, DEFAULT_MODEL);
        assert_eq!(ctx.backend.name(), "ollama");
        assert_eq!(ctx.backoff.max_retries, 3);
        assert!(ctx.streaming);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_builder_rejects_empty_model() {
        let err = ExecCtx::builder("http://localhost:11434")
            .model("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_rejects_empty_url() {
        assert!(ExecCtx::builder("/").build().is_err());
    }

    #[test]
    fn test_cancellation_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = ExecCtx::builder("http://localhost:11434")
            .cancellation(Some(flag.clone()))
            .build()
            .unwrap();
        assert!(!ctx.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(ctx.is_cancelled());
        assert!(ctx.cancel_flag().is_some());
    }
}

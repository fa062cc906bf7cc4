use std::time::Duration;
use thiserror::Error;

/// Errors produced by the pipeline and its components.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON encoding or decoding failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code. The `retry_after` field
    /// is populated from the `Retry-After` response header when present.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The provider did not answer within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// A streamed response ended before the provider signalled completion.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Model output could not be decoded against the requested schema.
    #[error("model output did not match the requested schema: {snippet}")]
    MalformedOutput {
        /// Truncated copy of the offending text (max 200 chars).
        snippet: String,
    },

    /// The invocation was cancelled via the cancellation flag.
    #[error("generation was cancelled")]
    Cancelled,

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

impl PipelineError {
    /// Map a reqwest failure onto the pipeline taxonomy.
    ///
    /// Client-side timeouts get their own variant so the retry layer can
    /// classify them without inspecting error text.
    pub(crate) fn from_transport(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout(format!("no response from {} in time", url))
        } else {
            PipelineError::Request(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Truncate a string to at most `max_len` bytes (on a char boundary),
/// appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_untouched() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; cutting at 2 would split it
        let out = truncate("aé-rest", 2);
        assert_eq!(out, "a...");
    }

    #[test]
    fn test_http_error_display() {
        let err = PipelineError::HttpError {
            status: 503,
            body: "overloaded".into(),
            retry_after: None,
        };
        assert_eq!(err.to_string(), "HTTP 503: overloaded");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: PipelineError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, PipelineError::Other(ref m) if m == "boom"));
    }
}

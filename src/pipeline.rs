//! Single-item structured generation.
//!
//! [`Generator`] runs one request through the whole pipeline:
//!
//! ```text
//! GenerationRequest ──► with_retry( Backend::stream ──► aggregate ) ──► parse_document
//! ```
//!
//! and folds every failure class into a [`PipelineOutcome`]; nothing raises
//! past this layer.

use crate::backend::LlmRequest;
use crate::brief::{report_request, script_request, GenerationBrief, GenerationRequest};
use crate::document::GeneratedDocument;
use crate::error::{truncate, Result};
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::parsing::parse_with_diagnostics;
use crate::quota::QuotaLedger;
use crate::retry::{with_retry, FailureClass};
use crate::streaming::aggregate;
use crate::PipelineError;
use std::time::Duration;

/// Result of one generation attempt, as seen by the caller.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// A document that conforms to the requested schema.
    Success(GeneratedDocument),
    /// Transient transport failures outlasted the retry budget.
    TransientFailure {
        attempts: u32,
        last_error: PipelineError,
    },
    /// A non-transient transport failure or cancellation. Never retried.
    Rejected { error: PipelineError },
    /// The model answered, but not with a usable document.
    ParseFailure { raw_text: String },
    /// No generations left; no transport call was made.
    QuotaExceeded,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn document(&self) -> Option<&GeneratedDocument> {
        match self {
            PipelineOutcome::Success(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<GeneratedDocument> {
        match self {
            PipelineOutcome::Success(doc) => Some(doc),
            _ => None,
        }
    }

    /// Stable identifier for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineOutcome::Success(_) => "success",
            PipelineOutcome::TransientFailure { .. } => "transient_failure",
            PipelineOutcome::Rejected { .. } => "rejected",
            PipelineOutcome::ParseFailure { .. } => "parse_failure",
            PipelineOutcome::QuotaExceeded => "quota_exceeded",
        }
    }

    /// Developer-facing description of a failure; `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::TransientFailure {
                attempts,
                last_error,
            } => Some(format!(
                "gave up after {} attempt(s): {}",
                attempts, last_error
            )),
            PipelineOutcome::Rejected { error } => Some(format!("rejected: {}", error)),
            PipelineOutcome::ParseFailure { raw_text } => Some(format!(
                "unparseable model output: {}",
                truncate(raw_text, 80)
            )),
            PipelineOutcome::QuotaExceeded => Some("quota exceeded".into()),
        }
    }

    /// Message suitable for end users; `None` on success.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::QuotaExceeded => Some("no generations left"),
            _ => Some("generation failed, try again"),
        }
    }
}

/// Runs generation requests against the backend in an [`ExecCtx`].
///
/// # Example
///
/// ```
/// use script_pipeline::backend::MockBackend;
/// use script_pipeline::quota::AllowanceLedger;
/// use script_pipeline::{ExecCtx, GenerationBrief, Generator};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let ctx = ExecCtx::builder("http://localhost:11434")
///     .backend(Arc::new(MockBackend::fixed("not a script")))
///     .build()
///     .unwrap();
/// let mut quota = AllowanceLedger::new(3);
/// let outcome = Generator::new(&ctx)
///     .generate(&GenerationBrief::new("tides"), &mut quota)
///     .await;
/// assert_eq!(outcome.user_message(), Some("generation failed, try again"));
/// assert_eq!(quota.generations_left, 3);
/// # });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Generator<'a> {
    ctx: &'a ExecCtx,
}

impl<'a> Generator<'a> {
    pub fn new(ctx: &'a ExecCtx) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &'a ExecCtx {
        self.ctx
    }

    /// Generate one script from `brief`, charging `quota` on success.
    pub async fn generate<Q>(&self, brief: &GenerationBrief, quota: &mut Q) -> PipelineOutcome
    where
        Q: QuotaLedger + ?Sized,
    {
        self.execute_counted(&script_request(brief), quota).await
    }

    /// Generate a short report, charging `quota` on success.
    pub async fn generate_report<Q>(
        &self,
        subject: &str,
        question: &str,
        quota: &mut Q,
    ) -> PipelineOutcome
    where
        Q: QuotaLedger + ?Sized,
    {
        self.execute_counted(&report_request(subject, question), quota)
            .await
    }

    async fn execute_counted<Q>(&self, request: &GenerationRequest, quota: &mut Q) -> PipelineOutcome
    where
        Q: QuotaLedger + ?Sized,
    {
        if !quota.has_remaining() {
            tracing::info!(label = %request.label, "generation quota exhausted");
            return PipelineOutcome::QuotaExceeded;
        }
        let outcome = self.execute(request).await;
        if outcome.is_success() {
            quota.consume();
        }
        outcome
    }

    /// Run any request without quota accounting.
    pub async fn execute(&self, request: &GenerationRequest) -> PipelineOutcome {
        let ctx = self.ctx;
        let label = request.label.as_str();
        emit(
            &ctx.event_handler,
            Event::GenerationStart {
                label: label.to_string(),
                schema: request.schema.name().to_string(),
            },
        );

        let llm_request = LlmRequest {
            model: ctx.model.clone(),
            system_prompt: request.system_prompt.clone(),
            prompt: request.prompt.clone(),
            schema: Some(request.schema.clone()),
            config: ctx.llm_config.clone(),
        };

        let mut on_retry = |attempt: u32, delay: Duration, reason: &str| {
            emit(
                &ctx.event_handler,
                Event::TransportRetry {
                    label: label.to_string(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        };

        let this = *self;
        let req = &llm_request;
        let fetched = with_retry(&ctx.backoff, ctx.cancel_flag(), Some(&mut on_retry), move || {
            this.fetch_text(req, label)
        })
        .await;

        let outcome = match fetched {
            Ok(text) => {
                let (doc, diag) = parse_with_diagnostics(&text, &request.schema);
                match doc {
                    Some(doc) => PipelineOutcome::Success(doc),
                    None => {
                        tracing::warn!(
                            label,
                            schema = request.schema.name(),
                            input_len = diag.input_len,
                            reason = diag.parse_error.as_deref().unwrap_or(""),
                            "model output did not parse"
                        );
                        PipelineOutcome::ParseFailure { raw_text: text }
                    }
                }
            }
            Err(err) => {
                let class = err.class(&ctx.backoff);
                match err.source {
                    PipelineError::Cancelled => PipelineOutcome::Rejected {
                        error: PipelineError::Cancelled,
                    },
                    source if class == FailureClass::Transient => {
                        PipelineOutcome::TransientFailure {
                            attempts: err.attempts,
                            last_error: source,
                        }
                    }
                    source => PipelineOutcome::Rejected { error: source },
                }
            }
        };

        tracing::info!(
            label,
            backend = ctx.backend.name(),
            outcome = outcome.kind(),
            "generation finished"
        );
        emit(
            &ctx.event_handler,
            Event::GenerationEnd {
                label: label.to_string(),
                ok: outcome.is_success(),
            },
        );
        outcome
    }

    /// One transport attempt: stream and aggregate, or a whole-response call.
    async fn fetch_text(self, request: &LlmRequest, label: &str) -> Result<String> {
        let ctx = self.ctx;
        if !ctx.streaming {
            let response = ctx
                .backend
                .complete(&ctx.client, &ctx.base_url, request)
                .await?;
            return Ok(response.text);
        }

        let chunks = ctx
            .backend
            .stream(&ctx.client, &ctx.base_url, request)
            .await?;
        let handler = &ctx.event_handler;
        let aggregated = aggregate(chunks, |chunk| {
            if handler.is_some() {
                emit(
                    handler,
                    Event::Chunk {
                        label: label.to_string(),
                        chunk: chunk.to_string(),
                    },
                );
            }
        })
        .await?;

        tracing::debug!(
            label,
            chunks = aggregated.chunks,
            bytes = aggregated.text.len(),
            "stream aggregated"
        );
        Ok(aggregated.text)
    }
}

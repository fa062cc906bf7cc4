//! Multi-episode series generation.
//!
//! A series runs in two steps. [`SeriesOrchestrator::propose_series`] asks the
//! model for an outline of episodes, then
//! [`SeriesOrchestrator::generate_series`] writes one script per episode,
//! strictly in order. A failed episode is recorded and skipped; it never
//! aborts the episodes after it.

use crate::brief::{episode_brief, series_outline_request, GenerationBrief};
use crate::document::GeneratedDocument;
use crate::error::{truncate, Result};
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::pipeline::{Generator, PipelineOutcome};
use crate::quota::QuotaLedger;
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the caller wants a series about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesRequest {
    pub theme: String,
    /// Number of episodes to propose.
    pub count: usize,
    pub tone: String,
    pub niche: String,
    pub goal: String,
}

impl SeriesRequest {
    pub fn new(theme: impl Into<String>, count: usize) -> Self {
        Self {
            theme: theme.into(),
            count,
            ..Default::default()
        }
    }
}

/// One proposed episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSpec {
    pub title: String,
    pub summary: String,
}

impl EpisodeSpec {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
        }
    }
}

/// Where an orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesPhase {
    Config,
    Proposed,
    Generating,
    Done,
}

/// The result of one episode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesItem {
    pub series_id: Uuid,
    /// Position in the proposal, 0-based.
    pub episode_index: usize,
    pub episode: EpisodeSpec,
    pub document: Option<GeneratedDocument>,
    /// Why the episode was skipped. Set exactly when `document` is `None`.
    pub failure: Option<String>,
}

impl SeriesItem {
    pub fn is_success(&self) -> bool {
        self.document.is_some()
    }
}

/// Every episode of a series, in proposal order, with a tally.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResult {
    pub series_id: Uuid,
    pub items: Vec<SeriesItem>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl SeriesResult {
    /// Generated documents in episode order.
    pub fn documents(&self) -> impl Iterator<Item = &GeneratedDocument> {
        self.items.iter().filter_map(|item| item.document.as_ref())
    }

    /// Skipped episodes with their failure reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (&SeriesItem, &str)> {
        self.items
            .iter()
            .filter_map(|item| item.failure.as_deref().map(|reason| (item, reason)))
    }

    /// True when no episode was skipped.
    pub fn is_complete(&self) -> bool {
        self.failure_count == 0
    }
}

/// Drives proposal and per-episode generation for one series.
///
/// # Example
///
/// ```
/// use script_pipeline::backend::MockBackend;
/// use script_pipeline::quota::Unlimited;
/// use script_pipeline::{ExecCtx, GenerationBrief, SeriesOrchestrator, SeriesRequest};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let outline = r#"{"episodes": [
///     {"title": "Neap tides", "summary": "Quarter moons"},
///     {"title": "Spring tides", "summary": "Full and new moons"}
/// ]}"#;
/// let ctx = ExecCtx::builder("http://localhost:11434")
///     .backend(Arc::new(MockBackend::fixed(outline)))
///     .build()
///     .unwrap();
///
/// let mut series = SeriesOrchestrator::new(&ctx);
/// let episodes = series
///     .propose_series(&SeriesRequest::new("tides", 2))
///     .await
///     .unwrap();
/// assert_eq!(episodes[1].title, "Spring tides");
///
/// // the mock keeps answering with the outline, so every script fails to parse
/// let result = series
///     .generate_series(&GenerationBrief::new("tides"), &episodes, &mut Unlimited)
///     .await;
/// assert_eq!(result.failure_count, 2);
/// # });
/// ```
#[derive(Debug)]
pub struct SeriesOrchestrator<'a> {
    generator: Generator<'a>,
    phase: SeriesPhase,
    series_id: Uuid,
}

impl<'a> SeriesOrchestrator<'a> {
    pub fn new(ctx: &'a ExecCtx) -> Self {
        Self {
            generator: Generator::new(ctx),
            phase: SeriesPhase::Config,
            series_id: Uuid::new_v4(),
        }
    }

    /// Use a caller-assigned series id instead of a fresh one.
    pub fn with_series_id(mut self, series_id: Uuid) -> Self {
        self.series_id = series_id;
        self
    }

    pub fn phase(&self) -> SeriesPhase {
        self.phase
    }

    pub fn series_id(&self) -> Uuid {
        self.series_id
    }

    /// Ask the model for `request.count` episodes.
    ///
    /// Any failure aborts the series before per-episode work starts. Extra
    /// episodes are dropped; a shorter outline is accepted as-is. Proposals
    /// are not charged against the generation quota.
    pub async fn propose_series(&mut self, request: &SeriesRequest) -> Result<Vec<EpisodeSpec>> {
        if request.count == 0 {
            return Err(PipelineError::InvalidConfig(
                "series must have at least one episode".into(),
            ));
        }

        let outcome = self
            .generator
            .execute(&series_outline_request(request))
            .await;
        let doc = match outcome {
            PipelineOutcome::Success(doc) => doc,
            PipelineOutcome::ParseFailure { raw_text } => {
                return Err(PipelineError::MalformedOutput {
                    snippet: truncate(&raw_text, 200),
                })
            }
            PipelineOutcome::TransientFailure { last_error, .. } => return Err(last_error),
            PipelineOutcome::Rejected { error } => return Err(error),
            PipelineOutcome::QuotaExceeded => {
                return Err(PipelineError::Other("quota exceeded".into()))
            }
        };

        let mut episodes = doc.to_outline()?.episodes;
        if episodes.is_empty() {
            return Err(PipelineError::MalformedOutput {
                snippet: "outline contained no episodes".into(),
            });
        }
        if episodes.len() > request.count {
            tracing::debug!(
                proposed = episodes.len(),
                requested = request.count,
                "dropping extra proposed episodes"
            );
            episodes.truncate(request.count);
        } else if episodes.len() < request.count {
            tracing::warn!(
                series_id = %self.series_id,
                proposed = episodes.len(),
                requested = request.count,
                "model proposed fewer episodes than requested"
            );
        }

        tracing::info!(
            series_id = %self.series_id,
            theme = %request.theme,
            episodes = episodes.len(),
            "series proposed"
        );
        self.phase = SeriesPhase::Proposed;
        Ok(episodes)
    }

    /// Generate one script per episode, in order.
    ///
    /// Never fails as a whole: every episode ends up in the result, either
    /// with a document or with the reason it was skipped. `quota` is charged
    /// once per generated document.
    pub async fn generate_series<Q>(
        &mut self,
        template: &GenerationBrief,
        episodes: &[EpisodeSpec],
        quota: &mut Q,
    ) -> SeriesResult
    where
        Q: QuotaLedger + ?Sized,
    {
        self.phase = SeriesPhase::Generating;
        let ctx = self.generator.ctx();
        let series_id = self.series_id;
        let mut result = SeriesResult {
            series_id,
            items: Vec::with_capacity(episodes.len()),
            success_count: 0,
            failure_count: 0,
        };

        for (index, episode) in episodes.iter().enumerate() {
            emit(
                &ctx.event_handler,
                Event::EpisodeStart {
                    series_id,
                    index,
                    title: episode.title.clone(),
                },
            );

            let (document, failure) = if ctx.is_cancelled() {
                (None, Some("cancelled".to_string()))
            } else {
                let brief = episode_brief(template, episode);
                match self.generator.generate(&brief, quota).await {
                    PipelineOutcome::Success(doc) => (Some(doc), None),
                    PipelineOutcome::Rejected {
                        error: PipelineError::Cancelled,
                    } => (None, Some("cancelled".to_string())),
                    other => (None, other.failure_reason()),
                }
            };

            let ok = document.is_some();
            if ok {
                result.success_count += 1;
            } else {
                result.failure_count += 1;
                tracing::warn!(
                    series_id = %series_id,
                    index,
                    title = %episode.title,
                    reason = failure.as_deref().unwrap_or(""),
                    "episode skipped"
                );
            }
            result.items.push(SeriesItem {
                series_id,
                episode_index: index,
                episode: episode.clone(),
                document,
                failure,
            });

            emit(
                &ctx.event_handler,
                Event::EpisodeEnd {
                    series_id,
                    index,
                    ok,
                },
            );
        }

        tracing::info!(
            series_id = %series_id,
            succeeded = result.success_count,
            failed = result.failure_count,
            "series finished"
        );
        emit(
            &ctx.event_handler,
            Event::SeriesEnd {
                series_id,
                success_count: result.success_count,
                failure_count: result.failure_count,
            },
        );
        self.phase = SeriesPhase::Done;
        result
    }
}

//! # Script Pipeline
//!
//! Structured generation of short-form video scripts and script series from
//! a language model.
//!
//! A caller hands over a creative brief; the crate turns it into a prompt
//! plus an output schema, calls the model over a streaming HTTP transport
//! with bounded retry, reassembles the streamed text, extracts a document
//! that conforms to the schema, and charges the caller's quota only when a
//! document was produced. For series it first asks the model for an episode
//! outline, then generates each episode in order, isolating failures.
//!
//! ## Core Concepts
//!
//! - **[`ExecCtx`]**: shared execution context (HTTP client, backend,
//!   model, retry policy, cancellation, optional event handler).
//! - **[`Backend`](backend::Backend)**: object-safe transport to a model
//!   provider. [`OllamaBackend`] by default, [`OpenAiBackend`] behind the
//!   `openai` feature, [`MockBackend`] for tests.
//! - **[`SchemaDescriptor`]**: declarative description of the expected
//!   document, sent to the provider as JSON Schema and used by the parser.
//! - **[`Generator`]**: one brief in, one [`PipelineOutcome`] out. Failures
//!   are values, never panics or unchecked errors.
//! - **[`SeriesOrchestrator`]**: propose an outline, then generate every
//!   episode into a [`SeriesResult`].
//! - **[`QuotaLedger`]**: the caller's generation allowance.
//!
//! ## Quick Start
//!
//! ```no_run
//! use script_pipeline::{
//!     AllowanceLedger, ExecCtx, GenerationBrief, Generator, PipelineOutcome,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ExecCtx::builder("http://localhost:11434")
//!         .model("llama3.2")
//!         .build()?;
//!
//!     let brief = GenerationBrief {
//!         tone: "playful".into(),
//!         duration: "30-60s".into(),
//!         target_platforms: vec!["TikTok".into()],
//!         ..GenerationBrief::new("why the sea has tides")
//!     };
//!     let mut quota = AllowanceLedger::new(10);
//!
//!     match Generator::new(&ctx).generate(&brief, &mut quota).await {
//!         PipelineOutcome::Success(doc) => {
//!             let script = doc.to_script()?;
//!             println!("{}", script.script.title);
//!         }
//!         other => eprintln!("{}", other.failure_reason().unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Series
//!
//! ```no_run
//! use script_pipeline::{ExecCtx, GenerationBrief, SeriesOrchestrator, SeriesRequest, Unlimited};
//!
//! # async fn run() -> script_pipeline::Result<()> {
//! let ctx = ExecCtx::builder("http://localhost:11434").build()?;
//! let mut series = SeriesOrchestrator::new(&ctx);
//! let episodes = series.propose_series(&SeriesRequest::new("ocean physics", 5)).await?;
//! let result = series
//!     .generate_series(&GenerationBrief::new("ocean physics"), &episodes, &mut Unlimited)
//!     .await;
//! println!("{} ok, {} skipped", result.success_count, result.failure_count);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod brief;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod parsing;
pub mod pipeline;
pub mod prompt;
pub mod quota;
pub mod retry;
pub mod schema;
pub mod series;
pub mod streaming;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{BackoffConfig, MockBackend, OllamaBackend};
#[cfg(feature = "openai")]
pub use backend::OpenAiBackend;
pub use brief::{GenerationBrief, GenerationRequest};
pub use config::LlmConfig;
pub use diagnostics::ParseDiagnostics;
pub use document::{GeneratedDocument, Report, ScriptDocument, SeriesOutline};
pub use error::{PipelineError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use pipeline::{Generator, PipelineOutcome};
pub use quota::{AllowanceLedger, QuotaLedger, Unlimited};
pub use schema::SchemaDescriptor;
pub use series::{EpisodeSpec, SeriesOrchestrator, SeriesRequest, SeriesResult};
pub use streaming::StreamingDecoder;

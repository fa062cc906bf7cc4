//! Example: one script from a local Ollama server, streamed to stderr.
//!
//! Requires Ollama running on localhost:11434 with the model pulled.
//!
//! Run with: `cargo run --example ollama_script -- "why cats knead"`

use script_pipeline::events::{Event, FnEventHandler};
use script_pipeline::{
    BackoffConfig, ExecCtx, GenerationBrief, Generator, LlmConfig, PipelineOutcome, Unlimited,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let topic = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "why the sea has tides".to_string());

    let ctx = ExecCtx::builder("http://localhost:11434")
        .model(std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".into()))
        .llm_config(LlmConfig::default().with_temperature(0.8))
        .backoff(BackoffConfig::interactive())
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::Chunk { chunk, .. } = event {
                eprint!("{}", chunk);
            }
        })))
        .build()?;

    let brief = GenerationBrief {
        tone: "curious".into(),
        duration: "30-60s".into(),
        niche: "science".into(),
        goal: "education".into(),
        call_to_action: "Follow for more".into(),
        target_platforms: vec!["TikTok".into(), "YouTube Shorts".into()],
        ..GenerationBrief::new(topic)
    };

    match Generator::new(&ctx).generate(&brief, &mut Unlimited).await {
        PipelineOutcome::Success(doc) => {
            let doc = doc.to_script()?;
            println!("\n\n=== {} ===", doc.script.title);
            println!("Hook: {}", doc.planning.hook);
            for section in &doc.script.sections {
                println!("\n## {}\n{}\n> {}", section.heading, section.content, section.rehook);
            }
            println!("\nCTA: {}", doc.script.call_to_action);
            for post in &doc.social_posts {
                println!("[{}] {}", post.platform, post.caption);
            }
        }
        other => {
            eprintln!("\n\n{}", other.user_message().unwrap_or("failed"));
            if let Some(reason) = other.failure_reason() {
                eprintln!("({})", reason);
            }
        }
    }

    Ok(())
}

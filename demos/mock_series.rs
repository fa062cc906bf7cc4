//! Example: a whole series against MockBackend, no live model needed.
//!
//! The third episode comes back as prose and is skipped; the rest succeed.
//!
//! Run with: `RUST_LOG=debug cargo run --example mock_series`

use script_pipeline::backend::MockReply;
use script_pipeline::events::{Event, FnEventHandler};
use script_pipeline::{
    AllowanceLedger, ExecCtx, GenerationBrief, MockBackend, SeriesOrchestrator, SeriesRequest,
};
use serde_json::json;
use std::sync::Arc;

fn script(title: &str) -> String {
    json!({
        "planning": {
            "hook": "You have been breathing wrong",
            "targetAudience": "desk workers",
            "angle": "one habit per episode",
            "keyPoints": ["posture", "rhythm"]
        },
        "script": {
            "title": title,
            "sections": [
                {"heading": "Hook", "content": "Stop. Breathe in.", "rehook": "Feel that?", "durationSeconds": 4},
                {"heading": "Fix", "content": "Four in, six out.", "rehook": "Now try it twice."}
            ],
            "callToAction": "Follow for the next habit"
        },
        "socialPosts": [{"platform": "TikTok", "caption": title, "hashtags": ["#breathwork"]}],
        "videoPrompts": [{"scene": "office", "prompt": "person at a desk exhaling slowly"}]
    })
    .to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let outline = json!({"episodes": [
        {"title": "Box breathing", "summary": "Four counts each way"},
        {"title": "The long exhale", "summary": "Calm down in a minute"},
        {"title": "Nose only", "summary": "Why mouth breathing tires you"},
        {"title": "Posture", "summary": "Open the ribcage"}
    ]})
    .to_string();

    // Replies are consumed in order: outline first, then one per episode
    let mock = MockBackend::scripted(vec![
        MockReply::text(outline),
        MockReply::text(script("Box breathing")),
        MockReply::chunks(&["Here is your script: ", script("The long exhale").as_str()]),
        MockReply::text("Sorry, I got distracted."),
        MockReply::text(script("Posture")),
    ]);

    let ctx = ExecCtx::builder("http://unused")
        .backend(Arc::new(mock))
        .event_handler(Arc::new(FnEventHandler(|event: Event| match event {
            Event::EpisodeStart { index, title, .. } => println!("[{}] {}", index + 1, title),
            Event::EpisodeEnd { ok: false, index, .. } => println!("[{}] skipped", index + 1),
            _ => {}
        })))
        .build()?;

    let mut series = SeriesOrchestrator::new(&ctx);
    let request = SeriesRequest {
        tone: "calm".into(),
        niche: "wellness".into(),
        ..SeriesRequest::new("breathing habits", 4)
    };
    let episodes = series.propose_series(&request).await?;

    let template = GenerationBrief {
        tone: "calm".into(),
        duration: "30-60s".into(),
        target_platforms: vec!["TikTok".into()],
        ..GenerationBrief::new("breathing habits")
    };
    let mut quota = AllowanceLedger::new(10);
    let result = series.generate_series(&template, &episodes, &mut quota).await;

    println!(
        "\n{} generated, {} skipped, {} generations left",
        result.success_count, result.failure_count, quota.generations_left
    );
    for (item, reason) in result.skipped() {
        println!("  skipped '{}': {}", item.episode.title, reason);
    }
    println!("\n{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

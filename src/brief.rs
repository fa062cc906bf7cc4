//! Generation briefs and the request builders that turn them into
//! prompt + schema pairs.
//!
//! Every builder is a pure function: the same input always yields the same
//! [`GenerationRequest`].

use crate::prompt::{numbered_list, render, section, PromptVars};
use crate::schema::SchemaDescriptor;
use crate::series::{EpisodeSpec, SeriesRequest};
use serde::{Deserialize, Serialize};

const SCRIPT_SYSTEM: &str = "You are a short-form video scriptwriter. \
Respond with a single JSON object matching the requested schema and nothing else.";

const SCRIPT_TEMPLATE: &str = "Write a complete short-form video script about {topic}.

Tone: {tone}
Length: {duration}
Niche: {niche}
Goal: {goal}
Special requirements: {special_needs}
Call to action: {call_to_action}

Open with a hook that lands in the first three seconds. Split the script into \
sections and end every section with a re-hook that keeps the viewer watching. \
Write one social post per target platform, in the order listed. Write one \
video generation prompt per scene.";

const OUTLINE_SYSTEM: &str = "You plan episodic short-form video series. \
Respond with a single JSON object matching the requested schema and nothing else.";

const OUTLINE_TEMPLATE: &str = "Propose a series of exactly {count} episodes on the theme \"{theme}\".

Tone: {tone}
Niche: {niche}
Goal: {goal}

Give each episode a distinct title and a one or two sentence summary. \
Order the episodes so each builds on the previous one.";

const REPORT_TEMPLATE: &str = "Write a short report about {subject}.

{question}

Answer in plain prose of at most three paragraphs.";

/// Caller-supplied creative parameters for one script.
///
/// Borrowed by the pipeline and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationBrief {
    pub topic: String,
    pub tone: String,
    /// Duration bucket, e.g. `"30-60s"`.
    pub duration: String,
    pub niche: String,
    pub goal: String,
    pub special_needs: String,
    pub call_to_action: String,
    /// Platforms to write social posts for, in display order.
    pub target_platforms: Vec<String>,
    /// Set when the brief is one episode of a series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeSpec>,
}

impl GenerationBrief {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Short label for logs and events.
    pub fn label(&self) -> &str {
        match self.episode {
            Some(ref ep) => &ep.title,
            None => &self.topic,
        }
    }
}

/// A canonical request: prompt text plus the schema the answer must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Label for logs and events.
    pub label: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub schema: SchemaDescriptor,
}

fn or_none(value: &str) -> String {
    if value.trim().is_empty() {
        "none".to_string()
    } else {
        value.to_string()
    }
}

/// Request for a full script (`script` descriptor).
pub fn script_request(brief: &GenerationBrief) -> GenerationRequest {
    let mut vars = PromptVars::new();
    vars.insert("topic", brief.topic.clone());
    vars.insert("tone", or_none(&brief.tone));
    vars.insert("duration", or_none(&brief.duration));
    vars.insert("niche", or_none(&brief.niche));
    vars.insert("goal", or_none(&brief.goal));
    vars.insert("special_needs", or_none(&brief.special_needs));
    vars.insert("call_to_action", or_none(&brief.call_to_action));

    let mut parts = vec![render(SCRIPT_TEMPLATE, &vars)];
    if !brief.target_platforms.is_empty() {
        parts.push(section(
            "Target platforms",
            &numbered_list(&brief.target_platforms),
        ));
    }
    if let Some(ref ep) = brief.episode {
        parts.push(section(
            "This episode",
            &format!("Title: {}\nSummary: {}", ep.title, ep.summary),
        ));
    }

    GenerationRequest {
        label: brief.label().to_string(),
        system_prompt: Some(SCRIPT_SYSTEM.to_string()),
        prompt: parts.join("\n\n"),
        schema: SchemaDescriptor::script(),
    }
}

/// Request for a series proposal (`series_outline` descriptor).
pub fn series_outline_request(request: &SeriesRequest) -> GenerationRequest {
    let mut vars = PromptVars::new();
    vars.insert("count", request.count.to_string());
    vars.insert("theme", request.theme.clone());
    vars.insert("tone", or_none(&request.tone));
    vars.insert("niche", or_none(&request.niche));
    vars.insert("goal", or_none(&request.goal));

    GenerationRequest {
        label: request.theme.clone(),
        system_prompt: Some(OUTLINE_SYSTEM.to_string()),
        prompt: render(OUTLINE_TEMPLATE, &vars),
        schema: SchemaDescriptor::series_outline(),
    }
}

/// The brief for one episode: the shared template plus that episode.
pub fn episode_brief(template: &GenerationBrief, episode: &EpisodeSpec) -> GenerationBrief {
    GenerationBrief {
        episode: Some(episode.clone()),
        ..template.clone()
    }
}

/// Request for a short free-text report (`report` descriptor).
pub fn report_request(subject: &str, question: &str) -> GenerationRequest {
    let mut vars = PromptVars::new();
    vars.insert("subject", subject.to_string());
    vars.insert("question", question.to_string());

    GenerationRequest {
        label: subject.to_string(),
        system_prompt: None,
        prompt: render(REPORT_TEMPLATE, &vars),
        schema: SchemaDescriptor::report(),
    }
}

//! Parsed generation results and their typed views.

use crate::error::Result;
use crate::series::EpisodeSpec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured document that passed the parser for one schema descriptor.
///
/// Only created by [`parse_document`](crate::parsing::parse_document), so the
/// value always conforms to the descriptor named by [`schema_name`](Self::schema_name):
/// every required field is present and nothing undeclared is carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDocument {
    schema_name: String,
    value: Value,
}

impl GeneratedDocument {
    pub(crate) fn new(schema_name: impl Into<String>, value: Value) -> Self {
        Self {
            schema_name: schema_name.into(),
            value,
        }
    }

    /// Name of the descriptor the document was validated against.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Deserialize into any serde type.
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }

    /// View as a full video script (`script` descriptor).
    pub fn to_script(&self) -> Result<ScriptDocument> {
        self.parse_as()
    }

    /// View as a series proposal (`series_outline` descriptor).
    pub fn to_outline(&self) -> Result<SeriesOutline> {
        self.parse_as()
    }

    /// View as a short report (`report` descriptor).
    pub fn to_report(&self) -> Result<Report> {
        self.parse_as()
    }
}

/// A complete short-form video script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDocument {
    pub planning: Planning,
    pub script: ScriptBody,
    pub social_posts: Vec<SocialPost>,
    pub video_prompts: Vec<VideoPrompt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Planning {
    pub hook: String,
    pub target_audience: String,
    pub angle: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptBody {
    pub title: String,
    /// In delivery order; each re-hook belongs to the section it closes.
    pub sections: Vec<ScriptSection>,
    pub call_to_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSection {
    pub heading: String,
    pub content: String,
    pub rehook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub platform: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPrompt {
    pub scene: String,
    pub prompt: String,
}

/// Proposed episodes for a series, in broadcast order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOutline {
    pub episodes: Vec<EpisodeSpec>,
}

/// Short free-text report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::script_value;
    use crate::PipelineError;
    use serde_json::json;

    #[test]
    fn test_script_view_preserves_order() {
        let doc = GeneratedDocument::new("script", script_value("Why the sea breathes"));
        assert_eq!(doc.to_script().unwrap().script.title, "Why the sea breathes");
        let script = doc.to_script().unwrap();
        assert_eq!(script.script.sections[0].heading, "Hook");
        assert_eq!(script.script.sections[1].rehook, "And there is more.");
        assert_eq!(script.script.sections[0].duration_seconds, Some(5.0));
        assert_eq!(script.social_posts[1].platform, "YouTube Shorts");
        assert!(script.social_posts[1].hashtags.is_empty());
        assert_eq!(script.planning.key_points, vec!["gravity", "two bulges"]);
    }

    #[test]
    fn test_outline_view() {
        let doc = GeneratedDocument::new(
            "series_outline",
            json!({"episodes": [{"title": "One", "summary": "first"}]}),
        );
        let outline = doc.to_outline().unwrap();
        assert_eq!(outline.episodes[0].title, "One");
        assert_eq!(doc.schema_name(), "series_outline");
    }

    #[test]
    fn test_wrong_view_is_json_error() {
        let doc = GeneratedDocument::new("report", json!({"report": "fine"}));
        assert_eq!(doc.to_report().unwrap().report, "fine");
        assert!(matches!(doc.to_script(), Err(PipelineError::Json(_))));
    }

    #[test]
    fn test_serializes_for_persistence() {
        let doc = GeneratedDocument::new("report", json!({"report": "fine"}));
        let stored = serde_json::to_value(&doc).unwrap();
        assert_eq!(stored["schema_name"], "report");
        assert_eq!(stored["value"]["report"], "fine");
    }
}

//! Document parsing for model output.
//!
//! Model output is untrusted text. [`parse_document`] turns it into a
//! [`GeneratedDocument`] in two stages and otherwise returns `None`; it never
//! returns an error or panics, because malformed output is an expected
//! outcome rather than an exceptional one.
//!
//! 1. Decode the whole text and validate it against the schema descriptor.
//! 2. Decode the span from the first `{` to the last `}` (inclusive) and
//!    validate that. This recovers output wrapped in explanatory prose.

use crate::diagnostics::{ParseDiagnostics, ParseStrategy};
use crate::document::GeneratedDocument;
use crate::schema::SchemaDescriptor;
use serde_json::Value;

/// The substring from the first `{` to the last `}` in `text`, inclusive.
///
/// Returns `None` when either brace is missing or they are out of order.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decode and validate one candidate. Returns the projected value and the
/// number of top-level fields that were dropped.
fn decode_candidate(
    candidate: &str,
    schema: &SchemaDescriptor,
) -> std::result::Result<(Value, usize), String> {
    let raw: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    let projected = schema.project(&raw).map_err(|e| e.to_string())?;
    let dropped = match (&raw, &projected) {
        (Value::Object(before), Value::Object(after)) => before
            .iter()
            .filter(|(k, v)| !v.is_null() && !after.contains_key(k.as_str()))
            .count(),
        _ => 0,
    };
    Ok((projected, dropped))
}

/// Parse `text` against `schema`, reporting which stage succeeded.
pub fn parse_with_diagnostics(
    text: &str,
    schema: &SchemaDescriptor,
) -> (Option<GeneratedDocument>, ParseDiagnostics) {
    let mut diag = ParseDiagnostics {
        input_len: text.len(),
        ..Default::default()
    };

    let mut candidates = vec![(ParseStrategy::Direct, text)];
    if let Some(span) = brace_span(text) {
        if span.len() != text.trim().len() {
            candidates.push((ParseStrategy::BraceSpan, span));
        }
    }

    for (strategy, candidate) in candidates {
        match decode_candidate(candidate, schema) {
            Ok((value, dropped)) => {
                diag.strategy = Some(strategy);
                diag.parse_error = None;
                diag.dropped_fields = dropped;
                tracing::debug!(
                    schema = schema.name(),
                    strategy = strategy.as_str(),
                    dropped_fields = dropped,
                    "parsed model output"
                );
                return (Some(GeneratedDocument::new(schema.name(), value)), diag);
            }
            Err(reason) => {
                tracing::debug!(
                    schema = schema.name(),
                    strategy = strategy.as_str(),
                    reason = %reason,
                    "parse stage failed"
                );
                diag.parse_error = Some(reason);
            }
        }
    }

    if diag.parse_error.is_none() {
        diag.parse_error = Some("no JSON object found".into());
    }
    (None, diag)
}

/// Parse `text` as a document conforming to `schema`.
///
/// # Example
///
/// ```
/// use script_pipeline::parsing::parse_document;
/// use script_pipeline::schema::SchemaDescriptor;
///
/// let schema = SchemaDescriptor::report();
/// let doc = parse_document("Sure! {\"report\": \"all good\"} Anything else?", &schema).unwrap();
/// assert_eq!(doc.value()["report"], "all good");
///
/// assert!(parse_document("I cannot help with that.", &schema).is_none());
/// ```
pub fn parse_document(text: &str, schema: &SchemaDescriptor) -> Option<GeneratedDocument> {
    parse_with_diagnostics(text, schema).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outline_json() -> String {
        json!({
            "episodes": [
                {"title": "Low tide", "summary": "What is left behind"},
                {"title": "High tide", "summary": "What comes back"}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_brace_span() {
        assert_eq!(brace_span("a {x} b {y} c"), Some("{x} b {y}"));
        assert_eq!(brace_span("no braces"), None);
        assert_eq!(brace_span("} backwards {"), None);
        assert_eq!(brace_span("{"), None);
    }

    #[test]
    fn test_direct_parse() {
        let schema = SchemaDescriptor::series_outline();
        let (doc, diag) = parse_with_diagnostics(&outline_json(), &schema);
        let doc = doc.unwrap();
        assert_eq!(doc.schema_name(), "series_outline");
        assert_eq!(doc.value()["episodes"][1]["title"], "High tide");
        assert_eq!(diag.strategy, Some(ParseStrategy::Direct));
    }

    #[test]
    fn test_prose_wrapped_equals_direct() {
        let schema = SchemaDescriptor::series_outline();
        let json = outline_json();
        let direct = parse_document(&json, &schema).unwrap();

        let wrappers = [
            ("Here is your outline:\n", "\nLet me know!"),
            ("```json\n", "\n```"),
            ("Sure {not json} ", ""),
            ("", " -- generated by model }"),
        ];
        for (before, after) in wrappers {
            let text = format!("{}{}{}", before, json, after);
            let (doc, diag) = parse_with_diagnostics(&text, &schema);
            if before.contains('{') || after.contains('}') {
                // extra braces widen the span past the document
                assert!(doc.is_none(), "{:?}", text);
                continue;
            }
            assert_eq!(doc.as_ref(), Some(&direct), "{:?}", text);
            assert!(diag.recovered());
        }
    }

    #[test]
    fn test_garbage_is_none() {
        let schema = SchemaDescriptor::script();
        let inputs = [
            "",
            "   ",
            "I'm sorry, I can't do that.",
            "{",
            "}{",
            "{{{{",
            "{\"planning\": ",
            "[1, 2, 3]",
            "null",
            "\u{0}\u{1}\u{fffd}",
            "{\"planning\": {\"hook\": 1}}",
            "日本語 { 中文 } ",
        ];
        for input in inputs {
            let (doc, diag) = parse_with_diagnostics(input, &schema);
            assert!(doc.is_none(), "{:?}", input);
            assert!(!diag.ok());
            assert!(diag.parse_error.is_some());
        }
    }

    #[test]
    fn test_schema_violation_is_none() {
        let schema = SchemaDescriptor::series_outline();
        let text = r#"{"episodes": [{"title": "Only a title"}]}"#;
        let (doc, diag) = parse_with_diagnostics(text, &schema);
        assert!(doc.is_none());
        assert!(diag
            .parse_error
            .unwrap()
            .contains("summary"));
    }

    #[test]
    fn test_undeclared_fields_dropped() {
        let schema = SchemaDescriptor::report();
        let (doc, diag) =
            parse_with_diagnostics(r#"{"report": "ok", "mood": "great", "extra": null}"#, &schema);
        assert_eq!(doc.unwrap().value(), &json!({"report": "ok"}));
        assert_eq!(diag.dropped_fields, 1);
    }

    #[test]
    fn test_numbers_and_strings_verbatim() {
        let schema = SchemaDescriptor::new("n")
            .field(crate::schema::Field::number("score"))
            .field(crate::schema::Field::string("label"));
        let doc = parse_document(r#"{"score": 0.125, "label": "  padded  "}"#, &schema).unwrap();
        assert_eq!(doc.value()["score"], json!(0.125));
        assert_eq!(doc.value()["label"], "  padded  ");
    }
}

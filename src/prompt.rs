//! Small prompt-assembly helpers used by the request builders.

use std::collections::BTreeMap;

/// Named values substituted into a prompt template.
pub type PromptVars = BTreeMap<&'static str, String>;

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders with values from `vars` in a single pass,
/// so substituted text is never re-scanned. Unknown placeholders are kept
/// verbatim. Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use script_pipeline::prompt::{render, PromptVars};
///
/// let mut vars = PromptVars::new();
/// vars.insert("topic", "tides".to_string());
/// let result = render("About {topic}, as JSON: {{\"key\": \"val\"}}", &vars);
/// assert_eq!(result, r#"About tides, as JSON: {"key": "val"}"#);
/// ```
pub fn render(template: &str, vars: &PromptVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('{') {
            if let Some(close) = tail.find('}') {
                let key = &tail[1..close];
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                    continue;
                }
            }
        }

        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

/// Create a numbered list from items (1-indexed).
pub fn numbered_list(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap text in a labeled section for structured prompts.
pub fn section(label: &str, content: &str) -> String {
    format!("## {}\n{}", label, content)
}

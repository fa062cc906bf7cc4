//! Parse diagnostics for document parsing.
//!
//! [`ParseDiagnostics`] records what happened while turning aggregated model
//! text into a [`GeneratedDocument`](crate::document::GeneratedDocument):
//! which stage succeeded, or why every stage failed.

/// Stage of the document parser that produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The whole text decoded as-is.
    Direct,
    /// The substring between the first `{` and the last `}` decoded.
    BraceSpan,
}

impl ParseStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStrategy::Direct => "direct",
            ParseStrategy::BraceSpan => "brace_span",
        }
    }
}

/// Records what happened during document parsing.
///
/// # Example
///
/// ```
/// use script_pipeline::diagnostics::ParseDiagnostics;
///
/// let diag = ParseDiagnostics::default();
/// assert!(!diag.ok()); // nothing has succeeded yet
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParseDiagnostics {
    /// Which stage produced the document. `None` means parsing failed.
    pub strategy: Option<ParseStrategy>,

    /// Why the last attempted stage failed, when parsing failed.
    pub parse_error: Option<String>,

    /// Length of the input text in bytes.
    pub input_len: usize,

    /// Number of undeclared fields dropped from the top level.
    pub dropped_fields: usize,
}

impl ParseDiagnostics {
    /// Quick check: did parsing succeed?
    pub fn ok(&self) -> bool {
        self.strategy.is_some()
    }

    /// Whether the recovery stage was needed.
    pub fn recovered(&self) -> bool {
        self.strategy == Some(ParseStrategy::BraceSpan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_default_not_ok() {
        let d = ParseDiagnostics::default();
        assert!(!d.ok());
        assert!(!d.recovered());
        assert_eq!(d.dropped_fields, 0);
    }

    #[test]
    fn test_recovered_flag() {
        let d = ParseDiagnostics {
            strategy: Some(ParseStrategy::BraceSpan),
            ..Default::default()
        };
        assert!(d.ok());
        assert!(d.recovered());
        assert_eq!(ParseStrategy::BraceSpan.as_str(), "brace_span");
    }
}

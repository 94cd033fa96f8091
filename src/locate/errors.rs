use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("anchor marker not found: {marker}")]
    MarkerNotFound { marker: String },

    #[error("no opening delimiter follows {marker}")]
    NoDelimiter { marker: String },

    #[error("'{delimiter}' opened at line {line} is never closed")]
    Unterminated { delimiter: char, line: usize },

    #[error("expected '{expected}' but found '{found}' at line {line}")]
    Mismatched {
        expected: char,
        found: char,
        line: usize,
    },

    #[error("unterminated {kind} starting at line {line}")]
    UnterminatedLiteral { kind: &'static str, line: usize },
}

impl LocateError {
    /// Whether the content itself is inconsistent with its format, as
    /// opposed to the anchor simply not being there.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            LocateError::Mismatched { .. } | LocateError::UnterminatedLiteral { .. }
        )
    }
}

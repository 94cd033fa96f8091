use thiserror::Error;

/// Structural problems that make a YAML file unsafe to patch line-wise.
/// Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum YamlError {
    #[error("tab character in indentation on line {line}")]
    TabIndentation { line: usize },

    #[error("line {line} is not part of a top-level mapping")]
    UnexpectedContent { line: usize },

    #[error("second YAML document starts on line {line}")]
    MultipleDocuments { line: usize },

    #[error("unterminated quoted key on line {line}")]
    UnterminatedKey { line: usize },
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TomlError {
    #[error("invalid TOML syntax: {message}")]
    InvalidTomlSyntax { message: String },

    #[error("invalid section path '{input}': {message}")]
    InvalidSectionPath { input: String, message: String },
}

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Literal, ready-to-paste guidance for applying an entry by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// What to do, e.g. "Edit app/AppKernel.php and add ..."
    pub summary: Vec<String>,
    /// The exact text to paste
    pub snippet: String,
}

impl Instruction {
    pub fn new(summary: impl IntoIterator<Item = String>, snippet: impl Into<String>) -> Self {
        Self {
            summary: summary.into_iter().collect(),
            snippet: snippet.into(),
        }
    }

    /// Lines as presented to the user, snippet indented by four spaces.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.summary.clone();
        lines.push(String::new());
        lines.extend(self.snippet.lines().map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        }));
        lines.push(String::new());
        lines
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Terminal state of one manipulator call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Outcome should be checked: only Applied means the file changed"]
pub enum Outcome {
    /// The file was patched
    Applied { file: PathBuf },
    /// The entry's key is already registered; nothing was written
    AlreadyPresent { file: PathBuf, key: String },
    /// No safe insertion point; nothing was written
    AnchorNotFound {
        file: PathBuf,
        reason: String,
        instruction: Instruction,
    },
    /// The file is inconsistent with its format; nothing was written
    MalformedTarget {
        file: PathBuf,
        reason: String,
        instruction: Instruction,
    },
}

impl Outcome {
    pub fn file(&self) -> &Path {
        match self {
            Outcome::Applied { file }
            | Outcome::AlreadyPresent { file, .. }
            | Outcome::AnchorNotFound { file, .. }
            | Outcome::MalformedTarget { file, .. } => file,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    /// Manual instruction, for outcomes that require one.
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            Outcome::AnchorNotFound { instruction, .. }
            | Outcome::MalformedTarget { instruction, .. } => Some(instruction),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied { file } => write!(f, "Applied to {}", file.display()),
            Outcome::AlreadyPresent { file, key } => {
                write!(f, "{} is already registered in {}", key, file.display())
            }
            Outcome::AnchorNotFound { file, reason, .. } => {
                write!(f, "No insertion point in {}: {}", file.display(), reason)
            }
            Outcome::MalformedTarget { file, reason, .. } => {
                write!(f, "Malformed {}: {}", file.display(), reason)
            }
        }
    }
}

/// Failures that are neither "already done" nor "cannot locate".
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported target format for {path}: expected {expected}")]
    UnsupportedFormat { path: PathBuf, expected: String },

    #[error("edit error: {0}")]
    Edit(#[from] crate::edit::EditError),
}

impl PatchError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

use std::path::PathBuf;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every manipulator compiles its decision down to one or more of these.
/// Intelligence lives in anchor location, not in application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until spliced into content"]
pub struct Edit {
    /// Path of the file the edit was planned against (used in diagnostics)
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to place at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in content of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Overlapping edits at byte {byte_start} in {file}")]
    Overlap { file: PathBuf, byte_start: usize },

    #[error("Edit span does not fall on a UTF-8 character boundary")]
    InvalidUtf8Edit,
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(&expected),
        }
    }

    /// Pure insertion at `offset`, verified against the text of the line
    /// that follows it. The anchor text is re-emitted after the insertion so
    /// the edit fails loudly if the anchor moved since it was located.
    pub fn insert_before(
        file: impl Into<PathBuf>,
        offset: usize,
        anchor_text: &str,
        inserted: &str,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start: offset,
            byte_end: offset + anchor_text.len(),
            new_text: format!("{inserted}{anchor_text}"),
            expected_before: EditVerification::from_text(anchor_text),
        }
    }

    /// Insert `inserted` (no trailing terminator) as new lines after the line
    /// `line_text` starting at `offset`. A line without terminator (end of
    /// file) stays without one.
    pub fn insert_after(
        file: impl Into<PathBuf>,
        offset: usize,
        line_text: &str,
        inserted: &str,
        eol: &str,
    ) -> Self {
        let new_text = if line_text.ends_with('\n') {
            format!("{line_text}{inserted}{eol}")
        } else {
            format!("{line_text}{eol}{inserted}")
        };
        Self {
            file: file.into(),
            byte_start: offset,
            byte_end: offset + line_text.len(),
            new_text,
            expected_before: EditVerification::from_text(line_text),
        }
    }

    /// Validate the edit against the given content.
    fn validate(&self, content: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }

        let current = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::InvalidUtf8Edit)?;

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current.to_string(),
            });
        }

        Ok(())
    }

    /// Apply this edit to `content`, returning the new content.
    pub fn apply_to(&self, content: &str) -> Result<String, EditError> {
        splice(content, std::slice::from_ref(self))
    }
}

/// Apply several non-overlapping edits to the same content.
///
/// Every edit is validated against the original content first; edits are
/// then spliced bottom-to-top so earlier offsets stay valid.
pub fn splice(content: &str, edits: &[Edit]) -> Result<String, EditError> {
    for edit in edits {
        edit.validate(content)?;
    }

    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

    // Sorted descending: for each pair, the earlier edit must end before the later starts
    for window in ordered.windows(2) {
        let (later, earlier) = (window[0], window[1]);
        if earlier.byte_end > later.byte_start {
            return Err(EditError::Overlap {
                file: later.file.clone(),
                byte_start: later.byte_start,
            });
        }
    }

    let mut updated = content.to_string();
    for edit in ordered {
        updated.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("hello world".to_string());
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = "hello world";
        let verify = EditVerification::Hash(xxh3_64(text.as_bytes()));
        assert!(verify.matches(text));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        assert!(matches!(
            EditVerification::from_text(&text),
            EditVerification::Hash(_)
        ));
        assert!(matches!(
            EditVerification::from_text("small"),
            EditVerification::ExactMatch(_)
        ));
    }

    #[test]
    fn test_edit_invalid_range() {
        let edit = Edit::new("test.php", 5, 20, "replacement", "");
        let result = edit.apply_to("hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_before_text_mismatch() {
        let edit = Edit::new("test.php", 0, 5, "HELLO", "howdy");
        let result = edit.apply_to("hello world");
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_insert_before_keeps_anchor() {
        let content = "a\n);\n";
        let edit = Edit::insert_before("k.php", 2, ");\n", "b\n");
        assert_eq!(edit.apply_to(content).unwrap(), "a\nb\n);\n");
    }

    #[test]
    fn test_insert_after_preserves_final_newline_state() {
        let edit = Edit::insert_after("c.yml", 0, "a\n", "b", "\n");
        assert_eq!(edit.apply_to("a\nz\n").unwrap(), "a\nb\nz\n");

        let edit = Edit::insert_after("c.yml", 2, "z", "b", "\r\n");
        assert_eq!(edit.apply_to("a\nz").unwrap(), "a\nz\r\nb");
    }

    #[test]
    fn test_splice_multiple_edits() {
        let content = "line1\nline2\nline3\n";
        let edits = vec![
            Edit::new("t", 0, 5, "LINE1", "line1"),
            Edit::new("t", 12, 17, "LINE3", "line3"),
            Edit::new("t", 6, 11, "LINE2", "line2"),
        ];
        assert_eq!(splice(content, &edits).unwrap(), "LINE1\nLINE2\nLINE3\n");
    }

    #[test]
    fn test_splice_rejects_overlap() {
        let content = "abcdef";
        let edits = vec![
            Edit::new("t", 0, 4, "x", "abcd"),
            Edit::new("t", 2, 6, "y", "cdef"),
        ];
        assert!(matches!(
            splice(content, &edits),
            Err(EditError::Overlap { .. })
        ));
    }
}

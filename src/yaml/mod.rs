//! Line-oriented view of a YAML configuration file.
//!
//! Only what registration needs: the top-level keys with their line spans,
//! and the items of a block sequence. Everything else is carried verbatim.

pub mod errors;
pub mod outline;

pub use errors::YamlError;
pub use outline::{sequence_items, strip_comment, Entry, Outline, SequenceItem};

use crate::target::{indentation, strip_eol};

/// Indentation used by the first nested line of the file, if any.
pub fn detect_indent(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .map(|line| strip_eol(line))
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(indentation)
        .find(|indent| !indent.is_empty() && !indent.contains('\t'))
        .map(str::to_string)
}

/// Quote `value` as a YAML scalar with `quote` (`"` or `'`).
pub fn quoted(value: &str, quote: char) -> String {
    if quote == '\'' {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_indent() {
        let lines: Vec<&str> = "a:\n  # comment\n  b: 1\n".split_inclusive('\n').collect();
        assert_eq!(detect_indent(&lines).as_deref(), Some("  "));
        assert_eq!(detect_indent(&["a: 1\n"]), None);
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted("@A/b.yml", '"'), "\"@A/b.yml\"");
        assert_eq!(quoted("it's", '\''), "'it''s'");
    }
}

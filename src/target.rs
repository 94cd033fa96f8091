use std::fmt;
use std::path::{Path, PathBuf};

/// Broad family of a target file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// Procedural source code (PHP bootstrap files)
    ProceduralSource,
    /// Hierarchical markup (XML)
    Markup,
    /// Key-ordered structured configuration
    StructuredConfig(ConfigSyntax),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSyntax {
    Yaml,
    Toml,
}

impl TargetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "php" => Some(TargetFormat::ProceduralSource),
            "xml" => Some(TargetFormat::Markup),
            "yml" | "yaml" => Some(TargetFormat::StructuredConfig(ConfigSyntax::Yaml)),
            "toml" => Some(TargetFormat::StructuredConfig(ConfigSyntax::Toml)),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::ProceduralSource => write!(f, "procedural source"),
            TargetFormat::Markup => write!(f, "markup"),
            TargetFormat::StructuredConfig(ConfigSyntax::Yaml) => write!(f, "YAML"),
            TargetFormat::StructuredConfig(ConfigSyntax::Toml) => write!(f, "TOML"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Dominant line ending of `content`; LF when there are no line breaks.
    pub fn detect(content: &str) -> Self {
        let total = content.matches('\n').count();
        let crlf = content.matches("\r\n").count();
        if total > 0 && crlf * 2 > total {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Convert a `\n`-separated fragment to this line ending.
    pub fn apply(self, fragment: &str) -> String {
        match self {
            LineEnding::Lf => fragment.to_string(),
            LineEnding::CrLf => fragment.replace("\r\n", "\n").replace('\n', "\r\n"),
        }
    }
}

/// A file read in full before any decision is made about it.
#[derive(Debug, Clone)]
pub struct TargetFile {
    pub path: PathBuf,
    pub content: String,
    pub line_ending: LineEnding,
}

impl TargetFile {
    pub fn new(path: impl Into<PathBuf>, content: String) -> Self {
        let line_ending = LineEnding::detect(&content);
        Self {
            path: path.into(),
            content,
            line_ending,
        }
    }

    /// Lines including their terminators.
    pub fn lines(&self) -> Vec<&str> {
        self.content.split_inclusive('\n').collect()
    }

    /// Byte offset where each line starts.
    pub fn line_starts(&self) -> Vec<usize> {
        line_starts(&self.content)
    }
}

pub fn line_starts(content: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in content.bytes().enumerate() {
        if byte == b'\n' && idx + 1 < content.len() {
            starts.push(idx + 1);
        }
    }
    starts
}

/// Leading whitespace of a line.
pub fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// Strip the line terminator (`\n` or `\r\n`).
pub fn strip_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Text needed before an appended block so that it starts on a fresh line
/// separated from the previous content by one blank line.
pub fn block_separator(content: &str, ending: LineEnding) -> String {
    let eol = ending.as_str();
    if content.trim().is_empty() {
        String::new()
    } else if content.ends_with(&format!("{eol}{eol}")) || content.ends_with("\n\n") {
        String::new()
    } else if content.ends_with('\n') {
        eol.to_string()
    } else {
        format!("{eol}{eol}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            TargetFormat::from_path(Path::new("app/AppKernel.php")),
            Some(TargetFormat::ProceduralSource)
        );
        assert_eq!(
            TargetFormat::from_path(Path::new("routing.YAML")),
            Some(TargetFormat::StructuredConfig(ConfigSyntax::Yaml))
        );
        assert_eq!(TargetFormat::from_path(Path::new("routing")), None);
    }

    #[test]
    fn detect_line_endings() {
        assert_eq!(LineEnding::detect("a\r\nb\r\n"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\nb\n"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("no newline"), LineEnding::Lf);
        assert_eq!(LineEnding::CrLf.apply("a\nb\n"), "a\r\nb\r\n");
    }

    #[test]
    fn line_starts_ignore_trailing_newline() {
        assert_eq!(line_starts("a\nbc\n"), vec![0, 2]);
        assert_eq!(line_starts("a\nbc"), vec![0, 2]);
    }

    #[test]
    fn separators() {
        assert_eq!(block_separator("", LineEnding::Lf), "");
        assert_eq!(block_separator("a: 1\n", LineEnding::Lf), "\n");
        assert_eq!(block_separator("a: 1\n\n", LineEnding::Lf), "");
        assert_eq!(block_separator("a: 1", LineEnding::Lf), "\n\n");
    }

    #[test]
    fn indentation_and_eol() {
        assert_eq!(indentation("\t  new Foo(),\n"), "\t  ");
        assert_eq!(strip_eol("x\r\n"), "x");
    }
}

use crate::toml::errors::TomlError;
use std::fmt;

/// Dotted table path as written in a header, quotes resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionPath {
    parts: Vec<String>,
}

impl SectionPath {
    pub fn parse(input: &str) -> Result<Self, TomlError> {
        let parts = parse_dotted_path(input)?;
        if parts.is_empty() {
            return Err(TomlError::InvalidSectionPath {
                input: input.to_string(),
                message: "empty section path".to_string(),
            });
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// First segment: the top-level key the section belongs to.
    pub fn root(&self) -> &str {
        &self.parts[0]
    }

    pub fn as_string(&self) -> String {
        self.parts.join(".")
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Byte spans of one `[table]` or `[[array]]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub path: SectionPath,
    /// Written as `[[path]]`
    pub array: bool,
    pub header_start: usize,
    pub body_start: usize,
    /// Start of the next header, or the end of the content
    pub body_end: usize,
}

/// Headers in file order. Content before the first header (root keys) is
/// not a section. Lines inside multi-line strings and arrays are values,
/// never headers.
pub fn scan_sections(content: &str) -> Result<Vec<SectionSpan>, TomlError> {
    let mut sections: Vec<SectionSpan> = Vec::new();
    let mut state = ValueState::default();
    let mut offset = 0usize;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        let line_end = offset + line.len();
        offset = line_end;

        let trimmed = line.trim_start();
        if !state.is_open() && trimmed.starts_with('[') {
            let header_start = line_start + (line.len() - trimmed.len());
            let (path, array) = parse_header(trimmed)?;

            if let Some(previous) = sections.last_mut() {
                previous.body_end = header_start;
            }
            sections.push(SectionSpan {
                path,
                array,
                header_start,
                body_start: line_end,
                body_end: content.len(),
            });
            continue;
        }

        state.feed(line.as_bytes());
    }

    Ok(sections)
}

/// Open multi-line constructs carried from one line to the next.
#[derive(Debug, Default)]
struct ValueState {
    /// Inside `"""` or `'''`
    string: Option<&'static [u8]>,
    /// Unclosed `[` and `{` in values
    depth: usize,
}

impl ValueState {
    fn is_open(&self) -> bool {
        self.string.is_some() || self.depth > 0
    }

    fn feed(&mut self, line: &[u8]) {
        let mut idx = 0;
        while idx < line.len() {
            if let Some(delim) = self.string {
                match find_close(line, idx, delim) {
                    Some(end) => {
                        self.string = None;
                        idx = end;
                    }
                    None => return,
                }
                continue;
            }

            match line[idx] {
                b'#' => return,
                quote @ (b'"' | b'\'') => {
                    let triple: &'static [u8] = if quote == b'"' { b"\"\"\"" } else { b"'''" };
                    if line[idx..].starts_with(triple) {
                        self.string = Some(triple);
                        idx += 3;
                    } else {
                        idx = find_close(line, idx + 1, &line[idx..=idx]).unwrap_or(line.len());
                    }
                }
                b'[' | b'{' => {
                    self.depth += 1;
                    idx += 1;
                }
                b']' | b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    idx += 1;
                }
                _ => idx += 1,
            }
        }
    }
}

/// Index just past the first `delim` at or after `from`, skipping escapes
/// in basic strings. Up to two extra quotes belong to a multi-line string.
fn find_close(line: &[u8], from: usize, delim: &[u8]) -> Option<usize> {
    let escapes = delim[0] == b'"';
    let mut idx = from;
    while idx < line.len() {
        if escapes && line[idx] == b'\\' {
            idx += 2;
            continue;
        }
        if line[idx..].starts_with(delim) {
            let mut end = idx + delim.len();
            if delim.len() == 3 {
                let mut extra = 0;
                while extra < 2 && line.get(end) == Some(&delim[0]) {
                    end += 1;
                    extra += 1;
                }
            }
            return Some(end);
        }
        idx += 1;
    }
    None
}

fn parse_header(line: &str) -> Result<(SectionPath, bool), TomlError> {
    let trimmed = crate::target::strip_eol(line).trim();
    let (open_len, close_seq, array) = if trimmed.starts_with("[[") {
        (2, "]]", true)
    } else {
        (1, "]", false)
    };

    let close_pos = trimmed
        .find(close_seq)
        .filter(|&pos| pos >= open_len)
        .ok_or_else(|| TomlError::InvalidTomlSyntax {
            message: format!("unterminated section header: {trimmed}"),
        })?;

    let path = SectionPath::parse(trimmed[open_len..close_pos].trim())?;
    Ok((path, array))
}

fn parse_dotted_path(input: &str) -> Result<Vec<String>, TomlError> {
    let invalid = |message: &str| TomlError::InvalidSectionPath {
        input: input.to_string(),
        message: message.to_string(),
    };

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            match ch {
                _ if ch == q => quote = None,
                '\\' if q == '"' => {
                    if let Some(next) = chars.next() {
                        current.push(match next {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                }
                _ => current.push(ch),
            }
            continue;
        }

        match ch {
            '.' => {
                if current.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                parts.push(std::mem::take(&mut current));
                // Whitespace is allowed around the dot
                while chars.as_str().starts_with([' ', '\t']) {
                    chars.next();
                }
            }
            '"' | '\'' if current.is_empty() => quote = Some(ch),
            ' ' | '\t' => {
                if !chars.as_str().trim_start().starts_with('.') && !chars.as_str().trim().is_empty() {
                    return Err(invalid("whitespace not allowed in key"));
                }
            }
            other => current.push(other),
        }
    }

    if quote.is_some() {
        return Err(invalid("unterminated quoted key"));
    }
    if !current.is_empty() {
        parts.push(current);
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_paths() {
        assert_eq!(SectionPath::parse("imports").unwrap().parts(), &["imports"]);
        assert_eq!(
            SectionPath::parse("a . \"b.c\"").unwrap().parts(),
            &["a", "b.c"]
        );
        assert!(SectionPath::parse("a b").is_err());
        assert!(SectionPath::parse("'open").is_err());
    }

    #[test]
    fn test_scan_sections() {
        let content = "title = \"app\"\n\n[[imports]]\nresource = \"a.toml\"\n\n[framework]\nsecret = \"x\"\n";
        let sections = scan_sections(content).unwrap();
        assert_eq!(sections.len(), 2);

        let imports = &sections[0];
        assert!(imports.array);
        assert_eq!(imports.path.root(), "imports");
        assert_eq!(
            &content[imports.body_start..imports.body_end],
            "resource = \"a.toml\"\n\n"
        );
        assert!(!sections[1].array);
        assert_eq!(sections[1].body_end, content.len());
    }

    #[test]
    fn test_brackets_inside_values_are_not_headers() {
        let content = "[app]\nnote = \"\"\"\n[not a header\n\"\"\"\nlit = '''\n[[nor this]]\n'''\nmatrix = [\n  [\"a\"],\n  [\"b\"], # [x\n]\n\n[next]\n";
        let sections = scan_sections(content).unwrap();
        let paths: Vec<String> = sections.iter().map(|s| s.path.as_string()).collect();
        assert_eq!(paths, vec!["app", "next"]);
        assert!(content[sections[0].body_start..sections[0].body_end].ends_with("]\n\n"));
    }

    #[test]
    fn test_quotes_in_strings_do_not_open_values() {
        let content = "[a]\nx = \"[\\\"{\"\ny = '['\nz = \"\"\"ends\"\"\"\"\n[b]\n";
        let sections = scan_sections(content).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].path.root(), "b");
    }

    #[test]
    fn test_unterminated_header() {
        assert!(matches!(
            scan_sections("[imports\n"),
            Err(TomlError::InvalidTomlSyntax { .. })
        ));
    }
}

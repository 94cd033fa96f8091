use crate::target::{indentation, strip_eol};
use crate::yaml::errors::YamlError;
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// A top-level mapping entry and the lines it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// Line index of the `key:` line
    pub line: usize,
    /// Line index of the next top-level entry, or the line count
    pub end: usize,
    /// Value written on the key line, comment stripped; empty for block values
    pub inline_value: String,
}

impl Entry {
    /// Lines belonging to the entry's value, key line excluded.
    pub fn body(&self) -> Range<usize> {
        self.line + 1..self.end
    }

    /// Last line of the entry that is neither blank nor a comment.
    pub fn last_content_line(&self, lines: &[&str]) -> usize {
        self.body()
            .rev()
            .find(|&idx| is_content(lines[idx]))
            .unwrap_or(self.line)
    }
}

/// The top-level keys of a YAML document, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    entries: Vec<Entry>,
}

impl Outline {
    pub fn parse(lines: &[&str]) -> Result<Self, YamlError> {
        let mut entries: Vec<Entry> = Vec::new();

        for (idx, raw) in lines.iter().enumerate() {
            let line = strip_eol(raw);
            if !is_content(line) {
                continue;
            }
            let number = idx + 1;

            if line == "---" || line.starts_with("--- ") {
                if !entries.is_empty() {
                    return Err(YamlError::MultipleDocuments { line: number });
                }
                continue;
            }
            if line == "..." || line.starts_with('%') {
                continue;
            }

            let indent = indentation(line);
            if indent.contains('\t') {
                return Err(YamlError::TabIndentation { line: number });
            }
            if !indent.is_empty() || is_sequence_item(line) {
                // Continuation of the current entry's value
                if entries.is_empty() {
                    return Err(YamlError::UnexpectedContent { line: number });
                }
                continue;
            }

            let (key, value) = parse_key(line, number)?;
            if let Some(previous) = entries.last_mut() {
                previous.end = idx;
            }
            entries.push(Entry {
                key,
                line: idx,
                end: lines.len(),
                inline_value: strip_comment(value).trim().to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }
}

/// One `- ...` item of a block sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceItem {
    /// Line of the dash
    pub line: usize,
    /// Last content line of the item
    pub last_line: usize,
    pub indent: String,
    /// Item written as a flow mapping: `- { resource: ... }`
    pub flow: bool,
    pub resource: Option<String>,
    /// Quote used around the resource, if any
    pub quote: Option<char>,
}

/// Items of the block sequence that forms `entry`'s value.
///
/// `None` when the body holds anything other than sequence items.
pub fn sequence_items(lines: &[&str], entry: &Entry) -> Option<Vec<SequenceItem>> {
    let mut items: Vec<SequenceItem> = Vec::new();
    let mut item_indent: Option<&str> = None;

    for idx in entry.body() {
        let line = strip_eol(lines[idx]);
        if !is_content(line) {
            continue;
        }
        let indent = indentation(line);
        let trimmed = &line[indent.len()..];
        let starts_item = is_sequence_item(trimmed);

        match item_indent {
            None if starts_item => item_indent = Some(indent),
            None => return None,
            Some(current) if starts_item && indent == current => {}
            Some(current) if indent.len() > current.len() => {
                if let Some(last) = items.last_mut() {
                    last.last_line = idx;
                }
                continue;
            }
            Some(_) => return None,
        }

        items.push(SequenceItem {
            line: idx,
            last_line: idx,
            indent: indent.to_string(),
            flow: trimmed[1..].trim_start().starts_with('{'),
            resource: None,
            quote: None,
        });
    }

    for item in &mut items {
        let text: String = lines[item.line..=item.last_line].concat();
        if let Some(caps) = resource_pattern().captures(&text) {
            let (value, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(v), _, _) => (v.as_str(), Some('"')),
                (_, Some(v), _) => (v.as_str(), Some('\'')),
                (_, _, Some(v)) => (v.as_str(), None),
                _ => continue,
            };
            item.resource = Some(value.to_string());
            item.quote = quote;
        }
    }

    Some(items)
}

fn resource_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:^|[\s{,-])resource\s*:\s*(?:"([^"]*)"|'([^']*)'|([^\s,}#]+))"#)
            .expect("resource pattern is valid")
    })
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn is_sequence_item(line: &str) -> bool {
    let line = strip_eol(line);
    line == "-" || line.starts_with("- ") || line.starts_with("-\t")
}

/// Split `key: value` at the mapping colon.
fn parse_key(line: &str, number: usize) -> Result<(String, &str), YamlError> {
    let unexpected = YamlError::UnexpectedContent { line: number };

    let (key, rest) = match line.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let close =
                closing_quote(line, quote).ok_or(YamlError::UnterminatedKey { line: number })?;
            let raw = &line[1..close];
            let key = if quote == '"' {
                raw.replace("\\\"", "\"").replace("\\\\", "\\")
            } else {
                raw.replace("''", "'")
            };
            (key, line[close + 1..].trim_start())
        }
        Some('{' | '[' | '?' | '|' | '>') => return Err(unexpected),
        _ => {
            let colon = plain_key_end(line).ok_or_else(|| unexpected.clone())?;
            (line[..colon].trim_end().to_string(), &line[colon..])
        }
    };

    match rest.strip_prefix(':') {
        Some(value) if value.is_empty() || value.starts_with([' ', '\t']) => Ok((key, value)),
        _ => Err(unexpected),
    }
}

/// Byte index of the colon ending a plain key.
fn plain_key_end(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        match byte {
            b':' if matches!(bytes.get(idx + 1), None | Some(b' ') | Some(b'\t')) => {
                return Some(idx)
            }
            b'#' if idx > 0 && matches!(bytes[idx - 1], b' ' | b'\t') => return None,
            _ => {}
        }
    }
    None
}

fn closing_quote(line: &str, quote: char) -> Option<usize> {
    let mut chars = line.char_indices().skip(1).peekable();
    while let Some((idx, ch)) = chars.next() {
        if quote == '"' && ch == '\\' {
            chars.next();
        } else if ch == quote {
            if quote == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                continue;
            }
            return Some(idx);
        }
    }
    None
}

/// Drop a trailing `# comment`, ignoring `#` inside quotes.
pub fn strip_comment(value: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut previous = ' ';
    for (idx, ch) in value.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '#' && previous.is_whitespace() => return &value[..idx],
            None => {}
        }
        previous = ch;
    }
    value
}

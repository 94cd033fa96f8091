use crate::locate::errors::LocateError;
use crate::target::TargetFormat;

/// A line comment opener, optionally disqualified by the next character
/// (PHP `#[` starts an attribute, not a comment).
#[derive(Debug, Clone, Copy)]
pub struct LineComment {
    pub open: &'static str,
    pub unless_followed_by: Option<char>,
}

/// Tags that leave and re-enter code, with plain text in between
/// (PHP `?>` ... `<?php`).
#[derive(Debug, Clone, Copy)]
pub struct InlineText {
    pub close: &'static str,
    pub reopen: &'static [&'static str],
}

/// Lexical rules needed to tell code from literals in a target format.
///
/// This is not a grammar: it only knows which character sequences open and
/// close comments and strings, and which bracket pairs nest.
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub name: &'static str,
    pub line_comments: &'static [LineComment],
    pub block_comments: &'static [(&'static str, &'static str)],
    pub quotes: &'static [char],
    pub escape: Option<char>,
    pub heredoc: bool,
    pub inline_text: Option<InlineText>,
    pub pairs: &'static [(char, char)],
}

impl Syntax {
    pub const PHP: Syntax = Syntax {
        name: "php",
        line_comments: &[
            LineComment {
                open: "//",
                unless_followed_by: None,
            },
            LineComment {
                open: "#",
                unless_followed_by: Some('['),
            },
        ],
        block_comments: &[("/*", "*/")],
        quotes: &['"', '\'', '`'],
        escape: Some('\\'),
        heredoc: true,
        inline_text: Some(InlineText {
            close: "?>",
            reopen: &["<?php", "<?="],
        }),
        pairs: &[('(', ')'), ('[', ']'), ('{', '}')],
    };

    /// XML-like markup. Quotes are deliberately not literals here: text
    /// nodes may contain apostrophes.
    pub const MARKUP: Syntax = Syntax {
        name: "markup",
        line_comments: &[],
        block_comments: &[("<!--", "-->"), ("<![CDATA[", "]]>")],
        quotes: &[],
        escape: None,
        heredoc: false,
        inline_text: None,
        pairs: &[],
    };

    pub fn for_format(format: TargetFormat) -> Option<&'static Syntax> {
        match format {
            TargetFormat::ProceduralSource => Some(&Syntax::PHP),
            TargetFormat::Markup => Some(&Syntax::MARKUP),
            TargetFormat::StructuredConfig(_) => None,
        }
    }

    pub fn closer_for(&self, open: char) -> Option<char> {
        self.pairs
            .iter()
            .find(|(o, _)| *o == open)
            .map(|(_, close)| *close)
    }

    pub fn is_closer(&self, ch: char) -> bool {
        self.pairs.iter().any(|(_, close)| *close == ch)
    }
}

/// What a byte of source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Code,
    /// String literal or heredoc, delimiters included
    Literal,
    Comment,
    /// Outside the code tags
    Text,
}

/// Per-byte classification of a source into [`Region`]s.
#[derive(Debug, Clone)]
pub struct CodeMask {
    regions: Vec<Region>,
}

impl CodeMask {
    pub fn scan(source: &str, syntax: &Syntax) -> Result<Self, LocateError> {
        let len = source.len();
        let mut regions = vec![Region::Code; len];
        let mut i = 0;

        while i < len {
            let rest = &source[i..];

            if let Some((open, close)) = syntax
                .block_comments
                .iter()
                .find(|(open, _)| rest.starts_with(open))
            {
                let body = i + open.len();
                let end = source[body..]
                    .find(close)
                    .map(|rel| body + rel + close.len())
                    .ok_or_else(|| LocateError::UnterminatedLiteral {
                        kind: "comment",
                        line: line_number(source, i),
                    })?;
                regions[i..end].fill(Region::Comment);
                i = end;
                continue;
            }

            if let Some(comment) = syntax.line_comments.iter().find(|c| {
                rest.starts_with(c.open)
                    && match c.unless_followed_by {
                        Some(ch) => !rest[c.open.len()..].starts_with(ch),
                        None => true,
                    }
            }) {
                let body = &rest[comment.open.len()..];
                let mut rel = body.find('\n').unwrap_or(body.len());
                // A closing tag ends the comment too
                if let Some(inline) = &syntax.inline_text {
                    if let Some(tag) = body[..rel].find(inline.close) {
                        rel = tag;
                    }
                }
                let end = i + comment.open.len() + rel;
                regions[i..end].fill(Region::Comment);
                i = end;
                continue;
            }

            if let Some(inline) = syntax.inline_text.filter(|t| rest.starts_with(t.close)) {
                let end = inline_text_end(source, i + inline.close.len(), inline.reopen);
                regions[i..end].fill(Region::Text);
                i = end;
                continue;
            }

            if syntax.heredoc && rest.starts_with("<<<") {
                if let Some(end) = heredoc_end(source, i)? {
                    regions[i..end].fill(Region::Literal);
                    i = end;
                    continue;
                }
            }

            let Some(ch) = rest.chars().next() else {
                break;
            };

            if syntax.quotes.contains(&ch) {
                let end = string_end(source, i, ch, syntax.escape).ok_or_else(|| {
                    LocateError::UnterminatedLiteral {
                        kind: "string",
                        line: line_number(source, i),
                    }
                })?;
                regions[i..end].fill(Region::Literal);
                i = end;
                continue;
            }

            i += ch.len_utf8();
        }

        Ok(Self { regions })
    }

    pub fn is_code(&self, offset: usize) -> bool {
        self.region(offset) == Some(Region::Code)
    }

    pub fn region(&self, offset: usize) -> Option<Region> {
        self.regions.get(offset).copied()
    }
}

/// End offset (exclusive) of the string literal opened by `quote` at `start`.
fn string_end(source: &str, start: usize, quote: char, escape: Option<char>) -> Option<usize> {
    let body = start + quote.len_utf8();
    let mut chars = source[body..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        if Some(ch) == escape {
            chars.next();
            continue;
        }
        if ch == quote {
            return Some(body + offset + ch.len_utf8());
        }
    }
    None
}

/// End offset (exclusive) of the first reopening tag at or after `from`,
/// or the end of the source.
fn inline_text_end(source: &str, from: usize, reopen: &[&str]) -> usize {
    reopen
        .iter()
        .filter_map(|tag| source[from..].find(tag).map(|rel| from + rel + tag.len()))
        .min()
        .unwrap_or(source.len())
}

/// End offset (exclusive) of a heredoc/nowdoc opened at `start`, or `None`
/// when `<<<` is not followed by a label.
fn heredoc_end(source: &str, start: usize) -> Result<Option<usize>, LocateError> {
    let header = &source[start + 3..];
    let header = header.trim_start_matches([' ', '\t']);
    let header = header.trim_start_matches(['"', '\'']);
    let label: String = header
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if label.is_empty() || label.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(None);
    }

    let Some(first_break) = source[start..].find('\n') else {
        return Err(LocateError::UnterminatedLiteral {
            kind: "heredoc",
            line: line_number(source, start),
        });
    };

    let mut offset = start + first_break + 1;
    for line in source[offset..].split_inclusive('\n') {
        let trimmed = line.trim_start_matches([' ', '\t']);
        if let Some(after) = trimmed.strip_prefix(label.as_str()) {
            let terminated = !after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_');
            if terminated {
                let indent = line.len() - trimmed.len();
                return Ok(Some(offset + indent + label.len()));
            }
        }
        offset += line.len();
    }

    Err(LocateError::UnterminatedLiteral {
        kind: "heredoc",
        line: line_number(source, start),
    })
}

/// 1-based line number of a byte offset.
pub(crate) fn line_number(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_text(source: &str, syntax: &Syntax) -> String {
        let mask = CodeMask::scan(source, syntax).unwrap();
        source
            .char_indices()
            .filter(|(idx, _)| mask.is_code(*idx))
            .map(|(_, ch)| ch)
            .collect()
    }

    #[test]
    fn strings_and_comments_are_masked() {
        let source = "a('}' , \"{\\\"\"); // )\nb /* ] */ c # [\nd";
        assert_eq!(code_text(source, &Syntax::PHP), "a( , ); \nb  c \nd");
    }

    #[test]
    fn php_attribute_is_code() {
        assert_eq!(code_text("#[Route('/')]\n", &Syntax::PHP), "#[Route()]\n");
    }

    #[test]
    fn heredoc_is_masked() {
        let source = "$x = <<<EOT\n  ) ] }\nEOT;\n$y = [];\n";
        assert_eq!(code_text(source, &Syntax::PHP), "$x = ;\n$y = [];\n");
    }

    #[test]
    fn nowdoc_and_indented_closer() {
        let source = "f(<<<'SQL'\n    SELECT (\n    SQL);\n";
        assert_eq!(code_text(source, &Syntax::PHP), "f();\n");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let err = CodeMask::scan("$a = [\n'oops\n", &Syntax::PHP).unwrap_err();
        assert!(matches!(
            err,
            LocateError::UnterminatedLiteral {
                kind: "string",
                line: 2
            }
        ));
    }

    #[test]
    fn text_after_closing_tag_is_masked() {
        let source = "<?php\n$a = [];\n?>\nDon't edit (below\n";
        assert_eq!(code_text(source, &Syntax::PHP), "<?php\n$a = [];\n");
    }

    #[test]
    fn code_resumes_after_opening_tag() {
        let source = "f(\n?><p>It's [</p><?php\n); // done ?> x's\n";
        assert_eq!(code_text(source, &Syntax::PHP), "f(\n\n); ");
    }

    #[test]
    fn regions_tell_comments_from_literals() {
        let source = "$a = 'x'; // y\n";
        let mask = CodeMask::scan(source, &Syntax::PHP).unwrap();
        assert_eq!(mask.region(0), Some(Region::Code));
        assert_eq!(mask.region(6), Some(Region::Literal));
        assert_eq!(mask.region(13), Some(Region::Comment));
        assert_eq!(mask.region(source.len()), None);
    }

    #[test]
    fn markup_comments_are_masked() {
        let source = "<a>\n<!-- </a> -->\n</a>\n";
        assert_eq!(code_text(source, &Syntax::MARKUP), "<a>\n\n</a>\n");
    }
}

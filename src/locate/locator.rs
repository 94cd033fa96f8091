use crate::locate::errors::LocateError;
use crate::locate::syntax::{line_number, CodeMask, Syntax};
use crate::target::line_starts;
use regex::Regex;
use std::fmt;
use std::ops::Range;

/// Where new content must go, described by the structure that encloses it.
#[derive(Debug, Clone)]
pub enum Anchor {
    /// A delimited collection whose opening marker ends at (or is followed
    /// by) its opening delimiter. With a `scope`, the opener is only searched
    /// inside the `{ ... }` body of the first block introduced by `scope`.
    Collection {
        scope: Option<Regex>,
        opener: Regex,
    },
    /// The body of the first `<name ...>` element.
    Element { name: String },
}

impl Anchor {
    pub fn collection(opener: Regex) -> Self {
        Anchor::Collection {
            scope: None,
            opener,
        }
    }

    pub fn scoped_collection(scope: Regex, opener: Regex) -> Self {
        Anchor::Collection {
            scope: Some(scope),
            opener,
        }
    }

    pub fn element(name: impl Into<String>) -> Self {
        Anchor::Element { name: name.into() }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Collection {
                scope: Some(scope),
                opener,
            } => write!(f, "collection /{opener}/ inside /{scope}/"),
            Anchor::Collection {
                scope: None,
                opener,
            } => write!(f, "collection /{opener}/"),
            Anchor::Element { name } => write!(f, "<{name}> element"),
        }
    }
}

/// A location in the source: byte offset plus 0-based line index and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// A located block: its opening and closing delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub open: Position,
    pub close: Position,
}

impl Block {
    /// Line index before which a new entry goes.
    pub fn insertion_line(&self) -> usize {
        self.close.line
    }

    pub fn is_single_line(&self) -> bool {
        self.open.line == self.close.line
    }
}

/// Locate `anchor` in a file given as lines (terminators included).
///
/// Pure function over text: no I/O, no fallback positions.
pub fn locate(lines: &[&str], syntax: &Syntax, anchor: &Anchor) -> Result<Block, LocateError> {
    let source = lines.concat();
    Locator::new(&source, syntax)?.locate(anchor)
}

/// Anchor search over one source with its code mask computed once.
pub struct Locator<'a> {
    source: &'a str,
    syntax: &'a Syntax,
    mask: CodeMask,
    line_starts: Vec<usize>,
}

impl<'a> Locator<'a> {
    pub fn new(source: &'a str, syntax: &'a Syntax) -> Result<Self, LocateError> {
        Ok(Self {
            source,
            syntax,
            mask: CodeMask::scan(source, syntax)?,
            line_starts: line_starts(source),
        })
    }

    pub fn locate(&self, anchor: &Anchor) -> Result<Block, LocateError> {
        match anchor {
            Anchor::Collection { scope, opener } => {
                let range = match scope {
                    Some(scope) => {
                        let marker = self.find_marker(scope, 0..self.source.len()).ok_or_else(
                            || LocateError::MarkerNotFound {
                                marker: scope.as_str().to_string(),
                            },
                        )?;
                        let body = self.block_from(
                            marker.end,
                            Some('{'),
                            self.source.len(),
                            scope.as_str(),
                        )?;
                        body.open.offset + 1..body.close.offset
                    }
                    None => 0..self.source.len(),
                };
                let marker =
                    self.find_marker(opener, range.clone())
                        .ok_or_else(|| LocateError::MarkerNotFound {
                            marker: opener.as_str().to_string(),
                        })?;

                let last = self.source[..marker.end].chars().next_back();
                let from = match last {
                    Some(ch) if self.syntax.closer_for(ch).is_some() => marker.end - ch.len_utf8(),
                    _ => marker.end,
                };
                self.block_from(from, None, range.end, opener.as_str())
            }
            Anchor::Element { name } => self.element(name),
        }
    }

    /// First match of `marker` inside `range` that starts in code.
    pub fn find_marker(&self, marker: &Regex, range: Range<usize>) -> Option<Range<usize>> {
        let haystack = &self.source[range.clone()];
        marker
            .find_iter(haystack)
            .map(|m| range.start + m.start()..range.start + m.end())
            .find(|m| self.mask.is_code(m.start))
    }

    /// Block opened by the first code delimiter in `from..limit`
    /// (restricted to `open` when given).
    fn block_from(
        &self,
        from: usize,
        open: Option<char>,
        limit: usize,
        marker: &str,
    ) -> Result<Block, LocateError> {
        let start = self.source[from..limit]
            .char_indices()
            .map(|(idx, ch)| (from + idx, ch))
            .find(|(idx, ch)| {
                self.mask.is_code(*idx)
                    && match open {
                        Some(open) => *ch == open,
                        None => self.syntax.closer_for(*ch).is_some(),
                    }
            });

        let (open_offset, _) = start.ok_or_else(|| LocateError::NoDelimiter {
            marker: marker.to_string(),
        })?;
        let close_offset = self.matching_close(open_offset)?;

        Ok(Block {
            open: self.position(open_offset),
            close: self.position(close_offset),
        })
    }

    /// Offset of the delimiter closing the one at `open`, tracking the depth
    /// of every bracket pair and ignoring literals.
    pub fn matching_close(&self, open: usize) -> Result<usize, LocateError> {
        let open_char = self.source[open..].chars().next().unwrap_or_default();
        let Some(closer) = self.syntax.closer_for(open_char) else {
            return Err(LocateError::NoDelimiter {
                marker: open_char.to_string(),
            });
        };

        let mut expected = vec![closer];
        let body = open + open_char.len_utf8();
        for (idx, ch) in self.source[body..].char_indices() {
            let offset = body + idx;
            if !self.mask.is_code(offset) {
                continue;
            }
            if let Some(close) = self.syntax.closer_for(ch) {
                expected.push(close);
                continue;
            }
            if self.syntax.is_closer(ch) {
                match expected.pop() {
                    Some(want) if want == ch => {
                        if expected.is_empty() {
                            return Ok(offset);
                        }
                    }
                    Some(want) => {
                        return Err(LocateError::Mismatched {
                            expected: want,
                            found: ch,
                            line: line_number(self.source, offset),
                        })
                    }
                    None => break,
                }
            }
        }

        Err(LocateError::Unterminated {
            delimiter: open_char,
            line: line_number(self.source, open),
        })
    }

    /// Body of the first `<name>` element, counting nested same-name elements.
    fn element(&self, name: &str) -> Result<Block, LocateError> {
        let tag = Regex::new(&format!(r"<(/?){}(?:[\s/>])", regex::escape(name)))
            .map_err(|_| LocateError::MarkerNotFound {
                marker: format!("<{name}>"),
            })?;

        let mut depth = 0usize;
        let mut open_at = None;
        for m in tag.find_iter(self.source) {
            if !self.mask.is_code(m.start()) {
                continue;
            }
            let closing = self.source[m.start()..].starts_with("</");
            if closing {
                match depth {
                    0 => {
                        return Err(LocateError::Mismatched {
                            expected: '<',
                            found: '/',
                            line: line_number(self.source, m.start()),
                        })
                    }
                    1 => {
                        if let Some(open) = open_at {
                            return Ok(Block {
                                open: self.position(open),
                                close: self.position(m.start()),
                            });
                        }
                    }
                    _ => {}
                }
                depth -= 1;
                continue;
            }

            if self.tag_is_self_closing(m.start()) {
                continue;
            }
            if depth == 0 {
                open_at = Some(m.start());
            }
            depth += 1;
        }

        match open_at {
            Some(open) => Err(LocateError::Unterminated {
                delimiter: '<',
                line: line_number(self.source, open),
            }),
            None => Err(LocateError::MarkerNotFound {
                marker: format!("<{name}>"),
            }),
        }
    }

    fn tag_is_self_closing(&self, start: usize) -> bool {
        self.source[start..]
            .find('>')
            .map(|end| self.source[start..start + end].ends_with('/'))
            .unwrap_or(false)
    }

    pub fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        Position {
            offset,
            line,
            column: offset - self.line_starts[line],
        }
    }

    pub fn is_code(&self, offset: usize) -> bool {
        self.mask.is_code(offset)
    }

    /// Byte range of line `line`, terminator included.
    pub fn line_range(&self, line: usize) -> Range<usize> {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.source.len());
        start..end
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Last non-whitespace code character on `line`.
    pub fn last_code_char(&self, line: usize) -> Option<(usize, char)> {
        let range = self.line_range(line);
        self.source[range.clone()]
            .char_indices()
            .map(|(idx, ch)| (range.start + idx, ch))
            .filter(|(idx, ch)| self.mask.is_code(*idx) && !ch.is_whitespace())
            .last()
    }

    /// Whether `line` holds any code outside comments.
    pub fn line_has_code(&self, line: usize) -> bool {
        self.last_code_char(line).is_some()
    }
}

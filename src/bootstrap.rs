//! Registration of a module in a procedural bootstrap file.
//!
//! The entry is inserted as a new line right before the closing delimiter of
//! the registration collection, indented like its preceding sibling.

use crate::descriptor::BundleDescriptor;
use crate::edit::{splice, Edit};
use crate::fs::{FileSystem, LocalFs};
use crate::locate::{Anchor, Block, CodeMask, LocateError, Locator, Region, Syntax};
use crate::outcome::{Instruction, Outcome, PatchError};
use crate::target::{indentation, strip_eol, TargetFile};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Shape of the registration collection in the bootstrap file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapLayout {
    /// `$bundles = array(...)` or `$bundles = [...]` inside a kernel method.
    KernelMethod { method: String, collection: String },
    /// A file that returns the registration array: `return [...];`
    ReturnedArray,
}

impl Default for BootstrapLayout {
    fn default() -> Self {
        BootstrapLayout::KernelMethod {
            method: "registerBundles".to_string(),
            collection: "$bundles".to_string(),
        }
    }
}

impl BootstrapLayout {
    /// Anchor of the registration collection.
    pub fn anchor(&self) -> Result<Anchor, regex::Error> {
        match self {
            BootstrapLayout::KernelMethod { method, collection } => Ok(Anchor::scoped_collection(
                Regex::new(&format!(r"function\s+{}\s*\(", regex::escape(method)))?,
                Regex::new(&format!(
                    r"{}\s*=\s*(?:array\s*\(|\[)",
                    regex::escape(collection)
                ))?,
            )),
            BootstrapLayout::ReturnedArray => Ok(Anchor::collection(Regex::new(
                r"\breturn\s*(?:array\s*\(|\[)",
            )?)),
        }
    }

    /// The line registering `class_name`.
    pub fn render_entry(&self, class_name: &str) -> String {
        match self {
            BootstrapLayout::KernelMethod { .. } => format!("new {class_name}(),"),
            BootstrapLayout::ReturnedArray => format!("{class_name}::class => ['all' => true],"),
        }
    }

    /// Human description of where entries live, e.g. `AppKernel::registerBundles()`.
    pub fn location(&self, class: Option<&str>) -> String {
        match (self, class) {
            (BootstrapLayout::KernelMethod { method, .. }, Some(class)) => {
                format!("{class}::{method}()")
            }
            (BootstrapLayout::KernelMethod { method, .. }, None) => format!("{method}()"),
            (BootstrapLayout::ReturnedArray, _) => "returned bundles array".to_string(),
        }
    }
}

pub struct BootstrapRegistrationManipulator<F: FileSystem = LocalFs> {
    path: PathBuf,
    layout: BootstrapLayout,
    fs: F,
}

impl BootstrapRegistrationManipulator<LocalFs> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, BootstrapLayout::default(), LocalFs)
    }
}

impl<F: FileSystem> BootstrapRegistrationManipulator<F> {
    pub fn with_fs(path: impl Into<PathBuf>, layout: BootstrapLayout, fs: F) -> Self {
        Self {
            path: path.into(),
            layout,
            fs,
        }
    }

    pub fn with_layout(mut self, layout: BootstrapLayout) -> Self {
        self.layout = layout;
        self
    }

    /// The bootstrap file being patched.
    pub fn filename(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &BootstrapLayout {
        &self.layout
    }

    /// Register `bundle` using the layout's entry shape.
    pub fn register_bundle(&self, bundle: &BundleDescriptor) -> Result<Outcome, PatchError> {
        let class_name = bundle.class_name();
        let fragment = self.layout.render_entry(&class_name);
        self.register(&class_name, &fragment)
    }

    /// Insert `rendered_fragment` into the registration collection unless
    /// `entry_key` already appears in the file's code or strings.
    pub fn register(&self, entry_key: &str, rendered_fragment: &str) -> Result<Outcome, PatchError> {
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| PatchError::io(&self.path, e))?;
        let target = TargetFile::new(&self.path, content);

        if mentions_entry(&target.content, entry_key) {
            debug!(file = %self.path.display(), key = entry_key, "entry already registered");
            return Ok(Outcome::AlreadyPresent {
                file: self.path.clone(),
                key: entry_key.to_string(),
            });
        }

        let instruction = self.instruction(&target.content, rendered_fragment);

        let anchor = match self.layout.anchor() {
            Ok(anchor) => anchor,
            Err(err) => {
                return Ok(Outcome::AnchorNotFound {
                    file: self.path.clone(),
                    reason: err.to_string(),
                    instruction,
                })
            }
        };
        let located = Locator::new(&target.content, &Syntax::PHP)
            .and_then(|locator| locator.locate(&anchor).map(|block| (locator, block)));
        let (locator, block) = match located {
            Ok(found) => found,
            Err(err) => return Ok(self.unlocated(err, instruction)),
        };
        debug!(
            file = %self.path.display(),
            open = block.open.line + 1,
            close = block.close.line + 1,
            "located registration collection"
        );

        let edits = match plan_insertion(&target, &locator, &block, rendered_fragment) {
            Ok(edits) => edits,
            Err(reason) => {
                warn!(file = %self.path.display(), %reason, "no safe insertion point");
                return Ok(Outcome::AnchorNotFound {
                    file: self.path.clone(),
                    reason,
                    instruction,
                });
            }
        };

        let updated = splice(&target.content, &edits)?;
        self.fs
            .write_atomic(&self.path, &updated)
            .map_err(|e| PatchError::io(&self.path, e))?;
        info!(file = %self.path.display(), key = entry_key, "registered entry");

        Ok(Outcome::Applied {
            file: self.path.clone(),
        })
    }

    fn unlocated(&self, err: LocateError, instruction: Instruction) -> Outcome {
        warn!(file = %self.path.display(), error = %err, "registration collection not located");
        if err.is_malformed() {
            Outcome::MalformedTarget {
                file: self.path.clone(),
                reason: err.to_string(),
                instruction,
            }
        } else {
            Outcome::AnchorNotFound {
                file: self.path.clone(),
                reason: err.to_string(),
                instruction,
            }
        }
    }

    /// Manual registration guidance for `rendered_fragment`.
    pub fn instruction(&self, content: &str, rendered_fragment: &str) -> Instruction {
        let class = Regex::new(r"\bclass\s+([A-Za-z_][A-Za-z0-9_]*)")
            .ok()
            .and_then(|re| re.captures(content))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                self.path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            });

        let location = match self.layout {
            BootstrapLayout::KernelMethod { .. } => format!(
                "  and add the following bundle in the {} method:",
                self.layout.location(class.as_deref())
            ),
            BootstrapLayout::ReturnedArray => {
                "  and add the following bundle to the array it returns:".to_string()
            }
        };

        Instruction::new(
            [format!("- Edit {}", self.path.display()), location],
            rendered_fragment,
        )
    }
}

/// Edits that insert `fragment` as the last entry of `block`, or the reason
/// no such insertion is safe.
/// `key` occurs outside comments and inline text. Sources the mask cannot
/// scan fall back to plain containment.
fn mentions_entry(content: &str, key: &str) -> bool {
    let Ok(mask) = CodeMask::scan(content, &Syntax::PHP) else {
        return content.contains(key);
    };
    content.match_indices(key).any(|(offset, _)| {
        matches!(mask.region(offset), Some(Region::Code | Region::Literal))
    })
}

fn plan_insertion(
    target: &TargetFile,
    locator: &Locator<'_>,
    block: &Block,
    fragment: &str,
) -> Result<Vec<Edit>, String> {
    let content = &target.content;
    let lines = target.lines();
    let eol = target.line_ending.as_str();
    let file = target.path.clone();

    if block.is_single_line() {
        let inner = &content[block.open.offset + 1..block.close.offset];
        if !inner.trim().is_empty() {
            return Err(format!(
                "collection on line {} is written on a single line",
                block.open.line + 1
            ));
        }
        let outer = indentation(lines[block.open.line]);
        let unit = indent_unit(&lines, block.open.line);
        let mut expanded = String::from(eol);
        for line in fragment.lines() {
            expanded.push_str(&format!("{outer}{unit}{line}{eol}"));
        }
        expanded.push_str(outer);
        return Ok(vec![Edit::new(
            file,
            block.open.offset + 1,
            block.close.offset,
            expanded,
            inner,
        )]);
    }

    let close_range = locator.line_range(block.close.line);
    let before_close = &content[close_range.start..block.close.offset];
    if !before_close.trim().is_empty() {
        return Err(format!(
            "closing delimiter on line {} shares its line with an entry",
            block.close.line + 1
        ));
    }

    let inner_lines = block.open.line + 1..block.close.line;
    let sibling = inner_lines
        .clone()
        .rev()
        .find(|&line| locator.line_has_code(line));
    let indent = match sibling.or_else(|| {
        inner_lines
            .clone()
            .rev()
            .find(|&line| !lines[line].trim().is_empty())
    }) {
        Some(line) => indentation(lines[line]).to_string(),
        None => format!(
            "{}{}",
            indentation(lines[block.open.line]),
            indent_unit(&lines, block.open.line)
        ),
    };

    let mut edits = Vec::new();

    if let Some(line) = sibling {
        if let Some((offset, ch)) = locator.last_code_char(line) {
            if ch != ',' {
                let at = offset + ch.len_utf8();
                edits.push(Edit::new(file.clone(), at, at, ",", ""));
            }
        }
    }

    let mut inserted = String::new();
    for line in fragment.lines() {
        inserted.push_str(&format!("{indent}{line}{eol}"));
    }
    let anchor_text = &content[close_range];
    edits.push(Edit::insert_before(
        file,
        locator.line_range(block.close.line).start,
        anchor_text,
        &inserted,
    ));

    Ok(edits)
}

/// One level of indentation as used around `line`: the difference to the
/// nearest enclosing (less indented) line, else the file's first indented
/// line, else four spaces.
fn indent_unit(lines: &[&str], line: usize) -> String {
    let own = indentation(lines[line]);
    for prev in lines[..line].iter().rev() {
        if strip_eol(prev).trim().is_empty() {
            continue;
        }
        let outer = indentation(prev);
        if outer.len() < own.len() && own.starts_with(outer) {
            return own[outer.len()..].to_string();
        }
        if outer.len() < own.len() {
            break;
        }
    }

    lines
        .iter()
        .map(|l| indentation(l))
        .find(|indent| !indent.is_empty() && indent.len() < 9)
        .map(str::to_string)
        .unwrap_or_else(|| "    ".to_string())
}

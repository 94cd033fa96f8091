//! Import of a bundle's services file into the application configuration.

use crate::descriptor::BundleDescriptor;
use crate::edit::{splice, Edit};
use crate::fs::{FileSystem, LocalFs};
use crate::outcome::{Instruction, Outcome, PatchError};
use crate::target::{strip_eol, ConfigSyntax, TargetFile, TargetFormat};
use crate::toml::{validate_document, ResourceList, TomlTarget};
use crate::yaml::{quoted, sequence_items, Outline};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const IMPORTS_KEY: &str = "imports";
const DEFAULT_INDENT: &str = "    ";

pub struct ServiceImportManipulator<F: FileSystem = LocalFs> {
    path: PathBuf,
    fs: F,
}

impl ServiceImportManipulator<LocalFs> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, LocalFs)
    }
}

impl<F: FileSystem> ServiceImportManipulator<F> {
    pub fn with_fs(path: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn filename(&self) -> &Path {
        &self.path
    }

    /// Append the bundle's services file to the `imports` list.
    pub fn add_resource(&self, bundle: &BundleDescriptor) -> Result<Outcome, PatchError> {
        let syntax = self.syntax()?;
        let resource = bundle.services_resource();

        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| PatchError::io(&self.path, e))?;
        let target = TargetFile::new(&self.path, content);

        let planned = match syntax {
            ConfigSyntax::Yaml => self.plan_yaml(&target, &resource),
            ConfigSyntax::Toml => self.plan_toml(&target, &resource),
        };

        let edit = match planned {
            Plan::Insert(edit) => edit,
            Plan::Present => {
                debug!(file = %self.path.display(), %resource, "services already imported");
                return Ok(Outcome::AlreadyPresent {
                    file: self.path.clone(),
                    key: resource,
                });
            }
            Plan::NotFound(reason) => {
                warn!(file = %self.path.display(), %reason, "imports not located");
                return Ok(Outcome::AnchorNotFound {
                    file: self.path.clone(),
                    reason,
                    instruction: self.instruction(bundle),
                });
            }
            Plan::Malformed(reason) => {
                warn!(file = %self.path.display(), %reason, "malformed configuration file");
                return Ok(Outcome::MalformedTarget {
                    file: self.path.clone(),
                    reason,
                    instruction: self.instruction(bundle),
                });
            }
        };

        let updated = splice(&target.content, std::slice::from_ref(&edit))?;
        if syntax == ConfigSyntax::Toml && validate_document(&updated).is_err() {
            return Ok(Outcome::AnchorNotFound {
                file: self.path.clone(),
                reason: "the new import would not produce valid TOML".to_string(),
                instruction: self.instruction(bundle),
            });
        }

        self.fs
            .write_atomic(&self.path, &updated)
            .map_err(|e| PatchError::io(&self.path, e))?;
        info!(file = %self.path.display(), %resource, "imported services");

        Ok(Outcome::Applied {
            file: self.path.clone(),
        })
    }

    /// The import entry to paste by hand, in the target's syntax.
    pub fn import_code(&self, bundle: &BundleDescriptor) -> String {
        let resource = bundle.services_resource();
        match self.syntax() {
            Ok(ConfigSyntax::Toml) => format!("[[{IMPORTS_KEY}]]\nresource = \"{resource}\""),
            _ => format!("{DEFAULT_INDENT}- {{ resource: {} }}", quoted(&resource, '"')),
        }
    }

    pub fn instruction(&self, bundle: &BundleDescriptor) -> Instruction {
        Instruction::new(
            [
                format!("- Edit {}", self.path.display()),
                format!(
                    "  and import the bundle's \"{}\" resource in the app's main configuration file:",
                    bundle.services_configuration_filename()
                ),
            ],
            self.import_code(bundle),
        )
    }

    fn syntax(&self) -> Result<ConfigSyntax, PatchError> {
        match TargetFormat::from_path(&self.path) {
            Some(TargetFormat::StructuredConfig(syntax)) => Ok(syntax),
            _ => Err(PatchError::UnsupportedFormat {
                path: self.path.clone(),
                expected: "a .yml, .yaml or .toml configuration file".to_string(),
            }),
        }
    }

    fn plan_yaml(&self, target: &TargetFile, resource: &str) -> Plan {
        let lines = target.lines();
        let outline = match Outline::parse(&lines) {
            Ok(outline) => outline,
            Err(err) => return Plan::Malformed(err.to_string()),
        };

        let Some(entry) = outline.get(IMPORTS_KEY) else {
            return Plan::NotFound("no top-level imports key".to_string());
        };
        if !entry.inline_value.is_empty() {
            return Plan::NotFound(format!(
                "imports on line {} is not a block sequence",
                entry.line + 1
            ));
        }
        let Some(items) = sequence_items(&lines, entry) else {
            return Plan::NotFound(format!(
                "imports on line {} holds something other than a sequence",
                entry.line + 1
            ));
        };

        if items
            .iter()
            .any(|item| item.resource.as_deref() == Some(resource))
        {
            return Plan::Present;
        }

        let (after, new_line) = match items.last() {
            Some(last) => {
                let value = quoted(resource, last.quote.unwrap_or('"'));
                let line = if last.flow {
                    format!("{}- {{ resource: {value} }}", last.indent)
                } else {
                    format!("{}- resource: {value}", last.indent)
                };
                (last.last_line, line)
            }
            None => (
                entry.last_content_line(&lines),
                format!("{DEFAULT_INDENT}- {{ resource: {} }}", quoted(resource, '"')),
            ),
        };

        let starts = target.line_starts();
        Plan::Insert(Edit::insert_after(
            self.path.clone(),
            starts[after],
            lines[after],
            &new_line,
            target.line_ending.as_str(),
        ))
    }

    fn plan_toml(&self, target: &TargetFile, resource: &str) -> Plan {
        let toml = match TomlTarget::parse(&target.content) {
            Ok(toml) => toml,
            Err(err) => return Plan::Malformed(err.to_string()),
        };

        match toml.resource_list(IMPORTS_KEY) {
            list if list.contains(resource) => return Plan::Present,
            ResourceList::Tables(_) => {}
            ResourceList::Missing => {
                return Plan::NotFound("no [[imports]] tables".to_string())
            }
            ResourceList::Inline(_) => {
                return Plan::NotFound("imports is written as an inline array".to_string())
            }
            ResourceList::Other => {
                return Plan::NotFound("imports is not a list of tables".to_string())
            }
        }

        let Some(section) = toml.last_array_section(IMPORTS_KEY) else {
            return Plan::NotFound("no [[imports]] header".to_string());
        };

        let lines = target.lines();
        let starts = target.line_starts();
        let last = lines
            .iter()
            .zip(&starts)
            .enumerate()
            .filter(|(_, (_, start))| **start >= section.header_start && **start < section.body_end)
            .filter(|(_, (line, _))| {
                let trimmed = strip_eol(line).trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(|(idx, _)| idx)
            .last();
        let Some(after) = last else {
            return Plan::NotFound("empty [[imports]] section".to_string());
        };

        let eol = target.line_ending.as_str();
        let header = format!("[[{IMPORTS_KEY}]]");
        let entry = format!("resource = \"{resource}\"");
        let inserted = [String::new(), header, entry].join(eol);
        Plan::Insert(Edit::insert_after(
            self.path.clone(),
            starts[after],
            lines[after],
            &inserted,
            eol,
        ))
    }
}

enum Plan {
    Insert(Edit),
    Present,
    NotFound(String),
    Malformed(String),
}

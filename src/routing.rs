//! Registration of a bundle's routes in the application's routing file.
//!
//! The import is keyed by the bundle name. Presence of the key is enough to
//! consider the import done: an existing entry is never compared or rewritten.

use crate::descriptor::ConfigurationFormat;
use crate::edit::{splice, Edit};
use crate::fs::{FileSystem, LocalFs};
use crate::locate::{Anchor, Locator, Syntax};
use crate::outcome::{Instruction, Outcome, PatchError};
use crate::target::{block_separator, indentation, ConfigSyntax, TargetFile, TargetFormat};
use crate::toml::{validate_document, TomlTarget};
use crate::yaml::{detect_indent, Outline};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DEFAULT_INDENT: &str = "    ";

/// The routing import generated for one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteImport {
    pub name: String,
    pub resource: String,
    /// Loader type; only annotation imports carry one
    pub kind: Option<&'static str>,
    pub prefix: &'static str,
}

impl RouteImport {
    pub fn new(name: &str, format: ConfigurationFormat) -> Self {
        let (resource, kind) = match format {
            ConfigurationFormat::Annotation => (format!("@{name}/Controller/"), Some("annotation")),
            other => (
                format!("@{name}/Resources/config/routing.{}", other.as_str()),
                None,
            ),
        };
        Self {
            name: name.to_string(),
            resource,
            kind,
            prefix: "/",
        }
    }

    /// YAML block, values aligned after the longest key.
    pub fn to_yaml(&self, indent: &str) -> Vec<String> {
        let mut lines = vec![
            format!("{}:", self.name),
            format!("{indent}resource: \"{}\"", self.resource),
        ];
        if let Some(kind) = self.kind {
            lines.push(format!("{indent}type:     {kind}"));
        }
        lines.push(format!("{indent}prefix:   {}", self.prefix));
        lines
    }

    pub fn to_toml(&self) -> Vec<String> {
        let mut lines = vec![
            format!("[{}]", self.name),
            format!("resource = \"{}\"", self.resource),
        ];
        if let Some(kind) = self.kind {
            lines.push(format!("type = \"{kind}\""));
        }
        lines.push(format!("prefix = \"{}\"", self.prefix));
        lines
    }

    pub fn to_xml(&self) -> String {
        match self.kind {
            Some(kind) => format!(
                "<import resource=\"{}\" type=\"{kind}\" prefix=\"{}\" />",
                self.resource, self.prefix
            ),
            None => format!(
                "<import resource=\"{}\" prefix=\"{}\" />",
                self.resource, self.prefix
            ),
        }
    }
}

pub struct RouteImportManipulator<F: FileSystem = LocalFs> {
    path: PathBuf,
    fs: F,
}

impl RouteImportManipulator<LocalFs> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, LocalFs)
    }
}

impl<F: FileSystem> RouteImportManipulator<F> {
    pub fn with_fs(path: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn filename(&self) -> &Path {
        &self.path
    }

    /// Import the routes of bundle `resource_name` configured in `format`.
    pub fn add_resource(
        &self,
        resource_name: &str,
        format: ConfigurationFormat,
    ) -> Result<Outcome, PatchError> {
        let syntax = self.syntax()?;
        let import = RouteImport::new(resource_name, format);
        let instruction = self.instruction(&import, syntax);

        if !self.fs.exists(&self.path) {
            warn!(file = %self.path.display(), "routing file does not exist");
            return Ok(Outcome::AnchorNotFound {
                file: self.path.clone(),
                reason: "the routing file does not exist".to_string(),
                instruction,
            });
        }

        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| PatchError::io(&self.path, e))?;
        let target = TargetFile::new(&self.path, content);

        let planned = match syntax {
            RoutingSyntax::Yaml => self.plan_yaml(&target, &import),
            RoutingSyntax::Toml => self.plan_toml(&target, &import),
            RoutingSyntax::Xml => self.plan_xml(&target, &import),
        };

        let edit = match planned {
            Plan::Insert(edit) => edit,
            Plan::Present => {
                debug!(file = %self.path.display(), key = resource_name, "routing import already present");
                return Ok(Outcome::AlreadyPresent {
                    file: self.path.clone(),
                    key: resource_name.to_string(),
                });
            }
            Plan::NotFound(reason) => {
                warn!(file = %self.path.display(), %reason, "no insertion point for routing import");
                return Ok(Outcome::AnchorNotFound {
                    file: self.path.clone(),
                    reason,
                    instruction,
                });
            }
            Plan::Malformed(reason) => {
                warn!(file = %self.path.display(), %reason, "malformed routing file");
                return Ok(Outcome::MalformedTarget {
                    file: self.path.clone(),
                    reason,
                    instruction,
                });
            }
        };

        let updated = splice(&target.content, std::slice::from_ref(&edit))?;
        if syntax == RoutingSyntax::Toml && validate_document(&updated).is_err() {
            return Ok(Outcome::AnchorNotFound {
                file: self.path.clone(),
                reason: "appending the import would not produce valid TOML".to_string(),
                instruction,
            });
        }

        self.fs
            .write_atomic(&self.path, &updated)
            .map_err(|e| PatchError::io(&self.path, e))?;
        info!(file = %self.path.display(), key = resource_name, "imported routing resource");

        Ok(Outcome::Applied {
            file: self.path.clone(),
        })
    }

    /// Manual import guidance, with the block rendered for the target's syntax.
    pub fn instruction(&self, import: &RouteImport, syntax: RoutingSyntax) -> Instruction {
        let snippet = match syntax {
            RoutingSyntax::Yaml => import.to_yaml(DEFAULT_INDENT).join("\n"),
            RoutingSyntax::Toml => import.to_toml().join("\n"),
            RoutingSyntax::Xml => import.to_xml(),
        };
        Instruction::new(
            [
                format!("- Edit {}", self.path.display()),
                "  and import the bundle's routing resource in the app's main routing file:"
                    .to_string(),
            ],
            snippet,
        )
    }

    /// Syntax of the routing file, from its extension.
    pub fn syntax(&self) -> Result<RoutingSyntax, PatchError> {
        match TargetFormat::from_path(&self.path) {
            Some(TargetFormat::StructuredConfig(ConfigSyntax::Yaml)) => Ok(RoutingSyntax::Yaml),
            Some(TargetFormat::StructuredConfig(ConfigSyntax::Toml)) => Ok(RoutingSyntax::Toml),
            Some(TargetFormat::Markup) => Ok(RoutingSyntax::Xml),
            _ => Err(PatchError::UnsupportedFormat {
                path: self.path.clone(),
                expected: "a .yml, .yaml, .toml or .xml routing file".to_string(),
            }),
        }
    }

    fn plan_yaml(&self, target: &TargetFile, import: &RouteImport) -> Plan {
        let lines = target.lines();
        let outline = match Outline::parse(&lines) {
            Ok(outline) => outline,
            Err(err) => return Plan::Malformed(err.to_string()),
        };
        if outline.contains_key(&import.name) {
            return Plan::Present;
        }

        let indent = detect_indent(&lines).unwrap_or_else(|| DEFAULT_INDENT.to_string());
        self.append(target, &import.to_yaml(&indent))
    }

    fn plan_toml(&self, target: &TargetFile, import: &RouteImport) -> Plan {
        let toml = match TomlTarget::parse(&target.content) {
            Ok(toml) => toml,
            Err(err) => return Plan::Malformed(err.to_string()),
        };
        if toml.contains_key(&import.name) {
            return Plan::Present;
        }
        self.append(target, &import.to_toml())
    }

    /// Append `block` after the last entry, one blank line apart.
    fn append(&self, target: &TargetFile, block: &[String]) -> Plan {
        let eol = target.line_ending.as_str();
        let end = target.content.len();
        let mut text = block_separator(&target.content, target.line_ending);
        for line in block {
            text.push_str(line);
            text.push_str(eol);
        }
        Plan::Insert(Edit::new(self.path.clone(), end, end, text, ""))
    }

    fn plan_xml(&self, target: &TargetFile, import: &RouteImport) -> Plan {
        let content = &target.content;
        let locator = match Locator::new(content, &Syntax::MARKUP) {
            Ok(locator) => locator,
            Err(err) => return Plan::Malformed(err.to_string()),
        };

        let prefix = format!("@{}/", import.name);
        let present = ['"', '\''].iter().any(|quote| {
            let needle = format!("resource={quote}{prefix}");
            content
                .match_indices(&needle)
                .any(|(offset, _)| locator.is_code(offset))
        });
        if present {
            return Plan::Present;
        }

        let block = match locator.locate(&Anchor::element("routes")) {
            Ok(block) => block,
            Err(err) if err.is_malformed() => return Plan::Malformed(err.to_string()),
            Err(err) => return Plan::NotFound(err.to_string()),
        };

        let lines = target.lines();
        let close_range = locator.line_range(block.close.line);
        if block.is_single_line() || !content[close_range.start..block.close.offset].trim().is_empty() {
            return Plan::NotFound(format!(
                "</routes> on line {} shares its line with other content",
                block.close.line + 1
            ));
        }

        let indent = (block.open.line + 1..block.close.line)
            .rev()
            .find(|&line| locator.line_has_code(line))
            .map(|line| indentation(lines[line]).to_string())
            .unwrap_or_else(|| {
                let outer = indentation(lines[block.open.line]);
                let unit = detect_indent(&lines[block.open.line + 1..])
                    .filter(|indent| indent.len() > outer.len())
                    .map(|indent| indent[outer.len()..].to_string())
                    .unwrap_or_else(|| DEFAULT_INDENT.to_string());
                format!("{outer}{unit}")
            });

        let inserted = format!("{indent}{}{}", import.to_xml(), target.line_ending.as_str());
        Plan::Insert(Edit::insert_before(
            self.path.clone(),
            close_range.start,
            &content[close_range],
            &inserted,
        ))
    }
}

/// Routing file syntaxes the manipulator can patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingSyntax {
    Yaml,
    Toml,
    Xml,
}

enum Plan {
    Insert(Edit),
    Present,
    NotFound(String),
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn routing_file(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_route_import_shapes() {
        let annotation = RouteImport::new("AcmeBlogBundle", ConfigurationFormat::Annotation);
        assert_eq!(
            annotation.to_yaml("    "),
            vec![
                "AcmeBlogBundle:",
                "    resource: \"@AcmeBlogBundle/Controller/\"",
                "    type:     annotation",
                "    prefix:   /",
            ]
        );

        let xml = RouteImport::new("AcmeBlogBundle", ConfigurationFormat::Xml);
        assert_eq!(xml.resource, "@AcmeBlogBundle/Resources/config/routing.xml");
        assert_eq!(
            xml.to_xml(),
            "<import resource=\"@AcmeBlogBundle/Resources/config/routing.xml\" prefix=\"/\" />"
        );
    }

    #[test]
    fn test_yaml_append_after_last_entry() {
        let original = "app:\n  resource: '@AppBundle/Controller/'\n  type: annotation\n";
        let (_dir, path) = routing_file("routing.yml", original);

        let outcome = RouteImportManipulator::new(&path)
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Yml)
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!(
                "{original}\nAcmeBlogBundle:\n  resource: \"@AcmeBlogBundle/Resources/config/routing.yml\"\n  prefix:   /\n"
            )
        );
    }

    #[test]
    fn test_existing_key_is_already_present() {
        let original = "AcmeBlogBundle:\n    resource: \"@AcmeBlogBundle/Resources/config/routing.xml\"\n";
        let (_dir, path) = routing_file("routing.yml", original);

        let outcome = RouteImportManipulator::new(&path)
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Annotation)
            .unwrap();
        assert!(matches!(outcome, Outcome::AlreadyPresent { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_file_returns_snippet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routing.yml");

        let outcome = RouteImportManipulator::new(&path)
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Annotation)
            .unwrap();
        let text = outcome.instruction().unwrap().to_string();
        assert!(text.contains("    AcmeBlogBundle:\n"));
        assert!(text.contains("        type:     annotation\n"));
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_yaml_is_untouched() {
        let original = "- not\n- a mapping\n";
        let (_dir, path) = routing_file("routing.yaml", original);
        let outcome = RouteImportManipulator::new(&path)
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Yml)
            .unwrap();
        assert!(matches!(outcome, Outcome::MalformedTarget { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_toml_routing() {
        let original = "[app]\nresource = \"@AppBundle/Controller/\"\ntype = \"annotation\"\n";
        let (_dir, path) = routing_file("routing.toml", original);
        let manipulator = RouteImportManipulator::new(&path);

        let outcome = manipulator
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Annotation)
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!(
                "{original}\n[AcmeBlogBundle]\nresource = \"@AcmeBlogBundle/Controller/\"\ntype = \"annotation\"\nprefix = \"/\"\n"
            )
        );

        let again = manipulator
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Annotation)
            .unwrap();
        assert!(matches!(again, Outcome::AlreadyPresent { .. }));
    }

    #[test]
    fn test_xml_routing() {
        let original = r#"<?xml version="1.0" encoding="UTF-8" ?>
<routes xmlns="http://symfony.com/schema/routing">
    <import resource="@AppBundle/Controller/" type="annotation" />
    <!-- <import resource="@AcmeBlogBundle/Controller/" /> -->
</routes>
"#;
        let (_dir, path) = routing_file("routing.xml", original);
        let manipulator = RouteImportManipulator::new(&path);

        let outcome = manipulator
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Annotation)
            .unwrap();
        assert!(outcome.is_applied());
        let expected = original.replace(
            "</routes>",
            "    <import resource=\"@AcmeBlogBundle/Controller/\" type=\"annotation\" prefix=\"/\" />\n</routes>",
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);

        let again = manipulator
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Annotation)
            .unwrap();
        assert!(matches!(again, Outcome::AlreadyPresent { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RouteImportManipulator::new("routing.ini")
            .add_resource("AcmeBlogBundle", ConfigurationFormat::Yml);
        assert!(matches!(result, Err(PatchError::UnsupportedFormat { .. })));
    }
}

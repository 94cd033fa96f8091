use crate::bootstrap::BootstrapLayout;
use crate::target::TargetFormat;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const DEFAULT_KERNEL_PATH: &str = "app/AppKernel.php";
pub const DEFAULT_ROUTING_PATH: &str = "app/config/routing.yml";
pub const DEFAULT_SERVICES_PATH: &str = "app/config/config.yml";

/// Contents of `bundle-patcher.toml`.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub kernel: KernelConfig,
    pub routing: RoutingConfig,
    pub services: ServicesConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Bootstrap file; discovered under `app/` when unset and the default is absent
    pub path: Option<String>,
    pub layout: KernelLayout,
    pub method: String,
    pub collection: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            path: None,
            layout: KernelLayout::KernelMethod,
            method: "registerBundles".to_string(),
            collection: "$bundles".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum KernelLayout {
    #[default]
    KernelMethod,
    ReturnedArray,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    pub path: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_ROUTING_PATH.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesConfig {
    pub path: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SERVICES_PATH.to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if let Some(path) = &self.kernel.path {
            check_path(&mut issues, "kernel", path, |format| {
                format == TargetFormat::ProceduralSource
            });
        }
        check_path(&mut issues, "routing", &self.routing.path, |format| {
            matches!(
                format,
                TargetFormat::StructuredConfig(_) | TargetFormat::Markup
            )
        });
        check_path(&mut issues, "services", &self.services.path, |format| {
            matches!(format, TargetFormat::StructuredConfig(_))
        });

        if self.kernel.layout == KernelLayout::KernelMethod {
            if self.kernel.method.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    section: "kernel",
                    field: "method",
                });
            } else if !is_identifier(&self.kernel.method) {
                issues.push(ValidationIssue::InvalidValue {
                    section: "kernel",
                    field: "method",
                    message: format!("'{}' is not a method name", self.kernel.method),
                });
            }

            let variable = self.kernel.collection.strip_prefix('$').unwrap_or("");
            if !is_identifier(variable) {
                issues.push(ValidationIssue::InvalidValue {
                    section: "kernel",
                    field: "collection",
                    message: format!(
                        "'{}' is not a variable such as $bundles",
                        self.kernel.collection
                    ),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn bootstrap_layout(&self) -> BootstrapLayout {
        match self.kernel.layout {
            KernelLayout::KernelMethod => BootstrapLayout::KernelMethod {
                method: self.kernel.method.clone(),
                collection: self.kernel.collection.clone(),
            },
            KernelLayout::ReturnedArray => BootstrapLayout::ReturnedArray,
        }
    }
}

fn check_path(
    issues: &mut Vec<ValidationIssue>,
    section: &'static str,
    path: &str,
    accepts: impl Fn(TargetFormat) -> bool,
) {
    if path.trim().is_empty() {
        issues.push(ValidationIssue::MissingField {
            section,
            field: "path",
        });
        return;
    }
    match TargetFormat::from_path(Path::new(path)) {
        Some(format) if accepts(format) => {}
        _ => issues.push(ValidationIssue::InvalidValue {
            section,
            field: "path",
            message: format!("unsupported file type: {path}"),
        }),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        section: &'static str,
        field: &'static str,
    },
    InvalidValue {
        section: &'static str,
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { section, field } => {
                write!(f, "[{section}] missing required field '{field}'")
            }
            ValidationIssue::InvalidValue {
                section,
                field,
                message,
            } => write!(f, "[{section}] invalid '{field}': {message}"),
        }
    }
}

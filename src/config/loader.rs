use crate::config::schema::{ProjectConfig, ValidationError, DEFAULT_KERNEL_PATH};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the optional project configuration file.
pub const CONFIG_FILE_NAME: &str = "bundle-patcher.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read project config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse project config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse project config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid project config ({}): {}", path.display(), source),
                None => write!(f, "invalid project config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ProjectConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// `bundle-patcher.toml` from the project root, or the defaults when the
/// project has none.
pub fn load_project(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.is_file() {
        load_from_path(&path)
    } else {
        Ok(ProjectConfig::default())
    }
}

/// Bootstrap file for `root`: the configured path, else the default
/// location, else the first `*Kernel.php` found under `app/`.
pub fn resolve_kernel(root: &Path, config: &ProjectConfig) -> PathBuf {
    if let Some(path) = &config.kernel.path {
        return root.join(path);
    }
    let default = root.join(DEFAULT_KERNEL_PATH);
    if default.is_file() {
        return default;
    }
    discover_kernel(root).unwrap_or(default)
}

/// First `*Kernel.php` under `<root>/app`, in file-name order.
pub fn discover_kernel(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root.join("app"))
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with("Kernel.php"))
        })
        .map(|entry| entry.into_path())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::BootstrapLayout;
    use crate::config::schema::{KernelLayout, ValidationIssue};

    #[test]
    fn test_defaults_when_empty() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.routing.path, "app/config/routing.yml");
        assert_eq!(config.bootstrap_layout(), BootstrapLayout::default());
    }

    #[test]
    fn test_partial_config() {
        let config = load_from_str(
            r#"
[kernel]
path = "config/bundles.php"
layout = "returned-array"

[routing]
path = "config/routes.xml"
"#,
        )
        .unwrap();
        assert_eq!(config.kernel.layout, KernelLayout::ReturnedArray);
        assert_eq!(config.bootstrap_layout(), BootstrapLayout::ReturnedArray);
        assert_eq!(config.services.path, "app/config/config.yml");
    }

    #[test]
    fn test_validation_issues() {
        let err = load_from_str(
            r#"
[kernel]
method = ""
collection = "bundles"

[services]
path = "app/config/services.xml"
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation { source, .. } => {
                assert_eq!(source.issues.len(), 3);
                assert!(source.issues.contains(&ValidationIssue::MissingField {
                    section: "kernel",
                    field: "method"
                }));
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(matches!(
            load_from_str("[routing]\nfile = \"x.yml\"\n"),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn test_load_from_path_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[kernel\n").unwrap();
        let message = load_from_path(&path).unwrap_err().to_string();
        assert!(message.contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_kernel_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/src")).unwrap();
        fs::write(root.join("app/src/ShopKernel.php"), "<?php\n").unwrap();

        let config = ProjectConfig::default();
        assert_eq!(
            resolve_kernel(root, &config),
            root.join("app/src/ShopKernel.php")
        );

        fs::write(root.join("app/AppKernel.php"), "<?php\n").unwrap();
        assert_eq!(resolve_kernel(root, &config), root.join("app/AppKernel.php"));
    }

    #[test]
    fn test_missing_project_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_project(dir.path()).unwrap(), ProjectConfig::default());
    }
}

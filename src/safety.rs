use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories under the project root that registration never edits.
const FORBIDDEN_DIRS: &[&str] = &["vendor", "var", ".git"];

/// Keeps every patched file inside the project and out of dependency and
/// runtime directories.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    /// Canonical project root
    project_root: PathBuf,
    /// Canonical forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside the project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl ProjectGuard {
    /// Guard for `project_root`, canonicalized so symlinks are resolved.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let project_root = project_root.as_ref().canonicalize()?;
        let forbidden_paths = FORBIDDEN_DIRS
            .iter()
            .map(|dir| project_root.join(dir))
            .map(|dir| dir.canonicalize().unwrap_or(dir))
            .collect();

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Check that `path` may be patched; relative paths are taken from the
    /// project root. Returns the canonical path.
    ///
    /// The file itself may be missing (a routing file is optional), its
    /// parent directory may not.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };

        let canonical = match absolute.canonicalize() {
            Ok(canonical) => canonical,
            Err(err) => match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) if !absolute.exists() => {
                    parent.canonicalize()?.join(name)
                }
                _ => return Err(err.into()),
            },
        };

        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.project_root) {
            return Err(SafetyError::OutsideProject {
                path: canonical.to_path_buf(),
                project: self.project_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

//! Filesystem collaborator used by every manipulator.
//!
//! Manipulators never touch `std::fs` directly: they read, check existence
//! and write through [`FileSystem`], so a whole registration run can be
//! evaluated against [`DryRunFs`] without modifying anything on disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Read-all-text, atomic-write and existence-check.
pub trait FileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the file's content all-or-nothing.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        (**self).write_atomic(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        StagedWrite::stage(path, content.as_bytes())?.commit()
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// First half of an atomic write: content fully written and synced to a
/// temporary file next to the target, not yet visible under the target name.
///
/// Dropping a `StagedWrite` without calling [`commit`](Self::commit) removes
/// the temporary file and leaves the target untouched.
#[must_use = "a staged write is discarded unless committed"]
pub struct StagedWrite {
    target: PathBuf,
    temp: tempfile::NamedTempFile,
}

impl StagedWrite {
    /// Write `content` to a tempfile in the target's directory (same
    /// filesystem, so the later rename is atomic) and fsync it.
    pub fn stage(path: &Path, content: &[u8]) -> io::Result<Self> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            Some(_) => Path::new("."),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Path has no parent directory",
                ))
            }
        };

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;

        // Keep the original permissions (tempfiles are created 0600)
        if let Ok(metadata) = std::fs::metadata(path) {
            temp.as_file().set_permissions(metadata.permissions())?;
        }

        Ok(Self {
            target: path.to_path_buf(),
            temp,
        })
    }

    /// Path of the staged temporary file.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically rename the staged file over the target.
    pub fn commit(self) -> io::Result<()> {
        self.temp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Reads through to an inner filesystem, captures writes in memory.
///
/// Later reads of a written path observe the captured content, so a
/// sequence of manipulator calls behaves exactly as it would on disk.
#[derive(Debug, Default)]
pub struct DryRunFs<F: FileSystem = LocalFs> {
    inner: F,
    writes: RefCell<BTreeMap<PathBuf, String>>,
}

impl<F: FileSystem> DryRunFs<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            writes: RefCell::new(BTreeMap::new()),
        }
    }

    /// Captured writes, keyed by path.
    pub fn writes(&self) -> BTreeMap<PathBuf, String> {
        self.writes.borrow().clone()
    }
}

impl<F: FileSystem> FileSystem for DryRunFs<F> {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if let Some(content) = self.writes.borrow().get(path) {
            return Ok(content.clone());
        }
        self.inner.read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        self.writes
            .borrow_mut()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.writes.borrow().contains_key(path) || self.inner.exists(path)
    }
}

/// Filesystem backends for moving source files.
///
/// Paths handed to a backend are project-relative; each backend resolves
/// them against its own root.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

pub trait SourceFilesystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Move `from` to `to`, creating missing parent directories of `to`.
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Which backend a project uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemKind {
    /// Plain rename.
    #[default]
    Simple,
    /// `git mv`, preserving rename history.
    Git,
}

impl FilesystemKind {
    pub fn backend(self, root: impl Into<PathBuf>) -> Box<dyn SourceFilesystem> {
        match self {
            FilesystemKind::Simple => Box::new(SimpleFilesystem::new(root)),
            FilesystemKind::Git => Box::new(GitFilesystem::new(root)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimpleFilesystem {
    root: PathBuf,
}

impl SimpleFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn create_parent(full: &Path) -> io::Result<()> {
    match full.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

impl SourceFilesystem for SimpleFilesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(self.root.join(path), contents)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let to = self.root.join(to);
        create_parent(&to)?;
        fs::rename(self.root.join(from), to)
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }
}

/// Moves files with `git mv` so the rename is recorded in history.  The
/// source file must be tracked.
#[derive(Debug, Clone)]
pub struct GitFilesystem {
    root: PathBuf,
}

impl GitFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceFilesystem for GitFilesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(self.root.join(path), contents)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        create_parent(&self.root.join(to))?;

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .arg("mv")
            .arg("--")
            .arg(from)
            .arg(to)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!("git mv failed: {}", stderr.trim())));
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }
}

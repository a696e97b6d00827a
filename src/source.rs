//! Source units: one file's text plus its content hash.
//!
//! A unit's identity is `(path, hash)`.  Any change to the text yields a
//! new hash, which is what the reflection cache keys on; derived
//! structures are never patched in place.
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::types::SnippetEdit;

/// SHA-256 of a unit's text, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    path: PathBuf,
    text: String,
    hash: ContentHash,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = ContentHash::compute(text.as_bytes());
        Self {
            path: path.into(),
            text,
            hash,
        }
    }

    /// Read a unit from `root.join(path)`, keeping `path` as its identity.
    pub fn load(root: &Path, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let full = root.join(&path);
        let text = std::fs::read_to_string(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::source_not_found(path.display()),
            _ => EngineError::io(&full, e),
        })?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Apply an edit, producing a new unit (and therefore a new hash).
    ///
    /// Ranges past the end of the text are clamped; a range that does not
    /// fall on character boundaries leaves the text unchanged.
    pub fn apply(&self, edit: &SnippetEdit) -> SourceUnit {
        self.apply_all(std::slice::from_ref(edit))
    }

    /// Apply several non-overlapping edits at once.  Edits are applied
    /// from the highest offset down so earlier offsets stay valid.
    pub fn apply_all(&self, edits: &[SnippetEdit]) -> SourceUnit {
        let mut ordered: Vec<&SnippetEdit> = edits.iter().collect();
        ordered.sort_by(|a, b| b.target_range.start.cmp(&a.target_range.start));

        let mut text = self.text.clone();
        for edit in ordered {
            let end = (edit.target_range.end as usize).min(text.len());
            let start = (edit.target_range.start as usize).min(end);
            if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
                tracing::warn!(
                    "skipping edit at {}..{} in {}: not on a character boundary",
                    start,
                    end,
                    self.path.display()
                );
                continue;
            }
            text.replace_range(start..end, &edit.replacement_text);
        }
        SourceUnit::new(self.path.clone(), text)
    }
}

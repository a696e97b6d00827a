/// Engine configuration.
///
/// Settings are read from TOML files, later files overriding earlier
/// ones field by field:
///
///   1. Built-in defaults
///   2. `<config dir>/phpactor/phpactor.toml` (per-user)
///   3. `<cwd>/.phpactor.toml` (per-project)
///
/// ```toml
/// filesystem = "git"
///
/// [autoload]
/// "App\\" = "src/"
/// ```
///
/// When no file sets `[autoload]`, the PSR-4 table comes from the
/// project's `composer.json`.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use etcetera::{BaseStrategy, choose_base_strategy};
use serde::Deserialize;

use crate::composer::{Psr4Mapping, parse_composer_json};
use crate::error::{EngineError, Result};
use crate::mover::FilesystemKind;

/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = ".phpactor.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct ConfigFile {
    autoload: Option<BTreeMap<String, String>>,
    filesystem: Option<FilesystemKind>,
}

impl ConfigFile {
    /// Read a config file.  A missing file is `None`.
    fn read(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::io(path, e)),
        };
        let file = toml::from_str(&content).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(Some(file))
    }

    fn merge(&mut self, other: ConfigFile) {
        if other.autoload.is_some() {
            self.autoload = other.autoload;
        }
        if other.filesystem.is_some() {
            self.filesystem = other.filesystem;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Project root; every path the engine reports is relative to it.
    pub cwd: PathBuf,
    pub autoload: Vec<Psr4Mapping>,
    pub filesystem: FilesystemKind,
}

impl Config {
    /// Defaults for `cwd` with an explicit autoload table.
    pub fn new<P, D>(cwd: impl Into<PathBuf>, autoload: impl IntoIterator<Item = (P, D)>) -> Self
    where
        P: Into<String>,
        D: Into<String>,
    {
        Self {
            cwd: cwd.into(),
            autoload: autoload
                .into_iter()
                .map(|(prefix, dir)| Psr4Mapping {
                    prefix: prefix.into(),
                    base_path: dir.into(),
                })
                .collect(),
            filesystem: FilesystemKind::default(),
        }
    }

    /// Load the user and project config files for `cwd`.
    pub fn load(cwd: impl Into<PathBuf>) -> Result<Self> {
        let user = choose_base_strategy()
            .ok()
            .map(|strategy| strategy.config_dir().join("phpactor").join("phpactor.toml"));
        Self::load_from(cwd, user.as_deref())
    }

    /// Like [`load`](Self::load) with an explicit per-user file.
    pub fn load_from(cwd: impl Into<PathBuf>, user_file: Option<&Path>) -> Result<Self> {
        let cwd = cwd.into();
        let mut merged = ConfigFile::default();

        if let Some(path) = user_file
            && let Some(file) = ConfigFile::read(path)?
        {
            merged.merge(file);
        }
        if let Some(file) = ConfigFile::read(&cwd.join(PROJECT_CONFIG_FILE))? {
            merged.merge(file);
        }

        let autoload = match merged.autoload {
            Some(table) => table
                .into_iter()
                .map(|(prefix, base_path)| Psr4Mapping { prefix, base_path })
                .collect(),
            None => parse_composer_json(&cwd),
        };

        Ok(Self {
            cwd,
            autoload,
            filesystem: merged.filesystem.unwrap_or_default(),
        })
    }
}

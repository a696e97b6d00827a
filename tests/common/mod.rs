#![allow(dead_code)]

use std::fs;
use std::path::Path;

use phpactor_core::mover::FilesystemKind;
use phpactor_core::source::SourceUnit;
use phpactor_core::{Config, Engine};

/// The autoload table most tests use: `App\` → `app/`.
pub const APP_COMPOSER_JSON: &str = r#"{
    "autoload": {
        "psr-4": {
            "App\\": "app/"
        }
    }
}"#;

/// Create a temporary workspace with a `composer.json` and PHP files,
/// and an engine rooted at it.
///
/// The `TempDir` must be kept alive for the duration of the test.
pub fn create_psr4_workspace(
    composer_json: &str,
    files: &[(&str, &str)],
) -> (Engine, tempfile::TempDir) {
    create_workspace_with(composer_json, files, FilesystemKind::Simple)
}

pub fn create_workspace_with(
    composer_json: &str,
    files: &[(&str, &str)],
    filesystem: FilesystemKind,
) -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::write(dir.path().join("composer.json"), composer_json)
        .expect("failed to write composer.json");
    for (rel_path, content) in files {
        write_file(dir.path(), rel_path, content);
    }

    let mut config = Config::load_from(dir.path(), None).expect("failed to load config");
    config.filesystem = filesystem;
    let engine = Engine::new(config).expect("failed to build engine");
    (engine, dir)
}

pub fn write_file(root: &Path, rel_path: &str, content: &str) {
    let full = root.join(rel_path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).expect("failed to create dirs");
    }
    fs::write(&full, content).expect("failed to write PHP file");
}

pub fn read_file(root: &Path, rel_path: &str) -> String {
    fs::read_to_string(root.join(rel_path)).expect("failed to read file")
}

/// A source unit whose cursor is marked with `|` in `text`.
pub fn unit_with_cursor(path: &str, text: &str) -> (SourceUnit, u32) {
    let offset = text.find('|').expect("text must contain a `|` cursor");
    let clean = format!("{}{}", &text[..offset], &text[offset + 1..]);
    (SourceUnit::new(path, clean), offset as u32)
}

/// Labels of suggestions, in order.
pub fn labels(suggestions: &[phpactor_core::CompletionSuggestion]) -> Vec<&str> {
    suggestions.iter().map(|s| s.label.as_str()).collect()
}

/// Whether `git` can be run.
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

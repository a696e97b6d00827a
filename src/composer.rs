/// Composer autoload support.
///
/// This module parses `composer.json` to extract the PSR-4 autoload
/// table (namespace prefix → base directory) that seeds the
/// [`SourceRegistry`](crate::registry::SourceRegistry) when no explicit
/// `[autoload]` table is configured.
///
/// Both `autoload` and `autoload-dev` sections are read.  A prefix may
/// map to a single directory (`"src/"`) or to several
/// (`["src/", "lib/"]`).
use std::path::Path;

/// A single PSR-4 namespace-to-directory mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psr4Mapping {
    /// The namespace prefix, always ending with `\` (e.g. `"App\"`), or
    /// empty for the root-namespace fallback.
    pub prefix: String,
    /// The base directory relative to the project root, always ending
    /// with `/` (e.g. `"src/"`), or empty for the root itself.
    pub base_path: String,
}

/// Parse a `composer.json` file at the given project root and extract all
/// PSR-4 autoload mappings from both `autoload` and `autoload-dev` sections.
///
/// Returns an empty `Vec` if the file doesn't exist, can't be read, or
/// contains no PSR-4 mappings.
pub fn parse_composer_json(project_root: &Path) -> Vec<Psr4Mapping> {
    let composer_path = project_root.join("composer.json");
    let content = match std::fs::read_to_string(&composer_path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let json: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("ignoring unparsable {}: {}", composer_path.display(), e);
            return Vec::new();
        }
    };

    let mut mappings = Vec::new();

    for section_key in &["autoload", "autoload-dev"] {
        if let Some(section) = json.get(section_key)
            && let Some(psr4) = section.get("psr-4")
            && let Some(psr4_obj) = psr4.as_object()
        {
            for (prefix, paths) in psr4_obj {
                extract_psr4_entries(prefix, paths, &mut mappings);
            }
        }
    }

    tracing::debug!(
        "loaded {} PSR-4 mapping(s) from {}",
        mappings.len(),
        composer_path.display()
    );
    mappings
}

/// Extract PSR-4 entries from a single prefix → path(s) pair.
fn extract_psr4_entries(prefix: &str, paths: &serde_json::Value, mappings: &mut Vec<Psr4Mapping>) {
    let prefix = normalise_prefix(prefix);

    match paths {
        serde_json::Value::String(path) => {
            mappings.push(Psr4Mapping {
                prefix: prefix.clone(),
                base_path: normalise_path(path),
            });
        }
        serde_json::Value::Array(arr) => {
            for entry in arr {
                if let Some(path) = entry.as_str() {
                    mappings.push(Psr4Mapping {
                        prefix: prefix.clone(),
                        base_path: normalise_path(path),
                    });
                }
            }
        }
        _ => {}
    }
}

/// Normalise a namespace prefix: no leading `\`, a trailing `\` unless
/// the prefix is empty.
pub(crate) fn normalise_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('\\');
    if trimmed.is_empty() || trimmed.ends_with('\\') {
        trimmed.to_string()
    } else {
        format!("{}\\", trimmed)
    }
}

/// Normalise a directory path: forward slashes, no leading `./`, and a
/// trailing `/` unless the path is empty.
pub(crate) fn normalise_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    let p = p.strip_prefix("./").unwrap_or(&p);
    if p.is_empty() || p == "." {
        String::new()
    } else if p.ends_with('/') {
        p.to_string()
    } else {
        format!("{}/", p)
    }
}

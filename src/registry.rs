/// Class name ↔ file path mapping.
///
/// The [`SourceRegistry`] is a pure table built from the autoload
/// configuration (PSR-4 namespace prefix → base directory).  It holds no
/// source text and never touches the filesystem.
///
/// # Resolution
///
/// Given `"App\\" => "app/"`, the class `App\Sub\Foo` resolves by:
///   1. Picking the longest registered prefix the name starts with
///   2. Replacing the remaining namespace separators with `/`
///   3. Appending `.php` and prepending the base directory
///
/// Result: `app/Sub/Foo.php`.  The inverse strips the base directory and
/// extension and maps `/` back to `\` under the matching prefix.
use std::path::{Path, PathBuf};

use crate::composer::{Psr4Mapping, normalise_path, normalise_prefix};
use crate::error::{EngineError, Result};
use crate::types::ClassName;
use crate::util::{is_builtin_type, is_ident_char};

/// PHP source-file extension, without the dot.
pub const SOURCE_EXTENSION: &str = "php";

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    /// Sorted by prefix length, longest first; insertion order is kept
    /// among equal lengths so the first directory listed for a prefix wins.
    mappings: Vec<Psr4Mapping>,
}

impl SourceRegistry {
    /// Build a registry, rejecting overlapping roots that would map the
    /// same file to two different class names.
    pub fn new(mappings: Vec<Psr4Mapping>) -> Result<Self> {
        let mut mappings: Vec<Psr4Mapping> = mappings
            .into_iter()
            .map(|m| Psr4Mapping {
                prefix: normalise_prefix(&m.prefix),
                base_path: normalise_path(&m.base_path),
            })
            .collect();
        mappings.dedup();

        check_root_conflicts(&mappings)?;

        mappings.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(Self { mappings })
    }

    /// Build a registry from `(prefix, directory)` pairs.
    pub fn from_prefixes<P, D>(pairs: impl IntoIterator<Item = (P, D)>) -> Result<Self>
    where
        P: AsRef<str>,
        D: AsRef<str>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(prefix, dir)| Psr4Mapping {
                    prefix: prefix.as_ref().to_string(),
                    base_path: dir.as_ref().to_string(),
                })
                .collect(),
        )
    }

    pub fn mappings(&self) -> &[Psr4Mapping] {
        &self.mappings
    }

    /// Resolve a class name to its project-relative source path.
    pub fn resolve_to_path(&self, class: &ClassName) -> Result<PathBuf> {
        let fqcn = class.to_string();
        if is_builtin_type(&fqcn) {
            return Err(EngineError::source_not_found(&fqcn));
        }

        for mapping in &self.mappings {
            let Some(relative_class) = fqcn.strip_prefix(mapping.prefix.as_str()) else {
                continue;
            };
            if relative_class.is_empty() {
                continue;
            }
            let relative_path = relative_class.replace('\\', "/");
            let path = format!("{}{}.{}", mapping.base_path, relative_path, SOURCE_EXTENSION);
            return Ok(PathBuf::from(path));
        }

        Err(EngineError::source_not_found(&fqcn))
    }

    /// Resolve a project-relative source path back to the class name it
    /// must declare.
    ///
    /// A path that lies under a registered root but whose class name
    /// would be claimed by a longer prefix mapped elsewhere is reported
    /// as not found: only paths that round-trip are accepted.
    pub fn resolve_to_class_name(&self, path: &Path) -> Result<ClassName> {
        let not_found = || EngineError::source_not_found(path.display());

        let normalised = path.to_string_lossy().replace('\\', "/");
        let normalised = normalised.strip_prefix("./").unwrap_or(&normalised);
        let without_ext = normalised
            .strip_suffix(&format!(".{}", SOURCE_EXTENSION))
            .ok_or_else(not_found)?;

        let mapping = self
            .mappings
            .iter()
            .filter(|m| without_ext.starts_with(m.base_path.as_str()))
            .max_by_key(|m| m.base_path.len())
            .ok_or_else(not_found)?;

        let relative = &without_ext[mapping.base_path.len()..];
        if relative.is_empty()
            || relative
                .split('/')
                .any(|seg| seg.is_empty() || !seg.chars().all(is_ident_char))
        {
            return Err(not_found());
        }

        let class = ClassName::from_fqcn(&format!(
            "{}{}",
            mapping.prefix,
            relative.replace('/', "\\")
        ));

        let round_trip = self.resolve_to_path(&class)?;
        if round_trip.to_string_lossy() != normalised {
            tracing::debug!(
                "{} is shadowed: {} resolves to {}",
                normalised,
                class,
                round_trip.display()
            );
            return Err(not_found());
        }

        Ok(class)
    }
}

/// Two mappings whose roots nest must agree on the class name of every
/// file under the inner root.  For roots `src/` and `src/Sub/` that means
/// the inner prefix must be the outer prefix followed by `Sub\`.
fn check_root_conflicts(mappings: &[Psr4Mapping]) -> Result<()> {
    for (i, outer) in mappings.iter().enumerate() {
        for inner in mappings.iter().skip(i + 1) {
            let (outer, inner) = if inner.base_path.len() < outer.base_path.len() {
                (inner, outer)
            } else {
                (outer, inner)
            };
            let Some(rel) = inner.base_path.strip_prefix(outer.base_path.as_str()) else {
                continue;
            };
            let expected = format!("{}{}", outer.prefix, rel.replace('/', "\\"));
            if expected != inner.prefix {
                return Err(EngineError::PrefixConflict {
                    prefix: inner.prefix.clone(),
                    first: PathBuf::from(&outer.base_path),
                    second: PathBuf::from(&inner.base_path),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SourceRegistry {
        SourceRegistry::from_prefixes([("App\\", "app/"), ("App\\Tests\\", "tests")])
            .expect("valid registry")
    }

    #[test]
    fn test_longest_prefix_wins() {
        let reg = registry();
        let path = reg
            .resolve_to_path(&ClassName::from_fqcn("App\\Tests\\FooTest"))
            .unwrap();
        assert_eq!(path, PathBuf::from("tests/FooTest.php"));
    }

    #[test]
    fn test_unregistered_namespace_is_not_found() {
        let reg = registry();
        let err = reg
            .resolve_to_path(&ClassName::from_fqcn("Acme\\Foo"))
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceNotFound { .. }));
    }

    #[test]
    fn test_shadowed_path_is_not_found() {
        let reg = registry();
        // `App\Tests\X` belongs to `tests/`, so `app/Tests/X.php` does not
        // round-trip.
        assert!(reg.resolve_to_class_name(Path::new("app/Tests/X.php")).is_err());
    }

    #[test]
    fn test_non_php_file_is_not_found() {
        let reg = registry();
        assert!(reg.resolve_to_class_name(Path::new("app/readme.md")).is_err());
        assert!(reg.resolve_to_class_name(Path::new("app/foo-bar.php")).is_err());
    }

    #[test]
    fn test_conflicting_roots_are_rejected() {
        let err = SourceRegistry::from_prefixes([("A\\", "src/"), ("B\\", "src/")]).unwrap_err();
        assert!(matches!(err, EngineError::PrefixConflict { .. }));
    }

    #[test]
    fn test_consistent_nested_roots_are_accepted() {
        let reg = SourceRegistry::from_prefixes([("App\\", "src/"), ("App\\Sub\\", "src/Sub/")])
            .expect("nested roots agree");
        let class = reg
            .resolve_to_class_name(Path::new("src/Sub/Foo.php"))
            .unwrap();
        assert_eq!(class.to_string(), "App\\Sub\\Foo");
    }

    #[test]
    fn test_empty_prefix_maps_global_namespace() {
        let reg = SourceRegistry::from_prefixes([("", "lib/")]).unwrap();
        let path = reg.resolve_to_path(&ClassName::from_fqcn("Foo")).unwrap();
        assert_eq!(path, PathBuf::from("lib/Foo.php"));
        let class = reg.resolve_to_class_name(&path).unwrap();
        assert!(class.is_global());
    }
}

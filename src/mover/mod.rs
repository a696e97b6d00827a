/// Moving a class to a new name.
///
/// A move rewrites the class's namespace declaration and name token and
/// relocates its file to the path the new name maps to.  Nothing is
/// written until every check has passed:
///
///   1. `from` resolves to an existing file (`SourceNotFound`)
///   2. `to` resolves to a free path (`MoveConflict`)
///   3. the file is valid UTF-8 (`Io`)
///   4. the file parses and declares `from` (`Syntax`,
///      `ClassNotFoundInSource`)
///
/// The rewritten text is computed in memory, the file is moved through
/// the filesystem backend, and the new text is written at the
/// destination.  If that final write fails the move is rolled back when
/// possible and the outcome is always reported as `InconsistentMove`.
///
/// References to the class in other files are left alone.
mod filesystem;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::reflector::{ReflectedUnit, Reflector};
use crate::source::SourceUnit;
use crate::types::{ClassName, OffsetRange, ReflectedClass, SnippetEdit};

pub use filesystem::{FilesystemKind, GitFilesystem, SimpleFilesystem, SourceFilesystem};

pub struct ClassMover {
    reflector: Arc<Reflector>,
    filesystem: Box<dyn SourceFilesystem>,
}

impl ClassMover {
    pub fn new(reflector: Arc<Reflector>, filesystem: Box<dyn SourceFilesystem>) -> Self {
        Self {
            reflector,
            filesystem,
        }
    }

    /// Move `from` to `to`, returning the old and new paths.
    pub fn move_class(&self, from: &ClassName, to: &ClassName) -> Result<Vec<PathBuf>> {
        let registry = self.reflector.registry();

        let from_path = registry.resolve_to_path(from)?;
        if !self.filesystem.exists(&from_path) {
            return Err(EngineError::source_not_found(from_path.display()));
        }
        let to_path = registry.resolve_to_path(to)?;
        if self.filesystem.exists(&to_path) {
            return Err(EngineError::MoveConflict { path: to_path });
        }

        let bytes = self
            .filesystem
            .read(&from_path)
            .map_err(|e| EngineError::io(&from_path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| {
            EngineError::io(&from_path, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        let unit = SourceUnit::new(&from_path, text);
        let reflected = self.reflector.reflect(&unit)?;
        let class = reflected
            .class(from)
            .ok_or_else(|| EngineError::ClassNotFoundInSource {
                path: from_path.clone(),
                found: reflected.classes.len(),
            })?;

        let edits = rename_edits(&reflected, class, to, unit.text());
        let rewritten = unit.apply_all(&edits);

        self.filesystem
            .move_file(&from_path, &to_path)
            .map_err(|e| EngineError::MoveFailed {
                from: from_path.clone(),
                to: to_path.clone(),
                message: e.to_string(),
            })?;
        self.reflector.invalidate(&from_path);

        if let Err(e) = self
            .filesystem
            .write(&to_path, rewritten.text().as_bytes())
        {
            let rollback = match self.filesystem.move_file(&to_path, &from_path) {
                Ok(()) => "the move was rolled back".to_string(),
                Err(back) => format!("rolling back also failed: {}", back),
            };
            tracing::error!("class move {} -> {} failed after moving the file", from, to);
            return Err(EngineError::InconsistentMove {
                from: from_path,
                to: to_path,
                message: format!("{}; {}", e, rollback),
            });
        }

        tracing::info!("moved {} ({}) to {} ({})", from, from_path.display(), to, to_path.display());
        Ok(vec![from_path, to_path])
    }
}

/// Edits that rename `class` to `to` within its own file.
fn rename_edits(
    unit: &ReflectedUnit,
    class: &ReflectedClass,
    to: &ClassName,
    text: &str,
) -> Vec<SnippetEdit> {
    let edit = |range: OffsetRange, replacement: String| SnippetEdit {
        path: unit.path.clone(),
        target_range: range,
        replacement_text: replacement,
    };
    let mut edits = Vec::new();

    let target_ns = to.namespace();
    if class.name.namespace() != target_ns {
        match unit.namespace_at(class.name_span.start) {
            Some(ns) => match (ns.name_span, target_ns.is_empty()) {
                // `namespace Old;` is dropped entirely.
                (Some(_), true) if !ns.braced => {
                    let rest = text.get(ns.statement.end as usize..).unwrap_or("");
                    let blank = rest.len() - rest.trim_start_matches(['\r', '\n']).len();
                    edits.push(edit(
                        OffsetRange::new(ns.statement.start, ns.statement.end + blank as u32),
                        String::new(),
                    ));
                }
                // `namespace Old { … }` becomes `namespace { … }`.
                (Some(span), true) => {
                    edits.push(edit(OffsetRange::new(ns.keyword_end, span.end), String::new()));
                }
                (Some(span), false) => edits.push(edit(span, target_ns.to_string())),
                (None, false) => {
                    edits.push(edit(OffsetRange::at(ns.keyword_end), format!(" {}", target_ns)))
                }
                (None, true) => {}
            },
            None if !target_ns.is_empty() => edits.push(edit(
                OffsetRange::at(unit.header_end),
                format!("\n\nnamespace {};", target_ns),
            )),
            None => {}
        }
    }

    if class.name.short_name() != to.short_name() {
        edits.push(edit(class.name_span, to.short_name().to_string()));
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceRegistry;

    fn rename(text: &str, from: &str, to: &str) -> String {
        let reflector = Reflector::new("/nonexistent", Arc::new(SourceRegistry::default()));
        let unit = SourceUnit::new("Foo.php", text);
        let reflected = reflector.reflect(&unit).unwrap();
        let class = reflected.class(&ClassName::from_fqcn(from)).unwrap();
        let edits = rename_edits(&reflected, class, &ClassName::from_fqcn(to), text);
        unit.apply_all(&edits).text().to_string()
    }

    #[test]
    fn test_rename_namespace_and_short_name() {
        let text = "<?php\n\nnamespace App;\n\nclass Foo\n{\n}\n";
        assert_eq!(
            rename(text, "App\\Foo", "App\\Sub\\Bar"),
            "<?php\n\nnamespace App\\Sub;\n\nclass Bar\n{\n}\n"
        );
    }

    #[test]
    fn test_rename_into_global_namespace() {
        let text = "<?php\n\nnamespace App;\n\nclass Foo {}\n";
        assert_eq!(rename(text, "App\\Foo", "Foo"), "<?php\n\nclass Foo {}\n");
    }

    #[test]
    fn test_rename_out_of_global_namespace() {
        let text = "<?php\nclass Foo {}\n";
        let out = rename(text, "Foo", "App\\Foo");
        assert!(out.contains("namespace App;"));
        assert!(out.find("namespace App;") < out.find("class Foo"));
    }

    #[test]
    fn test_rename_braced_namespace() {
        let text = "<?php\nnamespace App {\n    class Foo {}\n}\n";
        assert_eq!(
            rename(text, "App\\Foo", "Lib\\Foo"),
            "<?php\nnamespace Lib {\n    class Foo {}\n}\n"
        );
    }
}

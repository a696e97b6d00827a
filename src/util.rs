/// Utility functions shared across the engine.
///
/// Name helpers (short names, builtin type detection, import-aware name
/// resolution) and small text helpers used when scanning source around
/// an offset.
use std::collections::BTreeMap;

use crate::types::ClassName;

/// Return the last `\`-separated segment of a (possibly qualified) name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

/// Check if a name is a PHP built-in type (not a class).
pub(crate) fn is_builtin_type(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "self"
            | "static"
            | "parent"
            | "string"
            | "int"
            | "float"
            | "bool"
            | "array"
            | "object"
            | "mixed"
            | "void"
            | "never"
            | "null"
            | "true"
            | "false"
            | "callable"
            | "iterable"
    )
}

/// Resolve a class reference as written in source to a [`ClassName`]
/// using the file's import table and namespace.
///
///   1. A leading `\` marks an already fully-qualified name.
///   2. The first segment of the name is looked up in the imports.
///   3. Otherwise the current namespace is prepended.
pub(crate) fn resolve_name(
    name: &str,
    imports: &BTreeMap<String, ClassName>,
    namespace: Option<&str>,
) -> ClassName {
    if let Some(fq) = name.strip_prefix('\\') {
        return ClassName::from_fqcn(fq);
    }

    if let Some(pos) = name.find('\\') {
        let first = &name[..pos];
        let rest = &name[pos..];
        if let Some(imported) = imports.get(first) {
            return ClassName::from_fqcn(&format!("{}{}", imported, rest));
        }
    } else if let Some(imported) = imports.get(name) {
        return imported.clone();
    }

    match namespace {
        Some(ns) if !ns.is_empty() => ClassName::from_fqcn(&format!("{}\\{}", ns, name)),
        _ => ClassName::from_fqcn(name),
    }
}

/// Whether `c` may appear inside a PHP identifier.
pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imports() -> BTreeMap<String, ClassName> {
        let mut map = BTreeMap::new();
        map.insert("Bar".to_string(), ClassName::from_fqcn("Vendor\\Lib\\Bar"));
        map.insert("Lib".to_string(), ClassName::from_fqcn("Vendor\\Lib"));
        map
    }

    #[test]
    fn test_resolve_fully_qualified() {
        let name = resolve_name("\\Other\\Thing", &imports(), Some("App"));
        assert_eq!(name.to_string(), "Other\\Thing");
    }

    #[test]
    fn test_resolve_imported_alias() {
        let name = resolve_name("Bar", &imports(), Some("App"));
        assert_eq!(name.to_string(), "Vendor\\Lib\\Bar");
    }

    #[test]
    fn test_resolve_qualified_through_import() {
        let name = resolve_name("Lib\\Baz", &imports(), Some("App"));
        assert_eq!(name.to_string(), "Vendor\\Lib\\Baz");
    }

    #[test]
    fn test_resolve_relative_to_namespace() {
        let name = resolve_name("Point", &imports(), Some("App\\Geo"));
        assert_eq!(name.to_string(), "App\\Geo\\Point");
        assert_eq!(name.namespace(), "App\\Geo");
        assert_eq!(name.short_name(), "Point");
    }

    #[test]
    fn test_resolve_global_without_namespace() {
        let name = resolve_name("Point", &BTreeMap::new(), None);
        assert!(name.is_global());
        assert_eq!(name.to_string(), "Point");
    }

    #[test]
    fn test_builtin_types() {
        assert!(is_builtin_type("int"));
        assert!(is_builtin_type("Self"));
        assert!(!is_builtin_type("Point"));
    }
}

use crate::types::{CompletionSuggestion, SuggestionKind};

use super::{CompletionContext, CompletionProvider, matches_prefix};

/// PHP magic methods.  They are invoked implicitly by the runtime rather
/// than called directly, so they are never suggested.
const MAGIC_METHODS: &[&str] = &[
    "__construct",
    "__destruct",
    "__clone",
    "__get",
    "__set",
    "__isset",
    "__unset",
    "__call",
    "__callStatic",
    "__invoke",
    "__toString",
    "__sleep",
    "__wakeup",
    "__serialize",
    "__unserialize",
    "__set_state",
    "__debugInfo",
];

fn is_magic_method(name: &str) -> bool {
    MAGIC_METHODS.iter().any(|&m| m.eq_ignore_ascii_case(name))
}

/// Suggests the members of the receiver after `->` / `?->`.
///
/// Methods come first (inserted as `name(` with the signature as detail),
/// then properties.  Static members are left out since `->` cannot reach
/// them.  An unresolved receiver yields nothing.
pub struct FetchProvider;

impl CompletionProvider for FetchProvider {
    fn name(&self) -> &str {
        "fetch"
    }

    fn provide(&self, ctx: &CompletionContext<'_>) -> Vec<CompletionSuggestion> {
        let Some(fetch) = &ctx.resolution.fetch else {
            return Vec::new();
        };
        let Some(members) = &fetch.members else {
            return Vec::new();
        };

        let methods = members
            .methods
            .iter()
            .map(|m| &m.method)
            .filter(|m| !m.is_static && !is_magic_method(&m.name))
            .filter(|m| matches_prefix(&m.name, &fetch.partial))
            .map(|m| CompletionSuggestion {
                label: m.name.clone(),
                kind: SuggestionKind::Method,
                insert_text: format!("{}(", m.name),
                detail: m.signature(),
            });

        let properties = members
            .properties
            .iter()
            .map(|p| &p.property)
            .filter(|p| !p.is_static)
            .filter(|p| matches_prefix(&p.name, &fetch.partial))
            .map(|p| CompletionSuggestion {
                label: p.name.clone(),
                kind: SuggestionKind::Property,
                insert_text: p.name.clone(),
                detail: p.declared_type.clone().unwrap_or_else(|| "mixed".to_string()),
            });

        methods.chain(properties).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_methods_are_case_insensitive() {
        assert!(is_magic_method("__construct"));
        assert!(is_magic_method("__TOSTRING"));
        assert!(!is_magic_method("construct"));
    }
}

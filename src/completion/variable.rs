use crate::types::{CompletionSuggestion, SuggestionKind};

use super::{CompletionContext, CompletionProvider, matches_prefix};

/// Suggests the variables visible at the offset, innermost scope first.
///
/// Silent after `->`; on a `$name` token only bindings starting with the
/// typed prefix are offered.
pub struct VariableProvider;

impl CompletionProvider for VariableProvider {
    fn name(&self) -> &str {
        "variable"
    }

    fn provide(&self, ctx: &CompletionContext<'_>) -> Vec<CompletionSuggestion> {
        let resolution = ctx.resolution;
        if resolution.fetch.is_some() {
            return Vec::new();
        }
        let prefix = resolution.variable_prefix.as_deref().unwrap_or("");

        resolution
            .scope
            .bindings
            .iter()
            .filter(|b| matches_prefix(&b.name, prefix))
            .map(|b| CompletionSuggestion {
                label: b.name.clone(),
                kind: SuggestionKind::Variable,
                insert_text: b.name.clone(),
                detail: if b.ty.is_unknown() {
                    "mixed".to_string()
                } else {
                    b.ty.to_string()
                },
            })
            .collect()
    }
}

/// Completion: merging suggestions from an ordered set of providers.
///
/// The engine resolves the offset once and hands the same
/// [`CompletionContext`] to every registered [`CompletionProvider`] in
/// registration order:
///
/// - **variable**: variables visible in the scope chain
/// - **fetch**: members of the receiver after `->` / `?->`
///
/// Results are concatenated in provider order and later duplicates by
/// (label, kind) are dropped.
mod fetch;
mod variable;

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::resolver::{OffsetResolution, OffsetResolver};
use crate::source::SourceUnit;
use crate::types::{CompletionSuggestion, SuggestionKind};

pub use fetch::FetchProvider;
pub use variable::VariableProvider;

/// Everything a provider may look at.  Providers only read it.
pub struct CompletionContext<'a> {
    pub unit: &'a SourceUnit,
    pub resolution: &'a OffsetResolution,
}

pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn provide(&self, ctx: &CompletionContext<'_>) -> Vec<CompletionSuggestion>;
}

pub struct CompletionEngine {
    resolver: Arc<OffsetResolver>,
    providers: Vec<Box<dyn CompletionProvider>>,
}

impl CompletionEngine {
    /// An engine with no providers.
    pub fn new(resolver: Arc<OffsetResolver>) -> Self {
        Self {
            resolver,
            providers: Vec::new(),
        }
    }

    /// An engine with the built-in providers: variable, then fetch.
    pub fn with_default_providers(resolver: Arc<OffsetResolver>) -> Self {
        let mut engine = Self::new(resolver);
        engine.register(Box::new(VariableProvider));
        engine.register(Box::new(FetchProvider));
        engine
    }

    pub fn register(&mut self, provider: Box<dyn CompletionProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn complete(&self, unit: &SourceUnit, offset: u32) -> Result<Vec<CompletionSuggestion>> {
        let resolution = self.resolver.resolve(unit, offset)?;
        let ctx = CompletionContext {
            unit,
            resolution: &resolution,
        };

        let mut seen: HashSet<(String, SuggestionKind)> = HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            let suggestions = provider.provide(&ctx);
            tracing::debug!("provider {} offered {} suggestions", provider.name(), suggestions.len());
            for suggestion in suggestions {
                if seen.insert((suggestion.label.clone(), suggestion.kind)) {
                    out.push(suggestion);
                }
            }
        }
        Ok(out)
    }
}

/// Case-insensitive prefix match.
pub(crate) fn matches_prefix(label: &str, prefix: &str) -> bool {
    label.to_lowercase().starts_with(&prefix.to_lowercase())
}

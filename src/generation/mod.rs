/// Snippet generation: textual edits that fill structural gaps.
///
/// Generators are registered under a kind identifier and invoked by
/// name.  Each one receives the target class name and a JSON object of
/// options, and returns a single [`SnippetEdit`]:
///
/// - **implement_missing_methods**: stubs for abstract and interface
///   methods the class does not implement
/// - **implement_missing_properties**: declarations for contract
///   properties and for properties only ever assigned through `$this`
/// - **class**: a new class, interface or trait skeleton
///
/// A generator with nothing to add returns a no-op edit.
mod class;
mod missing_methods;
mod missing_properties;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::reflector::{ReflectedUnit, Reflector};
use crate::types::{ClassName, ReflectedClass, SnippetEdit};

pub use class::ClassGenerator;
pub use missing_methods::ImplementMissingMethods;
pub use missing_properties::ImplementMissingProperties;

/// Options passed to a generator.  Unknown keys are ignored.
pub type GeneratorOptions = serde_json::Map<String, serde_json::Value>;

/// Indentation of generated members.
pub(crate) const INDENT: &str = "    ";

pub trait SnippetGenerator: Send + Sync {
    fn generate(&self, target: &ClassName, options: &GeneratorOptions) -> Result<SnippetEdit>;
}

#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Box<dyn SnippetGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the three built-in generators.
    pub fn with_default_generators(reflector: Arc<Reflector>) -> Self {
        let mut registry = Self::new();
        registry.register(
            "implement_missing_methods",
            Box::new(ImplementMissingMethods::new(Arc::clone(&reflector))),
        );
        registry.register(
            "implement_missing_properties",
            Box::new(ImplementMissingProperties::new(Arc::clone(&reflector))),
        );
        registry.register("class", Box::new(ClassGenerator::new(reflector)));
        registry
    }

    /// Register a generator, replacing any previous one of that kind.
    pub fn register(&mut self, kind: impl Into<String>, generator: Box<dyn SnippetGenerator>) {
        self.generators.insert(kind.into(), generator);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }

    pub fn generate(
        &self,
        kind: &str,
        target: &ClassName,
        options: &GeneratorOptions,
    ) -> Result<SnippetEdit> {
        let generator = self
            .generators
            .get(kind)
            .ok_or_else(|| EngineError::GeneratorNotFound {
                kind: kind.to_string(),
            })?;
        tracing::debug!("generating {} for {}", kind, target);
        generator.generate(target, options)
    }
}

/// The target class, the unit declaring it and that unit's path.
pub(crate) struct Target {
    pub path: PathBuf,
    pub unit: Arc<ReflectedUnit>,
    pub class: ReflectedClass,
}

impl Target {
    pub(crate) fn load(reflector: &Reflector, name: &ClassName) -> Result<Self> {
        let path = reflector.registry().resolve_to_path(name)?;
        let unit = reflector.reflect_path(&path)?;
        let class = unit
            .class(name)
            .cloned()
            .ok_or_else(|| EngineError::ClassNotFoundInSource {
                path: path.clone(),
                found: unit.classes.len(),
            })?;
        Ok(Self { path, unit, class })
    }

    /// The ancestors whose members form a contract for the class:
    /// every interface, and every abstract class or trait.
    pub(crate) fn contract_owners(&self, reflector: &Reflector) -> Vec<ReflectedClass> {
        reflector
            .ancestry(&self.class, Some(&self.unit))
            .into_iter()
            .skip(1)
            .collect()
    }
}

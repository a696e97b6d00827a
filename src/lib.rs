//! PHP source intelligence engine.
//!
//! The [`Engine`] wires the components together once and serves
//! synchronous requests:
//!
//! - **registry**: class name ↔ file path through PSR-4 prefixes
//! - **reflector**: parsed class models, cached per content hash
//! - **resolver**: scope and inferred type at an offset
//! - **completion**: ordered completion providers
//! - **generation**: snippet generators (missing methods/properties,
//!   class skeletons)
//! - **mover**: class moves through a filesystem backend
//!
//! Every path the engine accepts or returns is relative to the project
//! root; absolute paths under the root are accepted too.
pub mod completion;
pub mod composer;
pub mod config;
pub mod error;
pub mod generation;
pub mod mover;
mod parser;
pub mod reflector;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod types;
pub mod util;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use config::Config;
pub use error::{EngineError, Result};
pub use types::*;

use completion::CompletionEngine;
use generation::{GeneratorOptions, GeneratorRegistry};
use mover::ClassMover;
use reflector::{ClassExplanation, Reflector};
use registry::SourceRegistry;
use resolver::{OffsetResolution, OffsetResolver};
use source::SourceUnit;

pub struct Engine {
    root: PathBuf,
    reflector: Arc<Reflector>,
    resolver: Arc<OffsetResolver>,
    completion: CompletionEngine,
    generators: GeneratorRegistry,
    mover: ClassMover,
}

impl Engine {
    /// Build an engine with the built-in providers and generators.
    pub fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(SourceRegistry::new(config.autoload)?);
        let reflector = Arc::new(Reflector::new(&config.cwd, registry));
        let resolver = Arc::new(OffsetResolver::new(Arc::clone(&reflector)));
        let completion = CompletionEngine::with_default_providers(Arc::clone(&resolver));
        let generators = GeneratorRegistry::with_default_generators(Arc::clone(&reflector));
        let mover = ClassMover::new(
            Arc::clone(&reflector),
            config.filesystem.backend(&config.cwd),
        );

        tracing::debug!("engine ready for {}", config.cwd.display());
        Ok(Self {
            root: config.cwd,
            reflector,
            resolver,
            completion,
            generators,
            mover,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reflector(&self) -> &Reflector {
        &self.reflector
    }

    /// Register additional completion providers after the built-in ones.
    pub fn completion_mut(&mut self) -> &mut CompletionEngine {
        &mut self.completion
    }

    pub fn generators_mut(&mut self) -> &mut GeneratorRegistry {
        &mut self.generators
    }

    /// Rebuild the source registry from a new autoload table.  Cached
    /// reflections stay valid.
    pub fn reload_autoload(&self, config: &Config) -> Result<()> {
        let registry = SourceRegistry::new(config.autoload.clone())?;
        self.reflector.set_registry(Arc::new(registry));
        Ok(())
    }

    /// Make `path` project-relative.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    fn load(&self, path: &Path) -> Result<SourceUnit> {
        self.reflector.load(&self.relative_path(path))
    }

    pub fn resolve_offset(&self, path: &Path, offset: u32) -> Result<OffsetResolution> {
        self.resolver.resolve(&self.load(path)?, offset)
    }

    /// Resolve against text that may differ from the file on disk.
    pub fn resolve_offset_in(&self, unit: &SourceUnit, offset: u32) -> Result<OffsetResolution> {
        self.resolver.resolve(unit, offset)
    }

    pub fn complete(&self, path: &Path, offset: u32) -> Result<Vec<CompletionSuggestion>> {
        self.completion.complete(&self.load(path)?, offset)
    }

    pub fn complete_in(&self, unit: &SourceUnit, offset: u32) -> Result<Vec<CompletionSuggestion>> {
        self.completion.complete(unit, offset)
    }

    pub fn generate_snippet(
        &self,
        kind: &str,
        class: &ClassName,
        options: &GeneratorOptions,
    ) -> Result<SnippetEdit> {
        self.generators.generate(kind, class, options)
    }

    pub fn move_class(&self, from: &ClassName, to: &ClassName) -> Result<Vec<PathBuf>> {
        self.mover.move_class(from, to)
    }

    pub fn resolve_class_name(&self, path: &Path) -> Result<ClassName> {
        self.reflector
            .registry()
            .resolve_to_class_name(&self.relative_path(path))
    }

    pub fn resolve_path(&self, class: &ClassName) -> Result<PathBuf> {
        self.reflector.registry().resolve_to_path(class)
    }

    pub fn class_from_source(&self, path: &Path, text: &str) -> Result<ClassName> {
        self.reflector
            .class_from_source(&self.relative_path(path), text)
    }

    pub fn class_from_file(&self, path: &Path) -> Result<ClassName> {
        self.reflector.class_from_file(&self.relative_path(path))
    }

    pub fn explain(&self, path: &Path) -> Result<ClassExplanation> {
        self.reflector.explain(&self.relative_path(path))
    }
}

/// Reflection of source units into class models.
///
/// The [`Reflector`] parses a [`SourceUnit`] once per content hash and
/// keeps the resulting [`ReflectedUnit`] in a cache shared by every
/// request.  Cached units are immutable: a change to a file's text gives
/// it a new hash, and the new unit replaces the old one for that path.
///
/// Class lookups by name go through the [`SourceRegistry`]: the name is
/// mapped to a path, the file is read and reflected, and the class is
/// picked out of the unit.
///
/// # Inheritance
///
/// Member lookup follows PHP's precedence:
///
///   class own > traits > parent chain > implemented interfaces
///
/// A depth limit of 20 stops circular hierarchies.
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::parser::{extract_unit, with_program};
use crate::registry::SourceRegistry;
use crate::source::{ContentHash, SourceUnit};
use crate::types::*;

const MAX_DEPTH: u32 = 20;

/// A `namespace` declaration and the spans needed to rewrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// `None` for the global `namespace { }` block.
    pub name: Option<String>,
    pub name_span: Option<OffsetRange>,
    /// Offset just past the `namespace` keyword.
    pub keyword_end: u32,
    /// `namespace Foo;` for the unbraced form, `namespace Foo ` up to the
    /// brace for the braced form.
    pub statement: OffsetRange,
    /// The whole declaration including every statement it governs.
    pub span: OffsetRange,
    pub braced: bool,
    pub imports: BTreeMap<String, ClassName>,
}

/// Everything reflected from one source unit.
#[derive(Debug, Clone)]
pub struct ReflectedUnit {
    pub path: PathBuf,
    pub hash: ContentHash,
    pub namespaces: Vec<NamespaceDecl>,
    /// Imports declared outside any namespace block.
    pub imports: BTreeMap<String, ClassName>,
    /// End of the opening tag and any leading `declare` statements, where
    /// a namespace declaration would be inserted.
    pub header_end: u32,
    pub classes: Vec<ReflectedClass>,
}

impl ReflectedUnit {
    /// The innermost namespace declaration governing `offset`.
    pub fn namespace_at(&self, offset: u32) -> Option<&NamespaceDecl> {
        self.namespaces
            .iter()
            .rev()
            .find(|ns| ns.span.start <= offset && offset <= ns.span.end)
            .or_else(|| {
                // Text typed past the end of an unbraced namespace still
                // belongs to it.
                self.namespaces
                    .last()
                    .filter(|ns| !ns.braced && offset > ns.span.end)
            })
    }

    /// Namespace name and import table in effect at `offset`.
    pub fn name_context(&self, offset: u32) -> (Option<&str>, &BTreeMap<String, ClassName>) {
        match self.namespace_at(offset) {
            Some(ns) => (ns.name.as_deref(), &ns.imports),
            None => (None, &self.imports),
        }
    }

    /// The class-like whose body contains `offset`.
    pub fn class_at(&self, offset: u32) -> Option<&ReflectedClass> {
        self.classes
            .iter()
            .filter(|c| c.body.start <= offset && offset <= c.body.end)
            .min_by_key(|c| c.body.end - c.body.start)
    }

    pub fn class(&self, name: &ClassName) -> Option<&ReflectedClass> {
        self.classes.iter().find(|c| &c.name == name)
    }

    /// The single class-like declared in this unit.
    pub fn single_class(&self) -> Result<&ReflectedClass> {
        match self.classes.as_slice() {
            [class] => Ok(class),
            classes => Err(EngineError::ClassNotFoundInSource {
                path: self.path.clone(),
                found: classes.len(),
            }),
        }
    }
}

/// A class's own members merged with everything it inherits.
#[derive(Debug, Clone, Serialize)]
pub struct MemberTable {
    pub methods: Vec<InheritedMethod>,
    pub properties: Vec<InheritedProperty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InheritedMethod {
    pub declaring_class: ClassName,
    #[serde(flatten)]
    pub method: ReflectedMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct InheritedProperty {
    pub declaring_class: ClassName,
    #[serde(flatten)]
    pub property: ReflectedProperty,
}

impl MemberTable {
    pub fn method(&self, name: &str) -> Option<&InheritedMethod> {
        self.methods.iter().find(|m| m.method.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&InheritedProperty> {
        self.properties.iter().find(|p| p.property.name == name)
    }
}

/// A reflected class together with its merged member table, as reported
/// by [`Reflector::explain`].
#[derive(Debug, Clone, Serialize)]
pub struct ClassExplanation {
    pub path: PathBuf,
    #[serde(flatten)]
    pub class: ReflectedClass,
    pub members: MemberTable,
}

#[derive(Debug)]
pub struct Reflector {
    root: PathBuf,
    registry: RwLock<Arc<SourceRegistry>>,
    cache: Mutex<HashMap<PathBuf, Arc<ReflectedUnit>>>,
}

impl Reflector {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            root: root.into(),
            registry: RwLock::new(registry),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> Arc<SourceRegistry> {
        Arc::clone(&self.registry.read())
    }

    /// Swap in a rebuilt registry.  Cached units stay valid: they depend
    /// only on file contents.
    pub fn set_registry(&self, registry: Arc<SourceRegistry>) {
        *self.registry.write() = registry;
    }

    /// Read a project-relative file into a source unit.
    pub fn load(&self, path: &Path) -> Result<SourceUnit> {
        SourceUnit::load(&self.root, path)
    }

    /// Reflect a source unit, reusing the cached model when the content
    /// hash is unchanged.
    pub fn reflect(&self, unit: &SourceUnit) -> Result<Arc<ReflectedUnit>> {
        if let Some(cached) = self.cache.lock().get(unit.path())
            && &cached.hash == unit.hash()
        {
            tracing::debug!("reflection cache hit for {}", unit.path().display());
            return Ok(Arc::clone(cached));
        }

        tracing::debug!("reflecting {} ({})", unit.path().display(), unit.hash());
        let reflected = with_program(unit.path(), unit.text(), |program| {
            extract_unit(program, unit.text(), unit.path(), unit.hash().clone())
        })?;
        let reflected = Arc::new(reflected);

        self.cache
            .lock()
            .insert(unit.path().to_path_buf(), Arc::clone(&reflected));
        Ok(reflected)
    }

    /// Drop the cached unit for a path that moved or was deleted.
    pub fn invalidate(&self, path: &Path) {
        if self.cache.lock().remove(path).is_some() {
            tracing::debug!("invalidated reflection of {}", path.display());
        }
    }

    pub fn reflect_path(&self, path: &Path) -> Result<Arc<ReflectedUnit>> {
        let unit = self.load(path)?;
        self.reflect(&unit)
    }

    /// Locate a class by name through the registry and reflect it.
    pub fn reflect_class(&self, name: &ClassName) -> Result<ReflectedClass> {
        let path = self.registry().resolve_to_path(name)?;
        let unit = self.reflect_path(&path)?;
        unit.class(name)
            .cloned()
            .ok_or_else(|| EngineError::ClassNotFoundInSource {
                path,
                found: unit.classes.len(),
            })
    }

    /// Look a class up in `local` first, then through the registry.
    /// Failures degrade to `None`.
    pub fn find_class(&self, name: &ClassName, local: Option<&ReflectedUnit>) -> Option<ReflectedClass> {
        if let Some(class) = local.and_then(|unit| unit.class(name)) {
            return Some(class.clone());
        }
        match self.reflect_class(name) {
            Ok(class) => Some(class),
            Err(EngineError::SourceNotFound { .. }) => {
                tracing::debug!("class {} is not reachable through autoload", name);
                None
            }
            Err(e) => {
                tracing::warn!("could not reflect {}: {}", name, e);
                None
            }
        }
    }

    /// FQCN of the single class-like declared in `text`.
    pub fn class_from_source(&self, path: &Path, text: &str) -> Result<ClassName> {
        let unit = self.reflect(&SourceUnit::new(path, text))?;
        Ok(unit.single_class()?.name.clone())
    }

    /// FQCN of the single class-like declared in a project file.
    pub fn class_from_file(&self, path: &Path) -> Result<ClassName> {
        let unit = self.reflect_path(path)?;
        Ok(unit.single_class()?.name.clone())
    }

    /// The class declared in a file with its inherited members merged in.
    pub fn explain(&self, path: &Path) -> Result<ClassExplanation> {
        let unit = self.reflect_path(path)?;
        let class = unit.single_class()?.clone();
        let members = self.members(&class, Some(&unit));
        Ok(ClassExplanation {
            path: path.to_path_buf(),
            class,
            members,
        })
    }

    /// The class followed by every class-like it inherits from, in
    /// member-lookup order.  Each name appears once.
    pub fn ancestry(&self, class: &ReflectedClass, local: Option<&ReflectedUnit>) -> Vec<ReflectedClass> {
        let mut seen: HashSet<ClassName> = HashSet::new();
        let mut out = Vec::new();
        let mut interfaces: VecDeque<(ClassName, u32)> = VecDeque::new();

        seen.insert(class.name.clone());
        let mut current = Some(class.clone());
        let mut depth = 0;

        while let Some(cls) = current.take() {
            interfaces.extend(cls.implemented.iter().map(|i| (i.clone(), 0)));
            let traits = cls.traits.clone();
            let parent = cls.parent.clone();
            out.push(cls);
            self.push_traits(&traits, local, &mut seen, &mut out, 0);

            depth += 1;
            if depth > MAX_DEPTH {
                tracing::warn!("inheritance chain of {} exceeds depth limit", class.name);
                break;
            }
            current = parent
                .filter(|p| seen.insert(p.clone()))
                .and_then(|p| self.find_class(&p, local));
        }

        while let Some((name, depth)) = interfaces.pop_front() {
            if depth > MAX_DEPTH || !seen.insert(name.clone()) {
                continue;
            }
            if let Some(iface) = self.find_class(&name, local) {
                interfaces.extend(iface.implemented.iter().map(|i| (i.clone(), depth + 1)));
                out.push(iface);
            }
        }

        out
    }

    fn push_traits(
        &self,
        traits: &[ClassName],
        local: Option<&ReflectedUnit>,
        seen: &mut HashSet<ClassName>,
        out: &mut Vec<ReflectedClass>,
        depth: u32,
    ) {
        if depth > MAX_DEPTH {
            return;
        }
        for name in traits {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(trait_class) = self.find_class(name, local) {
                let nested = trait_class.traits.clone();
                out.push(trait_class);
                self.push_traits(&nested, local, seen, out, depth + 1);
            }
        }
    }

    /// Merge a class's members with those it inherits.
    ///
    /// The first declaration of a name along [`ancestry`](Self::ancestry)
    /// wins.  Private members of parent classes and interfaces are not
    /// inherited; private trait members are, since traits are copied into
    /// the using class.
    pub fn members(&self, class: &ReflectedClass, local: Option<&ReflectedUnit>) -> MemberTable {
        let mut table = MemberTable {
            methods: Vec::new(),
            properties: Vec::new(),
        };

        let own_traits = self.trait_closure(class, local);

        for owner in self.ancestry(class, local) {
            let inherited = owner.name != class.name && !own_traits.contains(&owner.name);

            for method in &owner.methods {
                if inherited && method.visibility == Visibility::Private {
                    continue;
                }
                if table.method(&method.name).is_some() {
                    continue;
                }
                table.methods.push(InheritedMethod {
                    declaring_class: owner.name.clone(),
                    method: method.clone(),
                });
            }

            for property in &owner.properties {
                if inherited && property.visibility == Visibility::Private {
                    continue;
                }
                if table.property(&property.name).is_some() {
                    continue;
                }
                table.properties.push(InheritedProperty {
                    declaring_class: owner.name.clone(),
                    property: property.clone(),
                });
            }
        }

        table
    }

    /// Names of the traits `class` uses directly or through other traits.
    fn trait_closure(&self, class: &ReflectedClass, local: Option<&ReflectedUnit>) -> HashSet<ClassName> {
        let mut seen = HashSet::new();
        seen.insert(class.name.clone());
        let mut out = Vec::new();
        self.push_traits(&class.traits, local, &mut seen, &mut out, 0);
        out.into_iter().map(|t| t.name).collect()
    }
}

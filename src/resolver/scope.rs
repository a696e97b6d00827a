/// Lexical scopes and the variable bindings recorded in them.
///
/// Scopes for one source unit live in a [`ScopeForest`] arena.  A scope
/// refers to its parent by [`ScopeId`]; the link is only used to walk
/// outward during lookup.
use serde::Serialize;

use crate::types::{InferredType, OffsetRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    File,
    Function,
    Method,
    Closure,
    ArrowFunction,
}

/// A variable binding recorded at an assignment or declaration site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    /// Variable name including the `$`.
    pub name: String,
    /// The binding is visible from this offset on.
    pub offset: u32,
    #[serde(rename = "type")]
    pub ty: InferredType,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub range: OffsetRange,
    pub parent: Option<ScopeId>,
    /// Kept sorted by offset.
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone)]
pub struct ScopeForest {
    scopes: Vec<Scope>,
}

impl ScopeForest {
    /// A forest holding only the file scope `[0, len)`.
    pub fn new(len: u32) -> Self {
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::File,
                range: OffsetRange::new(0, len),
                parent: None,
                bindings: Vec::new(),
            }],
        }
    }

    pub fn file_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Open a child scope.  The range is clamped into the parent's so
    /// containment holds even for spans the parser reports loosely.
    pub fn open(&mut self, parent: ScopeId, kind: ScopeKind, range: OffsetRange) -> ScopeId {
        let outer = self.scopes[parent.0].range;
        let start = range.start.clamp(outer.start, outer.end);
        let end = range.end.clamp(start, outer.end);
        self.scopes.push(Scope {
            kind,
            range: OffsetRange::new(start, end),
            parent: Some(parent),
            bindings: Vec::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn bind(&mut self, scope: ScopeId, name: impl Into<String>, offset: u32, ty: InferredType) {
        let bindings = &mut self.scopes[scope.0].bindings;
        let pos = bindings.partition_point(|b| b.offset <= offset);
        bindings.insert(
            pos,
            Binding {
                name: name.into(),
                offset,
                ty,
            },
        );
    }

    /// The innermost scope containing `offset`.  Offsets outside every
    /// recorded scope belong to the file scope.
    pub fn scope_at(&self, offset: u32) -> ScopeId {
        let mut current = self.file_scope();
        loop {
            // Children are opened after their parent, so a forward scan
            // from the current scope finds them.
            let child = self
                .scopes
                .iter()
                .enumerate()
                .skip(current.0 + 1)
                .find(|(_, s)| {
                    s.parent == Some(current) && s.range.start <= offset && offset < s.range.end
                })
                .map(|(i, _)| ScopeId(i));
            match child {
                Some(id) => current = id,
                None => return current,
            }
        }
    }

    /// The chain from `scope` out to the file scope.
    pub fn chain(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |id| self.scopes[id.0].parent)
    }

    /// Type of `name` at `offset`: the nearest preceding binding in the
    /// scope, walking outward through parents when there is none.
    pub fn lookup(&self, scope: ScopeId, name: &str, offset: u32) -> InferredType {
        for id in self.chain(scope) {
            if let Some(binding) = self.scopes[id.0]
                .bindings
                .iter()
                .rev()
                .find(|b| b.name == name && b.offset <= offset)
            {
                return binding.ty.clone();
            }
        }
        InferredType::Unknown
    }

    /// Every binding visible at `offset`, innermost scope first.  A name
    /// already seen shadows the same name further out, and within one
    /// scope the latest preceding binding wins.
    pub fn visible(&self, scope: ScopeId, offset: u32) -> Vec<Binding> {
        let mut out: Vec<Binding> = Vec::new();
        for id in self.chain(scope) {
            let mut local: Vec<Binding> = Vec::new();
            for binding in self.scopes[id.0].bindings.iter().filter(|b| b.offset <= offset) {
                match local.iter_mut().find(|b| b.name == binding.name) {
                    Some(existing) => *existing = binding.clone(),
                    None => local.push(binding.clone()),
                }
            }
            for binding in local {
                if !out.iter().any(|b| b.name == binding.name) {
                    out.push(binding);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassName;

    fn class(name: &str) -> InferredType {
        InferredType::Class(ClassName::from_fqcn(name))
    }

    #[test]
    fn test_lookup_is_offset_ordered() {
        let mut forest = ScopeForest::new(100);
        let file = forest.file_scope();
        forest.bind(file, "$x", 10, class("A"));
        forest.bind(file, "$x", 50, class("B"));

        assert!(forest.lookup(file, "$x", 5).is_unknown());
        assert_eq!(forest.lookup(file, "$x", 20), class("A"));
        assert_eq!(forest.lookup(file, "$x", 60), class("B"));
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut forest = ScopeForest::new(100);
        let file = forest.file_scope();
        forest.bind(file, "$outer", 0, class("A"));
        let inner = forest.open(file, ScopeKind::Closure, OffsetRange::new(20, 40));
        forest.bind(inner, "$outer", 30, class("B"));

        assert_eq!(forest.scope_at(25), inner);
        assert_eq!(forest.scope_at(45), file);
        assert_eq!(forest.lookup(inner, "$outer", 25), class("A"));
        assert_eq!(forest.lookup(inner, "$outer", 35), class("B"));
    }

    #[test]
    fn test_child_ranges_are_contained() {
        let mut forest = ScopeForest::new(50);
        let file = forest.file_scope();
        let child = forest.open(file, ScopeKind::Function, OffsetRange::new(10, 80));
        let range = forest.get(child).range;
        assert!(forest.get(file).range.encloses(&range));
    }

    #[test]
    fn test_visible_shadows_outer_bindings() {
        let mut forest = ScopeForest::new(100);
        let file = forest.file_scope();
        forest.bind(file, "$a", 0, class("Outer"));
        forest.bind(file, "$b", 0, InferredType::Unknown);
        let inner = forest.open(file, ScopeKind::Method, OffsetRange::new(10, 90));
        forest.bind(inner, "$a", 10, class("Inner"));

        let visible = forest.visible(inner, 50);
        let names: Vec<&str> = visible.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["$a", "$b"]);
        assert_eq!(visible[0].ty, class("Inner"));
    }
}

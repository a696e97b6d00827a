use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::reflector::Reflector;
use crate::types::{
    ClassLikeKind, ClassName, OffsetRange, ReflectedClass, ReflectedMethod, SnippetEdit,
};
use crate::util::{is_builtin_type, is_ident_char, resolve_name};

use super::{GeneratorOptions, INDENT, SnippetGenerator, Target};

/// Stubs every interface method and inherited abstract method the class
/// does not implement, inserted before its closing brace.
///
/// A method counts as implemented when the class declares it or when a
/// parent class or used trait has a concrete body for it.  Names compare
/// case-insensitively, as PHP method names do.
///
/// Class names in parameter and return types are written fully
/// qualified against the declaring class-like, so a stub means the same
/// thing in the target's namespace.  Default values are copied as
/// written.
pub struct ImplementMissingMethods {
    reflector: Arc<Reflector>,
}

impl ImplementMissingMethods {
    pub fn new(reflector: Arc<Reflector>) -> Self {
        Self { reflector }
    }

    fn missing(&self, target: &Target) -> Vec<ReflectedMethod> {
        let owners = target.contract_owners(&self.reflector);

        let mut implemented: HashSet<String> = target
            .class
            .methods
            .iter()
            .map(|m| m.name.to_lowercase())
            .collect();
        for owner in owners.iter().filter(|o| o.kind != ClassLikeKind::Interface) {
            implemented.extend(
                owner
                    .methods
                    .iter()
                    .filter(|m| !m.is_abstract)
                    .map(|m| m.name.to_lowercase()),
            );
        }

        let mut out: Vec<ReflectedMethod> = Vec::new();
        for owner in &owners {
            for method in &owner.methods {
                let required = owner.kind == ClassLikeKind::Interface || method.is_abstract;
                let key = method.name.to_lowercase();
                if required && !implemented.contains(&key) {
                    implemented.insert(key);
                    out.push(qualified(method, owner));
                }
            }
        }
        out
    }
}

impl SnippetGenerator for ImplementMissingMethods {
    fn generate(&self, target: &ClassName, _options: &GeneratorOptions) -> Result<SnippetEdit> {
        let target = Target::load(&self.reflector, target)?;
        let closing = target.class.body.end.saturating_sub(1);

        if target.class.kind == ClassLikeKind::Interface {
            tracing::debug!("{} is an interface; no stubs to generate", target.class.name);
            return Ok(SnippetEdit::noop(target.path, closing));
        }

        let missing = self.missing(&target);
        if missing.is_empty() {
            return Ok(SnippetEdit::noop(target.path, closing));
        }

        let mut text = String::new();
        for method in &missing {
            text.push_str(&method_stub(method));
        }

        tracing::debug!("stubbing {} methods in {}", missing.len(), target.class.name);
        Ok(SnippetEdit {
            path: target.path,
            target_range: OffsetRange::at(closing),
            replacement_text: text,
        })
    }
}

/// `method` with the class names in its type hints fully qualified
/// against `owner`.
fn qualified(method: &ReflectedMethod, owner: &ReflectedClass) -> ReflectedMethod {
    let mut method = method.clone();
    for param in &mut method.parameters {
        param.declared_type = param.declared_type.as_deref().map(|t| qualify_type(t, owner));
    }
    method.return_type = method.return_type.as_deref().map(|t| qualify_type(t, owner));
    method
}

/// Rewrite every name in a type hint, keeping `?`, `|`, `&`, parentheses
/// and spacing as written.
fn qualify_type(hint: &str, owner: &ReflectedClass) -> String {
    let is_name_char = |c: char| is_ident_char(c) || c == '\\';
    let mut out = String::with_capacity(hint.len());
    let mut rest = hint;
    while let Some(start) = rest.find(is_name_char) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let len = tail.find(|c: char| !is_name_char(c)).unwrap_or(tail.len());
        out.push_str(&qualify_name(&tail[..len], owner));
        rest = &tail[len..];
    }
    out.push_str(rest);
    out
}

fn qualify_name(name: &str, owner: &ReflectedClass) -> String {
    if name.starts_with('\\') {
        return name.to_string();
    }
    // `self` and `parent` name the declaring class-like, except in traits
    // where they bind to the using class.
    let class = match name.to_ascii_lowercase().as_str() {
        "self" if owner.kind != ClassLikeKind::Trait => owner.name.clone(),
        "parent" if owner.kind != ClassLikeKind::Trait => match owner.parent {
            Some(ref parent) => parent.clone(),
            None => return name.to_string(),
        },
        lower if is_builtin_type(lower) => return name.to_string(),
        _ => resolve_name(name, &owner.imports, Some(owner.name.namespace())),
    };
    format!("\\{}", class)
}

fn method_stub(method: &ReflectedMethod) -> String {
    let modifier = if method.is_static { " static" } else { "" };
    format!(
        "\n{indent}{}{} function {}\n{indent}{{\n{indent}}}\n",
        method.visibility.keyword(),
        modifier,
        method.signature(),
        indent = INDENT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReflectedParameter, Visibility};

    #[test]
    fn test_method_stub_copies_signature() {
        let method = ReflectedMethod {
            name: "baz".to_string(),
            visibility: Visibility::Public,
            parameters: vec![ReflectedParameter {
                name: "limit".to_string(),
                declared_type: Some("?int".to_string()),
                default_value: Some("null".to_string()),
                is_variadic: false,
                is_reference: false,
            }],
            return_type: Some("int".to_string()),
            is_abstract: true,
            is_static: false,
        };
        assert_eq!(
            method_stub(&method),
            "\n    public function baz(?int $limit = null): int\n    {\n    }\n"
        );
    }

    fn owner(source: &str) -> ReflectedClass {
        let reflector = Reflector::new(
            "/nonexistent",
            Arc::new(crate::registry::SourceRegistry::default()),
        );
        let unit = reflector
            .reflect(&crate::source::SourceUnit::new("Owner.php", source))
            .unwrap();
        unit.classes[0].clone()
    }

    #[test]
    fn test_qualify_type_resolves_names_against_owner() {
        let owner = owner(concat!(
            "<?php\n",
            "namespace App\\Contract;\n",
            "use Vendor\\Clock;\n",
            "interface Repo {}\n",
        ));
        assert_eq!(qualify_type("?Item", &owner), "?\\App\\Contract\\Item");
        assert_eq!(qualify_type("Clock|null", &owner), "\\Vendor\\Clock|null");
        assert_eq!(
            qualify_type("(Item&Countable)|int", &owner),
            "(\\App\\Contract\\Item&\\App\\Contract\\Countable)|int"
        );
        assert_eq!(qualify_type("\\Other\\Thing", &owner), "\\Other\\Thing");
        assert_eq!(qualify_type("self", &owner), "\\App\\Contract\\Repo");
        assert_eq!(qualify_type("static", &owner), "static");
        assert_eq!(qualify_type("array", &owner), "array");
    }
}

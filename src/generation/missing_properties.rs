use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::reflector::Reflector;
use crate::types::{ClassLikeKind, ClassName, OffsetRange, ReflectedProperty, SnippetEdit};

use super::{GeneratorOptions, INDENT, SnippetGenerator, Target};

/// Declares properties the class is expected to have but does not.
///
/// The contract is, in order:
///
///   1. Properties declared on implemented interfaces and abstract
///      properties of ancestors.
///   2. Properties assigned through `$this->name = …` in the class's own
///      methods without a declaration anywhere in the hierarchy.
///
/// Declarations are inserted right after the class's opening brace.
pub struct ImplementMissingProperties {
    reflector: Arc<Reflector>,
}

impl ImplementMissingProperties {
    pub fn new(reflector: Arc<Reflector>) -> Self {
        Self { reflector }
    }

    fn missing(&self, target: &Target) -> Vec<ReflectedProperty> {
        let owners = target.contract_owners(&self.reflector);

        let mut declared: HashSet<&str> = target
            .class
            .properties
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        for owner in owners.iter().filter(|o| o.kind != ClassLikeKind::Interface) {
            declared.extend(
                owner
                    .properties
                    .iter()
                    .filter(|p| !p.is_abstract)
                    .map(|p| p.name.as_str()),
            );
        }

        let mut out: Vec<ReflectedProperty> = Vec::new();
        let push = |property: &ReflectedProperty, out: &mut Vec<ReflectedProperty>| {
            if !declared.contains(property.name.as_str())
                && !out.iter().any(|p| p.name == property.name)
            {
                out.push(ReflectedProperty {
                    is_abstract: false,
                    ..property.clone()
                });
            }
        };

        for owner in &owners {
            for property in &owner.properties {
                if owner.kind == ClassLikeKind::Interface || property.is_abstract {
                    push(property, &mut out);
                }
            }
        }
        for property in &target.class.assigned_properties {
            push(property, &mut out);
        }
        out
    }
}

impl SnippetGenerator for ImplementMissingProperties {
    fn generate(&self, target: &ClassName, _options: &GeneratorOptions) -> Result<SnippetEdit> {
        let target = Target::load(&self.reflector, target)?;
        let opening = (target.class.body.start + 1).min(target.class.body.end);

        if target.class.kind == ClassLikeKind::Interface {
            tracing::debug!("{} is an interface; no properties to declare", target.class.name);
            return Ok(SnippetEdit::noop(target.path, opening));
        }

        let missing = self.missing(&target);
        if missing.is_empty() {
            return Ok(SnippetEdit::noop(target.path, opening));
        }

        let mut text: String = missing.iter().map(property_declaration).collect();
        // Keep the closing brace of an empty `{}` body on its own line.
        let source = self.reflector.load(&target.path)?;
        let rest = source.text().get(opening as usize..).unwrap_or("");
        if !rest.starts_with('\n') && !rest.starts_with("\r\n") {
            text.push('\n');
        }

        tracing::debug!("declaring {} properties in {}", missing.len(), target.class.name);
        Ok(SnippetEdit {
            path: target.path,
            target_range: OffsetRange::at(opening),
            replacement_text: text,
        })
    }
}

fn property_declaration(property: &ReflectedProperty) -> String {
    let mut out = format!("\n{}{}", INDENT, property.visibility.keyword());
    if property.is_static {
        out.push_str(" static");
    }
    if let Some(ref ty) = property.declared_type {
        out.push(' ');
        out.push_str(ty);
    }
    out.push_str(" $");
    out.push_str(&property.name);
    out.push(';');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;

    #[test]
    fn test_property_declaration() {
        let property = ReflectedProperty {
            name: "repo".to_string(),
            visibility: Visibility::Private,
            declared_type: Some("Repository".to_string()),
            is_static: false,
            is_abstract: false,
        };
        assert_eq!(
            property_declaration(&property),
            "\n    private Repository $repo;"
        );

        let untyped = ReflectedProperty {
            declared_type: None,
            visibility: Visibility::Public,
            ..property
        };
        assert_eq!(property_declaration(&untyped), "\n    public $repo;");
    }
}

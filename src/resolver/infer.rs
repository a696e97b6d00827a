/// Type-hint resolution and member type lookup.
///
/// Hints are resolved textually against the import table and namespace of
/// the code they were written in.  Anything that cannot be pinned to a
/// single class or scalar degrades to [`InferredType::Unknown`].
use std::collections::BTreeMap;

use crate::reflector::{ReflectedUnit, Reflector};
use crate::types::{ClassName, InferredType, ReflectedClass};
use crate::util::{is_builtin_type, resolve_name};

/// Where a type hint was written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NameContext<'a> {
    pub namespace: Option<&'a str>,
    pub imports: &'a BTreeMap<String, ClassName>,
    /// What `self` refers to.
    pub self_class: Option<&'a ClassName>,
    /// What `static` refers to; the receiver when resolving a member.
    pub static_class: Option<&'a ClassName>,
    pub parent_class: Option<&'a ClassName>,
}

impl<'a> NameContext<'a> {
    /// Context of code written inside `class`.
    pub(crate) fn of_class(class: &'a ReflectedClass) -> Self {
        Self {
            namespace: Some(class.name.namespace()),
            imports: &class.imports,
            self_class: Some(&class.name),
            static_class: Some(&class.name),
            parent_class: class.parent.as_ref(),
        }
    }
}

/// Resolve a hint such as `?Foo`, `Foo|null`, `self` or `int`.
///
/// Nullable hints resolve like the underlying type; a union resolves only
/// when exactly one non-null member remains.  Intersections and DNF types
/// are Unknown.
pub(crate) fn type_from_hint(hint: &str, ctx: &NameContext<'_>) -> InferredType {
    let hint = hint.trim();
    let hint = hint.strip_prefix('?').unwrap_or(hint);
    if hint.is_empty() || hint.contains('&') || hint.contains('(') {
        return InferredType::Unknown;
    }

    let members: Vec<&str> = hint
        .split('|')
        .map(str::trim)
        .filter(|m| !m.eq_ignore_ascii_case("null"))
        .collect();

    match members.as_slice() {
        [single] => single_type(single, ctx),
        _ => InferredType::Unknown,
    }
}

fn single_type(name: &str, ctx: &NameContext<'_>) -> InferredType {
    let class = |c: Option<&ClassName>| {
        c.map(|c| InferredType::Class(c.clone()))
            .unwrap_or(InferredType::Unknown)
    };

    match name.to_ascii_lowercase().as_str() {
        "self" => class(ctx.self_class),
        "static" | "$this" => class(ctx.static_class),
        "parent" => class(ctx.parent_class),
        "mixed" => InferredType::Unknown,
        lower if is_builtin_type(lower) => InferredType::Scalar(lower.to_string()),
        _ => InferredType::Class(resolve_name(name, ctx.imports, ctx.namespace)),
    }
}

/// Declared type of property `name` on an instance of `receiver`.
pub(crate) fn property_type(
    reflector: &Reflector,
    receiver: &ClassName,
    name: &str,
    local: Option<&ReflectedUnit>,
) -> InferredType {
    let Some(class) = reflector.find_class(receiver, local) else {
        return InferredType::Unknown;
    };
    for owner in reflector.ancestry(&class, local) {
        if let Some(property) = owner.property(name) {
            return member_type(property.declared_type.as_deref(), &owner, receiver);
        }
    }
    tracing::debug!("property {}::${} not found", receiver, name);
    InferredType::Unknown
}

/// Declared return type of method `name` called on `receiver`.
pub(crate) fn method_return_type(
    reflector: &Reflector,
    receiver: &ClassName,
    name: &str,
    local: Option<&ReflectedUnit>,
) -> InferredType {
    let Some(class) = reflector.find_class(receiver, local) else {
        return InferredType::Unknown;
    };
    for owner in reflector.ancestry(&class, local) {
        if let Some(method) = owner
            .methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
        {
            return member_type(method.return_type.as_deref(), &owner, receiver);
        }
    }
    tracing::debug!("method {}::{}() not found", receiver, name);
    InferredType::Unknown
}

/// A member's hint is written in its declaring class; `static` still
/// means the receiver.
fn member_type(hint: Option<&str>, owner: &ReflectedClass, receiver: &ClassName) -> InferredType {
    let Some(hint) = hint else {
        return InferredType::Unknown;
    };
    let ctx = NameContext {
        static_class: Some(receiver),
        ..NameContext::of_class(owner)
    };
    type_from_hint(hint, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(imports: &'a BTreeMap<String, ClassName>, this: &'a ClassName) -> NameContext<'a> {
        NameContext {
            namespace: Some("App"),
            imports,
            self_class: Some(this),
            static_class: Some(this),
            parent_class: None,
        }
    }

    #[test]
    fn test_nullable_and_union_hints() {
        let imports = BTreeMap::new();
        let this = ClassName::from_fqcn("App\\Foo");
        let ctx = ctx(&imports, &this);

        assert_eq!(type_from_hint("?Bar", &ctx).to_string(), "App\\Bar");
        assert_eq!(type_from_hint("Bar|null", &ctx).to_string(), "App\\Bar");
        assert!(type_from_hint("Bar|Baz", &ctx).is_unknown());
        assert!(type_from_hint("Bar&Baz", &ctx).is_unknown());
        assert!(type_from_hint("mixed", &ctx).is_unknown());
    }

    #[test]
    fn test_keyword_hints() {
        let imports = BTreeMap::new();
        let this = ClassName::from_fqcn("App\\Foo");
        let ctx = ctx(&imports, &this);

        assert_eq!(type_from_hint("self", &ctx).to_string(), "App\\Foo");
        assert_eq!(type_from_hint("static", &ctx).to_string(), "App\\Foo");
        assert!(type_from_hint("parent", &ctx).is_unknown());
        assert_eq!(
            type_from_hint("INT", &ctx),
            InferredType::Scalar("int".to_string())
        );
    }
}

use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::reflector::Reflector;
use crate::types::{ClassLikeKind, ClassName, OffsetRange, SnippetEdit};

use super::{GeneratorOptions, SnippetGenerator};

const GENERATOR: &str = "class";

/// Emits the full source of a new class-like for a name that has no file
/// yet.  The edit targets the start of the path the name resolves to.
///
/// Options: `type` is one of `class` (default), `interface`, `trait`.
pub struct ClassGenerator {
    reflector: Arc<Reflector>,
}

impl ClassGenerator {
    pub fn new(reflector: Arc<Reflector>) -> Self {
        Self { reflector }
    }
}

impl SnippetGenerator for ClassGenerator {
    fn generate(&self, target: &ClassName, options: &GeneratorOptions) -> Result<SnippetEdit> {
        let kind = kind_option(options)?;
        let path = self.reflector.registry().resolve_to_path(target)?;

        Ok(SnippetEdit {
            path,
            target_range: OffsetRange::at(0),
            replacement_text: skeleton(target, kind),
        })
    }
}

fn kind_option(options: &GeneratorOptions) -> Result<ClassLikeKind> {
    let Some(value) = options.get("type") else {
        return Ok(ClassLikeKind::Class);
    };
    match value.as_str() {
        Some("class") => Ok(ClassLikeKind::Class),
        Some("interface") => Ok(ClassLikeKind::Interface),
        Some("trait") => Ok(ClassLikeKind::Trait),
        _ => Err(EngineError::InvalidOption {
            generator: GENERATOR.to_string(),
            option: "type".to_string(),
            value: value.to_string(),
        }),
    }
}

fn skeleton(name: &ClassName, kind: ClassLikeKind) -> String {
    let mut out = String::from("<?php\n\n");
    if !name.is_global() {
        out.push_str(&format!("namespace {};\n\n", name.namespace()));
    }
    out.push_str(&format!("{} {}\n{{\n}}\n", kind.keyword(), name.short_name()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> GeneratorOptions {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_skeleton_with_namespace() {
        let name = ClassName::from_fqcn("App\\Model\\User");
        assert_eq!(
            skeleton(&name, ClassLikeKind::Trait),
            "<?php\n\nnamespace App\\Model;\n\ntrait User\n{\n}\n"
        );
    }

    #[test]
    fn test_skeleton_in_global_namespace() {
        let name = ClassName::from_fqcn("Thing");
        assert_eq!(
            skeleton(&name, ClassLikeKind::Class),
            "<?php\n\nclass Thing\n{\n}\n"
        );
    }

    #[test]
    fn test_kind_option() {
        assert_eq!(kind_option(&options(json!({}))).unwrap(), ClassLikeKind::Class);
        assert_eq!(
            kind_option(&options(json!({"type": "interface", "other": 1}))).unwrap(),
            ClassLikeKind::Interface
        );
        let err = kind_option(&options(json!({"type": "enum"}))).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOption { option, .. } if option == "type"));
    }
}

/// PHP parsing and AST extraction.
///
/// This module wraps the mago_syntax parser and turns its AST into the
/// engine's owned reflection model, so nothing downstream depends on the
/// parser's arena lifetime.
///
/// Sub-modules:
/// - [`classes`]: Class, interface, and trait extraction
/// - [`use_statements`]: `use` statement and namespace extraction
mod classes;
mod use_statements;

use std::panic;
use std::path::Path;

use bumpalo::Bump;
use mago_span::HasSpan;
use mago_syntax::ast::*;
use mago_syntax::parser::parse_file_content;

use crate::error::{EngineError, Result};
use crate::types::{OffsetRange, ReflectedParameter, Visibility};

pub(crate) use classes::extract_unit;

/// Parse `content` and hand the program to `f`.
///
/// The arena lives only for the duration of the call, so `f` must
/// extract owned data.  Any parse error aborts with
/// [`EngineError::Syntax`] at the first error's offset: no partially
/// recovered program is ever handed out.
///
/// The mago-syntax parser contains `unreachable!()` and `.expect()`
/// calls that can panic on malformed PHP; a panic is caught and reported
/// as a syntax error at offset 0.
pub(crate) fn with_program<R>(
    path: &Path,
    content: &str,
    f: impl FnOnce(&Program<'_>) -> R,
) -> Result<R> {
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let arena = Bump::new();
        let file_id = mago_database::file::FileId::new(&path.to_string_lossy());
        let program = parse_file_content(&arena, file_id, content);

        if let Some(error) = program.errors.iter().next() {
            return Err(EngineError::Syntax {
                path: path.to_path_buf(),
                offset: error.span().start.offset,
                message: error.to_string(),
            });
        }

        Ok(f(program))
    }));

    match result {
        Ok(inner) => inner,
        Err(_) => {
            tracing::error!("parser panicked while parsing {}", path.display());
            Err(EngineError::Syntax {
                path: path.to_path_buf(),
                offset: 0,
                message: "parser panicked".to_string(),
            })
        }
    }
}

/// Convert a node's span into an [`OffsetRange`].
pub(crate) fn range_of(node: &impl HasSpan) -> OffsetRange {
    let span = node.span();
    OffsetRange::new(span.start.offset, span.end.offset)
}

/// The source text covered by a node.
pub(crate) fn text_of<'c>(node: &impl HasSpan, content: &'c str) -> &'c str {
    let range = range_of(node);
    content.get(range.as_usize()).unwrap_or("")
}

/// A type hint exactly as written, with runs of whitespace collapsed.
pub(crate) fn hint_text(hint: &Hint, content: &str) -> String {
    text_of(hint, content)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract parameter information from a function-like parameter list.
pub(crate) fn extract_parameters(
    parameter_list: &FunctionLikeParameterList,
    content: &str,
) -> Vec<ReflectedParameter> {
    parameter_list
        .parameters
        .iter()
        .map(|param| {
            let raw_name = param.variable.name;
            let default_value = param.default_value.as_ref().map(|default| {
                text_of(default, content)
                    .trim()
                    .trim_start_matches('=')
                    .trim()
                    .to_string()
            });

            ReflectedParameter {
                name: raw_name.strip_prefix('$').unwrap_or(raw_name).to_string(),
                declared_type: param.hint.as_ref().map(|h| hint_text(h, content)),
                default_value,
                is_variadic: param.ellipsis.is_some(),
                is_reference: param.ampersand.is_some(),
            }
        })
        .collect()
}

/// Extract visibility from a set of modifiers.
/// Defaults to `Public` if no visibility modifier is present.
pub(crate) fn extract_visibility<'a>(
    modifiers: impl Iterator<Item = &'a Modifier<'a>>,
) -> Visibility {
    for m in modifiers {
        if m.is_private() {
            return Visibility::Private;
        }
        if m.is_protected() {
            return Visibility::Protected;
        }
        if m.is_public() {
            return Visibility::Public;
        }
    }
    Visibility::Public
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_source_reaches_callback() {
        let count = with_program(Path::new("a.php"), "<?php\n$a = 1;\n$b = 2;\n", |program| {
            program.statements.iter().count()
        })
        .expect("valid source");
        // Opening tag plus two expression statements.
        assert!(count >= 2);
    }

    #[test]
    fn test_invalid_source_is_syntax_error() {
        let err = with_program(Path::new("bad.php"), "<?php\nclass {\n", |_| ()).unwrap_err();
        match err {
            EngineError::Syntax { path, .. } => assert_eq!(path, Path::new("bad.php")),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}

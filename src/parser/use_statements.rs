/// `use` statement and namespace extraction.
///
/// Builds the per-namespace import table: short (imported or aliased)
/// name to the fully-qualified [`ClassName`] it stands for.  Function and
/// constant imports are ignored.
use std::collections::BTreeMap;

use mago_syntax::ast::*;

use crate::types::ClassName;
use crate::util::short_name;

pub(crate) type ImportTable = BTreeMap<String, ClassName>;

/// Collect class imports from one statement list without descending
/// into namespace blocks.  Each namespace body has its own table.
pub(crate) fn collect_imports<'a>(
    statements: impl Iterator<Item = &'a Statement<'a>>,
    imports: &mut ImportTable,
) {
    for statement in statements {
        if let Statement::Use(use_stmt) = statement {
            extract_use_items(&use_stmt.items, imports);
        }
    }
}

fn extract_use_items(items: &UseItems, imports: &mut ImportTable) {
    match items {
        UseItems::Sequence(seq) => {
            for item in seq.items.iter() {
                register_use_item(item, None, imports);
            }
        }
        UseItems::TypedSequence(seq) => {
            if seq.r#type.is_function() || seq.r#type.is_const() {
                return;
            }
            for item in seq.items.iter() {
                register_use_item(item, None, imports);
            }
        }
        UseItems::TypedList(list) => {
            if list.r#type.is_function() || list.r#type.is_const() {
                return;
            }
            let prefix = list.namespace.value();
            for item in list.items.iter() {
                register_use_item(item, Some(prefix), imports);
            }
        }
        UseItems::MixedList(list) => {
            let prefix = list.namespace.value();
            for maybe_typed in list.items.iter() {
                if let Some(ref t) = maybe_typed.r#type
                    && (t.is_function() || t.is_const())
                {
                    continue;
                }
                register_use_item(&maybe_typed.item, Some(prefix), imports);
            }
        }
    }
}

/// For `use Foo\{Bar}` the group prefix is `Foo` and the item `Bar`.
fn register_use_item(item: &UseItem, group_prefix: Option<&str>, imports: &mut ImportTable) {
    let item_name = item.name.value();
    let fqn = match group_prefix {
        Some(prefix) => format!("{}\\{}", prefix.trim_end_matches('\\'), item_name),
        None => item_name.to_string(),
    };

    let alias = match item.alias {
        Some(ref alias) => alias.identifier.value.to_string(),
        None => short_name(&fqn).to_string(),
    };

    imports.insert(alias, ClassName::from_fqcn(&fqn));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::with_program;
    use std::path::Path;

    fn imports_of(source: &str) -> ImportTable {
        with_program(Path::new("t.php"), source, |program| {
            let mut imports = ImportTable::new();
            collect_imports(program.statements.iter(), &mut imports);
            imports
        })
        .expect("valid source")
    }

    #[test]
    fn test_plain_and_aliased_imports() {
        let imports = imports_of("<?php\nuse App\\Geo\\Point;\nuse Vendor\\Thing as Other;\n");
        assert_eq!(imports["Point"].to_string(), "App\\Geo\\Point");
        assert_eq!(imports["Other"].to_string(), "Vendor\\Thing");
        assert!(!imports.contains_key("Thing"));
    }

    #[test]
    fn test_group_import() {
        let imports = imports_of("<?php\nuse App\\{Foo, Bar as Baz};\n");
        assert_eq!(imports["Foo"].to_string(), "App\\Foo");
        assert_eq!(imports["Baz"].to_string(), "App\\Bar");
    }

    #[test]
    fn test_function_imports_are_skipped() {
        let imports = imports_of("<?php\nuse function App\\helper;\nuse const App\\LIMIT;\n");
        assert!(imports.is_empty());
    }
}

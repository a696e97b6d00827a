/// Class, interface, and trait extraction.
///
/// Walks a parsed program and builds the owned [`ReflectedUnit`] for it:
/// namespace declarations (with the spans a class move needs to rewrite
/// them), per-namespace import tables, and one [`ReflectedClass`] per
/// class-like declaration.
///
/// Enums are skipped.  Names in `extends`, `implements` and trait `use`
/// clauses are resolved against the enclosing namespace's imports but are
/// never looked up: a parent that does not exist anywhere still shows up
/// as a plain [`ClassName`].
use std::path::Path;

use mago_span::HasSpan;
use mago_syntax::ast::*;

use crate::reflector::{NamespaceDecl, ReflectedUnit};
use crate::source::ContentHash;
use crate::types::*;
use crate::util::resolve_name;

use super::use_statements::{ImportTable, collect_imports};
use super::{extract_parameters, extract_visibility, hint_text, range_of};

/// Length of the `namespace` keyword.
const NAMESPACE_KEYWORD_LEN: u32 = 9;

struct Walk<'c> {
    content: &'c str,
    namespaces: Vec<NamespaceDecl>,
    classes: Vec<ReflectedClass>,
}

/// Build the reflection model of one parsed unit.
pub(crate) fn extract_unit(
    program: &Program<'_>,
    content: &str,
    path: &Path,
    hash: ContentHash,
) -> ReflectedUnit {
    let mut walk = Walk {
        content,
        namespaces: Vec::new(),
        classes: Vec::new(),
    };

    let header_end = program
        .statements
        .iter()
        .take_while(|s| matches!(s, Statement::OpeningTag(_) | Statement::Declare(_)))
        .last()
        .map(|s| s.span().end.offset)
        .unwrap_or(0);

    let mut global_imports = ImportTable::new();
    collect_imports(program.statements.iter(), &mut global_imports);
    walk_statements(program.statements.iter(), None, &global_imports, &mut walk);

    ReflectedUnit {
        path: path.to_path_buf(),
        hash,
        namespaces: walk.namespaces,
        imports: global_imports,
        header_end,
        classes: walk.classes,
    }
}

fn walk_statements<'a>(
    statements: impl Iterator<Item = &'a Statement<'a>>,
    namespace: Option<&str>,
    imports: &ImportTable,
    walk: &mut Walk<'_>,
) {
    for statement in statements {
        match statement {
            Statement::Namespace(ns) => {
                let mut ns_imports = ImportTable::new();
                collect_imports(ns.statements().iter(), &mut ns_imports);

                let decl = namespace_decl(ns, ns_imports.clone(), walk.content);
                let ns_name = decl.name.clone();
                walk.namespaces.push(decl);

                walk_statements(
                    ns.statements().iter(),
                    ns_name.as_deref(),
                    &ns_imports,
                    walk,
                );
            }
            Statement::Class(class) => {
                let parent = class
                    .extends
                    .as_ref()
                    .and_then(|ext| ext.types.first())
                    .map(|ident| resolve_name(ident.value(), imports, namespace));
                let implemented = class
                    .implements
                    .as_ref()
                    .map(|imp| {
                        imp.types
                            .iter()
                            .map(|ident| resolve_name(ident.value(), imports, namespace))
                            .collect()
                    })
                    .unwrap_or_default();

                let members = extract_members(
                    class.members.iter(),
                    ClassLikeKind::Class,
                    imports,
                    namespace,
                    walk.content,
                );

                push_class(
                    walk,
                    ReflectedClass {
                        name: ClassName::new(namespace.unwrap_or(""), class.name.value),
                        kind: ClassLikeKind::Class,
                        parent,
                        implemented,
                        traits: members.traits,
                        methods: members.methods,
                        properties: members.properties,
                        assigned_properties: members.assigned,
                        imports: imports.clone(),
                        is_abstract: class.modifiers.contains_abstract(),
                        name_span: range_of(&class.name),
                        body: OffsetRange::new(
                            class.left_brace.start.offset,
                            class.right_brace.end.offset,
                        ),
                    },
                );
            }
            Statement::Interface(iface) => {
                // Every extended interface is a contract; none is a parent.
                let implemented = iface
                    .extends
                    .as_ref()
                    .map(|ext| {
                        ext.types
                            .iter()
                            .map(|ident| resolve_name(ident.value(), imports, namespace))
                            .collect()
                    })
                    .unwrap_or_default();

                let members = extract_members(
                    iface.members.iter(),
                    ClassLikeKind::Interface,
                    imports,
                    namespace,
                    walk.content,
                );

                push_class(
                    walk,
                    ReflectedClass {
                        name: ClassName::new(namespace.unwrap_or(""), iface.name.value),
                        kind: ClassLikeKind::Interface,
                        parent: None,
                        implemented,
                        traits: Vec::new(),
                        methods: members.methods,
                        properties: members.properties,
                        assigned_properties: Vec::new(),
                        imports: imports.clone(),
                        is_abstract: true,
                        name_span: range_of(&iface.name),
                        body: OffsetRange::new(
                            iface.left_brace.start.offset,
                            iface.right_brace.end.offset,
                        ),
                    },
                );
            }
            Statement::Trait(trait_def) => {
                let members = extract_members(
                    trait_def.members.iter(),
                    ClassLikeKind::Trait,
                    imports,
                    namespace,
                    walk.content,
                );

                push_class(
                    walk,
                    ReflectedClass {
                        name: ClassName::new(namespace.unwrap_or(""), trait_def.name.value),
                        kind: ClassLikeKind::Trait,
                        parent: None,
                        implemented: Vec::new(),
                        traits: members.traits,
                        methods: members.methods,
                        properties: members.properties,
                        assigned_properties: members.assigned,
                        imports: imports.clone(),
                        is_abstract: false,
                        name_span: range_of(&trait_def.name),
                        body: OffsetRange::new(
                            trait_def.left_brace.start.offset,
                            trait_def.right_brace.end.offset,
                        ),
                    },
                );
            }
            Statement::Enum(enum_def) => {
                tracing::debug!("skipping enum {}", enum_def.name.value);
            }
            _ => {}
        }
    }
}

/// A later declaration of the same class replaces the earlier one.
fn push_class(walk: &mut Walk<'_>, class: ReflectedClass) {
    walk.classes.retain(|c| c.name != class.name);
    walk.classes.push(class);
}

/// Work out the spans of a namespace declaration.
///
/// The AST node of an unbraced `namespace Foo;` spans every statement up
/// to the next namespace, so the statement itself is located by scanning
/// for the `;` (or `{`) after the name.
fn namespace_decl(ns: &Namespace<'_>, imports: ImportTable, content: &str) -> NamespaceDecl {
    let span = range_of(ns);
    let keyword_end = span.start + NAMESPACE_KEYWORD_LEN;

    let (name, name_span) = match &ns.name {
        Some(ident) if !ident.value().is_empty() => {
            (Some(ident.value().to_string()), Some(range_of(ident)))
        }
        _ => (None, None),
    };

    let scan_from = name_span.map(|r| r.end).unwrap_or(keyword_end) as usize;
    let terminator = content
        .get(scan_from..)
        .and_then(|rest| {
            rest.char_indices()
                .find(|(_, c)| !c.is_whitespace())
                .map(|(i, c)| (scan_from + i, c))
        });

    let (braced, statement_end) = match terminator {
        Some((pos, ';')) => (false, pos as u32 + 1),
        Some((pos, _)) => (true, pos as u32),
        None => (false, span.end),
    };

    NamespaceDecl {
        name,
        name_span,
        keyword_end,
        statement: OffsetRange::new(span.start, statement_end),
        span,
        braced,
        imports,
    }
}

#[derive(Default)]
struct Members {
    methods: Vec<ReflectedMethod>,
    properties: Vec<ReflectedProperty>,
    assigned: Vec<ReflectedProperty>,
    traits: Vec<ClassName>,
}

fn upsert_method(methods: &mut Vec<ReflectedMethod>, method: ReflectedMethod) {
    methods.retain(|m| m.name != method.name);
    methods.push(method);
}

fn upsert_property(properties: &mut Vec<ReflectedProperty>, property: ReflectedProperty) {
    properties.retain(|p| p.name != property.name);
    properties.push(property);
}

/// Extract methods, properties, property assignments and used traits
/// from class-like members.
fn extract_members<'a>(
    members: impl Iterator<Item = &'a ClassLikeMember<'a>>,
    kind: ClassLikeKind,
    imports: &ImportTable,
    namespace: Option<&str>,
    content: &str,
) -> Members {
    let mut out = Members::default();

    for member in members {
        match member {
            ClassLikeMember::Method(method) => {
                let name = method.name.value.to_string();
                let parameters = extract_parameters(&method.parameter_list, content);
                let return_type = method
                    .return_type_hint
                    .as_ref()
                    .map(|rth| hint_text(&rth.hint, content));
                let is_static = method.modifiers.iter().any(|m| m.is_static());
                let visibility = extract_visibility(method.modifiers.iter());
                let is_abstract =
                    kind == ClassLikeKind::Interface || method.modifiers.contains_abstract();

                if name.eq_ignore_ascii_case("__construct") {
                    for param in method.parameter_list.parameters.iter() {
                        if !param.is_promoted_property() {
                            continue;
                        }
                        let raw_name = param.variable.name;
                        upsert_property(
                            &mut out.properties,
                            ReflectedProperty {
                                name: raw_name.strip_prefix('$').unwrap_or(raw_name).to_string(),
                                visibility: extract_visibility(param.modifiers.iter()),
                                declared_type: param.hint.as_ref().map(|h| hint_text(h, content)),
                                is_static: false,
                                is_abstract: false,
                            },
                        );
                    }
                }

                if let MethodBody::Concrete(block) = &method.body {
                    let ctx = AssignmentCtx {
                        parameters: &parameters,
                    };
                    collect_this_assignments(block.statements.iter(), &ctx, &mut out.assigned);
                }

                upsert_method(
                    &mut out.methods,
                    ReflectedMethod {
                        name,
                        visibility,
                        parameters,
                        return_type,
                        is_abstract,
                        is_static,
                    },
                );
            }
            ClassLikeMember::Property(property) => {
                let is_static = property.modifiers().iter().any(|m| m.is_static());
                let is_abstract = kind == ClassLikeKind::Interface
                    || property
                        .modifiers()
                        .iter()
                        .any(|m| matches!(m, Modifier::Abstract(_)));
                let visibility = extract_visibility(property.modifiers().iter());
                let declared_type = property.hint().map(|h| hint_text(h, content));

                for var in property.variables().iter() {
                    let raw_name = var.name;
                    upsert_property(
                        &mut out.properties,
                        ReflectedProperty {
                            name: raw_name.strip_prefix('$').unwrap_or(raw_name).to_string(),
                            visibility,
                            declared_type: declared_type.clone(),
                            is_static,
                            is_abstract,
                        },
                    );
                }
            }
            ClassLikeMember::TraitUse(trait_use) => {
                for ident in trait_use.trait_names.iter() {
                    out.traits.push(resolve_name(ident.value(), imports, namespace));
                }
            }
            _ => {}
        }
    }

    out
}

struct AssignmentCtx<'p> {
    parameters: &'p [ReflectedParameter],
}

/// Record `$this->name = …` assignments in a method body, including ones
/// nested in blocks, conditionals, loops and `try`.
fn collect_this_assignments<'a>(
    statements: impl Iterator<Item = &'a Statement<'a>>,
    ctx: &AssignmentCtx<'_>,
    out: &mut Vec<ReflectedProperty>,
) {
    for stmt in statements {
        match stmt {
            Statement::Expression(expr_stmt) => {
                if let Expression::Assignment(assignment) = expr_stmt.expression
                    && let Expression::Access(Access::Property(pa)) = assignment.lhs
                    && let Expression::Variable(Variable::Direct(dv)) = pa.object
                    && dv.name == "$this"
                    && let ClassLikeMemberSelector::Identifier(ident) = &pa.property
                {
                    let name = ident.value.to_string();
                    if out.iter().any(|p| p.name == name) {
                        continue;
                    }
                    out.push(ReflectedProperty {
                        name,
                        visibility: Visibility::Private,
                        declared_type: assigned_type(assignment.rhs, ctx),
                        is_static: false,
                        is_abstract: false,
                    });
                }
            }
            Statement::Block(block) => {
                collect_this_assignments(block.statements.iter(), ctx, out);
            }
            Statement::If(if_stmt) => match &if_stmt.body {
                IfBody::Statement(body) => {
                    collect_this_assignments(std::iter::once(body.statement), ctx, out);
                    for else_if in body.else_if_clauses.iter() {
                        collect_this_assignments(std::iter::once(else_if.statement), ctx, out);
                    }
                    if let Some(else_clause) = &body.else_clause {
                        collect_this_assignments(std::iter::once(else_clause.statement), ctx, out);
                    }
                }
                IfBody::ColonDelimited(body) => {
                    collect_this_assignments(body.statements.iter(), ctx, out);
                    for else_if in body.else_if_clauses.iter() {
                        collect_this_assignments(else_if.statements.iter(), ctx, out);
                    }
                    if let Some(else_clause) = &body.else_clause {
                        collect_this_assignments(else_clause.statements.iter(), ctx, out);
                    }
                }
            },
            Statement::Foreach(foreach) => {
                collect_this_assignments(foreach.body.statements().iter(), ctx, out);
            }
            Statement::Try(try_stmt) => {
                collect_this_assignments(try_stmt.block.statements.iter(), ctx, out);
                for catch in try_stmt.catch_clauses.iter() {
                    collect_this_assignments(catch.block.statements.iter(), ctx, out);
                }
                if let Some(finally) = &try_stmt.finally_clause {
                    collect_this_assignments(finally.block.statements.iter(), ctx, out);
                }
            }
            _ => {}
        }
    }
}

/// The type an assigned property would need to be declared with, as it
/// would be written in this file.
fn assigned_type(rhs: &Expression<'_>, ctx: &AssignmentCtx<'_>) -> Option<String> {
    match rhs {
        Expression::Variable(Variable::Direct(dv)) => {
            let name = dv.name.strip_prefix('$').unwrap_or(dv.name);
            ctx.parameters
                .iter()
                .find(|p| p.name == name && !p.is_variadic)
                .and_then(|p| p.declared_type.clone())
        }
        Expression::Instantiation(inst) => match inst.class {
            Expression::Identifier(ident) => Some(ident.value().to_string()),
            _ => None,
        },
        Expression::Parenthesized(p) => assigned_type(p.expression, ctx),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::with_program;

    fn unit(source: &str) -> ReflectedUnit {
        let path = Path::new("t.php");
        with_program(path, source, |program| {
            extract_unit(
                program,
                source,
                path,
                ContentHash::compute(source.as_bytes()),
            )
        })
        .expect("valid source")
    }

    #[test]
    fn test_class_header_resolution() {
        let unit = unit(concat!(
            "<?php\n",
            "namespace App;\n",
            "use Vendor\\Base;\n",
            "class Foo extends Base implements Bar, \\Countable {}\n",
        ));
        let class = &unit.classes[0];
        assert_eq!(class.name.to_string(), "App\\Foo");
        assert_eq!(class.parent.as_ref().unwrap().to_string(), "Vendor\\Base");
        let implemented: Vec<String> = class.implemented.iter().map(|c| c.to_string()).collect();
        assert_eq!(implemented, vec!["App\\Bar", "Countable"]);
    }

    #[test]
    fn test_interface_extends_go_to_implemented() {
        let unit = unit("<?php\ninterface A extends B, C { public function run(int $x): void; }\n");
        let iface = &unit.classes[0];
        assert_eq!(iface.kind, ClassLikeKind::Interface);
        assert!(iface.parent.is_none());
        assert_eq!(iface.implemented.len(), 2);
        assert!(iface.methods[0].is_abstract);
        assert_eq!(iface.methods[0].signature(), "run(int $x): void");
    }

    #[test]
    fn test_last_declaration_wins() {
        let unit = unit(concat!(
            "<?php\n",
            "class Foo {\n",
            "    public function a(): int { return 1; }\n",
            "    private $p;\n",
            "    public function a(): string { return ''; }\n",
            "    protected int $p;\n",
            "}\n",
        ));
        let class = &unit.classes[0];
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].return_type.as_deref(), Some("string"));
        assert_eq!(class.properties.len(), 1);
        assert_eq!(class.properties[0].visibility, Visibility::Protected);
        assert_eq!(class.properties[0].declared_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_promoted_and_assigned_properties() {
        let unit = unit(concat!(
            "<?php\n",
            "class Foo {\n",
            "    public function __construct(private Bar $bar, string $name) {\n",
            "        $this->name = $name;\n",
            "        $this->clock = new Clock();\n",
            "    }\n",
            "}\n",
        ));
        let class = &unit.classes[0];
        assert_eq!(class.properties[0].name, "bar");
        assert_eq!(class.properties[0].declared_type.as_deref(), Some("Bar"));
        let assigned: Vec<(&str, Option<&str>)> = class
            .assigned_properties
            .iter()
            .map(|p| (p.name.as_str(), p.declared_type.as_deref()))
            .collect();
        assert_eq!(
            assigned,
            vec![("name", Some("string")), ("clock", Some("Clock"))]
        );
    }

    #[test]
    fn test_enums_are_skipped_and_traits_recorded() {
        let unit = unit(concat!(
            "<?php\n",
            "enum Suit { case Hearts; }\n",
            "trait Greets { public function hi() {} }\n",
            "class Foo { use Greets; }\n",
        ));
        assert_eq!(unit.classes.len(), 2);
        assert_eq!(unit.classes[0].kind, ClassLikeKind::Trait);
        assert_eq!(unit.classes[1].traits[0].to_string(), "Greets");
    }

    #[test]
    fn test_namespace_spans() {
        let source = "<?php\n\nnamespace App\\Geo;\n\nclass Point {}\n";
        let unit = unit(source);
        let ns = &unit.namespaces[0];
        assert!(!ns.braced);
        assert_eq!(&source[ns.name_span.unwrap().as_usize()], "App\\Geo");
        assert_eq!(&source[ns.statement.as_usize()], "namespace App\\Geo;");
        assert!(unit.header_end >= 5 && unit.header_end <= ns.statement.start);
        let class = &unit.classes[0];
        assert_eq!(&source[class.name_span.as_usize()], "Point");
    }
}

mod common;

use std::path::{Path, PathBuf};

use common::{APP_COMPOSER_JSON, create_psr4_workspace, read_file, write_file};
use phpactor_core::generation::GeneratorOptions;
use phpactor_core::source::SourceUnit;
use phpactor_core::{ClassName, EngineError, SnippetEdit};
use serde_json::json;

fn no_options() -> GeneratorOptions {
    GeneratorOptions::new()
}

fn apply(root: &Path, edit: &SnippetEdit) {
    let rel = edit.path.to_string_lossy().to_string();
    let unit = SourceUnit::new(&edit.path, read_file(root, &rel));
    write_file(root, &rel, unit.apply(edit).text());
}

// ─── implement_missing_methods ──────────────────────────────────────────────

const BAR: &str = "<?php\nnamespace App;\ninterface Bar {\n    public function baz(): int;\n}\n";
const FOO: &str = "<?php\nnamespace App;\nclass Foo implements Bar {\n}\n";

#[test]
fn test_missing_interface_method_is_stubbed_before_closing_brace() {
    let (engine, _dir) =
        create_psr4_workspace(APP_COMPOSER_JSON, &[("app/Bar.php", BAR), ("app/Foo.php", FOO)]);

    let edit = engine
        .generate_snippet(
            "implement_missing_methods",
            &ClassName::from_fqcn("App\\Foo"),
            &no_options(),
        )
        .unwrap();

    assert_eq!(edit.path, PathBuf::from("app/Foo.php"));
    let closing = FOO.rfind('}').unwrap() as u32;
    assert_eq!(edit.target_range.start, closing);
    assert_eq!(edit.target_range.end, closing);
    assert_eq!(
        edit.replacement_text,
        "\n    public function baz(): int\n    {\n    }\n"
    );
}

#[test]
fn test_missing_methods_is_idempotent() {
    let (engine, dir) =
        create_psr4_workspace(APP_COMPOSER_JSON, &[("app/Bar.php", BAR), ("app/Foo.php", FOO)]);
    let foo = ClassName::from_fqcn("App\\Foo");

    let first = engine
        .generate_snippet("implement_missing_methods", &foo, &no_options())
        .unwrap();
    assert!(!first.is_noop());
    apply(dir.path(), &first);

    let second = engine
        .generate_snippet("implement_missing_methods", &foo, &no_options())
        .unwrap();
    assert!(second.is_noop(), "unexpected second edit: {:?}", second);
}

#[test]
fn test_abstract_parent_methods_in_contract_order() {
    let (engine, _dir) = create_psr4_workspace(
        APP_COMPOSER_JSON,
        &[
            (
                "app/Shape.php",
                concat!(
                    "<?php\n",
                    "namespace App;\n",
                    "abstract class Shape {\n",
                    "    abstract protected function area(): float;\n",
                    "    public function describe(): string { return ''; }\n",
                    "    abstract public static function make(int $size = 1, string ...$tags): static;\n",
                    "}\n",
                ),
            ),
            (
                "app/Square.php",
                "<?php\nnamespace App;\nclass Square extends Shape\n{\n    protected function area(): float { return 1.0; }\n}\n",
            ),
        ],
    );

    let edit = engine
        .generate_snippet(
            "implement_missing_methods",
            &ClassName::from_fqcn("App\\Square"),
            &no_options(),
        )
        .unwrap();
    assert_eq!(
        edit.replacement_text,
        "\n    public static function make(int $size = 1, string ...$tags): static\n    {\n    }\n"
    );
}

#[test]
fn test_unresolvable_interface_contributes_nothing() {
    let (engine, _dir) = create_psr4_workspace(
        APP_COMPOSER_JSON,
        &[(
            "app/Lonely.php",
            "<?php\nnamespace App;\nclass Lonely implements \\Vendor\\Missing {}\n",
        )],
    );
    let edit = engine
        .generate_snippet(
            "implement_missing_methods",
            &ClassName::from_fqcn("App\\Lonely"),
            &no_options(),
        )
        .unwrap();
    assert!(edit.is_noop());
}

#[test]
fn test_stub_types_are_qualified_for_other_namespace() {
    let (engine, _dir) = create_psr4_workspace(
        APP_COMPOSER_JSON,
        &[
            (
                "app/Contract/Finder.php",
                concat!(
                    "<?php\n",
                    "namespace App\\Contract;\n",
                    "use App\\Clock\\Timer;\n",
                    "interface Finder {\n",
                    "    public function find(Item $item, ?Timer $timer = null): ?Item;\n",
                    "}\n",
                ),
            ),
            (
                "app/Repo.php",
                "<?php\nnamespace App;\nuse App\\Contract\\Finder;\nclass Repo implements Finder {\n}\n",
            ),
        ],
    );

    let edit = engine
        .generate_snippet(
            "implement_missing_methods",
            &ClassName::from_fqcn("App\\Repo"),
            &no_options(),
        )
        .unwrap();
    assert_eq!(
        edit.replacement_text,
        concat!(
            "\n    public function find(\\App\\Contract\\Item $item, ?\\App\\Clock\\Timer $timer = null): ?\\App\\Contract\\Item\n",
            "    {\n",
            "    }\n",
        )
    );
}

// ─── implement_missing_properties ───────────────────────────────────────────

#[test]
fn test_assigned_properties_are_declared_after_opening_brace() {
    let source = concat!(
        "<?php\n",
        "namespace App;\n",
        "class Mailer\n",
        "{\n",
        "    private string $from;\n",
        "\n",
        "    public function __construct(Transport $transport, string $from)\n",
        "    {\n",
        "        $this->transport = $transport;\n",
        "        $this->from = $from;\n",
        "        $this->queue = new Queue();\n",
        "    }\n",
        "}\n",
    );
    let (engine, dir) =
        create_psr4_workspace(APP_COMPOSER_JSON, &[("app/Mailer.php", source)]);
    let mailer = ClassName::from_fqcn("App\\Mailer");

    let edit = engine
        .generate_snippet("implement_missing_properties", &mailer, &no_options())
        .unwrap();
    let opening = source.find('{').unwrap() as u32 + 1;
    assert_eq!(edit.target_range.start, opening);
    assert_eq!(
        edit.replacement_text,
        "\n    private Transport $transport;\n    private Queue $queue;"
    );

    apply(dir.path(), &edit);
    let again = engine
        .generate_snippet("implement_missing_properties", &mailer, &no_options())
        .unwrap();
    assert!(again.is_noop());
}

#[test]
fn test_inherited_property_is_not_redeclared() {
    let (engine, _dir) = create_psr4_workspace(
        APP_COMPOSER_JSON,
        &[
            (
                "app/Model.php",
                "<?php\nnamespace App;\nabstract class Model {\n    protected array $attributes = [];\n}\n",
            ),
            (
                "app/Post.php",
                "<?php\nnamespace App;\nclass Post extends Model {\n    public function fill(array $data) {\n        $this->attributes = $data;\n        $this->title = $data;\n    }\n}\n",
            ),
        ],
    );

    let edit = engine
        .generate_snippet(
            "implement_missing_properties",
            &ClassName::from_fqcn("App\\Post"),
            &no_options(),
        )
        .unwrap();
    assert_eq!(edit.replacement_text, "\n    private array $title;");
}

// ─── class ──────────────────────────────────────────────────────────────────

#[test]
fn test_class_skeleton_for_new_name() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let options = json!({"type": "interface", "unknown": true});

    let edit = engine
        .generate_snippet(
            "class",
            &ClassName::from_fqcn("App\\Http\\Handler"),
            options.as_object().unwrap(),
        )
        .unwrap();

    assert_eq!(edit.path, PathBuf::from("app/Http/Handler.php"));
    assert_eq!(edit.target_range.start, 0);
    assert_eq!(edit.target_range.end, 0);
    assert_eq!(
        edit.replacement_text,
        "<?php\n\nnamespace App\\Http;\n\ninterface Handler\n{\n}\n"
    );
}

#[test]
fn test_class_generator_rejects_bad_type() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let options = json!({"type": "struct"});
    let err = engine
        .generate_snippet(
            "class",
            &ClassName::from_fqcn("App\\Thing"),
            options.as_object().unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOption { .. }));
}

#[test]
fn test_unknown_generator_kind() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let err = engine
        .generate_snippet("make_coffee", &ClassName::from_fqcn("App\\Foo"), &no_options())
        .unwrap_err();
    assert!(matches!(err, EngineError::GeneratorNotFound { .. }));
}

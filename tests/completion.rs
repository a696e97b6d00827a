mod common;

use common::{APP_COMPOSER_JSON, create_psr4_workspace, labels, unit_with_cursor};
use phpactor_core::SuggestionKind;
use phpactor_core::completion::{CompletionContext, CompletionProvider};
use phpactor_core::types::CompletionSuggestion;

// ─── Fetch completion ───────────────────────────────────────────────────────

#[test]
fn test_members_of_new_instance_without_reparse() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let (unit, offset) = unit_with_cursor(
        "point.php",
        concat!(
            "<?php\n",
            "class Point {\n",
            "    public int $x = 0;\n",
            "    public int $y = 0;\n",
            "    public function length(): float { return 0.0; }\n",
            "    public static function origin(): self { return new self(); }\n",
            "    public function __construct() {}\n",
            "}\n",
            "$x = new Point(); $x->|",
        ),
    );

    let suggestions = engine.complete_in(&unit, offset).unwrap();
    assert_eq!(labels(&suggestions), vec!["length", "x", "y"]);

    let length = &suggestions[0];
    assert_eq!(length.kind, SuggestionKind::Method);
    assert_eq!(length.insert_text, "length(");
    assert_eq!(length.detail, "length(): float");
    assert_eq!(suggestions[1].kind, SuggestionKind::Property);
    assert_eq!(suggestions[1].detail, "int");
}

#[test]
fn test_fetch_filters_by_partial_name() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let (unit, offset) = unit_with_cursor(
        "filter.php",
        concat!(
            "<?php\n",
            "class User {\n",
            "    public function getName(): string { return ''; }\n",
            "    public function getEmail(): string { return ''; }\n",
            "    public function save(): void {}\n",
            "}\n",
            "$u = new User();\n",
            "$u->getN|",
        ),
    );

    let suggestions = engine.complete_in(&unit, offset).unwrap();
    assert_eq!(labels(&suggestions), vec!["getName"]);
}

#[test]
fn test_this_fetch_includes_inherited_but_not_parent_private() {
    let (engine, _dir) = create_psr4_workspace(
        APP_COMPOSER_JSON,
        &[(
            "app/Animal.php",
            concat!(
                "<?php\n",
                "namespace App;\n",
                "class Animal {\n",
                "    public function breathe(): void {}\n",
                "    protected function sleep(): void {}\n",
                "    private function digest(): void {}\n",
                "}\n",
            ),
        )],
    );
    let (unit, offset) = unit_with_cursor(
        "app/Dog.php",
        concat!(
            "<?php\n",
            "namespace App;\n",
            "class Dog extends Animal {\n",
            "    public function bark(): void {}\n",
            "    private function wag(): void {}\n",
            "    public function test() {\n",
            "        $this->|\n",
            "    }\n",
            "}\n",
        ),
    );

    let suggestions = engine.complete_in(&unit, offset).unwrap();
    assert_eq!(
        labels(&suggestions),
        vec!["bark", "wag", "test", "breathe", "sleep"]
    );
}

#[test]
fn test_unresolved_receiver_offers_nothing() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let (unit, offset) = unit_with_cursor("u.php", "<?php\n$thing = get_thing();\n$thing->|");
    let suggestions = engine.complete_in(&unit, offset).unwrap();
    assert!(suggestions.is_empty());
}

#[test]
fn test_fetch_inside_arrow_function_parameter() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    for body in [
        "$f = fn (Foo $p) => $p->|;\n",
        "$f = static fn (Foo $p) => $p->|;\n",
        "array_map(fn (Foo $p) => $p->|, []);\n",
    ] {
        let text = format!(
            "<?php\nclass Foo {{\n    public function bar(): int {{ return 1; }}\n}}\n{}",
            body
        );
        let (unit, offset) = unit_with_cursor("arrow.php", &text);
        let suggestions = engine.complete_in(&unit, offset).unwrap();
        assert_eq!(labels(&suggestions), vec!["bar"], "in {}", body);
    }
}

// ─── Variable completion ────────────────────────────────────────────────────

#[test]
fn test_variables_innermost_scope_first_with_types() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let (unit, offset) = unit_with_cursor(
        "vars.php",
        concat!(
            "<?php\n",
            "class Conn {}\n",
            "$config = [];\n",
            "$conn = new Conn();\n",
            "$fn = function (int $count) use ($conn) {\n",
            "    $co|\n",
            "};\n",
        ),
    );

    let suggestions = engine.complete_in(&unit, offset).unwrap();
    assert_eq!(labels(&suggestions), vec!["$count", "$conn", "$config"]);
    assert!(suggestions.iter().all(|s| s.kind == SuggestionKind::Variable));
    assert_eq!(suggestions[0].detail, "int");
    assert_eq!(suggestions[1].detail, "Conn");
    assert_eq!(suggestions[2].detail, "array");
}

#[test]
fn test_untyped_variable_detail_is_mixed() {
    let (engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    let (unit, offset) = unit_with_cursor(
        "mixed.php",
        "<?php\nforeach ([1, 2] as $item) {\n    $it|\n}\n",
    );
    let suggestions = engine.complete_in(&unit, offset).unwrap();
    assert_eq!(labels(&suggestions), vec!["$item"]);
    assert_eq!(suggestions[0].detail, "mixed");
}

// ─── Provider composition ───────────────────────────────────────────────────

struct Keywords;

impl CompletionProvider for Keywords {
    fn name(&self) -> &str {
        "keywords"
    }

    fn provide(&self, ctx: &CompletionContext<'_>) -> Vec<CompletionSuggestion> {
        let mut out = vec![CompletionSuggestion {
            label: "$value".to_string(),
            kind: SuggestionKind::Variable,
            insert_text: "$value".to_string(),
            detail: "from keywords".to_string(),
        }];
        if ctx.resolution.fetch.is_none() {
            out.push(CompletionSuggestion {
                label: "return".to_string(),
                kind: SuggestionKind::Class,
                insert_text: "return ".to_string(),
                detail: "keyword".to_string(),
            });
        }
        out
    }
}

#[test]
fn test_later_provider_duplicates_are_dropped() {
    let (mut engine, _dir) = create_psr4_workspace(APP_COMPOSER_JSON, &[]);
    engine.completion_mut().register(Box::new(Keywords));

    let (unit, offset) = unit_with_cursor("dup.php", "<?php\n$value = 1;\n|");
    let suggestions = engine.complete_in(&unit, offset).unwrap();

    assert_eq!(labels(&suggestions), vec!["$value", "return"]);
    assert_eq!(suggestions[0].detail, "int");
}

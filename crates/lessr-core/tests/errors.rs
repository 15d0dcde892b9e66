use serde_json::json;
use test_case::test_case;

use harness::{compile_error, options};
use lessr_core::{CompileOptions, ImportError};


#[test]
fn missing_mixin_reports_its_location() {
    let error = compile_error(
        json!([{
            "type": "ruleset",
            "selectors": [".x"],
            "rules": [{
                "type": "mixin_call",
                "selector": ".missing",
                "span": { "file": "main.less", "line": 3, "column": 5 }
            }]
        }]),
        options(false),
    );
    assert_eq!(error.name(), "MixinNotFound");
    assert_eq!(error.to_string(), "main.less:3:5: `.missing` is undefined");
}

#[test_case(json!([]); "no arguments for a required parameter")]
#[test_case(json!(["1px", "2px"]); "too many arguments")]
fn argument_mismatch(args: serde_json::Value) {
    let error = compile_error(
        json!([
            {
                "type": "mixin_definition",
                "name": ".m",
                "params": [{ "name": "@a" }],
                "rules": [{ "type": "declaration", "name": "width", "value": "@a" }]
            },
            {
                "type": "ruleset",
                "selectors": [".x"],
                "rules": [{ "type": "mixin_call", "selector": ".m", "args": args }]
            }
        ]),
        options(false),
    );
    assert_eq!(error.name(), "ArgumentMismatch");
}

#[test]
fn ruleset_cannot_include_itself() {
    let error = compile_error(
        json!([{
            "type": "ruleset",
            "selectors": [".a"],
            "rules": [{ "type": "mixin_call", "selector": ".a" }]
        }]),
        options(false),
    );
    assert_eq!(error.name(), "ArgumentMismatch");
}

#[test]
fn self_recursive_mixin_hits_the_depth_limit() {
    let error = compile_error(
        json!([
            {
                "type": "mixin_definition",
                "name": ".m",
                "rules": [{ "type": "mixin_call", "selector": ".m" }]
            },
            {
                "type": "ruleset",
                "selectors": [".x"],
                "rules": [{ "type": "mixin_call", "selector": ".m" }]
            }
        ]),
        CompileOptions {
            max_mixin_depth: 8,
            ..options(false)
        },
    );
    assert_eq!(error.name(), "MixinRecursion");
    assert!(error.to_string().contains("more than 8 levels"));
}

#[test]
fn undefined_variable() {
    let error = compile_error(
        json!([{
            "type": "ruleset",
            "selectors": [".a"],
            "rules": [{
                "type": "declaration",
                "name": "color",
                "value": "@missing",
                "span": { "line": 2, "column": 3 }
            }]
        }]),
        options(false),
    );
    assert_eq!(error.name(), "UndefinedVariable");
    assert_eq!(error.to_string(), "2:3: variable @missing is undefined");
}

#[test]
fn import_without_a_source() {
    let mut env = lessr_core::Env::new(options(false)).with_importer(lessr_core::ImportTable::new());
    let rules = harness::tree(json!([{ "type": "import", "path": "nowhere" }]));
    let error = lessr_core::compile_tree(rules, &mut env).unwrap_err();
    assert!(matches!(
        error,
        lessr_core::CompileError::ImportResolution {
            source: ImportError::NotFound,
            ..
        }
    ));
}

#[test]
fn malformed_selectors_are_rejected_while_loading() {
    let result = serde_json::from_value::<Vec<lessr_core::Node>>(json!([{
        "type": "ruleset",
        "selectors": [".a >"],
        "rules": []
    }]));
    assert!(result.unwrap_err().to_string().contains("trailing combinator"));
}

//! Module evaluation through a test resolver

use rustc_hash::FxHashMap;

use jsrun::realm::{ModuleResolver, SourceInfo};
use jsrun::{run_module_source, Agent, RunResult, Value};

/// In-memory module map.
struct MapResolver {
    modules: FxHashMap<String, String>,
}

impl ModuleResolver for MapResolver {
    fn resolve(&mut self, specifier: &str, _referrer: &str) -> Result<SourceInfo, String> {
        match self.modules.get(specifier) {
            Some(text) => Ok(SourceInfo {
                name: specifier.to_string(),
                text: text.clone(),
                is_module: true,
            }),
            None => Err(format!("unknown module {}", specifier)),
        }
    }
}

fn eval_module(modules: &[(&str, &str)], entry: &str) -> RunResult {
    let mut agent = Agent::new();
    let realm = agent.make_realm();
    let map = modules
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    realm.set_module_resolver(Box::new(MapResolver { modules: map }));
    run_module_source(&mut agent, &realm, "<entry>", entry)
}

fn success_number(result: RunResult) -> f64 {
    match result {
        RunResult::Success(value) => value.as_number().expect("number"),
        other => panic!("expected success, got {:?}", other),
    }
}

#[test]
fn test_module_locals_are_module_scoped() {
    let mut agent = Agent::new();
    let realm = agent.make_realm();
    let result = run_module_source(&mut agent, &realm, "<entry>", "let x = 1; var y = 2;");
    assert!(result.is_success());
    // Module bindings never leak onto the global object.
    let probe = jsrun::run_source(&mut agent, &realm, "typeof x + typeof y;");
    match probe {
        RunResult::Success(Value::String(s)) => assert_eq!(s.as_str(), "undefinedundefined"),
        other => panic!("unexpected probe result: {:?}", other),
    }
}

#[test]
fn test_named_imports() {
    let result = eval_module(
        &[("math", "export let double = n => n * 2; export const base = 20;")],
        "import { double, base } from 'math'; globalThis.out = double(base) + 2; out;",
    );
    assert_eq!(success_number(result), 42.0);
}

#[test]
fn test_renamed_imports() {
    let result = eval_module(
        &[("dep", "export let value = 5;")],
        "import { value as v } from 'dep'; globalThis.out = v; out;",
    );
    assert_eq!(success_number(result), 5.0);
}

#[test]
fn test_default_imports() {
    let result = eval_module(
        &[("answer", "export default 42;")],
        "import answer from 'answer'; globalThis.out = answer; out;",
    );
    assert_eq!(success_number(result), 42.0);
}

#[test]
fn test_import_bindings_are_live() {
    let result = eval_module(
        &[(
            "counter",
            "export let count = 0; export let bump = () => { count = count + 1; };",
        )],
        "import { count, bump } from 'counter';
         bump(); bump();
         globalThis.out = count;
         out;",
    );
    assert_eq!(success_number(result), 2.0);
}

#[test]
fn test_transitive_imports() {
    let result = eval_module(
        &[
            ("a", "export let base = 3;"),
            ("b", "import { base } from 'a'; export let doubled = base * 2;"),
        ],
        "import { doubled } from 'b'; globalThis.out = doubled; out;",
    );
    assert_eq!(success_number(result), 6.0);
}

#[test]
fn test_missing_export_is_an_error() {
    let result = eval_module(
        &[("dep", "export let present = 1;")],
        "import { absent } from 'dep'; absent;",
    );
    assert!(matches!(result, RunResult::RuntimeError(_)));
}

#[test]
fn test_missing_module_is_an_error() {
    let result = eval_module(&[], "import { x } from 'nowhere'; x;");
    assert!(matches!(result, RunResult::RuntimeError(_)));
}

#[test]
fn test_cycles_are_detected() {
    let result = eval_module(
        &[
            ("a", "import { b } from 'b'; export let a = 1;"),
            ("b", "import { a } from 'a'; export let b = 2;"),
        ],
        "import { a } from 'a'; a;",
    );
    assert!(matches!(result, RunResult::RuntimeError(_)));
}

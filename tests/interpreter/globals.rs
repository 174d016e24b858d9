//! Global bindings, strict mode, and scripts sharing one realm

use jsrun::{run_source, Agent, RunResult, Value};

use super::{eval_bool, eval_number, eval_string, eval_throws};

#[test]
fn test_global_var_lands_on_global_object() {
    assert!(eval_bool("var v = 3; globalThis.v === 3;"));
    assert_eq!(eval_number("globalThis.w = 8; w;"), 8.0);
}

#[test]
fn test_global_lexicals_stay_off_global_object() {
    assert!(eval_bool("let l = 1; globalThis.l === undefined;"));
    assert_eq!(eval_number("let l = 4; l;"), 4.0);
}

#[test]
fn test_sloppy_assignment_creates_global() {
    assert_eq!(eval_number("implicit = 6; implicit;"), 6.0);
}

#[test]
fn test_strict_assignment_to_unresolved_throws() {
    let thrown = eval_throws("'use strict'; notDeclared = 1;");
    assert!(matches!(thrown, Value::Object(_)));
}

#[test]
fn test_globals_persist_across_scripts_in_a_realm() {
    let mut agent = Agent::new();
    let realm = agent.make_realm();

    let first = run_source(&mut agent, &realm, "let shared = 40; var also = 2;");
    assert!(first.is_success());

    let second = run_source(&mut agent, &realm, "shared + also;");
    match second {
        RunResult::Success(value) => assert_eq!(value.as_number(), Some(42.0)),
        other => panic!("expected success, got {:?}", other),
    }
}

#[test]
fn test_global_const_rejects_reassignment() {
    let thrown = eval_throws("const g = 1; g = 2;");
    assert!(matches!(thrown, Value::Object(_)));
}

#[test]
fn test_undefined_nan_infinity_are_pinned() {
    assert!(eval_bool("undefined === void 0;"));
    assert!(eval_bool("NaN !== NaN;"));
    assert!(eval_bool("Infinity > 1e308;"));
}

#[test]
fn test_global_this_is_global_object() {
    assert!(eval_bool("this === globalThis;"));
    assert_eq!(eval_string("typeof globalThis;"), "object");
}

#[test]
fn test_math_namespace() {
    assert_eq!(eval_number("Math.floor(2.9);"), 2.0);
    assert_eq!(eval_number("Math.max(1, 9, 4);"), 9.0);
    assert_eq!(eval_number("Math.min(3, -2);"), -2.0);
    assert_eq!(eval_number("Math.abs(-5);"), 5.0);
    assert_eq!(eval_number("Math.sqrt(81);"), 9.0);
}

#[test]
fn test_symbols() {
    assert!(eval_bool("Symbol('a') !== Symbol('a');"));
    assert!(eval_bool("Symbol.for('k') === Symbol.for('k');"));
    assert_eq!(eval_string("typeof Symbol.iterator;"), "symbol");
    assert_eq!(eval_string("Symbol('tag').toString();"), "Symbol(tag)");
}

#[test]
fn test_symbol_keys_are_distinct_from_strings() {
    assert!(eval_bool(
        "let s = Symbol('k');
         let o = {};
         o[s] = 1;
         o['k'] = 2;
         o[s] === 1 && o['k'] === 2 && Object.keys(o).length === 1;"
    ));
}

#[test]
fn test_custom_to_primitive() {
    assert_eq!(
        eval_number(
            "let o = { [Symbol.toPrimitive]() { return 9; } };
             o + 1;"
        ),
        10.0
    );
    assert_eq!(
        eval_number("let o = { valueOf() { return 5; } }; o * 2;"),
        10.0
    );
    assert_eq!(
        eval_string("let o = { toString() { return 's'; } }; `${o}`;"),
        "s"
    );
}

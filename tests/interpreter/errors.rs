//! Throwing, catching, and the error hierarchy

use super::{eval, eval_bool, eval_number, eval_string, eval_throws};
use jsrun::Value;

#[test]
fn test_catch_receives_thrown_value() {
    assert_eq!(eval_number("try { throw 42; } catch (e) { e; }"), 42.0);
    assert_eq!(
        eval_string("try { throw 'reason'; } catch (e) { 'got ' + e; }"),
        "got reason"
    );
}

#[test]
fn test_null_property_access_is_type_error() {
    assert!(eval_bool("try { null.x; } catch (e) { e instanceof TypeError; }"));
    assert!(eval_bool(
        "try { undefined.x; } catch (e) { e instanceof TypeError; }"
    ));
}

#[test]
fn test_error_hierarchy() {
    assert!(eval_bool("new TypeError('m') instanceof TypeError;"));
    assert!(eval_bool("new TypeError('m') instanceof Error;"));
    assert!(!eval_bool("new RangeError('m') instanceof TypeError;"));
    assert_eq!(eval_string("new TypeError('bad').message;"), "bad");
    assert_eq!(eval_string("new TypeError('bad').toString();"), "TypeError: bad");
    assert_eq!(eval_string("new Error('plain').name;"), "Error");
}

#[test]
fn test_unresolved_reference_is_reference_error() {
    assert!(eval_bool(
        "try { definitelyMissing; } catch (e) { e instanceof ReferenceError; }"
    ));
}

#[test]
fn test_calling_non_function_is_type_error() {
    assert!(eval_bool("try { (1)(); } catch (e) { e instanceof TypeError; }"));
    assert!(eval_bool(
        "try { let o = {}; o.nope(); } catch (e) { e instanceof TypeError; }"
    ));
}

#[test]
fn test_tdz_access_throws_reference_error() {
    assert!(eval_bool(
        "function f() { try { probe; let probe = 1; return false; } catch (e) { return e instanceof ReferenceError; } } f();"
    ));
}

#[test]
fn test_const_reassignment_is_type_error() {
    assert!(eval_bool(
        "function f() { const c = 1; try { c = 2; } catch (e) { return e instanceof TypeError; } } f();"
    ));
}

#[test]
fn test_rethrow_propagates() {
    let thrown = eval_throws("try { throw 'original'; } catch (e) { throw e; }");
    assert_eq!(thrown.as_str(), Some("original"));
}

#[test]
fn test_uncaught_throw_surfaces_to_embedder() {
    let thrown = eval_throws("throw { code: 7 };");
    let Value::Object(_) = thrown else {
        panic!("expected the thrown object, got {:?}", thrown);
    };
}

#[test]
fn test_any_value_is_throwable() {
    assert_eq!(eval_number("try { throw 3; } catch (e) { e + 1; }"), 4.0);
    assert!(matches!(
        eval("try { throw undefined; } catch (e) { e; }"),
        Value::Undefined
    ));
}

#[test]
fn test_nested_catch_selects_innermost() {
    assert_eq!(
        eval_string(
            "let log = [];
             try {
               try { throw 'x'; } catch (inner) { log.push('inner'); }
               log.push('after');
             } catch (outer) {
               log.push('outer');
             }
             log.join(',');"
        ),
        "inner,after"
    );
}

#[test]
fn test_exception_restores_operand_stack() {
    // The throw happens mid-expression; the handler must resume cleanly.
    assert_eq!(
        eval_number(
            "function boom() { throw 1; }
             let r = 0;
             try { r = 5 + boom(); } catch (e) { r = 20 + e; }
             r;"
        ),
        21.0
    );
}

#[test]
fn test_stack_overflow_is_range_error() {
    assert!(eval_bool(
        "function down() { return down(); }
         try { down(); } catch (e) { e instanceof RangeError; }"
    ));
}

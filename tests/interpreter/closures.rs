//! Functions, closures, and captured environments

use super::{eval, eval_number, eval_string};
use jsrun::Value;

#[test]
fn test_recursive_named_function_expression() {
    assert_eq!(
        eval_number("(function f(n){ return n<2?n:f(n-1)+f(n-2); })(10);"),
        55.0
    );
}

#[test]
fn test_per_iteration_loop_bindings() {
    assert_eq!(
        eval_string("let a=[]; for (let i=0;i<3;i++) a.push(()=>i); a.map(f=>f()).join(',');"),
        "0,1,2"
    );
}

#[test]
fn test_counter_closure() {
    assert_eq!(
        eval_number(
            "function counter() { let n = 0; return () => ++n; }
             const c = counter();
             c(); c(); c();"
        ),
        3.0
    );
}

#[test]
fn test_closures_share_environment() {
    assert_eq!(
        eval_number(
            "function pair() {
               let n = 0;
               return [() => ++n, () => n];
             }
             const fns = pair();
             fns[0](); fns[0]();
             fns[1]();"
        ),
        2.0
    );
}

#[test]
fn test_default_parameters() {
    assert_eq!(eval_number("function f(a, b = 10) { return a + b; } f(1);"), 11.0);
    assert_eq!(eval_number("function f(a, b = 10) { return a + b; } f(1, 2);"), 3.0);
    assert_eq!(
        eval_number("function f(a, b = a * 2) { return a + b; } f(3);"),
        9.0
    );
}

#[test]
fn test_rest_parameters() {
    assert_eq!(
        eval_number("function f(first, ...rest) { return rest.length; } f(1, 2, 3, 4);"),
        3.0
    );
    assert_eq!(
        eval_number("function sum(...xs) { let t = 0; for (const x of xs) t += x; return t; } sum(1, 2, 3);"),
        6.0
    );
}

#[test]
fn test_arguments_object() {
    assert_eq!(
        eval_number("function f() { return arguments.length + arguments[0]; } f(10, 20);"),
        12.0
    );
}

#[test]
fn test_arrow_this_is_lexical() {
    assert_eq!(
        eval_number(
            "const obj = {
               n: 7,
               grab() { return (() => this.n)(); }
             };
             obj.grab();"
        ),
        7.0
    );
}

#[test]
fn test_spread_arguments() {
    assert_eq!(
        eval_number("function f(a, b, c) { return a * 100 + b * 10 + c; } f(...[1, 2, 3]);"),
        123.0
    );
    assert_eq!(
        eval_number("function f(a, b, c) { return a * 100 + b * 10 + c; } f(1, ...[2, 3]);"),
        123.0
    );
}

#[test]
fn test_call_apply_bind() {
    assert_eq!(
        eval_number("function f(x) { return this.base + x; } f.call({ base: 10 }, 5);"),
        15.0
    );
    assert_eq!(
        eval_number("function f(x, y) { return this.base + x + y; } f.apply({ base: 1 }, [2, 3]);"),
        6.0
    );
    assert_eq!(
        eval_number(
            "function f(x, y) { return this.base + x + y; }
             const g = f.bind({ base: 100 }, 20);
             g(3);"
        ),
        123.0
    );
}

#[test]
fn test_function_name_and_length() {
    assert_eq!(eval_string("function named(a, b) {} named.name;"), "named");
    assert_eq!(eval_number("function named(a, b) {} named.length;"), 2.0);
    assert_eq!(eval_string("const fn = () => 0; fn.name;"), "fn");
}

#[test]
fn test_higher_order_functions() {
    assert_eq!(
        eval_number(
            "const twice = f => x => f(f(x));
             twice(n => n + 3)(10);"
        ),
        16.0
    );
}

#[test]
fn test_hoisted_function_declarations() {
    assert_eq!(eval_number("const r = hoisted(); function hoisted() { return 4; } r;"), 4.0);
}

#[test]
fn test_iife_returns_undefined_without_return() {
    assert!(matches!(eval("(function (){ 1; })();"), Value::Undefined));
}

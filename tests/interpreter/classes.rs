//! Classes, inheritance, and super dispatch

use super::{eval_bool, eval_number, eval_string, eval_throws};
use jsrun::Value;

#[test]
fn test_basic_class() {
    assert_eq!(
        eval_number(
            "class Point {
               constructor(x, y) { this.x = x; this.y = y; }
               sum() { return this.x + this.y; }
             }
             new Point(3, 4).sum();"
        ),
        7.0
    );
}

#[test]
fn test_super_method_call() {
    assert_eq!(
        eval_number(
            "class A { m() { return 1; } }
             class B extends A { m() { return super.m() + 2; } }
             new B().m();"
        ),
        3.0
    );
}

#[test]
fn test_derived_constructor_chains_super() {
    assert_eq!(
        eval_number(
            "class Base { constructor(v) { this.v = v; } }
             class Child extends Base {
               constructor() { super(10); this.v += 5; }
             }
             new Child().v;"
        ),
        15.0
    );
}

#[test]
fn test_implicit_derived_constructor_forwards_arguments() {
    assert_eq!(
        eval_number(
            "class Base { constructor(a, b) { this.total = a + b; } }
             class Child extends Base {}
             new Child(4, 5).total;"
        ),
        9.0
    );
}

#[test]
fn test_instanceof_through_chain() {
    assert!(eval_bool(
        "class A {} class B extends A {} new B() instanceof A;"
    ));
    assert!(eval_bool(
        "class A {} class B extends A {} new B() instanceof B;"
    ));
    assert!(!eval_bool("class A {} class B extends A {} new A() instanceof B;"));
}

#[test]
fn test_static_methods() {
    assert_eq!(
        eval_number("class M { static twice(n) { return n * 2; } } M.twice(21);"),
        42.0
    );
}

#[test]
fn test_getters_and_setters() {
    assert_eq!(
        eval_number(
            "class Box {
               constructor() { this.raw = 0; }
               get value() { return this.raw; }
               set value(v) { this.raw = v * 2; }
             }
             const b = new Box();
             b.value = 4;
             b.value;"
        ),
        8.0
    );
}

#[test]
fn test_generator_methods() {
    assert_eq!(
        eval_string(
            "class Seq {
               *upto(n) { for (let i = 1; i <= n; i++) yield i; }
             }
             let out = [];
             for (const v of new Seq().upto(3)) out.push(v);
             out.join(',');"
        ),
        "1,2,3"
    );
}

#[test]
fn test_class_expression_and_computed_members() {
    assert_eq!(
        eval_number(
            "const key = 'dyn';
             const C = class { [key]() { return 5; } };
             new C().dyn();"
        ),
        5.0
    );
}

#[test]
fn test_methods_are_not_enumerable() {
    assert_eq!(
        eval_number("class A { m() {} } Object.keys(A.prototype).length;"),
        0.0
    );
}

#[test]
fn test_this_before_super_throws() {
    let thrown = eval_throws(
        "class A {}
         class B extends A { constructor() { this.x = 1; super(); } }
         new B();",
    );
    assert!(matches!(thrown, Value::Object(_)));
}

#[test]
fn test_class_constructor_requires_new() {
    let thrown = eval_throws("class A {} A();");
    assert!(matches!(thrown, Value::Object(_)));
}

#[test]
fn test_constructor_property_wiring() {
    assert!(eval_bool("class A {} A.prototype.constructor === A;"));
    assert!(eval_bool("class A {} new A().constructor === A;"));
    assert!(eval_bool(
        "class A {} class B extends A {} Object.getPrototypeOf(B.prototype) === A.prototype;"
    ));
    assert!(eval_bool("class A {} class B extends A {} Object.getPrototypeOf(B) === A;"));
}

#[test]
fn test_method_shorthand_this_binding() {
    assert_eq!(
        eval_number(
            "class Counter {
               constructor() { this.n = 0; }
               bump() { this.n++; return this; }
             }
             new Counter().bump().bump().n;"
        ),
        2.0
    );
}

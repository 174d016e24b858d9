//! Object literals, property access, descriptors, and integrity levels

use super::{eval, eval_bool, eval_number, eval_string};
use jsrun::Value;

#[test]
fn test_object_literals() {
    assert_eq!(eval_number("({ a: 1, b: 2 }).b;"), 2.0);
    assert_eq!(eval_number("let k = 'key'; ({ [k]: 9 })[k];"), 9.0);
    assert_eq!(eval_number("let x = 5; ({ x }).x;"), 5.0);
    assert_eq!(eval_number("({ m() { return 6; } }).m();"), 6.0);
    assert_eq!(eval_number("({ 3: 'c' })[3] === 'c' ? 1 : 0;"), 1.0);
}

#[test]
fn test_object_literal_accessors() {
    assert_eq!(eval_number("({ get x() { return 7; } }).x;"), 7.0);
    assert_eq!(
        eval_number(
            "let o = { backing: 0, set x(v) { this.backing = v * 2; } };
             o.x = 21;
             o.backing;"
        ),
        42.0
    );
}

#[test]
fn test_object_spread() {
    assert_eq!(
        eval_string(
            "let base = { a: 1, b: 2 };
             let merged = { ...base, b: 3, c: 4 };
             merged.a + ',' + merged.b + ',' + merged.c;"
        ),
        "1,3,4"
    );
}

#[test]
fn test_keyed_access_and_delete() {
    assert_eq!(eval_number("let o = { a: 1 }; o['a'];"), 1.0);
    assert!(!eval_bool("let o = { a: 1 }; delete o.a; 'a' in o;"));
    assert!(eval_bool("let o = { a: 1 }; delete o.missing;"));
}

#[test]
fn test_in_and_instanceof() {
    assert!(eval_bool("'a' in { a: undefined };"));
    assert!(eval_bool("0 in [7];"));
    assert!(eval_bool("[] instanceof Array;"));
    assert!(eval_bool("({}) instanceof Object;"));
    assert!(!eval_bool("({}) instanceof Array;"));
}

#[test]
fn test_frozen_object_ignores_writes() {
    assert!(!eval_bool(
        "const x = {}; Object.freeze(x); try { x.y = 1; } catch (e) {} 'y' in x;"
    ));
    assert!(eval_bool("const x = { a: 1 }; Object.freeze(x); Object.isFrozen(x);"));
    assert_eq!(
        eval_number("const x = { a: 1 }; Object.freeze(x); x.a = 9; x.a;"),
        1.0
    );
}

#[test]
fn test_sealed_objects_allow_writes() {
    assert_eq!(
        eval_number("const x = { a: 1 }; Object.seal(x); x.a = 2; x.b = 3; x.a;"),
        2.0
    );
    assert!(!eval_bool("const x = { a: 1 }; Object.seal(x); x.b = 3; 'b' in x;"));
    assert!(eval_bool("const x = {}; Object.seal(x); Object.isSealed(x);"));
}

#[test]
fn test_define_property_and_descriptors() {
    assert_eq!(
        eval_number(
            "let o = {};
             Object.defineProperty(o, 'x', { value: 5, writable: false });
             o.x = 9;
             o.x;"
        ),
        5.0
    );
    assert!(!eval_bool(
        "let o = {};
         Object.defineProperty(o, 'x', { value: 1 });
         let d = Object.getOwnPropertyDescriptor(o, 'x');
         d.enumerable;"
    ));
    assert_eq!(
        eval_number(
            "let o = {};
             Object.defineProperty(o, 'x', { get() { return 11; } });
             o.x;"
        ),
        11.0
    );
}

#[test]
fn test_prototype_chain_lookup() {
    assert_eq!(
        eval_number(
            "let base = { greet() { return 3; } };
             let child = Object.create(base);
             child.greet();"
        ),
        3.0
    );
    assert!(eval_bool(
        "let base = {}; let child = Object.create(base); base.isPrototypeOf(child);"
    ));
    assert!(eval_bool(
        "let child = Object.create(null); Object.getPrototypeOf(child) === null;"
    ));
}

#[test]
fn test_set_walks_to_receiver() {
    // Assignment through a prototype creates the property on the receiver.
    assert_eq!(
        eval_string(
            "let proto = { x: 1 };
             let child = Object.create(proto);
             child.x = 2;
             proto.x + ',' + child.x + ',' + child.hasOwnProperty('x');"
        ),
        "1,2,true"
    );
}

#[test]
fn test_object_keys_ordering() {
    assert_eq!(
        eval_string("Object.keys({ b: 1, 2: 2, a: 3, 0: 4 }).join(',');"),
        "0,2,b,a"
    );
}

#[test]
fn test_entries_fromentries_round_trip() {
    assert!(eval_bool(
        "let o = { a: 1, b: 'two' };
         let copy = Object.fromEntries(Object.entries(o));
         copy.a === o.a && copy.b === o.b && Object.keys(copy).length === 2;"
    ));
}

#[test]
fn test_arrays() {
    assert_eq!(eval_number("[10, 20, 30].length;"), 3.0);
    assert_eq!(eval_number("let a = []; a.push(7); a[0];"), 7.0);
    assert_eq!(eval_number("[1, 2, 3].indexOf(2);"), 1.0);
    assert!(eval_bool("[1, NaN].includes(NaN);"));
    assert_eq!(eval_string("[1, 2, 3].map(x => x * 2).join('-');"), "2-4-6");
    assert_eq!(eval_number("[1, 2, 3, 4].filter(x => x % 2).length;"), 2.0);
    assert_eq!(eval_string("[3, , 1].join(',');"), "3,,1");
    assert_eq!(eval_number("[...[1, 2], 3].length;"), 3.0);
    assert_eq!(eval_number("let a = [1, 2]; a.pop(); a.length;"), 1.0);
}

#[test]
fn test_frozen_array_length_is_immutable() {
    assert_eq!(
        eval_number("let a = [1, 2, 3]; Object.freeze(a); a.length = 1; a.length;"),
        3.0
    );
    assert_eq!(
        eval_string("let a = [1, 2, 3]; Object.freeze(a); a.length = 1; a.join(',');"),
        "1,2,3"
    );
    assert!(eval_bool("let a = [1, 2]; Object.freeze(a); Object.isFrozen(a);"));
    // Sealing leaves the length adjustable.
    assert_eq!(
        eval_number("let a = [1, 2, 3]; Object.seal(a); a.length = 1; a.length;"),
        1.0
    );
}

#[test]
fn test_array_length_truncates() {
    assert_eq!(
        eval_string("let a = [1, 2, 3]; a.length = 1; a.join(',') + ':' + a.length;"),
        "1:1"
    );
}

#[test]
fn test_json_round_trip() {
    assert!(eval_bool(
        "let x = { a: 1, b: 'two', c: [true, null] };
         let y = JSON.parse(JSON.stringify(x));
         y.a === 1 && y.b === 'two' && y.c[0] === true && y.c[1] === null;"
    ));
    assert_eq!(eval_string("JSON.stringify({ a: [1, 2] });"), r#"{"a":[1,2]}"#);
    assert_eq!(eval_number("JSON.parse('{\"n\": 42}').n;"), 42.0);
}

#[test]
fn test_optional_chaining() {
    assert!(matches!(eval("let o = null; o?.x;"), Value::Undefined));
    assert!(matches!(eval("let o = {}; o.missing?.deep;"), Value::Undefined));
    assert_eq!(eval_number("let p = { q: { r: 5 } }; p?.q?.r;"), 5.0);
    assert!(matches!(eval("let o = {}; o.f?.();"), Value::Undefined));
    assert_eq!(eval_number("let o = { f() { return 2; } }; o.f?.();"), 2.0);
}

#[test]
fn test_hole_arrays_report_length() {
    assert_eq!(eval_number("[, , 5].length;"), 3.0);
}

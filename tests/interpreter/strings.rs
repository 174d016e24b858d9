//! String primitives and their prototype methods

use super::{eval_bool, eval_number, eval_string};

#[test]
fn test_length_and_indexing() {
    assert_eq!(eval_number("'hello'.length;"), 5.0);
    assert_eq!(eval_string("'hello'[1];"), "e");
    assert_eq!(eval_string("'hello'.charAt(0);"), "h");
    assert_eq!(eval_number("'A'.charCodeAt(0);"), 65.0);
}

#[test]
fn test_search_methods() {
    assert_eq!(eval_number("'banana'.indexOf('na');"), 2.0);
    assert_eq!(eval_number("'banana'.indexOf('x');"), -1.0);
    assert!(eval_bool("'banana'.includes('nan');"));
}

#[test]
fn test_slice() {
    assert_eq!(eval_string("'abcdef'.slice(1, 3);"), "bc");
    assert_eq!(eval_string("'abcdef'.slice(-2);"), "ef");
    assert_eq!(eval_string("'abcdef'.slice(4, 2);"), "");
}

#[test]
fn test_split_and_join() {
    assert_eq!(eval_number("'a,b,c'.split(',').length;"), 3.0);
    assert_eq!(eval_string("'a,b'.split(',').join('+');"), "a+b");
    assert_eq!(eval_number("'abc'.split('').length;"), 3.0);
}

#[test]
fn test_case_conversion() {
    assert_eq!(eval_string("'MiXeD'.toLowerCase();"), "mixed");
    assert_eq!(eval_string("'MiXeD'.toUpperCase();"), "MIXED");
}

#[test]
fn test_normalize() {
    // U+0065 U+0301 composes to U+00E9 under NFC.
    assert!(eval_bool("'e\\u0301'.normalize() === '\\u00e9';"));
    assert!(eval_bool("'\\u00e9'.normalize('NFD').length === 2;"));
}

#[test]
fn test_string_conversion() {
    assert_eq!(eval_string("String(42);"), "42");
    assert_eq!(eval_string("String(null);"), "null");
    assert_eq!(eval_string("(42).toString();"), "42");
    assert_eq!(eval_string("(255).toString(16);"), "ff");
    assert_eq!(eval_string("true.toString();"), "true");
}

#[test]
fn test_number_parsing_globals() {
    assert_eq!(eval_number("parseInt('42px');"), 42.0);
    assert_eq!(eval_number("parseInt('ff', 16);"), 255.0);
    assert_eq!(eval_number("parseFloat('3.5rest');"), 3.5);
    assert!(eval_bool("isNaN(parseInt('nope'));"));
}

#[test]
fn test_boxed_strings() {
    assert_eq!(eval_number("new String('abc').length;"), 3.0);
    assert_eq!(eval_string("new String('abc').slice(1);"), "bc");
}

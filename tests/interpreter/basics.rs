//! Arithmetic, coercions, equality, and variables

use super::{eval, eval_bool, eval_number, eval_string};
use jsrun::Value;

#[test]
fn test_arithmetic() {
    assert_eq!(eval_number("1 + 2;"), 3.0);
    assert_eq!(eval_number("10 - 4;"), 6.0);
    assert_eq!(eval_number("3 * 4;"), 12.0);
    assert_eq!(eval_number("15 / 3;"), 5.0);
    assert_eq!(eval_number("7 % 4;"), 3.0);
    assert_eq!(eval_number("2 ** 10;"), 1024.0);
}

#[test]
fn test_precedence() {
    assert_eq!(eval_number("1 + 2 * 3;"), 7.0);
    assert_eq!(eval_number("(1 + 2) * 3;"), 9.0);
    assert_eq!(eval_number("2 ** 3 ** 2;"), 512.0); // right-associative
}

#[test]
fn test_string_concat() {
    assert_eq!(eval_string("'a' + 'b';"), "ab");
    assert_eq!(eval_string("1 + '2';"), "12");
    assert_eq!(eval_string("'' + null;"), "null");
    assert_eq!(eval_string("'' + undefined;"), "undefined");
}

#[test]
fn test_comparisons() {
    assert!(eval_bool("1 < 2;"));
    assert!(eval_bool("2 >= 2;"));
    assert!(eval_bool("'a' < 'b';"));
    assert!(!eval_bool("NaN < 1;"));
    assert!(!eval_bool("1 < NaN;"));
    assert!(!eval_bool("NaN >= NaN;"));
}

#[test]
fn test_equality() {
    assert!(eval_bool("1 === 1;"));
    assert!(!eval_bool("1 === '1';"));
    assert!(eval_bool("1 == '1';"));
    assert!(eval_bool("null == undefined;"));
    assert!(!eval_bool("null === undefined;"));
    assert!(!eval_bool("NaN === NaN;"));
    assert!(eval_bool("true == 1;"));
}

#[test]
fn test_variables() {
    assert_eq!(eval_number("let x = 5; x;"), 5.0);
    assert_eq!(eval_number("let x = 5; x = 10; x;"), 10.0);
    assert_eq!(eval_number("var y = 1; y += 2; y;"), 3.0);
    assert_eq!(eval_number("let a = 1, b = 2; a + b;"), 3.0);
}

#[test]
fn test_update_expressions() {
    assert_eq!(eval_number("let x = 1; x++;"), 1.0);
    assert_eq!(eval_number("let x = 1; x++; x;"), 2.0);
    assert_eq!(eval_number("let x = 1; ++x;"), 2.0);
    assert_eq!(eval_number("let x = 1; --x; x;"), 0.0);
    assert_eq!(eval_number("let o = { n: 5 }; o.n++; o.n;"), 6.0);
    assert_eq!(eval_number("let a = [1]; a[0]++ + a[0];"), 3.0);
}

#[test]
fn test_logical_operators() {
    assert_eq!(eval_number("0 || 2;"), 2.0);
    assert_eq!(eval_number("1 && 2;"), 2.0);
    assert_eq!(eval_number("0 && 2;"), 0.0);
    assert_eq!(eval_string("null ?? 'fallback';"), "fallback");
    assert_eq!(eval_number("0 ?? 5;"), 0.0);
}

#[test]
fn test_logical_assignment() {
    assert_eq!(eval_number("let x = 0; x ||= 9; x;"), 9.0);
    assert_eq!(eval_number("let x = 1; x &&= 9; x;"), 9.0);
    assert_eq!(eval_number("let x = 0; x ??= 9; x;"), 0.0);
}

#[test]
fn test_bitwise() {
    assert_eq!(eval_number("8 | 1;"), 9.0);
    assert_eq!(eval_number("7 & 3;"), 3.0);
    assert_eq!(eval_number("5 ^ 1;"), 4.0);
    assert_eq!(eval_number("~0;"), -1.0);
    assert_eq!(eval_number("1 << 4;"), 16.0);
    assert_eq!(eval_number("-8 >> 1;"), -4.0);
    assert_eq!(eval_number("-1 >>> 28;"), 15.0);
}

#[test]
fn test_typeof() {
    assert_eq!(eval_string("typeof 1;"), "number");
    assert_eq!(eval_string("typeof 'x';"), "string");
    assert_eq!(eval_string("typeof true;"), "boolean");
    assert_eq!(eval_string("typeof undefined;"), "undefined");
    assert_eq!(eval_string("typeof null;"), "object");
    assert_eq!(eval_string("typeof {};"), "object");
    assert_eq!(eval_string("typeof (() => 0);"), "function");
    assert_eq!(eval_string("typeof 1n;"), "bigint");
    // Unresolved names never throw under typeof.
    assert_eq!(eval_string("typeof definitelyNotDeclared;"), "undefined");
}

#[test]
fn test_ternary_and_sequences() {
    assert_eq!(eval_number("true ? 1 : 2;"), 1.0);
    assert_eq!(eval_number("false ? 1 : 2;"), 2.0);
    assert_eq!(eval_number("(1, 2, 3);"), 3.0);
}

#[test]
fn test_template_literals() {
    assert_eq!(eval_string("`plain`;"), "plain");
    assert_eq!(eval_string("let n = 6; `${n} * 7 = ${n * 7}`;"), "6 * 7 = 42");
    assert_eq!(eval_string("`${1}${2}`;"), "12");
}

#[test]
fn test_bigint_arithmetic() {
    assert_eq!(eval_string("(1n + 2n).toString();"), "3");
    assert_eq!(eval_string("(2n ** 64n).toString();"), "18446744073709551616");
    assert!(eval_bool("1n === 1n;"));
    assert!(eval_bool("1n == 1;"));
    assert!(eval_bool("1n < 2;"));
}

#[test]
fn test_bigint_loose_equality_edge_cases() {
    // StringToBigInt: empty text is zero, radix prefixes count.
    assert!(eval_bool("0n == '';"));
    assert!(eval_bool("0n == '   ';"));
    assert!(eval_bool("16n == '0x10';"));
    assert!(eval_bool("5n == '0b101';"));
    assert!(!eval_bool("1n == '1.0';"));
    assert!(!eval_bool("1n == 'pear';"));
    // Number comparison is exact past the i64 range.
    assert!(eval_bool("100000000000000000000n == 100000000000000000000;"));
    assert!(!eval_bool("100000000000000000001n == 100000000000000000000;"));
}

#[test]
fn test_mixing_bigint_and_number_throws() {
    let thrown = super::eval_throws("1n + 1;");
    assert!(matches!(thrown, Value::Object(_)));
}

#[test]
fn test_void_and_unary() {
    assert!(matches!(eval("void 0;"), Value::Undefined));
    assert_eq!(eval_number("-'3';"), -3.0);
    assert_eq!(eval_number("+'3';"), 3.0);
    assert!(eval_bool("!0;"));
    assert!(!eval_bool("!'text';"));
}

#[test]
fn test_completion_value_is_last_expression() {
    assert_eq!(eval_number("1; 2; 3;"), 3.0);
    assert!(matches!(eval("let x = 1;"), Value::Undefined));
}

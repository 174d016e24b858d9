//! Loops, switch, labels, and try/catch/finally control transfer

use super::{eval_number, eval_string};

#[test]
fn test_if_else() {
    assert_eq!(eval_number("let r = 0; if (1 < 2) r = 1; else r = 2; r;"), 1.0);
    assert_eq!(eval_number("let r = 0; if (1 > 2) r = 1; else r = 2; r;"), 2.0);
    assert_eq!(eval_number("let r = 5; if (false) r = 1; r;"), 5.0);
}

#[test]
fn test_while_loop() {
    assert_eq!(
        eval_number("let i = 0, sum = 0; while (i < 5) { sum += i; i++; } sum;"),
        10.0
    );
    assert_eq!(eval_number("let i = 9; while (false) { i = 0; } i;"), 9.0);
}

#[test]
fn test_do_while_runs_once() {
    assert_eq!(eval_number("let i = 0; do { i++; } while (false); i;"), 1.0);
    assert_eq!(eval_number("let i = 0; do { i++; } while (i < 3); i;"), 3.0);
}

#[test]
fn test_for_loop() {
    assert_eq!(
        eval_number("let sum = 0; for (let i = 1; i <= 4; i++) sum += i; sum;"),
        10.0
    );
    assert_eq!(
        eval_number("let n = 0; for (;;) { n++; if (n === 3) break; } n;"),
        3.0
    );
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        eval_number("let s = 0; for (let i = 0; i < 10; i++) { if (i % 2) continue; if (i > 6) break; s += i; } s;"),
        12.0 // 0 + 2 + 4 + 6
    );
}

#[test]
fn test_labelled_loops() {
    assert_eq!(
        eval_number(
            "let hits = 0;
             outer: for (let i = 0; i < 3; i++) {
               for (let j = 0; j < 3; j++) {
                 if (j === 1) continue outer;
                 hits++;
               }
             }
             hits;"
        ),
        3.0
    );
    assert_eq!(
        eval_number(
            "let n = 0;
             outer: for (let i = 0; i < 3; i++) {
               for (let j = 0; j < 3; j++) {
                 n++;
                 if (i === 1) break outer;
               }
             }
             n;"
        ),
        4.0
    );
}

#[test]
fn test_labelled_block_break() {
    assert_eq!(
        eval_number("let r = 1; skip: { r = 2; break skip; r = 3; } r;"),
        2.0
    );
}

#[test]
fn test_switch() {
    let source = "
        function describe(x) {
          switch (x) {
            case 1: return 'one';
            case 2: return 'two';
            default: return 'many';
          }
        }
        describe(1) + ',' + describe(2) + ',' + describe(9);";
    assert_eq!(eval_string(source), "one,two,many");
}

#[test]
fn test_switch_fallthrough() {
    assert_eq!(
        eval_number(
            "let n = 0;
             switch (1) {
               case 1: n += 1;
               case 2: n += 10; break;
               case 3: n += 100;
             }
             n;"
        ),
        11.0
    );
}

#[test]
fn test_switch_uses_strict_equality() {
    assert_eq!(
        eval_string(
            "let r = 'none';
             switch ('1') { case 1: r = 'number'; break; case '1': r = 'string'; break; }
             r;"
        ),
        "string"
    );
}

#[test]
fn test_for_in_enumerates_string_keys() {
    assert_eq!(
        eval_string("let out = []; for (const k in { a: 1, b: 2 }) out.push(k); out.join(',');"),
        "a,b"
    );
    // Nullish targets run zero iterations.
    assert_eq!(
        eval_number("let n = 0; for (const k in null) n++; n;"),
        0.0
    );
}

#[test]
fn test_for_of_over_arrays() {
    assert_eq!(
        eval_number("let sum = 0; for (const v of [1, 2, 3]) sum += v; sum;"),
        6.0
    );
    assert_eq!(
        eval_string("let out = ''; for (const c of ['x', 'y']) out += c; out;"),
        "xy"
    );
}

#[test]
fn test_try_finally_ordering() {
    assert_eq!(
        eval_string(
            "let log = [];
             function f() {
               try { log.push('t'); return 'r'; }
               finally { log.push('f'); }
             }
             f() + ':' + log.join('');"
        ),
        "r:tf"
    );
}

#[test]
fn test_finally_runs_on_throw_path() {
    assert_eq!(
        eval_string(
            "let log = [];
             try {
               try { throw 'boom'; }
               finally { log.push('inner'); }
             } catch (e) {
               log.push('caught:' + e);
             }
             log.join(',');"
        ),
        "inner,caught:boom"
    );
}

#[test]
fn test_break_through_finally() {
    assert_eq!(
        eval_string(
            "let log = [];
             for (let i = 0; i < 3; i++) {
               try { if (i === 1) break; log.push(i); }
               finally { log.push('f' + i); }
             }
             log.join(',');"
        ),
        "0,f0,f1"
    );
}

#[test]
fn test_nested_env_unwinding_on_break() {
    assert_eq!(
        eval_number(
            "let captured = [];
             for (let i = 0; i < 5; i++) {
               let local = i;
               captured.push(() => local);
               if (i === 2) break;
             }
             captured.length;"
        ),
        3.0
    );
}

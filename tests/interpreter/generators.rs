//! Generator functions: suspension, resumption, and sent values

use super::{eval_bool, eval_number, eval_string};

#[test]
fn test_basic_yielding() {
    assert_eq!(
        eval_string(
            "function* gen() { yield 1; yield 2; }
             const g = gen();
             const r = [];
             r.push(g.next().value);
             r.push(g.next().value);
             r.push(g.next().done);
             r.join(',');"
        ),
        "1,2,true"
    );
}

#[test]
fn test_done_generator_stays_done() {
    assert!(eval_bool(
        "function* g() { yield 1; }
         const it = g();
         it.next(); it.next();
         it.next().done && it.next().value === undefined;"
    ));
}

#[test]
fn test_sent_values() {
    assert_eq!(
        eval_number(
            "function* g() { const x = yield 1; yield x * 2; }
             const it = g();
             it.next();
             it.next(21).value;"
        ),
        42.0
    );
}

#[test]
fn test_locals_survive_suspension() {
    assert_eq!(
        eval_string(
            "function* count() {
               let n = 0;
               while (n < 3) { yield n; n++; }
               return 'end';
             }
             const it = count();
             const r = [];
             r.push(it.next().value);
             r.push(it.next().value);
             r.push(it.next().value);
             r.push(it.next().value);
             r.join(',');"
        ),
        "0,1,2,end"
    );
}

#[test]
fn test_generators_are_iterable() {
    assert_eq!(
        eval_number(
            "function* upto(n) { for (let i = 1; i <= n; i++) yield i; }
             let sum = 0;
             for (const v of upto(4)) sum += v;
             sum;"
        ),
        10.0
    );
    assert_eq!(
        eval_number("function* g() { yield 7; yield 8; } [...g()].length;"),
        2.0
    );
}

#[test]
fn test_yield_inside_expression() {
    // The partial operand stack around the yield survives suspension.
    assert_eq!(
        eval_number(
            "function* g() { return 100 + (yield 0) + (yield 1); }
             const it = g();
             it.next();
             it.next(20);
             it.next(3).value;"
        ),
        123.0
    );
}

#[test]
fn test_yield_delegate() {
    assert_eq!(
        eval_string(
            "function* inner() { yield 'b'; yield 'c'; }
             function* outer() { yield 'a'; yield* inner(); yield 'd'; }
             [...outer()].join('');"
        ),
        "abcd"
    );
}

#[test]
fn test_generator_arguments_capture() {
    assert_eq!(
        eval_number(
            "function* scale(factor) { yield 1 * factor; yield 2 * factor; }
             const it = scale(10);
             it.next().value + it.next().value;"
        ),
        30.0
    );
}

#[test]
fn test_early_return_marks_done() {
    assert!(eval_bool(
        "function* g() { yield 1; return 2; yield 3; }
         const it = g();
         it.next();
         const second = it.next();
         second.value === 2 && second.done === true;"
    ));
}

#[test]
fn test_generator_return_method() {
    assert!(eval_bool(
        "function* g() { yield 1; yield 2; }
         const it = g();
         it.next();
         it.return(9);
         it.next().done;"
    ));
}

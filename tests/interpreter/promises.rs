//! Promises and the microtask checkpoint

use jsrun::{run_source, Agent, RunResult};

use super::{eval_bool, eval_number};

/// Run a script, letting `run_source` drain the microtask checkpoint, then
/// read back a global.
fn eval_after_checkpoint(setup: &str, probe: &str) -> f64 {
    let mut agent = Agent::new();
    let realm = agent.make_realm();
    let first = run_source(&mut agent, &realm, setup);
    assert!(first.is_success(), "setup failed: {:?}", first);
    match run_source(&mut agent, &realm, probe) {
        RunResult::Success(value) => value.as_number().expect("number probe"),
        other => panic!("probe failed: {:?}", other),
    }
}

#[test]
fn test_then_runs_after_synchronous_code() {
    // The completion value is computed before the checkpoint drains.
    assert_eq!(
        eval_number("let t = 0; Promise.resolve().then(() => t = 1); t;"),
        0.0
    );
    // After the checkpoint, the handler has run.
    assert_eq!(
        eval_after_checkpoint("let t = 0; Promise.resolve().then(() => t = 1);", "t;"),
        1.0
    );
}

#[test]
fn test_then_chaining() {
    assert_eq!(
        eval_after_checkpoint(
            "let r = 0;
             Promise.resolve(1)
               .then(v => v + 1)
               .then(v => v * 10)
               .then(v => r = v);",
            "r;"
        ),
        20.0
    );
}

#[test]
fn test_rejection_routes_to_catch() {
    assert_eq!(
        eval_after_checkpoint(
            "let r = 0;
             Promise.reject('bad').catch(e => r = e === 'bad' ? 7 : -1);",
            "r;"
        ),
        7.0
    );
}

#[test]
fn test_throw_in_handler_rejects_derived() {
    assert_eq!(
        eval_after_checkpoint(
            "let r = 0;
             Promise.resolve()
               .then(() => { throw 'oops'; })
               .catch(e => r = e === 'oops' ? 3 : -1);",
            "r;"
        ),
        3.0
    );
}

#[test]
fn test_executor_runs_synchronously() {
    assert_eq!(
        eval_number("let r = 0; new Promise(resolve => { r = 5; resolve(); }); r;"),
        5.0
    );
}

#[test]
fn test_executor_resolution_reaches_then() {
    assert_eq!(
        eval_after_checkpoint(
            "let r = 0;
             new Promise(resolve => resolve(11)).then(v => r = v);",
            "r;"
        ),
        11.0
    );
}

#[test]
fn test_microtasks_run_in_fifo_order() {
    assert_eq!(
        eval_after_checkpoint(
            "globalThis.order = [];
             Promise.resolve().then(() => order.push(1));
             Promise.resolve().then(() => order.push(2));
             Promise.resolve().then(() => order.push(3));",
            "order.join('') === '123' ? 1 : 0;"
        ),
        1.0
    );
}

#[test]
fn test_nested_enqueues_drain_in_same_checkpoint() {
    assert_eq!(
        eval_after_checkpoint(
            "globalThis.log = [];
             Promise.resolve().then(() => {
               log.push('a');
               Promise.resolve().then(() => log.push('b'));
             });",
            "log.join('') === 'ab' ? 1 : 0;"
        ),
        1.0
    );
}

#[test]
fn test_resolve_passes_promises_through() {
    assert!(eval_bool(
        "const p = Promise.resolve(1); Promise.resolve(p) === p;"
    ));
}

#[test]
fn test_handler_result_adopts_inner_promise() {
    assert_eq!(
        eval_after_checkpoint(
            "let r = 0;
             Promise.resolve(1)
               .then(v => Promise.resolve(v + 41))
               .then(v => r = v);",
            "r;"
        ),
        42.0
    );
}

//! Interpreter benchmarks
//!
//! Run with: cargo bench --bench interpreter

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jsrun::compiler::compile_program;
use jsrun::parser::Parser;
use jsrun::{run_source, Agent, RunResult};

const FIB: &str = "(function f(n){ return n < 2 ? n : f(n - 1) + f(n - 2); })(15);";

const LOOP_SUM: &str = "
let sum = 0;
for (let i = 0; i < 10000; i++) { sum += i; }
sum;";

const OBJECT_CHURN: &str = "
let total = 0;
for (let i = 0; i < 500; i++) {
  const o = { a: i, b: i * 2, nested: { c: i } };
  total += o.a + o.b + o.nested.c;
}
total;";

const CLOSURES: &str = "
function make(n) { return () => n * 2; }
let t = 0;
for (let i = 0; i < 2000; i++) { t += make(i)(); }
t;";

fn eval(source: &str) -> f64 {
    let mut agent = Agent::new();
    let realm = agent.make_realm();
    match run_source(&mut agent, &realm, source) {
        RunResult::Success(value) => value.as_number().unwrap_or(f64::NAN),
        other => panic!("benchmark source failed: {:?}", other),
    }
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_loop_sum", |b| {
        b.iter(|| {
            Parser::new(black_box(LOOP_SUM))
                .parse_program(false)
                .expect("parse")
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_loop_sum", |b| {
        b.iter(|| {
            let program = Parser::new(black_box(LOOP_SUM))
                .parse_program(false)
                .expect("parse");
            compile_program(&program).expect("compile")
        })
    });
}

fn bench_execute(c: &mut Criterion) {
    c.bench_function("fib_15", |b| b.iter(|| black_box(eval(FIB))));
    c.bench_function("loop_sum_10k", |b| b.iter(|| black_box(eval(LOOP_SUM))));
    c.bench_function("object_churn", |b| b.iter(|| black_box(eval(OBJECT_CHURN))));
    c.bench_function("closure_calls", |b| b.iter(|| black_box(eval(CLOSURES))));
}

criterion_group!(benches, bench_parse, bench_compile, bench_execute);
criterion_main!(benches);

//! Tests for the bytecode compiler
//!
//! These verify the shape of the emitted IR and that everything the
//! compiler produces passes the validator.

use jsrun::compiler::{compile_program, CompiledProgram};
use jsrun::ir::{validate, FunctionInfo, Opcode};
use jsrun::parser::Parser;

fn compile(source: &str) -> CompiledProgram {
    let program = Parser::new(source)
        .parse_program(false)
        .expect("parse failed");
    compile_program(&program).expect("compile failed")
}

fn contains_op<F: Fn(&Opcode) -> bool>(info: &FunctionInfo, predicate: F) -> bool {
    info.opcodes.iter().any(predicate)
}

#[test]
fn test_number_literal_uses_constant_pool() {
    let compiled = compile("42;");
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::PushConstant(_)
    )));
}

#[test]
fn test_script_declares_globals() {
    let compiled = compile("var a = 1; let b = 2; function f() {}");
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::DeclareGlobals(_)
    )));
    // The function declaration compiles to a stored closure.
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::CreateClosure(_)
    )));
    assert_eq!(compiled.info.children.len(), 1);
}

#[test]
fn test_if_lowers_to_boolean_jump() {
    let compiled = compile("if (x) { y; }");
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::JumpIfToBooleanFalse(_)
    )));
}

#[test]
fn test_typeof_unresolved_never_throws() {
    let compiled = compile("typeof missing;");
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::TypeOfGlobal(_)
    )));
    assert!(!contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::LoadGlobal(_)
    )));
}

#[test]
fn test_try_catch_registers_handler_region() {
    let compiled = compile("try { f(); } catch (e) { e; }");
    assert_eq!(compiled.info.handlers.len(), 1);
    let region = compiled.info.handlers[0];
    assert!(region.start < region.end);
    assert!(region.handler >= region.end);
}

#[test]
fn test_try_finally_registers_two_regions() {
    let compiled = compile("try { f(); } catch (e) { g(); } finally { h(); }");
    assert_eq!(compiled.info.handlers.len(), 2);
}

#[test]
fn test_captured_binding_moves_to_environment() {
    let compiled = compile("function outer() { let a = 1; return () => a; }");
    let outer = &compiled.info.children[0];
    assert!(outer
        .opcodes
        .iter()
        .any(|op| matches!(op, Opcode::PushDeclarativeEnvRecord(n) if *n >= 1)));
    // The arrow itself pushes no record, so the captured slot is on its
    // current (captured) environment.
    let arrow = &outer.children[0];
    assert!(arrow.opcodes.iter().any(|op| matches!(
        op,
        Opcode::LoadCurrentEnvSlot(_) | Opcode::LoadEnvSlot { .. }
    )));
}

#[test]
fn test_uncaptured_binding_stays_local() {
    let compiled = compile("function f() { let a = 1; return a; }");
    let f = &compiled.info.children[0];
    assert!(!f
        .opcodes
        .iter()
        .any(|op| matches!(op, Opcode::PushDeclarativeEnvRecord(_))));
    assert!(f.opcodes.iter().any(|op| matches!(op, Opcode::LoadValue(_))));
}

#[test]
fn test_generator_starts_with_jump_table() {
    let compiled = compile("function* g() { yield 1; }");
    let gen = &compiled.info.children[0];
    assert!(gen.is_generator);
    assert!(matches!(gen.opcodes[0], Opcode::JumpTable(_)));
    assert!(gen
        .opcodes
        .iter()
        .any(|op| matches!(op, Opcode::SetGeneratorPhase(1))));
}

#[test]
fn test_const_reassignment_compiles_to_throw() {
    let compiled = compile("function f() { const c = 1; c = 2; }");
    let f = &compiled.info.children[0];
    assert!(f
        .opcodes
        .iter()
        .any(|op| matches!(op, Opcode::ThrowConstantReassignmentError(_))));
}

#[test]
fn test_optional_chain_uses_nullish_jump() {
    let compiled = compile("a?.b;");
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::JumpIfNotNullish(_)
    )));
}

#[test]
fn test_spread_call_uses_call_array() {
    let compiled = compile("f(...xs);");
    assert!(contains_op(&compiled.info, |op| matches!(op, Opcode::CallArray)));
    assert!(contains_op(&compiled.info, |op| matches!(
        op,
        Opcode::GetIterator
    )));
}

#[test]
fn test_class_lowering_shape() {
    let compiled = compile("class A { m() {} static s() {} get v() { return 1; } }");
    for expected in [
        |op: &Opcode| matches!(op, Opcode::PushEmpty),
        |op: &Opcode| matches!(op, Opcode::CreateClassConstructor(_)),
        |op: &Opcode| matches!(op, Opcode::CreateClass),
        |op: &Opcode| matches!(op, Opcode::FinalizeClass),
    ] {
        assert!(contains_op(&compiled.info, expected));
    }
    let attach_count = compiled
        .info
        .opcodes
        .iter()
        .filter(|op| matches!(op, Opcode::AttachClassMethod { .. }))
        .count();
    assert_eq!(attach_count, 3);
}

#[test]
fn test_everything_compiled_validates() {
    let sources = [
        "1 + 2 * 3;",
        "let x = 1; x += 2; x;",
        "function f(a, b = 1, ...rest) { return arguments.length; } f(1, 2, 3);",
        "for (let i = 0; i < 3; i++) { if (i === 1) continue; }",
        "outer: for (;;) { for (;;) { break outer; } }",
        "for (const k in { a: 1 }) { k; }",
        "for (const v of [1, 2]) { v; }",
        "switch (x) { case 1: break; case 2: y; default: z; }",
        "try { f(); } catch (e) { g(e); } finally { h(); }",
        "try { return_fn(); } catch { }",
        "class A {} class B extends A { constructor() { super(); } }",
        "function* g() { let a = yield 1; yield* [a]; }",
        "let o = { a: 1, ['b']: 2, c() { return 3; }, get d() { return 4; }, ...rest };",
        "let a = [1, , 2, ...xs];",
        "x?.y?.();",
        "a && b || c ?? d;",
        "`one ${1 + 1} two`;",
        "new X(1, ...ys);",
        "delete obj.prop; typeof nope; void 0;",
        "label: { break label; }",
        "do { x--; } while (x);",
        "let s = x === null ? 'n' : 'o';",
    ];
    for source in sources {
        let compiled = compile(source);
        validate(&compiled.info)
            .unwrap_or_else(|e| panic!("validator rejected {:?}: {}", source, e));
    }
}

#[test]
fn test_module_meta_collects_imports_and_exports() {
    let program = Parser::new("import { a as b } from 'dep'; export let c = b; export default 1;")
        .parse_program(true)
        .expect("parse failed");
    let compiled = compile_program(&program).expect("compile failed");
    let meta = compiled.module.expect("module metadata");
    assert_eq!(meta.requests.len(), 1);
    assert_eq!(meta.requests[0].specifier.as_str(), "dep");
    assert_eq!(meta.requests[0].bindings.len(), 1);
    let names: Vec<&str> = meta.exports.iter().map(|(n, _)| n.as_str()).collect();
    assert!(names.contains(&"c"));
    assert!(names.contains(&"default"));
}

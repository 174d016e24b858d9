//! IR validator
//!
//! Static checks over a `FunctionInfo` before execution: jump targets in
//! range, handler regions well-nested with valid entries, operand-stack
//! balance identical on every path into an instruction, and local accesses
//! agreeing with declared slot kinds. A function that validates cannot
//! underflow the operand stack and reaches `Return` with exactly one value.

use thiserror::Error;

use super::{FunctionInfo, LocalKind, Opcode};

#[derive(Debug, Clone, Error)]
#[error("invalid IR in {function:?}: {reason}")]
pub struct ValidationError {
    pub function: String,
    pub reason: String,
}

/// Validate a function and all of its children.
pub fn validate(info: &FunctionInfo) -> Result<(), ValidationError> {
    validate_one(info)?;
    for child in &info.children {
        validate(child)?;
    }
    Ok(())
}

fn err(info: &FunctionInfo, reason: String) -> ValidationError {
    ValidationError {
        function: info.name.as_str().to_string(),
        reason,
    }
}

fn validate_one(info: &FunctionInfo) -> Result<(), ValidationError> {
    let len = info.opcodes.len() as u32;

    check_targets(info, len)?;
    check_handlers(info, len)?;
    check_locals(info)?;
    check_stack_balance(info, len)?;
    Ok(())
}

fn check_targets(info: &FunctionInfo, len: u32) -> Result<(), ValidationError> {
    for (i, op) in info.opcodes.iter().enumerate() {
        let targets: Vec<u32> = match op {
            Opcode::Jump(t)
            | Opcode::JumpIfTrue(t)
            | Opcode::JumpIfFalse(t)
            | Opcode::JumpIfToBooleanTrue(t)
            | Opcode::JumpIfToBooleanFalse(t)
            | Opcode::JumpIfUndefined(t)
            | Opcode::JumpIfNotUndefined(t)
            | Opcode::JumpIfNotNullish(t)
            | Opcode::JumpIfNotEmpty(t) => vec![*t],
            Opcode::JumpTable(ts) => ts.clone(),
            _ => continue,
        };
        for t in targets {
            if t >= len {
                return Err(err(
                    info,
                    format!("jump target {} out of range at instruction {}", t, i),
                ));
            }
        }
    }

    // Pool and child references.
    for (i, op) in info.opcodes.iter().enumerate() {
        let const_idx = match op {
            Opcode::PushConstant(c)
            | Opcode::PushBigInt(c)
            | Opcode::LoadGlobal(c)
            | Opcode::StoreGlobal(c)
            | Opcode::InitializeGlobalLexical(c)
            | Opcode::DeclareGlobals(c)
            | Opcode::TypeOfGlobal(c)
            | Opcode::LoadNamedProperty(c)
            | Opcode::StoreNamedProperty(c)
            | Opcode::CreateRegExpObject(c)
            | Opcode::AttachClassMethod { name: c, .. }
            | Opcode::DefineObjectAccessor { name: c, .. }
            | Opcode::ThrowConstantReassignmentError(c)
            | Opcode::ThrowLexicalAccessError(c) => Some(*c),
            _ => None,
        };
        if let Some(c) = const_idx {
            if c as usize >= info.constants.len() {
                return Err(err(
                    info,
                    format!("constant index {} out of range at instruction {}", c, i),
                ));
            }
        }
        let child_idx = match op {
            Opcode::CreateClosure(c)
            | Opcode::CreateGeneratorClosure(c)
            | Opcode::CreateAsyncClosure(c)
            | Opcode::CreateAsyncGeneratorClosure(c)
            | Opcode::CreateClassConstructor(c) => Some(*c),
            _ => None,
        };
        if let Some(c) = child_idx {
            if c as usize >= info.children.len() {
                return Err(err(
                    info,
                    format!("child function {} out of range at instruction {}", c, i),
                ));
            }
        }
    }
    Ok(())
}

fn check_handlers(info: &FunctionInfo, len: u32) -> Result<(), ValidationError> {
    for region in &info.handlers {
        if region.start >= region.end || region.end > len {
            return Err(err(
                info,
                format!("malformed handler region [{}, {})", region.start, region.end),
            ));
        }
        if region.handler >= len {
            return Err(err(
                info,
                format!("handler entry {} out of range", region.handler),
            ));
        }
    }
    // Regions must be disjoint or properly nested.
    for (i, a) in info.handlers.iter().enumerate() {
        for b in info.handlers.iter().skip(i + 1) {
            let disjoint = a.end <= b.start || b.end <= a.start;
            let a_in_b = b.start <= a.start && a.end <= b.end;
            let b_in_a = a.start <= b.start && b.end <= a.end;
            if !(disjoint || a_in_b || b_in_a) {
                return Err(err(
                    info,
                    format!(
                        "overlapping handler regions [{}, {}) and [{}, {})",
                        a.start, a.end, b.start, b.end
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_locals(info: &FunctionInfo) -> Result<(), ValidationError> {
    for (i, op) in info.opcodes.iter().enumerate() {
        let (slot, expected) = match op {
            Opcode::LoadValue(s) | Opcode::StoreValue(s) => (*s, LocalKind::Value),
            Opcode::LoadInt(s) | Opcode::StoreInt(s) | Opcode::IncInt(s) => (*s, LocalKind::Int),
            Opcode::LoadBoolean(s) | Opcode::StoreBoolean(s) => (*s, LocalKind::Boolean),
            _ => continue,
        };
        match info.locals.get(slot as usize) {
            None => {
                return Err(err(
                    info,
                    format!("local slot {} out of range at instruction {}", slot, i),
                ));
            }
            Some(kind) if *kind != expected => {
                return Err(err(
                    info,
                    format!(
                        "local slot {} is {:?} but instruction {} expects {:?}",
                        slot, kind, i, expected
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Worklist dataflow over instruction indices, assigning each reachable
/// instruction a unique entry height.
fn check_stack_balance(info: &FunctionInfo, len: u32) -> Result<(), ValidationError> {
    if len == 0 {
        return Ok(());
    }
    let mut heights: Vec<Option<u32>> = vec![None; len as usize];
    let mut worklist: Vec<u32> = vec![0];
    heights[0] = Some(0);

    // Handler entries become reachable once their region start has a height.
    let mut pending_handlers: Vec<usize> = (0..info.handlers.len()).collect();

    while !worklist.is_empty() || !pending_handlers.is_empty() {
        while let Some(ip) = worklist.pop() {
            let height = heights[ip as usize].expect("worklist entry without height");
            let op = &info.opcodes[ip as usize];
            let (pops, pushes) = op.stack_effect();
            if pops > height {
                return Err(err(
                    info,
                    format!(
                        "stack underflow at instruction {} ({:?}): height {} pops {}",
                        ip, op, height, pops
                    ),
                ));
            }
            let after = height - pops + pushes;

            match op {
                Opcode::Return => {
                    if height != 1 {
                        return Err(err(
                            info,
                            format!("Return at instruction {} with stack height {}", ip, height),
                        ));
                    }
                    continue;
                }
                Opcode::Throw => continue,
                Opcode::ThrowConstantReassignmentError(_)
                | Opcode::ThrowLexicalAccessError(_)
                | Opcode::ThrowSuperNotCalledError => continue,
                _ => {}
            }

            let mut successors: Vec<(u32, u32)> = Vec::new();
            match op {
                Opcode::Jump(t) => successors.push((*t, after)),
                Opcode::JumpTable(ts) => {
                    for t in ts {
                        successors.push((*t, after));
                    }
                }
                Opcode::JumpIfTrue(t)
                | Opcode::JumpIfFalse(t)
                | Opcode::JumpIfToBooleanTrue(t)
                | Opcode::JumpIfToBooleanFalse(t)
                | Opcode::JumpIfUndefined(t)
                | Opcode::JumpIfNotUndefined(t)
                | Opcode::JumpIfNotNullish(t)
                | Opcode::JumpIfNotEmpty(t) => {
                    successors.push((*t, after));
                    successors.push((ip + 1, after));
                }
                _ => successors.push((ip + 1, after)),
            }

            for (succ, h) in successors {
                if succ >= len {
                    return Err(err(
                        info,
                        format!("control falls off the end after instruction {}", ip),
                    ));
                }
                match heights[succ as usize] {
                    None => {
                        heights[succ as usize] = Some(h);
                        worklist.push(succ);
                    }
                    Some(existing) if existing != h => {
                        return Err(err(
                            info,
                            format!(
                                "inconsistent stack height at instruction {}: {} vs {}",
                                succ, existing, h
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        // Seed handler entries whose protected region is now reachable:
        // the throw unwinds to the height at region start plus the thrown
        // value.
        let mut seeded = false;
        let mut still_pending = Vec::new();
        for idx in pending_handlers {
            let region = info.handlers[idx];
            let Some(entry_height) = heights[region.start as usize] else {
                still_pending.push(idx);
                continue;
            };
            let h = entry_height + 1;
            match heights[region.handler as usize] {
                None => {
                    heights[region.handler as usize] = Some(h);
                    worklist.push(region.handler);
                    seeded = true;
                }
                Some(existing) if existing != h => {
                    return Err(err(
                        info,
                        format!(
                            "handler entry {} reached with heights {} and {}",
                            region.handler, existing, h
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        pending_handlers = still_pending;
        if !seeded && worklist.is_empty() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, JumpKind};
    use crate::value::JsString;

    fn build(f: impl FnOnce(&mut FunctionBuilder)) -> FunctionInfo {
        let mut b = FunctionBuilder::new(JsString::from("t"), 0, false, false, false);
        f(&mut b);
        b.finalize()
    }

    #[test]
    fn test_valid_return() {
        let info = build(|b| {
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Return);
        });
        assert!(validate(&info).is_ok());
    }

    #[test]
    fn test_underflow_detected() {
        let info = build(|b| {
            b.add_opcode(Opcode::Pop);
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Return);
        });
        assert!(validate(&info).is_err());
    }

    #[test]
    fn test_return_height_must_be_one() {
        let info = build(|b| {
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::PushNull);
            b.add_opcode(Opcode::Return);
        });
        assert!(validate(&info).is_err());
    }

    #[test]
    fn test_jump_target_out_of_range() {
        let info = build(|b| {
            b.add_opcode(Opcode::Jump(99));
        });
        assert!(validate(&info).is_err());
    }

    #[test]
    fn test_inconsistent_heights_detected() {
        // One path pushes before the merge point, the other does not.
        let info = build(|b| {
            b.add_opcode(Opcode::PushBoolean(true));
            let j = b.emit_jump(JumpKind::IfTrue); // -> merge with height 0
            b.add_opcode(Opcode::PushUndefined); // height 1 falls into merge
            b.patch_jump(j);
            b.add_opcode(Opcode::PushNull);
            b.add_opcode(Opcode::Return);
        });
        assert!(validate(&info).is_err());
    }

    #[test]
    fn test_balanced_branches_accepted() {
        let info = build(|b| {
            b.add_opcode(Opcode::PushBoolean(true));
            b.if_else_helper::<()>(
                JumpKind::IfTrue,
                |b| {
                    b.add_opcode(Opcode::PushConstant(0));
                    Ok(())
                },
                |b| {
                    b.add_opcode(Opcode::PushUndefined);
                    Ok(())
                },
            )
            .unwrap();
            b.add_opcode(Opcode::Return);
            b.add_string(JsString::from("x"));
        });
        assert!(validate(&info).is_ok());
    }

    #[test]
    fn test_handler_entry_height() {
        let info = build(|b| {
            // try { push; pop } catch -> handler receives thrown value
            let start = b.opcode_count() as u32;
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Pop);
            let end = b.opcode_count() as u32;
            let over = b.emit_jump(JumpKind::Unconditional);
            let handler = b.opcode_count() as u32;
            b.add_opcode(Opcode::Pop); // discard exception
            b.patch_jump(over);
            b.add_handler_region(start, end, handler);
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Return);
        });
        assert!(validate(&info).is_ok());
    }

    #[test]
    fn test_overlapping_handlers_rejected() {
        let info = build(|b| {
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Pop);
            b.add_opcode(Opcode::PushUndefined);
            b.add_opcode(Opcode::Return);
            b.add_handler_region(0, 2, 3);
            b.add_handler_region(1, 3, 3);
        });
        assert!(validate(&info).is_err());
    }

    #[test]
    fn test_local_kind_mismatch() {
        let info = {
            let mut b = FunctionBuilder::new(JsString::from("t"), 0, false, false, false);
            let slot = b.new_local_slot(LocalKind::Int);
            b.add_opcode(Opcode::LoadValue(slot));
            b.add_opcode(Opcode::Return);
            b.finalize()
        };
        assert!(validate(&info).is_err());
    }
}

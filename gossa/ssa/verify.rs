//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Structural verification of an SSA function
//

use super::{BlockKind, Func, Op};
use crate::types::TypeId;
use std::collections::HashSet;

/// Check that the function is well formed, returning a description of
/// the first problem found.
pub fn check(f: &Func) -> Result<(), String> {
    if f.num_blocks() == 0 {
        return Err("function has no blocks".to_string());
    }
    if !f.is_live_block(f.entry) {
        return Err(format!("entry block {} is not live", f.entry));
    }
    if !f.block(f.entry).preds.is_empty() {
        return Err(format!("entry block {} has predecessors", f.entry));
    }

    let live: HashSet<_> = f.block_ids().into_iter().collect();

    for b in f.blocks() {
        let nsucc = b.succs.len();
        match b.kind {
            BlockKind::Invalid => return Err(format!("block {} was never ended", b.id)),
            BlockKind::Plain => {
                if nsucc != 1 {
                    return Err(format!("plain block {} has {} successors", b.id, nsucc));
                }
                if b.control.is_some() {
                    return Err(format!("plain block {} has a control value", b.id));
                }
            }
            BlockKind::If => {
                if nsucc != 2 {
                    return Err(format!("if block {} has {} successors", b.id, nsucc));
                }
                match b.control {
                    Some(c) if f.value(c).typ == TypeId::BOOL => {}
                    _ => return Err(format!("if block {} needs a bool control", b.id)),
                }
            }
            BlockKind::Ret => {
                if nsucc != 0 {
                    return Err(format!("ret block {} has successors", b.id));
                }
                match b.control {
                    Some(c) if f.value(c).typ == TypeId::MEM => {}
                    _ => return Err(format!("ret block {} needs a memory control", b.id)),
                }
            }
        }

        for s in &b.succs {
            if !live.contains(s) {
                return Err(format!("block {} branches to dead block {}", b.id, s));
            }
            let back = f.block(*s).preds.iter().filter(|&&p| p == b.id).count();
            let fwd = b.succs.iter().filter(|&&x| x == *s).count();
            if back != fwd {
                return Err(format!("edge {} -> {} has no matching predecessor", b.id, s));
            }
        }
        for p in &b.preds {
            if !live.contains(p) {
                return Err(format!("block {} has dead predecessor {}", b.id, p));
            }
            if !f.block(*p).succs.contains(&b.id) {
                return Err(format!("edge {} -> {} has no matching successor", p, b.id));
            }
        }

        for v in f.block_values(b.id) {
            if v.block != b.id {
                return Err(format!("{} is listed in {} but owned by {}", v.id, b.id, v.block));
            }
            if v.op == Op::Invalid {
                return Err(format!("{} in block {} is invalid", v.id, b.id));
            }
            if v.op == Op::Phi && v.args.len() != b.preds.len() {
                return Err(format!(
                    "phi {} has {} args, block {} has {} predecessors",
                    v.id,
                    v.args.len(),
                    b.id,
                    b.preds.len()
                ));
            }
            for &a in &v.args {
                let arg = f.value(a);
                if arg.op == Op::Invalid || !live.contains(&arg.block) {
                    return Err(format!("{} uses dead value {}", v.id, a));
                }
            }
        }
        if let Some(c) = b.control {
            let cv = f.value(c);
            if cv.op == Op::Invalid || !live.contains(&cv.block) {
                return Err(format!("block {} is controlled by dead value {}", b.id, c));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Position;

    fn pos() -> Position {
        Position::new(0, 1, 1)
    }

    #[test]
    fn test_well_formed() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        f.set_control(b1, BlockKind::Ret, Some(mem));
        assert_eq!(check(&f), Ok(()));
    }

    #[test]
    fn test_unended_block() {
        let mut f = Func::new("f", vec![]);
        f.new_block();
        assert!(check(&f).unwrap_err().contains("never ended"));
    }

    #[test]
    fn test_phi_arity() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        f.set_control(b1, BlockKind::Plain, None);
        f.add_edge(b1, b2);
        let phi = f.new_value(b2, Op::Phi, TypeId::MEM, pos(), &[mem, mem]);
        f.set_control(b2, BlockKind::Ret, Some(phi));
        assert!(check(&f).unwrap_err().contains("phi v2 has 2 args"));
    }

    #[test]
    fn test_if_needs_bool() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let b3 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        let x = f.const_int(TypeId::INT, 1, pos());
        f.set_control(b1, BlockKind::If, Some(x));
        f.add_edge(b1, b2);
        f.add_edge(b1, b3);
        f.set_control(b2, BlockKind::Ret, Some(mem));
        f.set_control(b3, BlockKind::Ret, Some(mem));
        assert!(check(&f).unwrap_err().contains("bool control"));
    }
}

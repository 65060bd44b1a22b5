//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Dead code elimination for the SSA backend
//
// 1. Remove blocks not reachable from the entry, dropping the matching
//    phi arguments in the blocks that survive
// 2. Mark-sweep the values: block controls and side-effecting values
//    are roots, everything they transitively use stays
//

use super::{BlockId, Func, ValueId};
use std::collections::{HashSet, VecDeque};

/// Returns true if any block or value was removed.
pub fn run(f: &mut Func) -> bool {
    let mut changed = remove_unreachable_blocks(f);
    changed |= eliminate_dead_values(f);
    changed
}

// ============================================================================
// Unreachable blocks
// ============================================================================

fn reachable_blocks(f: &Func) -> HashSet<BlockId> {
    let mut seen = HashSet::new();
    let mut worklist = vec![f.entry];
    while let Some(b) = worklist.pop() {
        if !seen.insert(b) {
            continue;
        }
        worklist.extend(f.block(b).succs.iter().copied());
    }
    seen
}

fn remove_unreachable_blocks(f: &mut Func) -> bool {
    let reachable = reachable_blocks(f);
    let dead: Vec<BlockId> = f
        .block_ids()
        .into_iter()
        .filter(|b| !reachable.contains(b))
        .collect();
    if dead.is_empty() {
        return false;
    }

    for b in f.block_ids() {
        if !reachable.contains(&b) {
            continue;
        }
        // Walk backwards so removals don't shift the indices still to visit
        for i in (0..f.block(b).preds.len()).rev() {
            if reachable.contains(&f.block(b).preds[i]) {
                continue;
            }
            f.block_mut(b).preds.remove(i);
            let phis: Vec<ValueId> = f
                .block_values(b)
                .filter(|v| v.op == super::Op::Phi)
                .map(|v| v.id)
                .collect();
            for phi in phis {
                f.value_mut(phi).args.remove(i);
            }
        }
    }

    for &b in &dead {
        let values = f.block(b).values.clone();
        for v in values {
            f.remove_value(v);
        }
        let blk = f.block_mut(b);
        blk.succs.clear();
        blk.preds.clear();
        blk.control = None;
    }
    f.retain_blocks(|b| reachable.contains(&b));
    true
}

// ============================================================================
// Dead values
// ============================================================================

fn eliminate_dead_values(f: &mut Func) -> bool {
    let mut live: HashSet<ValueId> = HashSet::new();
    let mut worklist: VecDeque<ValueId> = VecDeque::new();

    // Phase 1: roots
    for b in f.blocks() {
        if let Some(c) = b.control {
            if live.insert(c) {
                worklist.push_back(c);
            }
        }
    }
    for v in f.live_values() {
        if v.op.has_side_effects() && live.insert(v.id) {
            worklist.push_back(v.id);
        }
    }

    // Phase 2: propagate
    while let Some(id) = worklist.pop_front() {
        for &arg in &f.value(id).args {
            if live.insert(arg) {
                worklist.push_back(arg);
            }
        }
    }

    // Phase 3: sweep
    let dead: Vec<ValueId> = f
        .live_values()
        .filter(|v| !live.contains(&v.id))
        .map(|v| v.id)
        .collect();
    let changed = !dead.is_empty();
    for v in dead {
        f.remove_value(v);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Position;
    use crate::ssa::{BlockKind, Op};
    use crate::types::TypeId;

    fn pos() -> Position {
        Position::new(0, 1, 1)
    }

    #[test]
    fn test_unreachable_block_and_phi_arg_removed() {
        // b1 -> b3, b2 (orphan) -> b3
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let b3 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        let one = f.const_int(TypeId::INT, 1, pos());
        let unk = f.new_value(b2, Op::Unknown, TypeId::INT, pos(), &[]);
        f.set_control(b1, BlockKind::Plain, None);
        f.set_control(b2, BlockKind::Plain, None);
        f.add_edge(b2, b3);
        f.add_edge(b1, b3);
        let phi = f.new_value(b3, Op::Phi, TypeId::INT, pos(), &[unk, one]);
        let sp = f.new_value(b1, Op::SP, TypeId::UINTPTR, pos(), &[]);
        let st = f.new_value_aux(
            b3,
            Op::Store,
            TypeId::MEM,
            pos(),
            crate::ssa::Aux::None,
            &[sp, phi, mem],
        );
        f.set_control(b3, BlockKind::Ret, Some(st));

        assert!(run(&mut f));
        assert_eq!(f.num_blocks(), 2);
        assert!(!f.is_live_block(b2));
        assert_eq!(f.block(b3).preds, vec![b1]);
        assert_eq!(f.value(phi).args, vec![one]);
        assert_eq!(f.value(unk).op, Op::Invalid);
    }

    #[test]
    fn test_unused_values_removed() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        let x = f.new_value(b1, Op::Arg, TypeId::INT, pos(), &[]);
        let sum = f.new_value(b1, Op::Add, TypeId::INT, pos(), &[x, x]);
        f.set_control(b1, BlockKind::Ret, Some(mem));

        assert!(run(&mut f));
        assert_eq!(f.value(sum).op, Op::Invalid);
        assert_eq!(f.value(x).op, Op::Invalid);
        assert_eq!(f.block(b1).values, vec![mem]);
    }
}

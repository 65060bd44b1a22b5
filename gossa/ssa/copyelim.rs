//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Copy elimination: rewrite uses of copies to their sources, then drop
// the copies
//

use super::phielim::follow_copies;
use super::{Func, Op, ValueId};

/// Returns true if anything was rewritten or removed.
pub fn run(f: &mut Func) -> bool {
    let mut changed = false;

    let users: Vec<ValueId> = f.live_values().map(|v| v.id).collect();
    for id in users {
        for i in 0..f.value(id).args.len() {
            let arg = f.value(id).args[i];
            let src = follow_copies(f, arg);
            if src != arg {
                f.value_mut(id).args[i] = src;
                changed = true;
            }
        }
    }

    for b in f.block_ids() {
        if let Some(c) = f.block(b).control {
            let src = follow_copies(f, c);
            if src != c {
                f.block_mut(b).control = Some(src);
                changed = true;
            }
        }
    }

    // Copies are now unreferenced, except ones caught in a cycle
    let copies: Vec<ValueId> = f
        .live_values()
        .filter(|v| v.op == Op::Copy && follow_copies(f, v.id) != v.id)
        .map(|v| v.id)
        .collect();
    for id in copies {
        f.remove_value(id);
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Position;
    use crate::ssa::BlockKind;
    use crate::types::TypeId;

    fn pos() -> Position {
        Position::new(0, 1, 1)
    }

    #[test]
    fn test_uses_rewritten() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let x = f.new_value(b1, Op::Arg, TypeId::INT, pos(), &[]);
        let c1 = f.new_value(b1, Op::Copy, TypeId::INT, pos(), &[x]);
        let c2 = f.new_value(b1, Op::Copy, TypeId::INT, pos(), &[c1]);
        let sum = f.new_value(b1, Op::Add, TypeId::INT, pos(), &[c2, c1]);
        let cmp = f.new_value(b1, Op::Copy, TypeId::BOOL, pos(), &[sum]);
        f.set_control(b1, BlockKind::Ret, Some(cmp));

        assert!(run(&mut f));
        assert_eq!(f.value(sum).args, vec![x, x]);
        assert_eq!(f.block(b1).control, Some(sum));
        assert!(f.block_values(b1).all(|v| v.op != Op::Copy));
        assert_eq!(f.value(c1).op, Op::Invalid);
    }

    #[test]
    fn test_no_copies_no_change() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        f.set_control(b1, BlockKind::Ret, Some(mem));
        assert!(!run(&mut f));
    }
}

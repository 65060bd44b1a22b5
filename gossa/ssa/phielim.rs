//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Trivial phi elimination
//
// A phi whose arguments are all the same value, ignoring references to
// the phi itself, is replaced by a copy of that value. Runs to a fixed
// point since removing one phi can make another trivial.
//

use super::{Func, Op, ValueId};

/// Returns true if any phi was rewritten.
pub fn run(f: &mut Func) -> bool {
    let mut changed = false;
    loop {
        let mut progress = false;
        let phis: Vec<ValueId> = f
            .live_values()
            .filter(|v| v.op == Op::Phi)
            .map(|v| v.id)
            .collect();
        for phi in phis {
            if let Some(w) = unique_arg(f, phi) {
                let v = f.value_mut(phi);
                v.op = Op::Copy;
                v.args = vec![w];
                progress = true;
            }
        }
        if !progress {
            break;
        }
        changed = true;
    }
    changed
}

/// The single distinct argument of a phi, looking through copies
fn unique_arg(f: &Func, phi: ValueId) -> Option<ValueId> {
    let mut unique = None;
    for &arg in &f.value(phi).args {
        let arg = follow_copies(f, arg);
        if arg == phi || Some(arg) == unique {
            continue;
        }
        if unique.is_some() {
            return None;
        }
        unique = Some(arg);
    }
    unique
}

/// Follow a copy chain to the value it finally names
pub(super) fn follow_copies(f: &Func, mut v: ValueId) -> ValueId {
    // a copy cycle can only arise in unreachable code; stop after one lap
    let mut steps = 0;
    while f.value(v).op == Op::Copy && steps < f.num_values() {
        v = f.value(v).args[0];
        steps += 1;
    }
    v
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
    fn test_trivial_phi_becomes_copy() {
        // b1 -> b2 <-> b3, the loop never changes x
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let b3 = f.new_block();
        let x = f.new_value(b1, Op::Arg, TypeId::INT, pos(), &[]);
        f.add_edge(b1, b2);
        f.add_edge(b2, b3);
        f.add_edge(b3, b2);
        let phi = f.new_value(b2, Op::Phi, TypeId::INT, pos(), &[]);
        f.add_arg(phi, x);
        f.add_arg(phi, phi);
        f.set_control(b1, BlockKind::Plain, None);
        f.set_control(b3, BlockKind::Plain, None);

        assert!(run(&mut f));
        assert_eq!(f.value(phi).op, Op::Copy);
        assert_eq!(f.value(phi).args, vec![x]);
    }

    #[test]
    fn test_real_phi_kept() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let b3 = f.new_block();
        let b4 = f.new_block();
        let one = f.const_int(TypeId::INT, 1, pos());
        let two = f.const_int(TypeId::INT, 2, pos());
        f.add_edge(b1, b2);
        f.add_edge(b1, b3);
        f.add_edge(b2, b4);
        f.add_edge(b3, b4);
        let phi = f.new_value(b4, Op::Phi, TypeId::INT, pos(), &[one, two]);

        assert!(!run(&mut f));
        assert_eq!(f.value(phi).op, Op::Phi);
    }

    #[test]
    fn test_chained_phis_collapse() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let b3 = f.new_block();
        let x = f.new_value(b1, Op::Arg, TypeId::INT, pos(), &[]);
        let p1 = f.new_value(b2, Op::Phi, TypeId::INT, pos(), &[x, x]);
        let p2 = f.new_value(b3, Op::Phi, TypeId::INT, pos(), &[p1, x]);

        assert!(run(&mut f));
        assert_eq!(f.value(p2).op, Op::Copy);
        assert_eq!(follow_copies(&f, p2), x);
    }
}

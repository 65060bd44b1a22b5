//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Backend compile pipeline
//

use super::config::{Config, Frontend};
use super::{copyelim, deadcode, phielim, verify, Func};
use crate::error::Result;

struct Pass {
    name: &'static str,
    run: fn(&mut Func) -> bool,
}

const PASSES: &[Pass] = &[
    Pass {
        name: "phielim",
        run: phielim::run,
    },
    Pass {
        name: "copyelim",
        run: copyelim::run,
    },
    Pass {
        name: "deadcode",
        run: deadcode::run,
    },
];

/// Upper bound on pipeline rounds; each productive round removes something
const MAX_ROUNDS: usize = 16;

/// Run the backend passes over a fully constructed function.
///
/// The pass table repeats until a round changes nothing, since pruning
/// unreachable blocks can leave phis that are trivial again. The function
/// is verified before and after; a malformed graph is reported through
/// the frontend as a fatal error.
pub fn compile(f: &mut Func, config: &Config, fe: &dyn Frontend) -> Result<()> {
    if fe.log() {
        fe.logf(format_args!("compiling {} for {}", f.name, config.arch));
    }
    verify::check(f).map_err(|msg| fe.fatalf(None, &format!("{}: {}", f.name, msg)))?;

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut any = false;
        for pass in PASSES {
            let changed = (pass.run)(f);
            any |= changed;
            if fe.log() {
                fe.logf(format_args!(
                    "pass {}: {}",
                    pass.name,
                    if changed { "changed" } else { "no change" }
                ));
            }
        }
        if !any {
            break;
        }
        if rounds == MAX_ROUNDS {
            return Err(fe.fatalf(
                None,
                &format!("{}: passes still changing after {} rounds", f.name, rounds),
            ));
        }
    }

    verify::check(f).map_err(|msg| {
        fe.fatalf(None, &format!("{} after {} rounds: {}", f.name, rounds, msg))
    })
}

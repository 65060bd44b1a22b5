//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// SSA generation from a checked function body
//
// The pipeline for one function: classify its variables, scan the body
// into a block skeleton while the label resolver collects jumps, resolve
// the jumps, then build values block by block. The driver strings these
// together and hands the result to the backend.
//

pub mod build;
pub mod classify;
pub mod driver;
pub mod export;
pub mod label;
pub mod scan;

#[cfg(test)]
mod test_build;

pub use driver::{build_ssa, build_ssa_file, build_ssa_source, Options, Output};

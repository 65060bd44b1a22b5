//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// gossa - SSA construction for a single Go function
//

pub mod check;
pub mod diag;
pub mod error;
pub mod parse;
pub mod ssa;
pub mod ssagen;
pub mod strings;
pub mod symbol;
pub mod token;
pub mod types;

//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Common test utilities for gossa integration tests
//

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

/// Create a temporary Go file with the given content
/// Returns NamedTempFile which auto-deletes on drop
pub fn create_go_file(name: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("gossa_test_{}_", name))
        .suffix(".go")
        .tempfile()
        .expect("failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("failed to write test file");
    file
}

/// Run gossa for `function` in package `p`
pub fn run_function(file: &NamedTempFile, function: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gossa"))
        .args(args)
        .arg(file.path())
        .arg("p")
        .arg(function)
        .output()
        .expect("failed to run gossa")
}

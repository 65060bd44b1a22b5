//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// gossa - build SSA form for a single Go function
//

use clap::Parser;
use posixutils_gossa::diag;
use posixutils_gossa::error::{Error, GetExitCode};
use posixutils_gossa::ssa::Arch;
use posixutils_gossa::ssagen::{build_ssa_file, Options};
use std::path::PathBuf;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(version, about = "gossa - build SSA form for a single Go function")]
struct Args {
    /// Go source file
    file: PathBuf,

    /// Package the function belongs to
    package: String,

    /// Function to build
    function: String,

    /// Verbose output (log every construction and backend step)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Print the finished SSA function to stdout
    #[arg(long = "dump-ssa")]
    dump_ssa: bool,

    /// Stop after construction, skipping the backend passes
    #[arg(long = "no-compile")]
    no_compile: bool,

    /// Target architecture
    #[arg(long = "arch", default_value = "amd64")]
    arch: Arch,
}

fn report(e: &Error) {
    match e {
        // already reported through diag as they were found
        Error::Parse(_) | Error::TypeCheck(_) => {}
        _ => match e.pos() {
            Some(pos) if !pos.is_bad() => diag::error(pos, &e.to_string()),
            _ => eprintln!("gossa: {}", e),
        },
    }
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let options = Options {
        arch: args.arch,
        compile: !args.no_compile,
        verbose: args.verbose,
    };
    let result = build_ssa_file(&args.file, &args.package, &args.function, &options);
    match &result {
        Ok(out) => {
            if args.dump_ssa {
                print!("{}", out);
            }
        }
        Err(e) => report(e),
    }

    std::process::exit(result.get_exit_code())
}

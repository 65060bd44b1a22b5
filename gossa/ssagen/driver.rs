//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Frontend driver: source file to SSA for one function
//

use super::build::{build, Ctx};
use super::classify::classify;
use super::export::Export;
use super::label::LabelResolver;
use super::scan::scan;
use crate::check::{check_file, Info};
use crate::diag;
use crate::error::{Error, Result};
use crate::parse::ast::{Decl, FuncDecl, SourceFile};
use crate::parse::parse_file;
use crate::ssa::{compile, Arch, Config, Func};
use crate::strings::StringTable;
use crate::symbol::SymbolKind;
use crate::types::TypeTable;
use std::fmt;
use std::path::Path;

/// Build settings
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub arch: Arch,
    /// Run the backend passes after construction
    pub compile: bool,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            arch: Arch::default(),
            compile: true,
            verbose: false,
        }
    }
}

/// A built function with the types its values refer to
pub struct Output {
    pub func: Func,
    pub types: TypeTable,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.func.display(&self.types))
    }
}

/// Build and compile the SSA form of `package.function` in `path`.
pub fn build_ssa(path: &Path, package: &str, function: &str) -> Result<Func> {
    build_ssa_file(path, package, function, &Options::default()).map(|out| out.func)
}

pub fn build_ssa_file(
    path: &Path,
    package: &str,
    function: &str,
    options: &Options,
) -> Result<Output> {
    let name = path.display().to_string();
    let src = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: name.clone(),
        source,
    })?;
    build_ssa_source(&src, &name, package, function, options)
}

/// Build from source text; `file_name` is used in diagnostics
pub fn build_ssa_source(
    src: &str,
    file_name: &str,
    package: &str,
    function: &str,
    options: &Options,
) -> Result<Output> {
    let stream = diag::init_stream(file_name);
    let mut strings = StringTable::new();

    let file = parse_file(src, stream, &mut strings).map_err(|e| {
        diag::error(e.pos, &e.message);
        Error::Parse(e)
    })?;
    let info = check_file(&file, &mut strings).map_err(|errs| {
        for e in &errs {
            diag::error(e.pos, &e.message);
        }
        Error::TypeCheck(errs)
    })?;

    let decl = lookup_function(&file, &info, &strings, package, function)?;
    let finfo = info
        .funcs
        .get(&decl.name.name)
        .ok_or_else(|| Error::NotFound(format!("{}.{}", package, function)))?;
    if finfo.results.len() > 1 {
        return Err(Error::Unsupported {
            func: function.to_string(),
            what: "multiple return values are not supported".to_string(),
        });
    }
    let body = decl.body.as_ref().ok_or_else(|| Error::Unsupported {
        func: function.to_string(),
        what: "function has no body".to_string(),
    })?;
    log::debug!("building {}.{}", package, function);

    let fe = Export::new(&info.types, options.verbose);
    let vars = classify(&info, finfo, &mut strings, &fe)?;

    let params = vars
        .params
        .iter()
        .zip(&finfo.params)
        .map(|(idx, p)| match idx {
            Some(idx) => {
                let var = vars.get(*idx);
                (var.name.clone(), var.typ)
            }
            None => ("_".to_string(), p.typ),
        })
        .collect();
    let mut f = Func::new(function, params);

    let mut resolver = LabelResolver::new(&strings, &fe);
    let skeleton = scan(&mut f, body, &mut resolver)?;
    let labels = resolver.finish()?;

    let ctx = Ctx {
        info: &info,
        strings: &strings,
        fe: &fe,
    };
    let state = build(f, &skeleton, &labels, body, &vars, ctx)?;
    let (mut func, types) = state.into_parts();

    if options.compile {
        compile(&mut func, &Config::new(options.arch), &fe)?;
    }
    Ok(Output { func, types })
}

/// Find the function declaration, rejecting anything the builder can't take
fn lookup_function<'f>(
    file: &'f SourceFile,
    info: &Info,
    strings: &StringTable,
    package: &str,
    function: &str,
) -> Result<&'f FuncDecl> {
    let not_found = || Error::NotFound(format!("{}.{}", package, function));
    if strings.get(file.package.name) != package {
        return Err(not_found());
    }
    let name = strings.lookup(function).ok_or_else(not_found)?;

    let (plain, methods): (Vec<&FuncDecl>, Vec<&FuncDecl>) = file
        .decls
        .iter()
        .filter_map(|d| match d {
            Decl::Func(f) if f.name.name == name => Some(f),
            _ => None,
        })
        .partition(|f| f.recv.is_none());

    match info.lookup_package(name) {
        Some(sym) if sym.kind == SymbolKind::Function => {}
        Some(sym) => {
            return Err(Error::NotAFunction {
                name: function.to_string(),
                what: format!("{:?}", sym.kind).to_lowercase(),
            })
        }
        None if !methods.is_empty() => {
            return Err(Error::Unsupported {
                func: function.to_string(),
                what: "methods are not supported".to_string(),
            })
        }
        None => return Err(not_found()),
    }
    plain.first().copied().ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn run(src: &str, func: &str) -> Result<Output> {
        let options = Options {
            compile: false,
            ..Options::default()
        };
        build_ssa_source(src, "driver_test.go", "p", func, &options)
    }

    #[test]
    fn test_lookup_failures() {
        let src = "package p\n\nvar g int\n\nfunc f() {}\n";
        let e = run(src, "missing").err().expect("missing function");
        assert!(matches!(e, Error::NotFound(_)));
        assert_eq!(e.to_string(), "couldn't lookup function p.missing");

        let e = run(src, "g").err().expect("global");
        assert!(matches!(e, Error::NotAFunction { .. }));
        assert_eq!(e.kind(), ErrorKind::LookupFailure);

        let e = build_ssa_source(src, "driver_test.go", "q", "f", &Options::default())
            .err()
            .expect("wrong package");
        assert!(matches!(e, Error::NotFound(_)));
    }

    #[test]
    fn test_multiple_results_rejected() {
        let src = "package p\n\nfunc two() (int, int) {\n\treturn 1, 2\n}\n";
        let e = run(src, "two").err().expect("two results");
        assert!(matches!(e, Error::Unsupported { .. }));
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_parse_error() {
        let e = run("package p\n\nfunc f( {\n", "f").err().expect("parse error");
        assert!(matches!(e, Error::Parse(_)));
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_type_errors() {
        let src = "package p\n\nfunc f() int {\n\treturn undefined\n}\n";
        let e = run(src, "f").err().expect("type error");
        assert!(matches!(e, Error::TypeCheck(_)));
    }

    #[test]
    fn test_output_display() {
        let src = "package p\n\nfunc id(x int) int {\n\treturn x\n}\n";
        let out = build_ssa_source(src, "driver_test.go", "p", "id", &Options::default())
            .expect("build");
        let text = out.to_string();
        assert!(text.starts_with("id(x int)"));
        assert!(text.contains("Ret"));
    }
}

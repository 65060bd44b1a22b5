//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Storage classification of the variables of one function
//

use crate::check::{FuncInfo, Info};
use crate::diag::Position;
use crate::error::{Error, Result};
use crate::ssa::Frontend;
use crate::strings::{StringId, StringTable};
use crate::symbol::{SymbolId, SymbolKind};
use crate::types::{TypeId, TypeTable, PTR_SIZE};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Classes
// ============================================================================

/// Where a variable lives. Offsets are relative to the incoming
/// argument area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarClass {
    /// Incoming argument
    Param { offset: i64 },
    /// Local on the stack
    Auto,
    /// Incoming argument whose address is taken
    ParamHeap { offset: i64 },
    /// Local whose address is taken
    AutoHeap,
    /// Result slot
    ParamOut { offset: i64 },
    /// Package function named in the body
    Func,
}

impl VarClass {
    /// Classes that can never live purely as SSA values
    pub fn is_heap(&self) -> bool {
        matches!(self, VarClass::ParamHeap { .. } | VarClass::AutoHeap)
    }

}

impl fmt::Display for VarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VarClass::Param { .. } => "PPARAM",
            VarClass::Auto => "PAUTO",
            VarClass::ParamHeap { .. } => "PPARAMHEAP",
            VarClass::AutoHeap => "PAUTOHEAP",
            VarClass::ParamOut { .. } => "PPARAMOUT",
            VarClass::Func => "PFUNC",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Variables
// ============================================================================

#[derive(Debug, Clone)]
pub struct Var {
    pub key: StringId,
    pub name: String,
    /// None for synthesized result names
    pub sym: Option<SymbolId>,
    pub typ: TypeId,
    pub pos: Position,
    pub class: VarClass,
    /// Accessed through an address computed once, never as a pure value
    pub needs_addr: bool,
}

/// A result slot of the function being built
#[derive(Debug, Clone, Copy)]
pub struct ResultSlot {
    pub var: usize,
    pub typ: TypeId,
}

/// The classified variables of one function
#[derive(Debug, Default)]
pub struct Vars {
    vars: Vec<Var>,
    by_sym: HashMap<SymbolId, usize>,
    by_name: HashMap<StringId, usize>,
    /// Parameters in signature order, None for unnamed or blank ones
    pub params: Vec<Option<usize>>,
    pub results: Vec<ResultSlot>,
}

impl Vars {
    pub fn get(&self, idx: usize) -> &Var {
        &self.vars[idx]
    }

    pub fn by_symbol(&self, sym: SymbolId) -> Option<usize> {
        self.by_sym.get(&sym).copied()
    }

    pub fn by_name(&self, name: StringId) -> Option<usize> {
        self.by_name.get(&name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Var> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn needs_addr(&self, idx: usize) -> bool {
        self.vars[idx].needs_addr
    }

    fn add(&mut self, var: Var) -> Result<usize> {
        if let Some(&prev) = self.by_name.get(&var.key) {
            let prev = &self.vars[prev];
            return Err(Error::invariant(
                format!(
                    "duplicate variable {}: {} at {} and {} at {}",
                    var.name, prev.class, prev.pos, var.class, var.pos
                ),
                Some(var.pos),
            ));
        }
        let idx = self.vars.len();
        if let Some(sym) = var.sym {
            self.by_sym.insert(sym, idx);
        }
        self.by_name.insert(var.key, idx);
        self.vars.push(var);
        Ok(idx)
    }
}

// ============================================================================
// Argument layout
// ============================================================================

fn align_to(n: i64, align: i64) -> i64 {
    (n + align - 1) / align * align
}

/// Offsets of parameters and results in the argument area, plus its size.
///
/// Parameters are laid out from offset 0 at their natural alignment,
/// results start at the next pointer-aligned offset.
pub fn arg_layout(types: &TypeTable, params: &[TypeId], results: &[TypeId]) -> (Vec<i64>, Vec<i64>, i64) {
    let mut off = 0i64;
    let place = |t: TypeId, off: &mut i64| {
        let at = align_to(*off, types.align(t) as i64);
        *off = at + types.size(t) as i64;
        at
    };
    let poffs: Vec<i64> = params.iter().map(|&t| place(t, &mut off)).collect();
    off = align_to(off, PTR_SIZE as i64);
    let roffs: Vec<i64> = results.iter().map(|&t| place(t, &mut off)).collect();
    (poffs, roffs, align_to(off, PTR_SIZE as i64))
}

// ============================================================================
// Classification
// ============================================================================

/// Classify every variable declared in a function, excluding the
/// function's own name.
pub fn classify(
    info: &Info,
    finfo: &FuncInfo,
    strings: &mut StringTable,
    fe: &dyn Frontend,
) -> Result<Vars> {
    let types = &info.types;
    let ptypes: Vec<TypeId> = finfo.params.iter().map(|p| p.typ).collect();
    let rtypes: Vec<TypeId> = finfo.results.iter().map(|r| r.typ).collect();
    let (poffs, roffs, arg_size) = arg_layout(types, &ptypes, &rtypes);

    let mut vars = Vars::default();

    for (param, &offset) in finfo.params.iter().zip(&poffs) {
        let Some(sym_id) = param.sym else {
            vars.params.push(None);
            continue;
        };
        let sym = info.symbols.get(sym_id);
        let class = if sym.addr_taken {
            VarClass::ParamHeap { offset }
        } else {
            VarClass::Param { offset }
        };
        let idx = vars.add(Var {
            key: sym.name,
            name: strings.get(sym.name).to_string(),
            sym: Some(sym_id),
            typ: sym.typ,
            pos: sym.pos,
            class,
            needs_addr: class.is_heap() || !fe.can_ssa(sym.typ),
        })?;
        vars.params.push(Some(idx));
    }

    for (i, (result, &offset)) in finfo.results.iter().zip(&roffs).enumerate() {
        let (key, sym, pos) = match result.sym {
            Some(id) => {
                let s = info.symbols.get(id);
                (s.name, Some(id), s.pos)
            }
            None => (strings.intern(&format!("~r{}", i)), None, result.pos),
        };
        let idx = vars.add(Var {
            key,
            name: strings.get(key).to_string(),
            sym,
            typ: result.typ,
            pos,
            class: VarClass::ParamOut { offset },
            needs_addr: true,
        })?;
        vars.results.push(ResultSlot {
            var: idx,
            typ: result.typ,
        });
    }

    for &sym_id in &finfo.locals {
        let sym = info.symbols.get(sym_id);
        let class = if sym.addr_taken {
            VarClass::AutoHeap
        } else {
            VarClass::Auto
        };
        vars.add(Var {
            key: sym.name,
            name: strings.get(sym.name).to_string(),
            sym: Some(sym_id),
            typ: sym.typ,
            pos: sym.pos,
            class,
            needs_addr: class.is_heap() || !fe.can_ssa(sym.typ),
        })?;
    }

    // Function names live in the package scope, so a local may shadow one
    for &sym_id in &finfo.referenced {
        if sym_id == finfo.sym {
            continue;
        }
        let sym = info.symbols.get(sym_id);
        if sym.kind != SymbolKind::Function || vars.by_name.contains_key(&sym.name) {
            continue;
        }
        vars.add(Var {
            key: sym.name,
            name: strings.get(sym.name).to_string(),
            sym: Some(sym_id),
            typ: sym.typ,
            pos: sym.pos,
            class: VarClass::Func,
            needs_addr: false,
        })?;
    }

    for v in vars.iter() {
        log::trace!("classify: {} {} {}", v.name, v.class, types.name(v.typ));
    }
    log::debug!(
        "classify: {} variables, argument area {} bytes",
        vars.len(),
        arg_size
    );
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check_file;
    use crate::error::ErrorKind;
    use crate::parse::parse_file;
    use crate::ssagen::export::Export;

    fn classify_src(src: &str, func: &str) -> (Result<Vars>, StringTable) {
        let mut strings = StringTable::new();
        let file = parse_file(src, 0, &mut strings).unwrap();
        let info = check_file(&file, &mut strings).unwrap();
        let name = strings.lookup(func).unwrap();
        let finfo = info.funcs[&name].clone();
        let fe = Export::new(&info.types, false);
        let vars = classify(&info, &finfo, &mut strings, &fe);
        (vars, strings)
    }

    fn class_of(vars: &Vars, strings: &StringTable, name: &str) -> VarClass {
        let key = strings.lookup(name).unwrap();
        vars.get(vars.by_name(key).unwrap()).class
    }

    #[test]
    fn test_classes_and_offsets() {
        let src = "package p\nfunc f(a int8, b int64, c bool) (r int) {\n\tvar x int\n\tq := &x\n\t_ = q\n\treturn\n}\n";
        let (vars, strings) = classify_src(src, "f");
        let vars = vars.unwrap();
        assert_eq!(class_of(&vars, &strings, "a"), VarClass::Param { offset: 0 });
        assert_eq!(class_of(&vars, &strings, "b"), VarClass::Param { offset: 8 });
        assert_eq!(class_of(&vars, &strings, "c"), VarClass::Param { offset: 16 });
        assert_eq!(class_of(&vars, &strings, "r"), VarClass::ParamOut { offset: 24 });
        assert_eq!(class_of(&vars, &strings, "x"), VarClass::AutoHeap);
        assert_eq!(class_of(&vars, &strings, "q"), VarClass::Auto);
        assert_eq!(vars.results.len(), 1);
        assert_eq!(vars.get(vars.results[0].var).name, "r");
    }

    #[test]
    fn test_unnamed_result() {
        let (vars, strings) = classify_src("package p\nfunc f(x int) int { return x }\n", "f");
        let vars = vars.unwrap();
        let r = vars.get(vars.results[0].var);
        assert_eq!(r.name, "~r0");
        assert_eq!(r.class, VarClass::ParamOut { offset: 8 });
        assert!(r.needs_addr);
        assert_eq!(class_of(&vars, &strings, "x"), VarClass::Param { offset: 0 });
        assert!(!vars.needs_addr(vars.by_name(strings.lookup("x").unwrap()).unwrap()));
    }

    #[test]
    fn test_param_heap_and_arrays() {
        let src = "package p\nfunc f(x int, a [3]int) *int { return &x }\n";
        let (vars, strings) = classify_src(src, "f");
        let vars = vars.unwrap();
        assert_eq!(class_of(&vars, &strings, "x"), VarClass::ParamHeap { offset: 0 });
        let a = vars.by_name(strings.lookup("a").unwrap()).unwrap();
        assert_eq!(vars.get(a).class, VarClass::Param { offset: 8 });
        assert!(vars.needs_addr(a));
    }

    #[test]
    fn test_duplicate_name_is_invariant_violation() {
        let src = "package p\nfunc f(x int) int {\n\tif x > 0 {\n\t\tx := 2\n\t\treturn x\n\t}\n\treturn x\n}\n";
        let (vars, _) = classify_src(src, "f");
        let err = vars.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(err.to_string().contains("duplicate variable x"));
    }

    #[test]
    fn test_referenced_functions() {
        let src = "package p\nfunc g() int { return 1 }\nfunc f() int { return g() + f() }\n";
        let (vars, strings) = classify_src(src, "f");
        let vars = vars.unwrap();
        assert_eq!(class_of(&vars, &strings, "g"), VarClass::Func);
        assert!(vars.by_name(strings.lookup("f").unwrap()).is_none());
    }

    #[test]
    fn test_arg_layout() {
        let types = TypeTable::new();
        let (p, r, size) = arg_layout(
            &types,
            &[TypeId::INT32, TypeId::INT8, TypeId::STRING],
            &[TypeId::BOOL],
        );
        assert_eq!(p, vec![0, 4, 8]);
        assert_eq!(r, vec![24]);
        assert_eq!(size, 32);
    }
}

//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Type checker for gossa
//
// Resolves identifiers against Go's block scopes, assigns a type to every
// expression node and records which symbol each identifier defines or
// uses. The SSA construction pass reads the resulting Info and performs
// no inference of its own.
//

use crate::diag::Position;
use crate::parse::ast::{
    list_is_terminating, AssignOp, BinaryOp, Block, CaseClause, Decl, Expr, ExprKind, Field,
    FuncDecl, Ident, NodeId, SourceFile, Stmt, StmtKind, TypeExpr, UnaryOp, VarSpec,
};
use crate::strings::{StringId, StringTable};
use crate::symbol::{Symbol, SymbolError, SymbolId, SymbolKind, SymbolTable};
use crate::types::{TypeId, TypeTable};
use std::collections::HashMap;
use std::fmt;

/// Predeclared type names entered into the universe scope
const UNIVERSE_TYPES: &[&str] = &[
    "bool", "int8", "int16", "int32", "int64", "int", "uint8", "uint16", "uint32", "uint64",
    "uint", "uintptr", "float32", "float64", "string", "byte", "rune",
];

// ============================================================================
// Errors
// ============================================================================

/// A type error. Two errors are duplicates exactly when they compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub message: String,
    pub pos: Position,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

impl std::error::Error for TypeError {}

// ============================================================================
// Check results
// ============================================================================

/// A parameter or result slot of a function signature
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// None for unnamed and blank slots
    pub sym: Option<SymbolId>,
    pub typ: TypeId,
    pub pos: Position,
}

/// Per-function facts gathered while checking its body
#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub sym: SymbolId,
    pub sig: TypeId,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    /// Variables declared in the body, in declaration order
    pub locals: Vec<SymbolId>,
    /// Package functions named in the body, in first-use order
    pub referenced: Vec<SymbolId>,
}

/// Everything the checker learned about one source file
pub struct Info {
    pub types: TypeTable,
    pub symbols: SymbolTable,
    /// Type of every checked expression node
    pub expr_types: HashMap<NodeId, TypeId>,
    /// Identifier node -> symbol it declares
    pub defs: HashMap<NodeId, SymbolId>,
    /// Identifier node -> symbol it refers to
    pub uses: HashMap<NodeId, SymbolId>,
    /// Package scope objects by name
    pub package: HashMap<StringId, SymbolId>,
    /// Package functions (methods excluded) by name
    pub funcs: HashMap<StringId, FuncInfo>,
}

impl Info {
    fn new() -> Self {
        Self {
            types: TypeTable::new(),
            symbols: SymbolTable::new(),
            expr_types: HashMap::new(),
            defs: HashMap::new(),
            uses: HashMap::new(),
            package: HashMap::new(),
            funcs: HashMap::new(),
        }
    }

    /// Type of a checked expression
    pub fn type_of(&self, e: &Expr) -> TypeId {
        *self
            .expr_types
            .get(&e.id)
            .expect("BUG: expression was not type-checked")
    }

    /// Symbol an identifier expression refers to
    pub fn use_of(&self, id: NodeId) -> Option<SymbolId> {
        self.uses.get(&id).copied()
    }

    /// Symbol an identifier declares or, for `:=` redeclarations, reuses
    pub fn def_of(&self, ident: &Ident) -> Option<SymbolId> {
        self.defs
            .get(&ident.id)
            .or_else(|| self.uses.get(&ident.id))
            .copied()
    }

    pub fn lookup_package(&self, name: StringId) -> Option<&Symbol> {
        self.package.get(&name).map(|&id| self.symbols.get(id))
    }
}

/// Type-check a parsed file.
///
/// Errors are returned in detection order with duplicates removed.
pub fn check_file(file: &SourceFile, strings: &mut StringTable) -> Result<Info, Vec<TypeError>> {
    let universe: Vec<(StringId, TypeId)> = UNIVERSE_TYPES
        .iter()
        .filter_map(|&name| TypeTable::basic_by_name(name).map(|t| (strings.intern(name), t)))
        .collect();
    let blank = strings.intern("_");

    let mut checker = Checker::new(strings, blank);
    for (name, typ) in universe {
        let sym = Symbol::new(name, SymbolKind::TypeName, typ, Position::bad());
        let _ = checker.info.symbols.declare(sym);
    }
    checker.info.symbols.enter_scope();
    checker.check_file(file);

    if checker.errors.is_empty() {
        Ok(checker.info)
    } else {
        Err(checker.errors)
    }
}

// ============================================================================
// Checker
// ============================================================================

struct FuncCtx {
    results: Vec<TypeId>,
    named_results: bool,
    locals: Vec<SymbolId>,
    referenced: Vec<SymbolId>,
}

struct Checker<'a> {
    strings: &'a StringTable,
    blank: StringId,
    info: Info,
    errors: Vec<TypeError>,
    func: Option<FuncCtx>,
}

impl<'a> Checker<'a> {
    fn new(strings: &'a StringTable, blank: StringId) -> Self {
        Self {
            strings,
            blank,
            info: Info::new(),
            errors: Vec::new(),
            func: None,
        }
    }

    fn error(&mut self, pos: Position, message: impl Into<String>) {
        let err = TypeError {
            message: message.into(),
            pos,
        };
        if !self.errors.contains(&err) {
            self.errors.push(err);
        }
    }

    fn name(&self, id: StringId) -> &'a str {
        self.strings.get(id)
    }

    fn type_name(&self, t: TypeId) -> String {
        self.info.types.name(t)
    }

    fn record(&mut self, e: &Expr, t: TypeId) -> TypeId {
        self.info.expr_types.insert(e.id, t);
        t
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn check_file(&mut self, file: &SourceFile) {
        // Functions first so that package variable initializers can call them
        for decl in &file.decls {
            if let Decl::Func(f) = decl {
                if f.recv.is_none() {
                    self.declare_func(f);
                }
            }
        }
        for decl in &file.decls {
            if let Decl::Var(spec) = decl {
                self.var_spec(spec, SymbolKind::Global);
            }
        }
        for decl in &file.decls {
            if let Decl::Func(f) = decl {
                if f.recv.is_none() {
                    self.func_body(f);
                }
            }
        }
    }

    fn fields(&mut self, fields: &[Field]) -> Vec<ParamInfo> {
        fields
            .iter()
            .map(|f| ParamInfo {
                sym: None,
                typ: self.resolve_type(&f.typ),
                pos: f.pos,
            })
            .collect()
    }

    fn declare_func(&mut self, f: &FuncDecl) {
        let params = self.fields(&f.params);
        let results = self.fields(&f.results);
        let sig = self.info.types.func(
            params.iter().map(|p| p.typ).collect(),
            results.iter().map(|r| r.typ).collect(),
        );
        let sym = Symbol::new(f.name.name, SymbolKind::Function, sig, f.name.pos);
        let Some(id) = self.declare(sym) else {
            return;
        };
        self.info.defs.insert(f.name.id, id);
        self.info.package.insert(f.name.name, id);
        self.info.funcs.insert(
            f.name.name,
            FuncInfo {
                sym: id,
                sig,
                params,
                results,
                locals: Vec::new(),
                referenced: Vec::new(),
            },
        );
    }

    fn declare(&mut self, sym: Symbol) -> Option<SymbolId> {
        let (name, pos) = (sym.name, sym.pos);
        match self.info.symbols.declare(sym) {
            Ok(id) => Some(id),
            Err(SymbolError::Redeclared { prev, .. }) => {
                let msg = if prev.is_bad() {
                    format!("{} redeclared in this block", self.name(name))
                } else {
                    format!(
                        "{} redeclared in this block\n\tother declaration of {} at {}",
                        self.name(name),
                        self.name(name),
                        prev
                    )
                };
                self.error(pos, msg);
                None
            }
        }
    }

    /// Declare one variable; blank names declare nothing
    fn declare_var(&mut self, ident: &Ident, kind: SymbolKind, typ: TypeId) -> Option<SymbolId> {
        if ident.name == self.blank {
            return None;
        }
        let id = self.declare(Symbol::new(ident.name, kind, typ, ident.pos))?;
        self.info.defs.insert(ident.id, id);
        match kind {
            SymbolKind::Global => {
                self.info.package.insert(ident.name, id);
            }
            SymbolKind::Local => {
                if let Some(ctx) = &mut self.func {
                    ctx.locals.push(id);
                }
            }
            _ => {}
        }
        Some(id)
    }

    fn func_body(&mut self, f: &FuncDecl) {
        let Some(body) = &f.body else {
            return;
        };
        let Some(mut finfo) = self.info.funcs.get(&f.name.name).cloned() else {
            return;
        };
        if self.info.defs.get(&f.name.id) != Some(&finfo.sym) {
            // A redeclared function; the first declaration owns the name
            return;
        }

        self.info.symbols.enter_scope();
        for (field, param) in f.params.iter().zip(finfo.params.iter_mut()) {
            if let Some(name) = &field.name {
                param.sym = self.declare_var(name, SymbolKind::Parameter, param.typ);
            }
        }
        for (field, result) in f.results.iter().zip(finfo.results.iter_mut()) {
            if let Some(name) = &field.name {
                result.sym = self.declare_var(name, SymbolKind::Result, result.typ);
            }
        }

        self.func = Some(FuncCtx {
            results: finfo.results.iter().map(|r| r.typ).collect(),
            named_results: f.results.iter().any(|r| r.name.is_some()),
            locals: Vec::new(),
            referenced: Vec::new(),
        });
        self.stmt_list(&body.stmts);
        if !finfo.results.is_empty() && !list_is_terminating(&body.stmts) {
            self.error(body.pos, "missing return");
        }
        self.info.symbols.leave_scope();

        if let Some(ctx) = self.func.take() {
            finfo.locals = ctx.locals;
            finfo.referenced = ctx.referenced;
        }
        self.info.funcs.insert(f.name.name, finfo);
    }

    fn var_spec(&mut self, spec: &VarSpec, kind: SymbolKind) {
        let declared = spec.typ.as_ref().map(|t| self.resolve_type(t));
        let n = spec.names.len();

        let mut types = vec![declared.unwrap_or(TypeId::INVALID); n];
        if !spec.values.is_empty() {
            let values = self.value_list(&spec.values, n, |_| declared, spec.pos);
            for (i, vt) in values.into_iter().enumerate() {
                match declared {
                    Some(t) => self.assignable(vt, t, spec.values.get(i).map_or(spec.pos, |e| e.pos)),
                    None => types[i] = vt,
                }
            }
        } else if declared.is_none() {
            self.error(spec.pos, "missing type or init expr");
        }

        for (ident, typ) in spec.names.iter().zip(types) {
            self.declare_var(ident, kind, typ);
        }
    }

    /// Check the right-hand side of an n-way assignment or declaration,
    /// returning one type per left-hand slot.
    fn value_list(
        &mut self,
        values: &[Expr],
        n: usize,
        hint: impl Fn(usize) -> Option<TypeId>,
        pos: Position,
    ) -> Vec<TypeId> {
        if values.len() == 1 && n > 1 {
            if let ExprKind::Call { func, args } = &values[0].unparen().kind {
                let results = self.call(&values[0], func, args);
                self.record(&values[0], TypeId::INVALID);
                if results.len() != n {
                    self.error(
                        pos,
                        format!(
                            "assignment mismatch: {} variables but call returns {} value{}",
                            n,
                            results.len(),
                            if results.len() == 1 { "" } else { "s" }
                        ),
                    );
                    return vec![TypeId::INVALID; n];
                }
                return results;
            }
        }
        if values.len() != n {
            self.error(
                pos,
                format!(
                    "assignment mismatch: {} variable{} but {} value{}",
                    n,
                    if n == 1 { "" } else { "s" },
                    values.len(),
                    if values.len() == 1 { "" } else { "s" }
                ),
            );
            for v in values {
                self.expr(v, None);
            }
            return vec![TypeId::INVALID; n];
        }
        values
            .iter()
            .enumerate()
            .map(|(i, v)| self.expr(v, hint(i)))
            .collect()
    }

    fn resolve_type(&mut self, t: &TypeExpr) -> TypeId {
        match t {
            TypeExpr::Name(name, pos) => match self.info.symbols.lookup(*name) {
                Some(sym) if sym.kind == SymbolKind::TypeName => sym.typ,
                Some(_) => {
                    self.error(*pos, format!("{} is not a type", self.name(*name)));
                    TypeId::INVALID
                }
                None => {
                    self.error(*pos, format!("undefined: {}", self.name(*name)));
                    TypeId::INVALID
                }
            },
            TypeExpr::Pointer(inner) => match self.resolve_type(inner) {
                TypeId::INVALID => TypeId::INVALID,
                elem => self.info.types.pointer_to(elem),
            },
            TypeExpr::Array(len, inner) => match self.resolve_type(inner) {
                TypeId::INVALID => TypeId::INVALID,
                elem => self.info.types.array_of(elem, *len),
            },
        }
    }

    fn assignable(&mut self, from: TypeId, to: TypeId, pos: Position) {
        if from == to || from == TypeId::INVALID || to == TypeId::INVALID {
            return;
        }
        let msg = format!(
            "cannot use value of type {} as {} value",
            self.type_name(from),
            self.type_name(to)
        );
        self.error(pos, msg);
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn stmt_list(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.stmt(s);
        }
    }

    fn block(&mut self, b: &Block) {
        self.info.symbols.enter_scope();
        self.stmt_list(&b.stmts);
        self.info.symbols.leave_scope();
    }

    fn stmt(&mut self, s: &Stmt) {
        match &s.kind {
            StmtKind::Empty
            | StmtKind::Goto(_)
            | StmtKind::Break(_)
            | StmtKind::Continue(_) => {}
            StmtKind::Expr(e) => match &e.unparen().kind {
                ExprKind::Call { func, args } => {
                    let results = self.call(e, func, args);
                    let t = if results.len() == 1 {
                        results[0]
                    } else {
                        TypeId::INVALID
                    };
                    self.record(e, t);
                }
                _ => {
                    self.expr(e, None);
                    self.error(e.pos, "expression is not used");
                }
            },
            StmtKind::Assign { lhs, op, rhs } => self.assign(s.pos, lhs, *op, rhs),
            StmtKind::Define { names, values } => self.define(s.pos, names, values),
            StmtKind::Var(specs) => {
                for spec in specs {
                    self.var_spec(spec, SymbolKind::Local);
                }
            }
            StmtKind::IncDec { target, inc } => {
                if let Some(t) = self.lhs(target) {
                    if t != TypeId::INVALID && !self.info.types.is_numeric(t) {
                        let msg = format!(
                            "invalid operation: {} (non-numeric type {})",
                            if *inc { "++" } else { "--" },
                            self.type_name(t)
                        );
                        self.error(s.pos, msg);
                    }
                } else {
                    self.error(target.pos, "cannot use _ as value");
                }
            }
            StmtKind::Block(b) => self.block(b),
            StmtKind::If {
                init,
                cond,
                then,
                els,
            } => {
                self.info.symbols.enter_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.condition(cond, "if statement");
                self.block(then);
                if let Some(els) = els {
                    self.stmt(els);
                }
                self.info.symbols.leave_scope();
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.info.symbols.enter_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.condition(cond, "for statement");
                }
                if let Some(post) = post {
                    if matches!(post.kind, StmtKind::Define { .. }) {
                        self.error(post.pos, "cannot declare in post statement of for loop");
                    } else {
                        self.stmt(post);
                    }
                }
                self.block(body);
                self.info.symbols.leave_scope();
            }
            StmtKind::Switch { init, tag, clauses } => {
                self.info.symbols.enter_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                let tag_type = tag.as_ref().map(|t| self.expr(t, None));
                self.clauses(clauses, tag_type);
                self.info.symbols.leave_scope();
            }
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
            StmtKind::Fallthrough => self.error(s.pos, "fallthrough statement out of place"),
            StmtKind::Return(values) => self.ret(s.pos, values),
            StmtKind::Go(e) | StmtKind::Defer(e) => {
                let what = if matches!(s.kind, StmtKind::Go(_)) {
                    "go"
                } else {
                    "defer"
                };
                match &e.unparen().kind {
                    ExprKind::Call { func, args } => {
                        self.call(e, func, args);
                        self.record(e, TypeId::INVALID);
                    }
                    _ => {
                        self.expr(e, None);
                        self.error(e.pos, format!("expression in {} must be function call", what));
                    }
                }
            }
        }
    }

    fn condition(&mut self, cond: &Expr, what: &str) {
        let t = self.expr(cond, Some(TypeId::BOOL));
        if t != TypeId::INVALID && !self.info.types.is_bool(t) {
            self.error(cond.pos, format!("non-boolean condition in {}", what));
        }
    }

    fn clauses(&mut self, clauses: &[CaseClause], tag_type: Option<TypeId>) {
        let mut seen_default = false;
        for (i, clause) in clauses.iter().enumerate() {
            if clause.is_default {
                if seen_default {
                    self.error(clause.pos, "multiple defaults in switch");
                }
                seen_default = true;
            }
            for e in &clause.exprs {
                match tag_type {
                    Some(tt) => {
                        let et = self.expr(e, Some(tt));
                        if et != TypeId::INVALID && tt != TypeId::INVALID {
                            if et != tt {
                                let msg = format!(
                                    "invalid case in switch (mismatched types {} and {})",
                                    self.type_name(et),
                                    self.type_name(tt)
                                );
                                self.error(e.pos, msg);
                            } else if !self.info.types.is_comparable(tt) {
                                let msg = format!(
                                    "cannot switch on value of type {}",
                                    self.type_name(tt)
                                );
                                self.error(e.pos, msg);
                            }
                        }
                    }
                    None => self.condition(e, "switch case"),
                }
            }

            self.info.symbols.enter_scope();
            let last = i + 1 == clauses.len();
            for (j, s) in clause.body.iter().enumerate() {
                if j + 1 == clause.body.len() && matches!(s.kind, StmtKind::Fallthrough) {
                    if last {
                        self.error(s.pos, "cannot fallthrough final case in switch");
                    }
                    continue;
                }
                self.stmt(s);
            }
            self.info.symbols.leave_scope();
        }
    }

    /// Check an assignment target; None for the blank identifier
    fn lhs(&mut self, e: &Expr) -> Option<TypeId> {
        if e.as_ident() == Some(self.blank) {
            return None;
        }
        let t = self.expr(e, None);
        if t == TypeId::INVALID {
            return Some(t);
        }
        let ok = match &e.unparen().kind {
            ExprKind::Ident(_) => true,
            ExprKind::Index { base, .. } => {
                let bt = self.info.type_of(base);
                !self.info.types.is_string(bt) && self.addressable(e)
            }
            ExprKind::Unary {
                op: UnaryOp::Deref, ..
            } => true,
            _ => false,
        };
        let is_var = match &e.unparen().kind {
            ExprKind::Ident(_) => self
                .info
                .use_of(e.unparen().id)
                .is_some_and(|id| self.info.symbols.get(id).is_variable()),
            _ => true,
        };
        if !ok || !is_var {
            self.error(e.pos, "cannot assign to expression");
            return Some(TypeId::INVALID);
        }
        Some(t)
    }

    fn assign(&mut self, pos: Position, lhs: &[Expr], op: AssignOp, rhs: &[Expr]) {
        match op {
            AssignOp::Assign => {
                let lts: Vec<Option<TypeId>> = lhs.iter().map(|l| self.lhs(l)).collect();
                let rts = self.value_list(rhs, lhs.len(), |i| lts[i], pos);
                for (i, (lt, rt)) in lts.iter().zip(rts).enumerate() {
                    if let Some(lt) = lt {
                        let at = rhs.get(i).map_or(pos, |e| e.pos);
                        self.assignable(rt, *lt, at);
                    }
                }
            }
            AssignOp::Compound(bop) => {
                let (Some(l), Some(r)) = (lhs.first(), rhs.first()) else {
                    return;
                };
                let Some(lt) = self.lhs(l) else {
                    self.error(l.pos, "cannot use _ as value");
                    return;
                };
                if bop.is_shift() {
                    self.shift_count(r);
                } else {
                    let rt = self.expr(r, Some(lt));
                    if rt != lt && rt != TypeId::INVALID && lt != TypeId::INVALID {
                        let msg = format!(
                            "invalid operation: mismatched types {} and {}",
                            self.type_name(lt),
                            self.type_name(rt)
                        );
                        self.error(pos, msg);
                        return;
                    }
                }
                self.operator_defined(bop, lt, pos);
            }
        }
    }

    fn define(&mut self, pos: Position, names: &[Ident], values: &[Expr]) {
        // Redeclared names keep their type and act as hints
        let existing: Vec<Option<SymbolId>> = names
            .iter()
            .map(|n| {
                if n.name != self.blank && self.info.symbols.declared_here(n.name) {
                    self.info.symbols.lookup_id(n.name)
                } else {
                    None
                }
            })
            .collect();
        let hints: Vec<Option<TypeId>> = existing
            .iter()
            .map(|e| e.map(|id| self.info.symbols.get(id).typ))
            .collect();
        let rts = self.value_list(values, names.len(), |i| hints[i], pos);

        let mut new_vars = 0;
        for (i, ident) in names.iter().enumerate() {
            if names[..i]
                .iter()
                .any(|p| p.name == ident.name && p.name != self.blank)
            {
                let msg = format!("{} repeated on left side of :=", self.name(ident.name));
                self.error(ident.pos, msg);
                continue;
            }
            match existing[i] {
                Some(id) => {
                    self.info.uses.insert(ident.id, id);
                    let typ = self.info.symbols.get(id).typ;
                    self.assignable(rts[i], typ, ident.pos);
                }
                None => {
                    if ident.name != self.blank {
                        new_vars += 1;
                    }
                    self.declare_var(ident, SymbolKind::Local, rts[i]);
                }
            }
        }
        if new_vars == 0 {
            self.error(pos, "no new variables on left side of :=");
        }
    }

    fn ret(&mut self, pos: Position, values: &[Expr]) {
        let Some(ctx) = &self.func else {
            return;
        };
        let results = ctx.results.clone();
        let named = ctx.named_results;

        if values.is_empty() {
            if !results.is_empty() && !named {
                self.error(pos, "not enough return values");
            }
            return;
        }
        if results.is_empty() {
            for v in values {
                self.expr(v, None);
            }
            self.error(values[0].pos, "too many return values");
            return;
        }
        if values.len() != results.len() && !(values.len() == 1 && results.len() > 1) {
            for v in values {
                self.expr(v, None);
            }
            let msg = if values.len() < results.len() {
                "not enough return values"
            } else {
                "too many return values"
            };
            self.error(pos, msg);
            return;
        }
        let rts = self.value_list(values, results.len(), |i| results.get(i).copied(), pos);
        for (i, (rt, want)) in rts.into_iter().zip(results.iter()).enumerate() {
            let at = values.get(i).map_or(pos, |e| e.pos);
            self.assignable(rt, *want, at);
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn is_untyped(e: &Expr) -> bool {
        e.is_untyped_const() || matches!(e.unparen().kind, ExprKind::Nil)
    }

    /// Default type of an untyped constant expression
    fn default_type(e: &Expr) -> TypeId {
        fn walk(e: &Expr, float: &mut bool, rune: &mut bool) {
            match &e.kind {
                ExprKind::FloatLit(_) => *float = true,
                ExprKind::CharLit(_) => *rune = true,
                ExprKind::Paren(inner) | ExprKind::Unary { operand: inner, .. } => {
                    walk(inner, float, rune)
                }
                ExprKind::Binary { op, left, right } => {
                    walk(left, float, rune);
                    if !op.is_shift() {
                        walk(right, float, rune);
                    }
                }
                _ => {}
            }
        }
        let (mut float, mut rune) = (false, false);
        walk(e, &mut float, &mut rune);
        if float {
            TypeId::FLOAT64
        } else if rune {
            TypeId::INT32
        } else {
            TypeId::INT
        }
    }

    fn expr(&mut self, e: &Expr, hint: Option<TypeId>) -> TypeId {
        if e.is_untyped_const() {
            let target = match hint {
                Some(h) if self.info.types.is_numeric(h) => h,
                _ => Self::default_type(e),
            };
            return self.constant(e, target);
        }

        let t = match &e.kind {
            ExprKind::Ident(name) => self.ident(e, *name),
            ExprKind::IntLit(_) | ExprKind::FloatLit(_) | ExprKind::CharLit(_) => {
                // handled as untyped constants above
                TypeId::INVALID
            }
            ExprKind::StringLit(_) => TypeId::STRING,
            ExprKind::BoolLit(_) => TypeId::BOOL,
            ExprKind::Nil => match hint {
                Some(h) if self.info.types.is_pointer(h) => h,
                _ => {
                    self.error(e.pos, "use of untyped nil");
                    TypeId::INVALID
                }
            },
            ExprKind::Paren(inner) => self.expr(inner, hint),
            ExprKind::Unary { op, operand } => self.unary(e, *op, operand, hint),
            ExprKind::Binary { op, left, right } => self.binary(e, *op, left, right, hint),
            ExprKind::Call { func, args } => {
                let results = self.call(e, func, args);
                match results.len() {
                    1 => results[0],
                    0 => {
                        self.error(e.pos, "function call (no value) used as value");
                        TypeId::INVALID
                    }
                    _ => {
                        self.error(e.pos, "multiple-value function call in single-value context");
                        TypeId::INVALID
                    }
                }
            }
            ExprKind::Index { base, index } => self.index(e, base, index),
        };
        self.record(e, t)
    }

    /// Give an untyped constant expression the type `target`
    fn constant(&mut self, e: &Expr, target: TypeId) -> TypeId {
        match &e.kind {
            ExprKind::IntLit(v) => self.fits(*v, false, target, e.pos),
            ExprKind::CharLit(c) => self.fits(u64::from(*c), false, target, e.pos),
            ExprKind::FloatLit(v) => {
                if self.info.types.is_integer(target) && v.fract() != 0.0 {
                    self.error(e.pos, format!("constant {} truncated to integer", v));
                }
            }
            ExprKind::Paren(inner) => {
                self.constant(inner, target);
            }
            ExprKind::Unary { op, operand } => match (op, &operand.kind) {
                (UnaryOp::Neg, ExprKind::IntLit(v)) => {
                    self.fits(*v, true, target, e.pos);
                    self.record(operand, target);
                }
                _ => {
                    self.constant(operand, target);
                    if *op == UnaryOp::Com && !self.info.types.is_integer(target) {
                        let msg = format!(
                            "invalid operation: operator ^ not defined on {}",
                            self.type_name(target)
                        );
                        self.error(e.pos, msg);
                    }
                }
            },
            ExprKind::Binary { op, left, right } => {
                self.constant(left, target);
                self.constant(right, target);
                self.operator_defined(*op, target, e.pos);
                if matches!(op, BinaryOp::Div | BinaryOp::Mod) && is_zero(right) {
                    self.error(e.pos, "invalid operation: division by zero");
                }
            }
            _ => {
                return self.expr(e, Some(target));
            }
        }
        self.record(e, target)
    }

    /// Check that integer constant `v` (negated when `neg`) fits in `t`
    fn fits(&mut self, v: u64, neg: bool, t: TypeId, pos: Position) {
        if !self.info.types.is_integer(t) {
            return;
        }
        let neg = neg && v != 0;
        let bits = self.info.types.size(t) * 8;
        let ok = if self.info.types.is_unsigned(t) {
            !neg && (bits >= 64 || v < (1u64 << bits))
        } else {
            let max = 1u64 << (bits - 1);
            if neg {
                v <= max
            } else {
                v < max
            }
        };
        if !ok {
            let msg = format!(
                "constant {}{} overflows {}",
                if neg { "-" } else { "" },
                v,
                self.type_name(t)
            );
            self.error(pos, msg);
        }
    }

    fn ident(&mut self, e: &Expr, name: StringId) -> TypeId {
        if name == self.blank {
            self.error(e.pos, "cannot use _ as value");
            return TypeId::INVALID;
        }
        let Some(id) = self.info.symbols.lookup_id(name) else {
            self.error(e.pos, format!("undefined: {}", self.name(name)));
            return TypeId::INVALID;
        };
        self.info.uses.insert(e.id, id);
        let sym = self.info.symbols.get(id);
        let (kind, typ) = (sym.kind, sym.typ);
        match kind {
            SymbolKind::TypeName => {
                self.error(e.pos, format!("{} (type) is not an expression", self.name(name)));
                TypeId::INVALID
            }
            SymbolKind::Function => {
                if let Some(ctx) = &mut self.func {
                    if !ctx.referenced.contains(&id) {
                        ctx.referenced.push(id);
                    }
                }
                typ
            }
            _ => typ,
        }
    }

    fn unary(&mut self, e: &Expr, op: UnaryOp, operand: &Expr, hint: Option<TypeId>) -> TypeId {
        match op {
            UnaryOp::AddrOf => {
                let t = self.expr(operand, None);
                if t == TypeId::INVALID {
                    return t;
                }
                if !self.addressable(operand) {
                    self.error(e.pos, "invalid operation: cannot take address of expression");
                    return TypeId::INVALID;
                }
                if let Some(root) = self.root_var(operand) {
                    self.info.symbols.get_mut(root).addr_taken = true;
                }
                self.info.types.pointer_to(t)
            }
            UnaryOp::Deref => {
                if matches!(operand.unparen().kind, ExprKind::Nil) {
                    self.error(e.pos, "invalid operation: cannot indirect nil");
                    return TypeId::INVALID;
                }
                let t = self.expr(operand, None);
                if t == TypeId::INVALID {
                    return t;
                }
                match self.info.types.elem(t) {
                    Some(elem) if self.info.types.is_pointer(t) => elem,
                    _ => {
                        let msg = format!(
                            "invalid operation: cannot indirect value of type {}",
                            self.type_name(t)
                        );
                        self.error(e.pos, msg);
                        TypeId::INVALID
                    }
                }
            }
            UnaryOp::Plus | UnaryOp::Neg | UnaryOp::Not | UnaryOp::Com => {
                let t = self.expr(operand, hint);
                if t == TypeId::INVALID {
                    return t;
                }
                let types = &self.info.types;
                let ok = match op {
                    UnaryOp::Not => types.is_bool(t),
                    UnaryOp::Com => types.is_integer(t),
                    _ => types.is_numeric(t),
                };
                if !ok {
                    let sym = match op {
                        UnaryOp::Plus => "+",
                        UnaryOp::Neg => "-",
                        UnaryOp::Not => "!",
                        _ => "^",
                    };
                    let msg = format!(
                        "invalid operation: operator {} not defined on value of type {}",
                        sym,
                        self.type_name(t)
                    );
                    self.error(e.pos, msg);
                    return TypeId::INVALID;
                }
                t
            }
        }
    }

    fn operator_defined(&mut self, op: BinaryOp, t: TypeId, pos: Position) -> bool {
        if t == TypeId::INVALID {
            return false;
        }
        let types = &self.info.types;
        let ok = match op {
            BinaryOp::Add => types.is_numeric(t) || types.is_string(t),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => types.is_numeric(t),
            BinaryOp::Mod
            | BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor
            | BinaryOp::AndNot
            | BinaryOp::Shl
            | BinaryOp::Shr => types.is_integer(t),
            BinaryOp::LogAnd | BinaryOp::LogOr => types.is_bool(t),
            BinaryOp::Eq | BinaryOp::Ne => types.is_comparable(t),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => types.is_ordered(t),
        };
        if !ok {
            let msg = format!(
                "invalid operation: operator {} not defined on value of type {}",
                op.as_str(),
                self.type_name(t)
            );
            self.error(pos, msg);
        }
        ok
    }

    fn shift_count(&mut self, count: &Expr) {
        let hint = count.is_untyped_const().then_some(TypeId::UINT);
        let ct = self.expr(count, hint);
        if ct != TypeId::INVALID && !self.info.types.is_integer(ct) {
            let msg = format!(
                "invalid operation: shift count type {}, must be integer",
                self.type_name(ct)
            );
            self.error(count.pos, msg);
        }
    }

    fn binary(
        &mut self,
        e: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        hint: Option<TypeId>,
    ) -> TypeId {
        if op.is_logical() {
            let lt = self.expr(left, Some(TypeId::BOOL));
            let rt = self.expr(right, Some(TypeId::BOOL));
            if lt == TypeId::INVALID || rt == TypeId::INVALID {
                return TypeId::INVALID;
            }
            if !self.operator_defined(op, lt, e.pos) || !self.operator_defined(op, rt, e.pos) {
                return TypeId::INVALID;
            }
            return TypeId::BOOL;
        }

        if op.is_shift() {
            let lhint = if left.is_untyped_const() { hint } else { None };
            let lt = self.expr(left, lhint);
            self.shift_count(right);
            if !self.operator_defined(op, lt, e.pos) {
                return TypeId::INVALID;
            }
            return lt;
        }

        // The typed operand decides the type of an untyped one
        let (lt, rt) = if Self::is_untyped(left) && !Self::is_untyped(right) {
            let rt = self.expr(right, None);
            (self.expr(left, Some(rt)), rt)
        } else {
            let lhint = if op.is_comparison() { None } else { hint };
            let lt = self.expr(left, lhint);
            (lt, self.expr(right, Some(lt)))
        };
        if lt == TypeId::INVALID || rt == TypeId::INVALID {
            return TypeId::INVALID;
        }
        if lt != rt {
            let msg = format!(
                "invalid operation: mismatched types {} and {}",
                self.type_name(lt),
                self.type_name(rt)
            );
            self.error(e.pos, msg);
            return TypeId::INVALID;
        }
        if !self.operator_defined(op, lt, e.pos) {
            return TypeId::INVALID;
        }
        if matches!(op, BinaryOp::Div | BinaryOp::Mod)
            && self.info.types.is_integer(lt)
            && is_zero(right)
        {
            self.error(e.pos, "invalid operation: division by zero");
        }
        if op.is_comparison() {
            TypeId::BOOL
        } else {
            lt
        }
    }

    /// Check a call or conversion, returning its result types
    fn call(&mut self, e: &Expr, func: &Expr, args: &[Expr]) -> Vec<TypeId> {
        if let Some(name) = func.as_ident() {
            let conv = self
                .info
                .symbols
                .lookup_id(name)
                .filter(|&id| self.info.symbols.get(id).kind == SymbolKind::TypeName);
            if let Some(id) = conv {
                self.info.uses.insert(func.unparen().id, id);
                let target = self.info.symbols.get(id).typ;
                self.record(func, target);
                return vec![self.conversion(e, target, args)];
            }
        }

        let ft = self.expr(func, None);
        if ft == TypeId::INVALID {
            for a in args {
                self.expr(a, None);
            }
            return vec![TypeId::INVALID];
        }
        if !self.info.types.is_func(ft) {
            let msg = format!(
                "invalid operation: cannot call non-function (value of type {})",
                self.type_name(ft)
            );
            self.error(e.pos, msg);
            return vec![TypeId::INVALID];
        }
        let sig = self.info.types.get(ft).clone();
        if args.len() != sig.params.len() {
            for a in args {
                self.expr(a, None);
            }
            let msg = if args.len() < sig.params.len() {
                "not enough arguments in call"
            } else {
                "too many arguments in call"
            };
            self.error(e.pos, msg);
            return sig.results;
        }
        for (arg, &pt) in args.iter().zip(sig.params.iter()) {
            let at = self.expr(arg, Some(pt));
            self.assignable(at, pt, arg.pos);
        }
        sig.results
    }

    fn conversion(&mut self, e: &Expr, target: TypeId, args: &[Expr]) -> TypeId {
        let [arg] = args else {
            self.error(e.pos, "conversion requires exactly one argument");
            for a in args {
                self.expr(a, None);
            }
            return TypeId::INVALID;
        };
        let hint = self.info.types.is_numeric(target).then_some(target);
        let at = self.expr(arg, hint);
        if at == TypeId::INVALID {
            return target;
        }
        let types = &self.info.types;
        let ok = at == target || (types.is_numeric(at) && types.is_numeric(target));
        if !ok {
            let msg = format!(
                "cannot convert value of type {} to type {}",
                self.type_name(at),
                self.type_name(target)
            );
            self.error(arg.pos, msg);
        }
        target
    }

    fn index(&mut self, e: &Expr, base: &Expr, index: &Expr) -> TypeId {
        let bt = self.expr(base, None);
        let it = self.expr(index, Some(TypeId::INT));
        if bt == TypeId::INVALID {
            return bt;
        }
        if it != TypeId::INVALID && !self.info.types.is_integer(it) {
            let msg = format!("invalid argument: index of type {}", self.type_name(it));
            self.error(index.pos, msg);
        }

        let types = &self.info.types;
        if types.is_string(bt) {
            return TypeId::UINT8;
        }
        let arr = match types.elem(bt) {
            Some(elem) if types.is_pointer(bt) && types.is_array(elem) => elem,
            _ if types.is_array(bt) => bt,
            _ => {
                let msg = format!(
                    "invalid operation: cannot index value of type {}",
                    self.type_name(bt)
                );
                self.error(e.pos, msg);
                return TypeId::INVALID;
            }
        };
        let len = types.get(arr).len;
        let elem = types.elem(arr).unwrap_or(TypeId::INVALID);
        if let ExprKind::IntLit(v) = index.unparen().kind {
            if v >= len {
                self.error(
                    index.pos,
                    format!("invalid argument: index {} out of bounds [0:{}]", v, len),
                );
            }
        }
        elem
    }

    /// Is a checked expression addressable?
    fn addressable(&self, e: &Expr) -> bool {
        let e = e.unparen();
        match &e.kind {
            ExprKind::Ident(_) => self
                .info
                .use_of(e.id)
                .is_some_and(|id| self.info.symbols.get(id).is_variable()),
            ExprKind::Index { base, .. } => {
                let bt = self.info.type_of(base);
                self.info.types.is_pointer(bt)
                    || (self.info.types.is_array(bt) && self.addressable(base))
            }
            ExprKind::Unary {
                op: UnaryOp::Deref, ..
            } => true,
            _ => false,
        }
    }

    /// Variable whose storage an addressable expression lives in
    fn root_var(&self, e: &Expr) -> Option<SymbolId> {
        let e = e.unparen();
        match &e.kind {
            ExprKind::Ident(_) => self.info.use_of(e.id),
            ExprKind::Index { base, .. } if self.info.types.is_array(self.info.type_of(base)) => {
                self.root_var(base)
            }
            _ => None,
        }
    }
}

fn is_zero(e: &Expr) -> bool {
    match &e.unparen().kind {
        ExprKind::IntLit(0) => true,
        ExprKind::FloatLit(v) => *v == 0.0,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_file;

    fn check(src: &str) -> (Result<Info, Vec<TypeError>>, StringTable, SourceFile) {
        let mut strings = StringTable::new();
        let file = parse_file(src, 0, &mut strings).unwrap();
        let result = check_file(&file, &mut strings);
        (result, strings, file)
    }

    fn errors(src: &str) -> Vec<String> {
        match check(src).0 {
            Ok(_) => Vec::new(),
            Err(errs) => errs.into_iter().map(|e| e.message).collect(),
        }
    }

    fn assert_error(src: &str, needle: &str) {
        let errs = errors(src);
        assert!(
            errs.iter().any(|e| e.contains(needle)),
            "expected error containing {:?}, got {:?}",
            needle,
            errs
        );
    }

    #[test]
    fn test_function_info() {
        let (result, strings, _) = check(
            "package p\nfunc g() int { return 1 }\nfunc f(a int, _ bool) (r int) {\n\tb := a + g()\n\tvar c int\n\tc = b\n\tr = c\n\treturn\n}\n",
        );
        let info = result.unwrap();
        let f = strings.lookup("f").unwrap();
        let finfo = &info.funcs[&f];
        assert_eq!(finfo.params.len(), 2);
        assert!(finfo.params[0].sym.is_some());
        assert!(finfo.params[1].sym.is_none());
        assert_eq!(finfo.results.len(), 1);
        let locals: Vec<&str> = finfo
            .locals
            .iter()
            .map(|&id| strings.get(info.symbols.get(id).name))
            .collect();
        assert_eq!(locals, vec!["b", "c"]);
        let referenced: Vec<&str> = finfo
            .referenced
            .iter()
            .map(|&id| strings.get(info.symbols.get(id).name))
            .collect();
        assert_eq!(referenced, vec!["g"]);
        assert_eq!(info.types.name(finfo.sig), "func(int, bool) int");
    }

    #[test]
    fn test_untyped_constants_take_context_type() {
        let (result, _, file) = check("package p\nfunc f(x float64) bool { return x > 1 }\n");
        let info = result.unwrap();
        let Decl::Func(f) = &file.decls[0] else {
            panic!("expected func");
        };
        let StmtKind::Return(values) = &f.body.as_ref().unwrap().stmts[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Binary { right, .. } = &values[0].kind else {
            panic!("expected comparison");
        };
        assert_eq!(info.type_of(&values[0]), TypeId::BOOL);
        assert_eq!(info.type_of(right), TypeId::FLOAT64);
    }

    #[test]
    fn test_address_taken() {
        let (result, strings, _) = check(
            "package p\nfunc f(a int) *int {\n\tvar arr [3]int\n\tp := &arr[1]\n\t*p = a\n\treturn &a\n}\n",
        );
        let info = result.unwrap();
        let finfo = &info.funcs[&strings.lookup("f").unwrap()];
        let a = finfo.params[0].sym.unwrap();
        assert!(info.symbols.get(a).addr_taken);
        let arr = finfo.locals[0];
        assert!(info.symbols.get(arr).addr_taken);
        let p = finfo.locals[1];
        assert!(!info.symbols.get(p).addr_taken);
    }

    #[test]
    fn test_methods_not_in_package_scope() {
        let (result, strings, _) = check("package p\nfunc (t T) m() {}\nfunc f() {}\n");
        let info = result.unwrap();
        assert!(info.lookup_package(strings.lookup("m").unwrap()).is_none());
        assert!(info.lookup_package(strings.lookup("f").unwrap()).is_some());
    }

    #[test]
    fn test_type_errors() {
        assert_error("package p\nfunc f() { x = 1 }\n", "undefined: x");
        assert_error("package p\nfunc f() { var b bool = 1 }\n", "cannot use value of type int as bool");
        assert_error("package p\nfunc f(x int) { if x { } }\n", "non-boolean condition in if statement");
        assert_error("package p\nfunc f(x int) { x := 2 }\n", "no new variables");
        assert_error("package p\nfunc f() int { }\n", "missing return");
        assert_error("package p\nfunc f() { var u uint8 = 256 }\n", "overflows uint8");
        assert_error("package p\nfunc f(x int) { x = x / 0 }\n", "division by zero");
        assert_error("package p\nfunc g(a int) {}\nfunc f() { g() }\n", "not enough arguments");
        assert_error("package p\nfunc f(x int) { x }\n", "is not used");
        assert_error("package p\nfunc f() { var a [2]int; a[5] = 1 }\n", "out of bounds");
        assert_error(
            "package p\nfunc f(x int) {\n\tswitch x {\n\tcase 1:\n\t\tfallthrough\n\t}\n}\n",
            "cannot fallthrough final case",
        );
        assert_error("package p\nfunc f() {}\nfunc f() {}\n", "f redeclared in this block");
    }

    #[test]
    fn test_errors_deduplicated() {
        let strings = StringTable::new();
        let mut checker = Checker::new(&strings, StringId::EMPTY);
        let pos = Position::new(0, 2, 3);
        checker.error(pos, "undefined: x");
        checker.error(pos, "undefined: x");
        checker.error(Position::new(0, 2, 7), "undefined: x");
        assert_eq!(checker.errors.len(), 2);
    }

    #[test]
    fn test_negative_constants() {
        assert!(errors("package p\nfunc f() { var a int8 = -128; a++ }\n").is_empty());
        assert_error("package p\nfunc f() { var u uint = -1; u++ }\n", "constant -1 overflows uint");
        assert_error("package p\nfunc f() { p := nil; p++ }\n", "use of untyped nil");
    }

    #[test]
    fn test_shadowing_is_accepted() {
        // Go permits shadowing; the SSA builder enforces unique names later
        assert!(errors("package p\nfunc f(x int) { if true { x := 1; x++ } }\n").is_empty());
    }

    #[test]
    fn test_multi_value_assignment() {
        assert!(errors(
            "package p\nfunc two() (int, int) { return 1, 2 }\nfunc f() { a, b := two(); a = b }\n"
        )
        .is_empty());
        assert_error(
            "package p\nfunc two() (int, int) { return 1, 2 }\nfunc f() { a := two(); a++ }\n",
            "multiple-value",
        );
    }
}

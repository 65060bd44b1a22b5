//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// SSA builder
//
// Walks a function body against the scanner's block skeleton and emits
// SSA values. Pure-value variables are tracked per block and resolved on
// read (Braun et al., "Simple and Efficient Construction of Static
// Single Assignment Form"): a read with no local binding looks through
// the predecessors, placing phis at joins and incomplete phis in blocks
// whose predecessors are not all known yet. Memory is one more such
// variable, so every side effect consumes the current memory value and
// produces the next.
//
// Variables that need an address get it once, in the entry block, and
// are accessed through Load/Store from then on.
//

use super::classify::{arg_layout, VarClass, Vars};
use super::label::Labels;
use super::scan::{Shape, Skeleton};
use crate::check::Info;
use crate::diag::Position;
use crate::error::{Error, Result};
use crate::parse::ast::{
    AssignOp, BinaryOp, Block, CaseClause, Expr, ExprKind, Ident, Stmt, StmtKind, UnaryOp,
    VarSpec,
};
use crate::ssa::{
    ArgSymbol, Aux, AutoSymbol, BlockId, BlockKind, ExternSymbol, Frontend, Func, Op,
    ValueId,
};
use crate::strings::{StringId, StringTable};
use crate::symbol::{SymbolId, SymbolKind};
use crate::types::{TypeId, TypeTable};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Keys
// ============================================================================

/// What a per-block binding is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKey {
    /// The memory state
    Mem,
    /// A pure-value variable, by name
    Var(StringId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AddrKey {
    Var(StringId),
    Global(SymbolId),
}

/// Assignment target
#[derive(Debug, Clone, Copy)]
enum Place {
    Blank,
    /// Pure-value variable
    Var(usize),
    /// Memory at an address
    Addr(ValueId),
}

/// Folded value of an untyped constant expression
#[derive(Debug, Clone, Copy)]
enum Const {
    Int(i128),
    Float(f64),
}

impl Const {
    fn fold(e: &Expr) -> Option<Const> {
        match &e.kind {
            ExprKind::IntLit(v) => Some(Const::Int(i128::from(*v))),
            ExprKind::CharLit(c) => Some(Const::Int(i128::from(*c))),
            ExprKind::FloatLit(f) => Some(Const::Float(*f)),
            ExprKind::Paren(inner) => Const::fold(inner),
            ExprKind::Unary { op, operand } => {
                let c = Const::fold(operand)?;
                match (op, c) {
                    (UnaryOp::Plus, c) => Some(c),
                    (UnaryOp::Neg, Const::Int(i)) => Some(Const::Int(-i)),
                    (UnaryOp::Neg, Const::Float(f)) => Some(Const::Float(-f)),
                    (UnaryOp::Com, Const::Int(i)) => Some(Const::Int(!i)),
                    _ => None,
                }
            }
            ExprKind::Binary { op, left, right } => {
                Const::binary(*op, Const::fold(left)?, Const::fold(right)?)
            }
            _ => None,
        }
    }

    fn binary(op: BinaryOp, l: Const, r: Const) -> Option<Const> {
        match (l, r) {
            (Const::Int(a), Const::Int(b)) => {
                let v = match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Div => a.checked_div(b)?,
                    BinaryOp::Mod => a.checked_rem(b)?,
                    BinaryOp::And => a & b,
                    BinaryOp::Or => a | b,
                    BinaryOp::Xor => a ^ b,
                    BinaryOp::AndNot => a & !b,
                    BinaryOp::Shl => a.checked_shl(u32::try_from(b).ok()?)?,
                    BinaryOp::Shr => a.checked_shr(u32::try_from(b).ok()?)?,
                    _ => return None,
                };
                Some(Const::Int(v))
            }
            (l, r) => {
                let (a, b) = (l.as_f64(), r.as_f64());
                let v = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => return None,
                };
                Some(Const::Float(v))
            }
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Const::Int(i) => i as f64,
            Const::Float(f) => f,
        }
    }

    fn as_i128(self) -> i128 {
        match self {
            Const::Int(i) => i,
            Const::Float(f) => f as i128,
        }
    }
}

/// Wrap an integer constant to a type of `size` bytes, sign-extending
/// signed types. Unsigned values keep their bit pattern.
fn wrap_int(v: i128, size: u64, unsigned: bool) -> i64 {
    let bits = size * 8;
    if bits >= 64 {
        return v as i64;
    }
    let u = v & ((1i128 << bits) - 1);
    if !unsigned && u & (1i128 << (bits - 1)) != 0 {
        (u - (1i128 << bits)) as i64
    } else {
        u as i64
    }
}

// ============================================================================
// Construction state
// ============================================================================

/// Services and inputs shared by one build
pub struct Ctx<'a> {
    pub info: &'a Info,
    pub strings: &'a StringTable,
    pub fe: &'a dyn Frontend,
}

/// Everything one function build owns
pub struct State<'a> {
    pub f: Func,
    /// Starts as a copy of the checker's table; grows the pointer types
    /// that addresses need
    pub types: TypeTable,
    info: &'a Info,
    strings: &'a StringTable,
    fe: &'a dyn Frontend,
    vars: &'a Vars,
    skeleton: &'a Skeleton,
    labels: &'a Labels,
    blank: Option<StringId>,

    /// Block being filled; None after a jump until the next block starts
    cur: Option<BlockId>,
    /// Current value of each variable at the end of each block so far
    defs: HashMap<BlockId, HashMap<VarKey, ValueId>>,
    /// Blocks whose predecessor lists are final
    sealed: HashSet<BlockId>,
    /// Phis created in unsealed blocks, completed when the block is sealed
    incomplete: HashMap<BlockId, Vec<(VarKey, ValueId)>>,
    /// Addresses computed once per variable
    decladdrs: HashMap<AddrKey, ValueId>,
    started: HashSet<BlockId>,
    /// Body of the next case clause, while building a switch clause
    fallthrough: Option<BlockId>,

    sp: ValueId,
    sb: ValueId,
}

/// Build the SSA form of a function body into `f`, whose blocks the
/// scanner has already allocated.
pub fn build<'a>(
    mut f: Func,
    skeleton: &'a Skeleton,
    labels: &'a Labels,
    body: &Block,
    vars: &'a Vars,
    ctx: Ctx<'a>,
) -> Result<State<'a>> {
    let entry = skeleton.entry;
    let pos = body.pos;
    let init_mem = f.new_value(entry, Op::InitMem, TypeId::MEM, pos, &[]);
    let sp = f.new_value(entry, Op::SP, ctx.fe.type_uintptr(), pos, &[]);
    let sb = f.new_value(entry, Op::SB, ctx.fe.type_uintptr(), pos, &[]);

    let mut s = State {
        f,
        types: ctx.fe.types().clone(),
        info: ctx.info,
        strings: ctx.strings,
        fe: ctx.fe,
        vars,
        skeleton,
        labels,
        blank: ctx.strings.lookup("_"),
        cur: None,
        defs: HashMap::new(),
        sealed: HashSet::new(),
        incomplete: HashMap::new(),
        decladdrs: HashMap::new(),
        started: HashSet::new(),
        fallthrough: None,
        sp,
        sb,
    };

    if s.fe.log() {
        s.fe.logf(format_args!(
            "build {}: {} blocks, {} variables",
            s.f.name,
            skeleton.blocks.len(),
            vars.len()
        ));
    }

    s.start(entry)?;
    s.seal(entry)?;
    s.write_var(VarKey::Mem, entry, init_mem);
    s.init_params(pos)?;
    s.stmts(&body.stmts)?;
    s.finish(pos)?;
    Ok(s)
}

impl<'a> State<'a> {
    /// Finished function and the type table its values refer to
    pub fn into_parts(self) -> (Func, TypeTable) {
        (self.f, self.types)
    }

    /// Value bound to `key` at the end of `block`, if any
    pub fn binding(&self, block: BlockId, key: VarKey) -> Option<ValueId> {
        self.defs.get(&block).and_then(|m| m.get(&key)).copied()
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    fn invariant(&self, pos: Position, msg: impl AsRef<str>) -> Error {
        self.fe.fatalf(Some(pos), msg.as_ref())
    }

    fn unimplemented(&self, pos: Position, msg: impl AsRef<str>) -> Error {
        self.fe.unimplementedf(Some(pos), msg.as_ref())
    }

    fn name(&self, id: StringId) -> &'a str {
        self.strings.get(id)
    }

    fn shape(&self, s: &Stmt) -> Result<Shape> {
        self.skeleton
            .shape(s.id)
            .cloned()
            .ok_or_else(|| self.invariant(s.pos, format!("no blocks for {}", s.kind.describe())))
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    fn start(&mut self, b: BlockId) -> Result<()> {
        if let Some(c) = self.cur {
            return Err(self.invariant(
                Position::bad(),
                format!("block {} not ended before starting {}", c, b),
            ));
        }
        if !self.started.insert(b) {
            return Err(self.invariant(Position::bad(), format!("block {} started twice", b)));
        }
        log::trace!("start {}", b);
        self.cur = Some(b);
        Ok(())
    }

    /// Current block; statically unreachable code gets a fresh block
    /// with no predecessors
    fn ensure_block(&mut self) -> BlockId {
        if let Some(b) = self.cur {
            return b;
        }
        let b = self.f.new_block();
        log::trace!("dead code block {}", b);
        self.sealed.insert(b);
        self.started.insert(b);
        self.cur = Some(b);
        b
    }

    fn end_plain(&mut self, to: BlockId) {
        if let Some(b) = self.cur.take() {
            self.f.set_control(b, BlockKind::Plain, None);
            self.f.add_edge(b, to);
        }
    }

    fn end_if(&mut self, cond: ValueId, yes: BlockId, no: BlockId) {
        if let Some(b) = self.cur.take() {
            self.f.set_control(b, BlockKind::If, Some(cond));
            self.f.add_edge(b, yes);
            self.f.add_edge(b, no);
        }
    }

    fn end_ret(&mut self, pos: Position) -> Result<()> {
        let mem = self.mem(pos)?;
        let b = self.ensure_block();
        self.f.set_control(b, BlockKind::Ret, Some(mem));
        self.cur = None;
        Ok(())
    }

    /// Mark a block's predecessor list final and complete its phis
    fn seal(&mut self, b: BlockId) -> Result<()> {
        if !self.sealed.insert(b) {
            return Ok(());
        }
        if let Some(phis) = self.incomplete.remove(&b) {
            for (key, phi) in phis {
                let pos = self.f.value(phi).pos;
                self.add_phi_operands(key, phi, b, pos)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Variable bindings
    // ------------------------------------------------------------------------

    fn write_var(&mut self, key: VarKey, block: BlockId, v: ValueId) {
        self.defs.entry(block).or_default().insert(key, v);
    }

    fn read_var(&mut self, key: VarKey, block: BlockId, pos: Position) -> Result<ValueId> {
        match self.binding(block, key) {
            Some(v) => Ok(v),
            None => self.read_var_recursive(key, block, pos),
        }
    }

    fn read_var_recursive(&mut self, key: VarKey, block: BlockId, pos: Position) -> Result<ValueId> {
        let typ = self.key_type(key, pos)?;
        let v = if !self.sealed.contains(&block) {
            let phi = self.f.new_value(block, Op::Phi, typ, pos, &[]);
            self.incomplete.entry(block).or_default().push((key, phi));
            phi
        } else {
            let preds = self.f.block(block).preds.clone();
            match preds.as_slice() {
                [] if block == self.f.entry => self.entry_value(key, pos)?,
                [] => self.f.new_value(block, Op::Unknown, typ, pos, &[]),
                [pred] => self.read_var(key, *pred, pos)?,
                _ => {
                    let phi = self.f.new_value(block, Op::Phi, typ, pos, &[]);
                    // bind first so that loops find the phi
                    self.write_var(key, block, phi);
                    self.add_phi_operands(key, phi, block, pos)?;
                    phi
                }
            }
        };
        self.write_var(key, block, v);
        Ok(v)
    }

    fn add_phi_operands(
        &mut self,
        key: VarKey,
        phi: ValueId,
        block: BlockId,
        pos: Position,
    ) -> Result<()> {
        let preds = self.f.block(block).preds.clone();
        for p in preds {
            let v = self.read_var(key, p, pos)?;
            self.f.add_arg(phi, v);
        }
        Ok(())
    }

    /// Value of a variable on function entry
    fn entry_value(&mut self, key: VarKey, pos: Position) -> Result<ValueId> {
        let VarKey::Var(name) = key else {
            return Err(self.invariant(pos, "memory state read before initialization"));
        };
        let idx = self
            .vars
            .by_name(name)
            .ok_or_else(|| self.invariant(pos, format!("unknown variable {}", self.name(name))))?;
        let var = self.vars.get(idx);
        match var.class {
            VarClass::Param { offset } if !var.needs_addr => {
                let aux = Aux::Arg(ArgSymbol {
                    name: var.name.clone(),
                    typ: var.typ,
                    offset,
                });
                let entry = self.f.entry;
                Ok(self
                    .f
                    .new_value_aux(entry, Op::Arg, var.typ, var.pos, aux, &[]))
            }
            _ => Err(self.invariant(
                pos,
                format!(
                    "incomplete control flow: {} ({}) has no value on some path",
                    var.name, var.class
                ),
            )),
        }
    }

    fn key_type(&self, key: VarKey, pos: Position) -> Result<TypeId> {
        match key {
            VarKey::Mem => Ok(TypeId::MEM),
            VarKey::Var(name) => self
                .vars
                .by_name(name)
                .map(|idx| self.vars.get(idx).typ)
                .ok_or_else(|| self.invariant(pos, format!("unknown variable {}", self.name(name)))),
        }
    }

    fn mem(&mut self, pos: Position) -> Result<ValueId> {
        let b = self.ensure_block();
        self.read_var(VarKey::Mem, b, pos)
    }

    fn set_mem(&mut self, v: ValueId) {
        let b = self.ensure_block();
        self.write_var(VarKey::Mem, b, v);
    }

    fn var_index(&self, sym: SymbolId, pos: Position) -> Result<usize> {
        self.vars.by_symbol(sym).ok_or_else(|| {
            let name = self.name(self.info.symbols.get(sym).name);
            self.invariant(pos, format!("variable {} was not classified", name))
        })
    }

    fn is_blank(&self, name: StringId) -> bool {
        self.blank == Some(name)
    }

    // ------------------------------------------------------------------------
    // Addresses and memory operations
    // ------------------------------------------------------------------------

    /// Address of a classified variable, computed once in the entry block
    fn addr_of_var(&mut self, idx: usize) -> Result<ValueId> {
        let var = self.vars.get(idx);
        let key = AddrKey::Var(var.key);
        if let Some(&a) = self.decladdrs.get(&key) {
            return Ok(a);
        }
        let aux = match var.class {
            VarClass::Param { offset }
            | VarClass::ParamHeap { offset }
            | VarClass::ParamOut { offset } => Aux::Arg(ArgSymbol {
                name: var.name.clone(),
                typ: var.typ,
                offset,
            }),
            VarClass::Auto | VarClass::AutoHeap => Aux::Auto(AutoSymbol {
                name: var.name.clone(),
                typ: var.typ,
            }),
            VarClass::Func => {
                return Err(self.unimplemented(
                    var.pos,
                    format!("address of function {} ({})", var.name, var.class),
                ))
            }
        };
        let ptr = self.types.pointer_to(var.typ);
        let entry = self.f.entry;
        let a = self
            .f
            .new_value_aux(entry, Op::Addr, ptr, var.pos, aux, &[self.sp]);
        self.decladdrs.insert(key, a);
        Ok(a)
    }

    fn global_addr(&mut self, sym: SymbolId) -> ValueId {
        let key = AddrKey::Global(sym);
        if let Some(&a) = self.decladdrs.get(&key) {
            return a;
        }
        let s = self.info.symbols.get(sym);
        let aux = Aux::Extern(ExternSymbol {
            name: self.name(s.name).to_string(),
        });
        let ptr = self.types.pointer_to(s.typ);
        let entry = self.f.entry;
        let a = self
            .f
            .new_value_aux(entry, Op::Addr, ptr, s.pos, aux, &[self.sb]);
        self.decladdrs.insert(key, a);
        a
    }

    /// Value at `ptr`. Arrays are never loaded; their address stands in
    /// for the value.
    fn load(&mut self, ptr: ValueId, typ: TypeId, pos: Position) -> Result<ValueId> {
        if self.types.is_array(typ) {
            return Ok(ptr);
        }
        let mem = self.mem(pos)?;
        let b = self.ensure_block();
        Ok(self.f.new_value(b, Op::Load, typ, pos, &[ptr, mem]))
    }

    /// Store `v` at `ptr`; for arrays `v` is the source address
    fn store(&mut self, ptr: ValueId, v: ValueId, typ: TypeId, pos: Position) -> Result<()> {
        let size = self.types.size(typ) as i64;
        let mem = self.mem(pos)?;
        let b = self.ensure_block();
        let op = if self.types.is_array(typ) {
            Op::Move
        } else {
            Op::Store
        };
        let st = self
            .f
            .new_value_int(b, op, TypeId::MEM, pos, size, &[ptr, v, mem]);
        self.set_mem(st);
        Ok(())
    }

    fn zero(&mut self, ptr: ValueId, typ: TypeId, pos: Position) -> Result<()> {
        let size = self.types.size(typ) as i64;
        let mem = self.mem(pos)?;
        let b = self.ensure_block();
        let z = self
            .f
            .new_value_int(b, Op::Zero, TypeId::MEM, pos, size, &[ptr, mem]);
        self.set_mem(z);
        Ok(())
    }

    /// Start the lifetime of an address-requiring local
    fn var_def(&mut self, idx: usize, pos: Position) -> Result<()> {
        let var = self.vars.get(idx);
        let aux = Aux::Auto(AutoSymbol {
            name: var.name.clone(),
            typ: var.typ,
        });
        let mem = self.mem(pos)?;
        let b = self.ensure_block();
        let vd = self
            .f
            .new_value_aux(b, Op::VarDef, TypeId::MEM, pos, aux, &[mem]);
        self.set_mem(vd);
        Ok(())
    }

    /// Copy an array into a fresh stack temporary, returning its address
    fn copy_to_temp(&mut self, src: ValueId, typ: TypeId, pos: Position) -> Result<ValueId> {
        let sym = self.fe.auto(typ);
        let mem = self.mem(pos)?;
        let b = self.ensure_block();
        let vd = self
            .f
            .new_value_aux(b, Op::VarDef, TypeId::MEM, pos, Aux::Auto(sym.clone()), &[mem]);
        self.set_mem(vd);
        let ptr = self.types.pointer_to(typ);
        let addr = self
            .f
            .new_value_aux(b, Op::Addr, ptr, pos, Aux::Auto(sym), &[self.sp]);
        self.store(addr, src, typ, pos)?;
        Ok(addr)
    }

    fn zero_value(&mut self, typ: TypeId, pos: Position) -> Result<ValueId> {
        let types = &self.types;
        if types.is_bool(typ) {
            Ok(self.f.const_bool(false, pos))
        } else if types.is_float(typ) {
            Ok(self.f.const_float(typ, 0.0, pos))
        } else if types.is_integer(typ) {
            Ok(self.f.const_int(typ, 0, pos))
        } else if types.is_pointer(typ) {
            Ok(self.f.const_nil(typ, pos))
        } else if types.is_string(typ) {
            let ptr = self.f.const_nil(self.fe.type_bytes_ptr(), pos);
            let len = self.f.const_int(self.fe.type_int(), 0, pos);
            let b = self.ensure_block();
            Ok(self
                .f
                .new_value(b, Op::StringMake, self.fe.type_string(), pos, &[ptr, len]))
        } else {
            Err(self.invariant(
                pos,
                format!("no zero value for type {}", self.types.name(typ)),
            ))
        }
    }

    // ------------------------------------------------------------------------
    // Function entry and exit
    // ------------------------------------------------------------------------

    fn init_params(&mut self, pos: Position) -> Result<()> {
        let uintptr = self.fe.type_uintptr();
        let fp = Aux::Arg(ArgSymbol {
            name: ".fp".to_string(),
            typ: uintptr,
            offset: 0,
        });
        let entry = self.f.entry;
        self.f
            .new_value_aux(entry, Op::Addr, uintptr, pos, fp, &[self.sp]);

        let vars = self.vars;
        for idx in vars.params.iter().flatten().copied() {
            if vars.needs_addr(idx) {
                self.addr_of_var(idx)?;
            }
        }
        for slot in &vars.results {
            let addr = self.addr_of_var(slot.var)?;
            if vars.get(slot.var).sym.is_some() {
                self.zero(addr, slot.typ, pos)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, pos: Position) -> Result<()> {
        if self.cur.is_some() {
            self.end_ret(pos)?;
        }

        let mut targets: Vec<BlockId> = self.labels.targets().collect();
        targets.sort();
        for t in targets {
            self.seal(t)?;
        }

        if let Some(b) = self
            .skeleton
            .blocks
            .iter()
            .find(|b| !self.started.contains(*b))
        {
            return Err(self.invariant(pos, format!("block {} was never populated", b)));
        }
        let mut unsealed: Vec<BlockId> = self.started.difference(&self.sealed).copied().collect();
        unsealed.sort();
        if let Some(b) = unsealed.first() {
            return Err(self.invariant(pos, format!("block {} was never sealed", b)));
        }
        if let Some(b) = self.incomplete.keys().min() {
            return Err(self.invariant(pos, format!("block {} has incomplete phis", b)));
        }

        if self.fe.log() {
            self.fe.logf(format_args!(
                "built {}: {} blocks, {} values",
                self.f.name,
                self.f.num_blocks(),
                self.f.num_values()
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for s in stmts {
            self.stmt(s)?;
        }
        Ok(())
    }

    fn stmt(&mut self, s: &Stmt) -> Result<()> {
        log::trace!("{}: {}", s.pos, s.kind.describe());
        match &s.kind {
            StmtKind::Empty => {}
            StmtKind::Block(b) => self.stmts(&b.stmts)?,
            StmtKind::Expr(e) => {
                self.ensure_block();
                match &e.unparen().kind {
                    ExprKind::Call { func, args } => {
                        self.call(e, func, args)?;
                    }
                    _ => {
                        self.expr(e)?;
                    }
                }
            }
            StmtKind::Assign { lhs, op, rhs } => {
                self.ensure_block();
                self.assign(lhs, *op, rhs, s.pos)?;
            }
            StmtKind::Define { names, values } => {
                self.ensure_block();
                self.define(names, values, s.pos)?;
            }
            StmtKind::Var(specs) => {
                self.ensure_block();
                for spec in specs {
                    self.var_spec(spec)?;
                }
            }
            StmtKind::IncDec { target, inc } => {
                self.ensure_block();
                self.inc_dec(target, *inc, s.pos)?;
            }
            StmtKind::If {
                init,
                cond,
                then,
                els,
            } => self.if_stmt(s, init.as_deref(), cond, then, els.as_deref())?,
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => self.for_stmt(s, init.as_deref(), cond.as_ref(), post.as_deref(), body)?,
            StmtKind::Switch { init, tag, clauses } => {
                self.switch_stmt(s, init.as_deref(), tag.as_ref(), clauses)?
            }
            StmtKind::Labeled { stmt, .. } => {
                let Shape::Label { target } = self.shape(s)? else {
                    return Err(self.invariant(s.pos, "labeled statement has no target"));
                };
                self.end_plain(target);
                self.start(target)?;
                self.stmt(stmt)?;
            }
            StmtKind::Goto(_) | StmtKind::Break(_) | StmtKind::Continue(_) => {
                let target = self.labels.jump_target(s.id).ok_or_else(|| {
                    self.invariant(s.pos, format!("unresolved {}", s.kind.describe()))
                })?;
                self.end_plain(target);
            }
            StmtKind::Fallthrough => {
                let target = self
                    .fallthrough
                    .ok_or_else(|| self.invariant(s.pos, "fallthrough outside a switch clause"))?;
                self.end_plain(target);
            }
            StmtKind::Return(values) => {
                self.ensure_block();
                self.ret(values, s.pos)?;
            }
            StmtKind::Go(_) | StmtKind::Defer(_) => {
                return Err(self.unimplemented(s.pos, s.kind.describe()));
            }
        }
        Ok(())
    }

    fn if_stmt(
        &mut self,
        s: &Stmt,
        init: Option<&Stmt>,
        cond: &Expr,
        then: &Block,
        els: Option<&Stmt>,
    ) -> Result<()> {
        let Shape::If {
            then: then_b,
            els: els_b,
            join,
        } = self.shape(s)?
        else {
            return Err(self.invariant(s.pos, "if statement has the wrong block shape"));
        };

        self.ensure_block();
        if let Some(init) = init {
            self.stmt(init)?;
        }
        self.ensure_block();
        let c = self.expr(cond)?;
        let no = els_b
            .or(join)
            .ok_or_else(|| self.invariant(s.pos, "if without else has no join block"))?;
        self.end_if(c, then_b, no);

        self.start(then_b)?;
        self.seal(then_b)?;
        self.stmts(&then.stmts)?;
        self.end_branch(join, then.pos)?;

        if let (Some(els), Some(els_b)) = (els, els_b) {
            self.start(els_b)?;
            self.seal(els_b)?;
            self.stmt(els)?;
            self.end_branch(join, els.pos)?;
        }

        if let Some(join) = join {
            self.start(join)?;
            self.seal(join)?;
        }
        Ok(())
    }

    /// Leave a branch of a construct for its join or exit block
    fn end_branch(&mut self, to: Option<BlockId>, pos: Position) -> Result<()> {
        match (to, self.cur) {
            (Some(to), _) => {
                self.end_plain(to);
                Ok(())
            }
            (None, None) => Ok(()),
            (None, Some(b)) => Err(self.invariant(
                pos,
                format!("block {} falls through but the construct has no exit", b),
            )),
        }
    }

    fn for_stmt(
        &mut self,
        s: &Stmt,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
    ) -> Result<()> {
        let Shape::For {
            header,
            body: body_b,
            latch,
            exit,
        } = self.shape(s)?
        else {
            return Err(self.invariant(s.pos, "for statement has the wrong block shape"));
        };

        self.ensure_block();
        if let Some(init) = init {
            self.stmt(init)?;
        }
        self.ensure_block();
        self.end_plain(header);

        // the header stays unsealed until every back edge exists
        self.start(header)?;
        match cond {
            Some(c) => {
                let v = self.expr(c)?;
                let exit = exit
                    .ok_or_else(|| self.invariant(s.pos, "conditional loop has no exit block"))?;
                self.end_if(v, body_b, exit);
            }
            None => self.end_plain(body_b),
        }

        self.start(body_b)?;
        self.seal(body_b)?;
        self.stmts(&body.stmts)?;
        self.end_plain(latch.unwrap_or(header));

        if let Some(latch) = latch {
            self.start(latch)?;
            self.seal(latch)?;
            if let Some(post) = post {
                self.stmt(post)?;
            }
            self.end_plain(header);
        }
        self.seal(header)?;

        if let Some(exit) = exit {
            self.start(exit)?;
            self.seal(exit)?;
        }
        Ok(())
    }

    fn switch_stmt(
        &mut self,
        s: &Stmt,
        init: Option<&Stmt>,
        tag: Option<&Expr>,
        clauses: &[CaseClause],
    ) -> Result<()> {
        let Shape::Switch {
            tests,
            bodies,
            exit,
        } = self.shape(s)?
        else {
            return Err(self.invariant(s.pos, "switch statement has the wrong block shape"));
        };

        self.ensure_block();
        if let Some(init) = init {
            self.stmt(init)?;
        }
        self.ensure_block();
        let tag = match tag {
            Some(t) => Some((self.expr(t)?, self.info.type_of(t))),
            None => None,
        };

        // where control goes when no case matches
        let fallback = clauses
            .iter()
            .position(|c| c.is_default)
            .map(|i| bodies[i])
            .or(exit)
            .ok_or_else(|| self.invariant(s.pos, "switch has neither default nor exit"))?;
        self.end_plain(tests.first().copied().unwrap_or(fallback));

        let mut k = 0;
        for (i, clause) in clauses.iter().enumerate() {
            for e in &clause.exprs {
                let test = tests[k];
                let next = tests.get(k + 1).copied().unwrap_or(fallback);
                self.start(test)?;
                self.seal(test)?;
                let cond = match tag {
                    Some((tv, tt)) => {
                        let ev = self.expr(e)?;
                        self.compare(BinaryOp::Eq, tv, ev, tt, e.pos)?
                    }
                    None => self.expr(e)?,
                };
                self.end_if(cond, bodies[i], next);
                k += 1;
            }
        }

        for (i, clause) in clauses.iter().enumerate() {
            self.start(bodies[i])?;
            self.seal(bodies[i])?;
            let saved = self.fallthrough;
            self.fallthrough = bodies.get(i + 1).copied();
            self.stmts(&clause.body)?;
            self.fallthrough = saved;
            self.end_branch(exit, clause.pos)?;
        }

        if let Some(exit) = exit {
            self.start(exit)?;
            self.seal(exit)?;
        }
        Ok(())
    }

    fn ret(&mut self, values: &[Expr], pos: Position) -> Result<()> {
        if values.len() > 1 || self.vars.results.len() > 1 {
            return Err(self.unimplemented(pos, "multiple return values"));
        }
        if let Some(v) = values.first() {
            let slot = *self
                .vars
                .results
                .first()
                .ok_or_else(|| self.invariant(pos, "return value in function without results"))?;
            let x = self.expr(v)?;
            let addr = self.addr_of_var(slot.var)?;
            self.store(addr, x, slot.typ, pos)?;
        }
        self.end_ret(pos)
    }

    // ------------------------------------------------------------------------
    // Assignment and declarations
    // ------------------------------------------------------------------------

    fn place(&mut self, e: &Expr) -> Result<Place> {
        let e = e.unparen();
        match &e.kind {
            ExprKind::Ident(name) if self.is_blank(*name) => Ok(Place::Blank),
            ExprKind::Ident(name) => {
                let sym = self.info.use_of(e.id).ok_or_else(|| {
                    self.invariant(e.pos, format!("unresolved identifier {}", self.name(*name)))
                })?;
                if self.info.symbols.get(sym).kind == SymbolKind::Global {
                    return Ok(Place::Addr(self.global_addr(sym)));
                }
                let idx = self.var_index(sym, e.pos)?;
                if self.vars.needs_addr(idx) {
                    Ok(Place::Addr(self.addr_of_var(idx)?))
                } else {
                    Ok(Place::Var(idx))
                }
            }
            ExprKind::Index { base, index } => Ok(Place::Addr(self.index_addr(e, base, index)?)),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => Ok(Place::Addr(self.expr(operand)?)),
            _ => Err(self.invariant(e.pos, "expression is not assignable")),
        }
    }

    fn load_place(&mut self, place: Place, typ: TypeId, pos: Position) -> Result<ValueId> {
        match place {
            Place::Var(idx) => {
                let key = VarKey::Var(self.vars.get(idx).key);
                let b = self.ensure_block();
                self.read_var(key, b, pos)
            }
            Place::Addr(ptr) => self.load(ptr, typ, pos),
            Place::Blank => Err(self.invariant(pos, "read of blank identifier")),
        }
    }

    fn store_place(&mut self, place: Place, v: ValueId, typ: TypeId, pos: Position) -> Result<()> {
        match place {
            Place::Blank => Ok(()),
            Place::Var(idx) => {
                let key = VarKey::Var(self.vars.get(idx).key);
                let b = self.ensure_block();
                self.write_var(key, b, v);
                Ok(())
            }
            Place::Addr(ptr) => self.store(ptr, v, typ, pos),
        }
    }

    /// Evaluate right-hand sides for an n-way assignment. With more than
    /// one target, arrays are copied out first so that later stores
    /// can't clobber them.
    fn rvalues(&mut self, values: &[Expr], n: usize, pos: Position) -> Result<Vec<(ValueId, TypeId)>> {
        if values.len() != n {
            return Err(self.unimplemented(pos, "assignment from a multi-result function call"));
        }
        let mut out = Vec::with_capacity(n);
        for v in values {
            let typ = self.info.type_of(v);
            let mut x = self.expr(v)?;
            if n > 1 && self.types.is_array(typ) {
                x = self.copy_to_temp(x, typ, v.pos)?;
            }
            out.push((x, typ));
        }
        Ok(out)
    }

    fn assign(&mut self, lhs: &[Expr], op: AssignOp, rhs: &[Expr], pos: Position) -> Result<()> {
        match op {
            AssignOp::Compound(bop) => {
                let (Some(target), Some(value)) = (lhs.first(), rhs.first()) else {
                    return Err(self.invariant(pos, "malformed compound assignment"));
                };
                let typ = self.info.type_of(target);
                let place = self.place(target)?;
                let old = self.load_place(place, typ, pos)?;
                let r = self.expr(value)?;
                let v = self.arith(bop, old, r, typ, pos)?;
                self.store_place(place, v, typ, pos)
            }
            AssignOp::Assign => {
                let mut places = Vec::with_capacity(lhs.len());
                for l in lhs {
                    places.push(self.place(l)?);
                }
                let values = self.rvalues(rhs, lhs.len(), pos)?;
                for (place, (v, typ)) in places.into_iter().zip(values) {
                    self.store_place(place, v, typ, pos)?;
                }
                Ok(())
            }
        }
    }

    fn define(&mut self, names: &[Ident], values: &[Expr], pos: Position) -> Result<()> {
        let values = self.rvalues(values, names.len(), pos)?;
        for (ident, (v, _)) in names.iter().zip(values) {
            self.declare(ident, Some(v), pos)?;
        }
        Ok(())
    }

    fn var_spec(&mut self, spec: &VarSpec) -> Result<()> {
        if spec.values.is_empty() {
            for ident in &spec.names {
                self.declare(ident, None, spec.pos)?;
            }
            return Ok(());
        }
        self.define(&spec.names, &spec.values, spec.pos)
    }

    /// Bind a declared (or, for `:=`, redeclared) name to its initial
    /// value, or to the zero value
    fn declare(&mut self, ident: &Ident, value: Option<ValueId>, pos: Position) -> Result<()> {
        if self.is_blank(ident.name) {
            return Ok(());
        }
        let sym = self.info.def_of(ident).ok_or_else(|| {
            self.invariant(ident.pos, format!("undeclared variable {}", self.name(ident.name)))
        })?;
        let idx = self.var_index(sym, ident.pos)?;
        let is_new = self.info.defs.contains_key(&ident.id);
        let (typ, key, needs_addr) = {
            let var = self.vars.get(idx);
            (var.typ, var.key, var.needs_addr)
        };

        if needs_addr {
            let addr = self.addr_of_var(idx)?;
            if is_new {
                self.var_def(idx, pos)?;
            }
            match value {
                Some(v) => self.store(addr, v, typ, pos),
                None => self.zero(addr, typ, pos),
            }
        } else {
            let v = match value {
                Some(v) => v,
                None => self.zero_value(typ, pos)?,
            };
            let b = self.ensure_block();
            self.write_var(VarKey::Var(key), b, v);
            Ok(())
        }
    }

    fn inc_dec(&mut self, target: &Expr, inc: bool, pos: Position) -> Result<()> {
        let typ = self.info.type_of(target);
        let place = self.place(target)?;
        let old = self.load_place(place, typ, pos)?;
        let one = if self.types.is_float(typ) {
            self.f.const_float(typ, 1.0, pos)
        } else {
            self.f.const_int(typ, 1, pos)
        };
        let op = if inc { BinaryOp::Add } else { BinaryOp::Sub };
        let v = self.arith(op, old, one, typ, pos)?;
        self.store_place(place, v, typ, pos)
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr(&mut self, e: &Expr) -> Result<ValueId> {
        if e.is_untyped_const() {
            return self.constant(e);
        }
        let typ = self.info.type_of(e);
        match &e.kind {
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::Ident(name) => self.ident(e, *name, typ),
            ExprKind::IntLit(_) | ExprKind::FloatLit(_) | ExprKind::CharLit(_) => self.constant(e),
            ExprKind::BoolLit(b) => Ok(self.f.const_bool(*b, e.pos)),
            ExprKind::StringLit(s) => Ok(self.string_const(s, e.pos)),
            ExprKind::Nil => Ok(self.f.const_nil(typ, e.pos)),
            ExprKind::Unary { op, operand } => self.unary(e, *op, operand, typ),
            ExprKind::Binary { op, left, right } => self.binary(e, *op, left, right, typ),
            ExprKind::Call { func, args } => self
                .call(e, func, args)?
                .ok_or_else(|| self.invariant(e.pos, "function call has no value")),
            ExprKind::Index { base, index } => {
                if self.types.is_string(self.info.type_of(base)) {
                    return Err(self.unimplemented(e.pos, "string index"));
                }
                let ptr = self.index_addr(e, base, index)?;
                self.load(ptr, typ, e.pos)
            }
        }
    }

    fn constant(&mut self, e: &Expr) -> Result<ValueId> {
        let typ = self.info.type_of(e);
        let c = Const::fold(e)
            .ok_or_else(|| self.invariant(e.pos, "constant expression does not fold"))?;
        if self.types.is_float(typ) {
            let mut v = c.as_f64();
            if typ == TypeId::FLOAT32 {
                v = f64::from(v as f32);
            }
            Ok(self.f.const_float(typ, v, e.pos))
        } else {
            let v = wrap_int(
                c.as_i128(),
                self.types.size(typ),
                self.types.is_unsigned(typ),
            );
            Ok(self.f.const_int(typ, v, e.pos))
        }
    }

    fn string_const(&mut self, s: &str, pos: Position) -> ValueId {
        let sym = self.fe.string_data(s);
        let b = self.ensure_block();
        let ptr = self.f.new_value_aux(
            b,
            Op::Addr,
            self.fe.type_bytes_ptr(),
            pos,
            Aux::Extern(sym),
            &[self.sb],
        );
        let len = self.f.const_int(self.fe.type_int(), s.len() as i64, pos);
        self.f
            .new_value(b, Op::StringMake, self.fe.type_string(), pos, &[ptr, len])
    }

    fn ident(&mut self, e: &Expr, name: StringId, typ: TypeId) -> Result<ValueId> {
        let sym = self.info.use_of(e.id).ok_or_else(|| {
            self.invariant(e.pos, format!("unresolved identifier {}", self.name(name)))
        })?;
        match self.info.symbols.get(sym).kind {
            SymbolKind::Global => {
                let addr = self.global_addr(sym);
                self.load(addr, typ, e.pos)
            }
            SymbolKind::Function => {
                let class = self
                    .vars
                    .by_symbol(sym)
                    .map_or(VarClass::Func, |idx| self.vars.get(idx).class);
                Err(self.unimplemented(
                    e.pos,
                    format!("function value {} ({})", self.name(name), class),
                ))
            }
            SymbolKind::TypeName => {
                Err(self.invariant(e.pos, format!("type {} used as value", self.name(name))))
            }
            SymbolKind::Parameter | SymbolKind::Result | SymbolKind::Local => {
                let idx = self.var_index(sym, e.pos)?;
                if self.vars.needs_addr(idx) {
                    let addr = self.addr_of_var(idx)?;
                    self.load(addr, typ, e.pos)
                } else {
                    let key = VarKey::Var(self.vars.get(idx).key);
                    let b = self.ensure_block();
                    self.read_var(key, b, e.pos)
                }
            }
        }
    }

    fn unary(&mut self, e: &Expr, op: UnaryOp, operand: &Expr, typ: TypeId) -> Result<ValueId> {
        match op {
            UnaryOp::AddrOf => match self.place(operand)? {
                Place::Addr(ptr) => Ok(ptr),
                Place::Var(idx) => Err(self.invariant(
                    e.pos,
                    format!("address of SSA variable {}", self.vars.get(idx).name),
                )),
                Place::Blank => Err(self.invariant(e.pos, "address of blank identifier")),
            },
            UnaryOp::Deref => {
                let ptr = self.expr(operand)?;
                self.load(ptr, typ, e.pos)
            }
            UnaryOp::Plus => self.expr(operand),
            UnaryOp::Neg | UnaryOp::Not | UnaryOp::Com => {
                let v = self.expr(operand)?;
                let op = match op {
                    UnaryOp::Neg if self.types.is_float(typ) => Op::NegF,
                    UnaryOp::Neg => Op::Neg,
                    UnaryOp::Not => Op::Not,
                    _ => Op::Com,
                };
                let b = self.ensure_block();
                Ok(self.f.new_value(b, op, typ, e.pos, &[v]))
            }
        }
    }

    fn binary(
        &mut self,
        e: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        typ: TypeId,
    ) -> Result<ValueId> {
        if op.is_logical() {
            return self.short_circuit(e, op, left, right);
        }
        let lt = self.info.type_of(left);
        if self.types.is_string(lt) {
            let what = if op.is_comparison() {
                "string comparison"
            } else {
                "string concatenation"
            };
            return Err(self.unimplemented(e.pos, what));
        }
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        if op.is_comparison() {
            self.compare(op, l, r, lt, e.pos)
        } else {
            self.arith(op, l, r, typ, e.pos)
        }
    }

    fn arith(
        &mut self,
        op: BinaryOp,
        l: ValueId,
        r: ValueId,
        typ: TypeId,
        pos: Position,
    ) -> Result<ValueId> {
        if self.types.is_string(typ) {
            return Err(self.unimplemented(pos, "string concatenation"));
        }
        let float = self.types.is_float(typ);
        let unsigned = self.types.is_unsigned(typ);
        let op = match op {
            BinaryOp::Add if float => Op::AddF,
            BinaryOp::Sub if float => Op::SubF,
            BinaryOp::Mul if float => Op::MulF,
            BinaryOp::Div if float => Op::DivF,
            BinaryOp::Add => Op::Add,
            BinaryOp::Sub => Op::Sub,
            BinaryOp::Mul => Op::Mul,
            BinaryOp::Div if unsigned => Op::DivU,
            BinaryOp::Div => Op::Div,
            BinaryOp::Mod if unsigned => Op::ModU,
            BinaryOp::Mod => Op::Mod,
            BinaryOp::And => Op::And,
            BinaryOp::Or => Op::Or,
            BinaryOp::Xor => Op::Xor,
            BinaryOp::AndNot => Op::AndNot,
            BinaryOp::Shl => Op::Lsh,
            BinaryOp::Shr if unsigned => Op::RshU,
            BinaryOp::Shr => Op::Rsh,
            _ => {
                return Err(self.invariant(pos, format!("{} is not arithmetic", op.as_str())));
            }
        };
        let b = self.ensure_block();
        Ok(self.f.new_value(b, op, typ, pos, &[l, r]))
    }

    /// Comparison of two operands of type `typ`
    fn compare(
        &mut self,
        op: BinaryOp,
        l: ValueId,
        r: ValueId,
        typ: TypeId,
        pos: Position,
    ) -> Result<ValueId> {
        if self.types.is_string(typ) {
            return Err(self.unimplemented(pos, "string comparison"));
        }
        let float = self.types.is_float(typ);
        let unsigned = self.types.is_unsigned(typ);
        let less = if float {
            Op::LessF
        } else if unsigned {
            Op::LessU
        } else {
            Op::Less
        };
        let leq = if float {
            Op::LeqF
        } else if unsigned {
            Op::LeqU
        } else {
            Op::Leq
        };
        let (op, swap) = match op {
            BinaryOp::Eq => (if float { Op::EqF } else { Op::Eq }, false),
            BinaryOp::Ne => (if float { Op::NeqF } else { Op::Neq }, false),
            BinaryOp::Lt => (less, false),
            BinaryOp::Le => (leq, false),
            BinaryOp::Gt => (less, true),
            BinaryOp::Ge => (leq, true),
            _ => {
                return Err(self.invariant(pos, format!("{} is not a comparison", op.as_str())));
            }
        };
        let args = if swap { [r, l] } else { [l, r] };
        let b = self.ensure_block();
        Ok(self.f.new_value(b, op, self.fe.type_bool(), pos, &args))
    }

    /// `a && b` and `a || b`: the right operand gets its own block, the
    /// join merges both outcomes
    fn short_circuit(
        &mut self,
        e: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<ValueId> {
        let Some(&Shape::ShortCircuit {
            right: right_b,
            join,
        }) = self.skeleton.shape(e.id)
        else {
            return Err(self.invariant(e.pos, format!("no blocks for {}", op.as_str())));
        };
        let l = self.expr(left)?;
        self.ensure_block();
        if op == BinaryOp::LogAnd {
            self.end_if(l, right_b, join);
        } else {
            self.end_if(l, join, right_b);
        }

        self.start(right_b)?;
        self.seal(right_b)?;
        let r = self.expr(right)?;
        self.end_plain(join);

        self.start(join)?;
        self.seal(join)?;
        // predecessors are [left block, end of right], in that order
        Ok(self
            .f
            .new_value(join, Op::Phi, self.fe.type_bool(), e.pos, &[l, r]))
    }

    /// Address of an element of an array, or of an array behind a pointer
    fn index_addr(&mut self, e: &Expr, base: &Expr, index: &Expr) -> Result<ValueId> {
        if self.types.is_string(self.info.type_of(base)) {
            return Err(self.unimplemented(e.pos, "string index"));
        }
        // an array operand evaluates to its address
        let arr = self.expr(base)?;
        let i = self.expr(index)?;
        let elem = self.info.type_of(e);
        let ptr = self.types.pointer_to(elem);
        let b = self.ensure_block();
        Ok(self.f.new_value(b, Op::PtrIndex, ptr, e.pos, &[arr, i]))
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    /// A call or conversion. None for calls without a result.
    fn call(&mut self, e: &Expr, func: &Expr, args: &[Expr]) -> Result<Option<ValueId>> {
        let callee = func.unparen();
        if let ExprKind::Ident(_) = callee.kind {
            if let Some(sym) = self.info.use_of(callee.id) {
                match self.info.symbols.get(sym).kind {
                    SymbolKind::TypeName => {
                        let target = self.info.symbols.get(sym).typ;
                        return self.conversion(e, target, args).map(Some);
                    }
                    SymbolKind::Function => return self.static_call(e, sym, args),
                    _ => {}
                }
            }
        }
        Err(self.unimplemented(e.pos, "indirect call"))
    }

    fn conversion(&mut self, e: &Expr, target: TypeId, args: &[Expr]) -> Result<ValueId> {
        let [arg] = args else {
            return Err(self.invariant(e.pos, "conversion takes one argument"));
        };
        if self.types.is_array(target) {
            return Err(self.unimplemented(
                e.pos,
                format!("conversion to array type {}", self.types.name(target)),
            ));
        }
        let from = self.info.type_of(arg);
        let v = self.expr(arg)?;
        if from == target {
            return Ok(v);
        }
        let b = self.ensure_block();
        Ok(self.f.new_value(b, Op::Convert, target, e.pos, &[v]))
    }

    /// Arguments go to the outgoing argument area at SP, the result comes
    /// back from its slot there
    fn static_call(&mut self, e: &Expr, sym: SymbolId, args: &[Expr]) -> Result<Option<ValueId>> {
        let s = self.info.symbols.get(sym);
        let name = self.name(s.name).to_string();
        let sig = self.types.get(s.typ).clone();
        if sig.results.len() > 1 {
            return Err(self.unimplemented(
                e.pos,
                format!("call to multi-result function {}", name),
            ));
        }
        let (poffs, roffs, size) = arg_layout(&self.types, &sig.params, &sig.results);

        let mut vals = Vec::with_capacity(args.len());
        for a in args {
            vals.push(self.expr(a)?);
        }
        for ((&v, &pt), &off) in vals.iter().zip(&sig.params).zip(&poffs) {
            let ptr = self.types.pointer_to(pt);
            let b = self.ensure_block();
            let slot = self
                .f
                .new_value_int(b, Op::OffPtr, ptr, e.pos, off, &[self.sp]);
            self.store(slot, v, pt, e.pos)?;
        }

        let mem = self.mem(e.pos)?;
        let b = self.ensure_block();
        let call = self.f.new_value_int_aux(
            b,
            Op::StaticCall,
            TypeId::MEM,
            e.pos,
            size,
            Aux::Extern(ExternSymbol { name }),
            &[mem],
        );
        self.set_mem(call);

        let (Some(&rt), Some(&roff)) = (sig.results.first(), roffs.first()) else {
            return Ok(None);
        };
        let ptr = self.types.pointer_to(rt);
        let b = self.ensure_block();
        let slot = self
            .f
            .new_value_int(b, Op::OffPtr, ptr, e.pos, roff, &[self.sp]);
        let v = if self.types.is_array(rt) {
            self.copy_to_temp(slot, rt, e.pos)?
        } else {
            self.load(slot, rt, e.pos)?
        };
        Ok(Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_int() {
        assert_eq!(wrap_int(255, 1, false), -1);
        assert_eq!(wrap_int(255, 1, true), 255);
        assert_eq!(wrap_int(-1, 8, true), -1);
        assert_eq!(wrap_int(1 << 40, 4, false), 0);
        assert_eq!(wrap_int(-128, 1, false), -128);
    }

    #[test]
    fn test_const_fold() {
        let pos = Position::new(0, 1, 1);
        let lit = |v| Expr {
            id: crate::parse::ast::NodeId(0),
            kind: ExprKind::IntLit(v),
            pos,
        };
        let e = Expr {
            id: crate::parse::ast::NodeId(1),
            kind: ExprKind::Binary {
                op: BinaryOp::Shl,
                left: Box::new(lit(1)),
                right: Box::new(lit(10)),
            },
            pos,
        };
        assert!(matches!(Const::fold(&e), Some(Const::Int(1024))));

        let div = Expr {
            id: crate::parse::ast::NodeId(2),
            kind: ExprKind::Binary {
                op: BinaryOp::Div,
                left: Box::new(lit(7)),
                right: Box::new(lit(2)),
            },
            pos,
        };
        assert!(matches!(Const::fold(&div), Some(Const::Int(3))));
    }
}

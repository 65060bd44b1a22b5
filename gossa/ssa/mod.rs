//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// SSA backend for gossa
//
// Values are defined exactly once and live in the block that computes
// them. Side-effecting values take the current memory state as an
// argument and produce the next one, which totally orders them along any
// control path. Phi arguments line up with the owning block's
// predecessor list by index.
//

pub mod compile;
pub mod config;
mod copyelim;
mod deadcode;
mod phielim;
mod verify;

pub use compile::compile;
pub use config::{Arch, Config, Frontend, TypeSource};

use crate::diag::Position;
use crate::types::{TypeId, TypeTable};
use std::collections::HashMap;
use std::fmt;

const DEFAULT_VALUE_CAPACITY: usize = 256;
const DEFAULT_BLOCK_CAPACITY: usize = 32;
const DEFAULT_EDGE_CAPACITY: usize = 2;

// ============================================================================
// Identifiers
// ============================================================================

/// Block identifier, numbered from 1 in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Value identifier, numbered from 1 in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Removed by a pass; never appears in a block
    Invalid,

    // Function entry pseudo-values
    InitMem,
    SP,
    SB,
    Arg,

    // Joins and their leftovers
    Phi,
    Copy,
    /// Value of a variable read in statically dead code
    Unknown,

    // Constants
    ConstBool,
    ConstInt,
    ConstFloat,
    ConstNil,

    // Addresses
    Addr,
    OffPtr,
    PtrIndex,

    // Memory
    Load,
    Store,
    Move,
    Zero,
    VarDef,
    StaticCall,

    // Integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    DivU,
    Mod,
    ModU,
    And,
    Or,
    Xor,
    AndNot,
    Lsh,
    Rsh,
    RshU,
    Neg,
    Com,
    Not,

    // Floating point arithmetic
    AddF,
    SubF,
    MulF,
    DivF,
    NegF,

    // Comparisons
    Eq,
    Neq,
    Less,
    LessU,
    Leq,
    LeqU,
    EqF,
    NeqF,
    LessF,
    LeqF,

    Convert,
    StringMake,
}

impl Op {
    /// Values that must stay even when nothing uses their result
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Op::Store | Op::Move | Op::Zero | Op::VarDef | Op::StaticCall
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Invalid => "Invalid",
            Op::InitMem => "InitMem",
            Op::SP => "SP",
            Op::SB => "SB",
            Op::Arg => "Arg",
            Op::Phi => "Phi",
            Op::Copy => "Copy",
            Op::Unknown => "Unknown",
            Op::ConstBool => "ConstBool",
            Op::ConstInt => "ConstInt",
            Op::ConstFloat => "ConstFloat",
            Op::ConstNil => "ConstNil",
            Op::Addr => "Addr",
            Op::OffPtr => "OffPtr",
            Op::PtrIndex => "PtrIndex",
            Op::Load => "Load",
            Op::Store => "Store",
            Op::Move => "Move",
            Op::Zero => "Zero",
            Op::VarDef => "VarDef",
            Op::StaticCall => "StaticCall",
            Op::Add => "Add",
            Op::Sub => "Sub",
            Op::Mul => "Mul",
            Op::Div => "Div",
            Op::DivU => "DivU",
            Op::Mod => "Mod",
            Op::ModU => "ModU",
            Op::And => "And",
            Op::Or => "Or",
            Op::Xor => "Xor",
            Op::AndNot => "AndNot",
            Op::Lsh => "Lsh",
            Op::Rsh => "Rsh",
            Op::RshU => "RshU",
            Op::Neg => "Neg",
            Op::Com => "Com",
            Op::Not => "Not",
            Op::AddF => "AddF",
            Op::SubF => "SubF",
            Op::MulF => "MulF",
            Op::DivF => "DivF",
            Op::NegF => "NegF",
            Op::Eq => "Eq",
            Op::Neq => "Neq",
            Op::Less => "Less",
            Op::LessU => "LessU",
            Op::Leq => "Leq",
            Op::LeqU => "LeqU",
            Op::EqF => "EqF",
            Op::NeqF => "NeqF",
            Op::LessF => "LessF",
            Op::LeqF => "LeqF",
            Op::Convert => "Convert",
            Op::StringMake => "StringMake",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// Incoming argument or result slot, addressed relative to SP
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgSymbol {
    pub name: String,
    pub typ: TypeId,
    pub offset: i64,
}

/// Stack-allocated local
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AutoSymbol {
    pub name: String,
    pub typ: TypeId,
}

/// Package-level symbol, addressed relative to SB
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternSymbol {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Aux {
    #[default]
    None,
    Arg(ArgSymbol),
    Auto(AutoSymbol),
    Extern(ExternSymbol),
}

impl fmt::Display for Aux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aux::None => Ok(()),
            Aux::Arg(a) => write!(f, "{}", a.name),
            Aux::Auto(a) => write!(f, "{}", a.name),
            Aux::Extern(e) => write!(f, "{}", e.name),
        }
    }
}

// ============================================================================
// Value
// ============================================================================

#[derive(Debug, Clone)]
pub struct Value {
    pub id: ValueId,
    pub op: Op,
    pub typ: TypeId,
    /// Constant payload: integer value, float bits, sizes, offsets
    pub aux_int: i64,
    pub aux: Aux,
    pub args: Vec<ValueId>,
    pub block: BlockId,
    pub pos: Position,
}

impl Value {
    pub fn float_value(&self) -> f64 {
        f64::from_bits(self.aux_int as u64)
    }
}

// ============================================================================
// Block
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Not ended yet
    Invalid,
    /// Unconditional transfer to the single successor
    Plain,
    /// Control is a bool; successors are [then, else]
    If,
    /// Function exit; control is the final memory state
    Ret,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockKind::Invalid => "Invalid",
            BlockKind::Plain => "Plain",
            BlockKind::If => "If",
            BlockKind::Ret => "Ret",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub values: Vec<ValueId>,
    pub control: Option<ValueId>,
    pub succs: Vec<BlockId>,
    pub preds: Vec<BlockId>,
}

impl Block {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            kind: BlockKind::Invalid,
            values: Vec::new(),
            control: None,
            succs: Vec::with_capacity(DEFAULT_EDGE_CAPACITY),
            preds: Vec::with_capacity(DEFAULT_EDGE_CAPACITY),
        }
    }
}

// ============================================================================
// Func
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ConstKey {
    op: Op,
    typ: TypeId,
    aux_int: i64,
}

/// A function under construction or compiled
#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    /// Declared parameters in signature order
    pub params: Vec<(String, TypeId)>,
    pub entry: BlockId,
    /// Block storage indexed by id; see `order` for the live blocks
    blocks: Vec<Block>,
    /// Live blocks in layout order
    order: Vec<BlockId>,
    values: Vec<Value>,
    constants: HashMap<ConstKey, ValueId>,
}

impl Func {
    pub fn new(name: impl Into<String>, params: Vec<(String, TypeId)>) -> Self {
        Self {
            name: name.into(),
            params,
            entry: BlockId(1),
            blocks: Vec::with_capacity(DEFAULT_BLOCK_CAPACITY),
            order: Vec::with_capacity(DEFAULT_BLOCK_CAPACITY),
            values: Vec::with_capacity(DEFAULT_VALUE_CAPACITY),
            constants: HashMap::new(),
        }
    }

    /// Allocate a block; the first one allocated is the entry block
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32 + 1);
        self.blocks.push(Block::new(id));
        self.order.push(id);
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Live blocks in layout order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.order.iter().map(|&id| &self.blocks[id.index()])
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.order.clone()
    }

    pub fn num_blocks(&self) -> usize {
        self.order.len()
    }

    pub fn is_live_block(&self, id: BlockId) -> bool {
        self.order.contains(&id)
    }

    /// Number of values ever created, dead ones included
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    /// Live values of a block in order
    pub fn block_values(&self, id: BlockId) -> impl Iterator<Item = &Value> {
        self.block(id).values.iter().map(|&v| self.value(v))
    }

    /// All live values, block by block
    pub fn live_values(&self) -> impl Iterator<Item = &Value> {
        self.blocks()
            .flat_map(|b| b.values.iter().map(|&v| &self.values[v.index()]))
    }

    // ------------------------------------------------------------------------
    // Construction primitives
    // ------------------------------------------------------------------------

    /// General N-argument value
    pub fn new_value(
        &mut self,
        block: BlockId,
        op: Op,
        typ: TypeId,
        pos: Position,
        args: &[ValueId],
    ) -> ValueId {
        self.push_value(block, op, typ, pos, 0, Aux::None, args)
    }

    /// Value carrying a symbol
    pub fn new_value_aux(
        &mut self,
        block: BlockId,
        op: Op,
        typ: TypeId,
        pos: Position,
        aux: Aux,
        args: &[ValueId],
    ) -> ValueId {
        self.push_value(block, op, typ, pos, 0, aux, args)
    }

    /// Value carrying an integer payload
    pub fn new_value_int(
        &mut self,
        block: BlockId,
        op: Op,
        typ: TypeId,
        pos: Position,
        aux_int: i64,
        args: &[ValueId],
    ) -> ValueId {
        self.push_value(block, op, typ, pos, aux_int, Aux::None, args)
    }

    /// Value carrying both an integer payload and a symbol
    #[allow(clippy::too_many_arguments)]
    pub fn new_value_int_aux(
        &mut self,
        block: BlockId,
        op: Op,
        typ: TypeId,
        pos: Position,
        aux_int: i64,
        aux: Aux,
        args: &[ValueId],
    ) -> ValueId {
        self.push_value(block, op, typ, pos, aux_int, aux, args)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_value(
        &mut self,
        block: BlockId,
        op: Op,
        typ: TypeId,
        pos: Position,
        aux_int: i64,
        aux: Aux,
        args: &[ValueId],
    ) -> ValueId {
        let id = ValueId(self.values.len() as u32 + 1);
        self.values.push(Value {
            id,
            op,
            typ,
            aux_int,
            aux,
            args: args.to_vec(),
            block,
            pos,
        });
        self.block_mut(block).values.push(id);
        id
    }

    /// Append a phi argument
    pub fn add_arg(&mut self, v: ValueId, arg: ValueId) {
        self.value_mut(v).args.push(arg);
    }

    /// Add a control-flow edge; successor order is significant for If blocks
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs.push(to);
        self.block_mut(to).preds.push(from);
    }

    /// Set how a block ends
    pub fn set_control(&mut self, block: BlockId, kind: BlockKind, control: Option<ValueId>) {
        let b = self.block_mut(block);
        b.kind = kind;
        b.control = control;
    }

    fn constant(&mut self, op: Op, typ: TypeId, aux_int: i64, pos: Position) -> ValueId {
        let key = ConstKey { op, typ, aux_int };
        if let Some(&v) = self.constants.get(&key) {
            if self.value(v).op == op {
                return v;
            }
        }
        let entry = self.entry;
        let v = self.new_value_int(entry, op, typ, pos, aux_int, &[]);
        self.constants.insert(key, v);
        v
    }

    /// Integer constant, shared through the entry block
    pub fn const_int(&mut self, typ: TypeId, v: i64, pos: Position) -> ValueId {
        self.constant(Op::ConstInt, typ, v, pos)
    }

    pub fn const_bool(&mut self, v: bool, pos: Position) -> ValueId {
        self.constant(Op::ConstBool, TypeId::BOOL, i64::from(v), pos)
    }

    pub fn const_float(&mut self, typ: TypeId, v: f64, pos: Position) -> ValueId {
        self.constant(Op::ConstFloat, typ, v.to_bits() as i64, pos)
    }

    pub fn const_nil(&mut self, typ: TypeId, pos: Position) -> ValueId {
        self.constant(Op::ConstNil, typ, 0, pos)
    }

    // ------------------------------------------------------------------------
    // Editing, used by passes
    // ------------------------------------------------------------------------

    /// Drop blocks outside `keep` from the layout
    fn retain_blocks(&mut self, keep: impl Fn(BlockId) -> bool) {
        self.order.retain(|&id| keep(id));
    }

    /// Remove a value from its block and mark it dead
    fn remove_value(&mut self, id: ValueId) {
        let block = self.value(id).block;
        self.block_mut(block).values.retain(|&v| v != id);
        let v = self.value_mut(id);
        v.op = Op::Invalid;
        v.args.clear();
    }

    pub fn display<'a>(&'a self, types: &'a TypeTable) -> FuncDisplay<'a> {
        FuncDisplay { func: self, types }
    }
}

// ============================================================================
// Display
// ============================================================================

/// Printable view of a function; types are rendered through the table
pub struct FuncDisplay<'a> {
    func: &'a Func,
    types: &'a TypeTable,
}

impl FuncDisplay<'_> {
    fn value(&self, f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
        write!(f, "    {} = {} <{}>", v.id, v.op, self.type_name(v.typ))?;
        match v.op {
            Op::ConstFloat => write!(f, " [{}]", v.float_value())?,
            Op::ConstBool => write!(f, " [{}]", v.aux_int != 0)?,
            _ if v.aux_int != 0 || v.op == Op::ConstInt => write!(f, " [{}]", v.aux_int)?,
            _ => {}
        }
        if v.aux != Aux::None {
            write!(f, " {{{}}}", v.aux)?;
        }
        for arg in &v.args {
            write!(f, " {}", arg)?;
        }
        writeln!(f)
    }

    fn type_name(&self, t: TypeId) -> String {
        self.types.name(t)
    }
}

impl fmt::Display for FuncDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.func;
        write!(f, "{}(", func.name)?;
        for (i, (name, typ)) in func.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", name, self.type_name(*typ))?;
        }
        writeln!(f, ")")?;

        for b in func.blocks() {
            write!(f, "  {}:", b.id)?;
            if !b.preds.is_empty() {
                write!(f, " <-")?;
                for p in &b.preds {
                    write!(f, " {}", p)?;
                }
            }
            writeln!(f)?;
            for v in func.block_values(b.id) {
                self.value(f, v)?;
            }
            write!(f, "    {}", b.kind)?;
            if let Some(c) = b.control {
                write!(f, " {}", c)?;
            }
            if !b.succs.is_empty() {
                write!(f, " ->")?;
                for s in &b.succs {
                    write!(f, " {}", s)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new(0, 1, 1)
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut f = Func::new("f", vec![]);
        let b = f.new_block();
        assert_eq!(b, BlockId(1));
        assert_eq!(f.entry, b);
        let v = f.new_value(b, Op::InitMem, TypeId::MEM, pos(), &[]);
        assert_eq!(v, ValueId(1));
        assert_eq!(f.value(v).block, b);
    }

    #[test]
    fn test_edges_and_control() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let b2 = f.new_block();
        let b3 = f.new_block();
        let c = f.const_bool(true, pos());
        f.set_control(b1, BlockKind::If, Some(c));
        f.add_edge(b1, b2);
        f.add_edge(b1, b3);
        assert_eq!(f.block(b1).succs, vec![b2, b3]);
        assert_eq!(f.block(b3).preds, vec![b1]);
        assert_eq!(f.block(b1).kind, BlockKind::If);
    }

    #[test]
    fn test_constants_are_shared() {
        let mut f = Func::new("f", vec![]);
        let b1 = f.new_block();
        let _b2 = f.new_block();
        let c1 = f.const_int(TypeId::INT, 7, pos());
        let c2 = f.const_int(TypeId::INT, 7, pos());
        let c3 = f.const_int(TypeId::INT64, 7, pos());
        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
        assert_eq!(f.value(c1).block, b1);
        let half = f.const_float(TypeId::FLOAT64, 0.5, pos());
        assert_eq!(f.value(half).float_value(), 0.5);
    }

    #[test]
    fn test_display() {
        let types = TypeTable::new();
        let mut f = Func::new("f", vec![("x".to_string(), TypeId::INT)]);
        let b1 = f.new_block();
        let mem = f.new_value(b1, Op::InitMem, TypeId::MEM, pos(), &[]);
        let sp = f.new_value(b1, Op::SP, TypeId::UINTPTR, pos(), &[]);
        let aux = Aux::Arg(ArgSymbol {
            name: "x".to_string(),
            typ: TypeId::INT,
            offset: 0,
        });
        f.new_value_aux(b1, Op::Addr, TypeId::BYTE_PTR, pos(), aux, &[sp]);
        f.set_control(b1, BlockKind::Ret, Some(mem));

        let out = f.display(&types).to_string();
        assert_eq!(
            out,
            "f(x int)\n  b1:\n    v1 = InitMem <mem>\n    v2 = SP <uintptr>\n    v3 = Addr <*uint8> {x} v2\n    Ret v1\n"
        );
    }
}

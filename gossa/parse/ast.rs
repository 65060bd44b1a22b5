//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Abstract Syntax Tree for gossa
// Untyped Go syntax tree; types live in check::Info keyed by NodeId
//

use crate::diag::Position;
use crate::strings::StringId;

/// Identity of a syntax node, unique within one SourceFile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// +x
    Plus,
    /// -x
    Neg,
    /// !x
    Not,
    /// ^x
    Com,
    /// &x
    AddrOf,
    /// *x
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogAnd | BinaryOp::LogOr)
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    /// Go operator precedence (5 binds tightest)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
            | BinaryOp::AndNot => 5,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::LogAnd => 2,
            BinaryOp::LogOr => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// =
    Assign,
    /// op=
    Compound(BinaryOp),
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(StringId),
    IntLit(u64),
    FloatLit(f64),
    /// Rune literal, typed as int32
    CharLit(u32),
    StringLit(String),
    BoolLit(bool),
    Nil,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function call or conversion `T(x)`
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Paren(Box<Expr>),
}

impl Expr {
    /// Strip redundant parentheses
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    /// Name if this is a (possibly parenthesized) identifier
    pub fn as_ident(&self) -> Option<StringId> {
        match &self.unparen().kind {
            ExprKind::Ident(name) => Some(*name),
            _ => None,
        }
    }

    /// True for expressions built only from untyped literals
    pub fn is_untyped_const(&self) -> bool {
        match &self.kind {
            ExprKind::IntLit(_) | ExprKind::FloatLit(_) | ExprKind::CharLit(_) => true,
            ExprKind::Paren(inner) => inner.is_untyped_const(),
            ExprKind::Unary { op, operand } => {
                matches!(op, UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Com)
                    && operand.is_untyped_const()
            }
            ExprKind::Binary { op, left, right } => {
                !op.is_comparison()
                    && !op.is_logical()
                    && left.is_untyped_const()
                    && right.is_untyped_const()
            }
            _ => false,
        }
    }
}

// ============================================================================
// Type expressions
// ============================================================================

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Name(StringId, Position),
    Pointer(Box<TypeExpr>),
    Array(u64, Box<TypeExpr>),
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    pub id: NodeId,
    pub name: StringId,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct VarSpec {
    pub names: Vec<Ident>,
    pub typ: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub pos: Position,
}

/// A `{ ... }` block; its id names the scope it opens
#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct CaseClause {
    pub id: NodeId,
    /// Empty for the default clause
    pub exprs: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Empty,
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    /// `a, b := x, y`
    Define {
        names: Vec<Ident>,
        values: Vec<Expr>,
    },
    Var(Vec<VarSpec>),
    IncDec {
        target: Expr,
        inc: bool,
    },
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        /// Either a Block or another If
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    Labeled {
        label: Ident,
        stmt: Box<Stmt>,
    },
    Goto(Ident),
    Break(Option<Ident>),
    Continue(Option<Ident>),
    Fallthrough,
    Return(Vec<Expr>),
    Go(Expr),
    Defer(Expr),
}

impl StmtKind {
    /// Short description used in diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Empty => "empty statement",
            StmtKind::Expr(_) => "expression statement",
            StmtKind::Assign { .. } => "assignment",
            StmtKind::Define { .. } => "short variable declaration",
            StmtKind::Var(_) => "var declaration",
            StmtKind::IncDec { .. } => "inc/dec statement",
            StmtKind::Block(_) => "block",
            StmtKind::If { .. } => "if statement",
            StmtKind::For { .. } => "for statement",
            StmtKind::Switch { .. } => "switch statement",
            StmtKind::Labeled { .. } => "labeled statement",
            StmtKind::Goto(_) => "goto statement",
            StmtKind::Break(_) => "break statement",
            StmtKind::Continue(_) => "continue statement",
            StmtKind::Fallthrough => "fallthrough statement",
            StmtKind::Return(_) => "return statement",
            StmtKind::Go(_) => "go statement",
            StmtKind::Defer(_) => "defer statement",
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Option<Ident>,
    pub typ: TypeExpr,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Ident,
    pub recv: Option<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Option<Block>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Var(VarSpec),
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub package: Ident,
    pub imports: Vec<(String, Position)>,
    pub decls: Vec<Decl>,
}

impl SourceFile {
    /// Find a top-level function declaration by name
    pub fn func_decl(&self, name: StringId) -> Option<&FuncDecl> {
        self.decls.iter().find_map(|d| match d {
            Decl::Func(f) if f.name.name == name => Some(f),
            _ => None,
        })
    }
}

// ============================================================================
// Terminating statements
// ============================================================================
//
// Go's definition of a terminating statement: control never flows past it
// to the following statement.

/// Does the statement list end in a terminating statement?
pub fn list_is_terminating(stmts: &[Stmt]) -> bool {
    stmts
        .iter()
        .rev()
        .find(|s| !matches!(s.kind, StmtKind::Empty))
        .is_some_and(is_terminating)
}

pub fn is_terminating(stmt: &Stmt) -> bool {
    is_terminating_labeled(stmt, None)
}

/// Terminating check for a statement carrying `label`, so that
/// `break label` inside it counts as leaving it
pub fn is_terminating_labeled(stmt: &Stmt, label: Option<StringId>) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Goto(_) => true,
        StmtKind::Block(b) => list_is_terminating(&b.stmts),
        StmtKind::If {
            then,
            els: Some(els),
            ..
        } => list_is_terminating(&then.stmts) && is_terminating(els),
        StmtKind::For {
            cond: None, body, ..
        } => !has_break(&body.stmts, label),
        StmtKind::Switch { clauses, .. } => {
            clauses.iter().any(|c| c.is_default)
                && clauses.iter().all(|c| {
                    !has_break(&c.body, label)
                        && (list_is_terminating(&c.body)
                            || matches!(
                                c.body.last().map(|s| &s.kind),
                                Some(StmtKind::Fallthrough)
                            ))
                })
        }
        StmtKind::Labeled { label, stmt } => is_terminating_labeled(stmt, Some(label.name)),
        _ => false,
    }
}

/// Does the statement list contain a `break` that leaves the enclosing
/// loop or switch: an unlabeled break not nested in another breakable
/// statement, or `break label` anywhere.
pub fn has_break(stmts: &[Stmt], label: Option<StringId>) -> bool {
    stmts.iter().any(|s| stmt_has_break(s, label, true))
}

fn stmt_has_break(stmt: &Stmt, label: Option<StringId>, top: bool) -> bool {
    let list = |stmts: &[Stmt], top: bool| stmts.iter().any(|s| stmt_has_break(s, label, top));
    match &stmt.kind {
        StmtKind::Break(None) => top,
        StmtKind::Break(Some(l)) => Some(l.name) == label,
        StmtKind::Block(b) => list(&b.stmts, top),
        StmtKind::If { then, els, .. } => {
            list(&then.stmts, top) || els.as_ref().is_some_and(|e| stmt_has_break(e, label, top))
        }
        StmtKind::Labeled { stmt, .. } => stmt_has_break(stmt, label, top),
        StmtKind::For { body, .. } => list(&body.stmts, false),
        StmtKind::Switch { clauses, .. } => clauses.iter().any(|c| list(&c.body, false)),
        _ => false,
    }
}

// ============================================================================
// Fallthrough
// ============================================================================
//
// Stricter than the terminating rules: any jump ends the flow, so a list
// ending in `break` or `continue` does not reach the next statement either.

/// Can control leave the statement list at its end?
pub fn list_falls_through(stmts: &[Stmt]) -> bool {
    stmts
        .iter()
        .rev()
        .find(|s| !matches!(s.kind, StmtKind::Empty))
        .map_or(true, falls_through)
}

pub fn falls_through(stmt: &Stmt) -> bool {
    falls_through_labeled(stmt, None)
}

/// Can control reach the statement after `stmt`, which carries `label`?
pub fn falls_through_labeled(stmt: &Stmt, label: Option<StringId>) -> bool {
    match &stmt.kind {
        StmtKind::Return(_)
        | StmtKind::Goto(_)
        | StmtKind::Break(_)
        | StmtKind::Continue(_)
        | StmtKind::Fallthrough => false,
        StmtKind::Block(b) => list_falls_through(&b.stmts),
        StmtKind::If {
            then,
            els: Some(els),
            ..
        } => list_falls_through(&then.stmts) || falls_through(els),
        StmtKind::For {
            cond: None, body, ..
        } => has_break(&body.stmts, label),
        StmtKind::Switch { clauses, .. } => {
            !clauses.iter().any(|c| c.is_default)
                || clauses
                    .iter()
                    .any(|c| has_break(&c.body, label) || list_falls_through(&c.body))
        }
        StmtKind::Labeled { label, stmt } => falls_through_labeled(stmt, Some(label.name)),
        _ => true,
    }
}

/// Does the loop body contain a `continue` for this loop: an unlabeled
/// continue not nested in another loop, or `continue label` anywhere.
pub fn has_continue(stmts: &[Stmt], label: Option<StringId>) -> bool {
    stmts.iter().any(|s| stmt_has_continue(s, label, true))
}

fn stmt_has_continue(stmt: &Stmt, label: Option<StringId>, top: bool) -> bool {
    let list = |stmts: &[Stmt], top: bool| stmts.iter().any(|s| stmt_has_continue(s, label, top));
    match &stmt.kind {
        StmtKind::Continue(None) => top,
        StmtKind::Continue(Some(l)) => Some(l.name) == label,
        StmtKind::Block(b) => list(&b.stmts, top),
        StmtKind::If { then, els, .. } => {
            list(&then.stmts, top)
                || els.as_ref().is_some_and(|e| stmt_has_continue(e, label, top))
        }
        StmtKind::Labeled { stmt, .. } => stmt_has_continue(stmt, label, top),
        StmtKind::For { body, .. } => list(&body.stmts, false),
        StmtKind::Switch { clauses, .. } => clauses.iter().any(|c| list(&c.body, top)),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Symbol table for gossa
// Scope-aware symbol management following Go's block scoping
//

use crate::diag::Position;
use crate::strings::StringId;
use crate::types::TypeId;
use std::collections::HashMap;

// ============================================================================
// Symbol ID
// ============================================================================

/// Unique identifier for a symbol in the symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

// ============================================================================
// Symbol Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Predeclared type name (int, bool, ...)
    TypeName,
    /// Package-level variable
    Global,
    /// Package-level function
    Function,
    /// Function parameter
    Parameter,
    /// Named or synthesized function result
    Result,
    /// Variable declared inside a function body
    Local,
}

// ============================================================================
// Symbol
// ============================================================================

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: StringId,
    pub kind: SymbolKind,
    pub typ: TypeId,
    pub pos: Position,
    /// Scope depth where this symbol was declared
    pub scope_depth: u32,
    /// The address of this variable is taken somewhere (`&x`)
    pub addr_taken: bool,
}

impl Symbol {
    pub fn new(name: StringId, kind: SymbolKind, typ: TypeId, pos: Position) -> Self {
        Self {
            name,
            kind,
            typ,
            pos,
            scope_depth: 0,
            addr_taken: false,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Global | SymbolKind::Parameter | SymbolKind::Result | SymbolKind::Local
        )
    }
}

// ============================================================================
// Scope
// ============================================================================

#[derive(Debug)]
struct Scope {
    symbols: Vec<SymbolId>,
    parent: Option<u32>,
}

impl Scope {
    fn new(parent: Option<u32>) -> Self {
        Self {
            symbols: Vec::new(),
            parent,
        }
    }
}

// ============================================================================
// Symbol Table
// ============================================================================

/// Scope-aware symbol table
///
/// Depth 0 holds the predeclared names and depth 1 the package. A function's
/// parameters share depth 2 with the top level of its body; nested blocks
/// go deeper.
pub struct SymbolTable {
    /// All symbols ever declared (indexed by SymbolId); never removed
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    current_scope: u32,
    scope_depth: u32,
    /// Visible symbols by name, innermost first
    name_map: HashMap<StringId, Vec<SymbolId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            scopes: vec![Scope::new(None)],
            current_scope: 0,
            scope_depth: 0,
            name_map: HashMap::new(),
        }
    }

    pub fn enter_scope(&mut self) {
        let new_scope_id = self.scopes.len() as u32;
        self.scopes.push(Scope::new(Some(self.current_scope)));
        self.current_scope = new_scope_id;
        self.scope_depth += 1;
    }

    /// Leave the current scope; its symbols stop being visible
    pub fn leave_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current_scope as usize].parent {
            let scope = &self.scopes[self.current_scope as usize];
            for &sym_id in &scope.symbols {
                let name = self.symbols[sym_id.0 as usize].name;
                if let Some(ids) = self.name_map.get_mut(&name) {
                    ids.retain(|&id| id != sym_id);
                    if ids.is_empty() {
                        self.name_map.remove(&name);
                    }
                }
            }
            self.current_scope = parent;
            self.scope_depth -= 1;
        }
    }

    pub fn depth(&self) -> u32 {
        self.scope_depth
    }

    /// Declare a symbol in the current scope
    pub fn declare(&mut self, mut sym: Symbol) -> Result<SymbolId, SymbolError> {
        sym.scope_depth = self.scope_depth;

        if let Some(existing) = self.lookup_id(sym.name) {
            let prev = &self.symbols[existing.0 as usize];
            if prev.scope_depth == self.scope_depth {
                return Err(SymbolError::Redeclared {
                    name: sym.name,
                    prev: prev.pos,
                });
            }
        }

        let id = SymbolId(self.symbols.len() as u32);
        let name = sym.name;
        self.symbols.push(sym);
        self.scopes[self.current_scope as usize].symbols.push(id);
        self.name_map.entry(name).or_default().insert(0, id);
        Ok(id)
    }

    /// Is `name` declared in the current (innermost) scope?
    pub fn declared_here(&self, name: StringId) -> bool {
        self.lookup_id(name)
            .is_some_and(|id| self.symbols[id.0 as usize].scope_depth == self.scope_depth)
    }

    /// Look up a visible symbol, innermost scope first
    pub fn lookup_id(&self, name: StringId) -> Option<SymbolId> {
        self.name_map.get(&name).and_then(|ids| ids.first().copied())
    }

    pub fn lookup(&self, name: StringId) -> Option<&Symbol> {
        self.lookup_id(name).map(|id| &self.symbols[id.0 as usize])
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolError {
    /// Name already declared in the same scope
    Redeclared { name: StringId, prev: Position },
}

impl std::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolError::Redeclared { name, prev } => {
                write!(f, "{} redeclared in this block (previous declaration at {})", name, prev)
            }
        }
    }
}

impl std::error::Error for SymbolError {}

// ============================================================================
// Tests
// ============================================================================

//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Type system for gossa
//
// Types are interned in a TypeTable and referenced by TypeId. The basic Go
// types and the SSA memory type are pre-interned at fixed ids so that the
// SSA backend can compare against them without holding the table.
//

use std::collections::HashMap;
use std::fmt;

/// Pointer size in bytes for the supported 64-bit targets
pub const PTR_SIZE: u64 = 8;

// ============================================================================
// TypeId
// ============================================================================

/// Interned type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const INVALID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT8: TypeId = TypeId(2);
    pub const INT16: TypeId = TypeId(3);
    pub const INT32: TypeId = TypeId(4);
    pub const INT64: TypeId = TypeId(5);
    pub const INT: TypeId = TypeId(6);
    pub const UINT8: TypeId = TypeId(7);
    pub const UINT16: TypeId = TypeId(8);
    pub const UINT32: TypeId = TypeId(9);
    pub const UINT64: TypeId = TypeId(10);
    pub const UINT: TypeId = TypeId(11);
    pub const UINTPTR: TypeId = TypeId(12);
    pub const FLOAT32: TypeId = TypeId(13);
    pub const FLOAT64: TypeId = TypeId(14);
    pub const STRING: TypeId = TypeId(15);
    /// SSA memory state
    pub const MEM: TypeId = TypeId(16);
    /// `*uint8`
    pub const BYTE_PTR: TypeId = TypeId(17);
}

// ============================================================================
// Type Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Invalid,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint,
    Uintptr,
    Float32,
    Float64,
    String,
    Mem,
    Pointer,
    Array,
    Func,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Invalid => "invalid type",
            TypeKind::Bool => "bool",
            TypeKind::Int8 => "int8",
            TypeKind::Int16 => "int16",
            TypeKind::Int32 => "int32",
            TypeKind::Int64 => "int64",
            TypeKind::Int => "int",
            TypeKind::Uint8 => "uint8",
            TypeKind::Uint16 => "uint16",
            TypeKind::Uint32 => "uint32",
            TypeKind::Uint64 => "uint64",
            TypeKind::Uint => "uint",
            TypeKind::Uintptr => "uintptr",
            TypeKind::Float32 => "float32",
            TypeKind::Float64 => "float64",
            TypeKind::String => "string",
            TypeKind::Mem => "mem",
            TypeKind::Pointer => "pointer",
            TypeKind::Array => "array",
            TypeKind::Func => "func",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Type Representation
// ============================================================================

/// A Go type. Composite types refer to their components by TypeId.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: TypeKind,
    /// Pointee for pointers, element for arrays
    pub elem: Option<TypeId>,
    /// Array length
    pub len: u64,
    /// Parameter types for functions
    pub params: Vec<TypeId>,
    /// Result types for functions
    pub results: Vec<TypeId>,
}

impl Type {
    pub fn basic(kind: TypeKind) -> Self {
        Self {
            kind,
            elem: None,
            len: 0,
            params: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn pointer(elem: TypeId) -> Self {
        Self {
            elem: Some(elem),
            ..Self::basic(TypeKind::Pointer)
        }
    }

    pub fn array(elem: TypeId, len: u64) -> Self {
        Self {
            elem: Some(elem),
            len,
            ..Self::basic(TypeKind::Array)
        }
    }

    pub fn func(params: Vec<TypeId>, results: Vec<TypeId>) -> Self {
        Self {
            params,
            results,
            ..Self::basic(TypeKind::Func)
        }
    }
}

// ============================================================================
// TypeTable
// ============================================================================

/// Type interner
#[derive(Clone)]
pub struct TypeTable {
    types: Vec<Type>,
    map: HashMap<Type, TypeId>,
}

const BASIC_KINDS: [TypeKind; 17] = [
    TypeKind::Invalid,
    TypeKind::Bool,
    TypeKind::Int8,
    TypeKind::Int16,
    TypeKind::Int32,
    TypeKind::Int64,
    TypeKind::Int,
    TypeKind::Uint8,
    TypeKind::Uint16,
    TypeKind::Uint32,
    TypeKind::Uint64,
    TypeKind::Uint,
    TypeKind::Uintptr,
    TypeKind::Float32,
    TypeKind::Float64,
    TypeKind::String,
    TypeKind::Mem,
];

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::with_capacity(64),
            map: HashMap::new(),
        };
        for kind in BASIC_KINDS {
            table.intern(Type::basic(kind));
        }
        let byte_ptr = table.pointer_to(TypeId::UINT8);
        debug_assert_eq!(byte_ptr, TypeId::BYTE_PTR);
        table
    }

    /// Intern a type, returning the existing id for an identical type
    pub fn intern(&mut self, typ: Type) -> TypeId {
        if let Some(&id) = self.map.get(&typ) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(typ.clone());
        self.map.insert(typ, id);
        id
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::pointer(elem))
    }

    pub fn array_of(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(Type::array(elem, len))
    }

    pub fn func(&mut self, params: Vec<TypeId>, results: Vec<TypeId>) -> TypeId {
        self.intern(Type::func(params, results))
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.get(id).kind
    }

    /// Pointee or element type
    pub fn elem(&self, id: TypeId) -> Option<TypeId> {
        self.get(id).elem
    }

    /// Look up a predeclared type name
    pub fn basic_by_name(name: &str) -> Option<TypeId> {
        let id = match name {
            "bool" => TypeId::BOOL,
            "int8" => TypeId::INT8,
            "int16" => TypeId::INT16,
            "int32" | "rune" => TypeId::INT32,
            "int64" => TypeId::INT64,
            "int" => TypeId::INT,
            "uint8" | "byte" => TypeId::UINT8,
            "uint16" => TypeId::UINT16,
            "uint32" => TypeId::UINT32,
            "uint64" => TypeId::UINT64,
            "uint" => TypeId::UINT,
            "uintptr" => TypeId::UINTPTR,
            "float32" => TypeId::FLOAT32,
            "float64" => TypeId::FLOAT64,
            "string" => TypeId::STRING,
            _ => return None,
        };
        Some(id)
    }

    // ------------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------------

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Int
                | TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
                | TypeKind::Uint
                | TypeKind::Uintptr
        )
    }

    pub fn is_unsigned(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
                | TypeKind::Uint
                | TypeKind::Uintptr
        )
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Float32 | TypeKind::Float64)
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_integer(id) || self.is_float(id)
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        self.kind(id) == TypeKind::Bool
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        self.kind(id) == TypeKind::String
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        self.kind(id) == TypeKind::Pointer
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        self.kind(id) == TypeKind::Array
    }

    pub fn is_func(&self, id: TypeId) -> bool {
        self.kind(id) == TypeKind::Func
    }

    /// Types that fit in a single SSA value
    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.is_numeric(id) || self.is_bool(id) || self.is_pointer(id) || self.is_string(id)
    }

    /// Types that can be compared with == and !=
    pub fn is_comparable(&self, id: TypeId) -> bool {
        self.is_scalar(id)
    }

    /// Types that can be ordered with < <= > >=
    pub fn is_ordered(&self, id: TypeId) -> bool {
        self.is_numeric(id) || self.is_string(id)
    }

    // ------------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------------

    /// Size in bytes
    pub fn size(&self, id: TypeId) -> u64 {
        let typ = self.get(id);
        match typ.kind {
            TypeKind::Invalid | TypeKind::Mem => 0,
            TypeKind::Bool | TypeKind::Int8 | TypeKind::Uint8 => 1,
            TypeKind::Int16 | TypeKind::Uint16 => 2,
            TypeKind::Int32 | TypeKind::Uint32 | TypeKind::Float32 => 4,
            TypeKind::Int64
            | TypeKind::Uint64
            | TypeKind::Float64
            | TypeKind::Int
            | TypeKind::Uint
            | TypeKind::Uintptr
            | TypeKind::Pointer
            | TypeKind::Func => PTR_SIZE,
            TypeKind::String => 2 * PTR_SIZE,
            TypeKind::Array => typ.elem.map(|e| self.size(e)).unwrap_or(0) * typ.len,
        }
    }

    /// Alignment in bytes
    pub fn align(&self, id: TypeId) -> u64 {
        let typ = self.get(id);
        match typ.kind {
            TypeKind::Array => typ.elem.map(|e| self.align(e)).unwrap_or(1),
            TypeKind::String => PTR_SIZE,
            _ => self.size(id).clamp(1, PTR_SIZE),
        }
    }

    /// Render a type the way Go source spells it
    pub fn name(&self, id: TypeId) -> String {
        let typ = self.get(id);
        match typ.kind {
            TypeKind::Pointer => match typ.elem {
                Some(e) => format!("*{}", self.name(e)),
                None => "*invalid".to_string(),
            },
            TypeKind::Array => match typ.elem {
                Some(e) => format!("[{}]{}", typ.len, self.name(e)),
                None => format!("[{}]invalid", typ.len),
            },
            TypeKind::Func => {
                let params: Vec<String> = typ.params.iter().map(|&p| self.name(p)).collect();
                let mut s = format!("func({})", params.join(", "));
                match typ.results.len() {
                    0 => {}
                    1 => {
                        s.push(' ');
                        s.push_str(&self.name(typ.results[0]));
                    }
                    _ => {
                        let results: Vec<String> =
                            typ.results.iter().map(|&r| self.name(r)).collect();
                        s.push_str(&format!(" ({})", results.join(", ")));
                    }
                }
                s
            }
            kind => kind.to_string(),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeTable")
            .field("len", &self.types.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preinterned_ids() {
        let types = TypeTable::new();
        assert_eq!(types.kind(TypeId::BOOL), TypeKind::Bool);
        assert_eq!(types.kind(TypeId::INT64), TypeKind::Int64);
        assert_eq!(types.kind(TypeId::STRING), TypeKind::String);
        assert_eq!(types.kind(TypeId::MEM), TypeKind::Mem);
        assert_eq!(types.kind(TypeId::BYTE_PTR), TypeKind::Pointer);
        assert_eq!(types.elem(TypeId::BYTE_PTR), Some(TypeId::UINT8));
    }

    #[test]
    fn test_interning_dedups() {
        let mut types = TypeTable::new();
        let p1 = types.pointer_to(TypeId::INT);
        let p2 = types.pointer_to(TypeId::INT);
        assert_eq!(p1, p2);
        let a = types.array_of(TypeId::INT, 4);
        assert_ne!(a, types.array_of(TypeId::INT, 5));
    }

    #[test]
    fn test_sizes() {
        let mut types = TypeTable::new();
        assert_eq!(types.size(TypeId::BOOL), 1);
        assert_eq!(types.size(TypeId::INT16), 2);
        assert_eq!(types.size(TypeId::FLOAT32), 4);
        assert_eq!(types.size(TypeId::INT), 8);
        assert_eq!(types.size(TypeId::STRING), 16);
        let arr = types.array_of(TypeId::INT32, 3);
        assert_eq!(types.size(arr), 12);
        assert_eq!(types.align(arr), 4);
        assert_eq!(types.align(TypeId::STRING), 8);
    }

    #[test]
    fn test_classification() {
        let mut types = TypeTable::new();
        assert!(types.is_integer(TypeId::UINTPTR));
        assert!(types.is_unsigned(TypeId::UINT8));
        assert!(!types.is_unsigned(TypeId::INT8));
        assert!(types.is_float(TypeId::FLOAT64));
        let arr = types.array_of(TypeId::INT, 2);
        assert!(!types.is_scalar(arr));
        assert!(types.is_scalar(TypeId::BYTE_PTR));
    }

    #[test]
    fn test_names() {
        let mut types = TypeTable::new();
        let p = types.pointer_to(TypeId::INT);
        let a = types.array_of(p, 4);
        assert_eq!(types.name(a), "[4]*int");
        let f = types.func(vec![TypeId::INT, TypeId::BOOL], vec![TypeId::STRING]);
        assert_eq!(types.name(f), "func(int, bool) string");
        let g = types.func(vec![], vec![TypeId::INT, TypeId::INT]);
        assert_eq!(types.name(g), "func() (int, int)");
        assert_eq!(TypeTable::basic_by_name("byte"), Some(TypeId::UINT8));
        assert_eq!(TypeTable::basic_by_name("complex128"), None);
    }
}

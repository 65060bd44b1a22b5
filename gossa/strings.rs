//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// String interning for gossa
//
// Identifiers, labels and symbol names are interned once by the lexer and
// referenced everywhere else by a compact StringId. Variable and label
// bindings in the SSA builder are keyed by these ids.
//

use std::collections::HashMap;
use std::fmt;

// ============================================================================
// StringId - Unique identifier for interned strings
// ============================================================================

/// A unique identifier for an interned string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct StringId(pub u32);

impl StringId {
    /// Empty string ID (always ID 0, pre-interned)
    pub const EMPTY: StringId = StringId(0);
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// ============================================================================
// StringTable - Interned string storage
// ============================================================================

/// Default capacity for string table allocations
const DEFAULT_STRING_TABLE_CAPACITY: usize = 256;

/// String interner
///
/// - HashMap for deduplication (string -> id)
/// - Vec for reverse lookup (id -> string)
pub struct StringTable {
    map: HashMap<String, StringId>,
    strings: Vec<String>,
}

impl StringTable {
    /// Create a new string table with the empty string pre-interned
    pub fn new() -> Self {
        let mut table = Self {
            map: HashMap::with_capacity(DEFAULT_STRING_TABLE_CAPACITY),
            strings: Vec::with_capacity(DEFAULT_STRING_TABLE_CAPACITY),
        };
        let empty_id = table.intern_internal("");
        debug_assert_eq!(empty_id, StringId::EMPTY);
        table
    }

    fn intern_internal(&mut self, s: &str) -> StringId {
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.map.insert(s.to_string(), id);
        id
    }

    /// Intern a string, returning its unique ID
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        self.intern_internal(s)
    }

    /// Look up an already interned string without adding it
    pub fn lookup(&self, s: &str) -> Option<StringId> {
        self.map.get(s).copied()
    }

    /// Get the string for an ID
    ///
    /// # Panics
    /// Panics if the ID is invalid
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringTable")
            .field("len", &self.strings.len())
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
    fn test_empty_string_is_zero() {
        let table = StringTable::new();
        assert_eq!(table.get(StringId::EMPTY), "");
        assert!(table.is_empty());
    }

    #[test]
    fn test_intern_returns_same_id() {
        let mut table = StringTable::new();
        let id1 = table.intern("foo");
        let id2 = table.intern("foo");
        assert_eq!(id1, id2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_different_strings_different_ids() {
        let mut table = StringTable::new();
        let id1 = table.intern("foo");
        let id2 = table.intern("bar");
        assert_ne!(id1, id2);
        assert_eq!(table.get(id2), "bar");
    }

    #[test]
    fn test_lookup_does_not_intern() {
        let mut table = StringTable::new();
        assert_eq!(table.lookup("x"), None);
        let x = table.intern("x");
        assert_eq!(table.lookup("x"), Some(x));
    }

    #[test]
    fn test_string_id_display() {
        assert_eq!(format!("{}", StringId(42)), "S42");
    }
}

//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Compiler services offered to the SSA builder and the backend
//

use crate::diag::{self, Position};
use crate::error::Error;
use crate::ssa::{AutoSymbol, ExternSymbol, Frontend, TypeSource};
use crate::types::{TypeId, TypeTable};
use std::cell::Cell;
use std::fmt;

/// Adapter between the builder, the backend and the rest of the compiler.
///
/// The temporary counter is the only state shared between them.
pub struct Export<'a> {
    types: &'a TypeTable,
    verbose: bool,
    autos: Cell<u32>,
}

impl<'a> Export<'a> {
    pub fn new(types: &'a TypeTable, verbose: bool) -> Self {
        Self {
            types,
            verbose,
            autos: Cell::new(0),
        }
    }
}

impl TypeSource for Export<'_> {
    fn type_bool(&self) -> TypeId {
        TypeId::BOOL
    }

    fn type_int8(&self) -> TypeId {
        TypeId::INT8
    }

    fn type_int16(&self) -> TypeId {
        TypeId::INT16
    }

    fn type_int32(&self) -> TypeId {
        TypeId::INT32
    }

    fn type_int64(&self) -> TypeId {
        TypeId::INT64
    }

    fn type_uint8(&self) -> TypeId {
        TypeId::UINT8
    }

    fn type_uint16(&self) -> TypeId {
        TypeId::UINT16
    }

    fn type_uint32(&self) -> TypeId {
        TypeId::UINT32
    }

    fn type_uint64(&self) -> TypeId {
        TypeId::UINT64
    }

    fn type_int(&self) -> TypeId {
        TypeId::INT
    }

    fn type_uintptr(&self) -> TypeId {
        TypeId::UINTPTR
    }

    fn type_float32(&self) -> TypeId {
        TypeId::FLOAT32
    }

    fn type_float64(&self) -> TypeId {
        TypeId::FLOAT64
    }

    fn type_string(&self) -> TypeId {
        TypeId::STRING
    }

    fn type_bytes_ptr(&self) -> TypeId {
        TypeId::BYTE_PTR
    }
}

impl Frontend for Export<'_> {
    fn types(&self) -> &TypeTable {
        self.types
    }

    fn string_data(&self, s: &str) -> ExternSymbol {
        ExternSymbol {
            name: format!("go.string.{:?}", s),
        }
    }

    fn auto(&self, typ: TypeId) -> AutoSymbol {
        let n = self.autos.get();
        self.autos.set(n + 1);
        AutoSymbol {
            name: format!(".autotmp_{}", n),
            typ,
        }
    }

    fn can_ssa(&self, typ: TypeId) -> bool {
        !self.types.is_array(typ)
    }

    fn log(&self) -> bool {
        self.verbose || log::log_enabled!(log::Level::Debug)
    }

    fn logf(&self, args: fmt::Arguments<'_>) {
        log::debug!("{}", args);
    }

    fn warnl(&self, pos: Position, msg: &str) {
        diag::warning(pos, msg);
    }

    fn errorl(&self, pos: Position, msg: &str) {
        diag::error(pos, msg);
    }

    fn fatalf(&self, pos: Option<Position>, msg: &str) -> Error {
        log::debug!("fatal: {}", msg);
        Error::invariant(msg, pos)
    }

    fn unimplementedf(&self, pos: Option<Position>, msg: &str) -> Error {
        log::debug!("unimplemented: {}", msg);
        Error::unimplemented(msg, pos)
    }
}

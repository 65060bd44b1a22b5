//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Backend configuration and the services the backend needs from its
// frontend
//

use super::{AutoSymbol, ExternSymbol};
use crate::diag::Position;
use crate::error::Error;
use crate::types::{TypeId, TypeTable, PTR_SIZE};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Target
// ============================================================================

/// Target architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arch {
    #[default]
    Amd64,
    Arm64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Amd64 => write!(f, "amd64"),
            Arch::Arm64 => write!(f, "arm64"),
        }
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            _ => Err(format!("unknown architecture: {}", s)),
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub arch: Arch,
    /// Pointer size in bytes
    pub ptr_size: u64,
}

impl Config {
    pub fn new(arch: Arch) -> Self {
        // both supported targets are 64-bit
        Self {
            arch,
            ptr_size: PTR_SIZE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Arch::default())
    }
}

// ============================================================================
// Frontend services
// ============================================================================

/// Primitive type lookups
pub trait TypeSource {
    fn type_bool(&self) -> TypeId;
    fn type_int8(&self) -> TypeId;
    fn type_int16(&self) -> TypeId;
    fn type_int32(&self) -> TypeId;
    fn type_int64(&self) -> TypeId;
    fn type_uint8(&self) -> TypeId;
    fn type_uint16(&self) -> TypeId;
    fn type_uint32(&self) -> TypeId;
    fn type_uint64(&self) -> TypeId;
    fn type_int(&self) -> TypeId;
    fn type_uintptr(&self) -> TypeId;
    fn type_float32(&self) -> TypeId;
    fn type_float64(&self) -> TypeId;
    fn type_string(&self) -> TypeId;
    fn type_bytes_ptr(&self) -> TypeId;
}

/// Everything the SSA builder and the backend ask of the compiler around
/// them. Fatal reports construct errors; the caller propagates them.
pub trait Frontend: TypeSource {
    fn types(&self) -> &TypeTable;

    /// Symbol naming the read-only data for a string constant
    fn string_data(&self, s: &str) -> ExternSymbol;

    /// A fresh anonymous stack temporary
    fn auto(&self, typ: TypeId) -> AutoSymbol;

    /// Can values of this type live purely in SSA form?
    fn can_ssa(&self, typ: TypeId) -> bool;

    /// Is backend logging enabled?
    fn log(&self) -> bool;

    fn logf(&self, args: fmt::Arguments<'_>);

    /// Advisory warning at a source position
    fn warnl(&self, pos: Position, msg: &str);

    /// Report an error that is returned alongside another
    fn errorl(&self, pos: Position, msg: &str);

    fn fatalf(&self, pos: Option<Position>, msg: &str) -> Error;

    fn unimplementedf(&self, pos: Option<Position>, msg: &str) -> Error;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_parse() {
        assert_eq!("amd64".parse::<Arch>(), Ok(Arch::Amd64));
        assert_eq!("aarch64".parse::<Arch>(), Ok(Arch::Arm64));
        assert!("mips".parse::<Arch>().is_err());
        assert_eq!(Arch::Arm64.to_string(), "arm64");
    }

    #[test]
    fn test_default_config() {
        let c = Config::default();
        assert_eq!(c.arch, Arch::Amd64);
        assert_eq!(c.ptr_size, 8);
    }
}

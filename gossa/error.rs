//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Error types for gossa
//

use crate::check::TypeError;
use crate::diag::Position;
use crate::parse::ParseError;

/// Broad classification of a build failure.
///
/// Only `LookupFailure` is recoverable: the driver reports it and returns
/// without a function. Every other kind aborts the build of the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LookupFailure,
    InvariantViolation,
    Unimplemented,
    LabelError,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{} type error(s), first: {}", .0.len(), first_type_error(.0))]
    TypeCheck(Vec<TypeError>),
    #[error("couldn't lookup function {0}")]
    NotFound(String),
    #[error("{name} is not a function ({what})")]
    NotAFunction { name: String, what: String },
    #[error("{func}: {what}")]
    Unsupported { func: String, what: String },
    #[error("internal compiler error: {message}")]
    Invariant {
        message: String,
        pos: Option<Position>,
    },
    #[error("unimplemented: {message}")]
    Unimplemented {
        message: String,
        pos: Option<Position>,
    },
    #[error("{message}")]
    Label { message: String, pos: Position },
}

fn first_type_error(errors: &[TypeError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_default()
}

impl Error {
    pub fn invariant(message: impl Into<String>, pos: Option<Position>) -> Self {
        Error::Invariant {
            message: message.into(),
            pos,
        }
    }

    pub fn unimplemented(message: impl Into<String>, pos: Option<Position>) -> Self {
        Error::Unimplemented {
            message: message.into(),
            pos,
        }
    }

    pub fn label(message: impl Into<String>, pos: Position) -> Self {
        Error::Label {
            message: message.into(),
            pos,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. }
            | Error::Parse(_)
            | Error::TypeCheck(_)
            | Error::NotFound(_)
            | Error::NotAFunction { .. }
            | Error::Unsupported { .. } => ErrorKind::LookupFailure,
            Error::Invariant { .. } => ErrorKind::InvariantViolation,
            Error::Unimplemented { .. } => ErrorKind::Unimplemented,
            Error::Label { .. } => ErrorKind::LabelError,
        }
    }

    /// Fatal errors abort the build; lookup failures are reported and skipped.
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::LookupFailure
    }

    /// Source position attached to the error, if any
    pub fn pos(&self) -> Option<Position> {
        match self {
            Error::Parse(e) => Some(e.pos),
            Error::TypeCheck(errs) => errs.first().map(|e| e.pos),
            Error::Invariant { pos, .. } | Error::Unimplemented { pos, .. } => *pos,
            Error::Label { pos, .. } => Some(*pos),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait GetExitCode {
    fn get_exit_code(&self) -> i32;
}

impl<T> GetExitCode for Result<T> {
    fn get_exit_code(&self) -> i32 {
        match self {
            Ok(_) => 0,
            Err(e) if e.is_fatal() => 2,
            Err(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let e = Error::NotFound("f".to_string());
        assert_eq!(e.kind(), ErrorKind::LookupFailure);
        assert!(!e.is_fatal());

        let e = Error::invariant("duplicate variable x", None);
        assert_eq!(e.kind(), ErrorKind::InvariantViolation);
        assert!(e.is_fatal());

        let e = Error::unimplemented("go statement", None);
        assert_eq!(e.kind(), ErrorKind::Unimplemented);

        let e = Error::label("label L not defined", Position::new(0, 3, 1));
        assert_eq!(e.kind(), ErrorKind::LabelError);
        assert_eq!(e.pos(), Some(Position::new(0, 3, 1)));
    }

    #[test]
    fn test_display() {
        let e = Error::invariant("no blocks", None);
        assert_eq!(e.to_string(), "internal compiler error: no blocks");
        let e = Error::Unsupported {
            func: "f".to_string(),
            what: "methods are not supported".to_string(),
        };
        assert_eq!(e.to_string(), "f: methods are not supported");
    }

    #[test]
    fn test_exit_codes() {
        let ok: Result<()> = Ok(());
        assert_eq!(ok.get_exit_code(), 0);
        let lookup: Result<()> = Err(Error::NotFound("g".to_string()));
        assert_eq!(lookup.get_exit_code(), 1);
        let fatal: Result<()> = Err(Error::unimplemented("defer", None));
        assert_eq!(fatal.get_exit_code(), 2);
    }
}

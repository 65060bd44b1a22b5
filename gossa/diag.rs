//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Diagnostic and stream management module for gossa
//

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

// ============================================================================
// Source Position
// ============================================================================

/// Source position tracking for tokens, AST nodes and SSA values.
///
/// Compact enough to be copied into every value the builder creates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Stream/file index (which file this is in)
    pub stream: u16,
    /// Line number (1-based)
    pub line: u32,
    /// Column position (1-based, 0 means unknown)
    pub col: u16,
}

impl Position {
    pub fn new(stream: u16, line: u32, col: u16) -> Self {
        Self { stream, line, col }
    }

    /// Position for synthesized values that have no source location
    pub fn bad() -> Self {
        Self {
            stream: u16::MAX,
            line: 0,
            col: 0,
        }
    }

    /// Check if this is a bad/invalid position
    pub fn is_bad(&self) -> bool {
        self.stream == u16::MAX && self.line == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = stream_name(self.stream);

        if self.col > 0 {
            write!(f, "{}:{}:{}", name, self.line, self.col)
        } else {
            write!(f, "{}:{}", name, self.line)
        }
    }
}

// ============================================================================
// Stream Registry
// ============================================================================

/// Input stream information
#[derive(Debug, Clone)]
pub struct Stream {
    pub name: String,
}

/// Stream registry for managing all input files
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: Vec<Stream>,
    by_name: HashMap<String, u16>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream, returning its ID. A name already registered
    /// keeps its ID; a full registry starts over, since u16::MAX is the
    /// bad-position stream.
    pub fn add(&mut self, name: String) -> u16 {
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        if self.streams.len() >= usize::from(u16::MAX) {
            self.clear();
        }
        let id = self.streams.len() as u16;
        self.by_name.insert(name.clone(), id);
        self.streams.push(Stream { name });
        id
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn get_name(&self, id: u16) -> Option<&str> {
        self.streams.get(id as usize).map(|s| s.name.as_str())
    }

    pub fn clear(&mut self) {
        self.streams.clear();
        self.by_name.clear();
    }
}

thread_local! {
    pub static STREAMS: RefCell<StreamRegistry> = RefCell::new(StreamRegistry::new());
}

/// Initialize a new stream, returning its ID
pub fn init_stream(name: &str) -> u16 {
    STREAMS.with(|s| s.borrow_mut().add(name.to_string()))
}

/// Get stream name by ID
pub fn stream_name(id: u16) -> String {
    STREAMS.with(|s| {
        s.borrow()
            .get_name(id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "<unknown>".to_string())
    })
}

/// Clear all streams (call at start of new build)
pub fn clear_streams() {
    STREAMS.with(|s| s.borrow_mut().clear());
}

// ============================================================================
// Error Tracking
// ============================================================================

// Counters are per thread: one build never spans threads, and the test
// harness runs each test on its own thread.
thread_local! {
    static ERROR_COUNT: Cell<u32> = const { Cell::new(0) };
    static WARNING_COUNT: Cell<u32> = const { Cell::new(0) };
}

pub fn error_count() -> u32 {
    ERROR_COUNT.with(|c| c.get())
}

pub fn warning_count() -> u32 {
    WARNING_COUNT.with(|c| c.get())
}

/// Reset error/warning counts
pub fn reset_counts() {
    ERROR_COUNT.with(|c| c.set(0));
    WARNING_COUNT.with(|c| c.set(0));
}

// ============================================================================
// Diagnostic Output
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiagLevel {
    Warning,
    Error,
}

impl DiagLevel {
    fn prefix(&self) -> &'static str {
        match self {
            DiagLevel::Warning => "warning: ",
            DiagLevel::Error => "error: ",
        }
    }
}

/// Prettify a path by removing ./ prefix if present
fn prettify_path(path: &str) -> String {
    path.strip_prefix("./")
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.to_string())
}

fn do_diag(level: DiagLevel, pos: Position, msg: &str) {
    match level {
        DiagLevel::Error => ERROR_COUNT.with(|c| c.set(c.get() + 1)),
        DiagLevel::Warning => WARNING_COUNT.with(|c| c.set(c.get() + 1)),
    }

    // Synthesized positions still count, but print without a location
    if pos.is_bad() {
        let _ = writeln!(io::stderr(), "gossa: {}{}", level.prefix(), msg);
        return;
    }

    let filename = prettify_path(&stream_name(pos.stream));
    let _ = if pos.col > 0 {
        writeln!(
            io::stderr(),
            "{}:{}:{}: {}{}",
            filename,
            pos.line,
            pos.col,
            level.prefix(),
            msg
        )
    } else {
        writeln!(
            io::stderr(),
            "{}:{}: {}{}",
            filename,
            pos.line,
            level.prefix(),
            msg
        )
    };
}

// ============================================================================
// Public Diagnostic Functions
// ============================================================================

/// Print a warning message
pub fn warning(pos: Position, msg: &str) {
    do_diag(DiagLevel::Warning, pos, msg);
}

/// Print an error message
pub fn error(pos: Position, msg: &str) {
    do_diag(DiagLevel::Error, pos, msg);
}

// ============================================================================
// Tests
// ============================================================================

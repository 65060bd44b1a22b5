//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Label and jump resolution
//
// The block scanner feeds label definitions and jumps in source order.
// Forward references are legal, so nothing is checked until finish(),
// which binds every jump to a block or reports why it can't. Diagnostics
// go through the frontend.
//

use crate::diag::Position;
use crate::error::{Error, Result};
use crate::parse::ast::NodeId;
use crate::ssa::{BlockId, Frontend};
use crate::strings::{StringId, StringTable};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelState {
    Unseen,
    /// Jumped to before its definition was scanned
    Referenced,
    Defined,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Goto,
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub name: StringId,
    pub state: LabelState,
    /// Block that starts at the labeled statement
    pub target: Option<BlockId>,
    /// Exit of the labeled loop or switch
    pub break_target: Option<BlockId>,
    /// Continue block of the labeled loop
    pub continue_target: Option<BlockId>,
    pub def_pos: Option<Position>,
    /// First jump naming the label; None for an unused label
    pub use_pos: Option<Position>,
    /// Enclosing block nodes of the definition, outermost first
    pub def_path: Vec<NodeId>,
    /// An error has been reported for this label
    pub reported: bool,
}

impl Label {
    fn new(name: StringId) -> Self {
        Self {
            name,
            state: LabelState::Unseen,
            target: None,
            break_target: None,
            continue_target: None,
            def_pos: None,
            use_pos: None,
            def_path: Vec::new(),
            reported: false,
        }
    }
}

/// A labeled jump waiting for resolution
#[derive(Debug, Clone)]
struct PendingJump {
    node: NodeId,
    label: StringId,
    kind: JumpKind,
    pos: Position,
    path: Vec<NodeId>,
    /// For break/continue: the label names an enclosing construct of the
    /// right kind
    enclosing: bool,
}

pub struct LabelResolver<'a> {
    strings: &'a StringTable,
    fe: &'a dyn Frontend,
    labels: Vec<Label>,
    index: HashMap<StringId, usize>,
    pending: Vec<PendingJump>,
    jumps: HashMap<NodeId, BlockId>,
    errors: Vec<Error>,
}

impl<'a> LabelResolver<'a> {
    pub fn new(strings: &'a StringTable, fe: &'a dyn Frontend) -> Self {
        Self {
            strings,
            fe,
            labels: Vec::new(),
            index: HashMap::new(),
            pending: Vec::new(),
            jumps: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn label_index(&mut self, name: StringId) -> usize {
        if let Some(&idx) = self.index.get(&name) {
            return idx;
        }
        self.labels.push(Label::new(name));
        self.index.insert(name, self.labels.len() - 1);
        self.labels.len() - 1
    }

    /// A labeled statement starting at block `target`
    pub fn define(&mut self, name: StringId, pos: Position, target: BlockId, path: &[NodeId]) {
        let idx = self.label_index(name);
        let label = &mut self.labels[idx];
        if let Some(prev) = label.def_pos {
            if !label.reported {
                label.reported = true;
                let msg = format!(
                    "label {} already defined at {}",
                    self.strings.get(name),
                    prev
                );
                self.errors.push(Error::label(msg, pos));
            }
            return;
        }
        label.state = LabelState::Defined;
        label.def_pos = Some(pos);
        label.target = Some(target);
        label.def_path = path.to_vec();
    }

    /// Break and continue targets of a labeled loop or switch
    pub fn set_targets(&mut self, name: StringId, brk: Option<BlockId>, cont: Option<BlockId>) {
        let idx = self.label_index(name);
        let label = &mut self.labels[idx];
        label.break_target = brk;
        label.continue_target = cont;
    }

    /// An unlabeled break or continue, already resolved by the scanner
    pub fn bind(&mut self, node: NodeId, target: BlockId) {
        self.jumps.insert(node, target);
    }

    /// An unlabeled break or continue with no enclosing construct
    pub fn misplaced(&mut self, kind: JumpKind, pos: Position) {
        let msg = match kind {
            JumpKind::Continue => "continue is not in a loop",
            _ => "break is not in a loop, switch, or select",
        };
        self.errors.push(Error::label(msg, pos));
    }

    /// `goto L`, `break L` or `continue L`
    pub fn reference(
        &mut self,
        node: NodeId,
        name: StringId,
        kind: JumpKind,
        pos: Position,
        path: &[NodeId],
        enclosing: bool,
    ) {
        let idx = self.label_index(name);
        let label = &mut self.labels[idx];
        if label.state == LabelState::Unseen {
            label.state = LabelState::Referenced;
        }
        if label.use_pos.is_none() {
            label.use_pos = Some(pos);
        }
        self.pending.push(PendingJump {
            node,
            label: name,
            kind,
            pos,
            path: path.to_vec(),
            enclosing,
        });
    }

    /// Resolve every pending jump.
    ///
    /// Returns the first label error; any others are reported through
    /// the diagnostic channel. Unused labels only warn.
    pub fn finish(mut self) -> Result<Labels> {
        let pending = std::mem::take(&mut self.pending);
        for jump in pending {
            let idx = self.index[&jump.label];
            let text = self.strings.get(jump.label);
            let label = &mut self.labels[idx];
            let target = label.target.filter(|_| label.state == LabelState::Defined);

            let resolved = match (jump.kind, target) {
                (JumpKind::Goto, None) => Err(format!("label {} not defined", text)),
                (JumpKind::Break, None) => Err(format!("break label not defined: {}", text)),
                (JumpKind::Continue, None) => {
                    Err(format!("continue label not defined: {}", text))
                }
                (JumpKind::Goto, Some(target)) => {
                    if jump.path.starts_with(&label.def_path) {
                        Ok(target)
                    } else {
                        Err(format!("goto {} jumps into block", text))
                    }
                }
                (JumpKind::Break, Some(_)) => label
                    .break_target
                    .filter(|_| jump.enclosing)
                    .ok_or_else(|| format!("invalid break label {}", text)),
                (JumpKind::Continue, Some(_)) => label
                    .continue_target
                    .filter(|_| jump.enclosing)
                    .ok_or_else(|| format!("invalid continue label {}", text)),
            };
            match resolved {
                Ok(target) => {
                    self.jumps.insert(jump.node, target);
                }
                Err(msg) => {
                    if !label.reported {
                        label.reported = true;
                        self.errors.push(Error::label(msg, jump.pos));
                    }
                }
            }
        }

        let mut targets = HashMap::new();
        for label in &mut self.labels {
            let Some(target) = label.target else {
                continue;
            };
            targets.insert(label.name, target);
            if label.use_pos.is_none() {
                if let Some(pos) = label.def_pos {
                    let msg = format!("label {} defined and not used", self.strings.get(label.name));
                    self.fe.warnl(pos, &msg);
                }
            }
            label.state = LabelState::Resolved;
        }

        self.errors.sort_by_key(|e| e.pos().map(|p| (p.line, p.col)));
        let mut errors = self.errors.into_iter();
        if let Some(first) = errors.next() {
            for e in errors {
                if let Some(pos) = e.pos() {
                    self.fe.errorl(pos, &e.to_string());
                }
            }
            return Err(first);
        }

        Ok(Labels {
            jumps: self.jumps,
            targets,
        })
    }
}

/// Resolved jumps, read by the builder
#[derive(Debug, Default)]
pub struct Labels {
    jumps: HashMap<NodeId, BlockId>,
    targets: HashMap<StringId, BlockId>,
}

impl Labels {
    /// Target of a goto, break or continue statement
    pub fn jump_target(&self, node: NodeId) -> Option<BlockId> {
        self.jumps.get(&node).copied()
    }

    /// All label target blocks
    pub fn targets(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.targets.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag;
    use crate::error::ErrorKind;
    use crate::ssagen::export::Export;
    use crate::types::TypeTable;

    fn pos(line: u32) -> Position {
        Position::new(0, line, 1)
    }

    fn state(r: &LabelResolver<'_>, name: StringId) -> LabelState {
        r.index
            .get(&name)
            .map_or(LabelState::Unseen, |&i| r.labels[i].state)
    }

    #[test]
    fn test_forward_goto() {
        let mut strings = StringTable::new();
        let l = strings.intern("L");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.reference(NodeId(1), l, JumpKind::Goto, pos(2), &[NodeId(0)], false);
        assert_eq!(state(&r, l), LabelState::Referenced);
        r.define(l, pos(5), BlockId(3), &[NodeId(0)]);
        assert_eq!(state(&r, l), LabelState::Defined);
        let labels = r.finish().unwrap();
        assert_eq!(labels.jump_target(NodeId(1)), Some(BlockId(3)));
        assert_eq!(labels.targets().collect::<Vec<_>>(), vec![BlockId(3)]);
    }

    #[test]
    fn test_undefined_label() {
        let mut strings = StringTable::new();
        let l = strings.intern("L");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.reference(NodeId(1), l, JumpKind::Goto, pos(2), &[], false);
        r.reference(NodeId(2), l, JumpKind::Goto, pos(3), &[], false);
        let err = r.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LabelError);
        assert_eq!(err.to_string(), "label L not defined");
        assert_eq!(err.pos(), Some(pos(2)));
    }

    #[test]
    fn test_duplicate_label() {
        let mut strings = StringTable::new();
        let l = strings.intern("L");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.define(l, pos(2), BlockId(2), &[]);
        r.define(l, pos(4), BlockId(3), &[]);
        let err = r.finish().unwrap_err();
        assert!(err.to_string().starts_with("label L already defined at"));
    }

    #[test]
    fn test_goto_into_block() {
        let mut strings = StringTable::new();
        let l = strings.intern("L");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.reference(NodeId(9), l, JumpKind::Goto, pos(2), &[NodeId(1)], false);
        r.define(l, pos(4), BlockId(2), &[NodeId(1), NodeId(5)]);
        let err = r.finish().unwrap_err();
        assert_eq!(err.to_string(), "goto L jumps into block");
    }

    #[test]
    fn test_invalid_break_label() {
        let mut strings = StringTable::new();
        let l = strings.intern("L");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.define(l, pos(2), BlockId(2), &[]);
        r.reference(NodeId(3), l, JumpKind::Break, pos(3), &[], false);
        let err = r.finish().unwrap_err();
        assert_eq!(err.to_string(), "invalid break label L");
    }

    #[test]
    fn test_labeled_continue_resolves() {
        let mut strings = StringTable::new();
        let l = strings.intern("outer");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.define(l, pos(2), BlockId(2), &[]);
        r.set_targets(l, Some(BlockId(6)), Some(BlockId(3)));
        r.reference(NodeId(4), l, JumpKind::Continue, pos(5), &[], true);
        r.bind(NodeId(7), BlockId(6));
        let labels = r.finish().unwrap();
        assert_eq!(labels.jump_target(NodeId(4)), Some(BlockId(3)));
        assert_eq!(labels.jump_target(NodeId(7)), Some(BlockId(6)));
    }

    #[test]
    fn test_misplaced_break() {
        let strings = StringTable::new();
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.misplaced(JumpKind::Break, pos(3));
        let err = r.finish().unwrap_err();
        assert_eq!(err.to_string(), "break is not in a loop, switch, or select");
    }

    #[test]
    fn test_unused_label_warns() {
        let mut strings = StringTable::new();
        let l = strings.intern("L");
        let types = TypeTable::new();
        let fe = Export::new(&types, false);
        let mut r = LabelResolver::new(&strings, &fe);
        r.define(l, pos(2), BlockId(2), &[]);
        let before = diag::warning_count();
        let labels = r.finish().unwrap();
        assert_eq!(diag::warning_count(), before + 1);
        assert_eq!(labels.targets().count(), 1);
    }
}

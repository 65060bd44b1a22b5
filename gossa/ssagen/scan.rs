//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Block scanner
//
// Allocates every block the function body needs before any value is
// built, so that jumps always name an existing block. Optional blocks
// (if-joins, loop latches and exits, switch exits) exist only when some
// edge can reach them.
//

use super::label::{JumpKind, LabelResolver};
use crate::error::{Error, Result};
use crate::parse::ast::{
    self, Block, CaseClause, Expr, ExprKind, NodeId, Stmt, StmtKind,
};
use crate::ssa::{BlockId, Func};
use crate::strings::StringId;
use std::collections::HashMap;

/// Blocks allocated for one construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    If {
        then: BlockId,
        els: Option<BlockId>,
        join: Option<BlockId>,
    },
    For {
        header: BlockId,
        body: BlockId,
        latch: Option<BlockId>,
        exit: Option<BlockId>,
    },
    /// One test block per case expression in source order, one body per
    /// clause
    Switch {
        tests: Vec<BlockId>,
        bodies: Vec<BlockId>,
        exit: Option<BlockId>,
    },
    Label {
        target: BlockId,
    },
    /// `&&` and `||`
    ShortCircuit {
        right: BlockId,
        join: BlockId,
    },
}

/// Result of the scan
#[derive(Debug)]
pub struct Skeleton {
    pub entry: BlockId,
    /// Every allocated block, in allocation order
    pub blocks: Vec<BlockId>,
    shapes: HashMap<NodeId, Shape>,
}

impl Skeleton {
    /// Shape of a statement or expression node
    pub fn shape(&self, node: NodeId) -> Option<&Shape> {
        self.shapes.get(&node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Loop,
    Switch,
}

/// An enclosing loop or switch
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    label: Option<StringId>,
    brk: Option<BlockId>,
    cont: Option<BlockId>,
}

struct Scanner<'f, 'r, 'a> {
    f: &'f mut Func,
    labels: &'r mut LabelResolver<'a>,
    blocks: Vec<BlockId>,
    shapes: HashMap<NodeId, Shape>,
    frames: Vec<Frame>,
    /// Enclosing block and case clause nodes, outermost first
    path: Vec<NodeId>,
    /// Label of the statement about to be scanned
    pending_label: Option<StringId>,
}

/// Allocate the blocks of a function body, registering labels and jumps
/// with the resolver as they are found.
pub fn scan(f: &mut Func, body: &Block, labels: &mut LabelResolver<'_>) -> Result<Skeleton> {
    let mut s = Scanner {
        f,
        labels,
        blocks: Vec::new(),
        shapes: HashMap::new(),
        frames: Vec::new(),
        path: Vec::new(),
        pending_label: None,
    };
    let entry = s.new_block();
    s.block(body);

    if s.blocks.is_empty() {
        return Err(Error::invariant("scan produced no blocks", Some(body.pos)));
    }
    log::debug!("scan {}: {} blocks", s.f.name, s.blocks.len());
    Ok(Skeleton {
        entry,
        blocks: s.blocks,
        shapes: s.shapes,
    })
}

impl Scanner<'_, '_, '_> {
    fn new_block(&mut self) -> BlockId {
        let b = self.f.new_block();
        self.blocks.push(b);
        b
    }

    fn new_block_if(&mut self, needed: bool) -> Option<BlockId> {
        needed.then(|| self.new_block())
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn block(&mut self, b: &Block) {
        self.path.push(b.id);
        self.stmts(&b.stmts);
        self.path.pop();
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.stmt(s);
        }
    }

    fn opt_stmt(&mut self, s: &Option<Box<Stmt>>) {
        if let Some(s) = s {
            self.stmt(s);
        }
    }

    fn stmt(&mut self, s: &Stmt) {
        let label = self.pending_label.take();
        match &s.kind {
            StmtKind::Empty | StmtKind::Fallthrough => {}
            StmtKind::Expr(e) | StmtKind::Go(e) | StmtKind::Defer(e) => self.expr(e),
            StmtKind::Assign { lhs, rhs, .. } => {
                self.exprs(lhs);
                self.exprs(rhs);
            }
            StmtKind::Define { values, .. } => self.exprs(values),
            StmtKind::Var(specs) => {
                for spec in specs {
                    self.exprs(&spec.values);
                }
            }
            StmtKind::IncDec { target, .. } => self.expr(target),
            StmtKind::Return(values) => self.exprs(values),
            StmtKind::Block(b) => self.block(b),
            StmtKind::If {
                init,
                cond,
                then,
                els,
            } => {
                let then_b = self.new_block();
                let els_b = self.new_block_if(els.is_some());
                let join = self.new_block_if(ast::falls_through(s));
                self.shapes.insert(
                    s.id,
                    Shape::If {
                        then: then_b,
                        els: els_b,
                        join,
                    },
                );
                self.opt_stmt(init);
                self.expr(cond);
                self.block(then);
                self.opt_stmt(els);
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                let header = self.new_block();
                let body_b = self.new_block();
                let latch = self.new_block_if(
                    post.is_some()
                        && (ast::list_falls_through(&body.stmts)
                            || ast::has_continue(&body.stmts, label)),
                );
                let exit = self.new_block_if(ast::falls_through_labeled(s, label));
                self.shapes.insert(
                    s.id,
                    Shape::For {
                        header,
                        body: body_b,
                        latch,
                        exit,
                    },
                );
                let cont = latch.unwrap_or(header);
                if let Some(l) = label {
                    self.labels.set_targets(l, exit, Some(cont));
                }

                self.opt_stmt(init);
                if let Some(c) = cond {
                    self.expr(c);
                }
                self.frames.push(Frame {
                    kind: FrameKind::Loop,
                    label,
                    brk: exit,
                    cont: Some(cont),
                });
                self.block(body);
                self.frames.pop();
                // without a latch the post statement is never built
                if latch.is_some() {
                    self.opt_stmt(post);
                }
            }
            StmtKind::Switch { init, tag, clauses } => {
                let ntests: usize = clauses.iter().map(|c| c.exprs.len()).sum();
                let tests: Vec<BlockId> = (0..ntests).map(|_| self.new_block()).collect();
                let bodies: Vec<BlockId> = clauses.iter().map(|_| self.new_block()).collect();
                let exit = self.new_block_if(ast::falls_through_labeled(s, label));
                self.shapes.insert(
                    s.id,
                    Shape::Switch {
                        tests,
                        bodies,
                        exit,
                    },
                );
                if let Some(l) = label {
                    self.labels.set_targets(l, exit, None);
                }

                self.opt_stmt(init);
                if let Some(t) = tag {
                    self.expr(t);
                }
                self.frames.push(Frame {
                    kind: FrameKind::Switch,
                    label,
                    brk: exit,
                    cont: None,
                });
                for c in clauses {
                    self.clause(c);
                }
                self.frames.pop();
            }
            StmtKind::Labeled { label: l, stmt } => {
                let target = self.new_block();
                self.shapes.insert(s.id, Shape::Label { target });
                self.labels.define(l.name, l.pos, target, &self.path);
                self.pending_label = Some(l.name);
                self.stmt(stmt);
            }
            StmtKind::Goto(l) => {
                self.labels
                    .reference(s.id, l.name, JumpKind::Goto, l.pos, &self.path, false);
            }
            StmtKind::Break(None) => match self.frames.last() {
                Some(Frame { brk: Some(b), .. }) => self.labels.bind(s.id, *b),
                _ => self.labels.misplaced(JumpKind::Break, s.pos),
            },
            StmtKind::Continue(None) => {
                let target = self
                    .frames
                    .iter()
                    .rev()
                    .find(|f| f.kind == FrameKind::Loop)
                    .and_then(|f| f.cont);
                match target {
                    Some(b) => self.labels.bind(s.id, b),
                    None => self.labels.misplaced(JumpKind::Continue, s.pos),
                }
            }
            StmtKind::Break(Some(l)) => {
                let enclosing = self.frames.iter().any(|f| f.label == Some(l.name));
                self.labels
                    .reference(s.id, l.name, JumpKind::Break, l.pos, &self.path, enclosing);
            }
            StmtKind::Continue(Some(l)) => {
                let enclosing = self
                    .frames
                    .iter()
                    .any(|f| f.label == Some(l.name) && f.kind == FrameKind::Loop);
                self.labels.reference(
                    s.id,
                    l.name,
                    JumpKind::Continue,
                    l.pos,
                    &self.path,
                    enclosing,
                );
            }
        }
    }

    fn clause(&mut self, c: &CaseClause) {
        self.exprs(&c.exprs);
        self.path.push(c.id);
        self.stmts(&c.body);
        self.path.pop();
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn exprs(&mut self, es: &[Expr]) {
        for e in es {
            self.expr(e);
        }
    }

    fn expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Binary { op, left, right } => {
                if op.is_logical() {
                    let right_b = self.new_block();
                    let join = self.new_block();
                    self.shapes.insert(
                        e.id,
                        Shape::ShortCircuit {
                            right: right_b,
                            join,
                        },
                    );
                }
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::Call { func, args } => {
                self.expr(func);
                self.exprs(args);
            }
            ExprKind::Index { base, index } => {
                self.expr(base);
                self.expr(index);
            }
            ExprKind::Ident(_)
            | ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::CharLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::Nil => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parse::ast::Decl;
    use crate::parse::parse_file;
    use crate::ssagen::export::Export;
    use crate::strings::StringTable;
    use crate::types::TypeTable;

    fn scan_src(src: &str) -> (Result<Skeleton>, Func, ast::SourceFile) {
        let mut strings = StringTable::new();
        let file = parse_file(src, 0, &mut strings).unwrap();
        let mut f = Func::new("f", vec![]);
        let result = {
            let Some(Decl::Func(decl)) = file.decls.last() else {
                panic!("expected a function");
            };
            let body = decl.body.as_ref().unwrap();
            let types = TypeTable::new();
            let fe = Export::new(&types, false);
            let mut resolver = LabelResolver::new(&strings, &fe);
            scan(&mut f, body, &mut resolver).and_then(|sk| resolver.finish().map(|_| sk))
        };
        (result, f, file)
    }

    fn body_stmts(file: &ast::SourceFile) -> &[Stmt] {
        let Some(Decl::Func(decl)) = file.decls.last() else {
            panic!("expected a function");
        };
        &decl.body.as_ref().unwrap().stmts
    }

    #[test]
    fn test_straight_line_one_block() {
        let (sk, f, _) = scan_src("package p\nfunc f(x int) int {\n\ty := x + 1\n\ty *= 2\n\treturn y\n}\n");
        let sk = sk.unwrap();
        assert_eq!(sk.blocks, vec![BlockId(1)]);
        assert_eq!(sk.entry, BlockId(1));
        assert_eq!(f.num_blocks(), 1);
    }

    #[test]
    fn test_if_else_shape() {
        let src = "package p\nfunc f(x int) int {\n\tvar y int\n\tif x > 0 {\n\t\ty = 1\n\t} else {\n\t\ty = 2\n\t}\n\treturn y\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        assert_eq!(sk.blocks.len(), 4);
        let shape = sk.shape(body_stmts(&file)[1].id).unwrap();
        assert_eq!(
            shape,
            &Shape::If {
                then: BlockId(2),
                els: Some(BlockId(3)),
                join: Some(BlockId(4)),
            }
        );
    }

    #[test]
    fn test_terminating_if_has_no_join() {
        let src = "package p\nfunc f(x int) int {\n\tif x > 0 {\n\t\treturn 1\n\t} else {\n\t\treturn 2\n\t}\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        assert_eq!(sk.blocks.len(), 3);
        assert!(matches!(
            sk.shape(body_stmts(&file)[0].id),
            Some(Shape::If { join: None, .. })
        ));
    }

    #[test]
    fn test_loop_shapes() {
        let src = "package p\nfunc f() {\n\tfor i := 0; i < 3; i++ {\n\t}\n\tfor {\n\t}\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        let stmts = body_stmts(&file);
        assert_eq!(
            sk.shape(stmts[0].id),
            Some(&Shape::For {
                header: BlockId(2),
                body: BlockId(3),
                latch: Some(BlockId(4)),
                exit: Some(BlockId(5)),
            })
        );
        // an infinite loop without break never exits
        assert_eq!(
            sk.shape(stmts[1].id),
            Some(&Shape::For {
                header: BlockId(6),
                body: BlockId(7),
                latch: None,
                exit: None,
            })
        );
    }

    #[test]
    fn test_labeled_break_out_of_infinite_loop() {
        let src = "package p\nfunc f() {\nouter:\n\tfor {\n\t\tfor {\n\t\t\tbreak outer\n\t\t}\n\t}\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        let StmtKind::Labeled { stmt, .. } = &body_stmts(&file)[0].kind else {
            panic!("expected label");
        };
        assert!(matches!(
            sk.shape(stmt.id),
            Some(Shape::For { exit: Some(_), .. })
        ));
    }

    #[test]
    fn test_jumping_branches_have_no_join() {
        let src = "package p\nfunc f(n int, c bool) {\n\tfor i := 0; i < n; i++ {\n\t\tif c {\n\t\t\tcontinue\n\t\t} else {\n\t\t\tbreak\n\t\t}\n\t}\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        let StmtKind::For { body, .. } = &body_stmts(&file)[0].kind else {
            panic!("expected loop");
        };
        assert!(matches!(
            sk.shape(body.stmts[0].id),
            Some(Shape::If { join: None, .. })
        ));
        // continue still reaches the latch
        assert!(matches!(
            sk.shape(body_stmts(&file)[0].id),
            Some(Shape::For {
                latch: Some(_),
                exit: Some(_),
                ..
            })
        ));
    }

    #[test]
    fn test_unreached_latch_not_allocated() {
        let src = "package p\nfunc f(n int) int {\n\tfor i := 0; i < n; i++ {\n\t\treturn i\n\t}\n\treturn 0\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        assert!(matches!(
            sk.shape(body_stmts(&file)[0].id),
            Some(Shape::For { latch: None, .. })
        ));
        assert_eq!(sk.blocks.len(), 4);
    }

    #[test]
    fn test_switch_clauses_ending_in_continue() {
        let src = "package p\nfunc f(n int) {\n\tfor {\n\t\tswitch n {\n\t\tcase 1:\n\t\t\tcontinue\n\t\tdefault:\n\t\t\treturn\n\t\t}\n\t}\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        let StmtKind::For { body, .. } = &body_stmts(&file)[0].kind else {
            panic!("expected loop");
        };
        assert!(matches!(
            sk.shape(body.stmts[0].id),
            Some(Shape::Switch { exit: None, .. })
        ));
    }

    #[test]
    fn test_switch_shape() {
        let src = "package p\nfunc f(x int) int {\n\tswitch x {\n\tcase 1, 2:\n\t\treturn 1\n\tcase 3:\n\t\tfallthrough\n\tdefault:\n\t\treturn 0\n\t}\n}\n";
        let (sk, _, file) = scan_src(src);
        let sk = sk.unwrap();
        let Some(Shape::Switch {
            tests,
            bodies,
            exit,
        }) = sk.shape(body_stmts(&file)[0].id)
        else {
            panic!("expected switch");
        };
        assert_eq!(tests.len(), 3);
        assert_eq!(bodies.len(), 3);
        assert_eq!(*exit, None);
    }

    #[test]
    fn test_short_circuit_blocks() {
        let src = "package p\nfunc f(a, b bool) bool {\n\treturn a && b\n}\n";
        let (sk, _, _) = scan_src(src);
        assert_eq!(sk.unwrap().blocks.len(), 3);
    }

    #[test]
    fn test_undefined_label_fails() {
        let (sk, _, _) = scan_src("package p\nfunc f() {\n\tgoto L\n}\n");
        let err = sk.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LabelError);
    }

    #[test]
    fn test_continue_outside_loop() {
        let src = "package p\nfunc f(x int) {\n\tswitch x {\n\tcase 1:\n\t\tcontinue\n\t}\n}\n";
        let (sk, _, _) = scan_src(src);
        assert_eq!(sk.unwrap_err().to_string(), "continue is not in a loop");
    }
}

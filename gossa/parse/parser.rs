//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Parser for gossa
// Recursive descent parser for the supported Go subset, with precedence
// climbing for binary expressions
//

use super::ast::{
    AssignOp, BinaryOp, Block, CaseClause, Decl, Expr, ExprKind, Field, FuncDecl, Ident, NodeId,
    SourceFile, Stmt, StmtKind, TypeExpr, UnaryOp, VarSpec,
};
use super::{ParseError, ParseResult};
use crate::diag::Position;
use crate::strings::StringTable;
use crate::token::lexer::{show_token, tokenize, Keyword, SpecialToken, Token, TokenType, TokenValue};

// ============================================================================
// Parser
// ============================================================================

pub struct Parser<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    strings: &'a StringTable,
    next_id: u32,
}

/// One entry of a parameter list before names are distributed:
/// `a`, `int`, `a int`, `*T` ...
enum ParamItem {
    Named(Ident, TypeExpr, Position),
    Bare(TypeExpr, Position),
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, strings: &'a StringTable) -> Self {
        Self {
            tokens,
            cursor: 0,
            strings,
            next_id: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.cursor.min(last)]
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + n)
    }

    fn current_pos(&self) -> Position {
        self.current().pos
    }

    fn peek(&self) -> TokenType {
        self.current().typ
    }

    fn advance(&mut self) {
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
    }

    fn is_special(&self, c: u8) -> bool {
        self.current().is_special(c as u32)
    }

    fn is_special_token(&self, tok: SpecialToken) -> bool {
        self.current().is_special(tok as u32)
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        self.current().is_keyword(kw)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(
            format!(
                "unexpected {}, expected {}",
                show_token(self.current(), self.strings),
                expected
            ),
            self.current_pos(),
        )
    }

    fn expect_special(&mut self, c: u8) -> ParseResult<()> {
        if self.is_special(c) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&(c as char).to_string()))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<()> {
        if self.is_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(kw.as_str()))
        }
    }

    /// Statement terminator: `;`, or nothing before a closing `)` or `}`
    fn expect_semi(&mut self) -> ParseResult<()> {
        if self.is_special(b';') {
            self.advance();
            Ok(())
        } else if self.is_special(b')') || self.is_special(b'}') || self.peek() == TokenType::Eof
        {
            Ok(())
        } else {
            Err(self.unexpected("newline or ;"))
        }
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match self.current().value {
            TokenValue::Ident(name) => {
                let pos = self.current_pos();
                self.advance();
                let id = self.node_id();
                Ok(Ident { id, name, pos })
            }
            _ => Err(self.unexpected("name")),
        }
    }

    fn expr(&mut self, kind: ExprKind, pos: Position) -> Expr {
        let id = self.node_id();
        Expr { id, kind, pos }
    }

    fn stmt(&mut self, kind: StmtKind, pos: Position) -> Stmt {
        let id = self.node_id();
        Stmt { id, kind, pos }
    }

    // ------------------------------------------------------------------------
    // Source file and declarations
    // ------------------------------------------------------------------------

    pub fn parse_source_file(&mut self) -> ParseResult<SourceFile> {
        self.expect_keyword(Keyword::Package)?;
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let mut imports = Vec::new();
        while self.is_keyword(Keyword::Import) {
            self.advance();
            if self.is_special(b'(') {
                self.advance();
                while !self.is_special(b')') {
                    imports.push(self.parse_import_path()?);
                    self.expect_semi()?;
                }
                self.advance();
            } else {
                imports.push(self.parse_import_path()?);
            }
            self.expect_semi()?;
        }

        let mut decls = Vec::new();
        while self.peek() != TokenType::Eof {
            if self.is_keyword(Keyword::Func) {
                decls.push(Decl::Func(self.parse_func_decl()?));
            } else if self.is_keyword(Keyword::Var) {
                self.advance();
                for spec in self.parse_var_specs()? {
                    decls.push(Decl::Var(spec));
                }
            } else if self.is_keyword(Keyword::Import) {
                return Err(ParseError::new(
                    "imports must appear before other declarations",
                    self.current_pos(),
                ));
            } else {
                return Err(self.unexpected("func or var declaration"));
            }
            self.expect_semi()?;
        }

        Ok(SourceFile {
            package,
            imports,
            decls,
        })
    }

    fn parse_import_path(&mut self) -> ParseResult<(String, Position)> {
        let pos = self.current_pos();
        match &self.current().value {
            TokenValue::String(s) => {
                let s = s.clone();
                self.advance();
                Ok((s, pos))
            }
            _ => Err(self.unexpected("import path")),
        }
    }

    fn parse_func_decl(&mut self) -> ParseResult<FuncDecl> {
        let pos = self.current_pos();
        self.expect_keyword(Keyword::Func)?;
        let id = self.node_id();

        let recv = if self.is_special(b'(') {
            let mut fields = self.parse_parameters()?;
            if fields.len() != 1 {
                return Err(ParseError::new("method has multiple receivers", pos));
            }
            fields.pop()
        } else {
            None
        };

        let name = self.expect_ident()?;
        let params = self.parse_parameters()?;
        let results = self.parse_result()?;
        let body = if self.is_special(b'{') {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(FuncDecl {
            id,
            name,
            recv,
            params,
            results,
            body,
            pos,
        })
    }

    /// `(a, b int, c bool)` or `(int, bool)`
    fn parse_parameters(&mut self) -> ParseResult<Vec<Field>> {
        self.expect_special(b'(')?;
        let mut items = Vec::new();
        while !self.is_special(b')') {
            items.push(self.parse_param_item()?);
            if !self.is_special(b',') {
                break;
            }
            self.advance();
        }
        self.expect_special(b')')?;

        let any_named = items.iter().any(|i| matches!(i, ParamItem::Named(..)));
        if !any_named {
            return Ok(items
                .into_iter()
                .map(|item| match item {
                    ParamItem::Bare(typ, pos) | ParamItem::Named(_, typ, pos) => Field {
                        name: None,
                        typ,
                        pos,
                    },
                })
                .collect());
        }

        // Grouped names take the type of the next named entry: (a, b int)
        let mut fields = Vec::with_capacity(items.len());
        let mut group_type: Option<TypeExpr> = None;
        for item in items.into_iter().rev() {
            match item {
                ParamItem::Named(name, typ, pos) => {
                    group_type = Some(typ.clone());
                    fields.push(Field {
                        name: Some(name),
                        typ,
                        pos,
                    });
                }
                ParamItem::Bare(TypeExpr::Name(name, npos), pos) => {
                    let typ = group_type
                        .clone()
                        .ok_or_else(|| ParseError::new("mixed named and unnamed parameters", pos))?;
                    let id = self.node_id();
                    fields.push(Field {
                        name: Some(Ident {
                            id,
                            name,
                            pos: npos,
                        }),
                        typ,
                        pos,
                    });
                }
                ParamItem::Bare(_, pos) => {
                    return Err(ParseError::new("mixed named and unnamed parameters", pos))
                }
            }
        }
        fields.reverse();
        Ok(fields)
    }

    fn parse_param_item(&mut self) -> ParseResult<ParamItem> {
        let pos = self.current_pos();
        if self.is_special_token(SpecialToken::Ellipsis) {
            return Err(ParseError::new("variadic parameters are not supported", pos));
        }
        if self.peek() == TokenType::Ident {
            let next_starts_type = self.peek_at(1).is_some_and(|t| {
                t.typ == TokenType::Ident || t.is_special(b'*' as u32) || t.is_special(b'[' as u32)
            });
            if next_starts_type {
                let name = self.expect_ident()?;
                let typ = self.parse_type()?;
                return Ok(ParamItem::Named(name, typ, pos));
            }
        }
        Ok(ParamItem::Bare(self.parse_type()?, pos))
    }

    fn parse_result(&mut self) -> ParseResult<Vec<Field>> {
        if self.is_special(b'(') {
            return self.parse_parameters();
        }
        if self.peek() == TokenType::Ident || self.is_special(b'*') || self.is_special(b'[') {
            let pos = self.current_pos();
            let typ = self.parse_type()?;
            return Ok(vec![Field {
                name: None,
                typ,
                pos,
            }]);
        }
        Ok(Vec::new())
    }

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let pos = self.current_pos();
        if self.is_special(b'*') {
            self.advance();
            return Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)));
        }
        if self.is_special(b'[') {
            self.advance();
            let len = match self.current().value {
                TokenValue::Int(n) => n,
                _ if self.is_special(b']') => {
                    return Err(ParseError::new("slice types are not supported", pos))
                }
                _ => return Err(self.unexpected("array length literal")),
            };
            self.advance();
            self.expect_special(b']')?;
            return Ok(TypeExpr::Array(len, Box::new(self.parse_type()?)));
        }
        match self.current().value {
            TokenValue::Ident(name) => {
                self.advance();
                if self.is_special(b'.') {
                    return Err(ParseError::new("qualified types are not supported", pos));
                }
                Ok(TypeExpr::Name(name, pos))
            }
            TokenValue::Keyword(
                kw @ (Keyword::Map
                | Keyword::Chan
                | Keyword::Struct
                | Keyword::Interface
                | Keyword::Func),
            ) => Err(ParseError::new(
                format!("{} types are not supported", kw.as_str()),
                pos,
            )),
            _ => Err(self.unexpected("type")),
        }
    }

    /// VarSpec, or a parenthesized group of them
    fn parse_var_specs(&mut self) -> ParseResult<Vec<VarSpec>> {
        if self.is_special(b'(') {
            self.advance();
            let mut specs = Vec::new();
            while !self.is_special(b')') {
                specs.push(self.parse_var_spec()?);
                self.expect_semi()?;
            }
            self.advance();
            Ok(specs)
        } else {
            Ok(vec![self.parse_var_spec()?])
        }
    }

    fn parse_var_spec(&mut self) -> ParseResult<VarSpec> {
        let pos = self.current_pos();
        let mut names = vec![self.expect_ident()?];
        while self.is_special(b',') {
            self.advance();
            names.push(self.expect_ident()?);
        }
        let typ = if self.is_special(b'=') {
            None
        } else {
            Some(self.parse_type()?)
        };
        let values = if self.is_special(b'=') {
            self.advance();
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Ok(VarSpec {
            names,
            typ,
            values,
            pos,
        })
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn parse_block(&mut self) -> ParseResult<Block> {
        let pos = self.current_pos();
        let id = self.node_id();
        self.expect_special(b'{')?;
        let stmts = self.parse_stmt_list()?;
        self.expect_special(b'}')?;
        Ok(Block { id, stmts, pos })
    }

    fn at_list_end(&self) -> bool {
        self.is_special(b'}')
            || self.is_keyword(Keyword::Case)
            || self.is_keyword(Keyword::Default)
            || self.peek() == TokenType::Eof
    }

    fn parse_stmt_list(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at_list_end() {
            if self.is_special(b';') {
                self.advance();
                continue;
            }
            stmts.push(self.parse_stmt()?);
            if !self.at_list_end() {
                self.expect_semi()?;
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        if let TokenValue::Keyword(kw) = self.current().value {
            match kw {
                Keyword::Var => {
                    self.advance();
                    let specs = self.parse_var_specs()?;
                    return Ok(self.stmt(StmtKind::Var(specs), pos));
                }
                Keyword::Return => {
                    self.advance();
                    let values = if self.is_special(b';') || self.is_special(b'}') {
                        Vec::new()
                    } else {
                        self.parse_expr_list()?
                    };
                    return Ok(self.stmt(StmtKind::Return(values), pos));
                }
                Keyword::Break | Keyword::Continue => {
                    self.advance();
                    let label = if self.peek() == TokenType::Ident {
                        Some(self.expect_ident()?)
                    } else {
                        None
                    };
                    let kind = if kw == Keyword::Break {
                        StmtKind::Break(label)
                    } else {
                        StmtKind::Continue(label)
                    };
                    return Ok(self.stmt(kind, pos));
                }
                Keyword::Goto => {
                    self.advance();
                    let label = self.expect_ident()?;
                    return Ok(self.stmt(StmtKind::Goto(label), pos));
                }
                Keyword::Fallthrough => {
                    self.advance();
                    return Ok(self.stmt(StmtKind::Fallthrough, pos));
                }
                Keyword::If => return self.parse_if(),
                Keyword::For => return self.parse_for(),
                Keyword::Switch => return self.parse_switch(),
                Keyword::Go | Keyword::Defer => {
                    self.advance();
                    let call = self.parse_expr()?;
                    if !matches!(call.unparen().kind, ExprKind::Call { .. }) {
                        return Err(ParseError::new(
                            format!("expression in {} must be function call", kw.as_str()),
                            call.pos,
                        ));
                    }
                    let kind = if kw == Keyword::Go {
                        StmtKind::Go(call)
                    } else {
                        StmtKind::Defer(call)
                    };
                    return Ok(self.stmt(kind, pos));
                }
                Keyword::Func => {
                    // Let the simple statement path reject function literals
                }
                _ => {
                    return Err(ParseError::new(
                        format!("{} statements are not supported", kw.as_str()),
                        pos,
                    ))
                }
            }
        }

        if self.is_special(b'{') {
            let block = self.parse_block()?;
            return Ok(self.stmt(StmtKind::Block(block), pos));
        }

        // Labeled statement: Ident ':'
        if self.peek() == TokenType::Ident
            && self.peek_at(1).is_some_and(|t| t.is_special(b':' as u32))
        {
            let label = self.expect_ident()?;
            self.advance();
            let stmt = if self.at_list_end() || self.is_special(b';') {
                let epos = self.current_pos();
                self.stmt(StmtKind::Empty, epos)
            } else {
                self.parse_stmt()?
            };
            return Ok(self.stmt(
                StmtKind::Labeled {
                    label,
                    stmt: Box::new(stmt),
                },
                pos,
            ));
        }

        self.parse_simple_stmt()
    }

    fn parse_simple_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        let mut lhs = self.parse_expr_list()?;

        if self.is_special_token(SpecialToken::Define) {
            self.advance();
            let mut names = Vec::with_capacity(lhs.len());
            for e in &lhs {
                match e.kind {
                    ExprKind::Ident(name) => names.push(Ident {
                        id: e.id,
                        name,
                        pos: e.pos,
                    }),
                    _ => {
                        return Err(ParseError::new(
                            "non-name on left side of :=",
                            e.pos,
                        ))
                    }
                }
            }
            let values = self.parse_expr_list()?;
            return Ok(self.stmt(StmtKind::Define { names, values }, pos));
        }

        if let Some(op) = self.assign_op() {
            self.advance();
            let rhs = self.parse_expr_list()?;
            if !matches!(op, AssignOp::Assign) && (lhs.len() != 1 || rhs.len() != 1) {
                return Err(ParseError::new(
                    "assignment operation requires single-valued expressions",
                    pos,
                ));
            }
            return Ok(self.stmt(StmtKind::Assign { lhs, op, rhs }, pos));
        }

        if self.is_special_token(SpecialToken::Increment)
            || self.is_special_token(SpecialToken::Decrement)
        {
            let inc = self.is_special_token(SpecialToken::Increment);
            self.advance();
            if lhs.len() != 1 {
                return Err(self.unexpected(if inc { "++" } else { "--" }));
            }
            let target = lhs.remove(0);
            return Ok(self.stmt(StmtKind::IncDec { target, inc }, pos));
        }

        if lhs.len() != 1 {
            return Err(self.unexpected(":= or = or comma"));
        }
        let expr = lhs.remove(0);
        Ok(self.stmt(StmtKind::Expr(expr), pos))
    }

    fn assign_op(&self) -> Option<AssignOp> {
        let tok = self.current();
        if tok.typ != TokenType::Special {
            return None;
        }
        let TokenValue::Special(c) = tok.value else {
            return None;
        };
        if c == b'=' as u32 {
            return Some(AssignOp::Assign);
        }
        let op = match c {
            c if c == SpecialToken::AddAssign as u32 => BinaryOp::Add,
            c if c == SpecialToken::SubAssign as u32 => BinaryOp::Sub,
            c if c == SpecialToken::MulAssign as u32 => BinaryOp::Mul,
            c if c == SpecialToken::DivAssign as u32 => BinaryOp::Div,
            c if c == SpecialToken::ModAssign as u32 => BinaryOp::Mod,
            c if c == SpecialToken::AndAssign as u32 => BinaryOp::And,
            c if c == SpecialToken::OrAssign as u32 => BinaryOp::Or,
            c if c == SpecialToken::XorAssign as u32 => BinaryOp::Xor,
            c if c == SpecialToken::ShlAssign as u32 => BinaryOp::Shl,
            c if c == SpecialToken::ShrAssign as u32 => BinaryOp::Shr,
            c if c == SpecialToken::AndNotAssign as u32 => BinaryOp::AndNot,
            _ => return None,
        };
        Some(AssignOp::Compound(op))
    }

    /// Optional header statement of if/switch, followed by the expression
    fn parse_header(&mut self) -> ParseResult<(Option<Box<Stmt>>, Option<Expr>)> {
        if self.is_special(b'{') {
            return Ok((None, None));
        }
        let init = if self.is_special(b';') {
            None
        } else {
            Some(self.parse_simple_stmt()?)
        };
        if self.is_special(b';') {
            self.advance();
            let expr = if self.is_special(b'{') {
                None
            } else {
                Some(self.parse_expr()?)
            };
            return Ok((init.map(Box::new), expr));
        }
        match init {
            Some(Stmt {
                kind: StmtKind::Expr(e),
                ..
            }) => Ok((None, Some(e))),
            Some(s) => Err(ParseError::new(
                format!("cannot use {} as value", s.kind.describe()),
                s.pos,
            )),
            None => Ok((None, None)),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.expect_keyword(Keyword::If)?;
        let (init, cond) = self.parse_header()?;
        let cond = cond.ok_or_else(|| ParseError::new("missing condition in if statement", pos))?;
        let then = self.parse_block()?;
        let els = if self.is_keyword(Keyword::Else) {
            self.advance();
            if self.is_keyword(Keyword::If) {
                Some(Box::new(self.parse_if()?))
            } else if self.is_special(b'{') {
                let epos = self.current_pos();
                let block = self.parse_block()?;
                Some(Box::new(self.stmt(StmtKind::Block(block), epos)))
            } else {
                return Err(self.unexpected("if statement or block"));
            }
        } else {
            None
        };
        Ok(self.stmt(
            StmtKind::If {
                init,
                cond,
                then,
                els,
            },
            pos,
        ))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.expect_keyword(Keyword::For)?;

        let mut init = None;
        let mut cond = None;
        let mut post = None;

        if !self.is_special(b'{') {
            let first = if self.is_special(b';') {
                None
            } else {
                if self.is_keyword(Keyword::Range) {
                    return Err(ParseError::new("range loops are not supported", pos));
                }
                Some(self.parse_simple_stmt()?)
            };
            if self.is_special(b'{') {
                match first {
                    Some(Stmt {
                        kind: StmtKind::Expr(e),
                        ..
                    }) => cond = Some(e),
                    Some(s) => {
                        return Err(ParseError::new(
                            format!("cannot use {} as value", s.kind.describe()),
                            s.pos,
                        ))
                    }
                    None => {}
                }
            } else {
                init = first.map(Box::new);
                self.expect_special(b';')?;
                if !self.is_special(b';') {
                    cond = Some(self.parse_expr()?);
                }
                self.expect_special(b';')?;
                if !self.is_special(b'{') {
                    post = Some(Box::new(self.parse_simple_stmt()?));
                }
            }
        }

        if let Some(p) = &post {
            if matches!(p.kind, StmtKind::Define { .. }) {
                return Err(ParseError::new("cannot declare in post statement of for loop", p.pos));
            }
        }

        let body = self.parse_block()?;
        Ok(self.stmt(
            StmtKind::For {
                init,
                cond,
                post,
                body,
            },
            pos,
        ))
    }

    fn parse_switch(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.expect_keyword(Keyword::Switch)?;
        let (init, tag) = self.parse_header()?;
        self.expect_special(b'{')?;

        let mut clauses = Vec::new();
        while !self.is_special(b'}') {
            let cpos = self.current_pos();
            let id = self.node_id();
            let (exprs, is_default) = if self.is_keyword(Keyword::Case) {
                self.advance();
                (self.parse_expr_list()?, false)
            } else if self.is_keyword(Keyword::Default) {
                self.advance();
                (Vec::new(), true)
            } else {
                return Err(self.unexpected("case or default or }"));
            };
            self.expect_special(b':')?;
            let body = self.parse_stmt_list()?;
            clauses.push(CaseClause {
                id,
                exprs,
                is_default,
                body,
                pos: cpos,
            });
        }
        self.advance();

        if clauses.iter().filter(|c| c.is_default).count() > 1 {
            return Err(ParseError::new("multiple defaults in switch", pos));
        }

        Ok(self.stmt(StmtKind::Switch { init, tag, clauses }, pos))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn parse_expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.is_special(b',') {
            self.advance();
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_binary(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let tok = self.current();
        let TokenValue::Special(c) = tok.value else {
            return None;
        };
        if c < SpecialToken::BASE {
            return match c as u8 {
                b'+' => Some(BinaryOp::Add),
                b'-' => Some(BinaryOp::Sub),
                b'*' => Some(BinaryOp::Mul),
                b'/' => Some(BinaryOp::Div),
                b'%' => Some(BinaryOp::Mod),
                b'&' => Some(BinaryOp::And),
                b'|' => Some(BinaryOp::Or),
                b'^' => Some(BinaryOp::Xor),
                b'<' => Some(BinaryOp::Lt),
                b'>' => Some(BinaryOp::Gt),
                _ => None,
            };
        }
        match c {
            c if c == SpecialToken::AndNot as u32 => Some(BinaryOp::AndNot),
            c if c == SpecialToken::LeftShift as u32 => Some(BinaryOp::Shl),
            c if c == SpecialToken::RightShift as u32 => Some(BinaryOp::Shr),
            c if c == SpecialToken::Equal as u32 => Some(BinaryOp::Eq),
            c if c == SpecialToken::NotEqual as u32 => Some(BinaryOp::Ne),
            c if c == SpecialToken::Lte as u32 => Some(BinaryOp::Le),
            c if c == SpecialToken::Gte as u32 => Some(BinaryOp::Ge),
            c if c == SpecialToken::LogicalAnd as u32 => Some(BinaryOp::LogAnd),
            c if c == SpecialToken::LogicalOr as u32 => Some(BinaryOp::LogOr),
            _ => None,
        }
    }

    /// Precedence climbing: all binary operators are left associative
    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            let pos = self.current_pos();
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            left = self.expr(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let pos = self.current_pos();
        let op = match self.current().value {
            TokenValue::Special(c) if c == b'+' as u32 => Some(UnaryOp::Plus),
            TokenValue::Special(c) if c == b'-' as u32 => Some(UnaryOp::Neg),
            TokenValue::Special(c) if c == b'!' as u32 => Some(UnaryOp::Not),
            TokenValue::Special(c) if c == b'^' as u32 => Some(UnaryOp::Com),
            TokenValue::Special(c) if c == b'&' as u32 => Some(UnaryOp::AddrOf),
            TokenValue::Special(c) if c == b'*' as u32 => Some(UnaryOp::Deref),
            TokenValue::Special(c) if c == SpecialToken::Arrow as u32 => {
                return Err(ParseError::new("channel receive is not supported", pos))
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.expr(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    pos,
                ))
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_operand()?;
        loop {
            let pos = self.current_pos();
            if self.is_special(b'(') {
                self.advance();
                let mut args = Vec::new();
                while !self.is_special(b')') {
                    args.push(self.parse_expr()?);
                    if self.is_special_token(SpecialToken::Ellipsis) {
                        return Err(ParseError::new("variadic calls are not supported", pos));
                    }
                    if !self.is_special(b',') {
                        break;
                    }
                    self.advance();
                }
                self.expect_special(b')')?;
                expr = self.expr(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    pos,
                );
            } else if self.is_special(b'[') {
                self.advance();
                let index = self.parse_expr()?;
                if self.is_special(b':') {
                    return Err(ParseError::new("slice expressions are not supported", pos));
                }
                self.expect_special(b']')?;
                expr = self.expr(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            } else if self.is_special(b'.') {
                return Err(ParseError::new("selector expressions are not supported", pos));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_operand(&mut self) -> ParseResult<Expr> {
        let pos = self.current_pos();
        let kind = match &self.current().value {
            TokenValue::Int(v) => ExprKind::IntLit(*v),
            TokenValue::Float(v) => ExprKind::FloatLit(*v),
            TokenValue::Char(c) => ExprKind::CharLit(*c),
            TokenValue::String(s) => ExprKind::StringLit(s.clone()),
            TokenValue::Ident(name) => match self.strings.get(*name) {
                "true" => ExprKind::BoolLit(true),
                "false" => ExprKind::BoolLit(false),
                "nil" => ExprKind::Nil,
                _ => ExprKind::Ident(*name),
            },
            TokenValue::Special(c) if *c == b'(' as u32 => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_special(b')')?;
                return Ok(self.expr(ExprKind::Paren(Box::new(inner)), pos));
            }
            TokenValue::Keyword(Keyword::Func) => {
                return Err(ParseError::new("function literals are not supported", pos))
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(self.expr(kind, pos))
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Tokenize and parse a whole source file
pub fn parse_file(source: &str, stream: u16, strings: &mut StringTable) -> ParseResult<SourceFile> {
    let tokens = tokenize(source, stream, strings)?;
    let mut parser = Parser::new(tokens, strings);
    parser.parse_source_file()
}

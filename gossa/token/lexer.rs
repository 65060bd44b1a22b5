//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Lexer module for gossa - Go tokenizer
// Implements the Go lexical grammar, including automatic semicolon insertion
//

use crate::parse::{ParseError, ParseResult};
use crate::strings::{StringId, StringTable};

pub use crate::diag::Position;

// ============================================================================
// Token Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Ident,
    Keyword,
    Int,
    Float,
    Char,
    String,
    Special,
    Eof,
}

/// Go keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,
}

impl Keyword {
    fn from_str(s: &str) -> Option<Keyword> {
        let kw = match s {
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "chan" => Keyword::Chan,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "defer" => Keyword::Defer,
            "else" => Keyword::Else,
            "fallthrough" => Keyword::Fallthrough,
            "for" => Keyword::For,
            "func" => Keyword::Func,
            "go" => Keyword::Go,
            "goto" => Keyword::Goto,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "interface" => Keyword::Interface,
            "map" => Keyword::Map,
            "package" => Keyword::Package,
            "range" => Keyword::Range,
            "return" => Keyword::Return,
            "select" => Keyword::Select,
            "struct" => Keyword::Struct,
            "switch" => Keyword::Switch,
            "type" => Keyword::Type,
            "var" => Keyword::Var,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Chan => "chan",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Default => "default",
            Keyword::Defer => "defer",
            Keyword::Else => "else",
            Keyword::Fallthrough => "fallthrough",
            Keyword::For => "for",
            Keyword::Func => "func",
            Keyword::Go => "go",
            Keyword::Goto => "goto",
            Keyword::If => "if",
            Keyword::Import => "import",
            Keyword::Interface => "interface",
            Keyword::Map => "map",
            Keyword::Package => "package",
            Keyword::Range => "range",
            Keyword::Return => "return",
            Keyword::Select => "select",
            Keyword::Struct => "struct",
            Keyword::Switch => "switch",
            Keyword::Type => "type",
            Keyword::Var => "var",
        }
    }
}

/// Special tokens (operators and punctuators)
/// Single characters are stored as their ASCII value,
/// multi-character operators start at 256
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SpecialToken {
    AddAssign = 256, // +=
    SubAssign,       // -=
    MulAssign,       // *=
    DivAssign,       // /=
    ModAssign,       // %=
    AndAssign,       // &=
    OrAssign,        // |=
    XorAssign,       // ^=
    ShlAssign,       // <<=
    ShrAssign,       // >>=
    AndNotAssign,    // &^=
    AndNot,          // &^
    LeftShift,       // <<
    RightShift,      // >>
    LogicalAnd,      // &&
    LogicalOr,       // ||
    Arrow,           // <-
    Increment,       // ++
    Decrement,       // --
    Equal,           // ==
    NotEqual,        // !=
    Lte,             // <=
    Gte,             // >=
    Define,          // :=
    Ellipsis,        // ...
}

impl SpecialToken {
    pub const BASE: u32 = 256;

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialToken::AddAssign => "+=",
            SpecialToken::SubAssign => "-=",
            SpecialToken::MulAssign => "*=",
            SpecialToken::DivAssign => "/=",
            SpecialToken::ModAssign => "%=",
            SpecialToken::AndAssign => "&=",
            SpecialToken::OrAssign => "|=",
            SpecialToken::XorAssign => "^=",
            SpecialToken::ShlAssign => "<<=",
            SpecialToken::ShrAssign => ">>=",
            SpecialToken::AndNotAssign => "&^=",
            SpecialToken::AndNot => "&^",
            SpecialToken::LeftShift => "<<",
            SpecialToken::RightShift => ">>",
            SpecialToken::LogicalAnd => "&&",
            SpecialToken::LogicalOr => "||",
            SpecialToken::Arrow => "<-",
            SpecialToken::Increment => "++",
            SpecialToken::Decrement => "--",
            SpecialToken::Equal => "==",
            SpecialToken::NotEqual => "!=",
            SpecialToken::Lte => "<=",
            SpecialToken::Gte => ">=",
            SpecialToken::Define => ":=",
            SpecialToken::Ellipsis => "...",
        }
    }
}

/// Three-character operators first, then two-character ones
const MULTI_CHAR_OPS: &[(&str, SpecialToken)] = &[
    ("<<=", SpecialToken::ShlAssign),
    (">>=", SpecialToken::ShrAssign),
    ("&^=", SpecialToken::AndNotAssign),
    ("...", SpecialToken::Ellipsis),
    ("+=", SpecialToken::AddAssign),
    ("-=", SpecialToken::SubAssign),
    ("*=", SpecialToken::MulAssign),
    ("/=", SpecialToken::DivAssign),
    ("%=", SpecialToken::ModAssign),
    ("&=", SpecialToken::AndAssign),
    ("|=", SpecialToken::OrAssign),
    ("^=", SpecialToken::XorAssign),
    ("&^", SpecialToken::AndNot),
    ("<<", SpecialToken::LeftShift),
    (">>", SpecialToken::RightShift),
    ("&&", SpecialToken::LogicalAnd),
    ("||", SpecialToken::LogicalOr),
    ("<-", SpecialToken::Arrow),
    ("++", SpecialToken::Increment),
    ("--", SpecialToken::Decrement),
    ("==", SpecialToken::Equal),
    ("!=", SpecialToken::NotEqual),
    ("<=", SpecialToken::Lte),
    (">=", SpecialToken::Gte),
    (":=", SpecialToken::Define),
];

const SINGLE_CHAR_OPS: &str = "+-*/%&|^<>=!()[]{},;.:~";

// ============================================================================
// Token
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Ident(StringId),
    Keyword(Keyword),
    Int(u64),
    Float(f64),
    Char(u32),
    String(String),
    Special(u32),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub typ: TokenType,
    pub pos: Position,
    pub value: TokenValue,
}

impl Token {
    pub fn new(typ: TokenType, pos: Position, value: TokenValue) -> Self {
        Self { typ, pos, value }
    }

    pub fn is_special(&self, c: u32) -> bool {
        self.typ == TokenType::Special && self.value == TokenValue::Special(c)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.value == TokenValue::Keyword(kw)
    }

    /// Tokens after which a newline terminates the statement
    fn ends_statement(&self) -> bool {
        match self.typ {
            TokenType::Ident
            | TokenType::Int
            | TokenType::Float
            | TokenType::Char
            | TokenType::String => true,
            TokenType::Keyword => matches!(
                self.value,
                TokenValue::Keyword(
                    Keyword::Break | Keyword::Continue | Keyword::Fallthrough | Keyword::Return
                )
            ),
            TokenType::Special => matches!(
                self.value,
                TokenValue::Special(c) if c == b')' as u32
                    || c == b']' as u32
                    || c == b'}' as u32
                    || c == SpecialToken::Increment as u32
                    || c == SpecialToken::Decrement as u32
            ),
            TokenType::Eof => false,
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

pub struct Lexer<'a> {
    chars: Vec<char>,
    offset: usize,
    line: u32,
    col: u16,
    stream: u16,
    strings: &'a mut StringTable,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, stream: u16, strings: &'a mut StringTable) -> Self {
        Self {
            chars: source.chars().collect(),
            offset: 0,
            line: 1,
            col: 1,
            stream,
            strings,
            tokens: Vec::new(),
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.stream, self.line, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.offset + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col = self.col.saturating_add(1);
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn push(&mut self, typ: TokenType, pos: Position, value: TokenValue) {
        self.tokens.push(Token::new(typ, pos, value));
    }

    /// Insert a semicolon if the previous token ends a statement
    fn newline(&mut self, pos: Position) {
        if self.tokens.last().is_some_and(|t| t.ends_statement()) {
            self.push(TokenType::Special, pos, TokenValue::Special(b';' as u32));
        }
    }

    /// Tokenize the whole input
    pub fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        while let Some(c) = self.peek() {
            let pos = self.pos();
            if c == '\n' {
                self.newline(pos);
                self.advance();
            } else if c.is_whitespace() {
                self.advance();
            } else if self.starts_with("//") {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if self.starts_with("/*") {
                self.block_comment(pos)?;
            } else if c.is_alphabetic() || c == '_' {
                self.ident(pos);
            } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.number(pos)?;
            } else if c == '"' {
                self.string(pos)?;
            } else if c == '`' {
                self.raw_string(pos)?;
            } else if c == '\'' {
                self.char_lit(pos)?;
            } else {
                self.special(pos)?;
            }
        }
        let pos = self.pos();
        self.newline(pos);
        self.push(TokenType::Eof, pos, TokenValue::None);
        Ok(self.tokens)
    }

    fn block_comment(&mut self, pos: Position) -> ParseResult<()> {
        self.advance();
        self.advance();
        let mut saw_newline = false;
        loop {
            if self.starts_with("*/") {
                self.advance();
                self.advance();
                break;
            }
            match self.advance() {
                Some('\n') => saw_newline = true,
                Some(_) => {}
                None => return Err(ParseError::new("comment not terminated", pos)),
            }
        }
        // A comment spanning lines acts like a newline
        if saw_newline {
            self.newline(pos);
        }
        Ok(())
    }

    fn ident(&mut self, pos: Position) {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match Keyword::from_str(&s) {
            Some(kw) => self.push(TokenType::Keyword, pos, TokenValue::Keyword(kw)),
            None => {
                let id = self.strings.intern(&s);
                self.push(TokenType::Ident, pos, TokenValue::Ident(id));
            }
        }
    }

    fn number(&mut self, pos: Position) -> ParseResult<()> {
        let mut text = String::new();
        let mut is_float = false;
        let radix_prefix = self.peek() == Some('0')
            && matches!(
                self.peek_at(1),
                Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')
            );
        if radix_prefix {
            text.push(self.advance().unwrap_or('0'));
            text.push(self.advance().unwrap_or('x'));
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    text.push(c);
                } else if c == '.' && !is_float {
                    is_float = true;
                    text.push(c);
                } else if (c == 'e' || c == 'E') && !text.contains(['e', 'E']) {
                    is_float = true;
                    text.push(c);
                    if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                        self.advance();
                        text.push(sign);
                    }
                } else {
                    break;
                }
                self.advance();
            }
        }

        let clean: String = text.chars().filter(|&c| c != '_').collect();
        if is_float {
            let v: f64 = clean
                .parse()
                .map_err(|_| ParseError::new(format!("invalid float literal {}", text), pos))?;
            self.push(TokenType::Float, pos, TokenValue::Float(v));
            return Ok(());
        }

        let (digits, radix) = match clean.get(..2) {
            Some("0x" | "0X") => (&clean[2..], 16),
            Some("0o" | "0O") => (&clean[2..], 8),
            Some("0b" | "0B") => (&clean[2..], 2),
            _ if clean.len() > 1 && clean.starts_with('0') => (&clean[1..], 8),
            _ => (clean.as_str(), 10),
        };
        let v = u64::from_str_radix(digits, radix)
            .map_err(|_| ParseError::new(format!("invalid integer literal {}", text), pos))?;
        self.push(TokenType::Int, pos, TokenValue::Int(v));
        Ok(())
    }

    fn escape(&mut self, pos: Position, quote: char) -> ParseResult<char> {
        let c = self
            .advance()
            .ok_or_else(|| ParseError::new("escape sequence not terminated", pos))?;
        let v = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            '\\' => '\\',
            'x' => {
                let mut v = 0u32;
                for _ in 0..2 {
                    let d = self
                        .advance()
                        .and_then(|d| d.to_digit(16))
                        .ok_or_else(|| ParseError::new("invalid hex escape", pos))?;
                    v = v * 16 + d;
                }
                char::from_u32(v).unwrap_or('\0')
            }
            '0'..='7' => {
                let mut v = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    let d = self
                        .advance()
                        .and_then(|d| d.to_digit(8))
                        .ok_or_else(|| ParseError::new("invalid octal escape", pos))?;
                    v = v * 8 + d;
                }
                char::from_u32(v).unwrap_or('\0')
            }
            c if c == quote => c,
            _ => return Err(ParseError::new("unknown escape sequence", pos)),
        };
        Ok(v)
    }

    fn string(&mut self, pos: Position) -> ParseResult<()> {
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => s.push(self.escape(pos, '"')?),
                Some('\n') | None => {
                    return Err(ParseError::new("string literal not terminated", pos))
                }
                Some(c) => s.push(c),
            }
        }
        self.push(TokenType::String, pos, TokenValue::String(s));
        Ok(())
    }

    fn raw_string(&mut self, pos: Position) -> ParseResult<()> {
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('`') => break,
                Some('\r') => {}
                Some(c) => s.push(c),
                None => return Err(ParseError::new("raw string literal not terminated", pos)),
            }
        }
        self.push(TokenType::String, pos, TokenValue::String(s));
        Ok(())
    }

    fn char_lit(&mut self, pos: Position) -> ParseResult<()> {
        self.advance();
        let c = match self.advance() {
            Some('\\') => self.escape(pos, '\'')?,
            Some('\'') | Some('\n') | None => {
                return Err(ParseError::new("empty rune literal or unescaped ' in rune literal", pos))
            }
            Some(c) => c,
        };
        if self.advance() != Some('\'') {
            return Err(ParseError::new("rune literal not terminated", pos));
        }
        self.push(TokenType::Char, pos, TokenValue::Char(c as u32));
        Ok(())
    }

    fn special(&mut self, pos: Position) -> ParseResult<()> {
        for (text, tok) in MULTI_CHAR_OPS {
            if self.starts_with(text) {
                for _ in 0..text.len() {
                    self.advance();
                }
                self.push(TokenType::Special, pos, TokenValue::Special(*tok as u32));
                return Ok(());
            }
        }
        match self.peek() {
            Some(c) if SINGLE_CHAR_OPS.contains(c) => {
                self.advance();
                self.push(TokenType::Special, pos, TokenValue::Special(c as u32));
                Ok(())
            }
            Some(c) => Err(ParseError::new(format!("invalid character {:?}", c), pos)),
            None => Ok(()),
        }
    }
}

/// Tokenize a source string
pub fn tokenize(source: &str, stream: u16, strings: &mut StringTable) -> ParseResult<Vec<Token>> {
    Lexer::new(source, stream, strings).tokenize()
}

/// Render a token for error messages
pub fn show_token(token: &Token, strings: &StringTable) -> String {
    match &token.value {
        TokenValue::None => "EOF".to_string(),
        TokenValue::Ident(id) => strings.get(*id).to_string(),
        TokenValue::Keyword(kw) => kw.as_str().to_string(),
        TokenValue::Int(v) => v.to_string(),
        TokenValue::Float(v) => v.to_string(),
        TokenValue::Char(c) => format!("{:?}", char::from_u32(*c).unwrap_or('?')),
        TokenValue::String(s) => format!("{:?}", s),
        TokenValue::Special(c) if *c == b';' as u32 => "newline".to_string(),
        TokenValue::Special(c) if *c < SpecialToken::BASE => {
            char::from_u32(*c).unwrap_or('?').to_string()
        }
        TokenValue::Special(c) => MULTI_CHAR_OPS
            .iter()
            .find(|(_, t)| *t as u32 == *c)
            .map(|(_, t)| t.as_str().to_string())
            .unwrap_or_else(|| "?".to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, StringTable) {
        let mut strings = StringTable::new();
        let tokens = tokenize(src, 0, &mut strings).unwrap();
        (tokens, strings)
    }

    fn shown(src: &str) -> Vec<String> {
        let (tokens, strings) = lex(src);
        tokens.iter().map(|t| show_token(t, &strings)).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        let (tokens, strings) = lex("func addOne");
        assert!(tokens[0].is_keyword(Keyword::Func));
        assert_eq!(tokens[1].typ, TokenType::Ident);
        assert_eq!(show_token(&tokens[1], &strings), "addOne");
    }

    #[test]
    fn test_semicolon_insertion() {
        assert_eq!(
            shown("x := 1\nreturn\n}\n"),
            vec!["x", ":=", "1", "newline", "return", "newline", "}", "newline", "EOF"]
        );
        // No semicolon after an operator at end of line
        assert_eq!(shown("a +\nb"), vec!["a", "+", "b", "newline", "EOF"]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            shown("a &^= b << 2 && c != d"),
            vec!["a", "&^=", "b", "<<", "2", "&&", "c", "!=", "d", "newline", "EOF"]
        );
        assert_eq!(shown("x++"), vec!["x", "++", "newline", "EOF"]);
    }

    #[test]
    fn test_numbers() {
        let (tokens, _) = lex("0x1F 017 0b101 1_000 2.5 1e3");
        assert_eq!(tokens[0].value, TokenValue::Int(31));
        assert_eq!(tokens[1].value, TokenValue::Int(15));
        assert_eq!(tokens[2].value, TokenValue::Int(5));
        assert_eq!(tokens[3].value, TokenValue::Int(1000));
        assert_eq!(tokens[4].value, TokenValue::Float(2.5));
        assert_eq!(tokens[5].value, TokenValue::Float(1000.0));
    }

    #[test]
    fn test_strings_and_chars() {
        let (tokens, _) = lex(r#""a\tb" `raw\n` 'x' '\n'"#);
        assert_eq!(tokens[0].value, TokenValue::String("a\tb".to_string()));
        assert_eq!(tokens[1].value, TokenValue::String("raw\\n".to_string()));
        assert_eq!(tokens[2].value, TokenValue::Char('x' as u32));
        assert_eq!(tokens[3].value, TokenValue::Char('\n' as u32));
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            shown("a // trailing\n/* block\n */ b"),
            vec!["a", "newline", "b", "newline", "EOF"]
        );
    }

    #[test]
    fn test_positions() {
        let (tokens, _) = lex("a\n  b");
        assert_eq!((tokens[0].pos.line, tokens[0].pos.col), (1, 1));
        assert_eq!((tokens[2].pos.line, tokens[2].pos.col), (2, 3));
    }

    #[test]
    fn test_errors() {
        let mut strings = StringTable::new();
        assert!(tokenize("\"open", 0, &mut strings).is_err());
        assert!(tokenize("a $ b", 0, &mut strings).is_err());
        assert!(tokenize("/* never closed", 0, &mut strings).is_err());
    }
}

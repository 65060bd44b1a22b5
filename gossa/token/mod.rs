//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Token module - Go lexer
//

pub mod lexer;

pub use lexer::{show_token, tokenize, Keyword, SpecialToken, Token, TokenType, TokenValue};

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the binary layout of a parsed program.
//
// a parsed statement is a sequence of variable length tokens terminated by a
// semicolon terminal token; a sequence of statements is terminated by a zero
// byte. each token starts with a one byte header, the low nibble is the
// token kind, the high nibble carries either the token length in bytes, or
// the index of a terminal within its group, or the value kind of a constant.
// all multi-byte fields are little-endian:
//
// | kind              | header high nibble | layout                                        | bytes |
// |-------------------|--------------------|-----------------------------------------------|-------|
// | reserved word     | length (3 or 5)    | hdr, command code u16, optional link step u16 | 3 / 5 |
// | internal function | length (3)         | hdr, function code u16                        | 3     |
// | external function | length (3)         | hdr, function index u16                       | 3     |
// | variable          | length (4)         | hdr, ident info u8, name idx u8, value idx u8 | 4     |
// | constant          | value kind         | hdr, payload u32 (i32 / f32 / string index)   | 5     |
// | generic name      | length (5)         | hdr, generic name index u32                   | 5     |
// | terminal          | index in group     | hdr, flat terminal code u8                    | 2     |
//
// the stream is position addressable: block forward links, function start
// addresses and breakpoints all refer to tokens with a 16-bit offset from
// the start of the program buffer (a 'step').

use justina_types::command::CmdCode;
use justina_types::function::FuncCode;
use justina_types::terminal::{term_code_from_flat, TermCode, TERMINAL_GROUP_SIZE};
use justina_types::{Scope, ValueKind};

pub mod program_buffer;
pub mod reader;
pub mod writer;

/// a 16-bit offset into the program buffer, identifying a token boundary
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
pub struct Step(pub u16);

impl Step {
    pub const ZERO: Step = Step(0);

    /// offset arithmetic never wraps: a step past the end of the buffer is
    /// a bug in the caller, not a valid position
    pub fn advance(self, bytes: usize) -> Option<Step> {
        let next = (self.0 as usize).checked_add(bytes)?;
        u16::try_from(next).ok().map(Step)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// token kind, the low nibble of the token header.
/// a zero header byte terminates the token stream.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    ResWord = 0x1,
    InternFunc = 0x2,
    ExternFunc = 0x3,
    Variable = 0x4,
    Constant = 0x5,
    GenericName = 0x6,
    TerminalGroup1 = 0x7,
    TerminalGroup2 = 0x8,
    TerminalGroup3 = 0x9,
}

impl TokenKind {
    pub fn from_header(header: u8) -> Option<TokenKind> {
        match header & 0x0F {
            0x1 => Some(TokenKind::ResWord),
            0x2 => Some(TokenKind::InternFunc),
            0x3 => Some(TokenKind::ExternFunc),
            0x4 => Some(TokenKind::Variable),
            0x5 => Some(TokenKind::Constant),
            0x6 => Some(TokenKind::GenericName),
            0x7 => Some(TokenKind::TerminalGroup1),
            0x8 => Some(TokenKind::TerminalGroup2),
            0x9 => Some(TokenKind::TerminalGroup3),
            _ => None,
        }
    }
}

/// variable token ident info bits
pub const VAR_SCOPE_MASK: u8 = 0x07;
pub const VAR_IS_ARRAY: u8 = 0x08;
pub const VAR_IS_CONSTANT: u8 = 0x10;

/// a constant token payload
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TokenConst {
    Long(i32),
    Float(f32),
    /// index into the parsed string constant table
    Str(u32),
}

impl TokenConst {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            TokenConst::Long(_) => ValueKind::Long,
            TokenConst::Float(_) => ValueKind::Float,
            TokenConst::Str(_) => ValueKind::Str,
        }
    }
}

/// the abstract form of one token.
/// 'reader' decodes bytes into this, 'writer' encodes it into bytes.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Token {
    ResWord {
        cmd: CmdCode,
        /// forward link to the next block command (elseif, else, end) or,
        /// for break/continue/return, back to the open block start.
        /// present on all block related commands, patched during parsing.
        link: Option<Step>,
    },
    InternFunc(FuncCode),
    ExternFunc {
        func_index: u16,
    },
    Variable {
        scope: Scope,
        is_array: bool,
        is_const: bool,
        name_index: u8,
        value_index: u8,
    },
    Constant(TokenConst),
    GenericName {
        name_index: u32,
    },
    Terminal(TermCode),
}

impl Token {
    pub fn terminal(code: TermCode) -> Token {
        Token::Terminal(code)
    }

    /// encoded size in bytes
    pub fn length(&self) -> usize {
        match self {
            Token::ResWord { link, .. } => {
                if link.is_some() {
                    5
                } else {
                    3
                }
            }
            Token::InternFunc(_) | Token::ExternFunc { .. } => 3,
            Token::Variable { .. } => 4,
            Token::Constant(_) => 5,
            Token::GenericName { .. } => 5,
            Token::Terminal(_) => 2,
        }
    }

    pub fn is_terminal(&self, code: TermCode) -> bool {
        matches!(self, Token::Terminal(tc) if *tc == code)
    }

    pub fn is_semicolon(&self) -> bool {
        self.is_terminal(TermCode::Semicolon)
    }
}

/// the encoded length of the token starting with the given header byte.
/// returns None for the stream terminator (zero) and malformed headers.
pub fn token_length_from_header(header: u8) -> Option<usize> {
    let kind = TokenKind::from_header(header)?;
    match kind {
        TokenKind::ResWord
        | TokenKind::InternFunc
        | TokenKind::ExternFunc
        | TokenKind::Variable
        | TokenKind::GenericName => Some((header >> 4) as usize),
        TokenKind::Constant => Some(5),
        TokenKind::TerminalGroup1 | TokenKind::TerminalGroup2 | TokenKind::TerminalGroup3 => {
            Some(2)
        }
    }
}

pub fn terminal_kind_and_index(code: TermCode) -> (TokenKind, u8) {
    let flat = code as u8;
    let kind = match flat / TERMINAL_GROUP_SIZE {
        0 => TokenKind::TerminalGroup1,
        1 => TokenKind::TerminalGroup2,
        _ => TokenKind::TerminalGroup3,
    };
    (kind, flat % TERMINAL_GROUP_SIZE)
}

pub fn terminal_from_parts(kind: TokenKind, flat_code: u8) -> Option<TermCode> {
    let group = match kind {
        TokenKind::TerminalGroup1 => 0,
        TokenKind::TerminalGroup2 => 1,
        TokenKind::TerminalGroup3 => 2,
        _ => return None,
    };
    let code = term_code_from_flat(flat_code)?;
    if code as u8 / TERMINAL_GROUP_SIZE == group {
        Some(code)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_step_advance() {
        assert_eq!(Step(0).advance(3), Some(Step(3)));
        assert_eq!(Step(0xFFFF).advance(1), None);
        assert_eq!(Step(0xFFF0).advance(0x20), None);
    }

    #[test]
    fn test_token_lengths() {
        assert_eq!(
            Token::ResWord {
                cmd: CmdCode::Print,
                link: None
            }
            .length(),
            3
        );
        assert_eq!(
            Token::ResWord {
                cmd: CmdCode::If,
                link: Some(Step::ZERO)
            }
            .length(),
            5
        );
        assert_eq!(Token::Terminal(TermCode::Semicolon).length(), 2);
        assert_eq!(Token::Constant(TokenConst::Long(7)).length(), 5);
    }

    #[test]
    fn test_terminal_group_roundtrip() {
        for code in [
            TermCode::Comma,
            TermCode::Semicolon,
            TermCode::Pow,
            TermCode::ShrAssign,
        ] {
            let (kind, _) = terminal_kind_and_index(code);
            assert_eq!(terminal_from_parts(kind, code as u8), Some(code));
        }
    }
}

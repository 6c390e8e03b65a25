// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use justina_types::ValueKind;

use crate::program_buffer::{Area, ProgramBuffer};
use crate::{terminal_kind_and_index, Step, Token, TokenConst, TokenKind};

/// appends encoded tokens to one area of the program buffer.
///
/// 'write' returns the step of the token just written, so the parser can
/// remember block start positions and patch their forward links later.
pub struct TokenWriter<'a> {
    buffer: &'a mut ProgramBuffer,
    area: Area,
}

impl<'a> TokenWriter<'a> {
    pub fn new(buffer: &'a mut ProgramBuffer, area: Area) -> Self {
        Self { buffer, area }
    }

    pub fn cursor(&self) -> Step {
        self.buffer.cursor(self.area)
    }

    /// encode and append one token. None means the area is full.
    pub fn write(&mut self, token: &Token) -> Option<Step> {
        let mut data = [0u8; 5];
        let length = token.length();
        if self.buffer.free_bytes(self.area) < length {
            return None;
        }

        match token {
            Token::ResWord { cmd, link } => {
                data[0] = TokenKind::ResWord as u8 | ((length as u8) << 4);
                data[1..3].copy_from_slice(&(*cmd as u16).to_le_bytes());
                if let Some(step) = link {
                    data[3..5].copy_from_slice(&step.0.to_le_bytes());
                }
            }
            Token::InternFunc(func) => {
                data[0] = TokenKind::InternFunc as u8 | ((length as u8) << 4);
                data[1..3].copy_from_slice(&(*func as u16).to_le_bytes());
            }
            Token::ExternFunc { func_index } => {
                data[0] = TokenKind::ExternFunc as u8 | ((length as u8) << 4);
                data[1..3].copy_from_slice(&func_index.to_le_bytes());
            }
            Token::Variable {
                scope,
                is_array,
                is_const,
                name_index,
                value_index,
            } => {
                data[0] = TokenKind::Variable as u8 | ((length as u8) << 4);
                let mut info = *scope as u8;
                if *is_array {
                    info |= crate::VAR_IS_ARRAY;
                }
                if *is_const {
                    info |= crate::VAR_IS_CONSTANT;
                }
                data[1] = info;
                data[2] = *name_index;
                data[3] = *value_index;
            }
            Token::Constant(value) => {
                data[0] = TokenKind::Constant as u8 | ((value.value_kind() as u8) << 4);
                let payload = match value {
                    TokenConst::Long(v) => *v as u32,
                    TokenConst::Float(v) => v.to_bits(),
                    TokenConst::Str(index) => *index,
                };
                data[1..5].copy_from_slice(&payload.to_le_bytes());
            }
            Token::GenericName { name_index } => {
                data[0] = TokenKind::GenericName as u8 | ((length as u8) << 4);
                data[1..5].copy_from_slice(&name_index.to_le_bytes());
            }
            Token::Terminal(code) => {
                let (kind, index) = terminal_kind_and_index(*code);
                data[0] = kind as u8 | (index << 4);
                data[1] = *code as u8;
            }
        }

        Some(self.buffer.append(self.area, &data[..length]))
    }

    /// patch the forward link field of a reserved word token written earlier
    pub fn patch_link(&mut self, at: Step, target: Step) {
        patch_link(self.buffer, at, target);
    }
}

/// patch a forward link outside of an active writer (the parser patches
/// block starts that live in the other area during mixed sessions)
pub fn patch_link(buffer: &mut ProgramBuffer, at: Step, target: Step) {
    let header = buffer.byte_at(at);
    debug_assert_eq!(header & 0x0F, TokenKind::ResWord as u8);
    debug_assert_eq!(header >> 4, 5, "reserved word token has no link field");
    let link_step = at.advance(3).unwrap();
    buffer.overwrite(link_step, &target.0.to_le_bytes());
}

/// the value kind stored in a constant token header, without decoding the
/// payload (used when deleting parsed string constants in a forward scan)
pub fn constant_kind_of_header(header: u8) -> Option<ValueKind> {
    if header & 0x0F == TokenKind::Constant as u8 {
        ValueKind::from_bits((header >> 4) & 0x03)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use justina_types::command::CmdCode;
    use justina_types::terminal::TermCode;
    use pretty_assertions::assert_eq;

    use crate::program_buffer::{Area, ProgramBuffer};
    use crate::reader::read_token;
    use crate::{Step, Token, TokenConst};

    use super::TokenWriter;

    #[test]
    fn test_write_read_roundtrip() {
        let mut buffer = ProgramBuffer::new();
        let mut writer = TokenWriter::new(&mut buffer, Area::Program);

        let tokens = [
            Token::ResWord {
                cmd: CmdCode::If,
                link: Some(Step::ZERO),
            },
            Token::Variable {
                scope: justina_types::Scope::Global,
                is_array: false,
                is_const: false,
                name_index: 2,
                value_index: 7,
            },
            Token::Terminal(TermCode::Gt),
            Token::Constant(TokenConst::Float(2.5)),
            Token::Terminal(TermCode::Semicolon),
        ];

        let mut steps = vec![];
        for token in &tokens {
            steps.push(writer.write(token).unwrap());
        }

        let mut step = Step::ZERO;
        for (expected, expected_step) in tokens.iter().zip(steps.iter()) {
            let (token, next) = read_token(buffer.bytes(), step).unwrap();
            assert_eq!(step, *expected_step);
            assert_eq!(&token, expected);
            step = next;
        }
        assert!(read_token(buffer.bytes(), step).is_none());
    }

    #[test]
    fn test_patch_link() {
        let mut buffer = ProgramBuffer::new();
        let mut writer = TokenWriter::new(&mut buffer, Area::Program);

        let start = writer
            .write(&Token::ResWord {
                cmd: CmdCode::While,
                link: Some(Step::ZERO),
            })
            .unwrap();
        writer.write(&Token::Terminal(TermCode::Semicolon)).unwrap();
        let end = writer
            .write(&Token::ResWord {
                cmd: CmdCode::End,
                link: Some(Step::ZERO),
            })
            .unwrap();
        writer.patch_link(start, end);

        let (token, _) = read_token(buffer.bytes(), start).unwrap();
        assert_eq!(
            token,
            Token::ResWord {
                cmd: CmdCode::While,
                link: Some(end)
            }
        );
    }
}

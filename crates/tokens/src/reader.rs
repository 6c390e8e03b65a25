// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// decoding a token stream, and formatting it back as source text.
//
// the formatted text of a syntactically valid statement reparses to a
// bytewise identical token stream, this is relied on by program listings
// and by the round trip tests.

use justina_types::command::cmd_def;
use justina_types::command::CmdCode;
use justina_types::function::{func_def, FuncCode};
use justina_types::terminal::{terminal_def, TermCode};
use justina_types::Scope;

use crate::{terminal_from_parts, Step, Token, TokenConst, TokenKind};

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// decode the token at the given step.
/// returns the token and the step of the next token, or None when the
/// stream terminator is reached.
pub fn read_token(bytes: &[u8], step: Step) -> Option<(Token, Step)> {
    let header = bytes[step.index()];
    let kind = TokenKind::from_header(header)?;
    let at = step.index();

    let token = match kind {
        TokenKind::ResWord => {
            let cmd = CmdCode::from_bits(read_u16(bytes, at + 1))?;
            let link = if header >> 4 == 5 {
                Some(Step(read_u16(bytes, at + 3)))
            } else {
                None
            };
            Token::ResWord { cmd, link }
        }
        TokenKind::InternFunc => Token::InternFunc(FuncCode::from_bits(read_u16(bytes, at + 1))?),
        TokenKind::ExternFunc => Token::ExternFunc {
            func_index: read_u16(bytes, at + 1),
        },
        TokenKind::Variable => {
            let info = bytes[at + 1];
            Token::Variable {
                scope: Scope::from_bits(info & crate::VAR_SCOPE_MASK)?,
                is_array: info & crate::VAR_IS_ARRAY != 0,
                is_const: info & crate::VAR_IS_CONSTANT != 0,
                name_index: bytes[at + 2],
                value_index: bytes[at + 3],
            }
        }
        TokenKind::Constant => {
            let payload = read_u32(bytes, at + 1);
            let value = match (header >> 4) & 0x03 {
                0x0 => TokenConst::Long(payload as i32),
                0x1 => TokenConst::Float(f32::from_bits(payload)),
                0x2 => TokenConst::Str(payload),
                _ => return None,
            };
            Token::Constant(value)
        }
        TokenKind::GenericName => Token::GenericName {
            name_index: read_u32(bytes, at + 1),
        },
        TokenKind::TerminalGroup1 | TokenKind::TerminalGroup2 | TokenKind::TerminalGroup3 => {
            Token::Terminal(terminal_from_parts(kind, bytes[at + 1])?)
        }
    };

    let next = step.advance(token.length())?;
    Some((token, next))
}

/// iterate tokens from a step until the stream terminator
pub struct TokenCursor<'a> {
    bytes: &'a [u8],
    step: Step,
}

impl<'a> TokenCursor<'a> {
    pub fn new(bytes: &'a [u8], step: Step) -> Self {
        Self { bytes, step }
    }

    pub fn step(&self) -> Step {
        self.step
    }
}

impl<'a> Iterator for TokenCursor<'a> {
    type Item = (Step, Token);

    fn next(&mut self) -> Option<(Step, Token)> {
        let (token, next) = read_token(self.bytes, self.step)?;
        let at = self.step;
        self.step = next;
        Some((at, token))
    }
}

/// the step just after the terminating semicolon of the statement starting
/// at 'step', or None when the statement runs into the stream terminator
pub fn next_statement_step(bytes: &[u8], step: Step) -> Option<Step> {
    let mut cursor = TokenCursor::new(bytes, step);
    cursor.find(|(_, token)| token.is_semicolon())?;
    let next = cursor.step();
    if bytes[next.index()] == 0 {
        None
    } else {
        Some(next)
    }
}

/// name lookups needed to format tokens back to text. the machine state
/// implements this, the formatter itself stays independent of it.
pub trait TokenNames {
    fn variable_name(&self, scope: Scope, name_index: u8) -> String;
    fn extern_func_name(&self, func_index: u16) -> String;
    fn string_const(&self, string_index: u32) -> String;
    fn generic_name(&self, name_index: u32) -> String;
}

/// format one statement starting at 'step' as source text,
/// including the closing ';'
pub fn print_statement(bytes: &[u8], step: Step, names: &dyn TokenNames) -> String {
    let mut text = String::new();
    let mut previous: Option<Token> = None;

    for (_, token) in TokenCursor::new(bytes, step) {
        if wants_space(previous.as_ref(), &token) {
            text.push(' ');
        }
        text.push_str(&token_text(&token, names));
        previous = Some(token);
        if token.is_semicolon() {
            break;
        }
    }
    text
}

/// format every statement from 'step' to the stream terminator, one line each
pub fn print_token_stream(bytes: &[u8], step: Step, names: &dyn TokenNames) -> String {
    let mut lines: Vec<String> = vec![];
    let mut at = Some(step);
    while let Some(step) = at {
        if bytes[step.index()] == 0 {
            break;
        }
        lines.push(print_statement(bytes, step, names));
        at = next_statement_step(bytes, step);
    }
    lines.join("\n")
}

fn wants_space(previous: Option<&Token>, token: &Token) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    // attached: '(' to what precedes it, and ',', ';', ')' and the postfix
    // '++'/'--' to what they follow. everything else is space separated.
    if matches!(
        token,
        Token::Terminal(TermCode::Comma)
            | Token::Terminal(TermCode::Semicolon)
            | Token::Terminal(TermCode::RightPar)
            | Token::Terminal(TermCode::LeftPar)
    ) {
        return false;
    }
    if matches!(previous, Token::Terminal(TermCode::LeftPar)) {
        return false;
    }
    true
}

fn token_text(token: &Token, names: &dyn TokenNames) -> String {
    match token {
        Token::ResWord { cmd, .. } => cmd_def(*cmd).name.to_owned(),
        Token::InternFunc(func) => func_def(*func).name.to_owned(),
        Token::ExternFunc { func_index } => names.extern_func_name(*func_index),
        Token::Variable {
            scope, name_index, ..
        } => names.variable_name(*scope, *name_index),
        Token::Constant(TokenConst::Long(v)) => format!("{}", v),
        // Debug formatting prints the shortest text that parses back to
        // the identical f32 bit pattern
        Token::Constant(TokenConst::Float(v)) => format!("{:?}", v),
        Token::Constant(TokenConst::Str(index)) => quote(&names.string_const(*index)),
        Token::GenericName { name_index } => names.generic_name(*name_index),
        Token::Terminal(code) => terminal_def(*code).name.to_owned(),
    }
}

fn quote(s: &str) -> String {
    let mut text = String::with_capacity(s.len() + 2);
    text.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            text.push('\\');
        }
        text.push(ch);
    }
    text.push('"');
    text
}

#[cfg(test)]
mod tests {
    use justina_types::command::CmdCode;
    use justina_types::terminal::TermCode;
    use pretty_assertions::assert_eq;

    use crate::program_buffer::{Area, ProgramBuffer};
    use crate::writer::TokenWriter;
    use crate::{Step, Token, TokenConst};

    use super::*;

    struct NoNames;

    impl TokenNames for NoNames {
        fn variable_name(&self, _scope: Scope, name_index: u8) -> String {
            format!("v{}", name_index)
        }
        fn extern_func_name(&self, func_index: u16) -> String {
            format!("f{}", func_index)
        }
        fn string_const(&self, _string_index: u32) -> String {
            "a\\b".to_owned()
        }
        fn generic_name(&self, _name_index: u32) -> String {
            "name".to_owned()
        }
    }

    fn write_all(buffer: &mut ProgramBuffer, tokens: &[Token]) {
        let mut writer = TokenWriter::new(buffer, Area::Program);
        for token in tokens {
            writer.write(token).unwrap();
        }
    }

    #[test]
    fn test_statement_walking() {
        let mut buffer = ProgramBuffer::new();
        write_all(
            &mut buffer,
            &[
                Token::Constant(TokenConst::Long(1)),
                Token::Terminal(TermCode::Semicolon),
                Token::Constant(TokenConst::Long(2)),
                Token::Terminal(TermCode::Semicolon),
            ],
        );

        let second = next_statement_step(buffer.bytes(), Step::ZERO).unwrap();
        let (token, _) = read_token(buffer.bytes(), second).unwrap();
        assert_eq!(token, Token::Constant(TokenConst::Long(2)));
        assert_eq!(next_statement_step(buffer.bytes(), second), None);
    }

    #[test]
    fn test_print_statement() {
        let mut buffer = ProgramBuffer::new();
        write_all(
            &mut buffer,
            &[
                Token::ResWord {
                    cmd: CmdCode::Print,
                    link: None,
                },
                Token::Variable {
                    scope: Scope::Global,
                    is_array: false,
                    is_const: false,
                    name_index: 3,
                    value_index: 0,
                },
                Token::Terminal(TermCode::Plus),
                Token::Constant(TokenConst::Float(1.5)),
                Token::Terminal(TermCode::Comma),
                Token::Constant(TokenConst::Str(0)),
                Token::Terminal(TermCode::Semicolon),
            ],
        );

        assert_eq!(
            print_statement(buffer.bytes(), Step::ZERO, &NoNames),
            r#"print v3 + 1.5, "a\\b";"#
        );
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// parse attempts for terminals, numbers and string literals, with the
// sequence checks that decide whether an operator is usable as prefix,
// infix or postfix at the current position.
//
// assignability is a parse time property: an assignment operator is only
// accepted directly after a variable (or array element) that still sits in
// an assignable position. any operator other than an assignment or a
// prefix ++/-- closes the window.

use justina_program::ConstValue;
use justina_tokens::{Token, TokenConst};
use justina_types::command::CmdCode;
use justina_types::error::{ParseErr, ParseError};
use justina_types::terminal::{TerminalDef, TermCode, PRIO_MASK, TERMINALS};

use crate::cursor::{is_identifier_char, InputCursor};
use crate::literals::{scan_number, scan_string, NumberValue};
use crate::{Emitted, LastToken, Parser};

/// longest terminal match at the start of 'rest'. word terminals (and, or,
/// not, to, step) only match on an identifier boundary.
fn match_terminal(rest: &[u8]) -> Option<(&'static TerminalDef, usize)> {
    let mut best: Option<(&'static TerminalDef, usize)> = None;
    for def in TERMINALS {
        let name = def.name.as_bytes();
        if !rest.starts_with(name) {
            continue;
        }
        if name[0].is_ascii_alphabetic()
            && rest.len() > name.len()
            && is_identifier_char(rest[name.len()])
        {
            continue;
        }
        if best.map_or(true, |(_, len)| name.len() > len) {
            best = Some((def, name.len()));
        }
    }
    best
}

impl<'a> Parser<'a> {
    pub(crate) fn try_terminal(
        &mut self,
        input: &mut InputCursor,
    ) -> Result<Option<Emitted>, ParseError> {
        let col = input.column();
        let Some((def, len)) = match_terminal(input.rest()) else {
            return Ok(None);
        };
        let code = def.code;
        input.advance(len);

        match code {
            TermCode::Semicolon => {
                if !self.parens.is_empty() {
                    return Err(self.error_at(ParseErr::MissingRightParenthesis, col));
                }
                if self.pending_prefix_incdec {
                    return Err(self.error_at(ParseErr::OperandExpected, col));
                }
                let complete = matches!(
                    self.last,
                    LastToken::ResWord(_) | LastToken::GenericName
                ) || self.last.ends_operand();
                if !complete {
                    return Err(self.error_at(ParseErr::ExpressionNotComplete, col));
                }
                self.emit(&Token::Terminal(code), col)?;
                Ok(Some(Emitted::Terminal(code)))
            }

            TermCode::Comma => {
                if self.pending_prefix_incdec {
                    return Err(self.error_at(ParseErr::OperandExpected, col));
                }
                if !(self.last.ends_operand() || self.last == LastToken::GenericName) {
                    return Err(self.error_at(ParseErr::OperandExpected, col));
                }
                if self.parens.is_empty() {
                    match self.cmd_def().map(|def| def.code) {
                        None => return Err(self.error_at(ParseErr::CommaNotAllowedHere, col)),
                        Some(CmdCode::For) => {
                            return Err(self.error_at(ParseErr::CommaNotAllowedHere, col))
                        }
                        Some(_) => {}
                    }
                    self.assignment_possible = true;
                }
                self.emit(&Token::Terminal(code), col)?;
                Ok(Some(Emitted::Terminal(code)))
            }

            TermCode::To | TermCode::StepSep => {
                let in_for = self.parens.is_empty()
                    && self.cmd_def().map(|def| def.code) == Some(CmdCode::For);
                if !in_for {
                    return Err(self.error_at(ParseErr::OperatorNotAllowedHere, col));
                }
                // 'to' separates the first and second argument, 'step' the
                // second and third
                let seps = self.cmd.as_ref().map(|ctx| ctx.seps).unwrap_or(0);
                let in_order = (code == TermCode::To && seps == 0)
                    || (code == TermCode::StepSep && seps == 1);
                if !in_order {
                    return Err(self.error_at(ParseErr::OperatorNotAllowedHere, col));
                }
                if !self.last.ends_operand() {
                    return Err(self.error_at(ParseErr::OperandExpected, col));
                }
                self.assignment_possible = false;
                self.emit(&Token::Terminal(code), col)?;
                Ok(Some(Emitted::Terminal(code)))
            }

            TermCode::LeftPar => self.open_paren(input, col).map(Some),
            TermCode::RightPar => self.close_paren(col).map(Some),

            _ => self.operator_token(input, def, col).map(Some),
        }
    }

    fn operator_token(
        &mut self,
        input: &mut InputCursor,
        def: &'static TerminalDef,
        col: usize,
    ) -> Result<Emitted, ParseError> {
        let code = def.code;
        let is_incdec = matches!(code, TermCode::Incr | TermCode::Decr);

        if self.last.ends_operand() {
            // infix or postfix position
            if is_incdec {
                if !matches!(self.last, LastToken::Variable { is_array: false }) {
                    return Err(self.error_at(ParseErr::OperatorNotAllowedHere, col));
                }
                self.assignment_possible = false;
                self.emit(&Token::Terminal(code), col)?;
                return Ok(Emitted::Terminal(code));
            }
            if def.infix_prio & PRIO_MASK == 0 {
                return Err(self.error_at(ParseErr::OperatorNotAllowedHere, col));
            }
            if code.is_assignment() {
                let assignable = matches!(self.last, LastToken::Variable { is_array: false })
                    && self.assignment_possible;
                if !assignable {
                    return Err(self.error_at(ParseErr::AssignmNotAllowedHere, col));
                }
            } else {
                self.assignment_possible = false;
            }
            self.emit(&Token::Terminal(code), col)?;
            Ok(Emitted::Terminal(code))
        } else {
            // operand position: only prefix operators
            if self.pending_prefix_incdec {
                return Err(self.error_at(ParseErr::OperandExpected, col));
            }
            if matches!(code, TermCode::Plus | TermCode::Minus) && self.in_const_initializer() {
                // fold the sign of an initializer constant into the constant
                input.skip_spaces();
                if matches!(input.peek(0), Some(byte) if byte.is_ascii_digit() || byte == b'.') {
                    if code == TermCode::Minus {
                        self.pending_negate = !self.pending_negate;
                    }
                    return match self.try_number(input)? {
                        Some(emitted) => Ok(emitted),
                        None => Err(self.error(ParseErr::ConstantValueExpected, input)),
                    };
                }
            }
            if is_incdec {
                self.pending_prefix_incdec = true;
                self.emit(&Token::Terminal(code), col)?;
                Ok(Emitted::Terminal(code))
            } else if def.prefix_prio & PRIO_MASK != 0 {
                self.assignment_possible = false;
                self.emit(&Token::Terminal(code), col)?;
                Ok(Emitted::Terminal(code))
            } else {
                Err(self.error_at(ParseErr::OperandExpected, col))
            }
        }
    }

    pub(crate) fn try_number(
        &mut self,
        input: &mut InputCursor,
    ) -> Result<Option<Emitted>, ParseError> {
        let starts_number = match input.peek(0) {
            Some(byte) if byte.is_ascii_digit() => true,
            Some(b'.') => matches!(input.peek(1), Some(next) if next.is_ascii_digit()),
            _ => false,
        };
        if !starts_number {
            return Ok(None);
        }

        let col = input.column();
        self.check_operand_position(col)?;

        let mut value = scan_number(input).map_err(|err| self.error_at(err, col))?;
        if self.pending_negate {
            self.pending_negate = false;
            value = match value {
                NumberValue::Long(v) => NumberValue::Long(v.wrapping_neg()),
                NumberValue::Float(v) => NumberValue::Float(-v),
            };
        }

        let (token_const, const_value) = match value {
            NumberValue::Long(v) => (TokenConst::Long(v), ConstValue::Long(v)),
            NumberValue::Float(v) => (TokenConst::Float(v), ConstValue::Float(v)),
        };
        self.emit(&Token::Constant(token_const), col)?;
        Ok(Some(Emitted::Constant(const_value)))
    }

    pub(crate) fn try_string(
        &mut self,
        input: &mut InputCursor,
    ) -> Result<Option<Emitted>, ParseError> {
        if input.peek(0) != Some(b'"') {
            return Ok(None);
        }
        let col = input.column();
        self.check_operand_position(col)?;

        let text = scan_string(input).map_err(|err| self.error_at(err, col))?;
        let index = self.machine.alloc_parsed_string(&text);
        if let Err(err) = self.emit(&Token::Constant(TokenConst::Str(index)), col) {
            self.machine.free_parsed_string(index);
            return Err(err);
        }
        Ok(Some(Emitted::Constant(ConstValue::Str(text.into()))))
    }

    /// common sequence check for literal operands
    fn check_operand_position(&self, col: usize) -> Result<(), ParseError> {
        if self.last.ends_operand() {
            return Err(self.error_at(ParseErr::OperatorExpected, col));
        }
        if matches!(self.last, LastToken::InternFunc(_) | LastToken::ExternFunc) {
            return Err(self.error_at(ParseErr::MissingLeftParenthesis, col));
        }
        if self.pending_prefix_incdec {
            return Err(self.error_at(ParseErr::OperandExpected, col));
        }
        Ok(())
    }

    /// true while parsing the constant of a declaration initializer or a
    /// parameter default, directly after its '='
    pub(crate) fn in_const_initializer(&self) -> bool {
        if self.last != LastToken::Terminal(TermCode::Assign) {
            return false;
        }
        if self.awaiting_param_default() {
            return true;
        }
        self.in_declaration()
            && self
                .cmd
                .as_ref()
                .map(|ctx| ctx.shape.assign_seen && ctx.shape.tokens_after_assign == 0)
                .unwrap_or(false)
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the statement parser.
//
// one statement is parsed per call, directly into the program buffer, the
// parser never builds a syntax tree. a single forward pass dispatches parse
// attempts in a fixed order:
//
//   reserved word -> terminal -> number -> string -> identifier
//   (an identifier resolves to internal function, external function,
//    variable or generic name, in that order)
//
// the ordering matters: reserved words win over identifiers, and terminals
// win over numbers, so '-' stays a prefix operator instead of being eaten
// by the number scanner. the one exception is a variable initializer, where
// a sign directly before a numeric constant is folded into the constant:
// '-2 ^ 2' at expression level is -(2 ^ 2), but 'var x = -2' stores -2.
//
// context carried across statements of one parse session: the open block
// stack and the function being defined. context local to one statement:
// the open parenthesis stack, the last-token state used for sequence
// checks, and the command validator.

use justina_program::{ConstValue, Machine};
use justina_tokens::program_buffer::Area;
use justina_tokens::writer::TokenWriter;
use justina_tokens::{Step, Token};
use justina_types::command::{CmdCode, CmdDef};
use justina_types::error::{ParseErr, ParseError};
use justina_types::function::FuncCode;
use justina_types::terminal::TermCode;
use justina_types::Scope;

pub mod command;
pub mod cursor;
pub mod expr;
pub mod idents;
pub mod literals;
pub mod parens;

pub use cursor::InputCursor;

use command::CmdContext;
use parens::ParenFrame;

/// the class of the most recently emitted token, the input of the
/// sequence checks
#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum LastToken {
    None,
    ResWord(CmdCode),
    Terminal(TermCode),
    Constant,
    Variable { is_array: bool },
    InternFunc(FuncCode),
    ExternFunc,
    GenericName,
}

impl LastToken {
    /// the last token completes an operand (a value may not follow, an
    /// infix or postfix operator may)
    pub(crate) fn ends_operand(&self) -> bool {
        match self {
            LastToken::Variable { .. } | LastToken::Constant => true,
            LastToken::Terminal(TermCode::RightPar) => true,
            // postfix ++/-- extend the operand to their left
            LastToken::Terminal(TermCode::Incr) | LastToken::Terminal(TermCode::Decr) => true,
            _ => false,
        }
    }
}

/// what a parse attempt emitted, handed to the command validator and the
/// parenthesis tracker after the token is in the buffer
#[derive(Debug)]
pub(crate) enum Emitted {
    ResWord(CmdCode),
    Terminal(TermCode),
    Constant(ConstValue),
    Variable {
        scope: Scope,
        value_index: u8,
        is_array: bool,
        step: Step,
    },
    InternFunc(FuncCode),
    ExternFunc {
        func_index: u16,
        is_definition: bool,
    },
    GenericName(String),
}

/// a parsed statement: where its tokens start, and the source line its
/// first token was on
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct StatementInfo {
    pub step: Step,
    pub line: u32,
    pub cmd: Option<CmdCode>,
}

/// an open block on the parsing stack
#[derive(Debug)]
pub(crate) struct BlockFrame {
    pub cmd: CmdCode,
    /// step of the block start command token
    pub start_step: Step,
    /// step of the most recent command in the forward link chain
    /// (the start itself, or the last elseif/else)
    pub tail_step: Step,
    /// the most recent block command, for sequence checks
    pub tail_cmd: CmdCode,
    /// for-loop control variable name, to refuse nested reuse
    pub control_var: Option<(Scope, u8)>,
}

pub struct Parser<'a> {
    pub machine: &'a mut Machine,
    pub(crate) area: Area,
    pub(crate) program_mode: bool,
    pub(crate) first_statement: bool,
    pub(crate) in_function: Option<u16>,
    pub(crate) open_blocks: Vec<BlockFrame>,

    // per-statement state
    pub(crate) parens: Vec<ParenFrame>,
    pub(crate) last: LastToken,
    pub(crate) last_was_space_sensitive: bool,
    pub(crate) stmt_start: Option<Step>,
    pub(crate) stmt_line: u32,
    pub(crate) cmd: Option<CmdContext>,
    pub(crate) assignment_possible: bool,
    pub(crate) pending_prefix_incdec: bool,
    pub(crate) pending_negate: bool,
    pub(crate) subscript_closed: bool,
    pub(crate) param_list_closed: bool,
    pub(crate) last_var_step: Step,
    pub(crate) last_func_index: u16,
    pub(crate) last_array_dims: u8,
}

impl<'a> Parser<'a> {
    pub fn new(machine: &'a mut Machine, area: Area) -> Self {
        let program_mode = area == Area::Program;
        Self {
            machine,
            area,
            program_mode,
            first_statement: true,
            in_function: None,
            open_blocks: vec![],
            parens: vec![],
            last: LastToken::None,
            last_was_space_sensitive: false,
            stmt_start: None,
            stmt_line: 1,
            cmd: None,
            assignment_possible: true,
            pending_prefix_incdec: false,
            pending_negate: false,
            subscript_closed: false,
            param_list_closed: false,
            last_var_step: Step::ZERO,
            last_func_index: 0,
            last_array_dims: 0,
        }
    }

    /// parse one statement from the input, appending its tokens to the
    /// program buffer. Ok(None) means the input is exhausted.
    ///
    /// on error the tokens of the offending statement are still in the
    /// buffer; the session discards them with 'discard_tokens_from'.
    pub fn parse_statement(
        &mut self,
        input: &mut InputCursor,
    ) -> Result<Option<StatementInfo>, ParseError> {
        self.parens.clear();
        self.last = LastToken::None;
        self.last_was_space_sensitive = false;
        self.stmt_start = None;
        self.cmd = None;
        self.assignment_possible = true;
        self.pending_prefix_incdec = false;
        self.pending_negate = false;
        self.subscript_closed = false;
        self.param_list_closed = false;

        loop {
            let had_space = input.skip_spaces();
            if input.at_end() {
                if self.stmt_start.is_some() {
                    return Err(self.error(ParseErr::ExpressionNotComplete, input));
                }
                return Ok(None);
            }

            let token_pos = input.pos();
            let token_col = input.column();

            if self.stmt_start.is_none() {
                self.stmt_line = input.line();
            }

            // a blank statement: swallow stray semicolons
            if self.last == LastToken::None && input.peek(0) == Some(b';') {
                input.next();
                continue;
            }

            // statements in a program outside any function are commands
            // (declarations); plain expressions belong to the prompt or to
            // function bodies
            if self.stmt_start.is_none()
                && self.program_mode
                && self.in_function.is_none()
                && !self.at_res_word(input)
            {
                return Err(self.error(ParseErr::OnlyImmediateOrInFunction, input));
            }

            let emitted = self.next_token(input, had_space, token_col)?;

            let is_semicolon = matches!(emitted, Emitted::Terminal(TermCode::Semicolon));
            self.after_token(emitted, input, token_pos)?;

            if is_semicolon {
                let info = StatementInfo {
                    step: self.stmt_start.take().expect("statement has tokens"),
                    line: self.stmt_line,
                    cmd: self.cmd.as_ref().map(|ctx| ctx.def.code),
                };
                self.first_statement = false;
                return Ok(Some(info));
            }
        }
    }

    /// end of a parse session: every block opened must have been closed
    pub fn finish(&mut self, input: &InputCursor) -> Result<(), ParseError> {
        if !self.open_blocks.is_empty() {
            return Err(ParseError::new(ParseErr::BlockNotClosed, input.column()));
        }
        Ok(())
    }

    // ---- the dispatch chain ----

    fn next_token(
        &mut self,
        input: &mut InputCursor,
        had_space: bool,
        token_col: usize,
    ) -> Result<Emitted, ParseError> {
        // after a keyword, a string constant or a closing parenthesis, a
        // name or literal needs separating whitespace
        if self.last_was_space_sensitive && !had_space {
            let next = input.peek(0).unwrap();
            if cursor::is_identifier_start(next) || next == b'"' || next.is_ascii_digit() {
                return Err(ParseError::new(ParseErr::SpaceMissing, token_col));
            }
        }

        if let Some(emitted) = self.try_res_word(input)? {
            return Ok(emitted);
        }
        if let Some(emitted) = self.try_terminal(input)? {
            return Ok(emitted);
        }
        if let Some(emitted) = self.try_number(input)? {
            return Ok(emitted);
        }
        if let Some(emitted) = self.try_string(input)? {
            return Ok(emitted);
        }
        if let Some(emitted) = self.try_identifier(input)? {
            return Ok(emitted);
        }
        Err(ParseError::new(ParseErr::TokenNotRecognised, token_col))
    }

    /// bookkeeping common to every emitted token: command validator,
    /// parenthesis tracking, last-token state
    fn after_token(
        &mut self,
        emitted: Emitted,
        input: &mut InputCursor,
        token_pos: usize,
    ) -> Result<(), ParseError> {
        let token_col = input.column_of(token_pos);

        self.validate_cmd_token(&emitted, token_col)?;
        self.track_paren_arg(&emitted, token_col)?;

        self.last_was_space_sensitive = matches!(
            emitted,
            Emitted::ResWord(_)
                | Emitted::Constant(ConstValue::Str(_))
                | Emitted::Terminal(TermCode::RightPar)
        );

        self.last = match &emitted {
            Emitted::ResWord(cmd) => LastToken::ResWord(*cmd),
            // a closed subscript reads and assigns like a scalar variable
            Emitted::Terminal(TermCode::RightPar) if self.subscript_closed => {
                self.subscript_closed = false;
                LastToken::Variable { is_array: false }
            }
            Emitted::Terminal(code) => LastToken::Terminal(*code),
            Emitted::Constant(_) => LastToken::Constant,
            Emitted::Variable { is_array, .. } => {
                self.pending_prefix_incdec = false;
                LastToken::Variable {
                    is_array: *is_array,
                }
            }
            Emitted::InternFunc(func) => LastToken::InternFunc(*func),
            Emitted::ExternFunc { .. } => LastToken::ExternFunc,
            Emitted::GenericName(_) => LastToken::GenericName,
        };
        Ok(())
    }

    // ---- shared helpers ----

    pub(crate) fn error(&self, err: ParseErr, input: &InputCursor) -> ParseError {
        ParseError::new(err, input.column())
    }

    pub(crate) fn error_at(&self, err: ParseErr, col: usize) -> ParseError {
        ParseError::new(err, col)
    }

    /// append a token, remembering the statement start
    pub(crate) fn emit(&mut self, token: &Token, col: usize) -> Result<Step, ParseError> {
        let mut writer = TokenWriter::new(&mut self.machine.buffer, self.area);
        let step = writer
            .write(token)
            .ok_or(ParseError::new(ParseErr::ProgMemoryFull, col))?;
        if self.stmt_start.is_none() {
            self.stmt_start = Some(step);
        }
        Ok(step)
    }

    /// the current function's attribute record
    pub(crate) fn current_attrs(&mut self) -> &mut justina_program::FunctionAttrs {
        let index = self.in_function.expect("inside a function") as usize;
        &mut self.machine.functions[index]
    }

    /// true when the current command is one of the declaration commands
    pub(crate) fn in_declaration(&self) -> bool {
        matches!(
            self.cmd.as_ref().map(|ctx| ctx.def.code),
            Some(CmdCode::Var) | Some(CmdCode::Static) | Some(CmdCode::Local)
        )
    }

    pub(crate) fn cmd_def(&self) -> Option<&'static CmdDef> {
        self.cmd.as_ref().map(|ctx| ctx.def)
    }

    fn at_res_word(&self, input: &InputCursor) -> bool {
        let rest = input.rest();
        if rest.is_empty() || !cursor::is_identifier_start(rest[0]) {
            return false;
        }
        let mut len = 1;
        while len < rest.len() && cursor::is_identifier_char(rest[len]) {
            len += 1;
        }
        let word = std::str::from_utf8(&rest[..len]).unwrap_or("");
        justina_types::command::find_res_word(word).is_some()
    }
}

#[cfg(test)]
mod tests;

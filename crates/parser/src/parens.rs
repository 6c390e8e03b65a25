// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// parenthesis context tracking.
//
// every '(' pushes a frame recording what it opens: an internal or external
// function call, an array subscript, an array dimension declaration, a
// function definition parameter list, or a bare sub-expression. arguments
// are counted at the frame's commas, and the closing ')' checks what the
// frame demands: argument count ranges, scalar/array argument patterns,
// dimension validity.
//
// external functions accumulate their observed argument count range and
// scalar/array pattern across call sites; a later definition must fit
// everything observed, and later calls are checked against the definition.

use justina_program::{ArrayBlock, ConstValue, Value};
use justina_tokens::{Step, Token};
use justina_types::command::CmdCode;
use justina_types::error::{ParseErr, ParseError};
use justina_types::function::{func_def, FuncCode};
use justina_types::terminal::TermCode;
use justina_types::{
    Scope, ValueKind, MAX_ARRAY_DIMS, MAX_ARRAY_ELEMENTS, MAX_FUNCTION_PARAMETERS,
};

use crate::command::{DeclaredVar, RefState};
use crate::cursor::InputCursor;
use crate::{Emitted, LastToken, Parser};

#[derive(Debug)]
pub(crate) enum ParenKind {
    SubExpr,
    InternCall { func: FuncCode },
    ExternCall { func_index: u16 },
    Subscript { dim_count: u8 },
    /// Some = a declaration collecting dimensions, None = the '()' marker
    /// of an array parameter in a definition parameter list
    ArrayDecl { declared: Option<DeclaredVar> },
    ParamList,
}

#[derive(Debug)]
pub(crate) struct ParenFrame {
    pub kind: ParenKind,
    pub args: u8,
    pub arg_tokens: usize,
    pub arg_first_is_array: bool,
    pub array_mask: u8,
    pub dims: Vec<u32>,
    /// step of the variable token a '()' array marker belongs to
    pub patch_step: Option<Step>,
    // parameter list state
    pub param_named: bool,
    pub param_default_pending: bool,
}

impl ParenFrame {
    fn new(kind: ParenKind) -> Self {
        Self {
            kind,
            args: 0,
            arg_tokens: 0,
            arg_first_is_array: false,
            array_mask: 0,
            dims: vec![],
            patch_step: None,
            param_named: false,
            param_default_pending: false,
        }
    }

    /// close the current argument; true when the argument was a bare
    /// array name
    fn seal_arg(&mut self) {
        if self.arg_first_is_array && self.arg_tokens == 1 && self.args < 8 {
            self.array_mask |= 1 << self.args;
        }
        self.args += 1;
        self.arg_tokens = 0;
        self.arg_first_is_array = false;
    }
}

impl<'a> Parser<'a> {
    /// true while a parameter default constant is expected ('= ' seen in a
    /// definition parameter list)
    pub(crate) fn awaiting_param_default(&self) -> bool {
        matches!(
            self.parens.last(),
            Some(frame) if matches!(frame.kind, ParenKind::ParamList) && frame.param_default_pending
        )
    }

    /// true when the innermost frame is a parameter list waiting for the
    /// next parameter name
    pub(crate) fn in_param_list(&self) -> bool {
        matches!(
            self.parens.last(),
            Some(frame) if matches!(frame.kind, ParenKind::ParamList)
                && !frame.param_named
                && !frame.param_default_pending
        )
    }

    // ---- '(' ----

    pub(crate) fn open_paren(
        &mut self,
        _input: &mut InputCursor,
        col: usize,
    ) -> Result<Emitted, ParseError> {
        if self.pending_prefix_incdec {
            return Err(self.error_at(ParseErr::OperandExpected, col));
        }

        let kind = self.classify_paren(col)?;

        // the '(' itself is a token of the enclosing argument
        if let Some(outer) = self.parens.last_mut() {
            if outer.arg_tokens == 0 {
                outer.arg_first_is_array = false;
            }
            outer.arg_tokens += 1;
        }

        let mut frame = ParenFrame::new(kind);
        if matches!(frame.kind, ParenKind::ArrayDecl { declared: None }) {
            frame.patch_step = Some(self.last_var_step);
        }

        self.emit(&Token::Terminal(TermCode::LeftPar), col)?;
        self.parens.push(frame);
        Ok(Emitted::Terminal(TermCode::LeftPar))
    }

    fn classify_paren(&mut self, col: usize) -> Result<ParenKind, ParseError> {
        match self.last {
            LastToken::InternFunc(func) => Ok(ParenKind::InternCall { func }),

            LastToken::ExternFunc => {
                let is_definition = self.parens.is_empty()
                    && self.cmd_def().map(|def| def.code) == Some(CmdCode::Function);
                if is_definition {
                    Ok(ParenKind::ParamList)
                } else {
                    Ok(ParenKind::ExternCall {
                        func_index: self.last_func_index,
                    })
                }
            }

            LastToken::Variable { is_array } => {
                // '()' after a parameter name marks an array parameter
                if matches!(
                    self.parens.last(),
                    Some(frame) if matches!(frame.kind, ParenKind::ParamList)
                ) {
                    return Ok(ParenKind::ArrayDecl { declared: None });
                }
                // a '(' directly after a freshly declared name collects
                // the array dimensions
                if self.parens.is_empty() && self.in_declaration() {
                    let shape = &self.cmd.as_ref().unwrap().shape;
                    if shape.ref_state == RefState::VarOnly && shape.token_count == 1 {
                        if let Some(declared) = shape.declared {
                            return Ok(ParenKind::ArrayDecl {
                                declared: Some(declared),
                            });
                        }
                    }
                }
                if is_array {
                    Ok(ParenKind::Subscript {
                        dim_count: self.last_array_dims,
                    })
                } else {
                    Err(self.error_at(ParseErr::ParenthesisNotAllowedHere, col))
                }
            }

            LastToken::Constant | LastToken::GenericName => {
                Err(self.error_at(ParseErr::ParenthesisNotAllowedHere, col))
            }
            LastToken::Terminal(TermCode::RightPar) => {
                Err(self.error_at(ParseErr::ParenthesisNotAllowedHere, col))
            }
            LastToken::Terminal(TermCode::Incr) | LastToken::Terminal(TermCode::Decr)
                if self.last.ends_operand() =>
            {
                Err(self.error_at(ParseErr::ParenthesisNotAllowedHere, col))
            }

            _ => Ok(ParenKind::SubExpr),
        }
    }

    // ---- ')' ----

    pub(crate) fn close_paren(&mut self, col: usize) -> Result<Emitted, ParseError> {
        if self.pending_prefix_incdec {
            return Err(self.error_at(ParseErr::OperandExpected, col));
        }
        let Some(mut frame) = self.parens.pop() else {
            return Err(self.error_at(ParseErr::MissingLeftParenthesis, col));
        };

        // close the last argument
        if frame.arg_tokens > 0 {
            if matches!(frame.kind, ParenKind::ParamList) {
                self.seal_param(&mut frame, col)?;
            } else {
                frame.seal_arg();
            }
        } else if frame.args > 0 {
            // a trailing comma left an empty argument
            return Err(self.error_at(ParseErr::OperandExpected, col));
        }

        match &frame.kind {
            ParenKind::SubExpr => {
                if frame.args == 0 {
                    return Err(self.error_at(ParseErr::OperandExpected, col));
                }
            }
            ParenKind::InternCall { func } => self.close_intern_call(*func, &frame, col)?,
            ParenKind::ExternCall { func_index } => {
                self.close_extern_call(*func_index, &frame, col)?
            }
            ParenKind::Subscript { dim_count } => {
                if frame.array_mask != 0 {
                    return Err(self.error_at(ParseErr::ScalarArgExpected, col));
                }
                if frame.args as usize > MAX_ARRAY_DIMS
                    || (*dim_count > 0 && frame.args != *dim_count)
                {
                    return Err(self.error_at(ParseErr::ArrayUseWrongDimCount, col));
                }
                if frame.args == 0 {
                    return Err(self.error_at(ParseErr::ArrayUseWrongDimCount, col));
                }
            }
            ParenKind::ArrayDecl { declared } => {
                self.close_array_decl(*declared, &frame, col)?;
            }
            ParenKind::ParamList => self.close_param_list(col)?,
        }

        self.emit(&Token::Terminal(TermCode::RightPar), col)?;
        if matches!(frame.kind, ParenKind::Subscript { .. }) {
            self.subscript_closed = true;
        }
        Ok(Emitted::Terminal(TermCode::RightPar))
    }

    fn close_intern_call(
        &self,
        func: FuncCode,
        frame: &ParenFrame,
        col: usize,
    ) -> Result<(), ParseError> {
        let def = func_def(func);
        if frame.args < def.min_args || frame.args > def.max_args {
            return Err(self.error_at(ParseErr::WrongArgCount, col));
        }
        for position in 0..frame.args.min(8) {
            let wants_array = def.array_pattern & (1 << position) != 0;
            let is_array = frame.array_mask & (1 << position) != 0;
            if wants_array && !is_array {
                return Err(self.error_at(ParseErr::ArrayArgExpected, col));
            }
            if !wants_array && is_array {
                return Err(self.error_at(ParseErr::ScalarArgExpected, col));
            }
        }
        Ok(())
    }

    fn close_extern_call(
        &mut self,
        func_index: u16,
        frame: &ParenFrame,
        col: usize,
    ) -> Result<(), ParseError> {
        if frame.args as usize > MAX_FUNCTION_PARAMETERS {
            return Err(self.error_at(ParseErr::WrongArgCount, col));
        }
        let attrs = &mut self.machine.functions[func_index as usize];

        if attrs.is_defined() {
            if frame.args < attrs.min_args || frame.args > attrs.max_args {
                return Err(ParseError::new(ParseErr::WrongArgCount, col));
            }
            for position in 0..frame.args {
                let wants_array = attrs.pattern_bit(position);
                let is_array = frame.array_mask & (1 << position) != 0;
                if wants_array && !is_array {
                    return Err(ParseError::new(ParseErr::ArrayArgExpected, col));
                }
                if !wants_array && is_array {
                    return Err(ParseError::new(ParseErr::ScalarArgExpected, col));
                }
            }
        } else {
            let seen_before = attrs.min_args_observed != u8::MAX;
            if seen_before {
                let overlap = attrs.observed_positions().min(frame.args);
                for position in 0..overlap {
                    let earlier = attrs.pattern_bit(position);
                    let now = frame.array_mask & (1 << position) != 0;
                    if earlier != now {
                        return Err(ParseError::new(
                            ParseErr::FcnScalarAndArrayArgOrderNotConsistent,
                            col,
                        ));
                    }
                }
            }
            for position in attrs.observed_positions()..frame.args {
                if frame.array_mask & (1 << position) != 0 {
                    attrs.array_pattern |= 1 << position;
                }
            }
            attrs.min_args_observed = attrs.min_args_observed.min(frame.args);
            attrs.max_args_observed = attrs.max_args_observed.max(frame.args);
        }
        Ok(())
    }

    fn close_array_decl(
        &mut self,
        declared: Option<DeclaredVar>,
        frame: &ParenFrame,
        col: usize,
    ) -> Result<(), ParseError> {
        let Some(declared) = declared else {
            // the '()' marker of an array parameter
            if !frame.dims.is_empty() {
                return Err(self.error_at(ParseErr::ArrayDefDimNotValid, col));
            }
            let attrs = self.current_attrs();
            attrs
                .params
                .last_mut()
                .expect("a parameter was named before its marker")
                .is_array = true;
            if let Some(step) = frame.patch_step {
                patch_variable_array_flag(&mut self.machine.buffer, step);
            }
            return Ok(());
        };

        if frame.dims.is_empty() {
            return Err(self.error_at(ParseErr::ArrayDefDimNotValid, col));
        }
        let elements: usize = frame.dims.iter().map(|d| *d as usize).product();
        if elements > MAX_ARRAY_ELEMENTS {
            return Err(self.error_at(ParseErr::ArrayDefMaxElementsExceeded, col));
        }

        patch_variable_array_flag(&mut self.machine.buffer, declared.token_step);

        if declared.scope == Scope::Local {
            let attrs = self.current_attrs();
            let index = declared.value_index as usize - attrs.params.len();
            attrs.locals[index].dims = frame.dims.clone();
            return Ok(());
        }

        // element kind stays open until an initializer or the first
        // assignment settles it
        let mut block = ArrayBlock::new(&frame.dims, ValueKind::Long);
        block.kind_fixed = false;
        let new_value = Value::Array(block);

        let old_value = self
            .machine
            .variable(declared.scope, declared.value_index, 0)
            .expect("declared variable exists")
            .value
            .clone();
        self.machine.release_value(declared.scope, &old_value);
        self.machine.retain_value(declared.scope, &new_value);
        self.machine
            .variable_mut(declared.scope, declared.value_index, 0)
            .expect("declared variable exists")
            .value = new_value;
        Ok(())
    }

    fn close_param_list(&mut self, col: usize) -> Result<(), ParseError> {
        let attrs = self.current_attrs();

        let mut optional_seen = false;
        for param in &attrs.params {
            if param.default.is_some() {
                optional_seen = true;
            } else if optional_seen {
                return Err(ParseError::new(ParseErr::ParamAfterOptionalParam, col));
            }
        }
        let min_args = attrs
            .params
            .iter()
            .take_while(|param| param.default.is_none())
            .count() as u8;
        let max_args = attrs.params.len() as u8;

        let mut defined_pattern: u16 = 0;
        for (position, param) in attrs.params.iter().enumerate() {
            if param.is_array {
                defined_pattern |= 1 << position;
            }
        }

        let seen_before = attrs.min_args_observed != u8::MAX;
        if seen_before {
            if attrs.min_args_observed < min_args || attrs.max_args_observed > max_args {
                return Err(ParseError::new(ParseErr::PrevCallsWrongArgCount, col));
            }
            for position in 0..attrs.observed_positions() {
                let observed = attrs.pattern_bit(position);
                let defined = defined_pattern & (1 << position) != 0;
                if observed != defined {
                    return Err(ParseError::new(
                        ParseErr::FcnScalarAndArrayArgOrderNotConsistent,
                        col,
                    ));
                }
            }
        }

        attrs.min_args = min_args;
        attrs.max_args = max_args;
        attrs.array_pattern = defined_pattern;
        self.param_list_closed = true;
        Ok(())
    }

    fn seal_param(&self, frame: &mut ParenFrame, col: usize) -> Result<(), ParseError> {
        if !frame.param_named {
            return Err(self.error_at(ParseErr::OperandExpected, col));
        }
        if frame.param_default_pending {
            return Err(self.error_at(ParseErr::ConstantValueExpected, col));
        }
        frame.param_named = false;
        frame.args += 1;
        frame.arg_tokens = 0;
        Ok(())
    }

    // ---- per-token argument tracking ----

    pub(crate) fn track_paren_arg(
        &mut self,
        emitted: &Emitted,
        col: usize,
    ) -> Result<(), ParseError> {
        if self.parens.is_empty() {
            return Ok(());
        }
        // '(' and ')' maintain the frames themselves
        if matches!(
            emitted,
            Emitted::Terminal(TermCode::LeftPar) | Emitted::Terminal(TermCode::RightPar)
        ) {
            return Ok(());
        }

        if matches!(self.parens.last().unwrap().kind, ParenKind::ParamList) {
            return self.track_param_list_token(emitted, col);
        }

        let is_array_decl = matches!(
            self.parens.last().unwrap().kind,
            ParenKind::ArrayDecl { .. }
        );

        if let Emitted::Terminal(TermCode::Comma) = emitted {
            let frame = self.parens.last_mut().unwrap();
            // a bare sub-expression holds exactly one expression
            if matches!(frame.kind, ParenKind::SubExpr) {
                return Err(ParseError::new(ParseErr::CommaNotAllowedHere, col));
            }
            if frame.arg_tokens == 0 {
                return Err(ParseError::new(ParseErr::OperandExpected, col));
            }
            if is_array_decl && frame.dims.len() >= MAX_ARRAY_DIMS {
                return Err(ParseError::new(ParseErr::ArrayDefMaxDimsExceeded, col));
            }
            frame.seal_arg();
            return Ok(());
        }

        if is_array_decl {
            // dimensions are single positive integer constants
            let frame = self.parens.last_mut().unwrap();
            if frame.arg_tokens > 0 {
                return Err(ParseError::new(ParseErr::ArrayDefDimNotValid, col));
            }
            let dim = match emitted {
                Emitted::Constant(ConstValue::Long(v)) if (1..=255).contains(v) => *v as u32,
                _ => return Err(ParseError::new(ParseErr::ArrayDefDimNotValid, col)),
            };
            frame.dims.push(dim);
            frame.arg_tokens = 1;
            return Ok(());
        }

        let frame = self.parens.last_mut().unwrap();
        if frame.arg_tokens == 0 {
            frame.arg_first_is_array =
                matches!(emitted, Emitted::Variable { is_array: true, .. });
        }
        frame.arg_tokens += 1;
        Ok(())
    }

    fn track_param_list_token(
        &mut self,
        emitted: &Emitted,
        col: usize,
    ) -> Result<(), ParseError> {
        match emitted {
            Emitted::Terminal(TermCode::Comma) => {
                let mut frame = self.parens.pop().unwrap();
                let sealed = self.seal_param(&mut frame, col);
                self.parens.push(frame);
                sealed
            }
            Emitted::Variable { .. } => {
                let frame = self.parens.last_mut().unwrap();
                if frame.param_named {
                    return Err(ParseError::new(ParseErr::FunctionDefExpected, col));
                }
                frame.param_named = true;
                frame.arg_tokens += 1;
                Ok(())
            }
            Emitted::Terminal(TermCode::Assign) => {
                let frame = self.parens.last_mut().unwrap();
                if !frame.param_named || frame.param_default_pending {
                    return Err(ParseError::new(ParseErr::FunctionDefExpected, col));
                }
                frame.param_default_pending = true;
                frame.arg_tokens += 1;
                Ok(())
            }
            Emitted::Constant(value) => {
                let frame = self.parens.last_mut().unwrap();
                if !frame.param_default_pending {
                    return Err(ParseError::new(ParseErr::FunctionDefExpected, col));
                }
                frame.param_default_pending = false;
                frame.arg_tokens += 1;
                let value = value.clone();
                self.current_attrs()
                    .params
                    .last_mut()
                    .expect("parameter was named")
                    .default = Some(value);
                Ok(())
            }
            _ => Err(ParseError::new(ParseErr::FunctionDefExpected, col)),
        }
    }
}

/// set the is-array bit in the ident info byte of a variable token
fn patch_variable_array_flag(
    buffer: &mut justina_tokens::program_buffer::ProgramBuffer,
    step: Step,
) {
    let info_step = step.advance(1).unwrap();
    let info = buffer.byte_at(info_step) | justina_tokens::VAR_IS_ARRAY;
    buffer.overwrite_byte(info_step, info);
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// command syntax validation.
//
// a command is a statement starting with a reserved word. while the
// statement is parsed, a slot cursor walks the command's four parameter
// slot descriptors: every level-0 separator (',' or, for a 'for' command,
// 'to' and 'step') finalizes the current slot against its descriptor and
// advances, unless the slot is marked 'multiple'. the terminating ';'
// finalizes the last slot and checks that no mandatory slot is left.
//
// block commands maintain the open-block side of the parsing stack here:
// block starts push a frame, 'elseif'/'else' patch the forward link of
// their predecessor, 'end' patches the chain closed and pops, and
// 'break'/'continue'/'return' store a link to the open block they leave.

use justina_program::{ConstValue, Value, Variable};
use justina_tokens::writer::patch_link;
use justina_tokens::{Step, Token};
use justina_types::command::{
    find_res_word, BlockCtl, CmdCode, CmdDef, CmdPlace, PARAM_EXPR, PARAM_EXT_FUNC, PARAM_IDENT,
    PARAM_KIND_MASK, PARAM_MULTIPLE, PARAM_NONE, PARAM_OPTIONAL, PARAM_VAR_NO_ASSIGN,
    PARAM_VAR_OPT_ASSIGN,
};
use justina_types::error::{ParseErr, ParseError};
use justina_types::terminal::TermCode;
use justina_types::Scope;

use crate::cursor::{is_identifier_char, is_identifier_start, InputCursor};
use crate::{BlockFrame, Emitted, Parser};

/// classification of the first level-0 token of a command parameter slot
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FirstToken {
    Var {
        scope: Scope,
        value_index: u8,
        is_array: bool,
    },
    Ident,
    ExtFunc,
    Other,
}

/// how far the slot still looks like a plain variable reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RefState {
    Empty,
    VarOnly,
    VarRefDone,
    NotPure,
}

/// a variable created by the current declaration slot
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeclaredVar {
    pub scope: Scope,
    pub name_index: u8,
    pub value_index: u8,
    pub token_step: Step,
}

#[derive(Debug)]
pub(crate) struct SlotShape {
    pub token_count: usize,
    pub first: Option<FirstToken>,
    pub ref_state: RefState,
    pub assign_seen: bool,
    pub tokens_after_assign: usize,
    pub init_value: Option<ConstValue>,
    pub declared: Option<DeclaredVar>,
}

impl SlotShape {
    fn new() -> Self {
        Self {
            token_count: 0,
            first: None,
            ref_state: RefState::Empty,
            assign_seen: false,
            tokens_after_assign: 0,
            init_value: None,
            declared: None,
        }
    }
}

pub(crate) struct CmdContext {
    pub def: &'static CmdDef,
    pub cmd_step: Step,
    pub slot: usize,
    pub started: bool,
    /// separators consumed so far (for 'for': 0 = before 'to', 1 = before 'step')
    pub seps: u8,
    pub shape: SlotShape,
}

impl CmdContext {
    fn new(def: &'static CmdDef, cmd_step: Step) -> Self {
        Self {
            def,
            cmd_step,
            slot: 0,
            started: false,
            seps: 0,
            shape: SlotShape::new(),
        }
    }

    fn slot_spec(&self) -> u8 {
        if self.slot < self.def.params.len() {
            self.def.params[self.slot]
        } else {
            PARAM_NONE
        }
    }
}

impl<'a> Parser<'a> {
    // ---- the reserved word parse attempt ----

    pub(crate) fn try_res_word(
        &mut self,
        input: &mut InputCursor,
    ) -> Result<Option<Emitted>, ParseError> {
        let col = input.column();
        let rest = input.rest();
        if rest.is_empty() || !is_identifier_start(rest[0]) {
            return Ok(None);
        }
        let mut len = 1;
        while len < rest.len() && is_identifier_char(rest[len]) {
            len += 1;
        }
        let word = std::str::from_utf8(&rest[..len]).unwrap_or("");
        let Some((_, def)) = find_res_word(word) else {
            return Ok(None);
        };

        if self.last != crate::LastToken::None {
            return Err(self.error_at(ParseErr::ResWordNotAllowedHere, col));
        }
        input.advance(len);
        self.check_placement(def, col)?;

        let step = self.command_block_open(def, col)?;
        self.cmd = Some(CmdContext::new(def, step));
        Ok(Some(Emitted::ResWord(def.code)))
    }

    fn check_placement(&self, def: &'static CmdDef, col: usize) -> Result<(), ParseError> {
        let err = match def.place {
            CmdPlace::Anywhere => None,
            CmdPlace::ProgramTop => {
                if !self.program_mode {
                    Some(ParseErr::OnlyInsideProgram)
                } else if !self.first_statement {
                    Some(ParseErr::OnlyProgramTop)
                } else {
                    None
                }
            }
            CmdPlace::InProgram => {
                if !self.program_mode {
                    Some(ParseErr::OnlyInsideProgram)
                } else {
                    None
                }
            }
            CmdPlace::InFunction => {
                if self.program_mode && self.in_function.is_some() {
                    None
                } else {
                    Some(ParseErr::OnlyInsideFunction)
                }
            }
            CmdPlace::OutsideFunction => {
                if self.in_function.is_some() {
                    Some(ParseErr::OnlyOutsideFunction)
                } else {
                    None
                }
            }
            CmdPlace::Immediate => {
                if self.program_mode {
                    Some(ParseErr::OnlyImmediateMode)
                } else {
                    None
                }
            }
            CmdPlace::ImmediateOrFunction => {
                if self.program_mode && self.in_function.is_none() {
                    Some(ParseErr::OnlyImmediateOrInFunction)
                } else {
                    None
                }
            }
        };
        match err {
            Some(err) => Err(self.error_at(err, col)),
            None => Ok(()),
        }
    }

    /// emit the command token and keep the open-block stack in shape
    fn command_block_open(
        &mut self,
        def: &'static CmdDef,
        col: usize,
    ) -> Result<Step, ParseError> {
        match def.block {
            BlockCtl::None => self.emit(&Token::ResWord { cmd: def.code, link: None }, col),

            BlockCtl::OpenIf | BlockCtl::OpenWhile | BlockCtl::OpenFor => {
                let step = self.emit(
                    &Token::ResWord { cmd: def.code, link: Some(Step::ZERO) },
                    col,
                )?;
                self.open_blocks.push(BlockFrame {
                    cmd: def.code,
                    start_step: step,
                    tail_step: step,
                    tail_cmd: def.code,
                    control_var: None,
                });
                Ok(step)
            }

            BlockCtl::OpenFunction => {
                if self.in_function.is_some() {
                    return Err(self.error_at(ParseErr::FunctionDefsCannotBeNested, col));
                }
                let step = self.emit(
                    &Token::ResWord { cmd: def.code, link: Some(Step::ZERO) },
                    col,
                )?;
                self.open_blocks.push(BlockFrame {
                    cmd: def.code,
                    start_step: step,
                    tail_step: step,
                    tail_cmd: def.code,
                    control_var: None,
                });
                Ok(step)
            }

            BlockCtl::MidElseIf | BlockCtl::MidElse => {
                let Some(frame) = self.open_blocks.last() else {
                    return Err(self.error_at(ParseErr::NoOpenBlock, col));
                };
                if frame.cmd != CmdCode::If {
                    return Err(self.error_at(ParseErr::NotAllowedInThisOpenBlock, col));
                }
                if !matches!(frame.tail_cmd, CmdCode::If | CmdCode::ElseIf) {
                    return Err(self.error_at(ParseErr::WrongBlockSequence, col));
                }
                let step = self.emit(
                    &Token::ResWord { cmd: def.code, link: Some(Step::ZERO) },
                    col,
                )?;
                let frame = self.open_blocks.last_mut().unwrap();
                patch_link(&mut self.machine.buffer, frame.tail_step, step);
                frame.tail_step = step;
                frame.tail_cmd = def.code;
                Ok(step)
            }

            BlockCtl::GenEnd => {
                let Some(frame) = self.open_blocks.pop() else {
                    return Err(self.error_at(ParseErr::NoOpenBlock, col));
                };
                let step = self.emit(
                    &Token::ResWord { cmd: def.code, link: Some(frame.start_step) },
                    col,
                )?;
                patch_link(&mut self.machine.buffer, frame.tail_step, step);
                if frame.cmd == CmdCode::Function {
                    self.in_function = None;
                }
                Ok(step)
            }

            BlockCtl::AlterFlowLoop => {
                let mut target = None;
                for frame in self.open_blocks.iter().rev() {
                    match frame.cmd {
                        CmdCode::For | CmdCode::While => {
                            target = Some(frame.start_step);
                            break;
                        }
                        CmdCode::Function => break,
                        _ => {}
                    }
                }
                let Some(target) = target else {
                    return Err(self.error_at(ParseErr::NoOpenLoop, col));
                };
                self.emit(&Token::ResWord { cmd: def.code, link: Some(target) }, col)
            }

            BlockCtl::AlterFlowFunction => {
                let target = self
                    .open_blocks
                    .iter()
                    .rev()
                    .find(|frame| frame.cmd == CmdCode::Function)
                    .map(|frame| frame.start_step);
                let Some(target) = target else {
                    return Err(self.error_at(ParseErr::NoOpenFunction, col));
                };
                self.emit(&Token::ResWord { cmd: def.code, link: Some(target) }, col)
            }
        }
    }

    // ---- the per-token validator ----

    pub(crate) fn validate_cmd_token(
        &mut self,
        emitted: &Emitted,
        col: usize,
    ) -> Result<(), ParseError> {
        if self.cmd.is_none() {
            return Ok(());
        }
        let in_decl = self.in_declaration();

        // the command token itself
        if !self.cmd.as_ref().unwrap().started {
            debug_assert!(matches!(emitted, Emitted::ResWord(_)));
            self.cmd.as_mut().unwrap().started = true;
            return Ok(());
        }

        let level = self.parens.len();

        // level-0 separators advance the slot cursor
        if level == 0 {
            match emitted {
                Emitted::Terminal(TermCode::Comma)
                | Emitted::Terminal(TermCode::To)
                | Emitted::Terminal(TermCode::StepSep) => {
                    return self.finalize_slot(false, col);
                }
                Emitted::Terminal(TermCode::Semicolon) => {
                    self.finalize_slot(true, col)?;
                    return self.command_statement_end(col);
                }
                _ => {}
            }
        }

        // tokens inside parentheses belong to the inner expression, except
        // that a closing parenthesis back at level 0 completes a variable
        // reference ('a(1)')
        if level > 0 {
            return Ok(());
        }

        let shape = &mut self.cmd.as_mut().unwrap().shape;

        if shape.token_count == 0 {
            shape.first = Some(match emitted {
                Emitted::Variable {
                    scope,
                    value_index,
                    is_array,
                    ..
                } => {
                    shape.ref_state = RefState::VarOnly;
                    FirstToken::Var {
                        scope: *scope,
                        value_index: *value_index,
                        is_array: *is_array,
                    }
                }
                Emitted::GenericName(_) => FirstToken::Ident,
                Emitted::ExternFunc { .. } => FirstToken::ExtFunc,
                _ => {
                    shape.ref_state = RefState::NotPure;
                    FirstToken::Other
                }
            });
            shape.token_count = 1;
            return Ok(());
        }

        if shape.assign_seen {
            // declarations take a single constant as their initializer
            if in_decl {
                if shape.tokens_after_assign > 0 {
                    return Err(ParseError::new(ParseErr::ConstantValueExpected, col));
                }
                match emitted {
                    Emitted::Constant(value) => shape.init_value = Some(value.clone()),
                    _ => return Err(ParseError::new(ParseErr::ConstantValueExpected, col)),
                }
            }
            shape.tokens_after_assign += 1;
            shape.token_count += 1;
            return Ok(());
        }

        // assignment directly after the leading variable reference
        if matches!(emitted, Emitted::Terminal(code) if code.is_assignment())
            && matches!(shape.ref_state, RefState::VarOnly | RefState::VarRefDone)
        {
            shape.assign_seen = true;
            shape.token_count += 1;
            return Ok(());
        }

        match emitted {
            Emitted::Terminal(TermCode::RightPar) if shape.ref_state == RefState::VarOnly => {
                shape.ref_state = RefState::VarRefDone;
            }
            _ => shape.ref_state = RefState::NotPure,
        }
        shape.token_count += 1;
        Ok(())
    }

    /// close the current slot against its descriptor and advance
    fn finalize_slot(&mut self, at_semicolon: bool, col: usize) -> Result<(), ParseError> {
        let (spec, empty, slot) = {
            let ctx = self.cmd.as_ref().unwrap();
            (ctx.slot_spec(), ctx.shape.token_count == 0, ctx.slot)
        };

        if empty {
            if !at_semicolon {
                return Err(self.error_at(ParseErr::OperandExpected, col));
            }
            let mandatory = spec != PARAM_NONE && spec & PARAM_OPTIONAL == 0 && slot == 0;
            if mandatory {
                return Err(self.error_at(ParseErr::CmdParameterMissing, col));
            }
            return Ok(());
        }

        if spec == PARAM_NONE {
            return Err(self.error_at(ParseErr::CmdHasTooManyParameters, col));
        }

        let kind = spec & PARAM_KIND_MASK;
        if let Some(err) = self.slot_shape_error(kind) {
            return Err(self.error_at(err, col));
        }

        // 'for' carries the control variable in its first slot, and the
        // control variable may not be reused by an enclosing loop
        if self.cmd.as_ref().unwrap().def.code == CmdCode::For {
            self.check_for_slot(col)?;
        }

        self.apply_declaration_init()?;

        let ctx = self.cmd.as_mut().unwrap();
        if ctx.slot_spec() & PARAM_MULTIPLE == 0 {
            ctx.slot += 1;
        }
        ctx.seps += 1;
        ctx.shape = SlotShape::new();
        Ok(())
    }

    fn slot_shape_error(&self, kind: u8) -> Option<ParseErr> {
        let shape = &self.cmd.as_ref().unwrap().shape;
        match kind {
            PARAM_EXPR => None,
            PARAM_VAR_OPT_ASSIGN => match shape.first {
                Some(FirstToken::Var { is_array: false, .. }) => None,
                _ => Some(ParseErr::VariableExpectedAsCmdPar),
            },
            PARAM_VAR_NO_ASSIGN => match shape.first {
                Some(FirstToken::Var { .. })
                    if !shape.assign_seen
                        && matches!(
                            shape.ref_state,
                            RefState::VarOnly | RefState::VarRefDone
                        ) =>
                {
                    None
                }
                _ => Some(ParseErr::VariableWithoutAssignmentExpectedAsCmdPar),
            },
            PARAM_IDENT => {
                if shape.first == Some(FirstToken::Ident) && shape.token_count == 1 {
                    None
                } else {
                    Some(ParseErr::IdentifierExpectedAsCmdPar)
                }
            }
            PARAM_EXT_FUNC => {
                if shape.first == Some(FirstToken::ExtFunc) {
                    None
                } else {
                    Some(ParseErr::FunctionNameExpectedAsCmdPar)
                }
            }
            _ => None,
        }
    }

    fn check_for_slot(&mut self, col: usize) -> Result<(), ParseError> {
        if self.cmd.as_ref().unwrap().seps > 0 {
            return Ok(());
        }
        let first = self.cmd.as_ref().unwrap().shape.first.clone();
        let Some(FirstToken::Var {
            scope,
            value_index,
            is_array: false,
        }) = first
        else {
            return Err(self.error_at(ParseErr::VariableExpectedAsCmdPar, col));
        };

        let enclosing = self.open_blocks.len().saturating_sub(1);
        let reused = self.open_blocks[..enclosing].iter().any(|frame| {
            frame.cmd == CmdCode::For && frame.control_var == Some((scope, value_index))
        });
        if reused {
            return Err(self.error_at(ParseErr::ControlVarInUse, col));
        }
        let frame = self
            .open_blocks
            .last_mut()
            .expect("the for frame was pushed with the command token");
        frame.control_var = Some((scope, value_index));
        Ok(())
    }

    /// write the captured constant into the variable a declaration slot
    /// created (or record it, for a local)
    fn apply_declaration_init(&mut self) -> Result<(), ParseError> {
        if !self.in_declaration() {
            return Ok(());
        }
        let (declared, init) = {
            let shape = &self.cmd.as_ref().unwrap().shape;
            (shape.declared, shape.init_value.clone())
        };
        let Some(declared) = declared else {
            return Ok(());
        };
        let Some(init) = init else {
            return Ok(());
        };

        if declared.scope == Scope::Local {
            let attrs = self.current_attrs();
            let index = declared.value_index as usize - attrs.params.len();
            attrs.locals[index].init = Some(init);
            return Ok(());
        }

        let old_value = self
            .machine
            .variable(declared.scope, declared.value_index, 0)
            .expect("declared variable exists")
            .value
            .clone();

        let new_value = match &old_value {
            Value::Array(block) => filled_array(block.dims, block.dim_count, &init),
            _ => match init {
                ConstValue::Long(v) => Value::Long(v),
                ConstValue::Float(v) => Value::Float(v),
                ConstValue::Str(s) => {
                    if s.is_empty() {
                        Value::Str(None)
                    } else {
                        Value::Str(Some(s))
                    }
                }
            },
        };

        self.machine.release_value(declared.scope, &old_value);
        self.machine.retain_value(declared.scope, &new_value);
        self.machine
            .variable_mut(declared.scope, declared.value_index, 0)
            .expect("declared variable exists")
            .value = new_value;
        Ok(())
    }

    /// statement-end work specific to some commands
    fn command_statement_end(&mut self, col: usize) -> Result<(), ParseError> {
        let (code, spec, seps, cmd_step) = {
            let ctx = self.cmd.as_ref().unwrap();
            (ctx.def.code, ctx.slot_spec(), ctx.seps, ctx.cmd_step)
        };

        // a mandatory slot may not be left open
        if spec != PARAM_NONE && spec & (PARAM_OPTIONAL | PARAM_MULTIPLE) == 0 && seps > 0 {
            return Err(self.error_at(ParseErr::CmdParameterMissing, col));
        }

        if code == CmdCode::Function {
            if !self.param_list_closed {
                return Err(self.error_at(ParseErr::FunctionDefExpected, col));
            }
            let body_step = self.machine.buffer.cursor(self.area);
            let attrs = self.current_attrs();
            attrs.cmd_step = Some(cmd_step);
            attrs.body_step = Some(body_step);
        }
        Ok(())
    }
}

/// an array block with every element set to the initializer constant
fn filled_array(
    dims: [u8; justina_types::MAX_ARRAY_DIMS],
    dim_count: u8,
    init: &ConstValue,
) -> Value {
    let sizes: Vec<u32> = (0..dim_count as usize).map(|d| dims[d] as u32).collect();
    let mut block = justina_program::ArrayBlock::new(&sizes, init.kind());
    let count = block.element_count();
    block.elems = match init {
        ConstValue::Long(v) => justina_program::ArrayElems::Long(vec![*v; count]),
        ConstValue::Float(v) => justina_program::ArrayElems::Float(vec![*v; count]),
        ConstValue::Str(s) => {
            let element = if s.is_empty() { None } else { Some(s.clone()) };
            justina_program::ArrayElems::Str(vec![element; count])
        }
    };
    Value::Array(block)
}

/// fresh scalar variables start as long zero
pub(crate) fn default_scalar() -> Variable {
    Variable::new(Value::Long(0))
}

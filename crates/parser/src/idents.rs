// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// identifier classification.
//
// one scan reads the name, then context decides what it is, in order:
// a generic name (when the command slot asks for a plain identifier), an
// internal function, a declaration (in 'var'/'static'/'local' slots and
// definition parameter lists), a resolvable variable, or an external
// function call (an unknown name followed by '('). anything else is an
// undeclared variable.
//
// scope resolution: inside a function, parameters and locals shadow
// statics, statics shadow globals, globals shadow user variables. at the
// prompt, user variables come first, then globals.

use justina_program::{LocalDecl, ParamDecl};
use justina_tokens::Token;
use justina_types::command::{CmdCode, PARAM_IDENT, PARAM_KIND_MASK};
use justina_types::error::{ParseErr, ParseError};
use justina_types::function::find_function;
use justina_types::{Scope, MAX_FUNCTION_PARAMETERS, MAX_IDENT_LENGTH, MAX_LOCALS_PER_FUNCTION};

use crate::command::DeclaredVar;
use crate::cursor::{is_identifier_char, is_identifier_start, InputCursor};
use crate::{Emitted, LastToken, Parser};

impl<'a> Parser<'a> {
    pub(crate) fn try_identifier(
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
        if len > MAX_IDENT_LENGTH {
            return Err(self.error_at(ParseErr::IdentifierTooLong, col));
        }
        let word = std::str::from_utf8(&rest[..len]).unwrap_or("").to_owned();

        // sequence checks
        if self.last.ends_operand() {
            return Err(self.error_at(ParseErr::OperatorExpected, col));
        }
        if matches!(self.last, LastToken::InternFunc(_) | LastToken::ExternFunc) {
            return Err(self.error_at(ParseErr::MissingLeftParenthesis, col));
        }
        input.advance(len);

        // 1. command slots that take a plain identifier
        if self.expects_generic_name() {
            if self.pending_prefix_incdec {
                return Err(self.error_at(ParseErr::OperandExpected, col));
            }
            return self.emit_generic_name(&word, col).map(Some);
        }

        // 2. internal functions
        if find_function(&word).is_some() {
            if self.pending_prefix_incdec {
                return Err(self.error_at(ParseErr::OperandExpected, col));
            }
            if self.in_declaration_slot() || self.in_param_list() {
                return Err(self.error_at(ParseErr::VarRedeclared, col));
            }
            let (index, def) = find_function(&word).unwrap();
            let _ = index;
            self.emit(&Token::InternFunc(def.code), col)?;
            return Ok(Some(Emitted::InternFunc(def.code)));
        }

        // 3. declarations
        if self.in_param_list() {
            return self.declare_param(&word, col).map(Some);
        }
        if self.in_declaration_slot() {
            return self.declare_variable(&word, col).map(Some);
        }

        // 4. the name of the function being defined
        if self.at_function_def_name() {
            return self.define_function_name(&word, col).map(Some);
        }

        // 5. a declared variable
        if let Some((scope, name_index, value_index, is_array, dims)) =
            self.resolve_variable(&word)
        {
            self.pending_prefix_incdec = false;
            return self
                .emit_variable(scope, name_index, value_index, is_array, dims, col)
                .map(Some);
        }

        // 6. an external function call
        if self.next_nonspace(input) == Some(b'(') && !self.pending_prefix_incdec {
            let func_index = self
                .machine
                .intern_extern_func_name(&word)
                .map_err(|err| self.error_at(err, col))?;
            self.last_func_index = func_index;
            self.emit(&Token::ExternFunc { func_index }, col)?;
            return Ok(Some(Emitted::ExternFunc {
                func_index,
                is_definition: false,
            }));
        }

        // 7. a fresh name typed at the prompt becomes a user variable
        if !self.program_mode {
            let name_index = self
                .machine
                .intern_user_var_name(&word)
                .map_err(|err| self.error_at(err, col))?;
            if self.machine.users[name_index as usize].is_none() {
                self.machine
                    .create_user(name_index, crate::command::default_scalar());
            }
            self.pending_prefix_incdec = false;
            return self
                .emit_variable(Scope::User, name_index, name_index, false, 0, col)
                .map(Some);
        }

        Err(self.error_at(ParseErr::VarNotDeclared, col))
    }

    // ---- contexts ----

    fn expects_generic_name(&self) -> bool {
        if !self.parens.is_empty() {
            return false;
        }
        let Some(ctx) = self.cmd.as_ref() else {
            return false;
        };
        let spec = if ctx.slot < ctx.def.params.len() {
            ctx.def.params[ctx.slot]
        } else {
            0
        };
        spec & PARAM_KIND_MASK == PARAM_IDENT
    }

    /// a 'var'/'static'/'local' slot waiting for the name to declare
    fn in_declaration_slot(&self) -> bool {
        self.parens.is_empty()
            && self.in_declaration()
            && self
                .cmd
                .as_ref()
                .map(|ctx| ctx.shape.token_count == 0)
                .unwrap_or(false)
    }

    fn at_function_def_name(&self) -> bool {
        self.parens.is_empty()
            && self.cmd_def().map(|def| def.code) == Some(CmdCode::Function)
            && self
                .cmd
                .as_ref()
                .map(|ctx| ctx.shape.token_count == 0)
                .unwrap_or(false)
    }

    fn next_nonspace(&self, input: &InputCursor) -> Option<u8> {
        input.rest().iter().copied().find(|byte| *byte != b' ' && *byte != b'\t')
    }

    // ---- emission helpers ----

    fn emit_generic_name(&mut self, word: &str, col: usize) -> Result<Emitted, ParseError> {
        let name_index = self.machine.alloc_generic_name(word);
        if let Err(err) = self.emit(&Token::GenericName { name_index }, col) {
            self.machine.free_generic_name(name_index);
            return Err(err);
        }

        match self.cmd_def().map(|def| def.code) {
            Some(CmdCode::Program) => self.machine.program_name = Some(word.to_owned()),
            Some(CmdCode::DeclareCb) => {
                if !self.machine.callback_aliases.iter().any(|alias| alias == word) {
                    self.machine.callback_aliases.push(word.to_owned());
                }
            }
            _ => {}
        }
        Ok(Emitted::GenericName(word.to_owned()))
    }

    fn emit_variable(
        &mut self,
        scope: Scope,
        name_index: u8,
        value_index: u8,
        is_array: bool,
        dims: u8,
        col: usize,
    ) -> Result<Emitted, ParseError> {
        let step = self.emit(
            &Token::Variable {
                scope,
                is_array,
                is_const: false,
                name_index,
                value_index,
            },
            col,
        )?;
        self.last_var_step = step;
        self.last_array_dims = dims;
        Ok(Emitted::Variable {
            scope,
            value_index,
            is_array,
            step,
        })
    }

    // ---- declarations ----

    fn declare_variable(&mut self, word: &str, col: usize) -> Result<Emitted, ParseError> {
        let code = self.cmd_def().unwrap().code;
        let (scope, name_index, value_index) = match code {
            CmdCode::Var => {
                if self.program_mode {
                    let name_index = self
                        .machine
                        .intern_program_var_name(word)
                        .map_err(|err| self.error_at(err, col))?;
                    if self.machine.globals[name_index as usize].is_some() {
                        return Err(self.error_at(ParseErr::VarRedeclared, col));
                    }
                    self.machine
                        .create_global(name_index, crate::command::default_scalar());
                    (Scope::Global, name_index, name_index)
                } else {
                    let name_index = self
                        .machine
                        .intern_user_var_name(word)
                        .map_err(|err| self.error_at(err, col))?;
                    if self.machine.users[name_index as usize].is_some() {
                        return Err(self.error_at(ParseErr::VarRedeclared, col));
                    }
                    self.machine
                        .create_user(name_index, crate::command::default_scalar());
                    (Scope::User, name_index, name_index)
                }
            }
            CmdCode::Static => {
                let name_index = self
                    .machine
                    .intern_program_var_name(word)
                    .map_err(|err| self.error_at(err, col))?;
                let duplicate = {
                    let attrs = self.current_attrs();
                    attrs.static_slot(name_index).is_some()
                        || attrs.local_slot(name_index).is_some()
                };
                if duplicate {
                    return Err(self.error_at(ParseErr::VarRedeclared, col));
                }
                let slot = self
                    .machine
                    .alloc_static(crate::command::default_scalar())
                    .map_err(|err| self.error_at(err, col))?;
                self.current_attrs().statics.push((name_index, slot));
                (Scope::Static, name_index, slot)
            }
            CmdCode::Local => {
                let name_index = self
                    .machine
                    .intern_program_var_name(word)
                    .map_err(|err| self.error_at(err, col))?;
                let (duplicate, full) = {
                    let attrs = self.current_attrs();
                    (
                        attrs.static_slot(name_index).is_some()
                            || attrs.local_slot(name_index).is_some(),
                        attrs.locals.len() >= MAX_LOCALS_PER_FUNCTION,
                    )
                };
                if duplicate {
                    return Err(self.error_at(ParseErr::VarRedeclared, col));
                }
                if full {
                    return Err(self.error_at(ParseErr::MaxLocalVariablesReached, col));
                }
                let attrs = self.current_attrs();
                attrs.locals.push(LocalDecl {
                    name_index,
                    dims: vec![],
                    init: None,
                });
                let value_index = (attrs.params.len() + attrs.locals.len() - 1) as u8;
                (Scope::Local, name_index, value_index)
            }
            _ => unreachable!("declaration commands only"),
        };

        let emitted = self.emit_variable(scope, name_index, value_index, false, 0, col)?;
        let step = match &emitted {
            Emitted::Variable { step, .. } => *step,
            _ => unreachable!(),
        };
        let shape = &mut self.cmd.as_mut().unwrap().shape;
        shape.declared = Some(DeclaredVar {
            scope,
            name_index,
            value_index,
            token_step: step,
        });
        Ok(emitted)
    }

    fn declare_param(&mut self, word: &str, col: usize) -> Result<Emitted, ParseError> {
        let name_index = self
            .machine
            .intern_program_var_name(word)
            .map_err(|err| self.error_at(err, col))?;
        let (duplicate, full) = {
            let attrs = self.current_attrs();
            (
                attrs.local_slot(name_index).is_some(),
                attrs.params.len() >= MAX_FUNCTION_PARAMETERS,
            )
        };
        if duplicate {
            return Err(self.error_at(ParseErr::VarRedeclared, col));
        }
        if full {
            return Err(self.error_at(ParseErr::WrongArgCount, col));
        }
        let attrs = self.current_attrs();
        attrs.params.push(ParamDecl {
            name_index,
            is_array: false,
            default: None,
        });
        let value_index = (attrs.params.len() - 1) as u8;
        self.emit_variable(Scope::Local, name_index, value_index, false, 0, col)
    }

    fn define_function_name(&mut self, word: &str, col: usize) -> Result<Emitted, ParseError> {
        let func_index = self
            .machine
            .intern_extern_func_name(word)
            .map_err(|err| self.error_at(err, col))?;
        if self.machine.functions[func_index as usize].is_defined() {
            return Err(self.error_at(ParseErr::FunctionAlreadyDefinedBefore, col));
        }
        self.in_function = Some(func_index);
        self.last_func_index = func_index;
        self.emit(&Token::ExternFunc { func_index }, col)?;
        Ok(Emitted::ExternFunc {
            func_index,
            is_definition: true,
        })
    }

    // ---- resolution ----

    #[allow(clippy::type_complexity)]
    fn resolve_variable(&self, word: &str) -> Option<(Scope, u8, u8, bool, u8)> {
        if let Some(func_index) = self.in_function {
            let attrs = &self.machine.functions[func_index as usize];
            if let Some(name_index) = self.machine.program_var_names.find(word) {
                let name_index = name_index as u8;
                if let Some(slot) = attrs.local_slot(name_index) {
                    // parameter or local
                    if (slot as usize) < attrs.params.len() {
                        let param = &attrs.params[slot as usize];
                        return Some((Scope::Local, name_index, slot, param.is_array, 0));
                    }
                    let local = &attrs.locals[slot as usize - attrs.params.len()];
                    return Some((
                        Scope::Local,
                        name_index,
                        slot,
                        !local.dims.is_empty(),
                        local.dims.len() as u8,
                    ));
                }
                if let Some(slot) = attrs.static_slot(name_index) {
                    let (is_array, dims) = self.slot_array_info(Scope::Static, slot);
                    return Some((Scope::Static, name_index, slot, is_array, dims));
                }
                if self.machine.globals[name_index as usize].is_some() {
                    let (is_array, dims) = self.slot_array_info(Scope::Global, name_index);
                    return Some((Scope::Global, name_index, name_index, is_array, dims));
                }
            }
            if let Some(name_index) = self.machine.user_var_names.find(word) {
                let name_index = name_index as u8;
                if self.machine.users[name_index as usize].is_some() {
                    let (is_array, dims) = self.slot_array_info(Scope::User, name_index);
                    return Some((Scope::User, name_index, name_index, is_array, dims));
                }
            }
            return None;
        }

        // immediate mode: user variables first, then globals
        if let Some(name_index) = self.machine.user_var_names.find(word) {
            let name_index = name_index as u8;
            if self.machine.users[name_index as usize].is_some() {
                let (is_array, dims) = self.slot_array_info(Scope::User, name_index);
                return Some((Scope::User, name_index, name_index, is_array, dims));
            }
        }
        if let Some(name_index) = self.machine.program_var_names.find(word) {
            let name_index = name_index as u8;
            if self.machine.globals[name_index as usize].is_some() {
                let (is_array, dims) = self.slot_array_info(Scope::Global, name_index);
                return Some((Scope::Global, name_index, name_index, is_array, dims));
            }
        }
        None
    }

    fn slot_array_info(&self, scope: Scope, value_index: u8) -> (bool, u8) {
        match self.machine.variable(scope, value_index, 0) {
            Some(variable) => match &variable.value {
                justina_program::Value::Array(block) => (true, block.dim_count),
                _ => (false, 0),
            },
            None => (false, 0),
        }
    }
}

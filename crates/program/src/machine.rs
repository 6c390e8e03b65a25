// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the machine: owner of the program buffer, the identifier tables, the
// variable stores and the heap object accounting.
//
// variable storage per scope:
//
// - globals:    one optional slot per program variable name (same index)
// - users:      one optional slot per user variable name (same index)
// - statics:    a flat store across all functions, each function records
//               its own (name index -> slot) pairs
// - locals:     a frame store, the running call allocates a region and
//               frees it on return. parameters occupy the first slots of
//               a frame.
//
// parsed string constants and generic names are owned by side tables and
// referenced from tokens by index; deleting a token range scans it forward
// and releases exactly the entries it owns.

use std::collections::VecDeque;

use justina_tokens::program_buffer::{Area, ProgramBuffer};
use justina_tokens::reader::TokenNames;
use justina_tokens::writer::constant_kind_of_header;
use justina_tokens::{token_length_from_header, Step, TokenKind};
use justina_types::error::ParseErr;
use justina_types::{
    Scope, ValueKind, LAST_RESULT_DEPTH, MAX_EXTERN_FUNCTIONS, MAX_PROGRAM_VAR_NAMES,
    MAX_STATIC_VARIABLES, MAX_USER_VAR_NAMES,
};

use crate::counters::{ObjectClass, ObjectCounters};
use crate::functions::FunctionAttrs;
use crate::idents::NameTable;
use crate::value::{ConstValue, Value, Variable};

/// the counter class of a string owned by a variable of the given scope
pub fn str_class(scope: Scope) -> ObjectClass {
    match scope {
        Scope::User => ObjectClass::UserVarStr,
        Scope::Global | Scope::Static => ObjectClass::GlobalStaticVarStr,
        Scope::Local => ObjectClass::LocalVarStr,
    }
}

/// the counter class of an array block owned by a variable of the given scope
pub fn array_class(scope: Scope) -> ObjectClass {
    match scope {
        Scope::User => ObjectClass::UserArray,
        Scope::Global | Scope::Static => ObjectClass::GlobalStaticArray,
        Scope::Local => ObjectClass::LocalArray,
    }
}

pub struct Machine {
    pub buffer: ProgramBuffer,
    pub counters: ObjectCounters,

    pub program_var_names: NameTable,
    pub user_var_names: NameTable,
    pub extern_func_names: NameTable,

    pub globals: Vec<Option<Variable>>,
    pub users: Vec<Option<Variable>>,
    pub statics: Vec<Variable>,
    pub locals: Vec<Variable>,

    pub functions: Vec<FunctionAttrs>,

    parsed_strings: Vec<Option<Box<str>>>,
    generic_names: Vec<Option<Box<str>>>,

    pub last_results: VecDeque<ConstValue>,
    pub callback_aliases: Vec<String>,

    pub program_name: Option<String>,
    /// (source line, step of the first statement starting on that line),
    /// recorded while loading a program, in parse order
    pub statement_lines: Vec<(u32, Step)>,
}

impl Machine {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            buffer: ProgramBuffer::new(),
            counters: ObjectCounters::new(),
            program_var_names: NameTable::new(MAX_PROGRAM_VAR_NAMES),
            user_var_names: NameTable::new(MAX_USER_VAR_NAMES),
            extern_func_names: NameTable::new(MAX_EXTERN_FUNCTIONS),
            globals: vec![],
            users: vec![],
            statics: vec![],
            locals: vec![],
            functions: vec![],
            parsed_strings: vec![],
            generic_names: vec![],
            last_results: VecDeque::new(),
            callback_aliases: vec![],
            program_name: None,
            statement_lines: vec![],
        }
    }

    // ---- identifier tables ----

    pub fn intern_program_var_name(&mut self, name: &str) -> Result<u8, ParseErr> {
        let (index, fresh) = self
            .program_var_names
            .intern(name)
            .ok_or(ParseErr::MaxVariableNamesReached)?;
        if fresh {
            self.counters.increment(ObjectClass::IdentNameStr);
            self.globals.push(None);
        }
        Ok(index as u8)
    }

    pub fn intern_user_var_name(&mut self, name: &str) -> Result<u8, ParseErr> {
        let (index, fresh) = self
            .user_var_names
            .intern(name)
            .ok_or(ParseErr::MaxVariableNamesReached)?;
        if fresh {
            self.counters.increment(ObjectClass::UserIdentNameStr);
            self.users.push(None);
        }
        Ok(index as u8)
    }

    pub fn intern_extern_func_name(&mut self, name: &str) -> Result<u16, ParseErr> {
        let (index, fresh) = self
            .extern_func_names
            .intern(name)
            .ok_or(ParseErr::MaxExtFunctionsReached)?;
        if fresh {
            self.counters.increment(ObjectClass::IdentNameStr);
            self.functions.push(FunctionAttrs::new(index));
        }
        Ok(index as u16)
    }

    pub fn find_function(&self, name: &str) -> Option<u16> {
        self.extern_func_names.find(name).map(|index| index as u16)
    }

    // ---- parsed string constants and generic names ----

    pub fn alloc_parsed_string(&mut self, s: &str) -> u32 {
        self.counters.increment(ObjectClass::ParsedConstStr);
        alloc_slab(&mut self.parsed_strings, s)
    }

    pub fn parsed_string(&self, index: u32) -> &str {
        self.parsed_strings[index as usize]
            .as_deref()
            .expect("parsed string is alive")
    }

    pub fn free_parsed_string(&mut self, index: u32) {
        debug_assert!(self.parsed_strings[index as usize].is_some());
        self.parsed_strings[index as usize] = None;
        self.counters.decrement(ObjectClass::ParsedConstStr);
    }

    pub fn alloc_generic_name(&mut self, s: &str) -> u32 {
        self.counters.increment(ObjectClass::ParsedConstStr);
        alloc_slab(&mut self.generic_names, s)
    }

    pub fn generic_name_str(&self, index: u32) -> &str {
        self.generic_names[index as usize]
            .as_deref()
            .expect("generic name is alive")
    }

    pub fn free_generic_name(&mut self, index: u32) {
        debug_assert!(self.generic_names[index as usize].is_some());
        self.generic_names[index as usize] = None;
        self.counters.decrement(ObjectClass::ParsedConstStr);
    }

    /// release the side table entries owned by the token range starting at
    /// 'from' (a forward scan until the stream terminator). the caller
    /// truncates or clears the buffer afterwards.
    pub fn delete_token_range(&mut self, from: Step) {
        let mut freed_strings: Vec<u32> = vec![];
        let mut freed_names: Vec<u32> = vec![];

        let bytes = self.buffer.bytes();
        let mut step = from;
        loop {
            let header = bytes[step.index()];
            if header == 0 {
                break;
            }
            let length = token_length_from_header(header).expect("token stream is well formed");
            if constant_kind_of_header(header) == Some(ValueKind::Str) {
                let payload =
                    u32::from_le_bytes(bytes[step.index() + 1..step.index() + 5].try_into().unwrap());
                freed_strings.push(payload);
            } else if header & 0x0F == TokenKind::GenericName as u8 {
                let payload =
                    u32::from_le_bytes(bytes[step.index() + 1..step.index() + 5].try_into().unwrap());
                freed_names.push(payload);
            }
            step = step.advance(length).expect("token stream stays in buffer");
        }

        for index in freed_strings {
            self.free_parsed_string(index);
        }
        for index in freed_names {
            self.free_generic_name(index);
        }
    }

    /// like 'delete_token_range', but over token bytes that were copied
    /// out of the buffer (a saved command line that is being discarded)
    pub fn release_saved_tokens(&mut self, bytes: &[u8]) {
        let mut offset = 0;
        loop {
            let header = bytes[offset];
            if header == 0 {
                break;
            }
            let length = token_length_from_header(header).expect("saved tokens are well formed");
            if constant_kind_of_header(header) == Some(ValueKind::Str) {
                let payload =
                    u32::from_le_bytes(bytes[offset + 1..offset + 5].try_into().unwrap());
                self.free_parsed_string(payload);
            } else if header & 0x0F == TokenKind::GenericName as u8 {
                let payload =
                    u32::from_le_bytes(bytes[offset + 1..offset + 5].try_into().unwrap());
                self.free_generic_name(payload);
            }
            offset += length;
        }
    }

    // ---- variable slots ----

    pub fn variable(&self, scope: Scope, value_index: u8, local_base: usize) -> Option<&Variable> {
        match scope {
            Scope::User => self.users.get(value_index as usize)?.as_ref(),
            Scope::Global => self.globals.get(value_index as usize)?.as_ref(),
            Scope::Static => self.statics.get(value_index as usize),
            Scope::Local => self.locals.get(local_base + value_index as usize),
        }
    }

    pub fn variable_mut(
        &mut self,
        scope: Scope,
        value_index: u8,
        local_base: usize,
    ) -> Option<&mut Variable> {
        match scope {
            Scope::User => self.users.get_mut(value_index as usize)?.as_mut(),
            Scope::Global => self.globals.get_mut(value_index as usize)?.as_mut(),
            Scope::Static => self.statics.get_mut(value_index as usize),
            Scope::Local => self.locals.get_mut(local_base + value_index as usize),
        }
    }

    /// count the heap objects inside a value that is being installed
    pub fn retain_value(&mut self, scope: Scope, value: &Value) {
        match value {
            Value::Str(Some(_)) => self.counters.increment(str_class(scope)),
            Value::Array(block) => {
                self.counters.increment(array_class(scope));
                for _ in 0..block.string_element_count() {
                    self.counters.increment(str_class(scope));
                }
            }
            _ => {}
        }
    }

    /// count the heap objects inside a value that is being dropped
    pub fn release_value(&mut self, scope: Scope, value: &Value) {
        match value {
            Value::Str(Some(_)) => self.counters.decrement(str_class(scope)),
            Value::Array(block) => {
                self.counters.decrement(array_class(scope));
                for _ in 0..block.string_element_count() {
                    self.counters.decrement(str_class(scope));
                }
            }
            _ => {}
        }
    }

    /// install a global value slot for a program variable name
    pub fn create_global(&mut self, name_index: u8, variable: Variable) {
        debug_assert!(self.globals[name_index as usize].is_none());
        self.retain_value(Scope::Global, &variable.value);
        self.globals[name_index as usize] = Some(variable);
    }

    pub fn create_user(&mut self, name_index: u8, variable: Variable) {
        debug_assert!(self.users[name_index as usize].is_none());
        self.retain_value(Scope::User, &variable.value);
        self.users[name_index as usize] = Some(variable);
    }

    pub fn alloc_static(&mut self, variable: Variable) -> Result<u8, ParseErr> {
        if self.statics.len() >= MAX_STATIC_VARIABLES {
            return Err(ParseErr::MaxStaticVariablesReached);
        }
        self.retain_value(Scope::Static, &variable.value);
        self.statics.push(variable);
        Ok((self.statics.len() - 1) as u8)
    }

    /// drop the local frame slots from 'base' upwards, counter-exact
    pub fn free_local_frame(&mut self, base: usize) {
        while self.locals.len() > base {
            let variable = self.locals.pop().unwrap();
            self.release_value(Scope::Local, &variable.value);
        }
    }

    /// delete one user variable value; the interned name stays behind
    pub fn delete_user_var(&mut self, name: &str) -> bool {
        let Some(index) = self.user_var_names.find(name) else {
            return false;
        };
        let Some(variable) = self.users[index].take() else {
            return false;
        };
        self.release_value(Scope::User, &variable.value);
        true
    }

    /// delete all user variables and their names
    pub fn clear_user_vars(&mut self) {
        for slot in std::mem::take(&mut self.users) {
            if let Some(variable) = slot {
                self.release_value(Scope::User, &variable.value);
            }
        }
        for _ in 0..self.user_var_names.clear() {
            self.counters.decrement(ObjectClass::UserIdentNameStr);
        }
    }

    // ---- program lifecycle ----

    /// delete the parsed program with everything it owns: global and static
    /// variable values, program variable names, functions, token stream.
    /// must not be called while a program is running (local frames live).
    pub fn clear_program(&mut self) {
        debug_assert!(self.locals.is_empty());

        for slot in std::mem::take(&mut self.globals) {
            if let Some(variable) = slot {
                self.release_value(Scope::Global, &variable.value);
            }
        }
        for variable in std::mem::take(&mut self.statics) {
            self.release_value(Scope::Static, &variable.value);
        }
        for _ in 0..self.program_var_names.clear() {
            self.counters.decrement(ObjectClass::IdentNameStr);
        }
        for _ in 0..self.extern_func_names.clear() {
            self.counters.decrement(ObjectClass::IdentNameStr);
        }
        self.functions.clear();

        self.delete_token_range(Step::ZERO);
        self.buffer.clear_program();
        self.statement_lines.clear();
        self.program_name = None;
    }

    /// delete the parsed immediate statements and their string constants
    pub fn clear_immediate(&mut self) {
        self.delete_token_range(ProgramBuffer::immediate_start());
        self.buffer.clear_immediate();
    }

    /// discard a partially parsed statement: release the side table entries
    /// of the token range from 'cursor' and truncate the area back to it
    pub fn discard_tokens_from(&mut self, area: Area, cursor: Step) {
        self.delete_token_range(cursor);
        self.buffer.truncate(area, cursor);
    }

    /// full teardown: everything goes. afterwards every counter must be
    /// zero, the residues (if any) are the cleanup report.
    pub fn reset_all(&mut self) -> Vec<String> {
        self.free_local_frame(0);
        self.clear_program();
        self.clear_immediate();
        self.clear_user_vars();
        while let Some(result) = self.last_results.pop_back() {
            if matches!(result, ConstValue::Str(_)) {
                self.counters.decrement(ObjectClass::SystemStr);
            }
        }
        self.callback_aliases.clear();

        debug_assert!(self.counters.is_clean(), "heap counters must balance");
        self.counters
            .residues()
            .iter()
            .map(|(class, count)| format!("cleanup error: {} count is {}", class, count))
            .collect()
    }

    // ---- last results FIFO ----

    pub fn push_last_result(&mut self, value: ConstValue) {
        if matches!(value, ConstValue::Str(_)) {
            self.counters.increment(ObjectClass::SystemStr);
        }
        self.last_results.push_front(value);
        while self.last_results.len() > LAST_RESULT_DEPTH {
            if let Some(ConstValue::Str(_)) = self.last_results.pop_back() {
                self.counters.decrement(ObjectClass::SystemStr);
            }
        }
    }

    /// the n-th most recent result, n starting at 1
    pub fn last_result(&self, n: usize) -> Option<&ConstValue> {
        if n == 0 {
            return None;
        }
        self.last_results.get(n - 1)
    }

    // ---- statement line table ----

    pub fn record_statement_line(&mut self, line: u32, step: Step) {
        if self.statement_lines.last().map(|(l, _)| *l) == Some(line) {
            return;
        }
        self.statement_lines.push((line, step));
    }

    pub fn step_for_line(&self, line: u32) -> Option<Step> {
        self.statement_lines
            .iter()
            .find(|(l, _)| *l == line)
            .map(|(_, step)| *step)
    }

    pub fn line_for_step(&self, step: Step) -> Option<u32> {
        self.statement_lines
            .iter()
            .take_while(|(_, s)| *s <= step)
            .last()
            .map(|(line, _)| *line)
    }
}

impl TokenNames for Machine {
    fn variable_name(&self, scope: Scope, name_index: u8) -> String {
        let table = match scope {
            Scope::User => &self.user_var_names,
            _ => &self.program_var_names,
        };
        table.name(name_index as usize).to_owned()
    }

    fn extern_func_name(&self, func_index: u16) -> String {
        self.extern_func_names.name(func_index as usize).to_owned()
    }

    fn string_const(&self, string_index: u32) -> String {
        self.parsed_string(string_index).to_owned()
    }

    fn generic_name(&self, name_index: u32) -> String {
        self.generic_name_str(name_index).to_owned()
    }
}

fn alloc_slab(slab: &mut Vec<Option<Box<str>>>, s: &str) -> u32 {
    if let Some(index) = slab.iter().position(|slot| slot.is_none()) {
        slab[index] = Some(s.into());
        index as u32
    } else {
        slab.push(Some(s.into()));
        (slab.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use justina_tokens::program_buffer::Area;
    use justina_tokens::writer::TokenWriter;
    use justina_tokens::{Token, TokenConst};
    use justina_types::terminal::TermCode;
    use pretty_assertions::assert_eq;

    use crate::value::{ArrayBlock, Value, Variable};

    use super::*;

    #[test]
    fn test_intern_names_and_counters() {
        let mut machine = Machine::new();
        let a = machine.intern_program_var_name("alpha").unwrap();
        let b = machine.intern_program_var_name("beta").unwrap();
        let a_again = machine.intern_program_var_name("alpha").unwrap();
        assert_eq!((a, b, a_again), (0, 1, 0));
        assert_eq!(machine.counters.count(ObjectClass::IdentNameStr), 2);
        assert_eq!(machine.globals.len(), 2);
    }

    #[test]
    fn test_variable_store_roundtrip() {
        let mut machine = Machine::new();
        let name = machine.intern_program_var_name("x").unwrap();
        machine.create_global(name, Variable::new(Value::Str(Some("hi".into()))));
        assert_eq!(
            machine.counters.count(ObjectClass::GlobalStaticVarStr),
            1
        );

        let variable = machine.variable(Scope::Global, name, 0).unwrap();
        assert_eq!(variable.value, Value::Str(Some("hi".into())));

        machine.clear_program();
        assert!(machine.counters.is_clean());
    }

    #[test]
    fn test_local_frame_free() {
        let mut machine = Machine::new();
        machine.locals.push(Variable::new(Value::Long(1)));
        let base = machine.locals.len();
        machine.locals.push(Variable::new(Value::Str(Some("s".into()))));
        machine
            .counters
            .increment(ObjectClass::LocalVarStr);
        machine.locals.push(Variable::new(Value::Array(ArrayBlock::new(
            &[2],
            ValueKind::Long,
        ))));
        machine.counters.increment(ObjectClass::LocalArray);

        machine.free_local_frame(base);
        assert_eq!(machine.locals.len(), 1);
        assert_eq!(machine.counters.count(ObjectClass::LocalVarStr), 0);
        assert_eq!(machine.counters.count(ObjectClass::LocalArray), 0);
    }

    #[test]
    fn test_delete_token_range_releases_strings() {
        let mut machine = Machine::new();
        let index = machine.alloc_parsed_string("abc");
        let name_index = machine.alloc_generic_name("report");
        {
            let mut writer = TokenWriter::new(&mut machine.buffer, Area::Immediate);
            writer
                .write(&Token::Constant(TokenConst::Str(index)))
                .unwrap();
            writer.write(&Token::GenericName { name_index }).unwrap();
            writer.write(&Token::Terminal(TermCode::Semicolon)).unwrap();
        }
        assert_eq!(machine.counters.count(ObjectClass::ParsedConstStr), 2);

        machine.clear_immediate();
        assert!(machine.counters.is_clean());
    }

    #[test]
    fn test_last_results_ring() {
        let mut machine = Machine::new();
        for i in 0..12 {
            machine.push_last_result(ConstValue::Long(i));
        }
        assert_eq!(machine.last_results.len(), LAST_RESULT_DEPTH);
        assert_eq!(machine.last_result(1), Some(&ConstValue::Long(11)));
        assert_eq!(machine.last_result(10), Some(&ConstValue::Long(2)));
        assert_eq!(machine.last_result(11), None);

        machine.push_last_result(ConstValue::Str("txt".into()));
        assert_eq!(machine.counters.count(ObjectClass::SystemStr), 1);
        let report = machine.reset_all();
        assert_eq!(report, Vec::<String>::new());
    }
}

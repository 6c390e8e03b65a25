// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the execution engine.
//
// one flat token walk drives everything: operands push evaluation stack
// levels, operators apply by parse-time priority, commands collect their
// evaluated arguments and dispatch at the ';'. a user function call pushes
// a flow level saving the caller state and simply moves the token pointer
// into the function body; 'return' (or the function's 'end') restores the
// caller and pushes the result, so the caller's half-finished expression
// continues where it left off.
//
// the engine survives between calls: a program stopped for debugging keeps
// its stacks, its active-function data moves to the 'stopped' list, and an
// immediate command line executes on top of the same stacks.

use justina_program::{ConstValue, Machine, Num, Value, Variable};
use justina_tokens::program_buffer::ProgramBuffer;
use justina_tokens::reader::{next_statement_step, read_token};
use justina_tokens::{Step, Token, TokenConst};
use justina_types::command::{cmd_def, CmdCode};
use justina_types::error::{EventCode, ExecErr, ExecSignal};
use justina_types::function::FuncCode;
use justina_types::terminal::{terminal_def, TermCode, OP_RTOL, PRIO_MASK};
use justina_types::{Scope, ValueKind, HOUSEKEEPING_INTERVAL};

use crate::debugger::DebugState;
use crate::eval::{
    apply_infix, apply_postfix, apply_prefix, drop_slot, entry_priority, make_result, take_value,
    EvalSlot, Marker, OpEntry, RtVal, VarRef,
};
use crate::fmt::DisplayFmt;
use crate::host::{Host, HostFlags};

pub const MAX_CALL_DEPTH: usize = 100;

/// loop control flags of a block flow level
pub const FOR_LOOP_INIT: u8 = 0x01;
pub const WITHIN_ITERATION: u8 = 0x02;
pub const TEST_FAIL: u8 = 0x04;
pub const BREAK_FROM_LOOP: u8 = 0x08;

/// the command being collected on the evaluation stack
#[derive(Debug, Clone, Copy)]
pub struct ActiveCmd {
    pub code: CmdCode,
    pub step: Step,
    pub link: Option<Step>,
    pub args_base: usize,
}

/// saved state of the currently executing function (or of the immediate
/// command line); restored from the flow-control stack on return
#[derive(Debug, Clone)]
pub struct ActiveFunctionData {
    pub func_index: Option<u16>,
    pub next_step: Step,
    pub stmt_step: Step,
    pub local_base: usize,
    pub eval_base: usize,
    pub ops_base: usize,
    pub stmt_eval_base: usize,
    pub param_aliases: Vec<Option<VarRef>>,
    pub active_cmd: Option<ActiveCmd>,
    pub trap_enable: bool,
    pub err_value: i32,
}

impl ActiveFunctionData {
    pub fn immediate(step: Step, eval_base: usize, ops_base: usize) -> Self {
        Self {
            func_index: None,
            next_step: step,
            stmt_step: step,
            local_base: 0,
            eval_base,
            ops_base,
            stmt_eval_base: eval_base,
            param_aliases: vec![],
            active_cmd: None,
            trap_enable: false,
            err_value: 0,
        }
    }
}

/// one open loop or conditional block
#[derive(Debug, Clone)]
pub struct BlockLevel {
    pub cmd: CmdCode,
    pub start_step: Step,
    pub loop_ctl: u8,
    pub ctl_var: Option<VarRef>,
    pub final_val: Num,
    pub step_val: Num,
    pub test_kind: ValueKind,
    /// first statement of the loop body (for-loops jump back here)
    pub body_step: Step,
}

#[derive(Debug, Clone)]
pub enum FlowLevel {
    Function { saved: ActiveFunctionData },
    Block(BlockLevel),
}

#[derive(Debug, Clone, Copy)]
enum PendingFunc {
    Intern(FuncCode),
    Extern(u16),
}

pub struct Engine {
    pub eval: Vec<EvalSlot>,
    pub ops: Vec<OpEntry>,
    pub flow: Vec<FlowLevel>,
    pub active: ActiveFunctionData,
    /// one entry per open debug level: the program state that was running
    /// when the stop happened
    pub stopped: Vec<ActiveFunctionData>,
    /// saved immediate-area token bytes, one per open debug level
    pub cmdline_stack: Vec<Vec<u8>>,
    pub debug: DebugState,
    pub fmt: DisplayFmt,
    pub disp_modes: (i32, i32),
    pub flags: HostFlags,
    /// immediate-mode expression results echo to the console; the session
    /// turns this off while it evaluates breakpoint trigger expressions
    pub echo_results: bool,

    pending_func: Option<PendingFunc>,
    operand_complete: bool,
    at_stmt_start: bool,
    work_counter: u32,
    /// breakpoint index that caused the latest stop, for trigger handling
    pub last_stop_breakpoint: Option<usize>,
}

impl Engine {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            eval: vec![],
            ops: vec![],
            flow: vec![],
            active: ActiveFunctionData::immediate(ProgramBuffer::immediate_start(), 0, 0),
            stopped: vec![],
            cmdline_stack: vec![],
            debug: DebugState::new(),
            fmt: DisplayFmt::new(),
            disp_modes: (0, 0),
            flags: HostFlags::default(),
            echo_results: true,
            pending_func: None,
            operand_complete: false,
            at_stmt_start: true,
            work_counter: 0,
            last_stop_breakpoint: None,
        }
    }

    pub fn function_depth(&self) -> usize {
        self.flow
            .iter()
            .filter(|level| matches!(level, FlowLevel::Function { .. }))
            .count()
    }

    pub fn is_stopped(&self) -> bool {
        !self.stopped.is_empty()
    }

    /// execute parsed immediate statements starting at 'step'
    pub fn exec_immediate(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
        step: Step,
    ) -> Result<(), ExecSignal> {
        self.active.next_step = step;
        self.active.stmt_step = step;
        self.active.eval_base = self.eval.len();
        self.active.ops_base = self.ops.len();
        self.active.stmt_eval_base = self.eval.len();
        self.active.active_cmd = None;
        self.pending_func = None;
        self.operand_complete = false;
        self.at_stmt_start = true;

        loop {
            match self.run(machine, host) {
                Ok(()) => return Ok(()),
                Err(signal) => {
                    // a trapped error resumes the walk, everything else
                    // reaches the session
                    self.handle_signal(machine, signal)?;
                }
            }
        }
    }

    /// resume a stopped program (the resume command already restored the
    /// active data)
    pub fn continue_running(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
    ) -> Result<(), ExecSignal> {
        self.at_stmt_start = true;
        self.operand_complete = false;
        loop {
            match self.run(machine, host) {
                Ok(()) => return Ok(()),
                Err(signal) => {
                    self.handle_signal(machine, signal)?;
                }
            }
        }
    }

    /// error propagation: unwind with trap support; events pass through
    fn handle_signal(
        &mut self,
        machine: &mut Machine,
        signal: ExecSignal,
    ) -> Result<(), ExecSignal> {
        let ExecSignal::Error { err, step } = signal else {
            return Err(signal);
        };

        loop {
            // free the expression state of the current activation
            while self.eval.len() > self.active.eval_base {
                let slot = self.eval.pop().unwrap();
                drop_slot(machine, slot);
            }
            self.ops.truncate(self.active.ops_base);
            self.active.active_cmd = None;
            self.pending_func = None;
            self.operand_complete = false;
            self.at_stmt_start = true;

            if self.active.trap_enable {
                self.active.err_value = err.code() as i32;
                if let Some(next) =
                    next_statement_step(machine.buffer.bytes(), self.active.stmt_step)
                {
                    self.active.next_step = next;
                    self.active.stmt_step = next;
                    self.active.stmt_eval_base = self.eval.len();
                    return Ok(());
                }
            }

            // pop the blocks of this activation, then its function frame
            while matches!(self.flow.last(), Some(FlowLevel::Block(_))) {
                self.flow.pop();
            }
            match self.flow.pop() {
                Some(FlowLevel::Function { saved }) => {
                    machine.free_local_frame(self.active.local_base);
                    self.active = saved;
                }
                _ => {
                    // immediate level reached: report to the session
                    return Err(ExecSignal::Error { err, step });
                }
            }
        }
    }

    // ---- the token walk ----

    fn run(&mut self, machine: &mut Machine, host: &mut dyn Host) -> Result<(), ExecSignal> {
        loop {
            if self.at_stmt_start {
                self.statement_checks(machine, host)?;
            }

            let step = self.active.next_step;
            let Some((token, next)) = read_token(machine.buffer.bytes(), step) else {
                // stream terminator: only the immediate level ends this way
                debug_assert!(self.active.func_index.is_none());
                return Ok(());
            };

            // declaration statements exist in the stream but never execute
            if self.at_stmt_start {
                if let Token::ResWord { cmd, .. } = token {
                    if cmd_def(cmd).skip_during_exec {
                        self.skip_statement(machine, step)?;
                        continue;
                    }
                }
                self.active.stmt_eval_base = self.eval.len();
                self.at_stmt_start = false;
            }

            self.active.next_step = next;

            match token {
                Token::ResWord { cmd, link } => {
                    self.active.active_cmd = Some(ActiveCmd {
                        code: cmd,
                        step,
                        link,
                        args_base: self.eval.len(),
                    });
                    self.operand_complete = false;
                }
                Token::InternFunc(func) => {
                    self.pending_func = Some(PendingFunc::Intern(func));
                    self.operand_complete = false;
                }
                Token::ExternFunc { func_index } => {
                    self.pending_func = Some(PendingFunc::Extern(func_index));
                    self.operand_complete = false;
                }
                Token::Variable {
                    scope,
                    value_index,
                    is_array: _,
                    ..
                } => {
                    let var = self.variable_ref(scope, value_index);
                    self.eval.push(EvalSlot::Ref(var));
                    self.operand_complete = true;
                }
                Token::Constant(value) => {
                    let value = match value {
                        TokenConst::Long(v) => RtVal::Long(v),
                        TokenConst::Float(v) => RtVal::Float(v),
                        TokenConst::Str(index) => {
                            RtVal::from_str_value(machine.parsed_string(index))
                        }
                    };
                    self.eval.push(EvalSlot::value(value));
                    self.operand_complete = true;
                }
                Token::GenericName { name_index } => {
                    let value = RtVal::from_str_value(machine.generic_name_str(name_index));
                    self.eval.push(EvalSlot::value(value));
                    self.operand_complete = true;
                }
                Token::Terminal(code) => {
                    self.terminal_token(machine, host, code, step)?;
                }
            }
        }
    }

    /// housekeeping, host flags, breakpoints and stepping, all checked at
    /// statement boundaries only
    fn statement_checks(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
    ) -> Result<(), ExecSignal> {
        self.work_counter += 1;
        if self.work_counter % HOUSEKEEPING_INTERVAL == 0 {
            host.housekeeping(&mut self.flags);
        }
        if self.flags.kill {
            return Err(ExecSignal::Event(EventCode::Kill));
        }
        if self.flags.quit {
            self.flags.quit = false;
            return Err(ExecSignal::Event(EventCode::Quit));
        }
        if self.flags.abort {
            self.flags.abort = false;
            return Err(ExecSignal::Event(EventCode::Abort));
        }

        // debug stops apply to program statements inside functions
        if self.active.func_index.is_some()
            && machine.buffer.in_program_area(self.active.next_step)
        {
            let force_stop = std::mem::take(&mut self.flags.stop);
            if let Some(bp_index) = self.debug.stop_reason(
                machine,
                self.active.next_step,
                self.function_depth(),
                self.flow.len(),
                force_stop,
            ) {
                self.last_stop_breakpoint = bp_index.breakpoint;
                self.enter_stop();
                return Err(ExecSignal::Event(EventCode::StopForDebug));
            }
        }
        Ok(())
    }

    /// move the running program aside and open a debug level
    pub(crate) fn enter_stop(&mut self) {
        self.debug.mode = crate::debugger::DebugMode::None;
        self.stopped.push(self.active.clone());
        self.active = ActiveFunctionData::immediate(
            ProgramBuffer::immediate_start(),
            self.eval.len(),
            self.ops.len(),
        );
        self.at_stmt_start = true;
        self.operand_complete = false;
    }

    fn skip_statement(&mut self, machine: &Machine, step: Step) -> Result<(), ExecSignal> {
        match next_statement_step(machine.buffer.bytes(), step) {
            Some(next) => {
                self.active.next_step = next;
                self.active.stmt_step = next;
                Ok(())
            }
            None => {
                // the stream ends inside a skipped statement: terminate
                // where the terminator sits
                let mut cursor = step;
                while machine.buffer.byte_at(cursor) != 0 {
                    let (_, next) = read_token(machine.buffer.bytes(), cursor).unwrap();
                    cursor = next;
                }
                self.active.next_step = cursor;
                self.active.stmt_step = cursor;
                Ok(())
            }
        }
    }

    fn variable_ref(&self, scope: Scope, value_index: u8) -> VarRef {
        if scope == Scope::Local {
            // a parameter bound to a caller variable forwards to it
            if let Some(Some(alias)) = self.active.param_aliases.get(value_index as usize) {
                return *alias;
            }
        }
        VarRef {
            scope,
            value_index,
            local_base: self.active.local_base,
            elem: None,
        }
    }

    // ---- terminals ----

    fn terminal_token(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
        code: TermCode,
        step: Step,
    ) -> Result<(), ExecSignal> {
        match code {
            TermCode::Semicolon => self.end_statement(machine, host, step),
            TermCode::Comma | TermCode::To | TermCode::StepSep => {
                self.drain_to_marker(machine, step)?;
                // inside a call or subscript the level stays as argument;
                // at command level the level is a command argument too
                self.operand_complete = false;
                Ok(())
            }
            TermCode::LeftPar => {
                let marker = match self.pending_func.take() {
                    Some(PendingFunc::Intern(func)) => Marker::InternCall {
                        func,
                        args_base: self.eval.len(),
                    },
                    Some(PendingFunc::Extern(func_index)) => Marker::ExternCall {
                        func_index,
                        args_base: self.eval.len(),
                    },
                    None => {
                        // a '(' directly after an array variable subscripts it
                        if self.operand_complete {
                            let Some(EvalSlot::Ref(var)) = self.eval.pop() else {
                                return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
                            };
                            Marker::Subscript {
                                var,
                                args_base: self.eval.len(),
                            }
                        } else {
                            Marker::SubExpr
                        }
                    }
                };
                self.ops.push(OpEntry::Marker(marker));
                self.operand_complete = false;
                Ok(())
            }
            TermCode::RightPar => {
                self.drain_to_marker(machine, step)?;
                let Some(OpEntry::Marker(marker)) = self.ops.pop() else {
                    return Err(ExecSignal::error(ExecErr::ArgInvalid, step.0));
                };
                match marker {
                    Marker::SubExpr => {}
                    Marker::InternCall { func, args_base } => {
                        let args = self.eval.split_off(args_base);
                        let result = self.intern_function(machine, host, func, args, step)?;
                        self.eval.push(result);
                    }
                    Marker::ExternCall {
                        func_index,
                        args_base,
                    } => {
                        self.launch_function(machine, func_index, args_base, step)?;
                    }
                    Marker::Subscript { var, args_base } => {
                        let subscripts = self.eval.split_off(args_base);
                        let elem = self.element_index(machine, &var, subscripts, step)?;
                        self.eval.push(EvalSlot::Ref(VarRef {
                            elem: Some(elem),
                            ..var
                        }));
                    }
                }
                self.operand_complete = true;
                Ok(())
            }
            _ => self.operator_token(machine, code, step),
        }
    }

    fn operator_token(
        &mut self,
        machine: &mut Machine,
        code: TermCode,
        step: Step,
    ) -> Result<(), ExecSignal> {
        let def = terminal_def(code);
        if self.operand_complete {
            if matches!(code, TermCode::Incr | TermCode::Decr) {
                // postfix: applies immediately, result is not assignable
                let slot = self.eval.pop().unwrap();
                let result = apply_postfix(machine, code, slot, step)?;
                self.eval.push(result);
                return Ok(());
            }

            let new_prio = def.infix_prio & PRIO_MASK;
            let right_assoc = def.infix_prio & OP_RTOL != 0;
            while let Some(top) = self.ops.last() {
                if matches!(top, OpEntry::Marker(_)) {
                    break;
                }
                let top_prio = entry_priority(top);
                let apply = match top {
                    OpEntry::Prefix(_) => top_prio >= new_prio,
                    OpEntry::Infix(_) => {
                        top_prio > new_prio || (top_prio == new_prio && !right_assoc)
                    }
                    OpEntry::Marker(_) => false,
                };
                if !apply {
                    break;
                }
                self.apply_top(machine, step)?;
            }
            self.ops.push(OpEntry::Infix(code));
            self.operand_complete = false;
            Ok(())
        } else {
            self.ops.push(OpEntry::Prefix(code));
            Ok(())
        }
    }

    /// apply pending operators down to the nearest marker
    fn drain_to_marker(&mut self, machine: &mut Machine, step: Step) -> Result<(), ExecSignal> {
        while let Some(top) = self.ops.last() {
            if matches!(top, OpEntry::Marker(_)) {
                break;
            }
            if self.ops.len() <= self.active.ops_base {
                break;
            }
            self.apply_top(machine, step)?;
        }
        Ok(())
    }

    fn apply_top(&mut self, machine: &mut Machine, step: Step) -> Result<(), ExecSignal> {
        match self.ops.pop().unwrap() {
            OpEntry::Infix(code) => {
                let rhs = self.eval.pop().unwrap();
                let lhs = self.eval.pop().unwrap();
                let result = apply_infix(machine, code, lhs, rhs, step)?;
                self.eval.push(result);
            }
            OpEntry::Prefix(code) => {
                let slot = self.eval.pop().unwrap();
                let result = apply_prefix(machine, code, slot, step)?;
                self.eval.push(result);
            }
            OpEntry::Marker(_) => unreachable!("markers stay until their ')'"),
        }
        Ok(())
    }

    fn element_index(
        &mut self,
        machine: &mut Machine,
        var: &VarRef,
        subscripts: Vec<EvalSlot>,
        step: Step,
    ) -> Result<usize, ExecSignal> {
        let mut indexes: Vec<i32> = Vec::with_capacity(subscripts.len());
        for slot in subscripts {
            let value = take_value(machine, slot, step)?;
            let Some(num) = value.as_num() else {
                return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
            };
            indexes.push(match num {
                Num::Long(v) => v,
                Num::Float(v) => v as i32,
            });
        }
        let variable = machine
            .variable(var.scope, var.value_index, var.local_base)
            .ok_or(ExecSignal::error(ExecErr::VariableExpected, step.0))?;
        let Value::Array(block) = &variable.value else {
            return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
        };
        block
            .linear_index(&indexes)
            .ok_or(ExecSignal::error(
                ExecErr::ArraySubscriptOutsideBounds,
                step.0,
            ))
    }

    // ---- function call and return ----

    fn launch_function(
        &mut self,
        machine: &mut Machine,
        func_index: u16,
        args_base: usize,
        step: Step,
    ) -> Result<(), ExecSignal> {
        if self.function_depth() >= MAX_CALL_DEPTH {
            return Err(ExecSignal::error(ExecErr::MaxCallDepthReached, step.0));
        }
        let attrs = machine.functions[func_index as usize].clone();
        let Some(body_step) = attrs.body_step else {
            return Err(ExecSignal::error(ExecErr::UndefinedFunction, step.0));
        };

        let mut args = self.eval.split_off(args_base);
        let local_base = machine.locals.len();
        let mut param_aliases: Vec<Option<VarRef>> = vec![None; attrs.params.len()];

        // bind parameters: variables pass by reference, values by value,
        // missing trailing arguments take their recorded defaults
        for (position, param) in attrs.params.iter().enumerate() {
            let value = if position < args.len() {
                let slot =
                    std::mem::replace(&mut args[position], EvalSlot::value(RtVal::Long(0)));
                match slot {
                    EvalSlot::Ref(var) => {
                        param_aliases[position] = Some(var);
                        Value::Long(0)
                    }
                    slot => match take_value(machine, slot, step)? {
                        RtVal::Long(v) => Value::Long(v),
                        RtVal::Float(v) => Value::Float(v),
                        RtVal::Str(s) => Value::Str(s),
                    },
                }
            } else {
                match param.default.as_ref().expect("arg count checked at parse") {
                    ConstValue::Long(v) => Value::Long(*v),
                    ConstValue::Float(v) => Value::Float(*v),
                    ConstValue::Str(s) => {
                        if s.is_empty() {
                            Value::Str(None)
                        } else {
                            Value::Str(Some(s.clone()))
                        }
                    }
                }
            };
            machine.retain_value(Scope::Local, &value);
            machine.locals.push(Variable::new(value));
        }

        // local variables, with their parse-time initializers
        for local in &attrs.locals {
            let value = if local.dims.is_empty() {
                match &local.init {
                    None => Value::Long(0),
                    Some(ConstValue::Long(v)) => Value::Long(*v),
                    Some(ConstValue::Float(v)) => Value::Float(*v),
                    Some(ConstValue::Str(s)) => {
                        if s.is_empty() {
                            Value::Str(None)
                        } else {
                            Value::Str(Some(s.clone()))
                        }
                    }
                }
            } else {
                let mut block = justina_program::ArrayBlock::new(
                    &local.dims,
                    local
                        .init
                        .as_ref()
                        .map(|init| init.kind())
                        .unwrap_or(ValueKind::Long),
                );
                match &local.init {
                    None => block.kind_fixed = false,
                    Some(init) => {
                        let count = block.element_count();
                        block.elems = match init {
                            ConstValue::Long(v) => justina_program::ArrayElems::Long(vec![*v; count]),
                            ConstValue::Float(v) => {
                                justina_program::ArrayElems::Float(vec![*v; count])
                            }
                            ConstValue::Str(s) => {
                                let element =
                                    if s.is_empty() { None } else { Some(s.clone()) };
                                justina_program::ArrayElems::Str(vec![element; count])
                            }
                        };
                    }
                }
                Value::Array(block)
            };
            machine.retain_value(Scope::Local, &value);
            machine.locals.push(Variable::new(value));
        }

        let saved = std::mem::replace(
            &mut self.active,
            ActiveFunctionData {
                func_index: Some(func_index),
                next_step: body_step,
                stmt_step: body_step,
                local_base,
                eval_base: self.eval.len(),
                ops_base: self.ops.len(),
                stmt_eval_base: self.eval.len(),
                param_aliases,
                active_cmd: None,
                trap_enable: false,
                err_value: 0,
            },
        );
        self.flow.push(FlowLevel::Function { saved });
        self.at_stmt_start = true;
        self.operand_complete = false;
        Ok(())
    }

    /// leave the active function: free locals, restore the caller, push
    /// the return value for the caller's pending expression
    pub(crate) fn terminate_function(
        &mut self,
        machine: &mut Machine,
        return_value: RtVal,
        step: Step,
    ) -> Result<(), ExecSignal> {
        // drop leftover expression levels of the callee
        while self.eval.len() > self.active.eval_base {
            let slot = self.eval.pop().unwrap();
            drop_slot(machine, slot);
        }
        self.ops.truncate(self.active.ops_base);

        // blocks of the callee still open (return out of loops)
        while matches!(self.flow.last(), Some(FlowLevel::Block(_))) {
            self.flow.pop();
        }
        let Some(FlowLevel::Function { saved }) = self.flow.pop() else {
            return Err(ExecSignal::error(ExecErr::NoProgramStopped, step.0));
        };

        machine.free_local_frame(self.active.local_base);
        self.active = saved;
        let result = make_result(machine, return_value);
        self.eval.push(result);
        self.operand_complete = true;
        self.at_stmt_start = false;
        Ok(())
    }

    // ---- statement end ----

    fn end_statement(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
        step: Step,
    ) -> Result<(), ExecSignal> {
        self.drain_to_marker(machine, step)?;

        if let Some(cmd) = self.active.active_cmd.take() {
            match self.dispatch_command(machine, host, cmd, step)? {
                crate::commands::Dispatched::FunctionReturn => {
                    // the caller picks up inside its own statement
                    return Ok(());
                }
                crate::commands::Dispatched::Done => {}
            }
        } else {
            // an expression statement leaves at most one level: it becomes
            // the newest last-result
            if self.eval.len() > self.active.stmt_eval_base {
                let slot = self.eval.pop().unwrap();
                let value = take_value(machine, slot, step)?;
                if self.active.func_index.is_none() && self.echo_results {
                    let text = self.fmt.format_value(&value);
                    host.print(&text);
                    host.println();
                }
                let result = match value {
                    RtVal::Long(v) => ConstValue::Long(v),
                    RtVal::Float(v) => ConstValue::Float(v),
                    RtVal::Str(s) => {
                        ConstValue::Str(s.unwrap_or_else(|| "".into()))
                    }
                };
                machine.push_last_result(result);
            }
            debug_assert!(self.eval.len() == self.active.stmt_eval_base);
        }

        self.active.stmt_step = self.active.next_step;
        self.at_stmt_start = true;
        self.operand_complete = false;
        Ok(())
    }

    /// pop and return the evaluated arguments of the command
    pub(crate) fn command_args(&mut self, args_base: usize) -> Vec<EvalSlot> {
        self.eval.split_off(args_base)
    }

    /// numeric value of a condition argument
    pub(crate) fn condition_value(
        &self,
        machine: &mut Machine,
        slot: EvalSlot,
        step: Step,
    ) -> Result<Num, ExecSignal> {
        let value = take_value(machine, slot, step)?;
        value
            .as_num()
            .ok_or(ExecSignal::error(ExecErr::TestExprNumberExpected, step.0))
    }
}

impl Engine {
    /// full teardown of execution state (abort): every frame, block and
    /// expression level disappears, saved command lines are released
    pub fn clear_execution_state(&mut self, machine: &mut Machine) {
        while let Some(slot) = self.eval.pop() {
            drop_slot(machine, slot);
        }
        self.ops.clear();
        self.flow.clear();
        self.stopped.clear();
        machine.free_local_frame(0);
        for saved in std::mem::take(&mut self.cmdline_stack) {
            machine.release_saved_tokens(&saved);
        }
        self.active =
            ActiveFunctionData::immediate(ProgramBuffer::immediate_start(), 0, 0);
        self.pending_func = None;
        self.operand_complete = false;
        self.at_stmt_start = true;
        self.flags = HostFlags::default();
        self.debug.mode = crate::debugger::DebugMode::None;
        self.last_stop_breakpoint = None;
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// command dispatch.
//
// a command collects its evaluated arguments on the evaluation stack; at
// the statement's ';' the dispatcher consumes them and performs the side
// effects. the block commands follow the jump discipline of the forward
// links patched at parse time:
//
// - 'for' pushes its loop level and jumps straight to its 'end', which
//   does the (first, increment-free) test; so a loop whose test fails
//   immediately runs zero iterations
// - 'while' jumps back to its own start from 'end'; a failing test jumps
//   forward to 'end' with the test-fail flag set, and 'end' pops
// - 'if'/'elseif'/'else' hop along the link chain until a test passes
// - 'break'/'continue' pop inner 'if' levels and jump to the loop 'end',
//   'break' with the break flag set

use justina_program::{Machine, Num, Value};
use justina_tokens::reader::read_token;
use justina_tokens::{Step, Token};
use justina_types::command::CmdCode;
use justina_types::error::{EventCode, ExecErr, ExecSignal};
use justina_types::ValueKind;

use crate::debugger::DebugMode;
use crate::eval::{drop_slot, read_ref, take_value, write_ref, EvalSlot, RtVal};
use crate::exec::{
    ActiveCmd, Engine, BREAK_FROM_LOOP, FOR_LOOP_INIT, TEST_FAIL, WITHIN_ITERATION,
};
use crate::exec::{BlockLevel, FlowLevel};
use crate::host::{CallbackValue, Host};

/// what the statement-end handler must do after a command ran
pub(crate) enum Dispatched {
    Done,
    /// the command left the active function; the caller continues inside
    /// its own half-finished statement
    FunctionReturn,
}

impl Engine {
    pub(crate) fn dispatch_command(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
        cmd: ActiveCmd,
        step: Step,
    ) -> Result<Dispatched, ExecSignal> {
        let args = self.command_args(cmd.args_base);

        match cmd.code {
            CmdCode::For
            | CmdCode::If
            | CmdCode::While
            | CmdCode::ElseIf
            | CmdCode::Else => {
                self.block_clause(machine, cmd, args, step)?;
                Ok(Dispatched::Done)
            }
            CmdCode::End => self.end_block(machine, cmd, args, step),
            CmdCode::Return => {
                let value = match args.into_iter().next() {
                    Some(slot) => take_value(machine, slot, step)?,
                    None => RtVal::Long(0),
                };
                self.terminate_function(machine, value, step)?;
                Ok(Dispatched::FunctionReturn)
            }
            CmdCode::Break | CmdCode::Continue => {
                self.break_continue(machine, cmd, step)?;
                Ok(Dispatched::Done)
            }

            CmdCode::Print => {
                for slot in args {
                    let value = take_value(machine, slot, step)?;
                    let text = self.fmt.format_value(&value);
                    host.print(&text);
                }
                host.println();
                Ok(Dispatched::Done)
            }

            CmdCode::Info => {
                let mut args = args.into_iter();
                let value = take_value(machine, args.next().unwrap(), step)?;
                host.print(&self.fmt.format_value(&value));
                host.println();
                if let Some(slot) = args.next() {
                    let EvalSlot::Ref(var) = slot else {
                        return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
                    };
                    let line = host.read_line().unwrap_or_default();
                    write_ref(machine, &var, parse_input(&line), step)?;
                }
                Ok(Dispatched::Done)
            }

            CmdCode::Input => {
                let mut args = args.into_iter();
                let prompt = take_value(machine, args.next().unwrap(), step)?;
                host.print(&self.fmt.format_value(&prompt));
                let EvalSlot::Ref(var) = args.next().unwrap() else {
                    return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
                };
                let default = match args.next() {
                    Some(slot) => Some(take_value(machine, slot, step)?),
                    None => None,
                };
                let line = host.read_line();
                match line.as_deref() {
                    Some(text) if !text.trim().is_empty() => {
                        write_ref(machine, &var, parse_input(text), step)?;
                    }
                    _ => {
                        if let Some(value) = default {
                            write_ref(machine, &var, value, step)?;
                        }
                    }
                }
                Ok(Dispatched::Done)
            }

            CmdCode::DispFmt => self.disp_fmt(machine, args, step),
            CmdCode::DispMod => {
                let mut modes = (0, 0);
                let mut iter = args.into_iter();
                for slot in [&mut modes.0, &mut modes.1] {
                    let value = take_value(machine, iter.next().unwrap(), step)?;
                    let Some(Num::Long(mode)) = value.as_num() else {
                        return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
                    };
                    if !(0..=9).contains(&mode) {
                        return Err(ExecSignal::error(ExecErr::ArgOutsideRange, step.0));
                    }
                    *slot = mode;
                }
                self.disp_modes = modes;
                Ok(Dispatched::Done)
            }

            CmdCode::Pause => {
                let value = take_value(machine, args.into_iter().next().unwrap(), step)?;
                let Some(num) = value.as_num() else {
                    return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
                };
                let ms = num.as_f32();
                if !(0.0..=86_400_000.0).contains(&ms) {
                    return Err(ExecSignal::error(ExecErr::ArgOutsideRange, step.0));
                }
                let start = host.millis();
                while host.millis().wrapping_sub(start) < ms as u32 {
                    host.delay_slice();
                    host.housekeeping(&mut self.flags);
                    if self.flags.kill {
                        return Err(ExecSignal::Event(EventCode::Kill));
                    }
                    if self.flags.abort {
                        self.flags.abort = false;
                        return Err(ExecSignal::Event(EventCode::Abort));
                    }
                }
                Ok(Dispatched::Done)
            }

            CmdCode::Halt => {
                while !host.key_pressed() {
                    host.delay_slice();
                    host.housekeeping(&mut self.flags);
                    if self.flags.kill {
                        return Err(ExecSignal::Event(EventCode::Kill));
                    }
                    if self.flags.abort {
                        self.flags.abort = false;
                        return Err(ExecSignal::Event(EventCode::Abort));
                    }
                }
                Ok(Dispatched::Done)
            }

            CmdCode::Quit => {
                for slot in args {
                    drop_slot(machine, slot);
                }
                Err(ExecSignal::Event(EventCode::Quit))
            }

            CmdCode::Stop => {
                self.last_stop_breakpoint = None;
                self.enter_stop();
                Err(ExecSignal::Event(EventCode::StopForDebug))
            }

            CmdCode::Go => self.resume(machine, DebugMode::Go, step),
            CmdCode::Step => self.resume(machine, DebugMode::Step, step),
            CmdCode::StepOver => self.resume(machine, DebugMode::StepOver, step),
            CmdCode::StepOut => self.resume(machine, DebugMode::StepOut, step),
            CmdCode::StepOutOfBlock => self.resume(machine, DebugMode::StepOutOfBlock, step),
            CmdCode::StepToBlockEnd => self.resume(machine, DebugMode::StepToBlockEnd, step),

            CmdCode::Abort => {
                self.clear_execution_state(machine);
                Err(ExecSignal::Event(EventCode::Abort))
            }

            CmdCode::SetNextLine => {
                let value = take_value(machine, args.into_iter().next().unwrap(), step)?;
                let Some(Num::Long(line)) = value.as_num() else {
                    return Err(ExecSignal::error(ExecErr::BpLineNumberExpected, step.0));
                };
                self.set_next_line(machine, line, step)?;
                Ok(Dispatched::Done)
            }

            CmdCode::SetBp => {
                self.set_breakpoint(machine, args, step)?;
                Ok(Dispatched::Done)
            }
            CmdCode::ClearBp | CmdCode::EnableBp | CmdCode::DisableBp => {
                for slot in args {
                    let value = take_value(machine, slot, step)?;
                    let Some(Num::Long(line)) = value.as_num() else {
                        return Err(ExecSignal::error(ExecErr::BpLineNumberExpected, step.0));
                    };
                    self.debug
                        .alter_breakpoint(cmd.code, line as u32)
                        .map_err(|err| ExecSignal::error(err, step.0))?;
                }
                Ok(Dispatched::Done)
            }
            CmdCode::BpOn => {
                self.debug.bp_enabled = true;
                Ok(Dispatched::Done)
            }
            CmdCode::BpOff => {
                self.debug.bp_enabled = false;
                Ok(Dispatched::Done)
            }
            CmdCode::ListBp => {
                let listing = self.debug.list_breakpoints();
                host.print(&listing);
                Ok(Dispatched::Done)
            }

            CmdCode::Trace => {
                match args.into_iter().next() {
                    None => self.debug.trace_expr = None,
                    Some(slot) => {
                        let value = take_value(machine, slot, step)?;
                        let RtVal::Str(text) = value else {
                            return Err(ExecSignal::error(ExecErr::StringExpected, step.0));
                        };
                        self.debug.trace_expr = text.map(|s| s.into_string());
                    }
                }
                Ok(Dispatched::Done)
            }

            CmdCode::Trap => {
                let value = take_value(machine, args.into_iter().next().unwrap(), step)?;
                let Some(num) = value.as_num() else {
                    return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
                };
                self.active.trap_enable = num.is_true();
                if !self.active.trap_enable {
                    self.active.err_value = 0;
                }
                Ok(Dispatched::Done)
            }

            CmdCode::Debug => {
                let text = self.debug_status(machine);
                host.print(&text);
                Ok(Dispatched::Done)
            }

            CmdCode::DelVar => {
                for slot in args {
                    let value = take_value(machine, slot, step)?;
                    let name = value.str_text().to_owned();
                    if !machine.delete_user_var(&name) {
                        return Err(ExecSignal::error(ExecErr::ArgInvalid, step.0));
                    }
                }
                Ok(Dispatched::Done)
            }
            CmdCode::ClearVars => {
                machine.clear_user_vars();
                Ok(Dispatched::Done)
            }
            CmdCode::ClearProg => {
                if self.is_stopped() || self.function_depth() > 0 {
                    return Err(ExecSignal::error(ExecErr::ArgInvalid, step.0));
                }
                machine.clear_program();
                self.debug.breakpoints.clear();
                Ok(Dispatched::Done)
            }
            CmdCode::Vars => {
                let listing = self.var_listing(machine);
                host.print(&listing);
                Ok(Dispatched::Done)
            }

            CmdCode::Callback => {
                self.call_host_callback(machine, host, args, step)?;
                Ok(Dispatched::Done)
            }

            // declarations never reach the dispatcher
            CmdCode::Program
            | CmdCode::Function
            | CmdCode::Var
            | CmdCode::Static
            | CmdCode::Local
            | CmdCode::DeclareCb
            | CmdCode::Nop => Ok(Dispatched::Done),
        }
    }

    // ---- block clauses ----

    fn block_clause(
        &mut self,
        machine: &mut Machine,
        cmd: ActiveCmd,
        args: Vec<EvalSlot>,
        step: Step,
    ) -> Result<(), ExecSignal> {
        let code = cmd.code;
        let mut args = args.into_iter();

        // block starts push (or, for a while loop coming back, reuse)
        // their flow level
        if matches!(code, CmdCode::For | CmdCode::If | CmdCode::While) {
            let reuse = code == CmdCode::While
                && matches!(
                    self.flow.last(),
                    Some(FlowLevel::Block(level))
                        if level.cmd == CmdCode::While
                            && level.start_step == cmd.step
                            && level.loop_ctl & WITHIN_ITERATION == 0
                );

            if !reuse {
                let mut level = BlockLevel {
                    cmd: code,
                    start_step: cmd.step,
                    loop_ctl: 0,
                    ctl_var: None,
                    final_val: Num::Long(0),
                    step_val: Num::Long(0),
                    test_kind: ValueKind::Long,
                    body_step: self.active.next_step,
                };

                if code == CmdCode::For {
                    let Some(EvalSlot::Ref(ctl)) = args.next() else {
                        return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
                    };
                    let current = read_ref(machine, &ctl, step)?;
                    let Some(ctl_num) = current.as_num() else {
                        return Err(ExecSignal::error(
                            ExecErr::TestExprNumberExpected,
                            step.0,
                        ));
                    };
                    let final_val =
                        self.condition_num(machine, args.next().unwrap(), step)?;
                    let (step_val, step_given) = match args.next() {
                        Some(slot) => (self.condition_num(machine, slot, step)?, true),
                        None => (Num::Float(1.0), false),
                    };

                    // the loop test uses the common value type; a float
                    // anywhere makes the whole test float
                    let all_long = matches!(ctl_num, Num::Long(_))
                        && matches!(final_val, Num::Long(_))
                        && step_given
                        && matches!(step_val, Num::Long(_));
                    level.test_kind = if all_long {
                        ValueKind::Long
                    } else {
                        ValueKind::Float
                    };
                    level.ctl_var = Some(ctl);
                    level.final_val = final_val;
                    level.step_val = step_val;
                    level.loop_ctl |= FOR_LOOP_INIT;
                }

                level.loop_ctl &= !BREAK_FROM_LOOP;
                self.flow.push(FlowLevel::Block(level));
            }

            if let Some(FlowLevel::Block(level)) = self.flow.last_mut() {
                level.loop_ctl |= WITHIN_ITERATION;
            }
        }

        // clause test, common to if / elseif / else / while; 'for' skips
        // its body here and lets its 'end' run the first test
        let preceding_fail_or_none = match code {
            CmdCode::ElseIf | CmdCode::Else => match self.flow.last() {
                Some(FlowLevel::Block(level)) => level.loop_ctl & TEST_FAIL != 0,
                _ => true,
            },
            _ => true,
        };
        let test_clause =
            preceding_fail_or_none && code != CmdCode::For && code != CmdCode::Else;

        let mut fail = !preceding_fail_or_none;
        if test_clause {
            let slot = args
                .next()
                .expect("conditional clauses carry their test expression");
            let num = self.condition_value(machine, slot, step)?;
            fail = !num.is_true();
            if let Some(FlowLevel::Block(level)) = self.flow.last_mut() {
                if fail {
                    level.loop_ctl |= TEST_FAIL;
                } else {
                    level.loop_ctl &= !TEST_FAIL;
                }
            }
        } else {
            // a skipped clause evaluated its condition anyway; release it
            for slot in args.by_ref() {
                drop_slot(machine, slot);
            }
        }

        if fail || code == CmdCode::For {
            // jump to the next clause in the chain ('elseif'/'else'/'end'),
            // or, for 'for', to the 'end' that runs the first test
            let target = cmd.link.expect("block commands carry their link");
            self.active.next_step = target;
        }
        Ok(())
    }

    fn end_block(
        &mut self,
        machine: &mut Machine,
        cmd: ActiveCmd,
        args: Vec<EvalSlot>,
        step: Step,
    ) -> Result<Dispatched, ExecSignal> {
        for slot in args {
            drop_slot(machine, slot);
        }

        let top = match self.flow.last() {
            Some(FlowLevel::Block(level)) => Some((level.cmd, level.loop_ctl, level.body_step)),
            Some(FlowLevel::Function { .. }) => None,
            None => return Err(ExecSignal::error(ExecErr::NoProgramStopped, step.0)),
        };

        let Some((block_cmd, loop_ctl, body_step)) = top else {
            // falling off the function's 'end' returns a zero
            self.terminate_function(machine, RtVal::Long(0), step)?;
            return Ok(Dispatched::FunctionReturn);
        };

        let mut exit_loop = true;
        if matches!(block_cmd, CmdCode::For | CmdCode::While) {
            exit_loop = loop_ctl & BREAK_FROM_LOOP != 0;
            if !exit_loop {
                exit_loop = match block_cmd {
                    CmdCode::For => self.test_for_loop(machine, step)?,
                    CmdCode::While => loop_ctl & TEST_FAIL != 0,
                    _ => true,
                };
            }
        }

        if !exit_loop {
            match block_cmd {
                CmdCode::For => self.active.next_step = body_step,
                CmdCode::While => {
                    // jump back to the 'while' itself, re-testing
                    self.active.next_step =
                        cmd.link.expect("end carries the block start link");
                }
                _ => {}
            }
        }

        if let Some(FlowLevel::Block(level)) = self.flow.last_mut() {
            level.loop_ctl &= !WITHIN_ITERATION;
        }
        if exit_loop {
            self.flow.pop();
        }
        Ok(Dispatched::Done)
    }

    /// increment (except on the very first pass) and test the for loop
    /// control variable; true means the loop exits
    fn test_for_loop(&mut self, machine: &mut Machine, step: Step) -> Result<bool, ExecSignal> {
        let (ctl, test_kind, final_val, step_val, first_pass) = match self.flow.last() {
            Some(FlowLevel::Block(level)) => (
                level.ctl_var.expect("for level carries its control variable"),
                level.test_kind,
                level.final_val,
                level.step_val,
                level.loop_ctl & FOR_LOOP_INIT != 0,
            ),
            _ => unreachable!("for end runs on a for level"),
        };

        let current = read_ref(machine, &ctl, step)?;
        let Some(num) = current.as_num() else {
            return Err(ExecSignal::error(ExecErr::TestExprNumberExpected, step.0));
        };

        let exit = match test_kind {
            ValueKind::Long => {
                let step_l = step_val.as_long().unwrap_or(1);
                let mut value = num.as_long().unwrap_or(num.as_f32() as i32);
                if !first_pass {
                    value = value.wrapping_add(step_l);
                    write_ref(machine, &ctl, RtVal::Long(value), step)?;
                }
                let final_l = final_val.as_long().unwrap_or(0);
                if step_l > 0 {
                    value > final_l
                } else {
                    value < final_l
                }
            }
            _ => {
                let step_f = step_val.as_f32();
                let mut value = num.as_f32();
                if !first_pass {
                    value += step_f;
                    // the control variable keeps its own value type
                    let stored = match num {
                        Num::Long(_) => RtVal::Long(value as i32),
                        Num::Float(_) => RtVal::Float(value),
                    };
                    write_ref(machine, &ctl, stored, step)?;
                    if matches!(num, Num::Long(_)) {
                        value = (value as i32) as f32;
                    }
                }
                let final_f = final_val.as_f32();
                if step_f > 0.0 {
                    value > final_f
                } else {
                    value < final_f
                }
            }
        };

        if let Some(FlowLevel::Block(level)) = self.flow.last_mut() {
            level.loop_ctl &= !FOR_LOOP_INIT;
        }
        Ok(exit)
    }

    fn break_continue(
        &mut self,
        machine: &mut Machine,
        cmd: ActiveCmd,
        step: Step,
    ) -> Result<(), ExecSignal> {
        // walk inner 'if' levels off the stack until the loop level
        loop {
            match self.flow.last() {
                Some(FlowLevel::Block(level))
                    if matches!(level.cmd, CmdCode::For | CmdCode::While) =>
                {
                    break;
                }
                Some(FlowLevel::Block(_)) => {
                    self.flow.pop();
                }
                _ => return Err(ExecSignal::error(ExecErr::NoProgramStopped, step.0)),
            }
        }

        if cmd.code == CmdCode::Break {
            if let Some(FlowLevel::Block(level)) = self.flow.last_mut() {
                level.loop_ctl |= BREAK_FROM_LOOP;
            }
        }

        // the token links to the loop start; the start links to the 'end'
        let loop_start = cmd.link.expect("break/continue carry their loop link");
        let (token, _) = read_token(machine.buffer.bytes(), loop_start)
            .ok_or(ExecSignal::error(ExecErr::ArgInvalid, step.0))?;
        let Token::ResWord {
            link: Some(end_step),
            ..
        } = token
        else {
            return Err(ExecSignal::error(ExecErr::ArgInvalid, step.0));
        };
        self.active.next_step = end_step;
        Ok(())
    }

    // ---- helpers ----

    fn condition_num(
        &self,
        machine: &mut Machine,
        slot: EvalSlot,
        step: Step,
    ) -> Result<Num, ExecSignal> {
        self.condition_value(machine, slot, step)
    }

    fn disp_fmt(
        &mut self,
        machine: &mut Machine,
        args: Vec<EvalSlot>,
        step: Step,
    ) -> Result<Dispatched, ExecSignal> {
        let mut iter = args.into_iter();

        let width = take_value(machine, iter.next().unwrap(), step)?;
        let Some(Num::Long(width)) = width.as_num() else {
            return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
        };
        if !(0..=100).contains(&width) {
            return Err(ExecSignal::error(ExecErr::ArgOutsideRange, step.0));
        }
        self.fmt.width = width as usize;

        if let Some(slot) = iter.next() {
            let precision = take_value(machine, slot, step)?;
            let Some(Num::Long(precision)) = precision.as_num() else {
                return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
            };
            if !(0..=20).contains(&precision) {
                return Err(ExecSignal::error(ExecErr::ArgOutsideRange, step.0));
            }
            self.fmt.precision = precision as usize;
        }

        if let Some(slot) = iter.next() {
            let spec = take_value(machine, slot, step)?;
            let RtVal::Str(text) = spec else {
                return Err(ExecSignal::error(ExecErr::StringExpected, step.0));
            };
            let spec = text.as_deref().and_then(|s| s.bytes().next());
            match spec {
                Some(b'f') | Some(b'e') | Some(b'g') | Some(b'd') | Some(b'x') => {
                    self.fmt.spec = spec.unwrap();
                }
                _ => return Err(ExecSignal::error(ExecErr::ArgInvalid, step.0)),
            }
        }

        for slot in iter {
            drop_slot(machine, slot);
        }
        Ok(Dispatched::Done)
    }

    fn resume(
        &mut self,
        machine: &mut Machine,
        mode: DebugMode,
        step: Step,
    ) -> Result<Dispatched, ExecSignal> {
        if self.stopped.is_empty() {
            return Err(ExecSignal::error(ExecErr::NoProgramStopped, step.0));
        }

        // the debug command line is done with the immediate area; the
        // command line that started the stopped program returns to it
        machine.clear_immediate();
        if let Some(saved) = self.cmdline_stack.pop() {
            machine.buffer.restore_immediate(&saved);
        }

        self.active = self.stopped.pop().unwrap();
        self.debug.mode = mode;
        self.debug.step_call_depth = self.function_depth();
        self.debug.step_flow_levels = self.flow.len();
        self.debug.skip_checks_once = true;
        self.last_stop_breakpoint = None;
        Ok(Dispatched::Done)
    }

    fn call_host_callback(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
        args: Vec<EvalSlot>,
        step: Step,
    ) -> Result<(), ExecSignal> {
        let mut iter = args.into_iter();
        let name = take_value(machine, iter.next().unwrap(), step)?;
        let name = name.str_text().to_owned();
        if !machine.callback_aliases.iter().any(|alias| *alias == name) {
            return Err(ExecSignal::error(ExecErr::CallbackNotDeclared, step.0));
        }

        let mut refs: Vec<Option<crate::eval::VarRef>> = vec![];
        let mut values: Vec<CallbackValue> = vec![];
        for slot in iter {
            let var = match &slot {
                EvalSlot::Ref(var) => Some(*var),
                _ => None,
            };
            refs.push(var);
            let value = take_value(machine, slot, step)?;
            values.push(match value {
                RtVal::Long(v) => CallbackValue::Long(v),
                RtVal::Float(v) => CallbackValue::Float(v),
                RtVal::Str(s) => CallbackValue::Str(s.map(|s| s.into_string()).unwrap_or_default()),
            });
        }

        if !host.callback(&name, &mut values) {
            return Err(ExecSignal::error(ExecErr::CallbackNotDeclared, step.0));
        }

        // scalar results write back through variable arguments
        for (var, value) in refs.into_iter().zip(values.into_iter()) {
            if let Some(var) = var {
                let value = match value {
                    CallbackValue::Long(v) => RtVal::Long(v),
                    CallbackValue::Float(v) => RtVal::Float(v),
                    CallbackValue::Str(s) => RtVal::from_str_value(&s),
                };
                write_ref(machine, &var, value, step)?;
            }
        }
        Ok(())
    }

    fn var_listing(&self, machine: &Machine) -> String {
        let mut text = String::new();
        for (index, name) in machine.user_var_names.iter().enumerate() {
            if let Some(variable) = &machine.users[index] {
                text.push_str(&format!(
                    "(user)   {} = {}\n",
                    name,
                    describe_value(&variable.value)
                ));
            }
        }
        for (index, name) in machine.program_var_names.iter().enumerate() {
            if let Some(variable) = &machine.globals[index] {
                text.push_str(&format!(
                    "(global) {} = {}\n",
                    name,
                    describe_value(&variable.value)
                ));
            }
        }
        text
    }

    fn debug_status(&self, machine: &Machine) -> String {
        let mut text = String::new();
        text.push_str(&format!("open debug levels: {}\n", self.stopped.len()));
        if let Some(stopped) = self.stopped.last() {
            let line = machine.line_for_step(stopped.next_step);
            if let Some(func_index) = stopped.func_index {
                text.push_str(&format!(
                    "stopped in {} at line {}\n",
                    machine.extern_func_names.name(func_index as usize),
                    line.unwrap_or(0)
                ));
            }
        }
        text
    }
}

/// console input becomes a long, a float or a string, whichever parses first
fn parse_input(text: &str) -> RtVal {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i32>() {
        return RtVal::Long(v);
    }
    if let Ok(v) = trimmed.parse::<f32>() {
        return RtVal::Float(v);
    }
    RtVal::from_str_value(trimmed)
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Long(v) => format!("{}", v),
        Value::Float(v) => format!("{:?}", v),
        Value::Str(None) => "\"\"".to_owned(),
        Value::Str(Some(s)) => format!("\"{}\"", s),
        Value::Array(block) => {
            let dims: Vec<String> = (0..block.dim_count as usize)
                .map(|d| format!("{}", block.dims[d]))
                .collect();
            format!("array({})", dims.join(","))
        }
    }
}

impl Engine {
    /// install or replace a breakpoint on a source line
    fn set_breakpoint(
        &mut self,
        machine: &mut Machine,
        args: Vec<EvalSlot>,
        step: Step,
    ) -> Result<(), ExecSignal> {
        let mut iter = args.into_iter();
        let line = take_value(machine, iter.next().unwrap(), step)?;
        let Some(Num::Long(line)) = line.as_num() else {
            return Err(ExecSignal::error(ExecErr::BpLineNumberExpected, step.0));
        };
        let line = line as u32;
        let Some(stmt_step) = machine.step_for_line(line) else {
            return Err(ExecSignal::error(ExecErr::BpLineNotExecutable, step.0));
        };

        let mut hit_count = None;
        let mut trigger = None;
        if let Some(slot) = iter.next() {
            match take_value(machine, slot, step)? {
                RtVal::Long(count) => {
                    if !(1..=10_000).contains(&count) {
                        return Err(ExecSignal::error(
                            ExecErr::BpHitCountNotWithinRange,
                            step.0,
                        ));
                    }
                    hit_count = Some(count as u32);
                }
                RtVal::Str(text) => trigger = text.map(|s| s.into_string()),
                RtVal::Float(_) => {
                    return Err(ExecSignal::error(
                        ExecErr::BpHitCountNotWithinRange,
                        step.0,
                    ))
                }
            }
        }
        let view = match iter.next() {
            Some(slot) => match take_value(machine, slot, step)? {
                RtVal::Str(text) => text.map(|s| s.into_string()),
                _ => return Err(ExecSignal::error(ExecErr::StringExpected, step.0)),
            },
            None => None,
        };

        self.debug
            .set_breakpoint(line, stmt_step, hit_count, trigger, view)
            .map_err(|err| ExecSignal::error(err, step.0))
    }
}

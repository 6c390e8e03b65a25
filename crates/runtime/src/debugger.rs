// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the debugger state machine.
//
// a running program stops when: a 'stop' statement executes, a breakpoint
// matches the next statement, a step mode condition holds, or the host
// raised the forced-stop flag. stops happen at statement boundaries only.
//
// on resume the step mode remembers the call-stack depth and flow-level
// count, so 'stepOver' stops when the depth is back, 'stepOut' when it
// shrank, 'stepOutOfBlock' when the inner block was left, and
// 'stepToBlockEnd' when the next statement is the block's 'end'.

use justina_program::Machine;
use justina_tokens::reader::{next_statement_step, read_token};
use justina_tokens::{Step, Token};
use justina_types::command::CmdCode;
use justina_types::error::{ExecErr, ExecSignal};
use justina_types::MAX_BREAKPOINTS;

use crate::exec::{Engine, FlowLevel};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DebugMode {
    None,
    Step,
    StepOver,
    StepOut,
    StepOutOfBlock,
    StepToBlockEnd,
    Go,
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub line: u32,
    pub step: Step,
    pub enabled: bool,
    pub hit_count: Option<u32>,
    pub hits: u32,
    pub trigger: Option<String>,
    pub view: Option<String>,
}

/// why the engine is stopping; 'breakpoint' carries the table index so the
/// session can check a trigger expression or print a view expression
pub struct StopHit {
    pub breakpoint: Option<usize>,
}

pub struct DebugState {
    pub mode: DebugMode,
    pub step_call_depth: usize,
    pub step_flow_levels: usize,
    pub bp_enabled: bool,
    /// the first statement after a resume must run before stop conditions
    /// re-arm (a 'step' executes one statement, a breakpoint on the resume
    /// statement does not fire twice)
    pub skip_checks_once: bool,
    pub breakpoints: Vec<Breakpoint>,
    pub trace_expr: Option<String>,
}

impl DebugState {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            mode: DebugMode::None,
            step_call_depth: 0,
            step_flow_levels: 0,
            bp_enabled: true,
            skip_checks_once: false,
            breakpoints: vec![],
            trace_expr: None,
        }
    }

    /// decide whether execution stops before the statement at 'next_step'
    pub fn stop_reason(
        &mut self,
        machine: &Machine,
        next_step: Step,
        func_depth: usize,
        flow_levels: usize,
        forced: bool,
    ) -> Option<StopHit> {
        if self.skip_checks_once {
            self.skip_checks_once = false;
            return None;
        }
        if forced {
            return Some(StopHit { breakpoint: None });
        }

        let step_stop = match self.mode {
            DebugMode::None | DebugMode::Go => false,
            DebugMode::Step => true,
            DebugMode::StepOver => func_depth <= self.step_call_depth,
            DebugMode::StepOut => func_depth < self.step_call_depth,
            DebugMode::StepOutOfBlock => flow_levels < self.step_flow_levels,
            DebugMode::StepToBlockEnd => {
                flow_levels <= self.step_flow_levels
                    && matches!(
                        read_token(machine.buffer.bytes(), next_step),
                        Some((
                            Token::ResWord {
                                cmd: CmdCode::End,
                                ..
                            },
                            _
                        ))
                    )
            }
        };
        if step_stop {
            return Some(StopHit { breakpoint: None });
        }

        if !self.bp_enabled {
            return None;
        }
        let index = self
            .breakpoints
            .iter()
            .position(|bp| bp.enabled && bp.step == next_step)?;
        let bp = &mut self.breakpoints[index];
        if bp.trigger.is_some() {
            // the session evaluates the trigger and silently resumes when
            // it is false
            return Some(StopHit {
                breakpoint: Some(index),
            });
        }
        if let Some(count) = bp.hit_count {
            bp.hits += 1;
            if bp.hits < count {
                return None;
            }
            bp.hits = 0;
        }
        Some(StopHit {
            breakpoint: Some(index),
        })
    }

    pub fn set_breakpoint(
        &mut self,
        line: u32,
        step: Step,
        hit_count: Option<u32>,
        trigger: Option<String>,
        view: Option<String>,
    ) -> Result<(), ExecErr> {
        if let Some(existing) = self.breakpoints.iter_mut().find(|bp| bp.line == line) {
            existing.step = step;
            existing.enabled = true;
            existing.hit_count = hit_count;
            existing.hits = 0;
            existing.trigger = trigger;
            existing.view = view;
            return Ok(());
        }
        if self.breakpoints.len() >= MAX_BREAKPOINTS {
            return Err(ExecErr::BpTableFull);
        }
        self.breakpoints.push(Breakpoint {
            line,
            step,
            enabled: true,
            hit_count,
            hits: 0,
            trigger,
            view,
        });
        Ok(())
    }

    pub fn alter_breakpoint(&mut self, cmd: CmdCode, line: u32) -> Result<(), ExecErr> {
        let Some(index) = self.breakpoints.iter().position(|bp| bp.line == line) else {
            return Err(ExecErr::ArgInvalid);
        };
        match cmd {
            CmdCode::ClearBp => {
                self.breakpoints.remove(index);
            }
            CmdCode::EnableBp => self.breakpoints[index].enabled = true,
            CmdCode::DisableBp => self.breakpoints[index].enabled = false,
            _ => unreachable!("breakpoint commands only"),
        }
        Ok(())
    }

    pub fn list_breakpoints(&self) -> String {
        let mut text = String::new();
        if !self.bp_enabled {
            text.push_str("breakpoints are globally disabled\n");
        }
        for bp in &self.breakpoints {
            text.push_str(&format!(
                "line {:<5} {}{}{}\n",
                bp.line,
                if bp.enabled { "enabled " } else { "disabled" },
                match bp.hit_count {
                    Some(count) => format!("  hit count {}", count),
                    None => String::new(),
                },
                match &bp.trigger {
                    Some(trigger) => format!("  trigger \"{}\"", trigger),
                    None => String::new(),
                },
            ));
        }
        text
    }
}

impl Engine {
    /// move the stopped program's next statement to the first statement of
    /// a source line, refusing jumps into blocks
    pub(crate) fn set_next_line(
        &mut self,
        machine: &mut Machine,
        line: i32,
        step: Step,
    ) -> Result<(), ExecSignal> {
        if line < 1 {
            return Err(ExecSignal::error(ExecErr::BpLineNumberExpected, step.0));
        }
        let Some(stopped) = self.stopped.last() else {
            return Err(ExecSignal::error(ExecErr::NoProgramStopped, step.0));
        };
        let Some(func_index) = stopped.func_index else {
            return Err(ExecSignal::error(
                ExecErr::BpLineNotInStoppedFunction,
                step.0,
            ));
        };

        let Some(target) = machine.step_for_line(line as u32) else {
            return Err(ExecSignal::error(ExecErr::BpLineNotExecutable, step.0));
        };

        // the target must lie inside the stopped function's body
        let attrs = &machine.functions[func_index as usize];
        let body_step = attrs.body_step.expect("stopped function is defined");
        let cmd_step = attrs.cmd_step.expect("stopped function is defined");
        let (function_token, _) =
            read_token(machine.buffer.bytes(), cmd_step).expect("function token");
        let Token::ResWord {
            link: Some(end_step),
            ..
        } = function_token
        else {
            return Err(ExecSignal::error(ExecErr::BpLineNotExecutable, step.0));
        };
        if target < body_step || target > end_step {
            return Err(ExecSignal::error(
                ExecErr::BpLineNotInStoppedFunction,
                step.0,
            ));
        }

        let current = stopped.next_step;
        if target == current {
            return Ok(());
        }

        // scan the statements between the two positions, tracking the
        // block nesting delta; a jump may leave blocks (they are popped)
        // but never enter one
        let (from, to, forward) = if current < target {
            (current, target, true)
        } else {
            (target, current, false)
        };
        let mut delta: i32 = 0;
        let mut min_delta: i32 = 0;
        let mut at = Some(from);
        while let Some(stmt) = at {
            if stmt >= to {
                break;
            }
            if let Some((token, _)) = read_token(machine.buffer.bytes(), stmt) {
                match token {
                    Token::ResWord { cmd, .. } => match cmd {
                        CmdCode::If | CmdCode::While | CmdCode::For => delta += 1,
                        CmdCode::End => delta -= 1,
                        _ => {}
                    },
                    _ => {}
                }
            }
            min_delta = min_delta.min(delta);
            at = next_statement_step(machine.buffer.bytes(), stmt);
        }

        let pops = if forward {
            // blocks opened during the scan must have closed again;
            // dips below zero are enclosing blocks being left
            if delta != min_delta {
                return Err(ExecSignal::error(ExecErr::BpCannotMoveIntoBlocks, step.0));
            }
            (-min_delta) as usize
        } else {
            // backward: a dip below zero means the target sits inside a
            // block that is already closed before the current position
            if min_delta < 0 {
                return Err(ExecSignal::error(ExecErr::BpCannotMoveIntoBlocks, step.0));
            }
            delta.max(0) as usize
        };

        // abandon the inner block levels the jump leaves behind
        for _ in 0..pops {
            match self.flow.last() {
                Some(FlowLevel::Block(_)) => {
                    self.flow.pop();
                }
                _ => {
                    return Err(ExecSignal::error(
                        ExecErr::BpCannotMoveIntoBlocks,
                        step.0,
                    ))
                }
            }
        }

        let stopped = self.stopped.last_mut().unwrap();
        stopped.next_step = target;
        stopped.stmt_step = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_breakpoint_table() {
        let mut debug = DebugState::new();
        debug
            .set_breakpoint(10, Step(100), None, None, None)
            .unwrap();
        debug
            .set_breakpoint(12, Step(140), Some(3), None, None)
            .unwrap();

        // replacing by line keeps one entry
        debug
            .set_breakpoint(10, Step(100), Some(2), None, None)
            .unwrap();
        assert_eq!(debug.breakpoints.len(), 2);

        debug.alter_breakpoint(CmdCode::DisableBp, 10).unwrap();
        assert!(!debug.breakpoints[0].enabled);
        debug.alter_breakpoint(CmdCode::ClearBp, 10).unwrap();
        assert_eq!(debug.breakpoints.len(), 1);
        assert_eq!(
            debug.alter_breakpoint(CmdCode::ClearBp, 99),
            Err(ExecErr::ArgInvalid)
        );
    }

    #[test]
    fn test_hit_count_fires_on_the_nth_arrival() {
        let mut debug = DebugState::new();
        let machine = Machine::new();
        debug
            .set_breakpoint(5, Step(80), Some(3), None, None)
            .unwrap();

        assert!(debug
            .stop_reason(&machine, Step(80), 1, 1, false)
            .is_none());
        assert!(debug
            .stop_reason(&machine, Step(80), 1, 1, false)
            .is_none());
        let hit = debug.stop_reason(&machine, Step(80), 1, 1, false);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().breakpoint, Some(0));
    }

    #[test]
    fn test_step_modes() {
        let mut debug = DebugState::new();
        let machine = Machine::new();

        debug.mode = DebugMode::StepOver;
        debug.step_call_depth = 2;
        assert!(debug
            .stop_reason(&machine, Step(0), 3, 0, false)
            .is_none());
        assert!(debug.stop_reason(&machine, Step(0), 2, 0, false).is_some());

        debug.mode = DebugMode::StepOut;
        debug.step_call_depth = 2;
        assert!(debug
            .stop_reason(&machine, Step(0), 2, 0, false)
            .is_none());
        assert!(debug.stop_reason(&machine, Step(0), 1, 0, false).is_some());
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the interactive session: one machine, one engine, one host.
//
// 'load_program' parses a program text into the program area;
// 'process_line' parses a command line into the immediate area and runs
// it. when a running program stops for debugging, the session saves the
// interrupted command line on the command-line stack, evaluates trigger
// and trace expressions, and hands the prompt back; the next lines are
// debugger commands executing on the same stacks until one of them
// resumes.

use justina_parser::{InputCursor, Parser};
use justina_program::Machine;
use justina_tokens::program_buffer::{Area, ProgramBuffer};
use justina_tokens::Step;
use justina_types::error::{EventCode, ExecSignal, ParseError};

use crate::exec::Engine;
use crate::host::Host;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    Done,
    Stopped,
    ParseError,
    ExecError,
    Aborted,
    Quit,
    Killed,
}

pub struct Session<H: Host> {
    pub machine: Machine,
    pub engine: Engine,
    pub host: H,
}

impl<H: Host> Session<H> {
    pub fn new(host: H) -> Self {
        Self {
            machine: Machine::new(),
            engine: Engine::new(),
            host,
        }
    }

    /// parse a program text into the program area. a parse error prints
    /// the offending line with a caret and leaves the program area empty.
    pub fn load_program(&mut self, text: &str) -> Result<(), ParseError> {
        self.engine.clear_execution_state(&mut self.machine);
        self.machine.clear_program();
        self.engine.debug.breakpoints.clear();

        let failure = {
            let mut parser = Parser::new(&mut self.machine, Area::Program);
            let mut input = InputCursor::new(text);
            let mut failure: Option<(u32, ParseError)> = None;
            loop {
                match parser.parse_statement(&mut input) {
                    Ok(Some(info)) => {
                        parser.machine.record_statement_line(info.line, info.step);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        failure = Some((input.line(), err));
                        break;
                    }
                }
            }
            if failure.is_none() {
                if let Err(err) = parser.finish(&input) {
                    failure = Some((input.line(), err));
                }
            }
            failure
        };

        if let Some((line, err)) = failure {
            self.report_parse_error(text, line, err);
            self.machine.clear_program();
            return Err(err);
        }
        Ok(())
    }

    /// parse and execute one command line
    pub fn process_line(&mut self, text: &str) -> Outcome {
        self.machine.clear_immediate();

        let failure = {
            let mut parser = Parser::new(&mut self.machine, Area::Immediate);
            let mut input = InputCursor::new(text);
            let mut failure: Option<(u32, ParseError)> = None;
            loop {
                match parser.parse_statement(&mut input) {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(err) => {
                        failure = Some((input.line(), err));
                        break;
                    }
                }
            }
            if failure.is_none() {
                if let Err(err) = parser.finish(&input) {
                    failure = Some((input.line(), err));
                }
            }
            failure
        };

        if let Some((line, err)) = failure {
            self.report_parse_error(text, line, err);
            self.machine.clear_immediate();
            return Outcome::ParseError;
        }

        let result = self.engine.exec_immediate(
            &mut self.machine,
            &mut self.host,
            ProgramBuffer::immediate_start(),
        );
        self.settle(result)
    }

    /// full reset: tear everything down and report leaked heap objects
    pub fn reset(&mut self) -> Vec<String> {
        self.engine.clear_execution_state(&mut self.machine);
        self.engine.debug.breakpoints.clear();
        self.engine.debug.trace_expr = None;
        let report = self.machine.reset_all();
        for line in &report {
            self.host.print(line);
            self.host.println();
        }
        self.engine = Engine::new();
        report
    }

    // ---- outcome handling ----

    fn settle(&mut self, mut result: Result<(), ExecSignal>) -> Outcome {
        loop {
            match result {
                Ok(()) => return Outcome::Done,

                Err(ExecSignal::Error { err, step }) => {
                    let mut text = format!("{}", err);
                    if let Some(line) = self.machine.line_for_step(Step(step)) {
                        text.push_str(&format!(" (line {})", line));
                    }
                    self.host.print(&text);
                    self.host.println();
                    return Outcome::ExecError;
                }

                Err(ExecSignal::Event(EventCode::StopForDebug)) => {
                    // keep the interrupted command line for the resume
                    self.engine
                        .cmdline_stack
                        .push(self.machine.buffer.save_immediate());
                    self.machine.buffer.clear_immediate();

                    // a trigger breakpoint only really stops when its
                    // expression is true
                    if let Some(index) = self.engine.last_stop_breakpoint {
                        let trigger = self
                            .engine
                            .debug
                            .breakpoints
                            .get(index)
                            .and_then(|bp| bp.trigger.clone());
                        if let Some(trigger) = trigger {
                            if !self.eval_trigger(&trigger) {
                                result = self.resume_quietly();
                                continue;
                            }
                        }
                        let view = self
                            .engine
                            .debug
                            .breakpoints
                            .get(index)
                            .and_then(|bp| bp.view.clone());
                        if let Some(view) = view {
                            self.host.print("view> ");
                            self.run_synthetic(&view);
                        }
                    }

                    let line = self
                        .engine
                        .stopped
                        .last()
                        .and_then(|stopped| self.machine.line_for_step(stopped.next_step));
                    self.host.print(&format!(
                        "+++ stopped for debug (line {})",
                        line.unwrap_or(0)
                    ));
                    self.host.println();

                    if let Some(trace) = self.engine.debug.trace_expr.clone() {
                        self.host.print("trace> ");
                        self.run_synthetic(&trace);
                    }
                    return Outcome::Stopped;
                }

                Err(ExecSignal::Event(EventCode::Abort)) => {
                    self.engine.clear_execution_state(&mut self.machine);
                    self.machine.clear_immediate();
                    self.host.print("+++ abort");
                    self.host.println();
                    return Outcome::Aborted;
                }

                Err(ExecSignal::Event(EventCode::Quit)) => return Outcome::Quit,

                Err(ExecSignal::Event(EventCode::Kill)) => {
                    self.reset();
                    self.host.print("+++ kill");
                    self.host.println();
                    return Outcome::Killed;
                }

                Err(ExecSignal::Event(EventCode::InitiateProgramLoad)) => {
                    return Outcome::Done;
                }
            }
        }
    }

    /// evaluate a trigger expression; non-numeric or failing expressions
    /// count as true so a broken trigger still stops
    fn eval_trigger(&mut self, expr: &str) -> bool {
        self.engine.echo_results = false;
        let outcome = self.run_synthetic(expr);
        self.engine.echo_results = true;
        if outcome != Outcome::Done {
            return true;
        }
        match self.machine.last_result(1) {
            Some(justina_program::ConstValue::Long(v)) => *v != 0,
            Some(justina_program::ConstValue::Float(v)) => *v != 0.0,
            _ => true,
        }
    }

    /// parse and run one expression text as an immediate statement
    /// (trigger, trace and view expressions)
    fn run_synthetic(&mut self, expr: &str) -> Outcome {
        let text = format!("{};", expr);
        self.machine.clear_immediate();
        let failed = {
            let mut parser = Parser::new(&mut self.machine, Area::Immediate);
            let mut input = InputCursor::new(&text);
            let mut failed = false;
            loop {
                match parser.parse_statement(&mut input) {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(_) => {
                        failed = true;
                        break;
                    }
                }
            }
            failed
        };
        if failed {
            self.machine.clear_immediate();
            self.host.print("(expression not valid)");
            self.host.println();
            return Outcome::ParseError;
        }
        let result = self.engine.exec_immediate(
            &mut self.machine,
            &mut self.host,
            ProgramBuffer::immediate_start(),
        );
        match result {
            Ok(()) => Outcome::Done,
            Err(_) => {
                self.host.print("(expression not valid)");
                self.host.println();
                Outcome::ExecError
            }
        }
    }

    /// resume a false-trigger stop the way a typed 'go' would
    fn resume_quietly(&mut self) -> Result<(), ExecSignal> {
        self.machine.clear_immediate();
        let mut parser = Parser::new(&mut self.machine, Area::Immediate);
        let mut input = InputCursor::new("go;");
        while let Ok(Some(_)) = parser.parse_statement(&mut input) {}
        self.engine.exec_immediate(
            &mut self.machine,
            &mut self.host,
            ProgramBuffer::immediate_start(),
        )
    }

    fn report_parse_error(&mut self, text: &str, line: u32, err: ParseError) {
        self.host.print(&format!("{}", err));
        self.host.println();
        let source_line = text.lines().nth(line as usize - 1).unwrap_or("");
        self.host.print(source_line);
        self.host.println();
        // the caret belongs under the offending column
        self.host.print(&format!("{:>1$}", "^", err.pos));
        self.host.println();
    }
}

#[cfg(test)]
mod tests;

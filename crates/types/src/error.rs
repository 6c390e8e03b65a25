// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// error and event codes.
//
// the numeric codes are part of the language surface: a trapped execution
// error is returned to user code by the 'err()' function, and every reported
// error message starts with the code. parse errors additionally carry the
// 1-based character position within the offending input line.

use std::fmt::{Display, Formatter};

/// statement parsing errors (codes 1000..)
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErr {
    TokenNotRecognised = 1001,
    SpaceMissing = 1002,
    IdentifierTooLong = 1003,
    ResWordNotAllowedHere = 1004,
    NumberInvalidFormat = 1005,
    Overflow = 1006,
    AlphaClosingQuoteMissing = 1007,
    AlphaConstInvalidEscSeq = 1008,
    AlphaConstTooLong = 1009,
    ParenthesisNotAllowedHere = 1010,
    MissingLeftParenthesis = 1011,
    MissingRightParenthesis = 1012,
    ArrayDefMaxDimsExceeded = 1013,
    ArrayDefMaxElementsExceeded = 1014,
    ArrayDefDimNotValid = 1015,
    ArrayUseWrongDimCount = 1016,
    VarNotDeclared = 1017,
    VarRedeclared = 1018,
    ControlVarInUse = 1019,
    AssignmNotAllowedHere = 1020,
    ConstantValueExpected = 1021,
    ExpressionNotComplete = 1022,
    OperatorNotAllowedHere = 1023,
    CommaNotAllowedHere = 1024,
    FunctionDefExpected = 1025,
    FunctionAlreadyDefinedBefore = 1026,
    PrevCallsWrongArgCount = 1027,
    WrongArgCount = 1028,
    ScalarArgExpected = 1029,
    ArrayArgExpected = 1030,
    FcnScalarAndArrayArgOrderNotConsistent = 1031,
    CmdParameterMissing = 1032,
    CmdHasTooManyParameters = 1033,
    ExpressionExpectedAsCmdPar = 1034,
    VariableExpectedAsCmdPar = 1035,
    VariableWithoutAssignmentExpectedAsCmdPar = 1036,
    IdentifierExpectedAsCmdPar = 1037,
    FunctionNameExpectedAsCmdPar = 1038,
    OnlyImmediateMode = 1040,
    OnlyInsideProgram = 1041,
    OnlyInsideFunction = 1042,
    OnlyOutsideFunction = 1043,
    OnlyInProgOutsideFunction = 1044,
    OnlyImmediateOrInFunction = 1045,
    OnlyProgramTop = 1046,
    NoOpenBlock = 1047,
    NoOpenLoop = 1048,
    NoOpenFunction = 1049,
    NotAllowedInThisOpenBlock = 1050,
    WrongBlockSequence = 1051,
    BlockNotClosed = 1052,
    ProgMemoryFull = 1053,
    MaxVariableNamesReached = 1054,
    MaxLocalVariablesReached = 1055,
    MaxStaticVariablesReached = 1056,
    MaxExtFunctionsReached = 1057,
    MaxIdentifierNamesReached = 1058,
    FunctionDefsCannotBeNested = 1059,
    ParamAfterOptionalParam = 1060,
    OperatorExpected = 1061,
    OperandExpected = 1062,
}

impl ParseErr {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn message(&self) -> &'static str {
        match self {
            ParseErr::TokenNotRecognised => "token not recognised",
            ParseErr::SpaceMissing => "space missing between tokens",
            ParseErr::IdentifierTooLong => "identifier is too long",
            ParseErr::ResWordNotAllowedHere => "keyword not allowed here",
            ParseErr::NumberInvalidFormat => "number has an invalid format",
            ParseErr::Overflow => "number is outside the valid range",
            ParseErr::AlphaClosingQuoteMissing => "closing quote missing in string",
            ParseErr::AlphaConstInvalidEscSeq => "invalid escape sequence in string",
            ParseErr::AlphaConstTooLong => "string is too long",
            ParseErr::ParenthesisNotAllowedHere => "parenthesis not allowed here",
            ParseErr::MissingLeftParenthesis => "left parenthesis missing",
            ParseErr::MissingRightParenthesis => "right parenthesis missing",
            ParseErr::ArrayDefMaxDimsExceeded => "too many array dimensions",
            ParseErr::ArrayDefMaxElementsExceeded => "too many array elements",
            ParseErr::ArrayDefDimNotValid => "array dimension is not valid",
            ParseErr::ArrayUseWrongDimCount => "wrong number of array subscripts",
            ParseErr::VarNotDeclared => "variable is not declared",
            ParseErr::VarRedeclared => "variable is already declared",
            ParseErr::ControlVarInUse => "loop control variable is already in use",
            ParseErr::AssignmNotAllowedHere => "assignment not allowed here",
            ParseErr::ConstantValueExpected => "constant value expected",
            ParseErr::ExpressionNotComplete => "expression is not complete",
            ParseErr::OperatorNotAllowedHere => "operator not allowed here",
            ParseErr::CommaNotAllowedHere => "comma not allowed here",
            ParseErr::FunctionDefExpected => "function definition expected",
            ParseErr::FunctionAlreadyDefinedBefore => "function is already defined",
            ParseErr::PrevCallsWrongArgCount => {
                "argument count does not match previous calls"
            }
            ParseErr::WrongArgCount => "wrong number of arguments",
            ParseErr::ScalarArgExpected => "scalar argument expected",
            ParseErr::ArrayArgExpected => "array argument expected",
            ParseErr::FcnScalarAndArrayArgOrderNotConsistent => {
                "scalar and array argument order is not consistent with other calls"
            }
            ParseErr::CmdParameterMissing => "command parameter missing",
            ParseErr::CmdHasTooManyParameters => "command has too many parameters",
            ParseErr::ExpressionExpectedAsCmdPar => "expression expected as command parameter",
            ParseErr::VariableExpectedAsCmdPar => "variable expected as command parameter",
            ParseErr::VariableWithoutAssignmentExpectedAsCmdPar => {
                "variable without assignment expected as command parameter"
            }
            ParseErr::IdentifierExpectedAsCmdPar => "identifier expected as command parameter",
            ParseErr::FunctionNameExpectedAsCmdPar => {
                "function name expected as command parameter"
            }
            ParseErr::OnlyImmediateMode => "command is only allowed in immediate mode",
            ParseErr::OnlyInsideProgram => "command is only allowed inside a program",
            ParseErr::OnlyInsideFunction => "command is only allowed inside a function",
            ParseErr::OnlyOutsideFunction => "command is not allowed inside a function",
            ParseErr::OnlyInProgOutsideFunction => {
                "command is only allowed in a program, outside functions"
            }
            ParseErr::OnlyImmediateOrInFunction => {
                "command is only allowed in immediate mode or inside a function"
            }
            ParseErr::OnlyProgramTop => "command is only allowed at the start of a program",
            ParseErr::NoOpenBlock => "no open block",
            ParseErr::NoOpenLoop => "no open loop",
            ParseErr::NoOpenFunction => "no open function definition",
            ParseErr::NotAllowedInThisOpenBlock => "not allowed in this open block",
            ParseErr::WrongBlockSequence => "wrong order of commands within block",
            ParseErr::BlockNotClosed => "open block is not closed",
            ParseErr::ProgMemoryFull => "program memory is full",
            ParseErr::MaxVariableNamesReached => "maximum number of variables reached",
            ParseErr::MaxLocalVariablesReached => "maximum number of local variables reached",
            ParseErr::MaxStaticVariablesReached => "maximum number of static variables reached",
            ParseErr::MaxExtFunctionsReached => "maximum number of functions reached",
            ParseErr::MaxIdentifierNamesReached => "maximum number of identifiers reached",
            ParseErr::FunctionDefsCannotBeNested => "function definitions cannot be nested",
            ParseErr::ParamAfterOptionalParam => {
                "mandatory parameter after optional parameter"
            }
            ParseErr::OperatorExpected => "operator expected",
            ParseErr::OperandExpected => "operand expected",
        }
    }
}

/// a parse error with the 1-based character position where it was detected
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ParseError {
    pub err: ParseErr,
    pub pos: usize,
}

impl ParseError {
    pub fn new(err: ParseErr, pos: usize) -> Self {
        Self { err, pos }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "parsing error {}: {} (column {})",
            self.err.code(),
            self.err.message(),
            self.pos
        )
    }
}

/// execution errors (codes 2000..)
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExecErr {
    NumberExpected = 2001,
    StringExpected = 2002,
    VariableExpected = 2003,
    ArgOutsideRange = 2004,
    ArgInvalid = 2005,
    IntegerTypeExpected = 2006,
    OperatorNotAllowedForTypes = 2007,
    DivideByZero = 2008,
    ArrayValueTypeIsFixed = 2009,
    ArraySubscriptOutsideBounds = 2010,
    UndefinedFunction = 2011,
    CannotChangeConstantValue = 2012,
    TestExprNumberExpected = 2013,
    NoProgramStopped = 2014,
    BpLineNumberExpected = 2020,
    BpLineNotInStoppedFunction = 2021,
    BpCannotMoveIntoBlocks = 2022,
    BpHitCountNotWithinRange = 2023,
    BpLineNotExecutable = 2024,
    BpTableFull = 2025,
    InvalidStreamNumber = 2030,
    NoDeviceOrNotForInput = 2031,
    NoDeviceOrNotForOutput = 2032,
    CallbackNotDeclared = 2033,
    EvalStackOverflow = 2040,
    MaxCallDepthReached = 2041,
}

impl ExecErr {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn message(&self) -> &'static str {
        match self {
            ExecErr::NumberExpected => "number expected",
            ExecErr::StringExpected => "string expected",
            ExecErr::VariableExpected => "variable expected",
            ExecErr::ArgOutsideRange => "argument is outside the valid range",
            ExecErr::ArgInvalid => "argument is not valid",
            ExecErr::IntegerTypeExpected => "integer operand expected",
            ExecErr::OperatorNotAllowedForTypes => "operator not allowed for operand types",
            ExecErr::DivideByZero => "division by zero",
            ExecErr::ArrayValueTypeIsFixed => "array element type is fixed",
            ExecErr::ArraySubscriptOutsideBounds => "array subscript is outside bounds",
            ExecErr::UndefinedFunction => "function is called but never defined",
            ExecErr::CannotChangeConstantValue => "cannot change a constant value",
            ExecErr::TestExprNumberExpected => "test expression must be a number",
            ExecErr::NoProgramStopped => "no program is stopped",
            ExecErr::BpLineNumberExpected => "source line number expected",
            ExecErr::BpLineNotInStoppedFunction => {
                "source line is not in the stopped function"
            }
            ExecErr::BpCannotMoveIntoBlocks => "cannot move into or across blocks",
            ExecErr::BpHitCountNotWithinRange => "hit count is not within range",
            ExecErr::BpLineNotExecutable => "no executable statement starts on this line",
            ExecErr::BpTableFull => "breakpoint table is full",
            ExecErr::InvalidStreamNumber => "invalid stream number",
            ExecErr::NoDeviceOrNotForInput => "no device, or device is not for input",
            ExecErr::NoDeviceOrNotForOutput => "no device, or device is not for output",
            ExecErr::CallbackNotDeclared => "callback is not declared",
            ExecErr::EvalStackOverflow => "expression is too complex",
            ExecErr::MaxCallDepthReached => "maximum call depth reached",
        }
    }
}

impl Display for ExecErr {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "exec error {}: {}", self.code(), self.message())
    }
}

/// events are not errors: they interrupt execution and propagate past
/// 'trap' handlers (codes 9000..)
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EventCode {
    Quit = 9001,
    Kill = 9002,
    Abort = 9003,
    StopForDebug = 9004,
    InitiateProgramLoad = 9005,
}

impl Display for EventCode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let text = match self {
            EventCode::Quit => "quit",
            EventCode::Kill => "kill",
            EventCode::Abort => "abort",
            EventCode::StopForDebug => "stop for debug",
            EventCode::InitiateProgramLoad => "initiate program load",
        };
        write!(f, "event {}: {}", *self as u16, text)
    }
}

/// the outcome of executing a statement or a program fragment:
/// either an execution error bound to the token step where it occurred,
/// or an interpreter event.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExecSignal {
    Error { err: ExecErr, step: u16 },
    Event(EventCode),
}

impl ExecSignal {
    pub fn error(err: ExecErr, step: u16) -> Self {
        ExecSignal::Error { err, step }
    }
}

impl Display for ExecSignal {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ExecSignal::Error { err, .. } => write!(f, "{}", err),
            ExecSignal::Event(event) => write!(f, "{}", event),
        }
    }
}

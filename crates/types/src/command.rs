// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// reserved words (commands).
//
// a command is a statement starting with a reserved word. every command
// carries:
//
// - a placement restriction (immediate mode only, inside a function only, ...)
// - up to four parameter slot descriptors, each a bitmask of accepted
//   parameter forms plus 'optional' and 'multiple' flags. at each level-0
//   comma the slot cursor advances, unless the current slot is 'multiple'.
// - block control info: whether the command opens a block (if, for, while,
//   function), continues one (elseif, else), closes one (end), or jumps out
//   of one (break, continue, return).
//
// declaration commands are marked 'skip during exec': their work is done at
// parse time and the interpreter steps over their tokens.

/// command parameter slot descriptor bits
pub const PARAM_EXPR: u8 = 0x01;
pub const PARAM_VAR_OPT_ASSIGN: u8 = 0x02;
pub const PARAM_VAR_NO_ASSIGN: u8 = 0x04;
pub const PARAM_IDENT: u8 = 0x08;
pub const PARAM_EXT_FUNC: u8 = 0x10;
pub const PARAM_OPTIONAL: u8 = 0x40;
pub const PARAM_MULTIPLE: u8 = 0x80;
pub const PARAM_NONE: u8 = 0x00;

pub const PARAM_KIND_MASK: u8 = 0x3F;

/// 'allowed command parameter' keys, four slots each
type ParamSpec = [u8; 4];

const PAR_NONE: ParamSpec = [PARAM_NONE; 4];
const PAR_IDENT: ParamSpec = [PARAM_IDENT, PARAM_NONE, PARAM_NONE, PARAM_NONE];
const PAR_IDENT_LIST: ParamSpec = [PARAM_IDENT | PARAM_MULTIPLE, PARAM_NONE, PARAM_NONE, PARAM_NONE];
const PAR_EXPR: ParamSpec = [PARAM_EXPR, PARAM_NONE, PARAM_NONE, PARAM_NONE];
const PAR_OPT_EXPR: ParamSpec = [PARAM_EXPR | PARAM_OPTIONAL, PARAM_NONE, PARAM_NONE, PARAM_NONE];
const PAR_EXPR_LIST: ParamSpec = [PARAM_EXPR | PARAM_MULTIPLE, PARAM_NONE, PARAM_NONE, PARAM_NONE];
const PAR_TWO_EXPR: ParamSpec = [PARAM_EXPR, PARAM_EXPR, PARAM_NONE, PARAM_NONE];
const PAR_EXPR_PLUS: ParamSpec = [PARAM_EXPR, PARAM_EXPR | PARAM_MULTIPLE, PARAM_NONE, PARAM_NONE];
const PAR_EXT_FUNC: ParamSpec = [PARAM_EXT_FUNC, PARAM_NONE, PARAM_NONE, PARAM_NONE];
const PAR_VAR_DECL: ParamSpec = [
    PARAM_VAR_OPT_ASSIGN,
    PARAM_VAR_OPT_ASSIGN | PARAM_MULTIPLE,
    PARAM_NONE,
    PARAM_NONE,
];
const PAR_FOR: ParamSpec = [
    PARAM_VAR_OPT_ASSIGN,
    PARAM_EXPR,
    PARAM_EXPR | PARAM_OPTIONAL,
    PARAM_NONE,
];
const PAR_INPUT: ParamSpec = [
    PARAM_EXPR,
    PARAM_VAR_NO_ASSIGN,
    PARAM_EXPR | PARAM_OPTIONAL,
    PARAM_NONE,
];
const PAR_INFO: ParamSpec = [
    PARAM_EXPR,
    PARAM_VAR_NO_ASSIGN | PARAM_OPTIONAL,
    PARAM_NONE,
    PARAM_NONE,
];
const PAR_SET_BP: ParamSpec = [
    PARAM_EXPR,
    PARAM_EXPR | PARAM_OPTIONAL,
    PARAM_EXPR | PARAM_OPTIONAL,
    PARAM_NONE,
];
const PAR_CALLBACK: ParamSpec = [
    PARAM_IDENT,
    PARAM_EXPR | PARAM_OPTIONAL,
    PARAM_EXPR | PARAM_OPTIONAL,
    PARAM_EXPR | PARAM_OPTIONAL,
];

/// where a command may appear
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CmdPlace {
    Anywhere,
    ProgramTop,
    InProgram,
    InFunction,
    OutsideFunction,
    Immediate,
    ImmediateOrFunction,
}

/// block related behavior of a command
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BlockCtl {
    None,
    OpenIf,
    MidElseIf,
    MidElse,
    OpenWhile,
    OpenFor,
    OpenFunction,
    GenEnd,
    AlterFlowLoop,
    AlterFlowFunction,
}

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CmdCode {
    Program = 0,
    Function,
    Var,
    Static,
    Local,
    DelVar,
    ClearVars,
    ClearProg,
    Vars,
    For,
    While,
    If,
    ElseIf,
    Else,
    Break,
    Continue,
    Return,
    End,
    Quit,
    Info,
    Input,
    Print,
    DispFmt,
    DispMod,
    Pause,
    Halt,
    Stop,
    Go,
    Step,
    StepOver,
    StepOut,
    StepOutOfBlock,
    StepToBlockEnd,
    Abort,
    SetNextLine,
    SetBp,
    ClearBp,
    EnableBp,
    DisableBp,
    BpOn,
    BpOff,
    ListBp,
    Trace,
    Trap,
    Debug,
    Nop,
    DeclareCb,
    Callback,
}

pub struct CmdDef {
    pub name: &'static str,
    pub code: CmdCode,
    pub place: CmdPlace,
    pub skip_during_exec: bool,
    pub params: &'static ParamSpec,
    pub block: BlockCtl,
}

impl CmdDef {
    const fn new(
        name: &'static str,
        code: CmdCode,
        place: CmdPlace,
        skip_during_exec: bool,
        params: &'static ParamSpec,
        block: BlockCtl,
    ) -> Self {
        Self {
            name,
            code,
            place,
            skip_during_exec,
            params,
            block,
        }
    }
}

pub const RES_WORDS: &[CmdDef] = &[
    //           name              code                      placement                       skip    params          block control

    // programs and functions
    CmdDef::new("program",        CmdCode::Program,        CmdPlace::ProgramTop,          true,  &PAR_IDENT,      BlockCtl::None),
    CmdDef::new("function",       CmdCode::Function,       CmdPlace::InProgram,           true,  &PAR_EXT_FUNC,   BlockCtl::OpenFunction),

    // variable declarations (their work happens while parsing)
    CmdDef::new("var",            CmdCode::Var,            CmdPlace::OutsideFunction,     true,  &PAR_VAR_DECL,   BlockCtl::None),
    CmdDef::new("static",         CmdCode::Static,         CmdPlace::InFunction,          true,  &PAR_VAR_DECL,   BlockCtl::None),
    CmdDef::new("local",          CmdCode::Local,          CmdPlace::InFunction,          true,  &PAR_VAR_DECL,   BlockCtl::None),

    // variable management
    CmdDef::new("delVar",         CmdCode::DelVar,         CmdPlace::Immediate,           false, &PAR_IDENT_LIST, BlockCtl::None),
    CmdDef::new("clearVars",      CmdCode::ClearVars,      CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("clearProg",      CmdCode::ClearProg,      CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("vars",           CmdCode::Vars,           CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),

    // flow control
    CmdDef::new("for",            CmdCode::For,            CmdPlace::ImmediateOrFunction, false, &PAR_FOR,        BlockCtl::OpenFor),
    CmdDef::new("while",          CmdCode::While,          CmdPlace::ImmediateOrFunction, false, &PAR_EXPR,       BlockCtl::OpenWhile),
    CmdDef::new("if",             CmdCode::If,             CmdPlace::ImmediateOrFunction, false, &PAR_EXPR,       BlockCtl::OpenIf),
    CmdDef::new("elseif",         CmdCode::ElseIf,         CmdPlace::ImmediateOrFunction, false, &PAR_EXPR,       BlockCtl::MidElseIf),
    CmdDef::new("else",           CmdCode::Else,           CmdPlace::ImmediateOrFunction, false, &PAR_NONE,       BlockCtl::MidElse),
    CmdDef::new("break",          CmdCode::Break,          CmdPlace::ImmediateOrFunction, false, &PAR_NONE,       BlockCtl::AlterFlowLoop),
    CmdDef::new("continue",       CmdCode::Continue,       CmdPlace::ImmediateOrFunction, false, &PAR_NONE,       BlockCtl::AlterFlowLoop),
    CmdDef::new("return",         CmdCode::Return,         CmdPlace::ImmediateOrFunction, false, &PAR_OPT_EXPR,   BlockCtl::AlterFlowFunction),
    CmdDef::new("end",            CmdCode::End,            CmdPlace::Anywhere,            false, &PAR_NONE,       BlockCtl::GenEnd),
    CmdDef::new("quit",           CmdCode::Quit,           CmdPlace::ImmediateOrFunction, false, &PAR_OPT_EXPR,   BlockCtl::None),

    // input and output
    CmdDef::new("info",           CmdCode::Info,           CmdPlace::ImmediateOrFunction, false, &PAR_INFO,       BlockCtl::None),
    CmdDef::new("input",          CmdCode::Input,          CmdPlace::ImmediateOrFunction, false, &PAR_INPUT,      BlockCtl::None),
    CmdDef::new("print",          CmdCode::Print,          CmdPlace::ImmediateOrFunction, false, &PAR_EXPR_LIST,  BlockCtl::None),
    CmdDef::new("dispFmt",        CmdCode::DispFmt,        CmdPlace::ImmediateOrFunction, false, &PAR_EXPR_PLUS,  BlockCtl::None),
    CmdDef::new("dispMod",        CmdCode::DispMod,        CmdPlace::ImmediateOrFunction, false, &PAR_TWO_EXPR,   BlockCtl::None),
    CmdDef::new("pause",          CmdCode::Pause,          CmdPlace::InFunction,          false, &PAR_EXPR,       BlockCtl::None),
    CmdDef::new("halt",           CmdCode::Halt,           CmdPlace::InFunction,          false, &PAR_NONE,       BlockCtl::None),

    // debugging
    CmdDef::new("stop",           CmdCode::Stop,           CmdPlace::InFunction,          false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("go",             CmdCode::Go,             CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("step",           CmdCode::Step,           CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("stepOver",       CmdCode::StepOver,       CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("stepOut",        CmdCode::StepOut,        CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("stepOutOfBlock", CmdCode::StepOutOfBlock, CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("stepToBlockEnd", CmdCode::StepToBlockEnd, CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("abort",          CmdCode::Abort,          CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("setNextLine",    CmdCode::SetNextLine,    CmdPlace::Immediate,           false, &PAR_EXPR,       BlockCtl::None),
    CmdDef::new("setBP",          CmdCode::SetBp,          CmdPlace::Immediate,           false, &PAR_SET_BP,     BlockCtl::None),
    CmdDef::new("clearBP",        CmdCode::ClearBp,        CmdPlace::Immediate,           false, &PAR_EXPR_LIST,  BlockCtl::None),
    CmdDef::new("enableBP",       CmdCode::EnableBp,       CmdPlace::Immediate,           false, &PAR_EXPR_LIST,  BlockCtl::None),
    CmdDef::new("disableBP",      CmdCode::DisableBp,      CmdPlace::Immediate,           false, &PAR_EXPR_LIST,  BlockCtl::None),
    CmdDef::new("BPon",           CmdCode::BpOn,           CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("BPoff",          CmdCode::BpOff,          CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("listBP",         CmdCode::ListBp,         CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("trace",          CmdCode::Trace,          CmdPlace::Immediate,           false, &PAR_OPT_EXPR,   BlockCtl::None),
    CmdDef::new("trap",           CmdCode::Trap,           CmdPlace::InFunction,          false, &PAR_EXPR,       BlockCtl::None),
    CmdDef::new("debug",          CmdCode::Debug,          CmdPlace::Immediate,           false, &PAR_NONE,       BlockCtl::None),
    CmdDef::new("nop",            CmdCode::Nop,            CmdPlace::ImmediateOrFunction, true,  &PAR_NONE,       BlockCtl::None),

    // host callbacks ('declareCB' only records aliases, so it parses anywhere
    // outside functions and is skipped at execution)
    CmdDef::new("declareCB",      CmdCode::DeclareCb,      CmdPlace::OutsideFunction,     true,  &PAR_IDENT_LIST, BlockCtl::None),
    CmdDef::new("callback",       CmdCode::Callback,       CmdPlace::ImmediateOrFunction, false, &PAR_CALLBACK,   BlockCtl::None),
];

/// find a command definition by name (names are case sensitive)
pub fn find_res_word(name: &str) -> Option<(usize, &'static CmdDef)> {
    RES_WORDS
        .iter()
        .enumerate()
        .find(|(_, def)| def.name == name)
}

/// find a command definition by code
pub fn cmd_def(code: CmdCode) -> &'static CmdDef {
    RES_WORDS
        .iter()
        .find(|def| def.code == code)
        .expect("command code is in the table")
}

impl CmdCode {
    pub fn from_bits(bits: u16) -> Option<CmdCode> {
        RES_WORDS
            .iter()
            .map(|def| def.code)
            .find(|code| *code as u16 == bits)
    }

    /// block start commands push a parse level and carry a forward link
    pub fn opens_block(&self) -> bool {
        matches!(
            cmd_def(*self).block,
            BlockCtl::OpenIf | BlockCtl::OpenWhile | BlockCtl::OpenFor | BlockCtl::OpenFunction
        )
    }

    /// commands that carry a forward link token field
    pub fn has_link(&self) -> bool {
        !matches!(cmd_def(*self).block, BlockCtl::None)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_res_word_lookup() {
        let (_, def) = find_res_word("for").unwrap();
        assert_eq!(def.code, CmdCode::For);
        assert_eq!(def.block, BlockCtl::OpenFor);
        assert!(find_res_word("For").is_none());
        assert!(find_res_word("forx").is_none());
    }

    #[test]
    fn test_code_roundtrip() {
        for def in RES_WORDS {
            assert_eq!(CmdCode::from_bits(def.code as u16), Some(def.code));
        }
    }

    #[test]
    fn test_block_commands_carry_links() {
        assert!(CmdCode::If.has_link());
        assert!(CmdCode::End.has_link());
        assert!(CmdCode::Break.has_link());
        assert!(!CmdCode::Print.has_link());
        assert!(CmdCode::While.opens_block());
        assert!(!CmdCode::End.opens_block());
    }
}

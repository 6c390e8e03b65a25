// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// terminal tokens: separators and operators.
//
// each terminal carries three priorities, for use as a prefix, infix or
// postfix operator respectively. priority 0 means the terminal is not
// available in that role. the priority byte also carries the operator flags:
//
// - OP_LONG:  operands must be integer, an integer is returned ('&', '<<')
// - RES_LONG: operands may be integer or float, an integer is returned
//             (comparisons, 'and', 'or', 'not')
// - OP_RTOL:  right-to-left associativity for infix use (assignments, '^')
//
// prefix operators are always right-to-left, postfix always left-to-right.
//
// '^' is the power operator (right associative, so 2 ^ 3 ^ 2 is 512 and
// -2 ^ 2 is -4); bitwise XOR is spelled '^^'. the logical operators are the
// words 'and', 'or' and 'not', matched with an identifier boundary check.

/// flat terminal codes. the token header stores group (code / 16) and
/// index within the group (code % 16).
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TermCode {
    Comma = 0,
    Semicolon,
    LeftPar,
    RightPar,
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Plus,
    Minus,
    Mult,
    Div = 16,
    Mod,
    Pow,
    Incr,
    Decr,
    BitAnd,
    BitOr,
    BitXor,
    BitCompl,
    And,
    Or,
    Not,
    PlusAssign,
    MinusAssign,
    MultAssign,
    DivAssign,
    ModAssign = 32,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    ShlAssign,
    ShrAssign,
    To,
    StepSep,
}

pub const TERMINAL_GROUP_SIZE: u8 = 16;

/// operand types must be integer, result is integer
pub const OP_LONG: u8 = 0x20;
/// operands integer or float, result is integer
pub const RES_LONG: u8 = 0x40;
/// right-to-left associativity (infix)
pub const OP_RTOL: u8 = 0x80;
pub const PRIO_MASK: u8 = 0x1F;

/// pseudo priority of '(' when it follows a function name or array name,
/// higher than any operator priority
pub const LEFT_PAR_PRIO: u8 = 0x10;

pub struct TerminalDef {
    pub name: &'static str,
    pub code: TermCode,
    pub prefix_prio: u8,
    pub infix_prio: u8,
    pub postfix_prio: u8,
}

impl TerminalDef {
    const fn new(
        name: &'static str,
        code: TermCode,
        prefix_prio: u8,
        infix_prio: u8,
        postfix_prio: u8,
    ) -> Self {
        Self {
            name,
            code,
            prefix_prio,
            infix_prio,
            postfix_prio,
        }
    }
}

pub const TERMINALS: &[TerminalDef] = &[
    //                 name    code                  prefix prio       infix prio                  postfix prio
    // non-operator terminals
    TerminalDef::new(",",     TermCode::Comma,        0x00,            0x00,                       0x00),
    TerminalDef::new(";",     TermCode::Semicolon,    0x00,            0x00,                       0x00),
    TerminalDef::new("(",     TermCode::LeftPar,      0x00,            LEFT_PAR_PRIO,              0x00),
    TerminalDef::new(")",     TermCode::RightPar,     0x00,            0x00,                       0x00),

    // assignment operators
    TerminalDef::new("=",     TermCode::Assign,       0x00,            0x01 | OP_RTOL,             0x00),
    TerminalDef::new("+=",    TermCode::PlusAssign,   0x00,            0x01 | OP_RTOL,             0x00),
    TerminalDef::new("-=",    TermCode::MinusAssign,  0x00,            0x01 | OP_RTOL,             0x00),
    TerminalDef::new("*=",    TermCode::MultAssign,   0x00,            0x01 | OP_RTOL,             0x00),
    TerminalDef::new("/=",    TermCode::DivAssign,    0x00,            0x01 | OP_RTOL,             0x00),
    TerminalDef::new("%=",    TermCode::ModAssign,    0x00,            0x01 | OP_RTOL | OP_LONG,   0x00),
    TerminalDef::new("&=",    TermCode::BitAndAssign, 0x00,            0x01 | OP_RTOL | OP_LONG,   0x00),
    TerminalDef::new("|=",    TermCode::BitOrAssign,  0x00,            0x01 | OP_RTOL | OP_LONG,   0x00),
    TerminalDef::new("^^=",   TermCode::BitXorAssign, 0x00,            0x01 | OP_RTOL | OP_LONG,   0x00),
    TerminalDef::new("<<=",   TermCode::ShlAssign,    0x00,            0x01 | OP_RTOL | OP_LONG,   0x00),
    TerminalDef::new(">>=",   TermCode::ShrAssign,    0x00,            0x01 | OP_RTOL | OP_LONG,   0x00),

    // logical and bitwise operators
    TerminalDef::new("or",    TermCode::Or,           0x00,            0x02 | RES_LONG,            0x00),
    TerminalDef::new("and",   TermCode::And,          0x00,            0x03 | RES_LONG,            0x00),
    TerminalDef::new("not",   TermCode::Not,          0x0C | RES_LONG, 0x00,                       0x00),
    TerminalDef::new("|",     TermCode::BitOr,        0x00,            0x04 | OP_LONG,             0x00),
    TerminalDef::new("^^",    TermCode::BitXor,       0x00,            0x05 | OP_LONG,             0x00),
    TerminalDef::new("&",     TermCode::BitAnd,       0x00,            0x06 | OP_LONG,             0x00),
    TerminalDef::new("~",     TermCode::BitCompl,     0x0C | OP_LONG,  0x00,                       0x00),

    // comparison operators
    TerminalDef::new("==",    TermCode::Eq,           0x00,            0x07 | RES_LONG,            0x00),
    TerminalDef::new("!=",    TermCode::Ne,           0x00,            0x07 | RES_LONG,            0x00),
    TerminalDef::new("<",     TermCode::Lt,           0x00,            0x08 | RES_LONG,            0x00),
    TerminalDef::new(">",     TermCode::Gt,           0x00,            0x08 | RES_LONG,            0x00),
    TerminalDef::new("<=",    TermCode::Le,           0x00,            0x08 | RES_LONG,            0x00),
    TerminalDef::new(">=",    TermCode::Ge,           0x00,            0x08 | RES_LONG,            0x00),

    // shift operators
    TerminalDef::new("<<",    TermCode::Shl,          0x00,            0x09 | OP_LONG,             0x00),
    TerminalDef::new(">>",    TermCode::Shr,          0x00,            0x09 | OP_LONG,             0x00),

    // arithmetic operators ('+' concatenates strings)
    TerminalDef::new("+",     TermCode::Plus,         0x0C,            0x0A,                       0x00),
    TerminalDef::new("-",     TermCode::Minus,        0x0C,            0x0A,                       0x00),
    TerminalDef::new("*",     TermCode::Mult,         0x00,            0x0B,                       0x00),
    TerminalDef::new("/",     TermCode::Div,          0x00,            0x0B,                       0x00),
    TerminalDef::new("%",     TermCode::Mod,          0x00,            0x0B | OP_LONG,             0x00),
    TerminalDef::new("^",     TermCode::Pow,          0x00,            0x0D | OP_RTOL,             0x00),

    // increment and decrement
    TerminalDef::new("++",    TermCode::Incr,         0x0E,            0x00,                       0x0F),
    TerminalDef::new("--",    TermCode::Decr,         0x0E,            0x00,                       0x0F),

    // 'for' loop argument separators ('for i = 1 to 10 step 2')
    TerminalDef::new("to",    TermCode::To,           0x00,            0x00,                       0x00),
    TerminalDef::new("step",  TermCode::StepSep,      0x00,            0x00,                       0x00),
];

/// find a terminal definition by its flat code
pub fn terminal_def(code: TermCode) -> &'static TerminalDef {
    TERMINALS
        .iter()
        .find(|def| def.code == code)
        .expect("terminal code is in the table")
}

pub fn term_code_from_flat(flat: u8) -> Option<TermCode> {
    TERMINALS
        .iter()
        .map(|def| def.code)
        .find(|code| *code as u8 == flat)
}

impl TermCode {
    pub fn is_operator(&self) -> bool {
        let def = terminal_def(*self);
        (def.prefix_prio | def.infix_prio | def.postfix_prio) & PRIO_MASK != 0
            && !matches!(self, TermCode::LeftPar)
    }

    /// pure or compound assignment
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TermCode::Assign
                | TermCode::PlusAssign
                | TermCode::MinusAssign
                | TermCode::MultAssign
                | TermCode::DivAssign
                | TermCode::ModAssign
                | TermCode::BitAndAssign
                | TermCode::BitOrAssign
                | TermCode::BitXorAssign
                | TermCode::ShlAssign
                | TermCode::ShrAssign
        )
    }

    /// the underlying operator of a compound assignment
    pub fn compound_base(&self) -> Option<TermCode> {
        match self {
            TermCode::PlusAssign => Some(TermCode::Plus),
            TermCode::MinusAssign => Some(TermCode::Minus),
            TermCode::MultAssign => Some(TermCode::Mult),
            TermCode::DivAssign => Some(TermCode::Div),
            TermCode::ModAssign => Some(TermCode::Mod),
            TermCode::BitAndAssign => Some(TermCode::BitAnd),
            TermCode::BitOrAssign => Some(TermCode::BitOr),
            TermCode::BitXorAssign => Some(TermCode::BitXor),
            TermCode::ShlAssign => Some(TermCode::Shl),
            TermCode::ShrAssign => Some(TermCode::Shr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_terminal_lookup_by_flat_code() {
        assert_eq!(term_code_from_flat(TermCode::Pow as u8), Some(TermCode::Pow));
        assert_eq!(term_code_from_flat(200), None);
    }

    #[test]
    fn test_operator_priorities() {
        // power binds tighter than multiplication, and is right associative
        let pow = terminal_def(TermCode::Pow);
        let mult = terminal_def(TermCode::Mult);
        assert!(pow.infix_prio & PRIO_MASK > mult.infix_prio & PRIO_MASK);
        assert!(pow.infix_prio & OP_RTOL != 0);

        // all assignments share the lowest operator priority
        for code in [TermCode::Assign, TermCode::PlusAssign, TermCode::ShrAssign] {
            let def = terminal_def(code);
            assert_eq!(def.infix_prio & PRIO_MASK, 0x01);
            assert!(def.infix_prio & OP_RTOL != 0);
        }
    }

    #[test]
    fn test_terminal_groups_fit_in_header_nibble() {
        for def in TERMINALS {
            assert!((def.code as u8 % TERMINAL_GROUP_SIZE) < 16);
            assert!((def.code as u8 / TERMINAL_GROUP_SIZE) < 3);
        }
    }
}

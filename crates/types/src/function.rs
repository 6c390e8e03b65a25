// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// internal (intrinsic) functions.
//
// the 8 array pattern bits indicate which arguments must be arrays: bit b0
// to bit b7 refer to argument 1 to 8, a set bit means an array is expected.
// functions have no more than 8 parameters.

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FuncCode {
    Ifte = 0,
    Sin,
    Cos,
    Tan,
    Sqrt,
    Min,
    Max,
    Abs,
    Round,
    Ceil,
    Floor,
    Trunc,
    Exp,
    Log,
    Millis,
    Micros,
    Random,
    Ubound,
    Dims,
    ValType,
    Last,
    Asc,
    Char,
    Len,
    Nl,
    Fmt,
    Err,
    SysVar,
    CInt,
    CFloat,
    CStr,
    DigitalRead,
    DigitalWrite,
    PinMode,
    AnalogRead,
    AnalogWrite,
}

pub struct FuncDef {
    pub name: &'static str,
    pub code: FuncCode,
    pub min_args: u8,
    pub max_args: u8,
    pub array_pattern: u8,
}

impl FuncDef {
    const fn new(
        name: &'static str,
        code: FuncCode,
        min_args: u8,
        max_args: u8,
        array_pattern: u8,
    ) -> Self {
        Self {
            name,
            code,
            min_args,
            max_args,
            array_pattern,
        }
    }
}

pub const FUNCTIONS: &[FuncDef] = &[
    //           name           code                    #args   array pattern
    FuncDef::new("ifte",        FuncCode::Ifte,         3, 3,   0b0),
    FuncDef::new("sin",         FuncCode::Sin,          1, 1,   0b0),
    FuncDef::new("cos",         FuncCode::Cos,          1, 1,   0b0),
    FuncDef::new("tan",         FuncCode::Tan,          1, 1,   0b0),
    FuncDef::new("sqrt",        FuncCode::Sqrt,         1, 1,   0b0),
    FuncDef::new("min",         FuncCode::Min,          2, 2,   0b0),
    FuncDef::new("max",         FuncCode::Max,          2, 2,   0b0),
    FuncDef::new("abs",         FuncCode::Abs,          1, 1,   0b0),
    FuncDef::new("round",       FuncCode::Round,        1, 1,   0b0),
    FuncDef::new("ceil",        FuncCode::Ceil,         1, 1,   0b0),
    FuncDef::new("floor",       FuncCode::Floor,        1, 1,   0b0),
    FuncDef::new("trunc",       FuncCode::Trunc,        1, 1,   0b0),
    FuncDef::new("exp",         FuncCode::Exp,          1, 1,   0b0),
    FuncDef::new("log",         FuncCode::Log,          1, 1,   0b0),
    FuncDef::new("millis",      FuncCode::Millis,       0, 0,   0b0),
    FuncDef::new("micros",      FuncCode::Micros,       0, 0,   0b0),
    FuncDef::new("random",      FuncCode::Random,       0, 2,   0b0),
    FuncDef::new("ubound",      FuncCode::Ubound,       2, 2,   0b00000001), // first argument is an array
    FuncDef::new("dims",        FuncCode::Dims,         1, 1,   0b00000001),
    FuncDef::new("valType",     FuncCode::ValType,      1, 1,   0b0),
    FuncDef::new("last",        FuncCode::Last,         0, 1,   0b0),
    FuncDef::new("asc",         FuncCode::Asc,          1, 2,   0b0),
    FuncDef::new("char",        FuncCode::Char,         1, 1,   0b0),
    FuncDef::new("len",         FuncCode::Len,          1, 1,   0b0),
    FuncDef::new("nl",          FuncCode::Nl,           0, 0,   0b0),
    FuncDef::new("fmt",         FuncCode::Fmt,          1, 6,   0b0),
    FuncDef::new("err",         FuncCode::Err,          0, 0,   0b0),
    FuncDef::new("sysVar",      FuncCode::SysVar,       1, 1,   0b0),
    FuncDef::new("cInt",        FuncCode::CInt,         1, 1,   0b0),
    FuncDef::new("cFloat",      FuncCode::CFloat,       1, 1,   0b0),
    FuncDef::new("cStr",        FuncCode::CStr,         1, 1,   0b0),
    FuncDef::new("digitalRead", FuncCode::DigitalRead,  1, 1,   0b0),
    FuncDef::new("digitalWrite", FuncCode::DigitalWrite, 2, 2,  0b0),
    FuncDef::new("pinMode",     FuncCode::PinMode,      2, 2,   0b0),
    FuncDef::new("analogRead",  FuncCode::AnalogRead,   1, 1,   0b0),
    FuncDef::new("analogWrite", FuncCode::AnalogWrite,  2, 2,   0b0),
];

/// find an internal function definition by name (case sensitive)
pub fn find_function(name: &str) -> Option<(usize, &'static FuncDef)> {
    FUNCTIONS
        .iter()
        .enumerate()
        .find(|(_, def)| def.name == name)
}

/// find an internal function definition by code
pub fn func_def(code: FuncCode) -> &'static FuncDef {
    FUNCTIONS
        .iter()
        .find(|def| def.code == code)
        .expect("function code is in the table")
}

impl FuncCode {
    pub fn from_bits(bits: u16) -> Option<FuncCode> {
        FUNCTIONS
            .iter()
            .map(|def| def.code)
            .find(|code| *code as u16 == bits)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_function_lookup() {
        let (_, def) = find_function("ubound").unwrap();
        assert_eq!(def.code, FuncCode::Ubound);
        assert_eq!((def.min_args, def.max_args), (2, 2));
        assert_eq!(def.array_pattern, 0b1);
        assert!(find_function("Ubound").is_none());
    }

    #[test]
    fn test_max_args_within_pattern_bits() {
        for def in FUNCTIONS {
            assert!(def.min_args <= def.max_args);
            assert!(def.max_args as usize <= 8);
        }
    }
}

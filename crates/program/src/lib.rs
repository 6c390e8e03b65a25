// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the machine state: everything the parser writes and the interpreter reads.
//
// one 'Machine' per interpreter instance. it owns the program buffer, the
// identifier tables, the variable stores of all five scopes, the external
// function attribute table, the parsed string constant and generic name
// side tables, the last-results FIFO and the heap object counters.
//
// the parser and the interpreter are functions over '&mut Machine', the
// machine itself never walks the token stream on its own (except for the
// forward scan that deletes the string constants owned by a token range).

pub mod counters;
pub mod functions;
pub mod idents;
pub mod machine;
pub mod value;

pub use counters::{ObjectClass, ObjectCounters};
pub use functions::{FunctionAttrs, LocalDecl, ParamDecl};
pub use idents::NameTable;
pub use machine::Machine;
pub use value::{ArrayBlock, ArrayElems, ConstValue, Num, Value, Variable};

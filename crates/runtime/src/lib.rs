// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the Justina execution engine: evaluation stack, operator engine, flow
// control, internal functions, debugger and the interactive session.

pub mod commands;
pub mod debugger;
pub mod eval;
pub mod exec;
pub mod fmt;
pub mod funcs;
pub mod host;
pub mod session;

pub use debugger::{Breakpoint, DebugMode, DebugState};
pub use exec::Engine;
pub use fmt::DisplayFmt;
pub use host::{CallbackValue, FileHandle, Host, HostFlags, HostFs, MemoryHost, NoFs};
pub use session::{Outcome, Session};

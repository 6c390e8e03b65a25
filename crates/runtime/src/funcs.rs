// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// internal (intrinsic) function dispatch.
//
// argument counts and array-ness are checked at parse time against the
// static table, so the handlers only validate value types and ranges.

use justina_program::{ConstValue, Machine, Num, Value};
use justina_tokens::program_buffer::Area;
use justina_tokens::Step;
use justina_types::error::{ExecErr, ExecSignal};
use justina_types::function::FuncCode;
use justina_types::{ValueKind, MAX_ARRAY_DIMS};

use crate::eval::{make_result, take_value, EvalSlot, RtVal, VarRef};
use crate::exec::Engine;
use crate::fmt::DisplayFmt;
use crate::host::Host;

fn num_of(value: Option<RtVal>, step: Step) -> Result<Num, ExecSignal> {
    value
        .and_then(|value| value.as_num())
        .ok_or(ExecSignal::error(ExecErr::NumberExpected, step.0))
}

fn long_of(value: Option<RtVal>, step: Step) -> Result<i32, ExecSignal> {
    match num_of(value, step)? {
        Num::Long(v) => Ok(v),
        Num::Float(_) => Err(ExecSignal::error(ExecErr::NumberExpected, step.0)),
    }
}

impl Engine {
    pub(crate) fn intern_function(
        &mut self,
        machine: &mut Machine,
        host: &mut dyn Host,
        func: FuncCode,
        args: Vec<EvalSlot>,
        step: Step,
    ) -> Result<EvalSlot, ExecSignal> {
        let err = |code: ExecErr| -> ExecSignal { ExecSignal::error(code, step.0) };

        // the array functions look at the reference, everything else
        // takes plain values
        match func {
            FuncCode::Ubound => {
                let mut iter = args.into_iter();
                let (dims, dim_count) = array_arg(machine, iter.next().unwrap(), step)?;
                let dim = long_of(
                    Some(take_value(machine, iter.next().unwrap(), step)?),
                    step,
                )?;
                if dim < 1 || dim > dim_count as i32 {
                    return Err(err(ExecErr::ArgOutsideRange));
                }
                return Ok(EvalSlot::value(RtVal::Long(dims[dim as usize - 1] as i32)));
            }
            FuncCode::Dims => {
                let (_, dim_count) = array_arg(machine, args.into_iter().next().unwrap(), step)?;
                return Ok(EvalSlot::value(RtVal::Long(dim_count as i32)));
            }
            _ => {}
        }

        let mut collected: Vec<RtVal> = Vec::with_capacity(args.len());
        for slot in args {
            collected.push(take_value(machine, slot, step)?);
        }
        let mut values = collected.into_iter();

        let result = match func {
            FuncCode::Ifte => {
                let cond = num_of(values.next(), step)?;
                let if_true = values.next().unwrap();
                let if_false = values.next().unwrap();
                let chosen = if cond.is_true() { if_true } else { if_false };
                return Ok(make_result(machine, chosen));
            }

            FuncCode::Sin => RtVal::Float(num_of(values.next(), step)?.as_f32().sin()),
            FuncCode::Cos => RtVal::Float(num_of(values.next(), step)?.as_f32().cos()),
            FuncCode::Tan => RtVal::Float(num_of(values.next(), step)?.as_f32().tan()),
            FuncCode::Sqrt => RtVal::Float(num_of(values.next(), step)?.as_f32().sqrt()),
            FuncCode::Exp => RtVal::Float(num_of(values.next(), step)?.as_f32().exp()),
            FuncCode::Log => RtVal::Float(num_of(values.next(), step)?.as_f32().ln()),

            FuncCode::Min | FuncCode::Max => {
                let a = num_of(values.next(), step)?;
                let b = num_of(values.next(), step)?;
                let pick_first = match func {
                    FuncCode::Min => a.as_f32() <= b.as_f32(),
                    _ => a.as_f32() >= b.as_f32(),
                };
                match if pick_first { a } else { b } {
                    Num::Long(v) => RtVal::Long(v),
                    Num::Float(v) => RtVal::Float(v),
                }
            }
            FuncCode::Abs => match num_of(values.next(), step)? {
                Num::Long(v) => RtVal::Long(v.wrapping_abs()),
                Num::Float(v) => RtVal::Float(v.abs()),
            },
            FuncCode::Round => RtVal::Long(num_of(values.next(), step)?.as_f32().round() as i32),
            FuncCode::Ceil => RtVal::Long(num_of(values.next(), step)?.as_f32().ceil() as i32),
            FuncCode::Floor => RtVal::Long(num_of(values.next(), step)?.as_f32().floor() as i32),
            FuncCode::Trunc => RtVal::Long(num_of(values.next(), step)?.as_f32().trunc() as i32),

            FuncCode::Millis => RtVal::Long(host.millis() as i32),
            FuncCode::Micros => RtVal::Long(host.micros() as i32),
            FuncCode::Random => {
                let first = values.next();
                let second = values.next();
                let (low, high) = match (first, second) {
                    (None, _) => (0, i32::MAX),
                    (Some(high), None) => (0, long_of(Some(high), step)?),
                    (Some(low), Some(high)) => {
                        (long_of(Some(low), step)?, long_of(Some(high), step)?)
                    }
                };
                RtVal::Long(host.random(low, high))
            }

            FuncCode::ValType => {
                let value = values.next().unwrap();
                RtVal::Long(match value.kind() {
                    ValueKind::Long => 1,
                    ValueKind::Float => 2,
                    ValueKind::Str => 3,
                })
            }

            FuncCode::Last => {
                let n = match values.next() {
                    None => 1,
                    Some(value) => long_of(Some(value), step)?,
                };
                if n < 1 {
                    return Err(err(ExecErr::ArgOutsideRange));
                }
                let Some(result) = machine.last_result(n as usize).cloned() else {
                    return Err(err(ExecErr::ArgOutsideRange));
                };
                let value = match result {
                    ConstValue::Long(v) => RtVal::Long(v),
                    ConstValue::Float(v) => RtVal::Float(v),
                    ConstValue::Str(s) => RtVal::from_str_value(&s),
                };
                return Ok(make_result(machine, value));
            }

            FuncCode::Asc => {
                let value = values.next().unwrap();
                if !matches!(value, RtVal::Str(_)) {
                    return Err(err(ExecErr::StringExpected));
                }
                let pos = match values.next() {
                    None => 1,
                    Some(position) => long_of(Some(position), step)?,
                };
                let text = value.str_text();
                if pos < 1 || pos as usize > text.len() {
                    return Err(err(ExecErr::ArgOutsideRange));
                }
                RtVal::Long(text.as_bytes()[pos as usize - 1] as i32)
            }
            FuncCode::Char => {
                let code = long_of(values.next(), step)?;
                if !(1..=255).contains(&code) {
                    return Err(err(ExecErr::ArgOutsideRange));
                }
                let text = ((code as u8) as char).to_string();
                return Ok(make_result(machine, RtVal::from_str_value(&text)));
            }
            FuncCode::Len => {
                let value = values.next().unwrap();
                if !matches!(value, RtVal::Str(_)) {
                    return Err(err(ExecErr::StringExpected));
                }
                RtVal::Long(value.str_text().len() as i32)
            }
            FuncCode::Nl => {
                return Ok(make_result(machine, RtVal::from_str_value("\n")));
            }

            FuncCode::Fmt => {
                let value = values.next().unwrap();
                let mut fmt = DisplayFmt {
                    width: self.fmt.width,
                    precision: self.fmt.precision,
                    spec: self.fmt.spec,
                };
                if let Some(width) = values.next() {
                    let width = long_of(Some(width), step)?;
                    if !(0..=100).contains(&width) {
                        return Err(err(ExecErr::ArgOutsideRange));
                    }
                    fmt.width = width as usize;
                }
                if let Some(precision) = values.next() {
                    let precision = long_of(Some(precision), step)?;
                    if !(0..=20).contains(&precision) {
                        return Err(err(ExecErr::ArgOutsideRange));
                    }
                    fmt.precision = precision as usize;
                    fmt.spec = b'f';
                }
                if let Some(spec) = values.next() {
                    match spec {
                        RtVal::Str(Some(text)) if !text.is_empty() => {
                            fmt.spec = text.as_bytes()[0]
                        }
                        _ => return Err(err(ExecErr::StringExpected)),
                    }
                }
                let text = fmt.format_value(&value);
                return Ok(make_result(machine, RtVal::from_str_value(&text)));
            }

            FuncCode::Err => RtVal::Long(self.active.err_value),

            FuncCode::SysVar => match long_of(values.next(), step)? {
                1 => {
                    let value = RtVal::from_str_value(env!("CARGO_PKG_VERSION"));
                    return Ok(make_result(machine, value));
                }
                2 => {
                    let name = machine.program_name.clone().unwrap_or_default();
                    return Ok(make_result(machine, RtVal::from_str_value(&name)));
                }
                3 => RtVal::Long(machine.buffer.free_bytes(Area::Program) as i32),
                _ => return Err(err(ExecErr::ArgOutsideRange)),
            },

            FuncCode::CInt => {
                let value = values.next().unwrap();
                match &value {
                    RtVal::Long(v) => RtVal::Long(*v),
                    RtVal::Float(v) => RtVal::Long(*v as i32),
                    RtVal::Str(_) => match value.str_text().trim().parse::<i32>() {
                        Ok(v) => RtVal::Long(v),
                        Err(_) => return Err(err(ExecErr::ArgInvalid)),
                    },
                }
            }
            FuncCode::CFloat => {
                let value = values.next().unwrap();
                match &value {
                    RtVal::Long(v) => RtVal::Float(*v as f32),
                    RtVal::Float(v) => RtVal::Float(*v),
                    RtVal::Str(_) => match value.str_text().trim().parse::<f32>() {
                        Ok(v) => RtVal::Float(v),
                        Err(_) => return Err(err(ExecErr::ArgInvalid)),
                    },
                }
            }
            FuncCode::CStr => {
                let value = values.next().unwrap();
                let text = self.fmt.format_value(&value);
                return Ok(make_result(machine, RtVal::from_str_value(&text)));
            }

            FuncCode::PinMode => {
                let pin = num_of(values.next(), step)?.as_f32() as i32;
                let mode = num_of(values.next(), step)?.as_f32() as i32;
                host.pin_mode(pin, mode);
                RtVal::Long(0)
            }
            FuncCode::DigitalRead => {
                let pin = num_of(values.next(), step)?.as_f32() as i32;
                RtVal::Long(host.digital_read(pin))
            }
            FuncCode::DigitalWrite => {
                let pin = num_of(values.next(), step)?.as_f32() as i32;
                let value = num_of(values.next(), step)?.as_f32() as i32;
                host.digital_write(pin, value);
                RtVal::Long(0)
            }
            FuncCode::AnalogRead => {
                let pin = num_of(values.next(), step)?.as_f32() as i32;
                RtVal::Long(host.analog_read(pin))
            }
            FuncCode::AnalogWrite => {
                let pin = num_of(values.next(), step)?.as_f32() as i32;
                let value = num_of(values.next(), step)?.as_f32() as i32;
                host.analog_write(pin, value);
                RtVal::Long(0)
            }

            FuncCode::Ubound | FuncCode::Dims => unreachable!("handled above"),
        };

        Ok(EvalSlot::value(result))
    }
}

/// dimensions of a whole-array argument
fn array_arg(
    machine: &Machine,
    slot: EvalSlot,
    step: Step,
) -> Result<([u8; MAX_ARRAY_DIMS], u8), ExecSignal> {
    let EvalSlot::Ref(VarRef {
        scope,
        value_index,
        local_base,
        elem: None,
    }) = slot
    else {
        return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
    };
    let variable = machine
        .variable(scope, value_index, local_base)
        .ok_or(ExecSignal::error(ExecErr::VariableExpected, step.0))?;
    let Value::Array(block) = &variable.value else {
        return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
    };
    Ok((block.dims, block.dim_count))
}

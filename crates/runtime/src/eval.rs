// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the evaluation stack and the operator engine.
//
// a stack level holds either a value or a variable reference. variables
// push a reference (so assignment and write-back work), constants push the
// value. operator application consumes levels and pushes the result.
//
// string temporaries created by operators are 'intermediate' and counted;
// consuming a level releases its intermediate string unless the string
// moved on (into a variable, a result, the FIFO).
//
// coercion rules:
// - OP_LONG operators demand two integers
// - RES_LONG operators accept numbers and return an integer 0/1
// - mixed integer/float arithmetic promotes to float
// - '+' concatenates strings, comparisons on strings are case-sensitive
//   lexicographic; a string never mixes with a number

use justina_program::{machine::str_class, ArrayElems, Machine, Num, Value};
use justina_tokens::Step;
use justina_types::error::{ExecErr, ExecSignal};
use justina_types::function::FuncCode;
use justina_types::terminal::{terminal_def, TermCode, OP_LONG, PRIO_MASK, RES_LONG};
use justina_types::{Scope, ValueKind};

/// a runtime scalar value. the empty string is always Str(None).
#[derive(Debug, PartialEq, Clone)]
pub enum RtVal {
    Long(i32),
    Float(f32),
    Str(Option<Box<str>>),
}

impl RtVal {
    pub fn kind(&self) -> ValueKind {
        match self {
            RtVal::Long(_) => ValueKind::Long,
            RtVal::Float(_) => ValueKind::Float,
            RtVal::Str(_) => ValueKind::Str,
        }
    }

    pub fn from_str_value(s: &str) -> RtVal {
        if s.is_empty() {
            RtVal::Str(None)
        } else {
            RtVal::Str(Some(s.into()))
        }
    }

    pub fn str_text(&self) -> &str {
        match self {
            RtVal::Str(Some(s)) => s,
            _ => "",
        }
    }

    pub fn as_num(&self) -> Option<Num> {
        match self {
            RtVal::Long(v) => Some(Num::Long(*v)),
            RtVal::Float(v) => Some(Num::Float(*v)),
            RtVal::Str(_) => None,
        }
    }
}

/// a reference to a variable slot, or to one array element of it
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct VarRef {
    pub scope: Scope,
    pub value_index: u8,
    pub local_base: usize,
    pub elem: Option<usize>,
}

/// one level of the evaluation stack
#[derive(Debug, PartialEq, Clone)]
pub enum EvalSlot {
    Val { value: RtVal, intermediate: bool },
    Ref(VarRef),
}

impl EvalSlot {
    pub fn value(value: RtVal) -> EvalSlot {
        EvalSlot::Val {
            value,
            intermediate: false,
        }
    }

    pub fn intermediate(value: RtVal) -> EvalSlot {
        let intermediate = matches!(value, RtVal::Str(Some(_)));
        EvalSlot::Val {
            value,
            intermediate,
        }
    }
}

/// pending operators and parenthesis markers of the current expression
#[derive(Debug, PartialEq, Clone)]
pub enum OpEntry {
    Infix(TermCode),
    Prefix(TermCode),
    Marker(Marker),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Marker {
    SubExpr,
    InternCall { func: FuncCode, args_base: usize },
    ExternCall { func_index: u16, args_base: usize },
    Subscript { var: VarRef, args_base: usize },
}

// ---- reference access ----

pub fn read_ref(machine: &Machine, var: &VarRef, step: Step) -> Result<RtVal, ExecSignal> {
    let variable = machine
        .variable(var.scope, var.value_index, var.local_base)
        .ok_or(ExecSignal::error(ExecErr::VariableExpected, step.0))?;
    match (&variable.value, var.elem) {
        (Value::Long(v), None) => Ok(RtVal::Long(*v)),
        (Value::Float(v), None) => Ok(RtVal::Float(*v)),
        (Value::Str(s), None) => Ok(RtVal::Str(s.clone())),
        (Value::Array(block), Some(index)) => match &block.elems {
            ArrayElems::Long(elems) => Ok(RtVal::Long(elems[index])),
            ArrayElems::Float(elems) => Ok(RtVal::Float(elems[index])),
            ArrayElems::Str(elems) => Ok(RtVal::Str(elems[index].clone())),
        },
        // a whole array has no scalar value
        (Value::Array(_), None) => Err(ExecSignal::error(
            ExecErr::OperatorNotAllowedForTypes,
            step.0,
        )),
        (_, Some(_)) => Err(ExecSignal::error(ExecErr::VariableExpected, step.0)),
    }
}

/// write a scalar into a variable slot or array element, keeping the
/// string counters exact
pub fn write_ref(
    machine: &mut Machine,
    var: &VarRef,
    value: RtVal,
    step: Step,
) -> Result<(), ExecSignal> {
    let class = str_class(var.scope);
    let variable = machine
        .variable_mut(var.scope, var.value_index, var.local_base)
        .ok_or(ExecSignal::error(ExecErr::VariableExpected, step.0))?;
    if variable.is_const {
        return Err(ExecSignal::error(
            ExecErr::CannotChangeConstantValue,
            step.0,
        ));
    }

    match var.elem {
        None => {
            // scalars change kind freely
            let had_string = matches!(variable.value, Value::Str(Some(_)));
            let gains_string = matches!(value, RtVal::Str(Some(_)));
            variable.value = match value {
                RtVal::Long(v) => Value::Long(v),
                RtVal::Float(v) => Value::Float(v),
                RtVal::Str(s) => Value::Str(s),
            };
            if had_string {
                machine.counters.decrement(class);
            }
            if gains_string {
                machine.counters.increment(class);
            }
            Ok(())
        }
        Some(index) => {
            let Value::Array(block) = &mut variable.value else {
                return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
            };

            // an array declared without initializer settles its element
            // kind at the first assignment
            if !block.kind_fixed {
                let count = block.element_count();
                block.elems = match value.kind() {
                    ValueKind::Long => ArrayElems::Long(vec![0; count]),
                    ValueKind::Float => ArrayElems::Float(vec![0.0; count]),
                    ValueKind::Str => ArrayElems::Str(vec![None; count]),
                };
                block.kind_fixed = true;
            }

            match (&mut block.elems, value) {
                (ArrayElems::Long(elems), RtVal::Long(v)) => {
                    elems[index] = v;
                    Ok(())
                }
                (ArrayElems::Float(elems), RtVal::Float(v)) => {
                    elems[index] = v;
                    Ok(())
                }
                // an integer slips into a float array, not the reverse
                (ArrayElems::Float(elems), RtVal::Long(v)) => {
                    elems[index] = v as f32;
                    Ok(())
                }
                (ArrayElems::Str(elems), RtVal::Str(s)) => {
                    let had_string = elems[index].is_some();
                    let gains_string = s.is_some();
                    elems[index] = s;
                    if had_string {
                        machine.counters.decrement(class);
                    }
                    if gains_string {
                        machine.counters.increment(class);
                    }
                    Ok(())
                }
                _ => Err(ExecSignal::error(ExecErr::ArrayValueTypeIsFixed, step.0)),
            }
        }
    }
}

/// consume a stack level into a plain value, releasing an intermediate
/// string count when the level owned one
pub fn take_value(
    machine: &mut Machine,
    slot: EvalSlot,
    step: Step,
) -> Result<RtVal, ExecSignal> {
    match slot {
        EvalSlot::Val {
            value,
            intermediate,
        } => {
            if intermediate {
                machine
                    .counters
                    .decrement(justina_program::ObjectClass::IntermediateStr);
            }
            Ok(value)
        }
        EvalSlot::Ref(var) => read_ref(machine, &var, step),
    }
}

/// drop a stack level without using its value
pub fn drop_slot(machine: &mut Machine, slot: EvalSlot) {
    if let EvalSlot::Val {
        intermediate: true, ..
    } = slot
    {
        machine
            .counters
            .decrement(justina_program::ObjectClass::IntermediateStr);
    }
}

/// push-side counterpart: mark a computed string as an intermediate
pub fn make_result(machine: &mut Machine, value: RtVal) -> EvalSlot {
    if matches!(value, RtVal::Str(Some(_))) {
        machine
            .counters
            .increment(justina_program::ObjectClass::IntermediateStr);
    }
    EvalSlot::intermediate(value)
}

// ---- operator application ----

pub fn apply_infix(
    machine: &mut Machine,
    code: TermCode,
    lhs: EvalSlot,
    rhs: EvalSlot,
    step: Step,
) -> Result<EvalSlot, ExecSignal> {
    if code.is_assignment() {
        let EvalSlot::Ref(target) = lhs else {
            return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
        };
        let value = take_value(machine, rhs, step)?;
        let stored = match code.compound_base() {
            None => value,
            Some(base) => {
                let current = read_ref(machine, &target, step)?;
                binary_value(machine, base, current, value, step)?
            }
        };
        write_ref(machine, &target, stored, step)?;
        // the reference flows on, so chained assignment and the for-loop
        // control variable capture keep working
        return Ok(EvalSlot::Ref(target));
    }

    let left = take_value(machine, lhs, step)?;
    let right = take_value(machine, rhs, step)?;
    let value = binary_value(machine, code, left, right, step)?;
    Ok(make_result(machine, value))
}

fn binary_value(
    machine: &mut Machine,
    code: TermCode,
    left: RtVal,
    right: RtVal,
    step: Step,
) -> Result<RtVal, ExecSignal> {
    let _ = machine;
    let def = terminal_def(code);
    let op_long = def.infix_prio & OP_LONG != 0;
    let res_long = def.infix_prio & RES_LONG != 0;

    // strings first
    let strings = matches!(left, RtVal::Str(_)) && matches!(right, RtVal::Str(_));
    if strings {
        return string_binary(code, &left, &right, step);
    }
    if matches!(left, RtVal::Str(_)) || matches!(right, RtVal::Str(_)) {
        return Err(ExecSignal::error(
            ExecErr::OperatorNotAllowedForTypes,
            step.0,
        ));
    }

    let ln = left.as_num().unwrap();
    let rn = right.as_num().unwrap();

    if op_long {
        let (Some(a), Some(b)) = (ln.as_long(), rn.as_long()) else {
            return Err(ExecSignal::error(ExecErr::IntegerTypeExpected, step.0));
        };
        let value = match code {
            TermCode::BitAnd => a & b,
            TermCode::BitOr => a | b,
            TermCode::BitXor => a ^ b,
            TermCode::Shl => a.wrapping_shl(b as u32),
            TermCode::Shr => a.wrapping_shr(b as u32),
            TermCode::Mod => {
                if b == 0 {
                    return Err(ExecSignal::error(ExecErr::DivideByZero, step.0));
                }
                a.wrapping_rem(b)
            }
            _ => unreachable!("integer operator"),
        };
        return Ok(RtVal::Long(value));
    }

    if res_long {
        let result = match code {
            TermCode::And => ln.is_true() && rn.is_true(),
            TermCode::Or => ln.is_true() || rn.is_true(),
            TermCode::Eq => num_cmp(ln, rn) == std::cmp::Ordering::Equal,
            TermCode::Ne => num_cmp(ln, rn) != std::cmp::Ordering::Equal,
            TermCode::Lt => num_cmp(ln, rn) == std::cmp::Ordering::Less,
            TermCode::Gt => num_cmp(ln, rn) == std::cmp::Ordering::Greater,
            TermCode::Le => num_cmp(ln, rn) != std::cmp::Ordering::Greater,
            TermCode::Ge => num_cmp(ln, rn) != std::cmp::Ordering::Less,
            _ => unreachable!("comparison operator"),
        };
        return Ok(RtVal::Long(result as i32));
    }

    // arithmetic: long stays long, mixed promotes to float
    match code {
        TermCode::Pow => {
            if let (Some(a), Some(b)) = (ln.as_long(), rn.as_long()) {
                if (0..=30).contains(&b) {
                    if let Some(value) = a.checked_pow(b as u32) {
                        return Ok(RtVal::Long(value));
                    }
                }
            }
            Ok(RtVal::Float(ln.as_f32().powf(rn.as_f32())))
        }
        TermCode::Plus | TermCode::Minus | TermCode::Mult | TermCode::Div => {
            if let (Some(a), Some(b)) = (ln.as_long(), rn.as_long()) {
                let value = match code {
                    TermCode::Plus => a.wrapping_add(b),
                    TermCode::Minus => a.wrapping_sub(b),
                    TermCode::Mult => a.wrapping_mul(b),
                    TermCode::Div => {
                        if b == 0 {
                            return Err(ExecSignal::error(ExecErr::DivideByZero, step.0));
                        }
                        a.wrapping_div(b)
                    }
                    _ => unreachable!(),
                };
                Ok(RtVal::Long(value))
            } else {
                let a = ln.as_f32();
                let b = rn.as_f32();
                let value = match code {
                    TermCode::Plus => a + b,
                    TermCode::Minus => a - b,
                    TermCode::Mult => a * b,
                    TermCode::Div => a / b,
                    _ => unreachable!(),
                };
                Ok(RtVal::Float(value))
            }
        }
        _ => Err(ExecSignal::error(
            ExecErr::OperatorNotAllowedForTypes,
            step.0,
        )),
    }
}

fn string_binary(
    code: TermCode,
    left: &RtVal,
    right: &RtVal,
    step: Step,
) -> Result<RtVal, ExecSignal> {
    let a = left.str_text();
    let b = right.str_text();
    match code {
        TermCode::Plus => {
            let mut text = String::with_capacity(a.len() + b.len());
            text.push_str(a);
            text.push_str(b);
            Ok(RtVal::from_str_value(&text))
        }
        TermCode::Eq => Ok(RtVal::Long((a == b) as i32)),
        TermCode::Ne => Ok(RtVal::Long((a != b) as i32)),
        TermCode::Lt => Ok(RtVal::Long((a < b) as i32)),
        TermCode::Gt => Ok(RtVal::Long((a > b) as i32)),
        TermCode::Le => Ok(RtVal::Long((a <= b) as i32)),
        TermCode::Ge => Ok(RtVal::Long((a >= b) as i32)),
        _ => Err(ExecSignal::error(
            ExecErr::OperatorNotAllowedForTypes,
            step.0,
        )),
    }
}

fn num_cmp(a: Num, b: Num) -> std::cmp::Ordering {
    if let (Some(x), Some(y)) = (a.as_long(), b.as_long()) {
        x.cmp(&y)
    } else {
        a.as_f32()
            .partial_cmp(&b.as_f32())
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

pub fn apply_prefix(
    machine: &mut Machine,
    code: TermCode,
    slot: EvalSlot,
    step: Step,
) -> Result<EvalSlot, ExecSignal> {
    match code {
        TermCode::Incr | TermCode::Decr => {
            // prefix ++/-- writes back and stays assignable
            let EvalSlot::Ref(target) = slot else {
                return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
            };
            let value = incremented(machine, &target, code == TermCode::Incr, step)?;
            write_ref(machine, &target, value, step)?;
            Ok(EvalSlot::Ref(target))
        }
        TermCode::Minus | TermCode::Plus => {
            let value = take_value(machine, slot, step)?;
            let Some(num) = value.as_num() else {
                return Err(ExecSignal::error(
                    ExecErr::OperatorNotAllowedForTypes,
                    step.0,
                ));
            };
            let value = if code == TermCode::Minus {
                match num {
                    Num::Long(v) => RtVal::Long(v.wrapping_neg()),
                    Num::Float(v) => RtVal::Float(-v),
                }
            } else {
                value
            };
            Ok(EvalSlot::value(value))
        }
        TermCode::Not => {
            let value = take_value(machine, slot, step)?;
            let Some(num) = value.as_num() else {
                return Err(ExecSignal::error(
                    ExecErr::OperatorNotAllowedForTypes,
                    step.0,
                ));
            };
            Ok(EvalSlot::value(RtVal::Long(!num.is_true() as i32)))
        }
        TermCode::BitCompl => {
            let value = take_value(machine, slot, step)?;
            let Some(Num::Long(v)) = value.as_num() else {
                return Err(ExecSignal::error(ExecErr::IntegerTypeExpected, step.0));
            };
            Ok(EvalSlot::value(RtVal::Long(!v)))
        }
        _ => unreachable!("prefix operator"),
    }
}

/// postfix ++/--: write back, push the OLD value, not assignable
pub fn apply_postfix(
    machine: &mut Machine,
    code: TermCode,
    slot: EvalSlot,
    step: Step,
) -> Result<EvalSlot, ExecSignal> {
    let EvalSlot::Ref(target) = slot else {
        return Err(ExecSignal::error(ExecErr::VariableExpected, step.0));
    };
    let old = read_ref(machine, &target, step)?;
    let new = incremented(machine, &target, code == TermCode::Incr, step)?;
    write_ref(machine, &target, new, step)?;
    Ok(EvalSlot::value(old))
}

fn incremented(
    machine: &Machine,
    target: &VarRef,
    up: bool,
    step: Step,
) -> Result<RtVal, ExecSignal> {
    let current = read_ref(machine, target, step)?;
    let Some(num) = current.as_num() else {
        return Err(ExecSignal::error(ExecErr::NumberExpected, step.0));
    };
    Ok(match num {
        Num::Long(v) => RtVal::Long(if up { v.wrapping_add(1) } else { v.wrapping_sub(1) }),
        Num::Float(v) => RtVal::Float(if up { v + 1.0 } else { v - 1.0 }),
    })
}

/// priority of an op stack entry, used by the shunting comparisons
pub fn entry_priority(entry: &OpEntry) -> u8 {
    match entry {
        OpEntry::Infix(code) => terminal_def(*code).infix_prio & PRIO_MASK,
        OpEntry::Prefix(code) => terminal_def(*code).prefix_prio & PRIO_MASK,
        OpEntry::Marker(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use justina_program::ObjectClass;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_numeric_coercion() {
        let mut machine = Machine::new();
        let step = Step::ZERO;

        let v = binary_value(
            &mut machine,
            TermCode::Plus,
            RtVal::Long(2),
            RtVal::Float(0.5),
            step,
        )
        .unwrap();
        assert_eq!(v, RtVal::Float(2.5));

        let v = binary_value(
            &mut machine,
            TermCode::Div,
            RtVal::Long(7),
            RtVal::Long(2),
            step,
        )
        .unwrap();
        assert_eq!(v, RtVal::Long(3));

        let err = binary_value(
            &mut machine,
            TermCode::Mod,
            RtVal::Float(1.5),
            RtVal::Long(2),
            step,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExecSignal::error(ExecErr::IntegerTypeExpected, 0)
        );
    }

    #[test]
    fn test_power_stays_long_when_exact() {
        let mut machine = Machine::new();
        let v = binary_value(
            &mut machine,
            TermCode::Pow,
            RtVal::Long(3),
            RtVal::Long(9),
            Step::ZERO,
        )
        .unwrap();
        assert_eq!(v, RtVal::Long(19683));

        let v = binary_value(
            &mut machine,
            TermCode::Pow,
            RtVal::Long(2),
            RtVal::Float(0.5),
            Step::ZERO,
        )
        .unwrap();
        assert_eq!(v, RtVal::Float(2f32.sqrt()));
    }

    #[test]
    fn test_string_concat_counts_intermediate() {
        let mut machine = Machine::new();
        let v = binary_value(
            &mut machine,
            TermCode::Plus,
            RtVal::from_str_value("ab"),
            RtVal::from_str_value("cd"),
            Step::ZERO,
        )
        .unwrap();
        let slot = make_result(&mut machine, v);
        assert_eq!(machine.counters.count(ObjectClass::IntermediateStr), 1);

        let value = take_value(&mut machine, slot, Step::ZERO).unwrap();
        assert_eq!(value, RtVal::Str(Some("abcd".into())));
        assert_eq!(machine.counters.count(ObjectClass::IntermediateStr), 0);
    }

    #[test]
    fn test_empty_concat_is_null() {
        let mut machine = Machine::new();
        let v = binary_value(
            &mut machine,
            TermCode::Plus,
            RtVal::Str(None),
            RtVal::Str(None),
            Step::ZERO,
        )
        .unwrap();
        assert_eq!(v, RtVal::Str(None));
    }

    #[test]
    fn test_string_compare() {
        let mut machine = Machine::new();
        let v = binary_value(
            &mut machine,
            TermCode::Lt,
            RtVal::from_str_value("abc"),
            RtVal::from_str_value("abd"),
            Step::ZERO,
        )
        .unwrap();
        assert_eq!(v, RtVal::Long(1));

        let err = binary_value(
            &mut machine,
            TermCode::Plus,
            RtVal::from_str_value("abc"),
            RtVal::Long(1),
            Step::ZERO,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExecSignal::error(ExecErr::OperatorNotAllowedForTypes, 0)
        );
    }
}

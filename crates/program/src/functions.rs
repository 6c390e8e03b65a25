// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// external (user defined) function attributes.
//
// a function name enters this table the first time it is called or defined.
// call sites accumulate the observed argument count range and the observed
// scalar/array argument pattern, the definition must fit everything that
// was observed before it, and later call sites are checked against the
// definition.

use justina_tokens::Step;

use crate::value::ConstValue;

/// the scalar/array pattern is accumulated in the low 8 bits (bit n set
/// means argument n+1 is an array), the high bit means 'not yet defined'
pub const PATTERN_UNDEFINED: u16 = 0x8000;

#[derive(Debug, PartialEq, Clone)]
pub struct ParamDecl {
    pub name_index: u8,
    pub is_array: bool,
    pub default: Option<ConstValue>,
}

/// a local declaration inside a function body. locals get their slots at
/// parse time, the storage itself is allocated at every call.
#[derive(Debug, PartialEq, Clone)]
pub struct LocalDecl {
    pub name_index: u8,
    /// empty for scalars
    pub dims: Vec<u32>,
    pub init: Option<ConstValue>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionAttrs {
    pub name_index: usize,

    /// the step of the 'function' command token, and of the first statement
    /// of the body. both stay None until the function is defined.
    pub cmd_step: Option<Step>,
    pub body_step: Option<Step>,

    /// argument count range observed across call sites parsed so far
    pub min_args_observed: u8,
    pub max_args_observed: u8,

    /// argument count range of the definition (valid when defined)
    pub min_args: u8,
    pub max_args: u8,

    pub array_pattern: u16,

    pub params: Vec<ParamDecl>,
    pub locals: Vec<LocalDecl>,

    /// static variables of this function: (name index, absolute slot in
    /// the machine's flat static store)
    pub statics: Vec<(u8, u8)>,
}

impl FunctionAttrs {
    pub fn new(name_index: usize) -> Self {
        Self {
            name_index,
            cmd_step: None,
            body_step: None,
            min_args_observed: u8::MAX,
            max_args_observed: 0,
            min_args: 0,
            max_args: 0,
            array_pattern: PATTERN_UNDEFINED,
            params: vec![],
            locals: vec![],
            statics: vec![],
        }
    }

    pub fn is_defined(&self) -> bool {
        self.body_step.is_some()
    }

    /// positions (0-based) whose array-ness has been fixed by earlier call
    /// sites or by the definition
    pub fn observed_positions(&self) -> u8 {
        if self.is_defined() {
            self.max_args
        } else if self.min_args_observed == u8::MAX {
            0
        } else {
            self.max_args_observed
        }
    }

    pub fn pattern_bit(&self, position: u8) -> bool {
        self.array_pattern & (1 << position) != 0
    }

    /// total number of local slots a call frame needs
    pub fn frame_size(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    pub fn static_slot(&self, name_index: u8) -> Option<u8> {
        self.statics
            .iter()
            .find(|(name, _)| *name == name_index)
            .map(|(_, slot)| *slot)
    }

    pub fn local_slot(&self, name_index: u8) -> Option<u8> {
        if let Some(position) = self
            .params
            .iter()
            .position(|param| param.name_index == name_index)
        {
            return Some(position as u8);
        }
        self.locals
            .iter()
            .position(|local| local.name_index == name_index)
            .map(|position| (self.params.len() + position) as u8)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_local_slots_follow_params() {
        let mut attrs = FunctionAttrs::new(0);
        attrs.params.push(ParamDecl {
            name_index: 4,
            is_array: false,
            default: None,
        });
        attrs.params.push(ParamDecl {
            name_index: 5,
            is_array: false,
            default: Some(ConstValue::Long(10)),
        });
        attrs.locals.push(LocalDecl {
            name_index: 6,
            dims: vec![],
            init: None,
        });

        assert_eq!(attrs.local_slot(4), Some(0));
        assert_eq!(attrs.local_slot(5), Some(1));
        assert_eq!(attrs.local_slot(6), Some(2));
        assert_eq!(attrs.local_slot(7), None);
        assert_eq!(attrs.frame_size(), 3);
    }

    #[test]
    fn test_new_function_has_undefined_pattern() {
        let attrs = FunctionAttrs::new(3);
        assert!(!attrs.is_defined());
        assert_eq!(attrs.observed_positions(), 0);
        assert!(attrs.array_pattern & PATTERN_UNDEFINED != 0);
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the value model.
//
// a variable slot holds a long, a float, a string or an array. the empty
// string is ALWAYS represented by 'Str(None)', never by a zero length
// allocation. an array fixes its element kind at creation, string elements
// are individually owned, an empty element is 'None'.

use justina_types::{ValueKind, MAX_ARRAY_DIMS, MAX_ARRAY_ELEMENTS};

/// a scalar or array value stored in a variable slot
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Long(i32),
    Float(f32),
    Str(Option<Box<str>>),
    Array(ArrayBlock),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Array(block) => block.value_kind(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }
}

/// a variable slot. 'is_const' protects for-loop control variables and
/// declared constants against assignment.
#[derive(Debug, PartialEq, Clone)]
pub struct Variable {
    pub value: Value,
    pub is_const: bool,
}

impl Variable {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            is_const: false,
        }
    }
}

/// a plain number, long or float. the arithmetic helpers implement the
/// coercion rule: mixed operands promote the long side to float.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Num {
    Long(i32),
    Float(f32),
}

impl Num {
    pub fn kind(&self) -> ValueKind {
        match self {
            Num::Long(_) => ValueKind::Long,
            Num::Float(_) => ValueKind::Float,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match self {
            Num::Long(v) => *v as f32,
            Num::Float(v) => *v,
        }
    }

    pub fn as_long(&self) -> Option<i32> {
        match self {
            Num::Long(v) => Some(*v),
            Num::Float(_) => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Num::Long(v) => *v == 0,
            Num::Float(v) => *v == 0.0,
        }
    }

    pub fn is_true(&self) -> bool {
        !self.is_zero()
    }
}

/// an owned constant value: initializers, defaults and last results
#[derive(Debug, PartialEq, Clone)]
pub enum ConstValue {
    Long(i32),
    Float(f32),
    Str(Box<str>),
}

impl ConstValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConstValue::Long(_) => ValueKind::Long,
            ConstValue::Float(_) => ValueKind::Float,
            ConstValue::Str(_) => ValueKind::Str,
        }
    }
}

/// array element storage, the element kind is fixed at creation
#[derive(Debug, PartialEq, Clone)]
pub enum ArrayElems {
    Long(Vec<i32>),
    Float(Vec<f32>),
    Str(Vec<Option<Box<str>>>),
}

/// an array block: up to three dimension sizes, the dimension count, and
/// the elements. subscripts are 1-based.
///
/// an array declared without an initializer leaves 'kind_fixed' false: the
/// first element assignment settles the element kind, every later mismatch
/// is an error.
#[derive(Debug, PartialEq, Clone)]
pub struct ArrayBlock {
    pub dims: [u8; MAX_ARRAY_DIMS],
    pub dim_count: u8,
    pub kind_fixed: bool,
    pub elems: ArrayElems,
}

impl ArrayBlock {
    /// dims are validated by the parser: 1..=MAX_ARRAY_DIMS dimensions,
    /// each 1..=255, the product capped at MAX_ARRAY_ELEMENTS
    pub fn new(dims: &[u32], kind: ValueKind) -> ArrayBlock {
        debug_assert!(!dims.is_empty() && dims.len() <= MAX_ARRAY_DIMS);
        let count: usize = dims.iter().map(|d| *d as usize).product();
        debug_assert!(count >= 1 && count <= MAX_ARRAY_ELEMENTS);

        let mut dim_sizes = [0u8; MAX_ARRAY_DIMS];
        for (slot, dim) in dim_sizes.iter_mut().zip(dims.iter()) {
            *slot = *dim as u8;
        }

        let elems = match kind {
            ValueKind::Long => ArrayElems::Long(vec![0; count]),
            ValueKind::Float => ArrayElems::Float(vec![0.0; count]),
            ValueKind::Str => ArrayElems::Str(vec![None; count]),
        };

        ArrayBlock {
            dims: dim_sizes,
            dim_count: dims.len() as u8,
            kind_fixed: true,
            elems,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match &self.elems {
            ArrayElems::Long(_) => ValueKind::Long,
            ArrayElems::Float(_) => ValueKind::Float,
            ArrayElems::Str(_) => ValueKind::Str,
        }
    }

    pub fn element_count(&self) -> usize {
        (0..self.dim_count as usize)
            .map(|d| self.dims[d] as usize)
            .product()
    }

    /// row-major linear index for 1-based subscripts.
    /// None when the subscript count or any subscript is out of range.
    pub fn linear_index(&self, subscripts: &[i32]) -> Option<usize> {
        if subscripts.len() != self.dim_count as usize {
            return None;
        }
        let mut index: usize = 0;
        for (subscript, dim) in subscripts.iter().zip(self.dims.iter()) {
            if *subscript < 1 || *subscript > *dim as i32 {
                return None;
            }
            index = index * (*dim as usize) + (*subscript as usize - 1);
        }
        Some(index)
    }

    /// the non-empty string elements, for counter-exact deletion
    pub fn string_element_count(&self) -> usize {
        match &self.elems {
            ArrayElems::Str(elems) => elems.iter().filter(|e| e.is_some()).count(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_array_linear_index() {
        let block = ArrayBlock::new(&[2, 3], ValueKind::Long);
        assert_eq!(block.element_count(), 6);
        assert_eq!(block.linear_index(&[1, 1]), Some(0));
        assert_eq!(block.linear_index(&[1, 3]), Some(2));
        assert_eq!(block.linear_index(&[2, 1]), Some(3));
        assert_eq!(block.linear_index(&[2, 3]), Some(5));
        assert_eq!(block.linear_index(&[0, 1]), None);
        assert_eq!(block.linear_index(&[2, 4]), None);
        assert_eq!(block.linear_index(&[2]), None);
    }

    #[test]
    fn test_string_array_elements_start_empty() {
        let block = ArrayBlock::new(&[3], ValueKind::Str);
        assert_eq!(block.string_element_count(), 0);
        match &block.elems {
            ArrayElems::Str(elems) => assert_eq!(elems.len(), 3),
            _ => panic!("expect string elements"),
        }
    }

    #[test]
    fn test_num_promotion() {
        assert_eq!(Num::Long(3).as_f32(), 3.0);
        assert_eq!(Num::Float(2.5).as_long(), None);
        assert!(Num::Long(1).is_true());
        assert!(!Num::Float(0.0).is_true());
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// value display formatting, set by the 'dispFmt' command.
//
// the specifier characters follow the printf family: 'f' fixed, 'e'
// scientific, 'g' shortest (the default), 'd' decimal, 'x' hexadecimal.

use crate::eval::RtVal;

pub struct DisplayFmt {
    pub width: usize,
    pub precision: usize,
    pub spec: u8,
}

impl DisplayFmt {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            width: 0,
            precision: 3,
            spec: b'g',
        }
    }

    pub fn format_value(&self, value: &RtVal) -> String {
        let text = match value {
            RtVal::Long(v) => match self.spec {
                b'x' => format!("{:x}", v),
                _ => format!("{}", v),
            },
            RtVal::Float(v) => match self.spec {
                b'f' => format!("{:.*}", self.precision, v),
                b'e' => format!("{:.*e}", self.precision, v),
                // shortest representation that reparses identically
                _ => format!("{:?}", v),
            },
            RtVal::Str(s) => s.as_deref().unwrap_or("").to_owned(),
        };
        if self.width > text.len() {
            format!("{:>1$}", text, self.width)
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_format() {
        let fmt = DisplayFmt::new();
        assert_eq!(fmt.format_value(&RtVal::Long(15)), "15");
        assert_eq!(fmt.format_value(&RtVal::Float(2.5)), "2.5");
        assert_eq!(fmt.format_value(&RtVal::Str(None)), "");
        assert_eq!(
            fmt.format_value(&RtVal::Str(Some("abc".into()))),
            "abc"
        );
    }

    #[test]
    fn test_fixed_and_width() {
        let fmt = DisplayFmt {
            width: 8,
            precision: 2,
            spec: b'f',
        };
        assert_eq!(fmt.format_value(&RtVal::Float(2.5)), "    2.50");
        assert_eq!(fmt.format_value(&RtVal::Long(7)), "       7");
    }

    #[test]
    fn test_hex() {
        let fmt = DisplayFmt {
            width: 0,
            precision: 3,
            spec: b'x',
        };
        assert_eq!(fmt.format_value(&RtVal::Long(255)), "ff");
    }
}

// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// identifier interning tables.
//
// three tables exist per machine: program variable names, user variable
// names and external function names. lookup is a linear search for an
// equal-length, equal-content match, interning appends if the table still
// has room. a name may stay in the table with no current values attached.

pub struct NameTable {
    names: Vec<String>,
    capacity: usize,
}

impl NameTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            names: vec![],
            capacity,
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// existing index, or a fresh entry. None when the table is full.
    /// the caller counts the heap object when a fresh entry is reported.
    pub fn intern(&mut self, name: &str) -> Option<(usize, bool)> {
        if let Some(index) = self.find(name) {
            return Some((index, false));
        }
        if self.names.len() >= self.capacity {
            return None;
        }
        self.names.push(name.to_owned());
        Some((self.names.len() - 1, true))
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    /// drop all names, returning how many were removed so the caller can
    /// decrement the name string counter exactly
    pub fn clear(&mut self) -> usize {
        let count = self.names.len();
        self.names.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_intern_and_find() {
        let mut table = NameTable::new(3);
        assert_eq!(table.intern("alpha"), Some((0, true)));
        assert_eq!(table.intern("beta"), Some((1, true)));
        assert_eq!(table.intern("alpha"), Some((0, false)));
        assert_eq!(table.find("beta"), Some(1));
        assert_eq!(table.find("gamma"), None);

        assert_eq!(table.intern("gamma"), Some((2, true)));
        assert_eq!(table.intern("delta"), None); // table full

        assert_eq!(table.clear(), 3);
        assert_eq!(table.find("alpha"), None);
    }
}

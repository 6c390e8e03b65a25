// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the program buffer: one contiguous byte array holding parsed tokens,
// partitioned into a program area and an immediate-mode area.
//
// |          |
// | 0        | <-- end of the immediate statement(s)
// | tokens   | <-- the last parsed command line
// |----------| <-- immediate area start (= PROGRAM_AREA_SIZE)
// |          |
// | 0        | <-- end of the parsed program
// | tokens   |
// | tokens   | <-- parsed program statements
// \----------/ <-- step 0
//
// statements typed at the prompt are always parsed into the immediate area,
// a loaded program grows from step 0. both areas keep a zero terminator
// byte after their last token.

use justina_types::{IMMEDIATE_AREA_SIZE, PROGRAM_AREA_SIZE, PROGRAM_BUFFER_SIZE};

use crate::Step;

/// the two write regions of the buffer
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Area {
    Program,
    Immediate,
}

pub struct ProgramBuffer {
    bytes: Vec<u8>,
    /// next write position in the program area
    pub program_cursor: Step,
    /// next write position in the immediate area
    pub immediate_cursor: Step,
}

impl ProgramBuffer {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let mut buffer = Self {
            bytes: vec![0u8; PROGRAM_BUFFER_SIZE],
            program_cursor: Step::ZERO,
            immediate_cursor: Step(PROGRAM_AREA_SIZE as u16),
        };
        buffer.clear_program();
        buffer.clear_immediate();
        buffer
    }

    pub const fn immediate_start() -> Step {
        Step(PROGRAM_AREA_SIZE as u16)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_at(&self, step: Step) -> u8 {
        self.bytes[step.index()]
    }

    pub fn in_program_area(&self, step: Step) -> bool {
        step.index() < PROGRAM_AREA_SIZE
    }

    /// true when the program area holds at least one parsed statement
    pub fn has_program(&self) -> bool {
        self.program_cursor != Step::ZERO
    }

    pub fn area_of(&self, step: Step) -> Area {
        if self.in_program_area(step) {
            Area::Program
        } else {
            Area::Immediate
        }
    }

    pub fn cursor(&self, area: Area) -> Step {
        match area {
            Area::Program => self.program_cursor,
            Area::Immediate => self.immediate_cursor,
        }
    }

    /// bytes still available for tokens in the area, the closing zero
    /// terminator byte excluded
    pub fn free_bytes(&self, area: Area) -> usize {
        match area {
            Area::Program => PROGRAM_AREA_SIZE - self.program_cursor.index() - 1,
            Area::Immediate => {
                PROGRAM_BUFFER_SIZE - self.immediate_cursor.index() - 1
            }
        }
    }

    /// append raw encoded token bytes at the area cursor and move it,
    /// keeping the zero terminator behind the last token.
    /// the caller (the token writer) has checked the free space.
    pub(crate) fn append(&mut self, area: Area, data: &[u8]) -> Step {
        let start = self.cursor(area);
        let end = start.index() + data.len();
        self.bytes[start.index()..end].copy_from_slice(data);
        self.bytes[end] = 0;
        let next = Step(end as u16);
        match area {
            Area::Program => self.program_cursor = next,
            Area::Immediate => self.immediate_cursor = next,
        }
        start
    }

    pub(crate) fn overwrite(&mut self, step: Step, data: &[u8]) {
        let start = step.index();
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// rewrite a single byte of an already written token (the parser
    /// upgrades a declared variable token to an array token this way)
    pub fn overwrite_byte(&mut self, step: Step, byte: u8) {
        self.bytes[step.index()] = byte;
    }

    /// truncate an area back to a previously saved cursor, dropping every
    /// token parsed after it (used to discard a failed statement)
    pub fn truncate(&mut self, area: Area, cursor: Step) {
        match area {
            Area::Program => self.program_cursor = cursor,
            Area::Immediate => self.immediate_cursor = cursor,
        }
        self.bytes[cursor.index()] = 0;
    }

    pub fn clear_program(&mut self) {
        self.program_cursor = Step::ZERO;
        self.bytes[0] = 0;
    }

    pub fn clear_immediate(&mut self) {
        self.immediate_cursor = Self::immediate_start();
        self.bytes[PROGRAM_AREA_SIZE] = 0;
    }

    /// copy the parsed immediate area out (tokens + terminator), so it can
    /// be restored after a debug session reused the area
    pub fn save_immediate(&self) -> Vec<u8> {
        let start = PROGRAM_AREA_SIZE;
        let end = self.immediate_cursor.index() + 1;
        self.bytes[start..end].to_vec()
    }

    pub fn restore_immediate(&mut self, saved: &[u8]) {
        debug_assert!(saved.len() <= IMMEDIATE_AREA_SIZE);
        let start = PROGRAM_AREA_SIZE;
        self.bytes[start..start + saved.len()].copy_from_slice(saved);
        self.immediate_cursor = Step((start + saved.len() - 1) as u16);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_new_buffer_is_terminated() {
        let buffer = ProgramBuffer::new();
        assert_eq!(buffer.byte_at(Step::ZERO), 0);
        assert_eq!(buffer.byte_at(ProgramBuffer::immediate_start()), 0);
        assert!(!buffer.has_program());
    }

    #[test]
    fn test_append_and_truncate() {
        let mut buffer = ProgramBuffer::new();
        let start = buffer.append(Area::Program, &[0x31, 0x07, 0x00]);
        assert_eq!(start, Step::ZERO);
        assert_eq!(buffer.program_cursor, Step(3));
        assert_eq!(buffer.byte_at(Step(3)), 0);

        let second = buffer.append(Area::Program, &[0x72, 0x01]);
        assert_eq!(second, Step(3));

        buffer.truncate(Area::Program, second);
        assert_eq!(buffer.program_cursor, Step(3));
        assert_eq!(buffer.byte_at(Step(3)), 0);
    }

    #[test]
    fn test_save_restore_immediate() {
        let mut buffer = ProgramBuffer::new();
        buffer.append(Area::Immediate, &[0x72, 0x01]);
        let saved = buffer.save_immediate();
        assert_eq!(saved, vec![0x72, 0x01, 0x00]);

        buffer.clear_immediate();
        buffer.append(Area::Immediate, &[0x71, 0x00, 0x72, 0x01]);

        buffer.restore_immediate(&saved);
        assert_eq!(buffer.byte_at(ProgramBuffer::immediate_start()), 0x72);
        assert_eq!(
            buffer.immediate_cursor,
            Step((PROGRAM_AREA_SIZE + 2) as u16)
        );
    }
}

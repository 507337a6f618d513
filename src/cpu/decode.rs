//! Instruction decoder for the DCPU-16.
//!
//! Instruction word layout, least significant bit first:
//! - Bits 0-3: opcode (0 selects the extended family)
//! - Bits 4-9: operand `a` (extended: the extended opcode)
//! - Bits 10-15: operand `b` (extended: the sole operand)

use super::instruction::{ExtendedOpcode, Instruction, Opcode};
use super::operand::Slot;
use super::Word;
use std::collections::HashMap;

/// Split a raw word into (opcode, a field, b field).
#[inline]
pub fn fields(word: Word) -> (u8, u8, u8) {
    (
        (word & 0x000F) as u8,
        ((word >> Slot::A.shift()) & 0x3F) as u8,
        ((word >> Slot::B.shift()) & 0x3F) as u8,
    )
}

/// Decode a raw instruction word.
///
/// Returns `None` for opcode 0 words that are not a known extended
/// instruction; the execution loop treats those as the end of the
/// program.
pub fn decode(word: Word) -> Option<Instruction> {
    let (opcode, a, b) = fields(word);
    match Opcode::from_code(opcode) {
        Some(op) => Some(Instruction::basic(op, a, b)),
        None => ExtendedOpcode::from_code(a).map(|op| Instruction::extended(op, b)),
    }
}

/// Pack a basic instruction.
pub fn encode(op: Opcode, a: u8, b: u8) -> Word {
    encode_instruction(&Instruction::basic(op, a, b))
}

/// Pack an extended instruction. Its operand goes in the `b` field.
pub fn encode_extended(op: ExtendedOpcode, a: u8) -> Word {
    encode_instruction(&Instruction::extended(op, a))
}

/// The first word of an instruction. Each operand packs itself into
/// its own slot; the extended opcode sits where operand `a` would.
pub fn encode_instruction(instr: &Instruction) -> Word {
    match instr {
        Instruction::Basic { op, a, b } => Word::from(op.code()) | a.packed() | b.packed(),
        Instruction::Extended { op, a } => (Word::from(op.code()) << Slot::A.shift()) | a.packed(),
    }
}

/// A decoder that remembers every word it has seen.
///
/// Decoding is a pure function of the word, so results are cached.
/// Each call hands out a fresh copy, and the operands' captured state is
/// only meaningful after `process`/`no_op` has run on that copy.
#[derive(Debug, Default)]
pub struct Decoder {
    cache: HashMap<Word, Option<Instruction>>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, word: Word) -> Option<Instruction> {
        *self.cache.entry(word).or_insert_with(|| decode(word))
    }

    /// Number of distinct words decoded so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::operand::{AddressingMode, Slot};

    #[test]
    fn test_fields() {
        assert_eq!(fields(0xA861), (0x1, 0x06, 0x2A));
        assert_eq!(fields(0x7C10), (0x0, 0x01, 0x1F));
    }

    #[test]
    fn test_decode_set_i_10() {
        let instr = decode(0xA861).unwrap();
        match instr {
            Instruction::Basic { op, a, b } => {
                assert_eq!(op, Opcode::Set);
                assert_eq!(a.mode(), AddressingMode::Register(6));
                assert_eq!(b.mode(), AddressingMode::Literal(10));
                assert_eq!(b.slot(), Slot::B);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_jsr_uses_b_field() {
        let instr = decode(0x7C10).unwrap();
        match instr {
            Instruction::Extended { op, a } => {
                assert_eq!(op, ExtendedOpcode::Jsr);
                assert_eq!(a.mode(), AddressingMode::NextWord);
                assert_eq!(a.slot(), Slot::B);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_halt_sentinels() {
        assert!(decode(0x0000).is_none());
        assert!(decode(0x0020).is_none());
        assert!(decode(0xFC00).is_none());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode(Opcode::Set, 0x06, 0x2A), 0xA861);
        assert_eq!(encode(Opcode::Set, 0x00, 0x1F), 0x7C01);
        assert_eq!(encode_extended(ExtendedOpcode::Jsr, 0x1F), 0x7C10);
        // Codes wider than six bits are masked, not spilled into the next field
        assert_eq!(encode(Opcode::Set, 0x46, 0x2A), 0xA861);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for word in [0x7C01u16, 0x7DE1, 0x7803, 0xC00D, 0x2161, 0x61C1, 0x7C10, 0x9037] {
            let instr = decode(word).unwrap();
            assert_eq!(encode_instruction(&instr), word);
        }
    }

    #[test]
    fn test_decoder_caches() {
        let mut decoder = Decoder::new();
        let first = decoder.decode(0xA861);
        let second = decoder.decode(0xA861);
        decoder.decode(0x0000);
        assert_eq!(first, second);
        assert_eq!(decoder.cached(), 2);
    }
}

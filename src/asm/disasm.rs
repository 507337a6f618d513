//! Disassembler for DCPU-16 programs.
//!
//! Walks a word stream, pairing each instruction with its inline operand
//! words, and renders assembly text.

use crate::cpu::decode::decode;
use crate::cpu::{Instruction, Operand, Word};

/// Decode the instruction at `words[0]`, filling operands' inline words
/// from the words that follow. Missing trailing words read as 0.
///
/// Returns `None` for words that do not decode (the halt sentinel).
pub fn decode_at(words: &[Word]) -> Option<Instruction> {
    let instr = decode(*words.first()?)?;
    let mut inline = words.iter().skip(1).copied();
    let mut fill = |op: Operand| {
        if op.mode().uses_next_word() {
            op.with_next_word(inline.next().unwrap_or(0))
        } else {
            op
        }
    };

    Some(match instr {
        Instruction::Basic { op, a, b } => {
            let a = fill(a);
            let b = fill(b);
            Instruction::Basic { op, a, b }
        }
        Instruction::Extended { op, a } => Instruction::Extended { op, a: fill(a) },
    })
}

/// Disassemble a single instruction to text.
pub fn disassemble_instruction(words: &[Word]) -> String {
    match decode_at(words) {
        Some(instr) => instr.to_string(),
        None => format!("DAT 0x{:04x}", words.first().copied().unwrap_or(0)),
    }
}

/// Disassemble a program listing, one instruction per line.
pub fn disassemble(words: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("; DCPU-16 Disassembly\n");
    output.push_str("; -------------------\n\n");

    let mut addr = 0;
    while addr < words.len() {
        let rest = &words[addr..];
        let len = decode_at(rest).map_or(1, |instr| instr.len()).min(rest.len());
        let raw: Vec<String> = rest[..len].iter().map(|w| format!("{:04x}", w)).collect();
        output.push_str(&format!(
            "{:04x}: {:<24} ; {}\n",
            addr,
            disassemble_instruction(rest),
            raw.join(" ")
        ));
        addr += len;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_set_with_next_word() {
        assert_eq!(disassemble_instruction(&[0x7C01, 0x0030]), "SET A, 0x0030");
    }

    #[test]
    fn test_disassemble_operand_order() {
        // a's inline word comes first
        assert_eq!(disassemble_instruction(&[0x7DE1, 0x1000, 0x0020]), "SET [0x1000], 0x0020");
        assert_eq!(disassemble_instruction(&[0x2161, 0x2000]), "SET [0x2000+I], [A]");
    }

    #[test]
    fn test_disassemble_jsr() {
        assert_eq!(disassemble_instruction(&[0x7C10, 0x0018]), "JSR 0x0018");
    }

    #[test]
    fn test_disassemble_data() {
        assert_eq!(disassemble_instruction(&[0x0000]), "DAT 0x0000");
        assert_eq!(disassemble_instruction(&[]), "DAT 0x0000");
    }

    #[test]
    fn test_listing_steps_over_inline_words() {
        let listing = disassemble(&[0x7C01, 0x0030, 0xA861, 0x0000]);
        let lines: Vec<&str> = listing.lines().skip(3).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0000: SET A, 0x0030"));
        assert!(lines[0].ends_with("; 7c01 0030"));
        assert!(lines[1].starts_with("0002: SET I, 0x0a"));
        assert!(lines[2].starts_with("0003: DAT 0x0000"));
    }

    #[test]
    fn test_truncated_program() {
        let listing = disassemble(&[0x7C01]);
        assert!(listing.contains("0000: SET A, 0x0000"));
    }
}

//! DCPU-16 instructions and their execution semantics.
//!
//! Basic instructions take two operands, `a` (bits 4-9) and `b`
//! (bits 10-15), and most of them store their result into `a`.
//! Extended instructions (opcode 0) take a single operand encoded in the
//! `b` field; JSR is the only one defined.

use super::execute::CpuError;
use super::operand::{Operand, Slot};
use super::{Memory, Registers, Word};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic opcodes, bits 0-3 of the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Set = 0x1,
    Add = 0x2,
    Sub = 0x3,
    Mul = 0x4,
    Div = 0x5,
    Mod = 0x6,
    Shl = 0x7,
    Shr = 0x8,
    And = 0x9,
    Bor = 0xA,
    Xor = 0xB,
    Ife = 0xC,
    Ifn = 0xD,
    Ifg = 0xE,
    Ifb = 0xF,
}

impl Opcode {
    pub const ALL: [Opcode; 15] = [
        Opcode::Set,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::And,
        Opcode::Bor,
        Opcode::Xor,
        Opcode::Ife,
        Opcode::Ifn,
        Opcode::Ifg,
        Opcode::Ifb,
    ];

    /// Opcode for the low nibble of an instruction word. 0 is the
    /// extended family and has no basic opcode.
    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0x0F {
            0 => None,
            code => Some(Self::ALL[(code - 1) as usize]),
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse an assembler mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Set => "SET",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::And => "AND",
            Opcode::Bor => "BOR",
            Opcode::Xor => "XOR",
            Opcode::Ife => "IFE",
            Opcode::Ifn => "IFN",
            Opcode::Ifg => "IFG",
            Opcode::Ifb => "IFB",
        }
    }

    /// IFE, IFN, IFG and IFB only compare.
    pub fn is_conditional(self) -> bool {
        matches!(self, Opcode::Ife | Opcode::Ifn | Opcode::Ifg | Opcode::Ifb)
    }
}

/// Extended opcodes, found in the `a` field when the basic opcode is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedOpcode {
    /// Push PC, then jump.
    Jsr = 0x01,
}

impl ExtendedOpcode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(ExtendedOpcode::Jsr),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        name.eq_ignore_ascii_case("JSR").then_some(ExtendedOpcode::Jsr)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ExtendedOpcode::Jsr => "JSR",
        }
    }
}

/// What the execution loop should do with the next instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Execute it normally.
    Continue,
    /// A condition failed: decode it but do not apply it.
    SkipNext,
}

/// A decoded instruction with its resolved operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Basic { op: Opcode, a: Operand, b: Operand },
    Extended { op: ExtendedOpcode, a: Operand },
}

impl Instruction {
    /// A basic instruction from its opcode and operand codes.
    pub fn basic(op: Opcode, a: u8, b: u8) -> Self {
        Instruction::Basic {
            op,
            a: Operand::new(a, Slot::A),
            b: Operand::new(b, Slot::B),
        }
    }

    /// An extended instruction; its operand lives in the `b` field.
    pub fn extended(op: ExtendedOpcode, a: u8) -> Self {
        Instruction::Extended {
            op,
            a: Operand::new(a, Slot::B),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Basic { op, .. } => op.mnemonic(),
            Instruction::Extended { op, .. } => op.mnemonic(),
        }
    }

    /// Operands in evaluation order.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        let (a, b) = match self {
            Instruction::Basic { a, b, .. } => (a, Some(b)),
            Instruction::Extended { a, .. } => (a, None),
        };
        std::iter::once(a).chain(b)
    }

    /// Length in words, including inline operand words.
    pub fn len(&self) -> usize {
        1 + self.operands().filter(|op| op.mode().uses_next_word()).count()
    }

    /// Process the operands in order (a, then b), then apply.
    pub fn execute(&mut self, regs: &mut Registers, mem: &mut Memory) -> Result<Outcome, CpuError> {
        match self {
            Instruction::Basic { a, b, .. } => {
                a.process(regs, mem);
                b.process(regs, mem);
            }
            Instruction::Extended { a, .. } => a.process(regs, mem),
        }
        self.apply(regs, mem)
    }

    /// Skip this instruction: consume inline words and nothing else.
    pub fn no_op(&mut self, regs: &mut Registers, mem: &Memory) {
        match self {
            Instruction::Basic { a, b, .. } => {
                a.no_op(regs, mem);
                b.no_op(regs, mem);
            }
            Instruction::Extended { a, .. } => a.no_op(regs, mem),
        }
    }

    fn apply(&mut self, regs: &mut Registers, mem: &mut Memory) -> Result<Outcome, CpuError> {
        match self {
            Instruction::Basic { op: Opcode::Set, a, b } => {
                let value = b.read(regs, mem)?;
                a.write(regs, mem, value)?;
            }

            // ==================== Conditionals ====================
            Instruction::Basic { op, a, b } if op.is_conditional() => {
                let x = a.read(regs, mem)?;
                let y = b.read(regs, mem)?;
                let holds = match op {
                    Opcode::Ife => x == y,
                    Opcode::Ifn => x != y,
                    Opcode::Ifg => x > y,
                    _ => x & y != 0,
                };
                if !holds {
                    return Ok(Outcome::SkipNext);
                }
            }

            // ==================== Arithmetic / Bitwise ====================
            Instruction::Basic { op, a, b } => {
                let x = a.read(regs, mem)?;
                let y = b.read(regs, mem)?;
                let (value, overflow) = alu(*op, x, y);
                a.write(regs, mem, value)?;
                if let Some(overflow) = overflow {
                    regs.set_overflow(overflow);
                }
            }

            // ==================== Extended ====================
            Instruction::Extended { op: ExtendedOpcode::Jsr, a } => {
                let target = a.read(regs, mem)?;
                let sp = regs.sp().wrapping_sub(1);
                regs.set_sp(sp);
                mem.write(sp, regs.pc());
                regs.jump(target);
            }
        }

        Ok(Outcome::Continue)
    }
}

/// Result and overflow register value of an arithmetic or bitwise
/// opcode. `None` leaves the overflow register alone.
pub fn alu(op: Opcode, a: Word, b: Word) -> (Word, Option<Word>) {
    let (a32, b32) = (u32::from(a), u32::from(b));
    match op {
        Opcode::Add => {
            let sum = a32 + b32;
            (sum as Word, Some(if sum > 0xFFFF { 0x0001 } else { 0 }))
        }
        Opcode::Sub => (a.wrapping_sub(b), Some(if a < b { 0xFFFF } else { 0 })),
        Opcode::Mul => {
            let product = a32 * b32;
            (product as Word, Some((product >> 16) as Word))
        }
        Opcode::Div => match b {
            0 => (0, Some(0)),
            _ => ((a32 / b32) as Word, Some(((a32 << 16) / b32) as Word)),
        },
        Opcode::Mod => match b {
            0 => (0, None),
            _ => (a % b, None),
        },
        Opcode::Shl => {
            let shifted = u64::from(a).checked_shl(u32::from(b)).unwrap_or(0);
            (shifted as Word, Some((shifted >> 16) as Word))
        }
        Opcode::Shr => {
            let shifted = a32.checked_shr(u32::from(b)).unwrap_or(0);
            let overflow = (u64::from(a) << 16).checked_shr(u32::from(b)).unwrap_or(0);
            (shifted as Word, Some(overflow as Word))
        }
        Opcode::And => (a & b, None),
        Opcode::Bor => (a | b, None),
        Opcode::Xor => (a ^ b, None),
        // SET and the conditionals never reach the ALU.
        Opcode::Set => (b, None),
        Opcode::Ife | Opcode::Ifn | Opcode::Ifg | Opcode::Ifb => (a, None),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Basic { op, a, b } => write!(f, "{} {}, {}", op.mnemonic(), a, b),
            Instruction::Extended { op, a } => write!(f, "{} {}", op.mnemonic(), a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u8 = 0x00;
    const I: u8 = 0x06;
    const PUSH: u8 = 0x1A;
    const POP: u8 = 0x18;
    const NEXT: u8 = 0x1F;

    fn lit(value: u8) -> u8 {
        0x20 + value
    }

    fn run(instr: Instruction, regs: &mut Registers, mem: &mut Memory) -> Outcome {
        let mut instr = instr;
        instr.execute(regs, mem).unwrap()
    }

    #[test]
    fn test_opcode_table() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.code() as usize, i + 1);
            assert_eq!(Opcode::from_code(op.code()), Some(*op));
            assert_eq!(Opcode::from_mnemonic(&op.mnemonic().to_lowercase()), Some(*op));
        }
        assert_eq!(Opcode::from_code(0), None);
        assert_eq!(ExtendedOpcode::from_code(0x01), Some(ExtendedOpcode::Jsr));
        assert_eq!(ExtendedOpcode::from_code(0x02), None);
    }

    #[test]
    fn test_set_register_from_literal() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        run(Instruction::basic(Opcode::Set, I, lit(10)), &mut regs, &mut mem);
        assert_eq!(regs.read(I), 10);
    }

    #[test]
    fn test_set_next_word_advances_pc() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        mem.write(1, 0x0030);
        run(Instruction::basic(Opcode::Set, A, NEXT), &mut regs, &mut mem);
        assert_eq!(regs.read(A), 0x30);
        assert_eq!(regs.pc(), 1);
    }

    #[test]
    fn test_add_overflow() {
        assert_eq!(alu(Opcode::Add, 0x0004, 0xFFFF), (0x0003, Some(0x0001)));
        assert_eq!(alu(Opcode::Add, 1, 2), (3, Some(0)));
    }

    #[test]
    fn test_sub_underflow() {
        assert_eq!(alu(Opcode::Sub, 0x0004, 0xFFFF), (0x0005, Some(0xFFFF)));
        assert_eq!(alu(Opcode::Sub, 5, 5), (0, Some(0)));
    }

    #[test]
    fn test_mul_div_mod() {
        assert_eq!(alu(Opcode::Mul, 0x1000, 0x0020), (0x0000, Some(0x0002)));
        assert_eq!(alu(Opcode::Div, 7, 2), (3, Some(0x8000)));
        assert_eq!(alu(Opcode::Div, 7, 0), (0, Some(0)));
        assert_eq!(alu(Opcode::Mod, 7, 3), (1, None));
        assert_eq!(alu(Opcode::Mod, 7, 0), (0, None));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(alu(Opcode::Shl, 0x8001, 1), (0x0002, Some(0x0001)));
        assert_eq!(alu(Opcode::Shr, 0x0003, 1), (0x0001, Some(0x8000)));
        assert_eq!(alu(Opcode::Shl, 0xFFFF, 0xFFFF), (0, Some(0)));
        assert_eq!(alu(Opcode::Shr, 0xFFFF, 40), (0, Some(0)));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(alu(Opcode::And, 0b1100, 0b1010), (0b1000, None));
        assert_eq!(alu(Opcode::Bor, 0b1100, 0b1010), (0b1110, None));
        assert_eq!(alu(Opcode::Xor, 0b1100, 0b1010), (0b0110, None));
    }

    #[test]
    fn test_conditionals() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        let cases = [
            (Opcode::Ife, 1, Outcome::SkipNext),
            (Opcode::Ife, 0, Outcome::Continue),
            (Opcode::Ifn, 0, Outcome::SkipNext),
            (Opcode::Ifn, 1, Outcome::Continue),
            (Opcode::Ifg, 0, Outcome::SkipNext),
            (Opcode::Ifb, 1, Outcome::SkipNext),
        ];
        for (op, b, expected) in cases {
            // A is 0 throughout
            assert_eq!(run(Instruction::basic(op, A, lit(b)), &mut regs, &mut mem), expected);
        }

        regs.write(A, 3);
        assert_eq!(run(Instruction::basic(Opcode::Ifg, A, lit(2)), &mut regs, &mut mem), Outcome::Continue);
        assert_eq!(run(Instruction::basic(Opcode::Ifb, A, lit(2)), &mut regs, &mut mem), Outcome::Continue);
        assert_eq!(regs.read(A), 3);
    }

    #[test]
    fn test_stack_roundtrip() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        run(Instruction::basic(Opcode::Set, PUSH, lit(0x10)), &mut regs, &mut mem);
        assert_eq!(regs.sp(), 0xFFFF);
        run(Instruction::basic(Opcode::Set, I, POP), &mut regs, &mut mem);
        assert_eq!(regs.sp(), 0);
        assert_eq!(regs.read(I), 0x10);
    }

    #[test]
    fn test_add_to_pop_pops_once() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        regs.set_sp(0xFFFE);
        mem.write(0xFFFE, 1);
        run(Instruction::basic(Opcode::Add, POP, lit(1)), &mut regs, &mut mem);
        assert_eq!(mem.peek(0xFFFE), 2);
        assert_eq!(regs.sp(), 0xFFFF);
    }

    #[test]
    fn test_jsr() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        regs.set_pc(0x10);
        run(Instruction::extended(ExtendedOpcode::Jsr, lit(0x04)), &mut regs, &mut mem);
        assert_eq!(regs.sp(), 0xFFFF);
        assert_eq!(mem.peek(regs.sp()), 0x10);
        assert_eq!(regs.pc(), 0x04);
        assert!(regs.take_jump());
    }

    #[test]
    fn test_write_to_literal_faults_after_fetch() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        let mut instr = Instruction::basic(Opcode::Set, NEXT, lit(1));
        assert!(instr.execute(&mut regs, &mut mem).is_err());
        // The inline word was already consumed.
        assert_eq!(regs.pc(), 1);
    }

    #[test]
    fn test_no_op_consumes_both_inline_words() {
        let (mut regs, mut mem) = (Registers::new(), Memory::new());
        let mut instr = Instruction::basic(Opcode::Set, 0x1E, NEXT);
        instr.no_op(&mut regs, &mem);
        assert_eq!(regs.pc(), 2);
        assert_eq!(mem.peek(0), 0);
        assert_eq!(instr.len(), 3);
    }

    #[test]
    fn test_operands_in_evaluation_order() {
        let instr = Instruction::basic(Opcode::Set, PUSH, NEXT);
        let slots: Vec<Slot> = instr.operands().map(|op| op.slot()).collect();
        assert_eq!(slots, vec![Slot::A, Slot::B]);
        assert_eq!(instr.len(), 2);

        let jsr = Instruction::extended(ExtendedOpcode::Jsr, lit(4));
        let slots: Vec<Slot> = jsr.operands().map(|op| op.slot()).collect();
        assert_eq!(slots, vec![Slot::B]);
        assert_eq!(jsr.len(), 1);
    }

    #[test]
    fn test_display() {
        let instr = Instruction::basic(Opcode::Set, I, lit(10));
        assert_eq!(instr.to_string(), "SET I, 0x0a");
        let jsr = Instruction::extended(ExtendedOpcode::Jsr, lit(4));
        assert_eq!(jsr.to_string(), "JSR 0x04");
    }
}

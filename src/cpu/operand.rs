//! Operand addressing modes.
//!
//! Each instruction carries two 6-bit operand codes. A code resolves to
//! an [`AddressingMode`], and an [`Operand`] binds that mode to the
//! per-execution state it captures: the inline next word, the register
//! value for `[register + next word]`, and the stack address used by
//! `POP` and `PUSH`.
//!
//! | Code  | Mode                     |
//! |-------|--------------------------|
//! | 00-07 | register                 |
//! | 08-0f | `[register]`             |
//! | 10-17 | `[next word + register]` |
//! | 18    | `POP`                    |
//! | 19    | `PEEK`                   |
//! | 1a    | `PUSH`                   |
//! | 1b    | `SP`                     |
//! | 1c    | `PC`                     |
//! | 1d    | `O`                      |
//! | 1e    | `[next word]`            |
//! | 1f    | next word                |
//! | 20-3f | literal 0x00-0x1f        |

use super::execute::CpuError;
use super::{Memory, Register, Registers, Word};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which operand field a code came from.
///
/// Only the bit position differs; reads and writes behave the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Bits 4-9.
    A,
    /// Bits 10-15.
    B,
}

impl Slot {
    /// Bit offset of this slot's field within an instruction word.
    pub const fn shift(self) -> u32 {
        match self {
            Slot::A => 4,
            Slot::B => 10,
        }
    }
}

/// Direction of an operand access, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

/// How an operand locates its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    /// General register by index.
    Register(u8),
    /// `[register]`
    Indirect(u8),
    /// `[next word + register]`
    IndirectOffset(u8),
    /// `[SP++]`
    Pop,
    /// `[SP]`
    Peek,
    /// `[--SP]`
    Push,
    StackPointer,
    ProgramCounter,
    Overflow,
    /// `[next word]`
    IndirectNextWord,
    /// The next word itself.
    NextWord,
    /// A value 0x00-0x1f packed into the code.
    Literal(Word),
}

impl AddressingMode {
    /// Resolve a 6-bit operand code. Bits above the sixth are ignored.
    pub fn from_code(code: u8) -> Self {
        match code & 0x3F {
            reg @ 0x00..=0x07 => AddressingMode::Register(reg),
            code @ 0x08..=0x0F => AddressingMode::Indirect(code - 0x08),
            code @ 0x10..=0x17 => AddressingMode::IndirectOffset(code - 0x10),
            0x18 => AddressingMode::Pop,
            0x19 => AddressingMode::Peek,
            0x1A => AddressingMode::Push,
            0x1B => AddressingMode::StackPointer,
            0x1C => AddressingMode::ProgramCounter,
            0x1D => AddressingMode::Overflow,
            0x1E => AddressingMode::IndirectNextWord,
            0x1F => AddressingMode::NextWord,
            literal => AddressingMode::Literal(Word::from(literal - 0x20)),
        }
    }

    /// The 6-bit code for this mode.
    pub fn code(self) -> u8 {
        match self {
            AddressingMode::Register(reg) => reg & 0x07,
            AddressingMode::Indirect(reg) => 0x08 + (reg & 0x07),
            AddressingMode::IndirectOffset(reg) => 0x10 + (reg & 0x07),
            AddressingMode::Pop => 0x18,
            AddressingMode::Peek => 0x19,
            AddressingMode::Push => 0x1A,
            AddressingMode::StackPointer => 0x1B,
            AddressingMode::ProgramCounter => 0x1C,
            AddressingMode::Overflow => 0x1D,
            AddressingMode::IndirectNextWord => 0x1E,
            AddressingMode::NextWord => 0x1F,
            AddressingMode::Literal(value) => 0x20 + (value & 0x1F) as u8,
        }
    }

    /// Does this mode consume a word from the instruction stream?
    pub fn uses_next_word(self) -> bool {
        matches!(
            self,
            AddressingMode::IndirectOffset(_)
                | AddressingMode::IndirectNextWord
                | AddressingMode::NextWord
        )
    }

}

/// A resolved operand plus the state it captured for the current
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operand {
    mode: AddressingMode,
    slot: Slot,
    /// Inline word fetched by `process`.
    next_word: Word,
    /// Register value captured by `process` for `[next word + register]`.
    register_value: Word,
    /// Stack address claimed by the first `POP`/`PUSH` access.
    stack_address: Option<Word>,
}

impl Operand {
    /// Resolve `code` found in `slot`.
    pub fn new(code: u8, slot: Slot) -> Self {
        Self {
            mode: AddressingMode::from_code(code),
            slot,
            next_word: 0,
            register_value: 0,
            stack_address: None,
        }
    }

    #[inline]
    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    #[inline]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.mode.code()
    }

    /// This operand's code shifted into its field of an instruction word.
    #[inline]
    pub fn packed(&self) -> Word {
        Word::from(self.code()) << self.slot.shift()
    }

    /// The inline word captured by the last `process` or `no_op`.
    #[inline]
    pub fn next_word(&self) -> Word {
        self.next_word
    }

    /// Fill in the inline word without touching a machine (disassembly).
    pub fn with_next_word(mut self, word: Word) -> Self {
        self.next_word = word;
        self
    }

    /// Per-execution setup. Must run before `read`/`write`.
    ///
    /// Modes with an inline word advance PC and fetch the word at the
    /// new PC; `[next word + register]` also captures the register now.
    pub fn process(&mut self, regs: &mut Registers, mem: &mut Memory) {
        self.stack_address = None;
        if self.mode.uses_next_word() {
            let pc = regs.advance_pc();
            self.next_word = mem.read(pc);
        }
        if let AddressingMode::IndirectOffset(reg) = self.mode {
            self.register_value = regs.read(reg);
        }
    }

    /// Setup for an instruction that is being skipped.
    ///
    /// Advances PC past the inline word exactly as `process` would and
    /// changes nothing else.
    pub fn no_op(&mut self, regs: &mut Registers, mem: &Memory) {
        self.stack_address = None;
        if self.mode.uses_next_word() {
            let pc = regs.advance_pc();
            self.next_word = mem.peek(pc);
        }
    }

    /// Read the addressed value.
    pub fn read(&mut self, regs: &mut Registers, mem: &mut Memory) -> Result<Word, CpuError> {
        let value = match self.mode {
            AddressingMode::Register(reg) => regs.read(reg),
            AddressingMode::Indirect(reg) => mem.read(regs.read(reg)),
            AddressingMode::IndirectOffset(_) => mem.read(self.offset_address()),
            AddressingMode::Pop => {
                let addr = self.pop_address(regs);
                mem.read(addr)
            }
            AddressingMode::Peek => mem.read(regs.sp()),
            AddressingMode::Push => return Err(self.invalid(Access::Read)),
            AddressingMode::StackPointer => regs.sp(),
            AddressingMode::ProgramCounter => regs.pc(),
            AddressingMode::Overflow => regs.overflow(),
            AddressingMode::IndirectNextWord => mem.read(self.next_word),
            AddressingMode::NextWord => self.next_word,
            AddressingMode::Literal(value) => value,
        };
        Ok(value)
    }

    /// Store into the addressed location.
    ///
    /// Writing `PC` is a jump.
    pub fn write(&mut self, regs: &mut Registers, mem: &mut Memory, value: Word) -> Result<(), CpuError> {
        match self.mode {
            AddressingMode::Register(reg) => regs.write(reg, value),
            AddressingMode::Indirect(reg) => mem.write(regs.read(reg), value),
            AddressingMode::IndirectOffset(_) => mem.write(self.offset_address(), value),
            AddressingMode::Pop => {
                let addr = self.pop_address(regs);
                mem.write(addr, value);
            }
            AddressingMode::Peek => mem.write(regs.sp(), value),
            AddressingMode::Push => {
                let addr = self.push_address(regs);
                mem.write(addr, value);
            }
            AddressingMode::StackPointer => regs.set_sp(value),
            AddressingMode::ProgramCounter => regs.jump(value),
            AddressingMode::Overflow => regs.set_overflow(value),
            AddressingMode::IndirectNextWord => mem.write(self.next_word, value),
            AddressingMode::NextWord | AddressingMode::Literal(_) => {
                return Err(self.invalid(Access::Write))
            }
        }
        Ok(())
    }

    fn offset_address(&self) -> Word {
        self.next_word.wrapping_add(self.register_value)
    }

    /// `[SP++]`, claimed once per execution.
    fn pop_address(&mut self, regs: &mut Registers) -> Word {
        *self.stack_address.get_or_insert_with(|| {
            let sp = regs.sp();
            regs.set_sp(sp.wrapping_add(1));
            sp
        })
    }

    /// `[--SP]`, claimed once per execution.
    fn push_address(&mut self, regs: &mut Registers) -> Word {
        *self.stack_address.get_or_insert_with(|| {
            let sp = regs.sp().wrapping_sub(1);
            regs.set_sp(sp);
            sp
        })
    }

    fn invalid(&self, access: Access) -> CpuError {
        CpuError::InvalidOperation {
            mode: self.mode,
            access,
        }
    }
}

impl fmt::Display for Operand {
    /// Assembler syntax, using the captured inline word.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = |index: u8| Register::GENERAL[(index & 0x07) as usize];
        match self.mode {
            AddressingMode::Register(r) => write!(f, "{}", reg(r)),
            AddressingMode::Indirect(r) => write!(f, "[{}]", reg(r)),
            AddressingMode::IndirectOffset(r) => write!(f, "[0x{:04x}+{}]", self.next_word, reg(r)),
            AddressingMode::Pop => f.write_str("POP"),
            AddressingMode::Peek => f.write_str("PEEK"),
            AddressingMode::Push => f.write_str("PUSH"),
            AddressingMode::StackPointer => f.write_str("SP"),
            AddressingMode::ProgramCounter => f.write_str("PC"),
            AddressingMode::Overflow => f.write_str("O"),
            AddressingMode::IndirectNextWord => write!(f, "[0x{:04x}]", self.next_word),
            AddressingMode::NextWord => write!(f, "0x{:04x}", self.next_word),
            AddressingMode::Literal(value) => write!(f, "0x{:02x}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (Registers, Memory) {
        (Registers::new(), Memory::new())
    }

    #[test]
    fn test_code_roundtrip() {
        for code in 0..0x40u8 {
            assert_eq!(AddressingMode::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_mode_catalogue() {
        assert_eq!(AddressingMode::from_code(0x06), AddressingMode::Register(6));
        assert_eq!(AddressingMode::from_code(0x0F), AddressingMode::Indirect(7));
        assert_eq!(AddressingMode::from_code(0x16), AddressingMode::IndirectOffset(6));
        assert_eq!(AddressingMode::from_code(0x1C), AddressingMode::ProgramCounter);
        assert_eq!(AddressingMode::from_code(0x20), AddressingMode::Literal(0));
        assert_eq!(AddressingMode::from_code(0x3F), AddressingMode::Literal(0x1F));
    }

    #[test]
    fn test_process_fetches_next_word() {
        let (mut regs, mut mem) = machine();
        mem.write(1, 0x1234);

        let mut op = Operand::new(0x1F, Slot::B);
        op.process(&mut regs, &mut mem);

        assert_eq!(regs.pc(), 1);
        assert_eq!(op.read(&mut regs, &mut mem).unwrap(), 0x1234);
    }

    #[test]
    fn test_process_is_silent_for_registers() {
        let (mut regs, mut mem) = machine();
        for code in [0x00, 0x09, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x25] {
            let mut op = Operand::new(code, Slot::A);
            op.process(&mut regs, &mut mem);
        }
        assert_eq!(regs.pc(), 0);
        assert_eq!(regs.sp(), 0);
    }

    #[test]
    fn test_indirect_offset_wraps_and_captures_register() {
        let (mut regs, mut mem) = machine();
        mem.write(1, 0xFFFF);
        regs.write(6, 3); // I
        mem.write(0x0002, 0xAAAA);

        let mut op = Operand::new(0x16, Slot::A);
        op.process(&mut regs, &mut mem);
        // Changing I after process does not move the target.
        regs.write(6, 100);

        assert_eq!(op.read(&mut regs, &mut mem).unwrap(), 0xAAAA);
    }

    #[test]
    fn test_pop_moves_sp_once_per_execution() {
        let (mut regs, mut mem) = machine();
        regs.set_sp(0xFFFE);
        mem.write(0xFFFE, 5);

        let mut op = Operand::new(0x18, Slot::A);
        op.process(&mut regs, &mut mem);
        let value = op.read(&mut regs, &mut mem).unwrap();
        op.write(&mut regs, &mut mem, value + 1).unwrap();

        assert_eq!(regs.sp(), 0xFFFF);
        assert_eq!(mem.peek(0xFFFE), 6);
    }

    #[test]
    fn test_push_and_peek() {
        let (mut regs, mut mem) = machine();
        let mut push = Operand::new(0x1A, Slot::A);
        push.process(&mut regs, &mut mem);
        push.write(&mut regs, &mut mem, 0x10).unwrap();
        assert_eq!(regs.sp(), 0xFFFF);

        let mut peek = Operand::new(0x19, Slot::B);
        peek.process(&mut regs, &mut mem);
        assert_eq!(peek.read(&mut regs, &mut mem).unwrap(), 0x10);
        peek.write(&mut regs, &mut mem, 0x11).unwrap();
        assert_eq!(mem.peek(0xFFFF), 0x11);
        assert_eq!(regs.sp(), 0xFFFF);
    }

    #[test]
    fn test_push_cannot_be_read() {
        let (mut regs, mut mem) = machine();
        let mut op = Operand::new(0x1A, Slot::B);
        op.process(&mut regs, &mut mem);
        assert!(matches!(
            op.read(&mut regs, &mut mem),
            Err(CpuError::InvalidOperation { mode: AddressingMode::Push, access: Access::Read })
        ));
        assert_eq!(regs.sp(), 0);
    }

    #[test]
    fn test_literals_are_read_only() {
        let (mut regs, mut mem) = machine();
        for code in [0x1F, 0x20, 0x3F] {
            let mut op = Operand::new(code, Slot::A);
            op.process(&mut regs, &mut mem);
            assert!(op.write(&mut regs, &mut mem, 1).is_err());
        }
    }

    #[test]
    fn test_pc_write_is_a_jump() {
        let (mut regs, mut mem) = machine();
        let mut op = Operand::new(0x1C, Slot::A);
        op.process(&mut regs, &mut mem);
        op.write(&mut regs, &mut mem, 0x40).unwrap();
        assert_eq!(regs.pc(), 0x40);
        assert!(regs.take_jump());
    }

    #[test]
    fn test_no_op_only_consumes_words() {
        let (mut regs, mut mem) = machine();
        regs.set_sp(0x100);
        mem.write(1, 0x9000);
        mem.write(0x9000, 0x41);

        for code in [0x18, 0x1A, 0x1E] {
            let mut op = Operand::new(code, Slot::A);
            op.no_op(&mut regs, &mem);
        }

        assert_eq!(regs.pc(), 1);
        assert_eq!(regs.sp(), 0x100);
        assert_eq!(mem.peek(0x9000), 0x41);
    }

    #[test]
    fn test_display() {
        assert_eq!(Operand::new(0x16, Slot::A).with_next_word(0x2000).to_string(), "[0x2000+I]");
        assert_eq!(Operand::new(0x08, Slot::B).to_string(), "[A]");
        assert_eq!(Operand::new(0x1F, Slot::B).with_next_word(0x30).to_string(), "0x0030");
        assert_eq!(Operand::new(0x2A, Slot::B).to_string(), "0x0a");
    }

    #[test]
    fn test_packed_into_slot() {
        assert_eq!(Operand::new(0x1F, Slot::A).packed(), 0x01F0);
        assert_eq!(Operand::new(0x1F, Slot::B).packed(), 0x7C00);
        assert_eq!(Operand::new(0x06, Slot::A).packed() | Operand::new(0x2A, Slot::B).packed() | 0x1, 0xA861);
    }
}

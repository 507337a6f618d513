//! DCPU-16 registers.
//!
//! The DCPU-16 has 11 sixteen-bit registers:
//! - A, B, C, X, Y, Z, I, J: general purpose (indices 0-7)
//! - PC: program counter
//! - SP: stack pointer
//! - O: overflow

use super::observer::Observers;
use super::Word;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A register name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    B,
    C,
    X,
    Y,
    Z,
    I,
    J,
    Pc,
    Sp,
    O,
}

impl Register {
    /// The general registers in encoding order.
    pub const GENERAL: [Register; 8] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
    ];

    /// General register for an index 0-7.
    pub fn general(index: u8) -> Option<Self> {
        Self::GENERAL.get(index as usize).copied()
    }

    /// Index used in operand codes, for general registers only.
    pub fn index(self) -> Option<u8> {
        Self::GENERAL.iter().position(|&r| r == self).map(|i| i as u8)
    }

    /// Parse an assembler register name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let reg = match name.to_ascii_uppercase().as_str() {
            "A" => Register::A,
            "B" => Register::B,
            "C" => Register::C,
            "X" => Register::X,
            "Y" => Register::Y,
            "Z" => Register::Z,
            "I" => Register::I,
            "J" => Register::J,
            "PC" => Register::Pc,
            "SP" => Register::Sp,
            "O" => Register::O,
            _ => return None,
        };
        Some(reg)
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::X => "X",
            Register::Y => "Y",
            Register::Z => "Z",
            Register::I => "I",
            Register::J => "J",
            Register::Pc => "PC",
            Register::Sp => "SP",
            Register::O => "O",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A register change announcement. `WillChange` precedes the mutation,
/// `DidChange` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterEvent {
    WillChange { register: Register, value: Word },
    DidChange { register: Register, value: Word },
    /// Every register was zeroed.
    Reset,
}

/// The DCPU-16 register file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Registers {
    /// A, B, C, X, Y, Z, I, J
    general: [Word; 8],

    /// Program counter
    pc: Word,

    /// Stack pointer. Starts at 0, so the first push lands on 0xFFFF.
    sp: Word,

    /// Overflow: carry, borrow, or the high word of a product/quotient.
    o: Word,

    /// Set by [`Registers::jump`] so the execution loop can tell an
    /// explicit PC write from operand fetches.
    #[serde(skip)]
    jumped: bool,

    #[serde(skip)]
    observers: Observers<RegisterEvent>,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a change callback.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&RegisterEvent) + 'static,
    {
        self.observers.subscribe(callback);
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.general = [0; 8];
        self.pc = 0;
        self.sp = 0;
        self.o = 0;
        self.jumped = false;
        self.observers.notify(&RegisterEvent::Reset);
    }

    /// Read a general register by index.
    ///
    /// # Panics
    /// Panics if `index` is not 0-7. Operand decoding never produces one.
    #[inline]
    pub fn read(&self, index: u8) -> Word {
        self.general[index as usize]
    }

    /// Write a general register by index.
    ///
    /// # Panics
    /// Panics if `index` is not 0-7.
    pub fn write(&mut self, index: u8, value: Word) {
        let register = Register::GENERAL[index as usize];
        self.notify_around(register, value, |regs| regs.general[index as usize] = value);
    }

    /// Read any register by name.
    pub fn get(&self, register: Register) -> Word {
        match register {
            Register::Pc => self.pc,
            Register::Sp => self.sp,
            Register::O => self.o,
            general => self.general[general.index().unwrap_or_default() as usize],
        }
    }

    /// Write any register by name.
    pub fn set(&mut self, register: Register, value: Word) {
        match register {
            Register::Pc => self.set_pc(value),
            Register::Sp => self.set_sp(value),
            Register::O => self.set_overflow(value),
            general => self.write(general.index().unwrap_or_default(), value),
        }
    }

    #[inline]
    pub fn pc(&self) -> Word {
        self.pc
    }

    /// Set the program counter without marking it as a jump.
    pub fn set_pc(&mut self, value: Word) {
        self.notify_around(Register::Pc, value, |regs| regs.pc = value);
    }

    /// Increment the program counter by 1 (wrapping).
    /// Returns the new value.
    pub fn advance_pc(&mut self) -> Word {
        let next = self.pc.wrapping_add(1);
        self.set_pc(next);
        next
    }

    /// Set the program counter as the effect of an instruction.
    ///
    /// The execution loop does not auto-increment PC after an
    /// instruction that jumped.
    pub fn jump(&mut self, addr: Word) {
        self.set_pc(addr);
        self.jumped = true;
    }

    /// Has PC been written by an instruction since the last call?
    /// Clears the flag.
    pub fn take_jump(&mut self) -> bool {
        std::mem::take(&mut self.jumped)
    }

    #[inline]
    pub fn sp(&self) -> Word {
        self.sp
    }

    pub fn set_sp(&mut self, value: Word) {
        self.notify_around(Register::Sp, value, |regs| regs.sp = value);
    }

    #[inline]
    pub fn overflow(&self) -> Word {
        self.o
    }

    pub fn set_overflow(&mut self, value: Word) {
        self.notify_around(Register::O, value, |regs| regs.o = value);
    }

    /// All eleven registers with their values, general registers first.
    pub fn snapshot(&self) -> Vec<(Register, Word)> {
        Register::GENERAL
            .iter()
            .chain(&[Register::Pc, Register::Sp, Register::O])
            .map(|&r| (r, self.get(r)))
            .collect()
    }

    fn notify_around(&mut self, register: Register, value: Word, mutate: impl FnOnce(&mut Self)) {
        self.observers.notify(&RegisterEvent::WillChange { register, value });
        mutate(self);
        self.observers.notify(&RegisterEvent::DidChange { register, value });
    }
}

//! CPU emulation for the DCPU-16.
//!
//! This module implements the complete DCPU-16 (v1.1) architecture:
//! - 65536 sixteen-bit words of memory with video and keyboard windows
//! - 8 general registers plus PC, SP and O (overflow)
//! - 15 basic opcodes, JSR, and 64 operand codes across 12 addressing modes

pub mod observer;
pub mod memory;
pub mod registers;
pub mod operand;
pub mod instruction;
pub mod decode;
pub mod execute;

/// The machine's native cell width.
pub type Word = u16;

pub use observer::Observers;
pub use memory::{Memory, MemoryError, MemoryEvent};
pub use registers::{Register, RegisterEvent, Registers};
pub use operand::{Access, AddressingMode, Operand, Slot};
pub use instruction::{ExtendedOpcode, Instruction, Opcode, Outcome};
pub use decode::{decode, encode, encode_extended, Decoder};
pub use execute::{Cpu, CpuError, CpuState};

//! # DCPU-16 Emulator
//!
//! An emulator and assembler for the DCPU-16, a 16-bit register machine
//! with word-addressed memory, a downward-growing stack and
//! memory-mapped video and keyboard windows.
//!
//! ```
//! use dcpu::{assemble, Cpu};
//!
//! let program = assemble("SET A, 0x30\nADD A, 0x12").unwrap();
//! let mut cpu = Cpu::new();
//! cpu.load_program(&program).unwrap();
//! cpu.run().unwrap();
//! assert_eq!(cpu.read_register(0), 0x42);
//! ```

pub mod cpu;
pub mod asm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, CpuState, Instruction, Memory, MemoryEvent, Register, RegisterEvent, Registers, Word};
pub use asm::{assemble, disassemble, load_program_file, save_program_file, AssemblerError, ProgramError};

//! Assembler and disassembler for DCPU-16 programs.
//!
//! This module provides:
//! - A lexer and two-pass assembler (text -> program words)
//! - A disassembler (program words -> readable text)
//! - The binary program image format (big-endian words)

pub mod lexer;
pub mod assembler;
pub mod disasm;
pub mod program;

pub use assembler::{assemble, parse, AssemblerError, Statement};
pub use disasm::{disassemble, disassemble_instruction};
pub use program::{load_program_file, save_program_file, ProgramError};

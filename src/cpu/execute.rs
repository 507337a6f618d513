//! CPU execution engine for the DCPU-16.
//!
//! Implements the fetch-decode-execute cycle, the conditional skip state
//! and the halt sentinel.

use crate::asm::program::{self, ProgramError};
use crate::cpu::decode::Decoder;
use crate::cpu::instruction::{Instruction, Outcome};
use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use crate::cpu::operand::{Access, AddressingMode};
use crate::cpu::{Memory, Register, Registers, Word};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// The word at PC is the halt sentinel.
    Halted,
}

/// The DCPU-16 CPU.
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions fetched so far, skipped ones included.
    pub cycles: u64,
    /// A failed IF: the next instruction is decoded but not applied.
    skip_pending: bool,
    decoder: Decoder,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            skip_pending: false,
            decoder: Decoder::new(),
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        tracing::debug!("resetting cpu");
        self.regs.reset();
        self.mem.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.skip_pending = false;
    }

    /// Reset, then load a program at address 0.
    pub fn load_program(&mut self, program: &[Word]) -> Result<(), CpuError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE,
            }
            .into());
        }

        self.reset();
        self.mem.load(program)?;
        tracing::debug!(words = program.len(), "program loaded");
        Ok(())
    }

    /// Load a big-endian binary image.
    ///
    /// Nothing is touched when the image is malformed.
    pub fn load_program_bytes(&mut self, bytes: &[u8]) -> Result<(), CpuError> {
        let words = program::from_bytes(bytes)?;
        self.load_program(&words)
    }

    /// Fetch, decode and execute (or skip) one instruction.
    ///
    /// Returns the instruction, or `None` when PC points at the halt
    /// sentinel.
    pub fn step(&mut self) -> Result<Option<Instruction>, CpuError> {
        // Fetch
        let pc = self.regs.pc();
        let raw = self.mem.read(pc);

        // Decode
        let Some(mut instr) = self.decoder.decode(raw) else {
            tracing::debug!(pc, raw, cycles = self.cycles, "halted");
            self.state = CpuState::Halted;
            return Ok(None);
        };
        self.state = CpuState::Running;
        self.regs.take_jump();

        // Execute
        if self.skip_pending {
            instr.no_op(&mut self.regs, &self.mem);
            self.skip_pending = false;
            tracing::trace!(pc, raw, "skip {}", instr);
        } else {
            let outcome = instr.execute(&mut self.regs, &mut self.mem).map_err(|e| {
                tracing::warn!(pc, raw, "fault in {}: {}", instr, e);
                e
            })?;
            self.skip_pending = outcome == Outcome::SkipNext;
            tracing::trace!(pc, raw, "exec {}", instr);
        }

        // Advance unless the instruction jumped
        if !self.regs.take_jump() {
            self.regs.advance_pc();
        }

        self.cycles += 1;

        Ok(Some(instr))
    }

    /// Execute one instruction. Returns `false` once the halt sentinel
    /// is reached.
    pub fn execute_next(&mut self) -> Result<bool, CpuError> {
        self.step().map(|instr| instr.is_some())
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.execute_next()? {}

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.cycles < limit && self.execute_next()? {}

        Ok(self.cycles - start_cycles)
    }

    /// Read memory as the CPU would (keyboard cells are consumed).
    pub fn read_memory(&mut self, addr: Word) -> Word {
        self.mem.read(addr)
    }

    pub fn write_memory(&mut self, addr: Word, value: Word) {
        self.mem.write(addr, value);
    }

    /// Read a general register, 0-7.
    pub fn read_register(&self, index: u8) -> Word {
        self.regs.read(index)
    }

    /// Write a general register, 0-7.
    pub fn write_register(&mut self, index: u8, value: Word) {
        self.regs.write(index, value);
    }

    pub fn register(&self, register: Register) -> Word {
        self.regs.get(register)
    }

    pub fn pc(&self) -> Word {
        self.regs.pc()
    }

    pub fn set_pc(&mut self, value: Word) {
        self.regs.set_pc(value);
    }

    pub fn sp(&self) -> Word {
        self.regs.sp()
    }

    pub fn set_sp(&mut self, value: Word) {
        self.regs.set_sp(value);
    }

    pub fn overflow(&self) -> Word {
        self.regs.overflow()
    }

    pub fn set_overflow(&mut self, value: Word) {
        self.regs.set_overflow(value);
    }

    /// Queue a key in the keyboard ring. `false` if the ring is full or
    /// the key is 0.
    pub fn press_key(&mut self, key: Word) -> bool {
        self.mem.push_key(key)
    }

    /// Will the next instruction be skipped?
    pub fn skip_pending(&self) -> bool {
        self.skip_pending
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("skip_pending", &self.skip_pending)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// An operand was used in a direction its mode does not support.
    #[error("invalid operation: cannot {access} through {mode:?}")]
    InvalidOperation { mode: AddressingMode, access: Access },

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("program error: {0}")]
    ProgramError(#[from] ProgramError),
}

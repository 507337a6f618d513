//! DCPU-16 memory subsystem.
//!
//! 65536 sixteen-bit words, word addressed. Two windows carry extra
//! behavior: the video window announces its writes separately so a host
//! can redraw the screen, and the keyboard window is a one-shot key
//! buffer that clears a cell as soon as the program reads it.

use super::observer::Observers;
use super::Word;
use thiserror::Error;

/// The number of words in memory.
pub const MEMORY_SIZE: usize = 0x1_0000;

/// First word of the video text window.
pub const VIDEO_START: Word = 0x8000;
/// Last word of the video text window (32 x 12 cells).
pub const VIDEO_END: Word = 0x817F;
/// Character set window. Plain RAM as far as the CPU is concerned.
pub const CHARSET_START: Word = 0x8180;
pub const CHARSET_END: Word = 0x827F;
/// Miscellaneous video registers (border colour). Plain RAM.
pub const MISC_VIDEO_START: Word = 0x8280;
/// First word of the keyboard ring.
pub const KEYBOARD_START: Word = 0x9000;
/// Last word of the keyboard ring.
pub const KEYBOARD_END: Word = 0x900F;

/// Is `addr` inside the video text window?
#[inline]
pub fn is_video(addr: Word) -> bool {
    (VIDEO_START..=VIDEO_END).contains(&addr)
}

/// Is `addr` inside the keyboard window?
#[inline]
pub fn is_keyboard(addr: Word) -> bool {
    (KEYBOARD_START..=KEYBOARD_END).contains(&addr)
}

/// A memory change announcement.
///
/// For a single write the order is always `WillChange`, then the
/// mutation, then `VideoChanged` or `KeyboardChanged` when the address
/// is in one of those windows, then `DidChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEvent {
    WillChange { addr: Word, value: Word },
    VideoChanged { addr: Word, value: Word },
    KeyboardChanged { addr: Word, value: Word },
    DidChange { addr: Word, value: Word },
    /// Fired once per word by [`Memory::load`], after that word's write.
    Loaded { addr: Word, value: Word },
    /// The whole store was zeroed.
    Reset,
}

/// DCPU-16 memory: 65536 words.
pub struct Memory {
    cells: Vec<Word>,
    observers: Observers<MemoryEvent>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
            observers: Observers::new(),
        }
    }

    /// Register a change callback.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&MemoryEvent) + 'static,
    {
        self.observers.subscribe(callback);
    }

    /// Read a word as the CPU does.
    ///
    /// Reading a keyboard cell consumes it: the stored key is returned
    /// and the cell is written back to 0, with the usual notifications.
    pub fn read(&mut self, addr: Word) -> Word {
        let value = self.cells[addr as usize];
        if is_keyboard(addr) {
            self.write(addr, 0);
        }
        value
    }

    /// Read a word without any side effect.
    #[inline]
    pub fn peek(&self, addr: Word) -> Word {
        self.cells[addr as usize]
    }

    /// Write a word, notifying observers around the mutation.
    pub fn write(&mut self, addr: Word, value: Word) {
        self.observers.notify(&MemoryEvent::WillChange { addr, value });
        self.cells[addr as usize] = value;
        if is_video(addr) {
            self.observers.notify(&MemoryEvent::VideoChanged { addr, value });
        } else if is_keyboard(addr) {
            self.observers.notify(&MemoryEvent::KeyboardChanged { addr, value });
        }
        self.observers.notify(&MemoryEvent::DidChange { addr, value });
    }

    /// Zero the entire store.
    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = 0);
        self.observers.notify(&MemoryEvent::Reset);
    }

    /// Reset, then copy `program` in starting at address 0.
    ///
    /// Memory is left untouched when the program does not fit.
    pub fn load(&mut self, program: &[Word]) -> Result<(), MemoryError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE,
            });
        }

        self.reset();
        for (addr, &value) in (0..=Word::MAX).zip(program) {
            self.write(addr, value);
            self.observers.notify(&MemoryEvent::Loaded { addr, value });
        }

        Ok(())
    }

    /// Store a key code in the first free keyboard cell.
    ///
    /// Returns `false` when all sixteen cells still hold unread keys, or
    /// for key 0, which marks an empty cell and could never be read back.
    pub fn push_key(&mut self, key: Word) -> bool {
        if key == 0 {
            return false;
        }
        match (KEYBOARD_START..=KEYBOARD_END).find(|&addr| self.peek(addr) == 0) {
            Some(addr) => {
                self.write(addr, key);
                true
            }
            None => false,
        }
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: Word, count: usize) -> Vec<(Word, Word)> {
        (start..=Word::MAX)
            .take(count)
            .map(|addr| (addr, self.peek(addr)))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero words
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_words", &non_zero)
            .field("total_words", &MEMORY_SIZE)
            .field("observers", &self.observers)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

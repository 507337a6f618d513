//! Binary program files.
//!
//! A program image is a flat sequence of words, each stored as two bytes
//! with the high byte first. Images start at address 0.

use crate::cpu::Word;
use std::path::Path;
use thiserror::Error;

/// Decode an image. The byte count must be even.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Word>, ProgramError> {
    if bytes.len() % 2 != 0 {
        return Err(ProgramError::OddLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| Word::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode words as an image.
pub fn to_bytes(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

/// Load a program image from disk.
pub fn load_program_file<P: AsRef<Path>>(path: P) -> Result<Vec<Word>, ProgramError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| ProgramError::IoError(e.to_string()))?;
    from_bytes(&bytes)
}

/// Save a program image to disk.
pub fn save_program_file<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), ProgramError> {
    std::fs::write(path.as_ref(), to_bytes(words)).map_err(|e| ProgramError::IoError(e.to_string()))
}

/// Errors that can occur while reading or writing program images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("program image has odd length {0}")]
    OddLength(usize),
}

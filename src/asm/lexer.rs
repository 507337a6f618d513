//! Tokenizer for DCPU-16 assembly.
//!
//! Statements are line oriented, so the lexer works one line at a time
//! and never produces newline tokens.

use super::assembler::AssemblerError;
use crate::cpu::Word;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Mnemonic, register, keyword or label name.
    Ident(String),
    Number(Word),
    /// Contents of a double-quoted string, escapes resolved.
    Str(String),
    Comma,
    LBracket,
    RBracket,
    Plus,
    Colon,
}

/// Tokenize one line. Everything after `;` is a comment.
pub fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AssemblerError> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ';' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(lex_string(&mut chars, line_num)?));
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphanumeric() && c != '_' {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Number(parse_number(&line[start..end], line_num)?));
            }
            c if is_ident_start(c) => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !is_ident_continue(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(line[start..end].to_string()));
            }
            other => {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("unexpected character '{}'", other),
                })
            }
        }
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parse a decimal, `0x` hex or `0b` binary literal that fits in a word.
fn parse_number(text: &str, line_num: usize) -> Result<Word, AssemblerError> {
    let lower = text.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else {
        lower.parse::<u32>()
    };

    let value = parsed.map_err(|_| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid number literal '{}'", text),
    })?;

    Word::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange {
        line: line_num,
        value: i64::from(value),
    })
}

fn lex_string<I>(chars: &mut std::iter::Peekable<I>, line_num: usize) -> Result<String, AssemblerError>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut out = String::new();
    loop {
        match chars.next() {
            Some((_, '"')) => return Ok(out),
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '0')) => out.push('\0'),
                Some((_, c @ ('\\' | '"'))) => out.push(c),
                Some((_, c)) => {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("unknown escape '\\{}'", c),
                    })
                }
                None => break,
            },
            Some((_, c)) => out.push(c),
            None => break,
        }
    }

    Err(AssemblerError::SyntaxError {
        line: line_num,
        message: "unterminated string".into(),
    })
}

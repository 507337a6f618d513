//! Two-pass assembler for DCPU-16 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! :loop   SET [0x2000+I], [A]   ; label, then instruction
//!         SUB I, 1
//!         IFN I, 0
//!             SET PC, loop
//!         JSR sub                ; extended instruction
//! done:   DAT "text", 0x20, 0    ; data words
//! ```
//!
//! Numbers 0-31 become short literals. Larger numbers and every label
//! reference take an inline word, so pass 1 fixes the final layout and
//! pass 2 only patches label addresses.

use super::lexer::{tokenize_line, Token};
use crate::cpu::decode::{encode, encode_extended};
use crate::cpu::{ExtendedOpcode, Opcode, Register, Word};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to program words.
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblerError> {
    let statements = parse(source)?;
    assemble_statements(&statements)
}

/// An immediate value: a number or a label's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(Word),
    Label(String),
}

/// An operand as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandExpr {
    /// A, B, C, X, Y, Z, I, J, PC, SP or O.
    Register(Register),
    Pop,
    Peek,
    Push,
    Immediate(Value),
    /// `[reg]`, `[value]` or `[value + reg]`.
    Indirect { offset: Option<Value>, register: Option<Register> },
}

/// One item of a `DAT` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Value(Value),
    /// One word per character.
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementBody {
    Instruction { mnemonic: String, operands: Vec<OperandExpr> },
    Data(Vec<DataItem>),
}

/// A parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub label: Option<String>,
    pub body: Option<StatementBody>,
}

/// Parse source text into statements, skipping blank lines.
pub fn parse(source: &str) -> Result<Vec<Statement>, AssemblerError> {
    let mut statements = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let tokens = tokenize_line(text, line)?;
        if tokens.is_empty() {
            continue;
        }
        statements.push(Parser { tokens: &tokens, pos: 0, line }.statement()?);
    }
    Ok(statements)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn statement(&mut self) -> Result<Statement, AssemblerError> {
        let label = self.label()?;

        let body = match self.next() {
            None => None,
            Some(Token::Ident(mnemonic)) if mnemonic.eq_ignore_ascii_case("DAT") => {
                Some(StatementBody::Data(self.data()?))
            }
            Some(Token::Ident(mnemonic)) => {
                let mnemonic = mnemonic.clone();
                let operands = self.operands()?;
                Some(StatementBody::Instruction { mnemonic, operands })
            }
            Some(other) => return Err(self.error(format!("expected mnemonic, found {:?}", other))),
        };

        Ok(Statement { line: self.line, label, body })
    }

    /// `:name` or `name:` at the start of a line.
    fn label(&mut self) -> Result<Option<String>, AssemblerError> {
        match (self.tokens.first(), self.tokens.get(1)) {
            (Some(Token::Colon), Some(Token::Ident(name))) | (Some(Token::Ident(name)), Some(Token::Colon)) => {
                self.pos = 2;
                Ok(Some(name.clone()))
            }
            (Some(Token::Colon), _) => Err(self.error("expected label name after ':'".into())),
            _ => Ok(None),
        }
    }

    fn operands(&mut self) -> Result<Vec<OperandExpr>, AssemblerError> {
        let mut operands = Vec::new();
        if self.peek().is_none() {
            return Ok(operands);
        }
        loop {
            operands.push(self.operand()?);
            match self.next() {
                None => return Ok(operands),
                Some(Token::Comma) => continue,
                Some(other) => return Err(self.error(format!("expected ',', found {:?}", other))),
            }
        }
    }

    fn operand(&mut self) -> Result<OperandExpr, AssemblerError> {
        match self.next() {
            Some(Token::LBracket) => self.indirect(),
            Some(Token::Number(n)) => Ok(OperandExpr::Immediate(Value::Number(*n))),
            Some(Token::Ident(name)) => Ok(match name.to_ascii_uppercase().as_str() {
                "POP" => OperandExpr::Pop,
                "PEEK" => OperandExpr::Peek,
                "PUSH" => OperandExpr::Push,
                _ => match Register::from_name(name) {
                    Some(reg) => OperandExpr::Register(reg),
                    None => OperandExpr::Immediate(Value::Label(name.clone())),
                },
            }),
            Some(other) => Err(self.error(format!("unexpected {:?} in operand", other))),
            None => Err(self.error("missing operand".into())),
        }
    }

    /// After `[`: `reg]`, `value]`, `value+reg]` or `reg+value]`.
    fn indirect(&mut self) -> Result<OperandExpr, AssemblerError> {
        let mut offset = None;
        let mut register = None;

        loop {
            match self.next() {
                Some(Token::Number(n)) if offset.is_none() => offset = Some(Value::Number(*n)),
                Some(Token::Ident(name)) => match Register::from_name(name) {
                    Some(reg) if register.is_none() => register = Some(reg),
                    Some(_) => return Err(self.error("only one register allowed in '[...]'".into())),
                    None if offset.is_none() => offset = Some(Value::Label(name.clone())),
                    None => return Err(self.error("only one offset allowed in '[...]'".into())),
                },
                Some(other) => return Err(self.error(format!("unexpected {:?} in '[...]'", other))),
                None => return Err(self.error("missing ']'".into())),
            }

            match self.next() {
                Some(Token::Plus) => continue,
                Some(Token::RBracket) => break,
                _ => return Err(self.error("expected '+' or ']'".into())),
            }
        }

        match (offset, register) {
            (None, Some(Register::Sp)) => Ok(OperandExpr::Peek),
            (_, Some(reg)) if reg.index().is_none() => {
                Err(self.error(format!("register {} cannot be used in '[...]'", reg)))
            }
            (offset, register) => Ok(OperandExpr::Indirect { offset, register }),
        }
    }

    fn data(&mut self) -> Result<Vec<DataItem>, AssemblerError> {
        let mut items = Vec::new();
        loop {
            let item = match self.next() {
                Some(Token::Number(n)) => DataItem::Value(Value::Number(*n)),
                Some(Token::Ident(name)) => DataItem::Value(Value::Label(name.clone())),
                Some(Token::Str(s)) => DataItem::Str(s.clone()),
                Some(other) => return Err(self.error(format!("unexpected {:?} in DAT", other))),
                None => return Err(self.error("DAT requires at least one value".into())),
            };
            items.push(item);

            match self.next() {
                None => return Ok(items),
                Some(Token::Comma) => continue,
                Some(other) => return Err(self.error(format!("expected ',', found {:?}", other))),
            }
        }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn error(&self, message: String) -> AssemblerError {
        AssemblerError::SyntaxError { line: self.line, message }
    }
}

/// Encode parsed statements. Pass 1 lays out words and records labels,
/// pass 2 patches label references.
pub fn assemble_statements(statements: &[Statement]) -> Result<Vec<Word>, AssemblerError> {
    let mut asm = Assembler::new();
    for statement in statements {
        asm.statement(statement)?;
    }
    asm.resolve_references()?;
    Ok(asm.output)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, Word>,
    /// Pending references (output index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output words.
    output: Vec<Word>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn statement(&mut self, statement: &Statement) -> Result<(), AssemblerError> {
        let line = statement.line;

        if let Some(label) = &statement.label {
            let addr = self.current_addr(line)?;
            if self.symbols.insert(label.clone(), addr).is_some() {
                return Err(AssemblerError::DuplicateLabel { line, label: label.clone() });
            }
        }

        match &statement.body {
            None => Ok(()),
            Some(StatementBody::Data(items)) => {
                for item in items {
                    match item {
                        DataItem::Value(value) => self.emit_value(value, line),
                        DataItem::Str(s) => {
                            for c in s.chars() {
                                let code = u32::from(c);
                                let word = Word::try_from(code).map_err(|_| {
                                    AssemblerError::ValueOutOfRange { line, value: i64::from(code) }
                                })?;
                                self.output.push(word);
                            }
                        }
                    }
                }
                Ok(())
            }
            Some(StatementBody::Instruction { mnemonic, operands }) => {
                self.instruction(mnemonic, operands, line)
            }
        }
    }

    fn instruction(&mut self, mnemonic: &str, operands: &[OperandExpr], line: usize) -> Result<(), AssemblerError> {
        let arity_error = |expected: usize| AssemblerError::WrongOperandCount {
            line,
            mnemonic: mnemonic.to_uppercase(),
            expected,
            found: operands.len(),
        };

        if let Some(op) = Opcode::from_mnemonic(mnemonic) {
            let [a, b] = operands else {
                return Err(arity_error(2));
            };
            let (a_code, a_next) = operand_code(a);
            let (b_code, b_next) = operand_code(b);
            self.output.push(encode(op, a_code, b_code));
            for next in [a_next, b_next].into_iter().flatten() {
                self.emit_value(&next, line);
            }
            Ok(())
        } else if let Some(op) = ExtendedOpcode::from_mnemonic(mnemonic) {
            let [a] = operands else {
                return Err(arity_error(1));
            };
            let (a_code, a_next) = operand_code(a);
            self.output.push(encode_extended(op, a_code));
            if let Some(next) = a_next {
                self.emit_value(&next, line);
            }
            Ok(())
        } else {
            Err(AssemblerError::UnknownMnemonic {
                line,
                mnemonic: mnemonic.to_string(),
            })
        }
    }

    fn emit_value(&mut self, value: &Value, line: usize) {
        match value {
            Value::Number(n) => self.output.push(*n),
            Value::Label(label) => {
                self.pending.push((self.output.len(), label.clone(), line));
                self.output.push(0); // Placeholder, resolved in pass 2
            }
        }
    }

    fn current_addr(&self, line: usize) -> Result<Word, AssemblerError> {
        Word::try_from(self.output.len()).map_err(|_| AssemblerError::ValueOutOfRange {
            line,
            value: self.output.len() as i64,
        })
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

/// Operand code plus the inline word it needs, if any.
fn operand_code(operand: &OperandExpr) -> (u8, Option<Value>) {
    match operand {
        OperandExpr::Register(reg) => match (reg, reg.index()) {
            (_, Some(index)) => (index, None),
            (Register::Sp, _) => (0x1B, None),
            (Register::Pc, _) => (0x1C, None),
            _ => (0x1D, None),
        },
        OperandExpr::Pop => (0x18, None),
        OperandExpr::Peek => (0x19, None),
        OperandExpr::Push => (0x1A, None),
        OperandExpr::Immediate(Value::Number(n)) if *n <= 0x1F => (0x20 + *n as u8, None),
        OperandExpr::Immediate(value) => (0x1F, Some(value.clone())),
        OperandExpr::Indirect { offset, register } => {
            let reg = register.and_then(Register::index);
            match (offset, reg) {
                (None, Some(index)) => (0x08 + index, None),
                (Some(value), Some(index)) => (0x10 + index, Some(value.clone())),
                (Some(value), None) => (0x1E, Some(value.clone())),
                // `[]` never leaves the parser.
                (None, None) => (0x1E, Some(Value::Number(0))),
            }
        }
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    WrongOperandCount { line: usize, mnemonic: String, expected: usize, found: usize },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}

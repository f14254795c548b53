//! Program text loader.
//!
//! Converts line-oriented source into a validated [`Program`] with all
//! labels resolved to instruction addresses. Loading is all-or-nothing:
//! any fault aborts with the offending line and no partial program.
//!
//! # Syntax
//!
//! ```text
//! label: MNEMONIC operand operand  # comment
//! ```
//!
//! - Mnemonics are uppercase (e.g. `PSH`, `ADD`)
//! - Registers use an `r` prefix (`r0`-`r7`)
//! - Literals are decimal integers (e.g. `42`, `-1`)
//! - Jump operands are label names, falling back to literal addresses
//! - A label may stand alone on a line or prefix an instruction
//! - Comments start with `#`
//!
//! Loading is two-pass: pass 1 records each label at the address of the
//! next instruction, pass 2 decodes operands against each opcode's
//! [`OperandMode`](crate::isa::OperandMode) and resolves jump targets, so
//! forward and backward references behave identically.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::errors::VmError;
use crate::isa::Opcode;
use crate::program::{Instruction, Operands, Program};
use crate::state::{REGISTER_COUNT, Value};

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column in the line.
    column: usize,
}

/// Splits a line into whitespace-separated tokens, dropping any comment.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let body = match line.find(COMMENT_CHAR) {
        Some(start) => &line[..start],
        None => line,
    };

    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in body.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &body[s..i],
                    column: s + 1,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &body[s..],
            column: s + 1,
        });
    }
    out
}

/// Checks if a token is a label definition (ends with `:`).
fn is_label_def(token: &str) -> bool {
    token.ends_with(LABEL_SUFFIX) && token.len() > 1
}

/// Extracts the label name from a label definition token.
fn label_name(token: &str) -> &str {
    &token[..token.len() - 1]
}

/// Parses a register token like `r0`..`r7`.
fn parse_reg(token: &str) -> Result<u8, VmError> {
    let digits = token
        .strip_prefix('r')
        .ok_or_else(|| VmError::ExpectedRegister {
            token: token.to_string(),
        })?;
    let index: u8 = digits.parse().map_err(|_| VmError::InvalidOperand {
        token: token.to_string(),
    })?;
    if (index as usize) < REGISTER_COUNT {
        Ok(index)
    } else {
        Err(VmError::RegisterOutOfRange {
            index: index as i64,
        })
    }
}

/// Parses a signed literal value.
fn parse_literal(token: &str) -> Result<Value, VmError> {
    token.parse().map_err(|_| VmError::InvalidOperand {
        token: token.to_string(),
    })
}

/// Parses a non-negative memory address literal.
fn parse_addr(token: &str) -> Result<u64, VmError> {
    let value = parse_literal(token)?;
    u64::try_from(value).map_err(|_| VmError::NegativeAddress { address: value })
}

/// Resolves a jump operand: a known label, or a literal address.
///
/// A target equal to `len` jumps past the last instruction and halts the
/// machine on the next step; anything beyond is rejected here.
fn resolve_target(token: &str, labels: &HashMap<String, usize>, len: usize) -> Result<usize, VmError> {
    let target = match labels.get(token) {
        Some(&address) => address,
        None => {
            let literal: i64 = token.parse().map_err(|_| VmError::UndefinedLabel {
                label: token.to_string(),
            })?;
            usize::try_from(literal)
                .map_err(|_| VmError::NegativeAddress { address: literal })?
        }
    };
    if target > len {
        return Err(VmError::JumpOutOfBounds { target, len });
    }
    Ok(target)
}

/// Decodes one instruction line against the opcode table.
fn decode(
    tokens: &[Token],
    labels: &HashMap<String, usize>,
    len: usize,
) -> Result<Instruction, (usize, VmError)> {
    let mnemonic = tokens[0];
    let opcode = Opcode::from_mnemonic(mnemonic.text).map_err(|e| (mnemonic.column, e))?;
    let operands = &tokens[1..];

    use crate::isa::OperandMode as Mode;
    let shape = match (opcode.mode(), operands) {
        (Mode::None, []) | (Mode::OptReg, []) | (Mode::DualReg, []) => Operands::None,
        (Mode::Value, [tok]) => {
            Operands::Value(parse_literal(tok.text).map_err(|e| (tok.column, e))?)
        }
        (Mode::Addr, [tok]) => Operands::Addr(parse_addr(tok.text).map_err(|e| (tok.column, e))?),
        (Mode::Target, [tok]) => {
            Operands::Target(resolve_target(tok.text, labels, len).map_err(|e| (tok.column, e))?)
        }
        (Mode::Reg, [tok]) | (Mode::OptReg, [tok]) => {
            Operands::Reg(parse_reg(tok.text).map_err(|e| (tok.column, e))?)
        }
        (Mode::RegPair, [a, b]) | (Mode::DualReg, [a, b]) => Operands::RegPair(
            parse_reg(a.text).map_err(|e| (a.column, e))?,
            parse_reg(b.text).map_err(|e| (b.column, e))?,
        ),
        (mode, _) => {
            return Err((
                mnemonic.column,
                VmError::ArityMismatch {
                    mnemonic: opcode.mnemonic(),
                    expected: mode.describe(),
                    actual: operands.len(),
                },
            ));
        }
    };

    Ok(Instruction {
        opcode,
        operands: shape,
    })
}

fn load_error(line: usize, column: usize, cause: VmError) -> VmError {
    VmError::LoadError {
        line,
        column,
        reason: cause.to_string(),
    }
}

/// Loads a program from source text.
pub fn load_source(source: &str) -> Result<Program, VmError> {
    // Pass 1: record labels, collect instruction token lines.
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut lines: Vec<(usize, Vec<Token>)> = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let mut tokens = tokenize(line);
        if let Some(&first) = tokens.first()
            && is_label_def(first.text)
        {
            let name = label_name(first.text);
            if labels.insert(name.to_string(), lines.len()).is_some() {
                return Err(load_error(
                    line_no,
                    first.column,
                    VmError::DuplicateLabel {
                        label: name.to_string(),
                    },
                ));
            }
            tokens.remove(0);
        }
        if !tokens.is_empty() {
            lines.push((line_no, tokens));
        }
    }

    // Pass 2: decode operands and resolve jump targets.
    let len = lines.len();
    let mut instructions = Vec::with_capacity(len);
    for (line_no, tokens) in &lines {
        let instruction =
            decode(tokens, &labels, len).map_err(|(column, e)| load_error(*line_no, column, e))?;
        instructions.push(instruction);
    }

    Ok(Program::new(instructions, labels))
}

/// Convenience: load a program directly from a file path.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Program, VmError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| VmError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_source(&source)
}

/// Formats a compiler-style diagnostic for a load fault.
pub fn render_diagnostic(file: &str, source: &str, err: &VmError) -> String {
    let VmError::LoadError {
        line,
        column,
        reason,
    } = err
    else {
        return format!("error: {err}");
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "error: {reason}");
    let _ = writeln!(diag, " --> {file}:{line}:{column}");

    if let Some(raw) = source.lines().nth(line.saturating_sub(1)) {
        let text = raw.trim_end_matches('\r');
        let underline = " ".repeat(column.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{line:>4} | {text}");
        let _ = writeln!(diag, "  | {underline}^");
    }

    diag
}

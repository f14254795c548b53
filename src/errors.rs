//! Load-time and run-time fault definitions.

use thiserror::Error;

/// Faults that stop loading or execution.
///
/// Load-time variants are wrapped in [`VmError::LoadError`] with the
/// offending source position before they reach a caller; run-time variants
/// put the engine into its terminal `Faulted` state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Unrecognized instruction mnemonic in source.
    #[error("unknown opcode {mnemonic}")]
    UnknownOpcode { mnemonic: String },
    /// Wrong number of operands for an opcode's mode.
    #[error("{mnemonic} expects {expected}, got {actual} operand(s)")]
    ArityMismatch {
        mnemonic: &'static str,
        expected: &'static str,
        actual: usize,
    },
    /// Expected a register operand (e.g. `r3`) but got something else.
    #[error("expected register, got {token}")]
    ExpectedRegister { token: String },
    /// Register index outside the 8-slot register file.
    #[error("register index {index} out of range (r0-r7)")]
    RegisterOutOfRange { index: i64 },
    /// Operand token that parses as neither a number nor what the opcode needs.
    #[error("invalid operand {token}")]
    InvalidOperand { token: String },
    /// Memory or jump address below zero.
    #[error("negative address {address}")]
    NegativeAddress { address: i64 },
    /// Label defined more than once.
    #[error("duplicate label {label}")]
    DuplicateLabel { label: String },
    /// Jump operand that is neither a known label nor a literal address.
    #[error("undefined label {label}")]
    UndefinedLabel { label: String },
    /// Jump target beyond the end of the program.
    #[error("jump target {target} outside program of {len} instruction(s)")]
    JumpOutOfBounds { target: usize, len: usize },
    /// Any load fault, with the source position it was found at.
    #[error("line {line}: {reason}")]
    LoadError {
        line: usize,
        column: usize,
        reason: String,
    },
    /// File I/O error while reading program text.
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    /// An opcode needed more stack values than were available.
    #[error("stack underflow: needed {needed} value(s), have {depth}")]
    StackUnderflow { needed: usize, depth: usize },
    /// The configurable stack safety bound was hit.
    #[error("stack overflow: limit of {limit} value(s) reached")]
    StackOverflow { limit: usize },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Console input that does not parse as a value.
    #[error("input is not a number: {input}")]
    MalformedInput { input: String },
    /// Console input ended before a value could be read.
    #[error("console input exhausted")]
    InputExhausted,
    /// `PRC` on a value outside the Unicode scalar range.
    #[error("value {code} is not a valid character code")]
    InvalidCharCode { code: i64 },
    /// Decoded operand shape does not match the opcode. Unreachable for
    /// programs produced by the loader.
    #[error("{mnemonic} decoded with malformed operands")]
    MalformedInstruction { mnemonic: &'static str },
}

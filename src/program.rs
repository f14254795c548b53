//! Decoded program representation.
//!
//! [`Program`] bundles the instruction sequence with its label table. It is
//! produced by the [`loader`](crate::loader) and never changes afterwards;
//! only [machine state](crate::state) mutates during a run.

use std::collections::HashMap;

use crate::errors::VmError;
use crate::isa::Opcode;
use crate::state::Value;

/// Validated operand payload attached to a decoded instruction.
///
/// The loader produces exactly the shape the opcode's
/// [`OperandMode`](crate::isa::OperandMode) allows, so the engine branches
/// on the shape and never re-parses tokens.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operands {
    /// No operands; stack-implicit forms.
    None,
    /// A literal value (`PSH`).
    Value(Value),
    /// A memory address (`STR`/`LOA`).
    Addr(u64),
    /// A resolved jump target.
    Target(usize),
    /// A single register index.
    Reg(u8),
    /// Two register indices, in source order.
    RegPair(u8, u8),
}

impl Operands {
    pub(crate) fn value(self, opcode: Opcode) -> Result<Value, VmError> {
        match self {
            Operands::Value(value) => Ok(value),
            _ => Err(malformed(opcode)),
        }
    }

    pub(crate) fn addr(self, opcode: Opcode) -> Result<u64, VmError> {
        match self {
            Operands::Addr(address) => Ok(address),
            _ => Err(malformed(opcode)),
        }
    }

    pub(crate) fn target(self, opcode: Opcode) -> Result<usize, VmError> {
        match self {
            Operands::Target(target) => Ok(target),
            _ => Err(malformed(opcode)),
        }
    }

    pub(crate) fn reg(self, opcode: Opcode) -> Result<u8, VmError> {
        match self {
            Operands::Reg(index) => Ok(index),
            _ => Err(malformed(opcode)),
        }
    }

    pub(crate) fn reg_pair(self, opcode: Opcode) -> Result<(u8, u8), VmError> {
        match self {
            Operands::RegPair(first, second) => Ok((first, second)),
            _ => Err(malformed(opcode)),
        }
    }
}

fn malformed(opcode: Opcode) -> VmError {
    VmError::MalformedInstruction {
        mnemonic: opcode.mnemonic(),
    }
}

/// One decoded instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Operands,
}

/// An immutable, label-resolved program.
#[derive(Clone, Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    pub(crate) fn new(instructions: Vec<Instruction>, labels: HashMap<String, usize>) -> Self {
        Self {
            instructions,
            labels,
        }
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True when the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `address`, if in bounds.
    pub fn get(&self, address: usize) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    /// The label table: name to instruction address.
    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_len() {
        let instruction = Instruction {
            opcode: Opcode::Nop,
            operands: Operands::None,
        };
        let program = Program::new(vec![instruction], HashMap::new());
        assert_eq!(program.len(), 1);
        assert!(!program.is_empty());
        assert_eq!(program.get(0), Some(&instruction));
        assert_eq!(program.get(1), None);
    }

    #[test]
    fn operand_shape_mismatch() {
        assert_eq!(
            Operands::None.value(Opcode::Psh),
            Err(VmError::MalformedInstruction { mnemonic: "PSH" })
        );
        assert_eq!(Operands::Reg(3).reg(Opcode::Set), Ok(3));
    }
}

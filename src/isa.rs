//! Instruction set definitions.
//!
//! The [`for_each_opcode!`] macro holds the canonical opcode table and
//! invokes a callback macro for code generation, so the enum, the mnemonic
//! mappings, and the operand-shape table all come from one definition list.
//!
//! This module generates:
//! - The [`Opcode`] enum
//! - `mnemonic()` / `from_mnemonic()` for source-text mapping
//! - `mode()`, the [`OperandMode`] the loader validates operands against

use crate::errors::VmError;

/// Operand shape an opcode accepts, checked once at load time.
///
/// Dual-mode opcodes ([`OperandMode::DualReg`], [`OperandMode::OptReg`])
/// read implicit operands from the stack when written bare and explicit
/// register operands otherwise; the remaining shapes are fixed-arity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandMode {
    /// No operands.
    None,
    /// One signed literal value.
    Value,
    /// One non-negative memory address literal.
    Addr,
    /// One jump target: a label name, or a literal instruction address.
    Target,
    /// Exactly one register.
    Reg,
    /// No operands (stack top) or one register.
    OptReg,
    /// Exactly two registers.
    RegPair,
    /// No operands (two stack values) or two registers.
    DualReg,
}

impl OperandMode {
    /// Human-readable arity description used in load diagnostics.
    pub const fn describe(self) -> &'static str {
        match self {
            OperandMode::None => "no operands",
            OperandMode::Value => "one literal value",
            OperandMode::Addr => "one memory address",
            OperandMode::Target => "one label or address",
            OperandMode::Reg => "one register",
            OperandMode::OptReg => "no operands or one register",
            OperandMode::RegPair => "two registers",
            OperandMode::DualReg => "no operands or two registers",
        }
    }
}

/// Invokes a callback macro with the complete opcode definition list.
///
/// Keeps the instruction table in one place so every generated item stays
/// consistent with it.
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            /// ADD [ra rb] ; push ra + rb, or pop two values and push their sum
            Add => "ADD", DualReg,
            /// SUB [ra rb] ; push ra - rb, or pop two values and subtract top from second
            Sub => "SUB", DualReg,
            /// MUL [ra rb] ; push ra * rb, or pop two values and push their product
            Mul => "MUL", DualReg,
            /// DIV [ra rb] ; push ra / rb (fault on zero divisor)
            Div => "DIV", DualReg,
            /// MOD [ra rb] ; push ra % rb (fault on zero divisor)
            Mod => "MOD", DualReg,
            /// INC [r] ; add one to register r, or to the stack top
            Inc => "INC", OptReg,
            /// DEC [r] ; subtract one from register r, or from the stack top
            Dec => "DEC", OptReg,
            // =========================
            // Stack
            // =========================
            /// PSH value ; push a literal value
            Psh => "PSH", Value,
            /// POP ; discard the stack top
            Pop => "POP", None,
            /// DUP ; push a copy of the stack top
            Dup => "DUP", None,
            /// SWP ; exchange the two top stack values
            Swp => "SWP", None,
            /// SCL ; clear the stack
            Scl => "SCL", None,
            // =========================
            // Memory
            // =========================
            /// STR addr ; pop the stack top into memory at addr
            Str => "STR", Addr,
            /// LOA addr ; push memory at addr (0 if never written)
            Loa => "LOA", Addr,
            /// MCL ; clear memory (all addresses read 0 again)
            Mcl => "MCL", None,
            // =========================
            // Registers
            // =========================
            /// MOV rs rd ; rd = rs, then rs = 0
            Mov => "MOV", RegPair,
            /// COP rs rd ; rd = rs, rs unchanged
            Cop => "COP", RegPair,
            /// SET r ; pop the stack top into register r
            Set => "SET", Reg,
            /// GET r ; push a copy of register r
            Get => "GET", Reg,
            // =========================
            // Control flow
            // =========================
            /// JMP target ; jump unconditionally
            Jmp => "JMP", Target,
            /// JEZ target ; jump if the stack top is zero (peek, no pop)
            Jez => "JEZ", Target,
            /// JNZ target ; jump if the stack top is nonzero (peek, no pop)
            Jnz => "JNZ", Target,
            /// JGZ target ; jump if the stack top is positive (peek, no pop)
            Jgz => "JGZ", Target,
            /// JLZ target ; jump if the stack top is negative (peek, no pop)
            Jlz => "JLZ", Target,
            // =========================
            // Comparison
            // =========================
            /// EQU [ra rb] ; push 1 if the operands are equal, else 0
            Equ => "EQU", DualReg,
            /// NEQ [ra rb] ; push 1 if the operands differ, else 0
            Neq => "NEQ", DualReg,
            /// GTH [ra rb] ; push 1 if the first operand is greater, else 0
            Gth => "GTH", DualReg,
            /// LTH [ra rb] ; push 1 if the first operand is smaller, else 0
            Lth => "LTH", DualReg,
            /// GTE [ra rb] ; push 1 if the first operand is greater or equal, else 0
            Gte => "GTE", DualReg,
            /// LTE [ra rb] ; push 1 if the first operand is smaller or equal, else 0
            Lte => "LTE", DualReg,
            // =========================
            // Console I/O
            // =========================
            /// INP ; read one numeric value from the console and push it
            Inp => "INP", None,
            /// PRT ; print the stack top (peek, no pop)
            Prt => "PRT", None,
            /// PPT ; print the stack top, then pop it
            Ppt => "PPT", None,
            /// PRC ; print the stack top as a character (peek, no pop)
            Prc => "PRC", None,
            // =========================
            // Miscellaneous
            // =========================
            /// TIM ; push wall-clock time as whole seconds since the Unix epoch
            Tim => "TIM", None,
            /// DEB ; print a read-only machine snapshot
            Deb => "DEB", None,
            /// HLT ; halt execution
            Hlt => "HLT", None,
            /// NOP ; no operation
            Nop => "NOP", None,
        }
    };
}

macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident => $mnemonic:literal, $mode:ident
        ),* $(,)?
    ) => {
        /// Operation selected by an instruction's mnemonic.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name,
            )*
        }

        impl Opcode {
            /// Every opcode, in definition order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the source mnemonic for this opcode.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the operand shape this opcode accepts.
            pub const fn mode(self) -> OperandMode {
                match self {
                    $( Opcode::$name => OperandMode::$mode, )*
                }
            }

            /// Looks an opcode up by its source mnemonic (case-sensitive).
            pub fn from_mnemonic(name: &str) -> Result<Self, VmError> {
                match name {
                    $( $mnemonic => Ok(Opcode::$name), )*
                    _ => Err(VmError::UnknownOpcode {
                        mnemonic: name.to_string(),
                    }),
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    macro_rules! count_defined {
        (
            $( $(#[$doc:meta])* $name:ident => $mnemonic:literal, $mode:ident ),* $(,)?
        ) => {
            <[()]>::len(&[ $( count_defined!(@unit $name) ),* ])
        };
        (@unit $x:ident) => { () };
    }

    #[test]
    fn table_and_enum_agree() {
        assert_eq!(for_each_opcode!(count_defined), Opcode::ALL.len());
    }

    #[test]
    fn mnemonics_round_trip() {
        for &opcode in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(opcode.mnemonic()).unwrap(), opcode);
        }
    }

    #[test]
    fn mnemonics_unique() {
        let mut seen = HashSet::new();
        for &opcode in Opcode::ALL {
            assert!(seen.insert(opcode.mnemonic()), "{}", opcode.mnemonic());
        }
    }

    #[test]
    fn from_mnemonic_invalid() {
        assert!(matches!(
            Opcode::from_mnemonic("BOGUS"),
            Err(VmError::UnknownOpcode { .. })
        ));
        assert!(matches!(
            Opcode::from_mnemonic("add"), // case-sensitive
            Err(VmError::UnknownOpcode { .. })
        ));
    }

    #[test]
    fn modes() {
        assert_eq!(Opcode::Add.mode(), OperandMode::DualReg);
        assert_eq!(Opcode::Inc.mode(), OperandMode::OptReg);
        assert_eq!(Opcode::Psh.mode(), OperandMode::Value);
        assert_eq!(Opcode::Str.mode(), OperandMode::Addr);
        assert_eq!(Opcode::Jmp.mode(), OperandMode::Target);
        assert_eq!(Opcode::Set.mode(), OperandMode::Reg);
        assert_eq!(Opcode::Mov.mode(), OperandMode::RegPair);
        assert_eq!(Opcode::Hlt.mode(), OperandMode::None);
    }
}

//! Read-only machine snapshots.
//!
//! A [`Snapshot`] is a point-in-time copy of everything observable about a
//! machine: PC, stack, registers, written memory, and the label table.
//! Capturing or rendering one never mutates the machine; the `DEB` opcode
//! and external tooling (debuggers, tests) share the same view.

use std::fmt::Write as _;

use crate::state::{REGISTER_COUNT, Value};

/// A point-in-time view of a machine, taken between steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Address of the next instruction.
    pub pc: usize,
    /// Stack contents, top first.
    pub stack: Vec<Value>,
    /// All eight register values by index.
    pub registers: [Value; REGISTER_COUNT],
    /// Written memory cells, sorted by address.
    pub memory: Vec<(u64, Value)>,
    /// Label table entries, sorted by name.
    pub labels: Vec<(String, usize)>,
}

impl Snapshot {
    /// Renders the snapshot as a deterministic multi-line report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pc: {}", self.pc);
        let _ = writeln!(out, "stack (top first): [{}]", join(self.stack.iter()));
        let registers = self
            .registers
            .iter()
            .enumerate()
            .map(|(index, value)| format!("r{index}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "registers: {registers}");
        let memory = self
            .memory
            .iter()
            .map(|(address, value)| format!("{address}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "memory: {{{memory}}}");
        let labels = self
            .labels
            .iter()
            .map(|(name, address)| format!("{name}: {address}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, "labels: {{{labels}}}");
        out
    }
}

fn join<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_deterministic() {
        let snapshot = Snapshot {
            pc: 3,
            stack: vec![9, 5],
            registers: [0, 1, 0, 0, 0, 0, 0, -2],
            memory: vec![(0, 42), (16, 7)],
            labels: vec![("loop".to_string(), 1)],
        };
        assert_eq!(
            snapshot.render(),
            "pc: 3\n\
             stack (top first): [9, 5]\n\
             registers: r0=0 r1=1 r2=0 r3=0 r4=0 r5=0 r6=0 r7=-2\n\
             memory: {0: 42, 16: 7}\n\
             labels: {loop: 1}"
        );
    }

    #[test]
    fn render_empty_machine() {
        let snapshot = Snapshot {
            pc: 0,
            stack: vec![],
            registers: [0; REGISTER_COUNT],
            memory: vec![],
            labels: vec![],
        };
        let report = snapshot.render();
        assert!(report.contains("stack (top first): []"));
        assert!(report.contains("memory: {}"));
        assert!(report.contains("labels: {}"));
    }
}

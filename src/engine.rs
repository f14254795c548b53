//! Fetch-decode-execute engine.
//!
//! [`Engine`] owns one [`Program`], one [`MachineState`], and a
//! [`Console`]; [`Engine::step`] executes a single instruction and
//! [`Engine::run`] loops until the machine stops. Multiple engines can
//! coexist; there is no process-wide machine.
//!
//! # Lifecycle
//!
//! `Ready -> Running` on the first step, `Running -> Halted` on `HLT` or
//! when the PC moves past the last instruction, `Running -> Faulted` on any
//! detected violation. `Halted` and `Faulted` are terminal: further `step`
//! or `run` calls return the same status without touching machine state.
//!
//! # Fault atomicity
//!
//! Every opcode's effect is one indivisible transition. Handlers validate
//! before they mutate, so a faulting instruction leaves the stack,
//! registers, and memory exactly as they were (a `DIV` by zero keeps both
//! of its stack operands in place).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::console::{Console, StdConsole};
use crate::errors::VmError;
use crate::inspector::Snapshot;
use crate::isa::Opcode;
use crate::program::{Instruction, Operands, Program};
use crate::state::{DEFAULT_STACK_LIMIT, MachineState, Value};

/// Engine lifecycle status. Terminal states are sticky.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Loaded, nothing executed yet.
    Ready,
    /// At least one instruction executed; more remain.
    Running,
    /// `HLT` executed, or the PC moved past the last instruction.
    Halted,
    /// A run-time fault stopped the machine.
    Faulted(VmError),
}

impl Status {
    /// True for [`Status::Halted`] and [`Status::Faulted`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Halted | Status::Faulted(_))
    }
}

/// Where control goes after an instruction.
enum Control {
    Advance,
    Jump(usize),
    Halt,
}

/// A machine executing one program against one console.
pub struct Engine<C: Console> {
    program: Program,
    state: MachineState,
    console: C,
    status: Status,
}

impl Engine<StdConsole> {
    /// Creates an engine for `program` bound to the process console.
    pub fn new(program: Program) -> Self {
        Self::with_console(program, StdConsole::new())
    }
}

impl<C: Console> Engine<C> {
    /// Creates an engine with a caller-supplied console.
    pub fn with_console(program: Program, console: C) -> Self {
        Self {
            program,
            state: MachineState::new(DEFAULT_STACK_LIMIT),
            console,
            status: Status::Ready,
        }
    }

    /// Replaces the stack safety bound. Only meaningful before execution.
    pub fn with_stack_limit(mut self, limit: usize) -> Self {
        self.state.stack.set_limit(limit);
        self
    }

    /// Current lifecycle status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Address of the next instruction (or of the faulting one).
    pub fn pc(&self) -> usize {
        self.state.pc
    }

    /// The console this engine writes to.
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Executes one instruction.
    ///
    /// On a terminal status this is a no-op returning the status unchanged.
    pub fn step(&mut self) -> &Status {
        if self.status.is_terminal() {
            return &self.status;
        }
        self.status = Status::Running;

        let Some(&instruction) = self.program.get(self.state.pc) else {
            self.status = Status::Halted;
            return &self.status;
        };

        match self.exec(instruction) {
            Ok(Control::Advance) => self.state.pc += 1,
            Ok(Control::Jump(target)) => self.state.pc = target,
            Ok(Control::Halt) => self.status = Status::Halted,
            Err(fault) => self.status = Status::Faulted(fault),
        }
        &self.status
    }

    /// Runs until the machine halts or faults; returns the terminal status.
    ///
    /// Calling again after termination returns the same status.
    pub fn run(&mut self) -> &Status {
        while !self.step().is_terminal() {}
        &self.status
    }

    /// Captures a read-only snapshot of the machine.
    pub fn snapshot(&self) -> Snapshot {
        let mut stack: Vec<Value> = self.state.stack.as_slice().to_vec();
        stack.reverse();
        let mut memory: Vec<(u64, Value)> = self.state.memory.written().collect();
        memory.sort_unstable_by_key(|&(address, _)| address);
        let mut labels: Vec<(String, usize)> = self
            .program
            .labels()
            .iter()
            .map(|(name, &address)| (name.clone(), address))
            .collect();
        labels.sort();

        Snapshot {
            pc: self.state.pc,
            stack,
            registers: self.state.registers.as_array(),
            memory,
            labels,
        }
    }

    /// Dispatches a single instruction to its handler.
    fn exec(&mut self, instruction: Instruction) -> Result<Control, VmError> {
        let Instruction { opcode, operands } = instruction;
        match opcode {
            // Arithmetic
            Opcode::Add => self.op_binary(opcode, operands, |a, b| Ok(a.wrapping_add(b))),
            Opcode::Sub => self.op_binary(opcode, operands, |a, b| Ok(a.wrapping_sub(b))),
            Opcode::Mul => self.op_binary(opcode, operands, |a, b| Ok(a.wrapping_mul(b))),
            Opcode::Div => self.op_binary(opcode, operands, checked_div),
            Opcode::Mod => self.op_binary(opcode, operands, checked_rem),
            Opcode::Inc => self.op_adjust(opcode, operands, 1),
            Opcode::Dec => self.op_adjust(opcode, operands, -1),
            // Stack
            Opcode::Psh => self.op_push(opcode, operands),
            Opcode::Pop => self.op_pop(),
            Opcode::Dup => self.op_dup(),
            Opcode::Swp => self.op_swap(),
            Opcode::Scl => self.op_stack_clear(),
            // Memory
            Opcode::Str => self.op_store(opcode, operands),
            Opcode::Loa => self.op_load(opcode, operands),
            Opcode::Mcl => self.op_memory_clear(),
            // Registers
            Opcode::Mov => self.op_move(opcode, operands),
            Opcode::Cop => self.op_copy(opcode, operands),
            Opcode::Set => self.op_set(opcode, operands),
            Opcode::Get => self.op_get(opcode, operands),
            // Control flow
            Opcode::Jmp => self.op_jump(opcode, operands),
            Opcode::Jez => self.op_branch(opcode, operands, |v| v == 0),
            Opcode::Jnz => self.op_branch(opcode, operands, |v| v != 0),
            Opcode::Jgz => self.op_branch(opcode, operands, |v| v > 0),
            Opcode::Jlz => self.op_branch(opcode, operands, |v| v < 0),
            // Comparison
            Opcode::Equ => self.op_binary(opcode, operands, |a, b| Ok(Value::from(a == b))),
            Opcode::Neq => self.op_binary(opcode, operands, |a, b| Ok(Value::from(a != b))),
            Opcode::Gth => self.op_binary(opcode, operands, |a, b| Ok(Value::from(a > b))),
            Opcode::Lth => self.op_binary(opcode, operands, |a, b| Ok(Value::from(a < b))),
            Opcode::Gte => self.op_binary(opcode, operands, |a, b| Ok(Value::from(a >= b))),
            Opcode::Lte => self.op_binary(opcode, operands, |a, b| Ok(Value::from(a <= b))),
            // Console I/O
            Opcode::Inp => self.op_input(),
            Opcode::Prt => self.op_print(),
            Opcode::Ppt => self.op_print_pop(),
            Opcode::Prc => self.op_print_char(),
            // Miscellaneous
            Opcode::Tim => self.op_time(),
            Opcode::Deb => self.op_debug(),
            Opcode::Hlt => Ok(Control::Halt),
            Opcode::Nop => Ok(Control::Advance),
        }
    }

    /// Shared handler for the dual-mode two-operand family (arithmetic and
    /// comparisons).
    ///
    /// With no operands the two top stack values are consumed; with two
    /// registers both are read and left unchanged. The result is pushed
    /// either way. `apply` sees `(left, right)` in source order; for the
    /// implicit form the left operand is the second value from the top, so
    /// `PSH a / PSH b / SUB` and `SUB ra rb` agree on equal inputs.
    fn op_binary(
        &mut self,
        opcode: Opcode,
        operands: Operands,
        apply: fn(Value, Value) -> Result<Value, VmError>,
    ) -> Result<Control, VmError> {
        match operands {
            Operands::None => {
                let (a, b) = self.state.stack.top2()?;
                let result = apply(a, b)?;
                self.state.stack.pop2()?;
                self.state.stack.push(result)?;
            }
            Operands::RegPair(ra, rb) => {
                let a = self.state.registers.get(ra)?;
                let b = self.state.registers.get(rb)?;
                self.state.stack.push(apply(a, b)?)?;
            }
            _ => {
                return Err(VmError::MalformedInstruction {
                    mnemonic: opcode.mnemonic(),
                });
            }
        }
        Ok(Control::Advance)
    }

    /// `INC`/`DEC`: adjusts a register in place, or the stack top.
    fn op_adjust(
        &mut self,
        opcode: Opcode,
        operands: Operands,
        delta: Value,
    ) -> Result<Control, VmError> {
        match operands {
            Operands::None => {
                let value = self.state.stack.pop()?;
                self.state.stack.push(value.wrapping_add(delta))?;
            }
            Operands::Reg(index) => {
                let value = self.state.registers.get(index)?;
                self.state.registers.set(index, value.wrapping_add(delta))?;
            }
            _ => {
                return Err(VmError::MalformedInstruction {
                    mnemonic: opcode.mnemonic(),
                });
            }
        }
        Ok(Control::Advance)
    }

    fn op_push(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        self.state.stack.push(operands.value(opcode)?)?;
        Ok(Control::Advance)
    }

    fn op_pop(&mut self) -> Result<Control, VmError> {
        self.state.stack.pop()?;
        Ok(Control::Advance)
    }

    fn op_dup(&mut self) -> Result<Control, VmError> {
        let value = self.state.stack.top()?;
        self.state.stack.push(value)?;
        Ok(Control::Advance)
    }

    fn op_swap(&mut self) -> Result<Control, VmError> {
        self.state.stack.swap_top2()?;
        Ok(Control::Advance)
    }

    fn op_stack_clear(&mut self) -> Result<Control, VmError> {
        self.state.stack.clear();
        Ok(Control::Advance)
    }

    fn op_store(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let address = operands.addr(opcode)?;
        let value = self.state.stack.pop()?;
        self.state.memory.write(address, value);
        Ok(Control::Advance)
    }

    fn op_load(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let address = operands.addr(opcode)?;
        self.state.stack.push(self.state.memory.read(address))?;
        Ok(Control::Advance)
    }

    fn op_memory_clear(&mut self) -> Result<Control, VmError> {
        self.state.memory.clear();
        Ok(Control::Advance)
    }

    /// `MOV rs rd`: copy, then reset the source to zero.
    fn op_move(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let (src, dst) = operands.reg_pair(opcode)?;
        let value = self.state.registers.get(src)?;
        self.state.registers.set(dst, value)?;
        self.state.registers.set(src, 0)?;
        Ok(Control::Advance)
    }

    /// `COP rs rd`: copy, source unchanged.
    fn op_copy(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let (src, dst) = operands.reg_pair(opcode)?;
        let value = self.state.registers.get(src)?;
        self.state.registers.set(dst, value)?;
        Ok(Control::Advance)
    }

    fn op_set(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let index = operands.reg(opcode)?;
        let value = self.state.stack.pop()?;
        self.state.registers.set(index, value)?;
        Ok(Control::Advance)
    }

    fn op_get(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let index = operands.reg(opcode)?;
        self.state.stack.push(self.state.registers.get(index)?)?;
        Ok(Control::Advance)
    }

    fn op_jump(&mut self, opcode: Opcode, operands: Operands) -> Result<Control, VmError> {
        let target = operands.target(opcode)?;
        self.checked_target(target)?;
        Ok(Control::Jump(target))
    }

    /// Conditional jumps peek the stack top; the tested value stays put.
    fn op_branch(
        &mut self,
        opcode: Opcode,
        operands: Operands,
        condition: fn(Value) -> bool,
    ) -> Result<Control, VmError> {
        let target = operands.target(opcode)?;
        self.checked_target(target)?;
        let value = self.state.stack.top()?;
        if condition(value) {
            Ok(Control::Jump(target))
        } else {
            Ok(Control::Advance)
        }
    }

    /// Rejects targets beyond the program end. The end itself is valid:
    /// jumping there halts on the next step.
    fn checked_target(&self, target: usize) -> Result<(), VmError> {
        if target > self.program.len() {
            return Err(VmError::JumpOutOfBounds {
                target,
                len: self.program.len(),
            });
        }
        Ok(())
    }

    fn op_input(&mut self) -> Result<Control, VmError> {
        let value = self.console.read_value()?;
        self.state.stack.push(value)?;
        Ok(Control::Advance)
    }

    fn op_print(&mut self) -> Result<Control, VmError> {
        let value = self.state.stack.top()?;
        self.console.write_value(value);
        Ok(Control::Advance)
    }

    fn op_print_pop(&mut self) -> Result<Control, VmError> {
        let value = self.state.stack.pop()?;
        self.console.write_value(value);
        Ok(Control::Advance)
    }

    fn op_print_char(&mut self) -> Result<Control, VmError> {
        let value = self.state.stack.top()?;
        let c = u32::try_from(value)
            .ok()
            .and_then(char::from_u32)
            .ok_or(VmError::InvalidCharCode { code: value })?;
        self.console.write_char(c);
        Ok(Control::Advance)
    }

    /// Pushes wall-clock time as whole seconds since the Unix epoch.
    fn op_time(&mut self) -> Result<Control, VmError> {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.state.stack.push(seconds as Value)?;
        Ok(Control::Advance)
    }

    fn op_debug(&mut self) -> Result<Control, VmError> {
        let report = self.snapshot().render();
        self.console.write_text(&report);
        Ok(Control::Advance)
    }
}

fn checked_div(a: Value, b: Value) -> Result<Value, VmError> {
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    Ok(a.wrapping_div(b))
}

fn checked_rem(a: Value, b: Value) -> Result<Value, VmError> {
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

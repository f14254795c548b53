//! A stack-and-register hybrid virtual machine.
//!
//! Programs are line-oriented text: ~40 uppercase mnemonics operating over
//! an operand stack, eight registers (`r0`-`r7`), and a sparse memory, with
//! label-based control flow and console I/O. The [`loader`] turns source
//! into an immutable [`program::Program`]; the [`engine`] interprets it
//! against one [`state::MachineState`] until it halts or faults.
//!
//! ```
//! use stackvm::engine::{Engine, Status};
//! use stackvm::loader::load_source;
//!
//! let program = load_source("PSH 2\nPSH 3\nADD").unwrap();
//! let mut engine = Engine::new(program);
//! assert_eq!(*engine.run(), Status::Halted);
//! assert_eq!(engine.snapshot().stack, vec![5]);
//! ```

pub mod console;
pub mod engine;
pub mod errors;
pub mod inspector;
pub mod isa;
pub mod loader;
pub mod program;
pub mod state;
pub mod utils;

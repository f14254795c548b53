//! Console collaborator consumed by the I/O opcodes.
//!
//! The engine is generic over [`Console`] so machines can run against the
//! process stdin/stdout in production and against a scripted console in
//! tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::errors::VmError;
use crate::state::Value;

/// Console access used by `INP`, `PRT`, `PPT`, `PRC` and `DEB`.
pub trait Console {
    /// Blocks until one whitespace-delimited numeric value is available.
    fn read_value(&mut self) -> Result<Value, VmError>;

    /// Writes a value's decimal form followed by a newline.
    fn write_value(&mut self, value: Value);

    /// Writes a single character, no newline.
    fn write_char(&mut self, c: char);

    /// Writes a pre-rendered block of text (debug snapshots).
    fn write_text(&mut self, text: &str);
}

/// Parses one console token as a value.
pub(crate) fn parse_value(token: &str) -> Result<Value, VmError> {
    token.parse().map_err(|_| VmError::MalformedInput {
        input: token.to_string(),
    })
}

/// Console bound to the process stdin/stdout.
///
/// Input is read a line at a time and split into whitespace-delimited
/// tokens, so `1 2 3` on one line satisfies three `INP` instructions.
#[derive(Debug, Default)]
pub struct StdConsole {
    pending: VecDeque<String>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for StdConsole {
    fn read_value(&mut self) -> Result<Value, VmError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return parse_value(&token);
            }
            let mut line = String::new();
            let read = io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|_| VmError::InputExhausted)?;
            if read == 0 {
                return Err(VmError::InputExhausted);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
    }

    fn write_value(&mut self, value: Value) {
        println!("{value}");
    }

    fn write_char(&mut self, c: char) {
        print!("{c}");
        let _ = io::stdout().flush();
    }

    fn write_text(&mut self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Scripted console: queued input tokens, captured output.
    #[derive(Debug, Default)]
    pub struct TestConsole {
        pub inputs: VecDeque<String>,
        pub output: String,
    }

    impl TestConsole {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_inputs(inputs: &[&str]) -> Self {
            Self {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                output: String::new(),
            }
        }
    }

    impl Console for TestConsole {
        fn read_value(&mut self) -> Result<Value, VmError> {
            let token = self.inputs.pop_front().ok_or(VmError::InputExhausted)?;
            parse_value(&token)
        }

        fn write_value(&mut self, value: Value) {
            self.output.push_str(&value.to_string());
            self.output.push('\n');
        }

        fn write_char(&mut self, c: char) {
            self.output.push(c);
        }

        fn write_text(&mut self, text: &str) {
            self.output.push_str(text);
            self.output.push('\n');
        }
    }

    #[test]
    fn parse_value_numeric() {
        assert_eq!(parse_value("42").unwrap(), 42);
        assert_eq!(parse_value("-7").unwrap(), -7);
    }

    #[test]
    fn parse_value_malformed() {
        assert!(matches!(
            parse_value("4x"),
            Err(VmError::MalformedInput { .. })
        ));
        assert!(matches!(
            parse_value("1.5"),
            Err(VmError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_console_scripting() {
        let mut console = TestConsole::with_inputs(&["5", "nope"]);
        assert_eq!(console.read_value().unwrap(), 5);
        assert!(matches!(
            console.read_value(),
            Err(VmError::MalformedInput { .. })
        ));
        assert_eq!(console.read_value(), Err(VmError::InputExhausted));

        console.write_value(9);
        console.write_char('!');
        assert_eq!(console.output, "9\n!");
    }
}

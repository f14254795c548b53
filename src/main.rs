//! Program runner CLI.
//!
//! Loads a program text file and executes it to completion.
//!
//! # Usage
//! ```text
//! stackvm <program.vm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program.vm`: Program text to run (use `-` to read from stdin)
//!
//! # Options
//! - `-s, --stack-limit <n>`: Bound the operand stack at `n` values
//! - `-d, --debug`: Print a machine snapshot after the run
//!
//! # Exit status
//! 0 on a normal halt; 1 on a load fault (reported with a source
//! diagnostic) or a run-time fault (reported with the PC).

use std::env;
use std::fs;
use std::io::Read;
use std::process;

use stackvm::engine::{Engine, Status};
use stackvm::error;
use stackvm::loader::{load_source, render_diagnostic};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut stack_limit: Option<usize> = None;
    let mut debug = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--stack-limit" | "-s") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                stack_limit = Some(args[i].parse::<usize>().unwrap_or_else(|_| {
                    error!("Invalid stack limit: '{}' is not a valid number", args[i]);
                    process::exit(1);
                }));
                i += 1;
            }
            "--debug" | "-d" => {
                debug = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let (source_name, source) = if input_path == "-" {
        let mut source = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut source) {
            error!("Failed to read stdin: {e}");
            process::exit(1);
        }
        ("<stdin>".to_string(), source)
    } else {
        match fs::read_to_string(input_path) {
            Ok(source) => (input_path.clone(), source),
            Err(e) => {
                error!("Failed to read {input_path}: {e}");
                process::exit(1);
            }
        }
    };

    let program = match load_source(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}", render_diagnostic(&source_name, &source, &err));
            process::exit(1);
        }
    };

    let mut engine = Engine::new(program);
    if let Some(limit) = stack_limit {
        engine = engine.with_stack_limit(limit);
    }

    let status = engine.run().clone();
    if debug {
        println!("{}", engine.snapshot().render());
    }
    if let Status::Faulted(fault) = status {
        error!("Fault at pc {}: {}", engine.pc(), fault);
        process::exit(1);
    }
}

const USAGE: &str = "\
Stack machine runner

USAGE:
    {program} <program.vm> [OPTIONS]

ARGS:
    <program.vm>    Program text to run (use - to read from stdin)

OPTIONS:
    -s, --stack-limit <n>   Bound the operand stack at n values
    -d, --debug             Print a machine snapshot after the run
    -h, --help              Print this help message

EXAMPLES:
    # Run a program file
    {program} countdown.vm

    # Run from stdin
    printf 'PSH 2\\nPSH 3\\nADD\\nPPT\\n' | {program} -

    # Run with a tight stack bound
    {program} countdown.vm --stack-limit 64
";

fn print_usage(program: &str) {
    println!("{}", USAGE.replace("{program}", program));
}

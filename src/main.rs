//! CLI driver: load → evaluate → report → exit.
//!
//! Grounded on `examples/original_source/interp/Main.c` (argv handling,
//! `-` for stdin, the open-failure vs. runtime-failure exit code split)
//! and the teacher's own `src/main.rs` (a small binary colocated with the
//! library in the same package, not a separate crate).

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::process::ExitCode;

use gmachine::error::GMachineError;
use gmachine::eval::{Evaluator, DEFAULT_STACK_CAPACITY};
use gmachine::heap::{Heap, DEFAULT_HEAP_SIZE};
use gmachine::loader;

fn usage(prog: &str) {
    eprintln!("usage: {prog} <inputFile>");
}

fn open_input(file_name: &str) -> io::Result<Box<dyn Read>> {
    if file_name == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(BufReader::new(File::open(file_name)?)))
    }
}

fn run(mut input: Box<dyn Read>) -> Result<i64, GMachineError> {
    let mut heap = Heap::new(DEFAULT_HEAP_SIZE)?;
    let globals = loader::load(&mut input, &mut heap)?;
    let evaluator = Evaluator::new(heap, globals, DEFAULT_STACK_CAPACITY);
    evaluator.run()
}

fn main() -> ExitCode {
    let mut args = std::env::args();
    let prog = args.next().unwrap_or_else(|| "gmachine".to_string());
    let file_name = match args.next() {
        Some(f) if args.next().is_none() => f,
        _ => {
            usage(&prog);
            return ExitCode::FAILURE;
        }
    };

    let input = match open_input(&file_name) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("{file_name}: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(input) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(GMachineError::Load(e)) => {
            eprintln!("{prog}: {file_name}: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            // Runtime faults (out-of-heap, stack overflow, malformed
            // program) indicate a compiler bug or resource exhaustion, never
            // a recoverable condition (spec.md §7) — abort rather than
            // return a plain nonzero status, matching the reference
            // interpreter's `BARF` (spec.md §6.2, "fatal-abort").
            eprintln!("{prog}: fatal: {e}");
            std::process::abort();
        }
    }
}

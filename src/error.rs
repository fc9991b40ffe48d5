//! Fatal error kinds, reported the way
//! `examples/MaximumOverflow-cilium/cilium/src/schema/errors.rs` reports
//! them: a plain `enum` with a manual `From<std::io::Error>`, no panic
//! macros and no `thiserror` — the teacher crate doesn't use it either.
//!
//! Every kind here is fatal at the core boundary (spec.md §7): the
//! evaluator is not expected to recover from any of them.

use std::fmt;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Truncated {
        context: &'static str,
        detail: i64,
    },
}

impl From<std::io::Error> for LoadError {
    fn from(value: std::io::Error) -> Self {
        LoadError::Io(value)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error reading bytecode: {e}"),
            LoadError::Truncated { context, detail } => {
                write!(f, "malformed bytecode stream ({context}: {detail})")
            }
        }
    }
}

/// The three ways `Unwind`/`Update`/`PrimIntCond` can hit a program that a
/// type-checked compiler should never have produced (spec.md §7).
#[derive(Debug)]
pub enum MalformedProgramKind {
    /// `Unwind` reached a `Supercomb` with fewer than `arity` arguments
    /// beneath it on the stack.
    PartialApplication {
        global_index: i16,
        arity: i16,
        have: usize,
    },
    /// `Unwind` found a bare `Dump` at the top of the stack.
    DumpUnderflow,
    /// `Update`/`PrimIntCond`/`Unwind`'s `Int` case found a node of the
    /// wrong tag (e.g. a saved `Dump` whose depth doesn't match, or a
    /// non-`Int` operand to a primitive op).
    WrongTag { op: &'static str, expected: &'static str },
    /// An instruction popped, or indexed, past the bottom of the value
    /// stack. Not itself named in spec.md's three `Unwind`-adjacent cases,
    /// but the same class of "a type-checked compiler should never emit
    /// this" fault.
    StackUnderflow { op: &'static str },
}

#[derive(Debug)]
pub enum GMachineError {
    Load(LoadError),
    HeapInit(&'static str),
    OutOfHeap,
    StackOverflow,
    Malformed(MalformedProgramKind),
}

impl From<LoadError> for GMachineError {
    fn from(value: LoadError) -> Self {
        GMachineError::Load(value)
    }
}

impl fmt::Display for GMachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GMachineError::Load(e) => write!(f, "{e}"),
            GMachineError::HeapInit(reason) => write!(f, "could not initialize heap: {reason}"),
            GMachineError::OutOfHeap => write!(f, "out of heap: collection could not satisfy allocation"),
            GMachineError::StackOverflow => write!(f, "interpreter stack overflow"),
            GMachineError::Malformed(MalformedProgramKind::PartialApplication {
                global_index,
                arity,
                have,
            }) => write!(
                f,
                "partial application under Unwind: supercombinator #{global_index} needs {arity} argument(s), found {have}"
            ),
            GMachineError::Malformed(MalformedProgramKind::DumpUnderflow) => {
                write!(f, "Unwind found a Dump at the top of the stack (stack underflow)")
            }
            GMachineError::Malformed(MalformedProgramKind::WrongTag { op, expected }) => {
                write!(f, "{op}: expected a {expected} node, found a different tag")
            }
            GMachineError::Malformed(MalformedProgramKind::StackUnderflow { op }) => {
                write!(f, "{op}: value stack underflow")
            }
        }
    }
}

impl std::error::Error for GMachineError {}

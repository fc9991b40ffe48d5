//! A bytecode interpreter for a lazy graph-reduction computation model (the
//! G-Machine): a heap of tagged graph nodes, a threaded-dispatch evaluator
//! implementing `Eval`/`Unwind`, and a Cheney-style copying collector that
//! relocates every live pointer — including the program counter, since
//! supercombinators are themselves heap objects.
//!
//! Module layout mirrors spec.md §2's component breakdown:
//! [`node`]/[`header`]/[`instr`] are the data model (§3), [`bump_pointer_space`]/
//! [`heap`] are the allocator and collector (§4.1–4.2), [`eval`] is the
//! evaluator (§4.3), and [`loader`] is the bytecode reader (§4.4).

pub mod bump_pointer_space;
pub mod error;
pub mod eval;
pub mod header;
pub mod heap;
pub mod instr;
pub mod loader;
pub mod node;

//! End-to-end bytecode scenarios (spec.md §8): each test hand-assembles a
//! big-endian bytecode stream exactly as the wire format in spec.md §4.4
//! describes it, loads it through [`gmachine::loader::load`], and evaluates
//! it through a real [`gmachine::eval::Evaluator`] — the loader and
//! evaluator together, not the evaluator alone (the `#[cfg(test)]` blocks
//! inside `src/eval.rs` build supercombinators directly in the heap instead).

use gmachine::error::GMachineError;
use gmachine::eval::{Evaluator, DEFAULT_STACK_CAPACITY};
use gmachine::heap::Heap;
use gmachine::instr::Opcode;
use gmachine::loader;

struct ScBuilder {
    arity: i32,
    instrs: Vec<(Opcode, Option<i32>)>,
}

impl ScBuilder {
    fn new(arity: i32) -> Self {
        ScBuilder { arity, instrs: Vec::new() }
    }

    fn op(mut self, opcode: Opcode, arg: i32) -> Self {
        self.instrs.push((opcode, Some(arg)));
        self
    }

    fn unwind(mut self) -> Self {
        self.instrs.push((Opcode::Unwind, None));
        self
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.arity.to_be_bytes());
        out.extend_from_slice(&(self.instrs.len() as i32).to_be_bytes());
        for (opcode, arg) in &self.instrs {
            out.push(*opcode as u8);
            if let Some(arg) = arg {
                out.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }
}

fn assemble(supercombs: &[ScBuilder]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(supercombs.len() as i32).to_be_bytes());
    for sc in supercombs {
        sc.encode(&mut out);
    }
    out
}

fn run_bytes(bytes: &[u8], heap_size: usize) -> Result<i64, GMachineError> {
    let mut heap = Heap::new(heap_size)?;
    let globals = loader::load(&mut &bytes[..], &mut heap)?;
    Evaluator::new(heap, globals, DEFAULT_STACK_CAPACITY).run()
}

#[test]
fn constant_program_halts_with_42() {
    // Sc #0 arity=0 [PushInt 42, Unwind]. Result: 42. No trailing `Update`:
    // the entry's own node doubles as `current_sc`, and `Update` must never
    // rewrite that node in place (spec.md §9's PC-relocation invariant).
    let bytes = assemble(&[ScBuilder::new(0).op(Opcode::PushInt, 42).unwind()]);
    assert_eq!(run_bytes(&bytes, 64 * 1024).unwrap(), 42);
}

#[test]
fn addition_computes_3_plus_4() {
    // 3 + 4: push 4, push 3, PrimIntAdd, Unwind. Result: 7.
    let bytes = assemble(&[ScBuilder::new(0)
        .op(Opcode::PushInt, 4)
        .op(Opcode::PushInt, 3)
        .op(Opcode::PrimIntAdd, 0)
        .unwind()]);
    assert_eq!(run_bytes(&bytes, 64 * 1024).unwrap(), 7);
}

#[test]
fn conditional_evaluates_if_0_then_10_else_20() {
    // if 0 then 10 else 20. Result: 20.
    let bytes = assemble(&[ScBuilder::new(0)
        .op(Opcode::PushInt, 0)
        .op(Opcode::PrimIntCond, 2)
        .op(Opcode::PushInt, 10)
        .op(Opcode::Jump, 1)
        .op(Opcode::PushInt, 20)
        .unwind()]);
    assert_eq!(run_bytes(&bytes, 64 * 1024).unwrap(), 20);
}

#[test]
fn sharing_forces_let_binding_once_and_result_is_22() {
    // let x = 5 + 6 in x + x. Result: 22. (Invocation-count instrumentation
    // for the "forced exactly once" half of this property lives in
    // src/eval.rs's own test, which has access to the private counter;
    // this test exercises the same program through the public loader path.)
    let bytes = assemble(&[ScBuilder::new(0)
        .op(Opcode::Alloc, 1)
        .op(Opcode::PushInt, 6)
        .op(Opcode::PushInt, 5)
        .op(Opcode::PrimIntAdd, 0)
        .op(Opcode::Update, 0)
        .op(Opcode::PushLocal, 0)
        .op(Opcode::Eval, 0)
        .op(Opcode::PushLocal, 1)
        .op(Opcode::Eval, 0)
        .op(Opcode::PrimIntAdd, 0)
        .op(Opcode::Slide, 1)
        .unwind()]);
    assert_eq!(run_bytes(&bytes, 64 * 1024).unwrap(), 22);
}

#[test]
fn partial_application_under_unwind_names_the_offending_global() {
    // Entry applies the arity-2 supercombinator #1 to a single argument and
    // unwinds straight into it. Must abort naming global_index 1.
    let callee = ScBuilder::new(2)
        .op(Opcode::PushInt, 0)
        .op(Opcode::Update, 0)
        .unwind();
    let entry = ScBuilder::new(0)
        .op(Opcode::PushGlobal, 1)
        .op(Opcode::PushInt, 9)
        .op(Opcode::MkAp, 0)
        .unwind();
    let bytes = assemble(&[entry, callee]);
    let err = run_bytes(&bytes, 64 * 1024).unwrap_err();
    match err {
        GMachineError::Malformed(gmachine::error::MalformedProgramKind::PartialApplication {
            global_index,
            arity,
            have,
        }) => {
            assert_eq!(global_index, 1);
            assert_eq!(arity, 2);
            assert_eq!(have, 1);
        }
        other => panic!("expected PartialApplication, got {other:?}"),
    }
}

#[test]
fn gc_survives_every_live_node_kind_with_gc_every_alloc() {
    // A program whose pre-GC live set touches every node kind: an Ap spine
    // (MkAp), a pending Dump (Eval), an Indirect chain (Alloc/Update), and a
    // Supercomb reference held across a call (PushGlobal of the callee,
    // still on the stack as the entry's own current_sc while evaluating the
    // let-bound share). Forcing a collection at every allocation must leave
    // the result unchanged (spec.md §8, "GC survival").
    let callee = ScBuilder::new(1)
        .op(Opcode::PushLocal, 0)
        .op(Opcode::Eval, 0)
        .op(Opcode::PushInt, 1)
        .op(Opcode::PrimIntAdd, 0)
        .op(Opcode::Slide, 1)
        .unwind();
    let entry = ScBuilder::new(0)
        .op(Opcode::Alloc, 1) // x, shared
        .op(Opcode::PushInt, 6)
        .op(Opcode::PushInt, 5)
        .op(Opcode::PrimIntAdd, 0)
        .op(Opcode::Update, 0) // x = 5 + 6
        .op(Opcode::PushLocal, 0) // x
        .op(Opcode::PushGlobal, 1) // succ
        .op(Opcode::MkAp, 0) // succ x
        .op(Opcode::Eval, 0)
        .op(Opcode::Slide, 1)
        .unwind();
    let bytes = assemble(&[entry, callee]);

    let expected = {
        let mut heap = Heap::new(64 * 1024).unwrap();
        let globals = loader::load(&mut &bytes[..], &mut heap).unwrap();
        Evaluator::new(heap, globals, DEFAULT_STACK_CAPACITY).run().unwrap()
    };

    let forced = {
        let mut heap = Heap::new(64 * 1024).unwrap();
        let globals = loader::load(&mut &bytes[..], &mut heap).unwrap();
        Evaluator::new(heap, globals, DEFAULT_STACK_CAPACITY)
            .with_gc_every_alloc(true)
            .run()
            .unwrap()
    };

    assert_eq!(expected, forced);
    assert_eq!(expected, 12);
}

#[test]
fn bytecode_round_trip_num_instr_matches_decoded_length() {
    // For every supercombinator, numInstr must equal the length of its
    // decoded instruction stream (spec.md §8, "Bytecode round-trip").
    let bytes = assemble(&[
        ScBuilder::new(0)
            .op(Opcode::PushInt, 1)
            .op(Opcode::PushInt, 2)
            .op(Opcode::PrimIntAdd, 0)
            .op(Opcode::Update, 0)
            .unwind(),
        ScBuilder::new(1).op(Opcode::PushLocal, 0).unwind(),
    ]);
    let mut heap = Heap::new(64 * 1024).unwrap();
    let globals = loader::load(&mut &bytes[..], &mut heap).unwrap();
    unsafe {
        let sc0 = &*globals[0].as_supercomb();
        assert_eq!(sc0.num_instr as usize, sc0.code().len());
        assert_eq!(sc0.num_instr, 5);
        let sc1 = &*globals[1].as_supercomb();
        assert_eq!(sc1.num_instr as usize, sc1.code().len());
        assert_eq!(sc1.num_instr, 2);
    }
}

#[test]
fn truncated_bytecode_stream_is_a_load_error_not_a_panic() {
    let mut bytes = assemble(&[ScBuilder::new(0)
        .op(Opcode::PushInt, 42)
        .op(Opcode::Update, 0)
        .unwind()]);
    bytes.truncate(bytes.len() - 3);
    let err = run_bytes(&bytes, 64 * 1024).unwrap_err();
    assert!(matches!(err, GMachineError::Load(_)));
}

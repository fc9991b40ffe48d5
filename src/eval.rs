//! The G-Machine evaluator: a threaded-dispatch loop over opcodes, plus a
//! nested tag dispatch inside `Unwind`.
//!
//! Grounded on `examples/original_source/interp/Interpreter.c`'s `evaluate`
//! (the `DISPATCH`/`DISPATCH_UNWIND` macros, the `ALLOC`/safe-point
//! discipline, every instruction handler), translated into a `match`-driven
//! loop per spec.md §9's guidance for implementations without computed
//! goto. Unlike the reference's dedicated hardware registers for the hot
//! allocator/stack pointers, this keeps all evaluator state as struct
//! fields — there is no separate "spill to state struct" step at a
//! safe-point because the fields *are* the canonical state already
//! (spec.md §9, "Global evaluator registers").

use std::mem::size_of;

use crate::error::{GMachineError, MalformedProgramKind};
use crate::header::{Header, Tag};
use crate::heap::{Heap, Roots};
use crate::instr::{Instr, Opcode};
use crate::node::{ApNode, DumpNode, IndirectNode, IntNode, NodePtr};

/// Reference implementation default (spec.md §4.3).
pub const DEFAULT_STACK_CAPACITY: usize = 1024;

enum Unwound {
    Continue,
    Halt(i64),
}

/// The evaluator's externally visible state (spec.md §4.3, "State
/// machine"). `Faulted` is not stored explicitly — a fatal `Err` returned
/// from [`Evaluator::run`] *is* the `Faulted` state, since nothing of this
/// evaluator survives a fatal error to be inspected afterward.
#[derive(Debug, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

pub struct Evaluator {
    heap: Heap,
    globals: Vec<NodePtr>,
    stack: Vec<NodePtr>,
    stack_capacity: usize,
    current_sc: NodePtr,
    pc_offset: i32,
    dump_depth: i32,
    state: State,
    /// Forces a collection at every allocating instruction instead of only
    /// when the bump allocator would overflow (the reference's
    /// `GMACH_GC_DEBUG` mode). Exercises the "GC transparency" property
    /// (spec.md §8) without needing a multi-megabyte program to provoke a
    /// real overflow.
    gc_every_alloc: bool,
    /// Gates the diagnostic per-instruction trace (spec.md §6.3). Off by
    /// default; the reference interpreter's tracer is likewise a debug-build
    /// opt-in, not something production runs pay for.
    trace: bool,
    #[cfg(test)]
    prim_add_log: Vec<(i64, i64)>,
}

impl Evaluator {
    /// `globals[0]` is the entry supercombinator (spec.md §4.4); the
    /// evaluator starts with `current_sc = globals[0]` and `pc = 0`, no
    /// initial stack content.
    pub fn new(heap: Heap, globals: Vec<NodePtr>, stack_capacity: usize) -> Self {
        let current_sc = globals[0];
        debug_assert_eq!(current_sc.tag(), Tag::Supercomb);
        Evaluator {
            heap,
            globals,
            stack: Vec::with_capacity(stack_capacity.min(64)),
            stack_capacity,
            current_sc,
            pc_offset: 0,
            dump_depth: 0,
            state: State::Running,
            gc_every_alloc: false,
            trace: false,
            #[cfg(test)]
            prim_add_log: Vec::new(),
        }
    }

    /// Forces a collection on every allocating instruction rather than only
    /// at overflow (spec.md §8, "GC transparency").
    pub fn with_gc_every_alloc(mut self, on: bool) -> Self {
        self.gc_every_alloc = on;
        self
    }

    /// Enables the per-instruction diagnostic trace (spec.md §6.3).
    pub fn with_trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn prim_add_log(&self) -> &[(i64, i64)] {
        &self.prim_add_log
    }

    /// Runs the entry supercombinator to weak-head normal form and returns
    /// its `Int` value. Consumes `self` — halting is terminal (spec.md
    /// §4.3).
    pub fn run(mut self) -> Result<i64, GMachineError> {
        self.run_mut()
    }

    /// Shared implementation of [`Evaluator::run`], taking `&mut self` so
    /// tests can inspect evaluator state (e.g. `prim_add_log`) after
    /// completion; the public, consuming `run` is the real entry point since
    /// a halted or faulted evaluator has nothing left to do with `self`.
    fn run_mut(&mut self) -> Result<i64, GMachineError> {
        loop {
            let instr = self.fetch();
            if self.trace {
                self.trace_dispatch(instr);
            }
            match instr.opcode {
                Opcode::Unwind => match self.unwind()? {
                    Unwound::Halt(v) => {
                        self.state = State::Halted;
                        return Ok(v);
                    }
                    Unwound::Continue => continue,
                },
                Opcode::MkAp => {
                    // Keep `func`/`arg` rooted on `self.stack` through the
                    // allocation below (a GC safe-point) instead of popping
                    // them into bare locals first — popping first would
                    // leave them unrooted for that allocation's potential
                    // collection, matching the reference's
                    // `ALLOC_NODE(Ap, w)` before `POP()` ordering.
                    self.nth_local(1, "MkAp")?;
                    let node = self.alloc_ap_node()?;
                    let func = self.pop("MkAp")?;
                    let arg = self.pop("MkAp")?;
                    unsafe {
                        (*node.as_ap()).func = func;
                        (*node.as_ap()).arg = arg;
                    }
                    self.push(node)?;
                }
                Opcode::Eval => match self.eval(instr)? {
                    Unwound::Halt(v) => {
                        self.state = State::Halted;
                        return Ok(v);
                    }
                    Unwound::Continue => {}
                },
                Opcode::PrimIntAdd => self.prim_int(instr.opcode, |a, b| a + b)?,
                Opcode::PrimIntSub => self.prim_int(instr.opcode, |a, b| a - b)?,
                Opcode::PrimIntLt => self.prim_int(instr.opcode, |a, b| (a < b) as i64)?,
                Opcode::PrimIntCond => {
                    let x = self.pop("PrimIntCond")?;
                    let v = self.int_value(x, "PrimIntCond")?;
                    if v == 0 {
                        self.pc_offset += instr.arg;
                    }
                }
                Opcode::Jump => {
                    self.pc_offset += instr.arg;
                }
                Opcode::PushInt => {
                    let node = self.alloc_int(instr.arg as i64)?;
                    self.push(node)?;
                }
                Opcode::PushLocal => {
                    let node = self.nth_local(instr.arg as usize, "PushLocal")?;
                    self.push(node)?;
                }
                Opcode::PushGlobal => {
                    let node = *self
                        .globals
                        .get(instr.arg as usize)
                        .ok_or(GMachineError::Malformed(MalformedProgramKind::StackUnderflow {
                            op: "PushGlobal",
                        }))?;
                    self.push(node)?;
                }
                Opcode::Pop => {
                    self.drop_n(instr.arg as usize, "Pop")?;
                }
                Opcode::Update => {
                    let x = self.pop("Update")?;
                    let target = self.nth_local(instr.arg as usize, "Update")?;
                    unsafe {
                        *target.header() = Header::new(Tag::Indirect);
                        (*target.as_indirect()).dest = x;
                    }
                }
                Opcode::Slide => {
                    let x = self.pop("Slide")?;
                    self.drop_n(instr.arg as usize, "Slide")?;
                    self.push(x)?;
                }
                Opcode::Alloc => {
                    for _ in 0..instr.arg {
                        let node = self.alloc_node(size_of::<IndirectNode>())?;
                        unsafe {
                            *node.header() = Header::new(Tag::Indirect);
                            (*node.as_indirect()).dest = NodePtr::NULL;
                        }
                        self.push(node)?;
                    }
                }
            }
        }
    }

    #[inline]
    fn fetch(&mut self) -> Instr {
        let sc = unsafe { &*self.current_sc.as_supercomb() };
        let instr = sc.code()[self.pc_offset as usize];
        self.pc_offset += 1;
        instr
    }

    /// `NTH_LOCAL(n)` from the reference: the stack element `n` slots below
    /// the top (0 = top).
    fn nth_local(&self, n: usize, op: &'static str) -> Result<NodePtr, GMachineError> {
        let len = self.stack.len();
        if n >= len {
            return Err(GMachineError::Malformed(MalformedProgramKind::StackUnderflow { op }));
        }
        Ok(self.stack[len - 1 - n])
    }

    fn push(&mut self, node: NodePtr) -> Result<(), GMachineError> {
        if self.stack.len() >= self.stack_capacity {
            return Err(GMachineError::StackOverflow);
        }
        self.stack.push(node);
        Ok(())
    }

    fn pop(&mut self, op: &'static str) -> Result<NodePtr, GMachineError> {
        self.stack
            .pop()
            .ok_or(GMachineError::Malformed(MalformedProgramKind::StackUnderflow { op }))
    }

    fn drop_n(&mut self, n: usize, op: &'static str) -> Result<(), GMachineError> {
        if n > self.stack.len() {
            return Err(GMachineError::Malformed(MalformedProgramKind::StackUnderflow { op }));
        }
        self.stack.truncate(self.stack.len() - n);
        Ok(())
    }

    fn int_value(&self, node: NodePtr, op: &'static str) -> Result<i64, GMachineError> {
        if node.tag() != Tag::Int {
            return Err(GMachineError::Malformed(MalformedProgramKind::WrongTag {
                op,
                expected: "Int",
            }));
        }
        Ok(node.int_value())
    }

    /// Every opcode named here is, by construction, a GC safe-point
    /// (spec.md §4.3): the root set (globals/current_sc/stack) lives
    /// directly in `self`'s fields, so there is nothing extra to save
    /// before calling into the collector.
    fn alloc_node(&mut self, size: usize) -> Result<NodePtr, GMachineError> {
        if !self.gc_every_alloc {
            if let Some(addr) = self.heap.allocate(size) {
                return Ok(addr);
            }
        }
        let mut roots = Roots {
            globals: &mut self.globals,
            current_sc: &mut self.current_sc,
            stack: &mut self.stack,
        };
        self.heap.collect(&mut roots, size)
    }

    fn alloc_int(&mut self, value: i64) -> Result<NodePtr, GMachineError> {
        let node = self.alloc_node(size_of::<IntNode>())?;
        unsafe {
            *node.header() = Header::new(Tag::Int);
            (*node.as_int()).value = value;
        }
        Ok(node)
    }

    /// Allocates a bare `Ap` node with `func`/`arg` left null. The caller
    /// must keep both intended operands rooted on `self.stack` until after
    /// this returns, then pop and fill them in itself — see `Opcode::MkAp`'s
    /// safe-point ordering.
    fn alloc_ap_node(&mut self) -> Result<NodePtr, GMachineError> {
        let node = self.alloc_node(size_of::<ApNode>())?;
        unsafe {
            *node.header() = Header::new(Tag::Ap);
            (*node.as_ap()).func = NodePtr::NULL;
            (*node.as_ap()).arg = NodePtr::NULL;
        }
        Ok(node)
    }

    fn prim_int(&mut self, op: Opcode, f: impl Fn(i64, i64) -> i64) -> Result<(), GMachineError> {
        let name = match op {
            Opcode::PrimIntAdd => "PrimIntAdd",
            Opcode::PrimIntSub => "PrimIntSub",
            Opcode::PrimIntLt => "PrimIntLt",
            _ => unreachable!("prim_int only called for primitive int ops"),
        };
        // "b" on top, "a" below; result is a op b (spec.md §4.3, and
        // DESIGN.md's resolution of the argument-order Open Question).
        let b = self.pop(name)?;
        let a = self.pop(name)?;
        let bv = self.int_value(b, name)?;
        let av = self.int_value(a, name)?;
        #[cfg(test)]
        if op == Opcode::PrimIntAdd {
            self.prim_add_log.push((av, bv));
        }
        let node = self.alloc_int(f(av, bv))?;
        self.push(node)
    }

    /// Prints one diagnostic line for the instruction about to dispatch:
    /// opcode, optional argument, and the stack bottom-to-top down to (and
    /// including) the first `Dump` found scanning from the top — or the
    /// whole stack if none is present (spec.md §6.3).
    fn trace_dispatch(&self, instr: Instr) {
        let mut cutoff = 0;
        for (i, node) in self.stack.iter().enumerate().rev() {
            cutoff = i;
            if node.tag() == Tag::Dump {
                break;
            }
        }
        let visible = if self.stack.is_empty() {
            &self.stack[..]
        } else {
            &self.stack[cutoff..]
        };
        let stack_repr: Vec<String> = visible.iter().map(|n| Self::node_trace_repr(*n)).collect();
        if instr.opcode.has_arg() {
            eprintln!("{:?} {} | [{}]", instr.opcode, instr.arg, stack_repr.join(", "));
        } else {
            eprintln!("{:?} | [{}]", instr.opcode, stack_repr.join(", "));
        }
    }

    fn node_trace_repr(node: NodePtr) -> String {
        match node.tag() {
            Tag::Int => format!("Int({})", node.int_value()),
            Tag::Ap => "Ap".to_string(),
            Tag::Indirect => "Indirect".to_string(),
            Tag::Supercomb => {
                let sc = unsafe { &*node.as_supercomb() };
                format!("Supercomb(#{})", sc.global_index)
            }
            Tag::Dump => "Dump".to_string(),
        }
    }

    /// `Eval`: pop `x`, push a `Dump` recording the resumption context,
    /// push `x` back, then fall into `Unwind`.
    ///
    /// `x` is only peeked here, not popped, until after the `Dump`
    /// allocation below: popping it first would leave it as a bare local
    /// `NodePtr`, unrooted for that allocation's potential GC safe-point
    /// (matching the reference's `ALLOC_NODE(Dump, w)` before `POP()`
    /// ordering in `HandleEval`).
    fn eval(&mut self, _instr: Instr) -> Result<Unwound, GMachineError> {
        self.nth_local(0, "Eval")?;
        self.dump_depth += 1;
        let saved_stack_base = (self.stack.len() - 1) as u32;
        let saved_sc = self.current_sc;
        let saved_pc_offset = self.pc_offset;
        let depth = self.dump_depth;

        let dump = self.alloc_node(size_of::<DumpNode>())?;
        let x = self.pop("Eval")?;
        unsafe {
            *dump.header() = Header::new(Tag::Dump);
            let d = dump.as_dump();
            (*d).saved_stack_base = saved_stack_base;
            (*d).saved_sc = saved_sc;
            (*d).saved_pc_offset = saved_pc_offset;
            (*d).depth = depth;
        }
        self.push(dump)?;
        self.push(x)?;
        self.unwind()
    }

    /// The sub-dispatch inside `Unwind`, threaded by the top-of-stack
    /// node's tag (spec.md §4.3). Loops internally for `Ap`/`Indirect`;
    /// returns to the outer fetch-dispatch loop once it reaches WHNF
    /// (`Int`) or rearranges the stack for a `Supercomb` call.
    fn unwind(&mut self) -> Result<Unwound, GMachineError> {
        loop {
            let x = self.nth_local(0, "Unwind")?;
            match x.tag() {
                Tag::Int => {
                    if self.stack.len() == 1 {
                        return Ok(Unwound::Halt(x.int_value()));
                    }
                    let dump_ptr = self.nth_local(1, "Unwind")?;
                    if dump_ptr.tag() != Tag::Dump {
                        return Err(GMachineError::Malformed(MalformedProgramKind::DumpUnderflow));
                    }
                    let dump = unsafe { &*dump_ptr.as_dump() };
                    debug_assert_eq!(
                        self.dump_depth, dump.depth,
                        "Dump nesting must match the evaluator's dumpDepth counter"
                    );
                    self.dump_depth -= 1;
                    self.current_sc = dump.saved_sc;
                    self.pc_offset = dump.saved_pc_offset;
                    self.stack.truncate(dump.saved_stack_base as usize);
                    self.push(x)?;
                    return Ok(Unwound::Continue);
                }
                Tag::Ap => {
                    let func = unsafe { (*x.as_ap()).func };
                    self.push(func)?;
                }
                Tag::Indirect => {
                    let dest = unsafe { (*x.as_indirect()).dest };
                    debug_assert!(!dest.is_null(), "Unwind must never dereference a null Indirect");
                    *self.stack.last_mut().expect("checked non-empty by nth_local above") = dest;
                }
                Tag::Supercomb => {
                    let sc = unsafe { &*x.as_supercomb() };
                    let arity = sc.arity as usize;
                    let have = self.stack.len();
                    if have < arity + 1 {
                        return Err(GMachineError::Malformed(MalformedProgramKind::PartialApplication {
                            global_index: sc.global_index,
                            arity: sc.arity,
                            have: have.saturating_sub(1),
                        }));
                    }
                    for i in 0..arity {
                        let ap_ptr = self.nth_local(i + 1, "Unwind")?;
                        let arg = unsafe { (*ap_ptr.as_ap()).arg };
                        let idx = self.stack.len() - 1 - i;
                        self.stack[idx] = arg;
                    }
                    self.current_sc = x;
                    self.pc_offset = 0;
                    return Ok(Unwound::Continue);
                }
                Tag::Dump => {
                    return Err(GMachineError::Malformed(MalformedProgramKind::DumpUnderflow));
                }
            }
        }
    }
}

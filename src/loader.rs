//! Decodes a bytecode stream into the heap's initial state: one
//! [`SupercombNode`] per declared supercombinator, returned as the globals
//! table (spec.md §4.4).
//!
//! Grounded on `examples/original_source/interp/Interpreter.c`'s
//! `loadFile`/`readSCNode`/`readInstr`/`readInt32` — this module is the
//! Rust translation of that big-endian reader, allocating directly into the
//! heap rather than a separate loader arena (spec.md §2, component 4).

use std::io::Read;
use std::mem::size_of;

use crate::error::{GMachineError, LoadError};
use crate::header::{Header, Tag};
use crate::heap::Heap;
use crate::instr::{Instr, Opcode};
use crate::node::NodePtr;

fn read_u8(r: &mut impl Read) -> Result<u8, LoadError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_i32_be(r: &mut impl Read) -> Result<i32, LoadError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_instr(r: &mut impl Read) -> Result<Instr, LoadError> {
    let opcode = Opcode::from_u8(read_u8(r)?)?;
    let arg = if opcode.has_arg() { read_i32_be(r)? } else { 0 };
    Ok(Instr { opcode, arg })
}

fn read_supercomb(r: &mut impl Read, nth: i32, heap: &mut Heap) -> Result<NodePtr, GMachineError> {
    let arity = read_i32_be(r)?;
    let num_instr = read_i32_be(r)?;
    if num_instr < 0 {
        return Err(LoadError::Truncated {
            context: "negative instruction count",
            detail: num_instr as i64,
        }
        .into());
    }

    let mut instrs = Vec::with_capacity(num_instr as usize);
    for _ in 0..num_instr {
        instrs.push(read_instr(r)?);
    }

    let size = size_of::<crate::node::SupercombNode>() + instrs.len() * size_of::<Instr>();
    let node = heap
        .allocate(size)
        .ok_or(GMachineError::HeapInit("heap exhausted while loading bytecode"))?;
    unsafe {
        *node.header() = Header::new(Tag::Supercomb);
        let sc = node.as_supercomb();
        (*sc).arity = arity as i16;
        (*sc).global_index = nth as i16;
        (*sc).num_instr = instrs.len() as i32;
        std::ptr::copy_nonoverlapping(instrs.as_ptr(), (*sc).code_ptr(), instrs.len());
    }
    Ok(node)
}

/// Reads the whole bytecode stream, allocating each supercombinator into
/// `heap` in declaration order. The returned `Vec`'s index *is* each
/// supercombinator's `globalIndex` (spec.md §4.4) — `globals[0]` is the
/// entry point.
pub fn load(r: &mut impl Read, heap: &mut Heap) -> Result<Vec<NodePtr>, GMachineError> {
    let num_supercombs = read_i32_be(r)?;
    if num_supercombs < 0 {
        return Err(LoadError::Truncated {
            context: "negative supercombinator count",
            detail: num_supercombs as i64,
        }
        .into());
    }

    let mut globals = Vec::with_capacity(num_supercombs as usize);
    for i in 0..num_supercombs {
        globals.push(read_supercomb(r, i, heap)?);
    }
    if globals.is_empty() {
        return Err(LoadError::Truncated {
            context: "program declares zero supercombinators (no entry point)",
            detail: 0,
        }
        .into());
    }
    Ok(globals)
}

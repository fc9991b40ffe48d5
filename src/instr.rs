//! Opcodes and the in-memory instruction representation.
//!
//! The opcode ordering is load-bearing: spec.md §3.3 defines "takes an
//! argument" as "strictly after `Unwind`", and the reference interpreter's
//! `opHasArg` (`op > OpUnwind`) relies on the same ordering.

use crate::error::LoadError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Opcode {
    Unwind = 0,
    MkAp,
    Eval,
    PrimIntAdd,
    PrimIntSub,
    PrimIntLt,
    PrimIntCond,
    Jump,
    PushInt,
    PushLocal,
    PushGlobal,
    Pop,
    Update,
    Slide,
    Alloc,
}

impl Opcode {
    #[inline(always)]
    pub fn has_arg(self) -> bool {
        self != Opcode::Unwind
    }

    pub fn from_u8(byte: u8) -> Result<Self, LoadError> {
        use Opcode::*;
        Ok(match byte {
            0 => Unwind,
            1 => MkAp,
            2 => Eval,
            3 => PrimIntAdd,
            4 => PrimIntSub,
            5 => PrimIntLt,
            6 => PrimIntCond,
            7 => Jump,
            8 => PushInt,
            9 => PushLocal,
            10 => PushGlobal,
            11 => Pop,
            12 => Update,
            13 => Slide,
            14 => Alloc,
            other => {
                return Err(LoadError::Truncated {
                    context: "unrecognized opcode byte",
                    detail: other as i64,
                })
            }
        })
    }
}

/// In-memory instruction: one 64-bit unit (opcode byte + padding + 32-bit
/// signed argument), matching the reference's `union Instr`. This is
/// distinct from the *wire* encoding (§4.4), which omits the argument
/// entirely for opcodes that don't take one.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Instr {
    pub opcode: Opcode,
    pub arg: i32,
}

use std::fmt;
use std::ops::Range;

use smol_str::SmolStr;
use thiserror::Error;
use veribc_isa::CODEUNIT_SIZE;

/// The check that caught a bad stack depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// The depth before the instruction executes.
    Entry,
    /// The depth after the instruction when control continues to the next one.
    Fallthrough,
    /// The depth on the edge to the jump target.
    Taken,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Entry => write!(f, "on entry"),
            Edge::Fallthrough => write!(f, "after fall-through"),
            Edge::Taken => write!(f, "on taken branch"),
        }
    }
}

/// Which bound a stack depth violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    BelowMinimum,
    AboveMaximum(u32),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::BelowMinimum => write!(f, "dips below minimum of 0"),
            Bound::AboveMaximum(max) => write!(f, "exceeds maximum of {max}"),
        }
    }
}

/// Why a single code object is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Bytecode length {len} is not a positive multiple of {}.", CODEUNIT_SIZE)]
    MalformedLength { len: usize },
    #[error("First instruction has operand {operand}, expected 0.")]
    MalformedHeader { operand: u8 },
    #[error("Operation {opcode} at offset {offset} does not exist.")]
    MalformedOpcode { opcode: u8, offset: usize },
    #[error(
        "Operation {mnemonic} @ offset {} can not jump to instruction {target} of {count}.",
        .index * CODEUNIT_SIZE
    )]
    InvalidJumpTarget {
        mnemonic: SmolStr,
        index: usize,
        target: usize,
        count: usize,
    },
    #[error(
        "Stack depth {depth} {bound} for operation {mnemonic} @ offset {} ({edge}).",
        .index * CODEUNIT_SIZE
    )]
    StackDepth {
        depth: i64,
        bound: Bound,
        edge: Edge,
        mnemonic: SmolStr,
        index: usize,
    },
}

impl VerifyError {
    /// Index of the offending instruction, if the error is about one.
    pub fn index(&self) -> Option<usize> {
        match self {
            VerifyError::MalformedLength { .. } => None,
            VerifyError::MalformedHeader { .. } => Some(0),
            VerifyError::MalformedOpcode { offset, .. } => Some(offset / CODEUNIT_SIZE),
            VerifyError::InvalidJumpTarget { index, .. } | VerifyError::StackDepth { index, .. } => {
                Some(*index)
            }
        }
    }
}

/// A [`VerifyError`] together with the code object it was found in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("In code object `{code}`: {kind}")]
pub struct VerificationError {
    /// Name of the failing code object.
    pub code: SmolStr,
    /// Source range of the offending instruction, if the code object has a location table.
    pub location: Option<Range<usize>>,
    pub kind: VerifyError,
}

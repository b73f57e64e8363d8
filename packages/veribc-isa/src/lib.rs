//! Instruction set descriptions and code objects for `veribc`.
//!
//! An [`InstructionSet`] is a plain value: the opcode table, how every opcode transfers control,
//! and how it changes the depth of the operand stack. Nothing here is global, so several sets can
//! coexist and tests can describe tiny synthetic ones.

pub mod code;
mod cpython;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;

use smol_str::SmolStr;

pub use code::{AssembleError, Assembler, CodeObject, Const};

/// Size of one instruction in bytes: an opcode byte followed by an operand byte.
pub const CODEUNIT_SIZE: usize = 2;

/// How the operand of a jump encodes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    /// The operand is the index of the target instruction.
    Absolute,
    /// The operand is added to the index of the following instruction.
    Relative,
}

/// How an instruction transfers control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Control always continues with the next instruction.
    Plain,
    /// Control either jumps to the target or falls through, depending on a runtime condition.
    Branch(JumpKind),
    /// Control always jumps to the target.
    Jump(JumpKind),
    /// Leaves the code object.
    Return,
    /// Raises or re-raises an exception.
    Raise,
}

impl Flow {
    /// Whether the instruction has a jump target.
    pub fn is_branch(self) -> bool {
        matches!(self, Flow::Branch(_) | Flow::Jump(_))
    }

    /// Whether control can never fall through to the next instruction.
    pub fn is_uncond_transfer(self) -> bool {
        matches!(self, Flow::Jump(_) | Flow::Return | Flow::Raise)
    }

    pub fn is_return(self) -> bool {
        self == Flow::Return
    }

    pub fn is_raise(self) -> bool {
        self == Flow::Raise
    }

    pub fn jump_kind(self) -> Option<JumpKind> {
        match self {
            Flow::Branch(kind) | Flow::Jump(kind) => Some(kind),
            Flow::Plain | Flow::Return | Flow::Raise => None,
        }
    }
}

/// Net change of the operand stack depth caused by one instruction.
#[derive(Debug, Clone, Copy)]
pub enum StackEffect {
    /// Same effect regardless of operand and of which edge is followed.
    Fixed(i32),
    /// Different effects on the taken edge and on the fall-through edge.
    Branch { taken: i32, fallthrough: i32 },
    /// Computed from the operand and whether the jump is taken.
    Dynamic(fn(u8, bool) -> i32),
}

impl StackEffect {
    pub fn eval(&self, operand: u8, taken: bool) -> i32 {
        match *self {
            StackEffect::Fixed(effect) => effect,
            StackEffect::Branch { taken: t, fallthrough } => {
                if taken {
                    t
                } else {
                    fallthrough
                }
            }
            StackEffect::Dynamic(f) => f(operand, taken),
        }
    }
}

/// Everything the verifier needs to know about one opcode.
#[derive(Debug, Clone)]
pub struct OpcodeInfo {
    pub opcode: u8,
    pub mnemonic: SmolStr,
    pub flow: Flow,
    pub effect: StackEffect,
}

impl fmt::Display for OpcodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.mnemonic, self.opcode)
    }
}

/// An instruction set: the table of known opcodes plus their classification and stack effects.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    name: SmolStr,
    ops: Vec<Option<OpcodeInfo>>,
    by_mnemonic: HashMap<SmolStr, u8>,
}

impl InstructionSet {
    pub fn builder(name: &str) -> InstructionSetBuilder {
        InstructionSetBuilder {
            set: InstructionSet {
                name: name.into(),
                ops: vec![None; 256],
                by_mnemonic: HashMap::new(),
            },
        }
    }

    /// The CPython 3.10 instruction set. Jump operands count instructions, not bytes.
    pub fn cpython310() -> Self {
        cpython::cpython310()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an opcode. Returns `None` for opcodes the set does not define.
    pub fn get(&self, opcode: u8) -> Option<&OpcodeInfo> {
        self.ops[opcode as usize].as_ref()
    }

    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&OpcodeInfo> {
        self.by_mnemonic
            .get(mnemonic)
            .and_then(|&opcode| self.get(opcode))
    }

    /// The stack effect of `opcode`, or `None` if the opcode is unknown.
    pub fn stack_effect(&self, opcode: u8, operand: u8, taken: bool) -> Option<i32> {
        self.get(opcode).map(|info| info.effect.eval(operand, taken))
    }

    /// All defined opcodes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.ops.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_mnemonic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mnemonic.is_empty()
    }
}

pub struct InstructionSetBuilder {
    set: InstructionSet,
}

impl InstructionSetBuilder {
    /// Defines `opcode`.
    ///
    /// # Panics
    /// Panics if `opcode` or `mnemonic` is already defined. Instruction sets are static tables, so
    /// a clash is a bug in the table.
    pub fn op(mut self, opcode: u8, mnemonic: &str, flow: Flow, effect: StackEffect) -> Self {
        assert!(
            self.set.ops[opcode as usize].is_none(),
            "opcode {opcode} is defined twice"
        );
        assert!(
            !self.set.by_mnemonic.contains_key(mnemonic),
            "mnemonic `{mnemonic}` is defined twice"
        );
        self.set.by_mnemonic.insert(mnemonic.into(), opcode);
        self.set.ops[opcode as usize] = Some(OpcodeInfo {
            opcode,
            mnemonic: mnemonic.into(),
            flow,
            effect,
        });
        self
    }

    /// Defines a non-jumping opcode with a fixed stack effect.
    pub fn plain(self, opcode: u8, mnemonic: &str, effect: i32) -> Self {
        self.op(opcode, mnemonic, Flow::Plain, StackEffect::Fixed(effect))
    }

    /// Defines a non-jumping opcode whose stack effect depends on its operand.
    pub fn dynamic(self, opcode: u8, mnemonic: &str, effect: fn(u8, bool) -> i32) -> Self {
        self.op(opcode, mnemonic, Flow::Plain, StackEffect::Dynamic(effect))
    }

    pub fn build(self) -> InstructionSet {
        self.set
    }
}

//! Code objects and a small assembler for building them.

use std::ops::Range;
use std::sync::Arc;

use smol_str::SmolStr;
use thiserror::Error;

use crate::{InstructionSet, JumpKind, CODEUNIT_SIZE};

/// A constant in the constant table of a [`CodeObject`].
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Str(SmolStr),
    /// A nested code object (function, class body, comprehension...).
    Code(Arc<CodeObject>),
}

/// A compiled unit: raw bytecode, the maximum stack depth declared by the compiler, and the
/// constant table.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    pub name: SmolStr,
    pub code: Vec<u8>,
    pub stacksize: u32,
    pub consts: Vec<Const>,
    /// Source range of every code unit, if the code object was built from source.
    pub locations: Vec<Range<usize>>,
}

impl CodeObject {
    pub fn new(name: &str, code: Vec<u8>, stacksize: u32) -> Self {
        Self {
            name: name.into(),
            code,
            stacksize,
            consts: Vec::new(),
            locations: Vec::new(),
        }
    }

    pub fn with_consts(mut self, consts: Vec<Const>) -> Self {
        self.consts = consts;
        self
    }

    /// Code objects directly nested in the constant table, in declaration order.
    pub fn nested(&self) -> impl Iterator<Item = &CodeObject> {
        self.consts.iter().filter_map(|c| match c {
            Const::Code(code) => Some(&**code),
            _ => None,
        })
    }

    /// Source range of the instruction at `index`, if known.
    pub fn location(&self, index: usize) -> Option<Range<usize>> {
        self.locations
            .get(index)
            .filter(|range| !range.is_empty())
            .cloned()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("unknown instruction `{0}` in instruction set `{1}`.")]
    UnknownMnemonic(SmolStr, SmolStr),
    #[error("instruction at {0} is not a jump.")]
    NotAJump(usize),
    #[error("operand {0} does not fit in a byte.")]
    OperandOutOfRange(i64),
    #[error("too many constants (at most 256).")]
    TooManyConsts,
}

/// Builds a [`CodeObject`] one instruction at a time.
#[derive(Debug)]
pub struct Assembler<'isa> {
    isa: &'isa InstructionSet,
    name: SmolStr,
    code: Vec<u8>,
    consts: Vec<Const>,
    locations: Vec<Range<usize>>,
    /// Source range attached to code units written from now on.
    location: Range<usize>,
}

impl<'isa> Assembler<'isa> {
    pub fn new(isa: &'isa InstructionSet, name: &str) -> Self {
        Self {
            isa,
            name: name.into(),
            code: Vec::new(),
            consts: Vec::new(),
            locations: Vec::new(),
            location: 0..0,
        }
    }

    pub fn isa(&self) -> &'isa InstructionSet {
        self.isa
    }

    /// Index of the next instruction to be written.
    pub fn len(&self) -> usize {
        self.code.len() / CODEUNIT_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn set_location(&mut self, location: Range<usize>) {
        self.location = location;
    }

    fn sync_locations(&mut self) {
        while self.locations.len() * CODEUNIT_SIZE < self.code.len() {
            self.locations.push(self.location.clone());
        }
    }

    /// Writes a new instruction to the code buffer. Returns the index of the instruction.
    pub fn write(&mut self, mnemonic: &str, operand: u8) -> Result<usize, AssembleError> {
        let info = self.isa.by_mnemonic(mnemonic).ok_or_else(|| {
            AssembleError::UnknownMnemonic(mnemonic.into(), self.isa.name().into())
        })?;
        let opcode = info.opcode;
        Ok(self.write_op(opcode, operand))
    }

    /// Writes an instruction without checking that the opcode exists.
    pub fn write_op(&mut self, opcode: u8, operand: u8) -> usize {
        let index = self.len();
        self.code.extend([opcode, operand]);
        self.sync_locations();
        index
    }

    /// Writes bytes verbatim. The result need not be a whole number of instructions.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
        self.sync_locations();
    }

    /// Patch the jump at `index` to jump to the next instruction to be written.
    pub fn patch_jump(&mut self, index: usize) -> Result<(), AssembleError> {
        self.patch_jump_to(index, self.len())
    }

    /// Patch the jump at `index` to jump to `target`, encoding the operand the way the opcode
    /// expects.
    pub fn patch_jump_to(&mut self, index: usize, target: usize) -> Result<(), AssembleError> {
        let offset = index * CODEUNIT_SIZE;
        let kind = self
            .code
            .get(offset)
            .and_then(|&opcode| self.isa.get(opcode))
            .and_then(|info| info.flow.jump_kind())
            .ok_or(AssembleError::NotAJump(index))?;
        let operand = jump_operand(kind, index, target)?;
        self.code[offset + 1] = operand;
        Ok(())
    }

    /// Adds a constant and returns its index.
    pub fn write_const(&mut self, value: Const) -> Result<u8, AssembleError> {
        let idx = u8::try_from(self.consts.len()).map_err(|_| AssembleError::TooManyConsts)?;
        self.consts.push(value);
        Ok(idx)
    }

    pub fn finish(self, stacksize: u32) -> CodeObject {
        CodeObject {
            name: self.name,
            code: self.code,
            stacksize,
            consts: self.consts,
            locations: self.locations,
        }
    }
}

/// Computes the operand that makes a jump at `index` land on `target`.
pub fn jump_operand(kind: JumpKind, index: usize, target: usize) -> Result<u8, AssembleError> {
    let operand = match kind {
        JumpKind::Absolute => target as i64,
        JumpKind::Relative => target as i64 - (index as i64 + 1),
    };
    u8::try_from(operand).map_err(|_| AssembleError::OperandOutOfRange(operand))
}

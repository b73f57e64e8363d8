//! Decoding raw bytecode into instructions.

use std::fmt;

use veribc_isa::{Flow, InstructionSet, JumpKind, OpcodeInfo, CODEUNIT_SIZE};

use crate::error::VerifyError;

/// One decoded code unit.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'isa> {
    pub opcode: u8,
    pub operand: u8,
    /// Position in instruction units, not bytes.
    pub index: usize,
    pub info: &'isa OpcodeInfo,
}

impl<'isa> Instruction<'isa> {
    pub fn mnemonic(&self) -> &'isa str {
        &self.info.mnemonic
    }

    pub fn flow(&self) -> Flow {
        self.info.flow
    }

    pub fn is_branch(&self) -> bool {
        self.flow().is_branch()
    }

    pub fn is_uncond_transfer(&self) -> bool {
        self.flow().is_uncond_transfer()
    }

    pub fn is_return(&self) -> bool {
        self.flow().is_return()
    }

    pub fn is_raise(&self) -> bool {
        self.flow().is_raise()
    }

    pub fn is_relative(&self) -> bool {
        self.flow().jump_kind() == Some(JumpKind::Relative)
    }

    pub fn offset(&self) -> usize {
        self.index * CODEUNIT_SIZE
    }

    pub fn next_index(&self) -> usize {
        self.index + 1
    }

    /// Index of the instruction this one jumps to. `None` if it is not a branch.
    pub fn jump_target_index(&self) -> Option<usize> {
        match self.flow().jump_kind()? {
            JumpKind::Absolute => Some(self.operand as usize),
            JumpKind::Relative => Some(self.next_index() + self.operand as usize),
        }
    }

    pub fn jump_target_offset(&self) -> Option<usize> {
        self.jump_target_index().map(|idx| idx * CODEUNIT_SIZE)
    }

    /// Stack depth change when executing this instruction, on the taken or fall-through edge.
    pub fn stack_effect(&self, taken: bool) -> i32 {
        self.info.effect.eval(self.operand, taken)
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.mnemonic(), self.operand)
    }
}

/// Length cannot be zero or odd.
pub fn check_length(bytecode: &[u8]) -> Result<(), VerifyError> {
    if bytecode.is_empty() || bytecode.len() % CODEUNIT_SIZE != 0 {
        return Err(VerifyError::MalformedLength {
            len: bytecode.len(),
        });
    }
    Ok(())
}

/// Decodes `bytecode` two bytes at a time, resolving every opcode against `isa` and checking
/// that every branch lands on an instruction.
pub fn decode<'isa>(
    isa: &'isa InstructionSet,
    bytecode: &[u8],
) -> Result<Vec<Instruction<'isa>>, VerifyError> {
    check_length(bytecode)?;
    let count = bytecode.len() / CODEUNIT_SIZE;
    let mut instrs = Vec::with_capacity(count);
    for (index, unit) in bytecode.chunks_exact(CODEUNIT_SIZE).enumerate() {
        let (opcode, operand) = (unit[0], unit[1]);
        let info = isa.get(opcode).ok_or(VerifyError::MalformedOpcode {
            opcode,
            offset: index * CODEUNIT_SIZE,
        })?;
        let instr = Instruction {
            opcode,
            operand,
            index,
            info,
        };
        // Operands count instructions, so a target is always aligned to a code unit.
        match instr.jump_target_index() {
            Some(target) if target >= count => {
                return Err(VerifyError::InvalidJumpTarget {
                    mnemonic: info.mnemonic.clone(),
                    index,
                    target,
                    count,
                });
            }
            _ => {}
        }
        instrs.push(instr);
    }
    Ok(instrs)
}

/// The first instruction must carry a zero operand.
pub fn check_header(instrs: &[Instruction<'_>]) -> Result<(), VerifyError> {
    match instrs.first() {
        Some(first) if first.operand != 0 => Err(VerifyError::MalformedHeader {
            operand: first.operand,
        }),
        _ => Ok(()),
    }
}

//! Control flow graph construction.
//!
//! Blocks are discovered the usual way: every jump target and every instruction after a branch,
//! return or raise starts a new block.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use la_arena::{Arena, Idx};
use tracing::debug;

use crate::instr::Instruction;

pub type BlockId = Idx<Block>;

/// A maximal run of instructions that is only entered at its start and only left at its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Indices of the instructions in this block.
    pub range: Range<usize>,
    /// The block entered when the last instruction jumps.
    pub taken: Option<BlockId>,
    /// The block entered when control continues past the last instruction.
    pub fallthrough: Option<BlockId>,
}

#[derive(Debug)]
pub struct Cfg<'isa> {
    pub instrs: Vec<Instruction<'isa>>,
    /// Allocated in ascending order of start index, so ids follow address order.
    pub blocks: Arena<Block>,
    starts: BTreeMap<usize, BlockId>,
}

/// Sequential number of a block, as printed in `bbN`.
pub fn block_number(id: BlockId) -> u32 {
    u32::from(id.into_raw())
}

impl<'isa> Cfg<'isa> {
    pub fn build(instrs: Vec<Instruction<'isa>>) -> Self {
        let count = instrs.len();
        let mut block_starts = BTreeSet::from([0]);
        for instr in &instrs {
            if let Some(target) = instr.jump_target_index() {
                block_starts.insert(instr.next_index());
                block_starts.insert(target);
            } else if instr.is_return() || instr.is_raise() {
                // Code after a return or raise is only reachable by a jump, if at all.
                if instr.next_index() < count {
                    block_starts.insert(instr.next_index());
                }
            }
        }
        // A branch in last position marks an index past the end.
        block_starts.retain(|&start| start < count);

        let mut blocks = Arena::new();
        let mut starts = BTreeMap::new();
        let ordered = block_starts.into_iter().collect::<Vec<_>>();
        for (i, &start) in ordered.iter().enumerate() {
            let end = ordered.get(i + 1).copied().unwrap_or(count);
            let id = blocks.alloc(Block {
                range: start..end,
                taken: None,
                fallthrough: None,
            });
            starts.insert(start, id);
        }

        for &id in starts.values() {
            let last: &Instruction = &instrs[blocks[id].range.end - 1];
            let taken = last
                .jump_target_index()
                .and_then(|target| starts.get(&target).copied());
            let fallthrough = if last.is_uncond_transfer() {
                None
            } else {
                starts.get(&last.next_index()).copied()
            };
            let block = &mut blocks[id];
            block.taken = taken;
            block.fallthrough = fallthrough;
        }

        debug!(instrs = count, blocks = blocks.len(), "built control flow graph");
        Self {
            instrs,
            blocks,
            starts,
        }
    }

    /// The block execution starts in. `None` only for an empty instruction list.
    pub fn entry(&self) -> Option<BlockId> {
        self.block_at(0)
    }

    /// The block starting at instruction `index`.
    pub fn block_at(&self, index: usize) -> Option<BlockId> {
        self.starts.get(&index).copied()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn block_instrs(&self, id: BlockId) -> &[Instruction<'isa>] {
        &self.instrs[self.blocks[id].range.clone()]
    }

    /// Blocks in ascending order of start index.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

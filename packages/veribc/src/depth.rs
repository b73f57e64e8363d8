//! Operand stack depth checking.
//!
//! Every block gets exactly one entry depth: the first one proposed for it. Well-formed bytecode
//! reaches a block with the same depth from every predecessor, so later proposals are not
//! compared against it. A miscompiled block reached with two different depths is therefore only
//! caught if the first depth already leads out of bounds.

use la_arena::ArenaMap;
use tracing::trace;

use crate::cfg::{block_number, BlockId, Cfg};
use crate::error::{Bound, Edge, VerifyError};
use crate::instr::Instruction;

/// Entry depth of every block that was reached.
pub type EntryDepths = ArenaMap<BlockId, i64>;

struct DepthCheck<'a, 'isa> {
    cfg: &'a Cfg<'isa>,
    max_depth: u32,
    entry_depths: &'a mut EntryDepths,
    /// Blocks whose entry depth is known but which have not been scanned yet.
    worklist: Vec<BlockId>,
}

impl DepthCheck<'_, '_> {
    /// Records `depth` as the entry depth of `block` unless it already has one.
    fn propose(&mut self, block: BlockId, depth: i64) {
        if self.entry_depths.get(block).is_none() {
            self.entry_depths.insert(block, depth);
            self.worklist.push(block);
        }
    }

    fn check_bounds(
        &self,
        depth: i64,
        edge: Edge,
        instr: &Instruction,
    ) -> Result<(), VerifyError> {
        let bound = if depth < 0 {
            Bound::BelowMinimum
        } else if depth > self.max_depth as i64 {
            Bound::AboveMaximum(self.max_depth)
        } else {
            return Ok(());
        };
        Err(VerifyError::StackDepth {
            depth,
            bound,
            edge,
            mnemonic: instr.info.mnemonic.clone(),
            index: instr.index,
        })
    }

    fn run(&mut self) -> Result<(), VerifyError> {
        let cfg = self.cfg;
        let Some(entry) = cfg.entry() else {
            return Ok(());
        };
        self.propose(entry, 0);

        while let Some(id) = self.worklist.pop() {
            let Some(&start) = self.entry_depths.get(id) else {
                continue;
            };
            trace!(block = block_number(id), depth = start, "scanning block");
            let block = cfg.block(id);
            let mut depth = start;
            for instr in cfg.block_instrs(id) {
                self.check_bounds(depth, Edge::Entry, instr)?;
                let fallthrough_depth = depth + instr.stack_effect(false) as i64;
                if instr.is_branch() {
                    let taken_depth = depth + instr.stack_effect(true) as i64;
                    self.check_bounds(taken_depth, Edge::Taken, instr)?;
                    // Branches always end their block, so this is the block's taken successor.
                    if let Some(taken) = block.taken {
                        self.propose(taken, taken_depth);
                    }
                }
                depth = fallthrough_depth;
                self.check_bounds(depth, Edge::Fallthrough, instr)?;
            }
            if let Some(fallthrough) = block.fallthrough {
                self.propose(fallthrough, depth);
            }
        }
        Ok(())
    }
}

/// Checks that the stack depth stays within `0..=max_depth` on every path through `cfg`,
/// starting from an empty stack. Entry depths are recorded into `entry_depths` as blocks are
/// reached, so they are available for inspection even when the check fails.
pub fn check_stack_depth(
    cfg: &Cfg<'_>,
    max_depth: u32,
    entry_depths: &mut EntryDepths,
) -> Result<(), VerifyError> {
    DepthCheck {
        cfg,
        max_depth,
        entry_depths,
        worklist: Vec::new(),
    }
    .run()
}

//! Print block maps.

use std::fmt;

use yansi::Paint;

use crate::cfg::block_number;
use crate::BlockMap;

impl fmt::Display for BlockMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, block) in self.cfg.iter() {
            write!(f, "{}", Paint::new(format!("bb{}", block_number(id))).bold())?;
            if let Some(depth) = self.entry_depths.get(id) {
                write!(f, " {}", Paint::rgb(150, 150, 150, format!("(depth {depth})")))?;
            }
            writeln!(f, ":")?;
            for instr in self.cfg.block_instrs(id) {
                write!(
                    f,
                    "  {:>4} {:<22} {}",
                    Paint::rgb(150, 150, 150, instr.offset()),
                    instr.mnemonic(),
                    instr.operand
                )?;
                let target = instr
                    .jump_target_index()
                    .and_then(|idx| self.cfg.block_at(idx));
                if let Some(target) = target {
                    write!(f, " -> bb{}", block_number(target))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

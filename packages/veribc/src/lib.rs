//! Control flow and stack depth verification for bytecode.
//!
//! A [`Verifier`] checks a tree of code objects: each object's bytecode is decoded against an
//! [`InstructionSet`], split into basic blocks, and walked to prove that the operand stack never
//! underflows and never grows past the depth the compiler declared. Nested code objects found in
//! the constant table are checked the same way.

pub mod cfg;
pub mod depth;
pub mod error;
pub mod instr;
pub mod print;


use std::ops::Range;

use tracing::debug;
use veribc_isa::{CodeObject, InstructionSet};

use crate::cfg::Cfg;
use crate::depth::{check_stack_depth, EntryDepths};
pub use crate::error::{Bound, Edge, VerificationError, VerifyError};
use crate::instr::{check_header, decode};

/// Read access to a code object. This is all the verifier needs to know about it.
pub trait Code {
    fn name(&self) -> &str;
    fn bytecode(&self) -> &[u8];
    /// The maximum operand stack depth declared by the compiler.
    fn max_stack_size(&self) -> u32;
    /// Code objects nested in the constant table, in declaration order.
    fn nested(&self) -> Box<dyn Iterator<Item = &Self> + '_>;
    /// Source range of the instruction at `index`.
    fn location(&self, _index: usize) -> Option<Range<usize>> {
        None
    }
}

impl Code for CodeObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytecode(&self) -> &[u8] {
        &self.code
    }

    fn max_stack_size(&self) -> u32 {
        self.stacksize
    }

    fn nested(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        Box::new(CodeObject::nested(self))
    }

    fn location(&self, index: usize) -> Option<Range<usize>> {
        CodeObject::location(self, index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Reject code whose first instruction has a non-zero operand.
    pub check_header: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { check_header: true }
    }
}

/// The blocks of one code object together with the outcome of the stack depth check.
#[derive(Debug)]
pub struct BlockMap<'isa> {
    pub cfg: Cfg<'isa>,
    /// Entry depth of every block reached before the depth check finished.
    pub entry_depths: EntryDepths,
    pub depth_check: Result<(), VerifyError>,
}

#[derive(Debug, Clone, Copy)]
pub struct Verifier<'isa> {
    isa: &'isa InstructionSet,
    config: VerifierConfig,
}

impl<'isa> Verifier<'isa> {
    pub fn new(isa: &'isa InstructionSet) -> Self {
        Self::with_config(isa, VerifierConfig::default())
    }

    pub fn with_config(isa: &'isa InstructionSet, config: VerifierConfig) -> Self {
        Self { isa, config }
    }

    pub fn isa(&self) -> &'isa InstructionSet {
        self.isa
    }

    pub fn config(&self) -> VerifierConfig {
        self.config
    }

    /// Verifies `root` and every code object nested in it. Stops at the first malformed one.
    pub fn validate<C: Code>(&self, root: &C) -> Result<(), VerificationError> {
        let mut stack = vec![root];
        while let Some(code) = stack.pop() {
            self.visit_code(code)
                .map_err(|kind| VerificationError {
                    code: code.name().into(),
                    location: kind.index().and_then(|idx| code.location(idx)),
                    kind,
                })?;
            stack.extend(code.nested());
        }
        Ok(())
    }

    /// Verifies a single code object, ignoring nested ones.
    pub fn visit_code<C: Code + ?Sized>(&self, code: &C) -> Result<(), VerifyError> {
        self.block_map(code)?.depth_check
    }

    /// Decodes `code` and builds its blocks, without checking stack depths.
    pub fn cfg(&self, bytecode: &[u8]) -> Result<Cfg<'isa>, VerifyError> {
        let instrs = decode(self.isa, bytecode)?;
        if self.config.check_header {
            check_header(&instrs)?;
        }
        Ok(Cfg::build(instrs))
    }

    /// Builds the blocks of `code` and runs the stack depth check over them.
    ///
    /// Decoding errors are returned directly. The outcome of the depth check is stored in the
    /// returned map so that the blocks can still be inspected when it fails.
    pub fn block_map<C: Code + ?Sized>(&self, code: &C) -> Result<BlockMap<'isa>, VerifyError> {
        debug!(
            name = code.name(),
            len = code.bytecode().len(),
            max_stack_size = code.max_stack_size(),
            "verifying code object"
        );
        let cfg = self.cfg(code.bytecode())?;
        let mut entry_depths = EntryDepths::default();
        let depth_check = check_stack_depth(&cfg, code.max_stack_size(), &mut entry_depths);
        if let Err(err) = &depth_check {
            debug!(name = code.name(), %err, "stack depth check failed");
        }
        Ok(BlockMap {
            cfg,
            entry_depths,
            depth_check,
        })
    }
}

/// Verifies `root` and all nested code objects with the default configuration.
pub fn validate<C: Code>(isa: &InstructionSet, root: &C) -> Result<(), VerificationError> {
    Verifier::new(isa).validate(root)
}

//! Assembles and verifies input files, one at a time.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;
use veribc::{Code, Verifier};
use veribc_asm::assemble;
use veribc_diagnostics::span::{FileIdMap, Span};
use veribc_diagnostics::{error_report, Diagnostics};
use veribc_isa::{CodeObject, InstructionSet};
use yansi::Paint;

use crate::config::Config;
use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

pub struct Driver {
    config: Config,
    isa: InstructionSet,
    map: FileIdMap,
}

impl Driver {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            isa: InstructionSet::cpython310(),
            map: FileIdMap::new(),
        }
    }

    pub fn check_file(&mut self, path: &Path, out: &mut impl Write) -> Result<Outcome, CliError> {
        let source = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_owned(),
            source,
        })?;
        self.check_source(&path.display().to_string(), source, out)
    }

    /// Assembles `source`, verifies the result and prints the outcome to `out`.
    pub fn check_source(
        &mut self,
        name: &str,
        source: String,
        out: &mut impl Write,
    ) -> Result<Outcome, CliError> {
        let file_id = self.map.create_virtual_file(name, source);
        let source = self.map.get_virtual_source(file_id);
        let diagnostics = Diagnostics::default();
        let code = match assemble(&self.isa, file_id, source, diagnostics.clone()) {
            Ok(code) => code,
            Err(err) => {
                diagnostics.write(&self.map, &mut *out)?;
                return Err(CliError::Assemble {
                    file: name.to_string(),
                    source: err,
                });
            }
        };
        info!(file = name, code = %code.name, "assembled");

        let verifier = Verifier::with_config(&self.isa, self.config.verifier());
        if self.config.dump_blocks {
            dump_blocks(&verifier, &code, out)?;
        }
        match verifier.validate(&code) {
            Ok(()) => {
                writeln!(out, "{name}: {}", Paint::green("ok"))?;
                Ok(Outcome::Pass)
            }
            Err(err) => {
                writeln!(out, "{name}: {}", Paint::red("FAIL").bold())?;
                match &err.location {
                    Some(location) => {
                        let span = Span::new(file_id, location.clone());
                        let label = format!("in code object `{}`", err.code);
                        diagnostics.add(error_report(&err.kind, &span, label));
                        diagnostics.write(&self.map, &mut *out)?;
                    }
                    None => writeln!(out, "{err}")?,
                }
                Ok(Outcome::Fail)
            }
        }
    }
}

/// Prints the block map of `root` and of every code object nested in it.
fn dump_blocks(
    verifier: &Verifier,
    root: &CodeObject,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut stack = vec![root];
    while let Some(code) = stack.pop() {
        writeln!(out, "code object `{}`:", Paint::new(code.name()).bold())?;
        match verifier.block_map(code) {
            Ok(map) => write!(out, "{map}")?,
            Err(err) => writeln!(out, "  {err}")?,
        }
        stack.extend(code.nested());
    }
    Ok(())
}

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use veribc_asm::AsmError;

/// Every input verified.
pub const EXIT_SUCCESS: u8 = 0;
/// At least one input failed verification.
pub const EXIT_FAILURE: u8 = 1;
/// An input could not be read or assembled.
pub const EXIT_ERROR: u8 = 2;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("could not read `{}`: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("could not assemble `{file}`: {source}")]
    Assemble { file: String, source: AsmError },
    #[error("could not write output: {0}")]
    Output(#[from] io::Error),
}

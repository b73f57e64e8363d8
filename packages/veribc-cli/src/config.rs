//! Settings resolved once from the command line and the environment.

use std::path::PathBuf;

use veribc::VerifierConfig;

use crate::Args;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    /// Print the blocks of every code object (`--dump-blocks`).
    pub dump_blocks: bool,
    /// Reject code whose first operand is not 0. Cleared by `--no-header-check`.
    pub check_header: bool,
    /// A `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        Self::resolve(args, std::env::var("RUST_LOG").ok())
    }

    /// `-v` wins over `RUST_LOG`, which wins over the default of only showing warnings.
    pub fn resolve(args: &Args, env_filter: Option<String>) -> Self {
        let log_filter = match (args.verbose, env_filter) {
            (0, Some(filter)) if !filter.is_empty() => filter,
            (0, _) => "warn".to_string(),
            (1, _) => "info".to_string(),
            (2, _) => "debug".to_string(),
            _ => "trace".to_string(),
        };
        Self {
            inputs: args.inputs.clone(),
            dump_blocks: args.dump_blocks,
            check_header: !args.no_header_check,
            log_filter,
        }
    }

    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig {
            check_header: self.check_header,
        }
    }
}

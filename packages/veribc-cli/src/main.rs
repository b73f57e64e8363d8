use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::driver::{Driver, Outcome};
use crate::error::{EXIT_ERROR, EXIT_FAILURE, EXIT_SUCCESS};

pub mod config;
pub mod driver;
pub mod error;
#[cfg(test)]
mod tests;

/// Verify the control flow and stack depth of assembled bytecode.
#[derive(Debug, Parser)]
#[command(name = "veribc", version)]
pub struct Args {
    /// Assembly files (`.bcasm`) to verify.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Print the blocks of every code object with their entry depths.
    #[arg(long)]
    dump_blocks: bool,
    /// Accept code whose first instruction has a non-zero operand.
    #[arg(long)]
    no_header_check: bool,
    /// Log more. Can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = Config::from_args(&args);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(io::stderr)
        .init();
    if !io::stdout().is_terminal() {
        yansi::Paint::disable();
    }

    let inputs = config.inputs.clone();
    let mut driver = Driver::new(config);
    let mut stdout = io::stdout().lock();
    let mut failed = false;
    let mut errored = false;
    for input in &inputs {
        match driver.check_file(input, &mut stdout) {
            Ok(Outcome::Pass) => {}
            Ok(Outcome::Fail) => failed = true,
            Err(err) => {
                let _ = stdout.flush();
                eprintln!("{err}");
                errored = true;
            }
        }
    }

    ExitCode::from(if errored {
        EXIT_ERROR
    } else if failed {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    })
}

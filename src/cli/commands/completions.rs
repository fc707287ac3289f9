//! Completions command - generate shell completion scripts

use crate::cli::args::Cli;
use crate::error::StagehandResult;
use clap::CommandFactory;
use clap_complete::Shell;
use std::process::ExitCode;

/// Execute the completions command
pub fn execute(shell: Shell) -> StagehandResult<ExitCode> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "stagehand", &mut std::io::stdout());
    Ok(ExitCode::SUCCESS)
}

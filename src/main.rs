//! Stagehand - Sequential CI Pipeline Runner
//!
//! CLI entry point that dispatches to subcommands. The process exit code
//! is 0 only when the invoked command (including a pipeline run) succeeded.

use clap::Parser;
use console::style;
use stagehand::cli::{Cli, Commands};
use stagehand::error::StagehandResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StagehandResult<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("stagehand=warn"),
        1 => EnvFilter::new("stagehand=info"),
        _ => EnvFilter::new("stagehand=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let pipeline_path = cli.pipeline.as_deref();

    match cli.command {
        Commands::Run(args) => stagehand::cli::commands::run(args, pipeline_path).await,
        Commands::Validate => stagehand::cli::commands::validate(pipeline_path).await,
        Commands::Init(args) => stagehand::cli::commands::init(args).await,
        Commands::Cache(args) => stagehand::cli::commands::cache(args).await,
        Commands::Completions { shell } => stagehand::cli::commands::completions(shell),
    }
}

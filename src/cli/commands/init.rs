//! Init command - write a starter stagehand.toml

use crate::cli::args::InitArgs;
use crate::error::{StagehandError, StagehandResult};
use crate::pipeline::{PipelineSpec, DEFAULT_PIPELINE_FILE};
use console::style;
use std::process::ExitCode;
use tokio::fs;

/// Execute the init command
pub async fn execute(args: InitArgs) -> StagehandResult<ExitCode> {
    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => std::env::current_dir()
            .map_err(|e| StagehandError::io("getting current directory", e))?,
    };

    let pipeline_path = target_dir.join(DEFAULT_PIPELINE_FILE);

    if pipeline_path.exists() && !args.force {
        return Err(StagehandError::PipelineExists(pipeline_path));
    }

    if !target_dir.exists() {
        fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| StagehandError::io(format!("creating directory {}", target_dir.display()), e))?;
    }

    fs::write(&pipeline_path, PipelineSpec::starter())
        .await
        .map_err(|e| StagehandError::io(format!("writing {}", pipeline_path.display()), e))?;

    println!(
        "{} Created pipeline definition: {}",
        style("✓").green(),
        pipeline_path.display()
    );
    println!("  Edit it, then run: stagehand run");

    Ok(ExitCode::SUCCESS)
}

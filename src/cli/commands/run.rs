//! Run command - execute the pipeline

use crate::artifacts::ArtifactPublisher;
use crate::cache::FsStore;
use crate::cli::args::{ReportFormat, RunArgs};
use crate::error::{StagehandError, StagehandResult};
use crate::exec::cancel_pair;
use crate::pipeline::{facets, report, PipelineSpec, Sequencer, StageContext};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// Execute the run command
pub async fn execute(args: RunArgs, pipeline_path: Option<&Path>) -> StagehandResult<ExitCode> {
    let project_dir = resolve_project_dir(&args)?;
    debug!("Project directory: {}", project_dir.display());

    let pipeline_file = match pipeline_path {
        Some(path) => path.to_path_buf(),
        None => project_dir.join(crate::pipeline::DEFAULT_PIPELINE_FILE),
    };

    let mut spec = PipelineSpec::load(&pipeline_file).await?;
    info!(
        "Loaded pipeline '{}' with {} stage(s)",
        spec.pipeline.name,
        spec.stages.len()
    );

    if args.no_cache {
        debug!("Caching disabled for this run (--no-cache)");
        for stage in &mut spec.stages {
            stage.cache = None;
        }
    }

    let run_facets = facets::assemble(
        &spec,
        &project_dir,
        args.epoch.as_deref(),
        args.branch.as_deref(),
        &args.facets,
    )?;
    debug!("Run facets: {:?}", run_facets);

    let cache_root = args
        .cache_dir
        .clone()
        .or_else(|| spec.pipeline.cache_dir.clone())
        .unwrap_or_else(FsStore::default_root);
    let store = FsStore::new(cache_root)?;

    let artifacts_root = args
        .artifacts_dir
        .clone()
        .or_else(|| spec.pipeline.artifacts_dir.clone())
        .unwrap_or_else(|| ArtifactPublisher::default_root(&project_dir));
    let publisher = ArtifactPublisher::new(artifacts_root);

    // Ctrl-C cancels the running stage; the rest are skipped by fail-fast
    let (trigger, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    let ctx = StageContext {
        project_dir: &project_dir,
        facets: &run_facets,
        cache_base: spec.pipeline.cache_base,
        store: &store,
        publisher: &publisher,
        cancel: &token,
    };

    let sequencer = match args.format {
        // The spinner writes to stderr; keep it away from JSON output anyway
        ReportFormat::Json => Sequencer::new(),
        ReportFormat::Text => Sequencer::with_progress(create_progress_bar("Starting pipeline...")),
    };

    let run = sequencer.run(&spec, &ctx).await;

    match args.format {
        ReportFormat::Text => print!("{}", report::render_text(&run)),
        ReportFormat::Json => println!("{}", report::render_json(&run)?),
    }

    Ok(if run.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn resolve_project_dir(args: &RunArgs) -> StagehandResult<PathBuf> {
    if let Some(ref path) = args.project {
        return path.canonicalize().map_err(|e| {
            StagehandError::io(format!("resolving project path {}", path.display()), e)
        });
    }

    env::current_dir().map_err(|e| StagehandError::io("getting current directory", e))
}

fn create_progress_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

//! Validate command - parse and sanity-check the pipeline definition

use crate::error::StagehandResult;
use crate::pipeline::{PipelineSpec, DEFAULT_PIPELINE_FILE};
use console::style;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Execute the validate command
pub async fn execute(pipeline_path: Option<&Path>) -> StagehandResult<ExitCode> {
    let pipeline_file = pipeline_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PIPELINE_FILE));

    // Load performs the structural checks; a bad file errors out here
    let spec = PipelineSpec::load(&pipeline_file).await?;

    println!(
        "{} Pipeline '{}' is valid: {} stage(s)",
        style("✓").green(),
        style(&spec.pipeline.name).cyan(),
        spec.stages.len()
    );

    for stage in &spec.stages {
        let mut notes = Vec::new();
        if stage.cache.is_some() {
            notes.push("cache");
        }
        if stage.artifacts.is_some() {
            notes.push("artifacts");
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!("  ({})", notes.join(", "))
        };
        println!("  {} step(s): {}{}", stage.steps.len(), stage.name, suffix);
    }

    // Facets only known at run time (branch, --facet) can't be checked
    // statically; flag anything a template references that nothing declares.
    let mut known: HashSet<&str> = HashSet::from(["epoch", "arch", "branch"]);
    known.extend(spec.facets.hash.keys().map(String::as_str));

    for stage in &spec.stages {
        if let Some(cache) = &stage.cache {
            for facet in &cache.template {
                if !known.contains(facet.as_str()) {
                    println!(
                        "{} stage '{}' references facet '{}' with no declared source; \
                         supply it with --facet at run time",
                        style("!").yellow(),
                        stage.name,
                        facet
                    );
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

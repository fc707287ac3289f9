//! Fail-fast pipeline sequencing
//!
//! Runs stages one at a time in declaration order. The first failed stage
//! halts the run; every stage after it is recorded as skipped and never
//! entered. The sequencer itself never retries; a retry is the invoking
//! environment re-running the whole pipeline.

use crate::pipeline::spec::PipelineSpec;
use crate::pipeline::stage::{self, StageContext, StageOutcome, StageState};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Terminal state of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Succeeded,
    FailedAt { stage: String },
}

/// The ordered record of one pipeline execution
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageOutcome>,
    pub state: RunState,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// The outcome of the stage the run failed at, if any
    pub fn failing_stage(&self) -> Option<&StageOutcome> {
        match &self.state {
            RunState::Succeeded => None,
            RunState::FailedAt { stage } => self.stages.iter().find(|s| &s.name == stage),
        }
    }
}

/// Owns the stage loop and the run record
pub struct Sequencer {
    progress: Option<ProgressBar>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { progress: None }
    }

    /// Attach a spinner updated with the current stage name
    pub fn with_progress(progress: ProgressBar) -> Self {
        Self {
            progress: Some(progress),
        }
    }

    /// Execute every stage in order, fail-fast
    pub async fn run(&self, spec: &PipelineSpec, ctx: &StageContext<'_>) -> PipelineRun {
        let started_at = Utc::now();
        let mut stages = Vec::with_capacity(spec.stages.len());
        let mut failed_at: Option<String> = None;

        for stage_spec in &spec.stages {
            if failed_at.is_some() {
                stages.push(StageOutcome::skipped(stage_spec.name.clone()));
                continue;
            }

            if let Some(pb) = &self.progress {
                pb.set_message(format!("Running stage {}...", stage_spec.name));
            }

            let outcome = stage::execute(stage_spec, ctx).await;
            if outcome.state == StageState::Failed {
                info!("Halting run: stage {} failed", stage_spec.name);
                failed_at = Some(stage_spec.name.clone());
            }
            stages.push(outcome);
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        let state = match failed_at {
            Some(stage) => RunState::FailedAt { stage },
            None => RunState::Succeeded,
        };

        PipelineRun {
            id: Uuid::new_v4(),
            pipeline: spec.pipeline.name.clone(),
            started_at,
            finished_at: Utc::now(),
            stages,
            state,
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactPublisher;
    use crate::cache::FsStore;
    use crate::exec::cancel_pair;
    use crate::pipeline::spec::{StageSpec, StepSpec};
    use crate::pipeline::stage::StageFailure;
    use std::collections::{BTreeMap, HashMap};
    use tempfile::TempDir;

    fn sh_step(script: &str) -> StepSpec {
        StepSpec {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            workdir: None,
            env: HashMap::new(),
            timeout_secs: None,
        }
    }

    fn stage(name: &str, script: &str) -> StageSpec {
        StageSpec {
            name: name.to_string(),
            steps: vec![sh_step(script)],
            cache: None,
            artifacts: None,
        }
    }

    fn spec(stages: Vec<StageSpec>) -> PipelineSpec {
        PipelineSpec {
            stages,
            ..Default::default()
        }
    }

    async fn run(spec: &PipelineSpec, project: &TempDir) -> PipelineRun {
        let cache_root = TempDir::new().unwrap();
        let store = FsStore::new(cache_root.path().to_path_buf()).unwrap();
        let publisher = ArtifactPublisher::new(project.path().join("artifacts"));
        let facets = BTreeMap::from([("epoch".to_string(), "v1".to_string())]);
        let (_trigger, token) = cancel_pair();

        let ctx = StageContext {
            project_dir: project.path(),
            facets: &facets,
            cache_base: 1,
            store: &store,
            publisher: &publisher,
            cancel: &token,
        };

        Sequencer::new().run(spec, &ctx).await
    }

    #[tokio::test]
    async fn all_stages_succeed() {
        let project = TempDir::new().unwrap();
        let spec = spec(vec![stage("fetch", "true"), stage("build", "true")]);

        let report = run(&spec, &project).await;

        assert!(report.succeeded());
        assert!(report
            .stages
            .iter()
            .all(|s| s.state == StageState::Succeeded));
        assert!(report.failing_stage().is_none());
    }

    #[tokio::test]
    async fn first_failure_skips_all_later_stages() {
        let project = TempDir::new().unwrap();
        let spec = spec(vec![
            stage("fetch", "true"),
            stage("lint", "exit 1"),
            stage("test", "touch test-ran"),
            stage("build", "touch build-ran"),
        ]);

        let report = run(&spec, &project).await;

        assert_eq!(
            report.state,
            RunState::FailedAt {
                stage: "lint".to_string()
            }
        );

        let states: Vec<(&str, StageState)> = report
            .stages
            .iter()
            .map(|s| (s.name.as_str(), s.state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("fetch", StageState::Succeeded),
                ("lint", StageState::Failed),
                ("test", StageState::Skipped),
                ("build", StageState::Skipped),
            ]
        );

        // Skipped stages were never entered
        assert!(!project.path().join("test-ran").exists());
        assert!(!project.path().join("build-ran").exists());

        let failing = report.failing_stage().unwrap();
        match failing.failure.as_ref().unwrap() {
            StageFailure::StepFailed { result, .. } => assert_eq!(result.exit_code, 1),
            other => panic!("expected StepFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn outcomes_preserve_declaration_order() {
        let project = TempDir::new().unwrap();
        let spec = spec(vec![
            stage("a", "true"),
            stage("b", "true"),
            stage("c", "exit 2"),
            stage("d", "true"),
        ]);

        let report = run(&spec, &project).await;

        let names: Vec<&str> = report.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn run_report_serializes() {
        let project = TempDir::new().unwrap();
        let spec = spec(vec![stage("only", "true")]);

        let report = run(&spec, &project).await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["pipeline"], "pipeline");
        assert_eq!(json["state"]["state"], "succeeded");
        assert_eq!(json["stages"][0]["name"], "only");
    }
}

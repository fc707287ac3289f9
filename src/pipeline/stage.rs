//! Stage state machine and execution protocol
//!
//! A stage moves `pending -> running -> {succeeded, failed}`; stages after
//! a failure are marked `skipped` without ever being entered. Within a
//! stage: advisory cache restore, then the steps in declared order (first
//! non-zero exit fails the stage), then best-effort cache save and artifact
//! publish. The only transition point after entry is gated solely on step
//! outcomes, so save and publish results cannot flip the terminal state.

use crate::artifacts::ArtifactPublisher;
use crate::cache::{CacheKey, CacheStore, KeyTemplate};
use crate::error::StagehandError;
use crate::exec::{self, CancelToken, ToolResult};
use crate::pipeline::spec::StageSpec;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Stage lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// Why a stage failed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageFailure {
    /// A cache key template referenced metadata the run did not supply.
    /// Configuration error; fails the stage before any step runs.
    MissingFacet { facet: String },

    /// A step exited non-zero; its captured output is attached
    StepFailed { command: String, result: ToolResult },

    /// The step's process could not run at all (missing executable, bad
    /// working directory, signal death, timeout)
    Infrastructure { command: String, message: String },

    /// External abort while this stage was running
    Cancelled,
}

impl StageFailure {
    /// Short operator-facing label for triage
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingFacet { .. } => "missing facet",
            Self::StepFailed { .. } => "step failed",
            Self::Infrastructure { .. } => "infrastructure fault",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Terminal record of one stage in a run
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub name: String,
    pub state: StageState,
    pub duration_ms: i64,
    /// Cache key that hit on restore, if any
    pub restored_key: Option<String>,
    /// Key the stage saved under, if it did
    pub saved_key: Option<String>,
    pub failure: Option<StageFailure>,
}

impl StageOutcome {
    /// Outcome for a stage short-circuited by an earlier failure. Skipped
    /// stages are never entered, so there is no duration or cache activity.
    pub fn skipped(name: String) -> Self {
        Self {
            name,
            state: StageState::Skipped,
            duration_ms: 0,
            restored_key: None,
            saved_key: None,
            failure: None,
        }
    }
}

/// Shared resources a stage executes against
pub struct StageContext<'a> {
    pub project_dir: &'a Path,
    pub facets: &'a BTreeMap<String, String>,
    /// Leading facets every fallback key keeps
    pub cache_base: usize,
    pub store: &'a dyn CacheStore,
    pub publisher: &'a ArtifactPublisher,
    pub cancel: &'a CancelToken,
}

/// Run one stage to its terminal state
pub async fn execute(spec: &StageSpec, ctx: &StageContext<'_>) -> StageOutcome {
    let started = Utc::now();
    info!("Stage {}: starting", spec.name);

    let finish = |state, restored_key, saved_key, failure| StageOutcome {
        name: spec.name.clone(),
        state,
        duration_ms: (Utc::now() - started).num_milliseconds(),
        restored_key,
        saved_key,
        failure,
    };

    // Resolve the cache key before any step runs; a template referencing
    // an unsupplied facet fails the stage here.
    let mut resolved_key: Option<CacheKey> = None;
    let mut restored_key = None;
    if let Some(cache) = &spec.cache {
        let template = KeyTemplate::new(cache.template.clone());
        let key = match template.resolve(ctx.facets) {
            Ok(key) => key,
            Err(e) => {
                warn!("Stage {}: {}", spec.name, e);
                return finish(
                    StageState::Failed,
                    None,
                    None,
                    Some(failure_from_error("resolving cache key", e)),
                );
            }
        };

        // A hit is advisory: it materializes inputs, the steps still run.
        let chain = key.fallback_chain(ctx.cache_base);
        if let Some(entry) = ctx.store.restore(&chain, ctx.project_dir).await {
            info!("Stage {}: cache hit on {}", spec.name, entry.matched_key);
            restored_key = Some(entry.matched_key);
        } else {
            debug!("Stage {}: cache miss", spec.name);
        }
        resolved_key = Some(key);
    }

    for step in &spec.steps {
        if ctx.cancel.is_cancelled() {
            info!("Stage {}: cancelled", spec.name);
            return finish(
                StageState::Failed,
                restored_key,
                None,
                Some(StageFailure::Cancelled),
            );
        }

        let invocation = step.to_invocation(ctx.project_dir);
        let command = invocation.display();

        match exec::invoke(&invocation, ctx.cancel).await {
            Ok(result) if result.success() => {
                debug!("Stage {}: step ok: {}", spec.name, command);
            }
            Ok(result) => {
                info!(
                    "Stage {}: step failed (exit {}): {}",
                    spec.name, result.exit_code, command
                );
                return finish(
                    StageState::Failed,
                    restored_key,
                    None,
                    Some(StageFailure::StepFailed { command, result }),
                );
            }
            Err(e) => {
                warn!("Stage {}: {}", spec.name, e);
                return finish(
                    StageState::Failed,
                    restored_key,
                    None,
                    Some(failure_from_error(&command, e)),
                );
            }
        }
    }

    // All steps succeeded. Everything below is best-effort and cannot
    // change the terminal state.
    let mut saved_key = None;
    if let (Some(cache), Some(key)) = (&spec.cache, &resolved_key) {
        match ctx.store.save(key, &cache.paths, ctx.project_dir).await {
            Ok(()) => {
                info!("Stage {}: cache saved under {}", spec.name, key);
                saved_key = Some(key.as_string());
            }
            Err(e) => warn!("Stage {}: cache save failed (non-fatal): {}", spec.name, e),
        }
    }

    if let Some(artifacts) = &spec.artifacts {
        match ctx
            .publisher
            .publish(&artifacts.paths, &artifacts.destination, ctx.project_dir)
            .await
        {
            Ok(dest) => info!("Stage {}: artifacts published to {}", spec.name, dest.display()),
            Err(e) => warn!(
                "Stage {}: artifact publish failed (non-fatal): {}",
                spec.name, e
            ),
        }
    }

    info!("Stage {}: succeeded", spec.name);
    finish(StageState::Succeeded, restored_key, saved_key, None)
}

/// Map an invoker or resolver error onto a failure reason
fn failure_from_error(command: &str, err: StagehandError) -> StageFailure {
    match err {
        StagehandError::MissingFacet { facet } => StageFailure::MissingFacet { facet },
        StagehandError::Cancelled => StageFailure::Cancelled,
        other => StageFailure::Infrastructure {
            command: command.to_string(),
            message: other.to_string(),
        },
    }
}

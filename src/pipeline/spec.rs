//! Declarative pipeline definition
//!
//! Pipelines are described in a `stagehand.toml` file: an ordered list of
//! stages, each with its steps and optional cache and artifact
//! specifications. The definition is loaded once at run start and never
//! mutated during execution.

use crate::error::{StagehandError, StagehandResult};
use crate::exec::ToolInvocation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default pipeline file name
pub const DEFAULT_PIPELINE_FILE: &str = "stagehand.toml";

/// Root of the pipeline definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    /// Pipeline-wide settings
    pub pipeline: PipelineHeader,

    /// Facet declarations
    pub facets: FacetsSpec,

    /// Ordered stage list
    #[serde(rename = "stage")]
    pub stages: Vec<StageSpec>,
}

/// Pipeline-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineHeader {
    /// Pipeline name, used in reports
    pub name: String,

    /// Cache epoch. Changing it invalidates every cache key at once.
    /// Always explicit configuration, never ambient state.
    pub epoch: String,

    /// Number of leading facets every fallback key keeps
    pub cache_base: usize,

    /// Cache store root (defaults to the user cache directory)
    pub cache_dir: Option<PathBuf>,

    /// Artifact destination root (defaults to `<project>/.stagehand/artifacts`)
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for PipelineHeader {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            epoch: "v1".to_string(),
            cache_base: 2,
            cache_dir: None,
            artifacts_dir: None,
        }
    }
}

/// Facet declarations beyond the built-ins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetsSpec {
    /// Facets whose value is the content hash of a file
    /// (e.g. `lockhash = "Cargo.lock"`)
    pub hash: BTreeMap<String, PathBuf>,
}

/// One named unit of pipeline work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage name, unique within the pipeline
    pub name: String,

    /// Ordered steps; all must succeed for the stage to succeed
    #[serde(default, rename = "step")]
    pub steps: Vec<StepSpec>,

    /// Optional cache restore/save around the steps
    #[serde(default)]
    pub cache: Option<CacheSpec>,

    /// Optional artifact publication after success
    #[serde(default)]
    pub artifacts: Option<ArtifactSpec>,
}

/// One external command within a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Executable name or path
    pub command: String,

    /// Arguments, in order
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the project directory
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Environment overrides
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Wall-clock limit for this step
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl StepSpec {
    /// Bind this step to a project directory, producing an invocation
    pub fn to_invocation(&self, project_dir: &Path) -> ToolInvocation {
        let workdir = match &self.workdir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_dir.join(dir),
            None => project_dir.to_path_buf(),
        };

        ToolInvocation {
            command: self.command.clone(),
            args: self.args.clone(),
            workdir: Some(workdir),
            env: self.env.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Cache specification for a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Ordered facet names forming the save key; restores fall back over
    /// trailing facets
    pub template: Vec<String>,

    /// Paths (relative to the project directory) to snapshot and restore
    pub paths: Vec<PathBuf>,
}

/// Artifact specification for a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Paths (relative to the project directory) to publish
    pub paths: Vec<PathBuf>,

    /// Logical destination name under the artifacts root
    pub destination: String,
}

impl PipelineSpec {
    /// Load and validate a pipeline definition from a TOML file
    pub async fn load(path: &Path) -> StagehandResult<Self> {
        if !path.exists() {
            return Err(StagehandError::PipelineNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StagehandError::io(format!("reading pipeline from {}", path.display()), e))?;

        let spec: Self = toml::from_str(&content).map_err(|e| StagehandError::PipelineInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        spec.validate()
            .map_err(|reason| StagehandError::PipelineInvalid {
                path: path.to_path_buf(),
                reason,
            })?;

        Ok(spec)
    }

    /// Static checks on the definition, independent of run metadata
    pub fn validate(&self) -> Result<(), String> {
        if self.stages.is_empty() {
            return Err("pipeline declares no stages".to_string());
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err("stage with empty name".to_string());
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(format!("duplicate stage name: {}", stage.name));
            }
            if stage.steps.is_empty() {
                return Err(format!("stage '{}' has no steps", stage.name));
            }
            if let Some(cache) = &stage.cache {
                if cache.template.len() < self.pipeline.cache_base {
                    return Err(format!(
                        "stage '{}' cache template has {} facets, fewer than cache_base {}",
                        stage.name,
                        cache.template.len(),
                        self.pipeline.cache_base
                    ));
                }
                if cache.paths.is_empty() {
                    return Err(format!("stage '{}' cache declares no paths", stage.name));
                }
            }
            if let Some(artifacts) = &stage.artifacts {
                if artifacts.paths.is_empty() {
                    return Err(format!("stage '{}' artifacts declare no paths", stage.name));
                }
                if artifacts.destination.trim().is_empty() {
                    return Err(format!(
                        "stage '{}' artifacts have no destination",
                        stage.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Starter definition written by `stagehand init`
    pub fn starter() -> &'static str {
        r#"# Stagehand pipeline definition
[pipeline]
name = "myproject"
epoch = "v1"
# Every fallback cache key keeps at least this many leading facets
cache_base = 2

[facets.hash]
lockhash = "Cargo.lock"

[[stage]]
name = "fetch"
cache = { template = ["epoch", "arch", "branch", "lockhash"], paths = ["vendor"] }

  [[stage.step]]
  command = "cargo"
  args = ["fetch"]

[[stage]]
name = "lint"

  [[stage.step]]
  command = "cargo"
  args = ["fmt", "--check"]

  [[stage.step]]
  command = "cargo"
  args = ["clippy", "--", "-D", "warnings"]

[[stage]]
name = "test"

  [[stage.step]]
  command = "cargo"
  args = ["test"]

[[stage]]
name = "build"
artifacts = { paths = ["target/release"], destination = "binaries" }

  [[stage.step]]
  command = "cargo"
  args = ["build", "--release"]
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(stages: &str) -> Result<PipelineSpec, toml::de::Error> {
        toml::from_str(stages)
    }

    #[test]
    fn starter_parses_and_validates() {
        let spec: PipelineSpec = toml::from_str(PipelineSpec::starter()).unwrap();

        assert!(spec.validate().is_ok());
        assert_eq!(spec.stages.len(), 4);
        assert_eq!(spec.stages[0].name, "fetch");
        assert_eq!(spec.pipeline.cache_base, 2);
        assert_eq!(
            spec.facets.hash.get("lockhash"),
            Some(&PathBuf::from("Cargo.lock"))
        );
    }

    #[test]
    fn defaults_fill_missing_header() {
        let spec = minimal(
            r#"
            [[stage]]
            name = "test"
            [[stage.step]]
            command = "true"
        "#,
        )
        .unwrap();

        assert_eq!(spec.pipeline.name, "pipeline");
        assert_eq!(spec.pipeline.epoch, "v1");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn empty_pipeline_rejected() {
        let spec = minimal("").unwrap();
        assert!(spec.validate().unwrap_err().contains("no stages"));
    }

    #[test]
    fn duplicate_stage_names_rejected() {
        let spec = minimal(
            r#"
            [[stage]]
            name = "test"
            [[stage.step]]
            command = "true"
            [[stage]]
            name = "test"
            [[stage.step]]
            command = "true"
        "#,
        )
        .unwrap();

        assert!(spec.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn stage_without_steps_rejected() {
        let spec = minimal(
            r#"
            [[stage]]
            name = "empty"
        "#,
        )
        .unwrap();

        assert!(spec.validate().unwrap_err().contains("no steps"));
    }

    #[test]
    fn short_cache_template_rejected() {
        let spec = minimal(
            r#"
            [pipeline]
            cache_base = 2
            [[stage]]
            name = "fetch"
            cache = { template = ["epoch"], paths = ["vendor"] }
            [[stage.step]]
            command = "true"
        "#,
        )
        .unwrap();

        assert!(spec.validate().unwrap_err().contains("cache_base"));
    }

    #[test]
    fn step_invocation_resolves_workdir() {
        let step = StepSpec {
            command: "make".to_string(),
            args: vec!["all".to_string()],
            workdir: Some(PathBuf::from("subdir")),
            env: HashMap::new(),
            timeout_secs: Some(60),
        };

        let invocation = step.to_invocation(Path::new("/project"));
        assert_eq!(invocation.workdir, Some(PathBuf::from("/project/subdir")));
        assert_eq!(invocation.display(), "make all");
        assert_eq!(invocation.timeout_secs, Some(60));

        let step = StepSpec {
            workdir: None,
            ..step
        };
        let invocation = step.to_invocation(Path::new("/project"));
        assert_eq!(invocation.workdir, Some(PathBuf::from("/project")));
    }
}

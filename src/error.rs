//! Error types for Stagehand
//!
//! All modules use `StagehandResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stagehand operations
pub type StagehandResult<T> = Result<T, StagehandError>;

/// All errors that can occur in Stagehand
#[derive(Error, Debug)]
pub enum StagehandError {
    // Pipeline definition errors
    #[error("Invalid pipeline definition at {path}: {reason}")]
    PipelineInvalid { path: PathBuf, reason: String },

    #[error("Pipeline file not found: {0}")]
    PipelineNotFound(PathBuf),

    #[error("Pipeline file already exists: {0}")]
    PipelineExists(PathBuf),

    // Cache key errors
    #[error("Cache key template references facet '{facet}' missing from run metadata")]
    MissingFacet { facet: String },

    #[error("Failed to hash facet source {path}: {reason}")]
    FacetHash { path: PathBuf, reason: String },

    // Cache store errors
    #[error("Cache store unavailable: {context}")]
    CacheUnavailable {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed to start: {command}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory not found: {0}")]
    WorkdirNotFound(PathBuf),

    #[error("Command terminated by signal: {command}")]
    CommandSignaled { command: String },

    #[error("Command timed out after {seconds}s: {command}")]
    CommandTimeout { command: String, seconds: u64 },

    #[error("Run cancelled")]
    Cancelled,

    // Artifact errors
    #[error("Artifact path not found: {0}")]
    ArtifactNotFound(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StagehandError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache-unavailable error with context
    pub fn cache(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::CacheUnavailable {
            context: context.into(),
            source,
        }
    }

    /// Create a spawn-failure error
    pub fn spawn_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandSpawn {
            command: command.into(),
            source,
        }
    }

    /// Whether this error is an infrastructure fault rather than a tool
    /// reporting failure through its exit code. Used for report labeling.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::CommandSpawn { .. }
                | Self::WorkdirNotFound(_)
                | Self::CommandSignaled { .. }
                | Self::CommandTimeout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PipelineNotFound(_) => Some("Run: stagehand init"),
            Self::PipelineExists(_) => Some("Use --force to overwrite"),
            Self::MissingFacet { .. } => {
                Some("Supply the facet with --facet KEY=VALUE or declare it in [facets.hash]")
            }
            Self::CommandSpawn { .. } => Some("Check that the command is installed and on PATH"),
            _ => None,
        }
    }
}

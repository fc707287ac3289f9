//! Artifact publication
//!
//! Copies declared stage outputs to a destination addressed by a logical
//! name. Publication is purely informational: callers log the result and
//! drop it, so a publish failure can never gate pipeline success.

use crate::error::{StagehandError, StagehandResult};
use crate::fsutil::copy_recursively;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Copies stage outputs under `<root>/<destination>/`
pub struct ArtifactPublisher {
    root: PathBuf,
}

impl ArtifactPublisher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default artifacts root for a project: `<project>/.stagehand/artifacts`
    pub fn default_root(project_dir: &Path) -> PathBuf {
        project_dir.join(".stagehand").join("artifacts")
    }

    /// Copy each declared path (file or directory) into the destination.
    /// Paths are relative to the project directory; a missing source is an
    /// error so the operator sees which declared output never appeared.
    pub async fn publish(
        &self,
        paths: &[PathBuf],
        destination: &str,
        project_dir: &Path,
    ) -> StagehandResult<PathBuf> {
        let dest_dir = self.root.join(destination);
        std::fs::create_dir_all(&dest_dir).map_err(|e| {
            StagehandError::io(format!("creating artifact dir {}", dest_dir.display()), e)
        })?;

        for rel in paths {
            let src = project_dir.join(rel);
            if !src.exists() {
                return Err(StagehandError::ArtifactNotFound(src));
            }

            // Keep the full relative path; flattening to the file name would
            // let two declared paths with the same final component collide
            let dst = dest_dir.join(rel);

            debug!("Publishing {} -> {}", src.display(), dst.display());
            copy_recursively(&src, &dst).map_err(|e| {
                StagehandError::io(format!("publishing artifact {}", src.display()), e)
            })?;
        }

        info!(
            "Published {} artifact path(s) to {}",
            paths.len(),
            dest_dir.display()
        );
        Ok(dest_dir)
    }
}

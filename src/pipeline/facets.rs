//! Run metadata assembly
//!
//! Builds the facet map cache key templates resolve against. Built-in
//! facets come from the pipeline header and the CLI; hashed facets are
//! content-addressed from declared files, so the same lockfile always
//! yields the same cache key.

use crate::error::{StagehandError, StagehandResult};
use crate::pipeline::spec::PipelineSpec;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Facet overrides supplied on the command line
pub type FacetOverride = (String, String);

/// Assemble the facet map for one run.
///
/// Precedence, lowest to highest: built-ins (`epoch`, `arch`), hashed
/// facets, CLI `--facet` overrides. `branch` is only present when supplied,
/// so a template referencing it without one fails with `MissingFacet`.
pub fn assemble(
    spec: &PipelineSpec,
    project_dir: &Path,
    epoch: Option<&str>,
    branch: Option<&str>,
    overrides: &[FacetOverride],
) -> StagehandResult<BTreeMap<String, String>> {
    let mut facets = BTreeMap::new();

    facets.insert(
        "epoch".to_string(),
        epoch.unwrap_or(&spec.pipeline.epoch).to_string(),
    );
    facets.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    if let Some(branch) = branch {
        facets.insert("branch".to_string(), branch.to_string());
    }

    for (name, file) in &spec.facets.hash {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            project_dir.join(file)
        };
        let hash = hash_file_contents(&path)?;
        debug!("Facet {} = {} (from {})", name, hash, path.display());
        facets.insert(name.clone(), hash);
    }

    for (key, value) in overrides {
        facets.insert(key.clone(), value.clone());
    }

    Ok(facets)
}

/// Hash a file's contents using SHA256, returning the first 12 hex chars
fn hash_file_contents(path: &Path) -> StagehandResult<String> {
    let contents = fs::read(path).map_err(|e| StagehandError::FacetHash {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let result = hasher.finalize();

    // First 12 hex characters (6 bytes)
    Ok(hex::encode(&result[..6]))
}

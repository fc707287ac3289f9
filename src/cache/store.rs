//! Cache store backends
//!
//! A store maps exact key strings to directory snapshots. The orchestrator
//! never looks inside an entry beyond its own manifest; entries are
//! performance hints, so every failure path here degrades to a miss or a
//! logged warning rather than an error the pipeline sees.

use crate::cache::key::CacheKey;
use crate::error::{StagehandError, StagehandResult};
use crate::fsutil::{copy_recursively, dir_size, remove_path};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Manifest file name inside each entry directory
const MANIFEST_FILE: &str = "entry.toml";

/// Subdirectory holding the snapshotted paths
const DATA_DIR: &str = "data";

/// Per-entry manifest. Written last during a save, so an entry without a
/// readable manifest is treated as if it does not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryManifest {
    /// Exact key string this entry was saved under
    pub key: String,

    /// When the entry was finalized
    pub created_at: DateTime<Utc>,

    /// Snapshotted paths, relative to the project root
    pub paths: Vec<PathBuf>,
}

/// Result of a successful restore
#[derive(Debug, Clone)]
pub struct RestoredEntry {
    /// The exact key in the fallback chain that hit
    pub matched_key: String,

    /// Paths materialized into the project directory
    pub paths: Vec<PathBuf>,
}

/// Summary of one stored entry, for the cache CLI
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Key/value blob storage with fallback-prefix lookup
///
/// Implementations must treat restore failures as misses and must persist
/// saves durably; the trait keeps the orchestrator agnostic to whether the
/// backend is a local directory tree or remote object storage.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Try each key in the chain in order; materialize the first hit into
    /// `project_dir` and report which key matched. `None` is a normal miss.
    async fn restore(&self, chain: &[CacheKey], project_dir: &Path) -> Option<RestoredEntry>;

    /// Snapshot `paths` (relative to `project_dir`) under the exact key,
    /// overwriting any existing entry.
    async fn save(&self, key: &CacheKey, paths: &[PathBuf], project_dir: &Path)
        -> StagehandResult<()>;

    /// List all entries, newest first
    async fn entries(&self) -> StagehandResult<Vec<EntryInfo>>;

    /// Remove the entry with the exact key string. Returns whether an entry
    /// was removed.
    async fn remove(&self, key: &str) -> StagehandResult<bool>;

    /// Remove entries older than the cutoff, returning the removed keys
    async fn prune(&self, older_than: Duration) -> StagehandResult<Vec<String>>;
}

/// Filesystem-backed cache store: one directory per exact key
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: PathBuf) -> StagehandResult<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| StagehandError::cache(format!("creating cache root {}", root.display()), e))?;
        Ok(Self { root })
    }

    /// Default cache root: `~/.cache/stagehand`
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagehand")
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(storage_name(key))
    }

    fn read_manifest(&self, key: &str) -> Option<EntryManifest> {
        self.manifest_at(&self.entry_dir(key))
    }

    fn manifest_at(&self, dir: &Path) -> Option<EntryManifest> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).ok()?;
        match toml::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(
                    "Ignoring cache entry {} with unreadable manifest: {}",
                    dir.display(),
                    e
                );
                None
            }
        }
    }
}

/// Encode a key string as a single directory name. Facet values can contain
/// path separators (a branch like `feature/foo`) or dot segments; those must
/// not nest or escape the cache root. The manifest keeps the exact logical
/// key, so the encoding never needs to be reversed.
fn storage_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            c => name.push(c),
        }
    }
    if name == "." || name == ".." {
        name = name.replace('.', "%2E");
    }
    name
}

#[async_trait]
impl CacheStore for FsStore {
    async fn restore(&self, chain: &[CacheKey], project_dir: &Path) -> Option<RestoredEntry> {
        for key in chain {
            let key_str = key.as_string();
            let Some(manifest) = self.read_manifest(&key_str) else {
                debug!("Cache miss: {}", key_str);
                continue;
            };

            let data_dir = self.entry_dir(&key_str).join(DATA_DIR);
            let mut restored = Vec::new();
            let mut failed = false;

            for rel in &manifest.paths {
                let src = data_dir.join(rel);
                let dst = project_dir.join(rel);
                if let Err(e) = copy_recursively(&src, &dst) {
                    warn!(
                        "Cache restore of {} failed ({}), treating as miss",
                        key_str, e
                    );
                    // Drop whatever this attempt materialized so a fallback
                    // entry does not mix with files from a corrupt one
                    let _ = remove_path(&dst);
                    for done in &restored {
                        let _ = remove_path(&project_dir.join(done));
                    }
                    failed = true;
                    break;
                }
                restored.push(rel.clone());
            }

            if failed {
                continue;
            }

            debug!("Cache hit: {}", key_str);
            return Some(RestoredEntry {
                matched_key: key_str,
                paths: restored,
            });
        }

        None
    }

    async fn save(
        &self,
        key: &CacheKey,
        paths: &[PathBuf],
        project_dir: &Path,
    ) -> StagehandResult<()> {
        let key_str = key.as_string();

        // Stage into a temp sibling, then rename over the final location.
        // Concurrent saves to the same key race benignly: last writer wins.
        let staging = self.root.join(format!(".tmp-{}", Uuid::new_v4()));
        let data_dir = staging.join(DATA_DIR);

        let result = (|| -> io::Result<()> {
            fs::create_dir_all(&data_dir)?;

            let mut saved = Vec::new();
            for rel in paths {
                let src = project_dir.join(rel);
                if !src.exists() {
                    debug!("Skipping absent cache path: {}", src.display());
                    continue;
                }
                copy_recursively(&src, &data_dir.join(rel))?;
                saved.push(rel.clone());
            }

            let manifest = EntryManifest {
                key: key_str.clone(),
                created_at: Utc::now(),
                paths: saved,
            };
            let content = toml::to_string_pretty(&manifest)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            fs::write(staging.join(MANIFEST_FILE), content)?;

            let final_dir = self.entry_dir(&key_str);
            if final_dir.exists() {
                fs::remove_dir_all(&final_dir)?;
            }
            fs::rename(&staging, &final_dir)?;
            Ok(())
        })();

        if let Err(e) = &result {
            let _ = fs::remove_dir_all(&staging);
            return Err(StagehandError::cache(
                format!("saving cache entry {}", key_str),
                io::Error::new(e.kind(), e.to_string()),
            ));
        }

        debug!("Cache saved: {}", key_str);
        Ok(())
    }

    async fn entries(&self) -> StagehandResult<Vec<EntryInfo>> {
        let mut infos = Vec::new();

        let entries = fs::read_dir(&self.root)
            .map_err(|e| StagehandError::cache("reading cache root", e))?;

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(".tmp-") {
                continue;
            }
            if let Some(manifest) = self.manifest_at(&entry.path()) {
                infos.push(EntryInfo {
                    key: manifest.key,
                    created_at: manifest.created_at,
                    size_bytes: dir_size(&entry.path()),
                });
            }
        }

        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(infos)
    }

    async fn remove(&self, key: &str) -> StagehandResult<bool> {
        let dir = self.entry_dir(key);
        if !dir.join(MANIFEST_FILE).exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .map_err(|e| StagehandError::cache(format!("removing cache entry {}", key), e))?;
        Ok(true)
    }

    async fn prune(&self, older_than: Duration) -> StagehandResult<Vec<String>> {
        let cutoff = Utc::now() - older_than;
        let mut removed = Vec::new();

        for info in self.entries().await? {
            if info.created_at < cutoff && self.remove(&info.key).await? {
                removed.push(info.key);
            }
        }

        Ok(removed)
    }
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

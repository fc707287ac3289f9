//! Tiered on-disk caching
//!
//! Cache keys are ordered facet sequences (epoch, arch, branch, content
//! hash) with fallback chains: restores try the most specific key first and
//! fall back to broader prefixes. Entries are directory snapshots addressed
//! by the exact key string; the store never inspects their contents.
//!
//! Caching is strictly a performance hint. A miss, a racing writer, or an
//! I/O failure on either side must never fail a pipeline.

pub mod key;
pub mod store;

pub use key::{CacheKey, KeyTemplate};
pub use store::{format_bytes, CacheStore, EntryInfo, FsStore, RestoredEntry};

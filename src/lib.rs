//! Stagehand - Sequential CI Pipeline Runner
//!
//! Executes a fixed, ordered sequence of build/test stages with tiered
//! on-disk caching and fail-fast halting on the first stage failure.

pub mod artifacts;
pub mod cache;
pub mod cli;
pub mod error;
pub mod exec;
mod fsutil;
pub mod pipeline;

pub use error::{StagehandError, StagehandResult};

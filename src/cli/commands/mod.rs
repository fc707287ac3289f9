//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod init;
pub mod run;
pub mod validate;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use init::execute as init;
pub use run::execute as run;
pub use validate::execute as validate;

//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Sequential CI pipeline runner
///
/// Executes an ordered list of build/test stages with tiered fallback
/// caching, failing fast on the first stage that does not succeed.
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Pipeline definition file (defaults to ./stagehand.toml)
    #[arg(short, long, global = true, env = "STAGEHAND_PIPELINE")]
    pub pipeline: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the pipeline
    Run(RunArgs),

    /// Parse and sanity-check the pipeline definition
    Validate,

    /// Write a starter stagehand.toml
    Init(InitArgs),

    /// Manage the on-disk cache store
    Cache(CacheArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project directory (defaults to current directory)
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Branch facet for cache keys
    #[arg(short, long, env = "STAGEHAND_BRANCH")]
    pub branch: Option<String>,

    /// Override the cache epoch from the pipeline file
    #[arg(long)]
    pub epoch: Option<String>,

    /// Additional facets (KEY=VALUE, repeatable)
    #[arg(long = "facet", value_parser = parse_facet)]
    pub facets: Vec<(String, String)>,

    /// Cache store root (defaults to pipeline setting, then ~/.cache/stagehand)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Artifacts root (defaults to pipeline setting, then <project>/.stagehand/artifacts)
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Disable cache restore and save for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Report output format
    #[arg(long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing stagehand.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,

    /// Cache store root (defaults to ~/.cache/stagehand)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List all cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove all cache entries
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove entries older than N days
    Prune {
        /// Age cutoff in days
        #[arg(long, default_value = "30")]
        days: u32,
    },
}

/// Run report output format
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// Machine-readable JSON
    Json,
}

/// Output format for cache list
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one key per line)
    Plain,
}

/// Parse a facet in KEY=VALUE format
fn parse_facet(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_facet_valid() {
        let (k, v) = parse_facet("branch=main").unwrap();
        assert_eq!(k, "branch");
        assert_eq!(v, "main");
    }

    #[test]
    fn parse_facet_with_equals() {
        let (k, v) = parse_facet("note=a=b").unwrap();
        assert_eq!(k, "note");
        assert_eq!(v, "a=b");
    }

    #[test]
    fn parse_facet_invalid() {
        assert!(parse_facet("branch").is_err());
    }

    #[test]
    fn cli_parses_run() {
        let cli = Cli::parse_from([
            "stagehand",
            "run",
            "--branch",
            "main",
            "--facet",
            "lockhash=abc123",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.branch.as_deref(), Some("main"));
                assert_eq!(args.facets, vec![("lockhash".to_string(), "abc123".to_string())]);
                assert!(!args.no_cache);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_validate() {
        let cli = Cli::parse_from(["stagehand", "validate"]);
        assert!(matches!(cli.command, Commands::Validate));
    }

    #[test]
    fn cli_parses_pipeline_flag() {
        let cli = Cli::parse_from(["stagehand", "-p", "ci/pipeline.toml", "validate"]);
        assert_eq!(cli.pipeline, Some(PathBuf::from("ci/pipeline.toml")));
    }

    #[test]
    fn cli_parses_cache_prune() {
        let cli = Cli::parse_from(["stagehand", "cache", "prune", "--days", "7"]);
        match cli.command {
            Commands::Cache(args) => match args.action {
                CacheAction::Prune { days } => assert_eq!(days, 7),
                _ => panic!("expected Prune action"),
            },
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_parses_no_cache() {
        let cli = Cli::parse_from(["stagehand", "run", "--no-cache"]);
        match cli.command {
            Commands::Run(args) => assert!(args.no_cache),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["stagehand", "validate"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["stagehand", "-vv", "validate"]);
        assert_eq!(cli.verbose, 2);
    }
}

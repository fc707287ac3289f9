//! Cache command - inspect and manage the on-disk store

use crate::cache::{format_bytes, CacheStore, EntryInfo, FsStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::error::{StagehandError, StagehandResult};
use chrono::Duration;
use console::style;
use std::process::ExitCode;

/// Execute the cache command
pub async fn execute(args: CacheArgs) -> StagehandResult<ExitCode> {
    let root = args.cache_dir.clone().unwrap_or_else(FsStore::default_root);
    let store = FsStore::new(root)?;

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await?,
        CacheAction::Clear { yes } => clear_entries(&store, yes).await?,
        CacheAction::Prune { days } => prune_entries(&store, days).await?,
    }

    Ok(ExitCode::SUCCESS)
}

async fn list_entries(store: &FsStore, format: OutputFormat) -> StagehandResult<()> {
    let entries = store.entries().await?;

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cache entries found."),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }

    Ok(())
}

fn print_table(entries: &[EntryInfo]) {
    println!(
        "{:<40} {:<18} {:>10}",
        style("KEY").bold(),
        style("CREATED").bold(),
        style("SIZE").bold()
    );
    println!("{}", "-".repeat(70));

    for entry in entries {
        println!(
            "{:<40} {:<18} {:>10}",
            entry.key,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            format_bytes(entry.size_bytes)
        );
    }

    println!();
    println!("{} entry(ies)", entries.len());
}

async fn clear_entries(store: &FsStore, yes: bool) -> StagehandResult<()> {
    if !yes {
        return Err(StagehandError::User(
            "Refusing to clear the cache without --yes".to_string(),
        ));
    }

    let entries = store.entries().await?;
    let mut removed = 0;
    for entry in entries {
        if store.remove(&entry.key).await? {
            removed += 1;
        }
    }

    println!("{} Removed {} cache entry(ies)", style("✓").green(), removed);
    Ok(())
}

async fn prune_entries(store: &FsStore, days: u32) -> StagehandResult<()> {
    let removed = store.prune(Duration::days(i64::from(days))).await?;

    if removed.is_empty() {
        println!("Nothing to prune (cutoff: {} days)", days);
    } else {
        for key in &removed {
            println!("  removed {}", key);
        }
        println!(
            "{} Pruned {} entry(ies) older than {} days",
            style("✓").green(),
            removed.len(),
            days
        );
    }

    Ok(())
}

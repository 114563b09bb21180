use crate::cli::GlobalArgs;
use crate::ui;
use anyhow::Result;
use bundlepatch_lib::config::Config;
use chrono::{DateTime, Local};
use clap::{Args, Subcommand};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: Option<CacheAction>,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cache size and location
    Info,
    /// Remove all downloaded bundles and the catalog copy
    Clear,
}

/// Size and file count of a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheUsage {
    pub bytes: u64,
    pub files: usize,
}

impl CacheCommand {
    pub async fn run(self, global_args: GlobalArgs) -> Result<()> {
        let config = Config::setup(global_args.datadir.as_deref())?;

        match self.action {
            Some(CacheAction::Clear) => clear_cache(&config)?,
            Some(CacheAction::Info) | None => show_cache_info(&config)?,
        }

        Ok(())
    }
}

fn clear_cache(config: &Config) -> Result<()> {
    let usage = cache_usage(&config.cache_dir)?;
    if usage.files == 0 {
        ui::success("Cache is already empty");
        return Ok(());
    }

    ui::info(&format!("Clearing cache ({})...", ui::bytes_str(usage.bytes)));
    fs::remove_dir_all(&config.cache_dir)?;
    fs::create_dir_all(&config.bundles_dir)?;
    ui::success("Cache cleared successfully");

    Ok(())
}

fn show_cache_info(config: &Config) -> Result<()> {
    ui::info(&format!("Cache location: {}", config.cache_dir.display()));

    let usage = cache_usage(&config.bundles_dir)?;
    if usage.files == 0 {
        ui::info("No bundles cached");
    } else {
        ui::info(&format!("Cache size: {}", ui::bytes_str(usage.bytes)));
        ui::info(&format!("Cached bundles: {}", usage.files));
        ui::tip("Run `bundlepatch cache clear` to free up space");
    }

    match catalog_age_days(&config.catalog_cache_file) {
        Some(days) => ui::info(&format!("Catalog last loaded {days} day(s) ago")),
        None => ui::info("No catalog loaded yet"),
    }

    Ok(())
}

/// Walks `dir` recursively. A missing directory is empty.
fn cache_usage(dir: &Path) -> Result<CacheUsage> {
    let mut usage = CacheUsage::default();
    if !dir.exists() {
        return Ok(usage);
    }

    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            usage.bytes += entry.metadata()?.len();
            usage.files += 1;
        }
    }

    Ok(usage)
}

fn catalog_age_days(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let modified: DateTime<Local> = modified.into();
    Some(Local::now().signed_duration_since(modified).num_days().max(0))
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use jwlmerge::archive::{extract_archive, find_archives};
use jwlmerge::{
    merge_archives, report, validate_database_schema, Progress, TableKind, TableStats,
};

#[derive(Parser)]
#[command(version, about = "Merge JW Library backup archives into one deduplicated backup")]
struct Cli {
    /// Verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Merge every .jwlibrary archive in a directory
    Merge {
        /// Directory containing .jwlibrary archives
        input_dir: PathBuf,
        /// Output archive filename
        #[arg(short, long, default_value = "combined_backup.jwlibrary")]
        output: String,
        /// Directory to write the output archive into
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// List the archives that would be merged without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that an archive's database has every required table
    Validate {
        /// A .jwlibrary archive
        archive: PathBuf,
    },
    /// Print per-table record counts of an archive
    Report {
        /// A .jwlibrary archive
        archive: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.cmd {
        Cmd::Merge {
            input_dir,
            output,
            output_dir,
            dry_run,
        } => run_merge(&input_dir, &output, &output_dir, dry_run),
        Cmd::Validate { archive } => run_validate(&archive),
        Cmd::Report { archive } => run_report(&archive),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Forwards engine progress to the log.
struct LogProgress;

impl Progress for LogProgress {
    fn source_started(&mut self, index: usize, total: usize, name: &str) {
        info!("merging archive {}/{}: {}", index + 1, total, name);
    }

    fn table_merged(&mut self, kind: TableKind, stats: TableStats) {
        debug!(
            "  {}: {} added, {} duplicates, {} skipped",
            kind, stats.added, stats.duplicates, stats.skipped
        );
    }
}

fn run_merge(input_dir: &Path, output: &str, output_dir: &Path, dry_run: bool) -> Result<()> {
    let archives =
        find_archives(input_dir).with_context(|| format!("scanning {}", input_dir.display()))?;
    info!("found {} archives to merge", archives.len());

    if dry_run {
        for archive in &archives {
            println!("  {}", archive.display());
        }
        return Ok(());
    }

    // Missing tables in one archive are tolerated during the merge; an
    // unreadable archive is not, so surface both findings up front.
    for archive in &archives {
        let workspace = tempfile::tempdir()?;
        let backup = extract_archive(archive, workspace.path())
            .with_context(|| format!("extracting {}", archive.display()))?;
        let schema = validate_database_schema(&backup.database);
        if !schema.is_valid {
            warn!("{}: {}", archive.display(), schema.message);
        }
    }

    fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(output);
    let outcome = merge_archives(&archives, &output_path, &mut LogProgress)?;

    println!("Merge results:");
    for line in report::dedup_summary(&outcome.stats) {
        println!(
            "  {:<10} {:>7} kept, {:>7} duplicates removed ({:.1}%)",
            line.kind,
            line.source_total - line.removed,
            line.removed,
            line.percent
        );
    }
    println!("Merged backup written to {}", output_path.display());
    Ok(())
}

fn run_validate(archive: &Path) -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let backup = extract_archive(archive, workspace.path())
        .with_context(|| format!("extracting {}", archive.display()))?;
    let schema = validate_database_schema(&backup.database);
    println!("{}", schema.message);
    if !schema.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn run_report(archive: &Path) -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let backup = extract_archive(archive, workspace.path())
        .with_context(|| format!("extracting {}", archive.display()))?;
    println!("{}", archive.display());
    for (kind, count) in report::table_counts(&backup.database)? {
        println!("  {:<10} {:>8}", kind, count);
    }
    Ok(())
}

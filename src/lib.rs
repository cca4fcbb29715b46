//! jwlmerge
//!
//! Consolidates multiple JW Library backup archives (.jwlibrary) into a
//! single deduplicated backup, including:
//! - **fingerprint**: content-identity digests for records without stable ids
//! - **merge**: the deduplicating table merger with foreign-key remapping
//! - **schema**: pre-merge validation of a database's table set
//! - **archive** / **manifest**: the backup container and its metadata
//!
//! # Example (conceptual)
//! ```ignore
//! let archives = archive::find_archives(Path::new("backups/"))?;
//! let outcome = merge_archives(&archives, Path::new("combined.jwlibrary"), &mut NoProgress)?;
//! for line in report::dedup_summary(&outcome.stats) {
//!     println!("{}: removed {} duplicates", line.kind, line.removed);
//! }
//! ```

pub mod archive;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod merge;
pub mod progress;
pub mod report;
pub mod schema;
pub mod tables;

use std::path::{Path, PathBuf};

use tracing::info;

pub use error::{MergeError, MergeResult};
pub use fingerprint::{fingerprint, Record};
pub use manifest::Manifest;
pub use merge::{merge_databases, merge_table, IdMapping, MergeStats, TableStats};
pub use progress::{NoProgress, Progress};
pub use schema::{validate_database_schema, SchemaReport};
pub use tables::TableKind;

/// What a finished archive merge produced.
#[derive(Debug)]
pub struct MergeOutcome {
    pub stats: MergeStats,
    pub manifest: Manifest,
}

/// End-to-end entry point: extract every input archive, merge their
/// databases, restamp the first archive's manifest, and write the merged
/// backup archive to `output`.
pub fn merge_archives(
    inputs: &[PathBuf],
    output: &Path,
    progress: &mut dyn Progress,
) -> MergeResult<MergeOutcome> {
    if inputs.is_empty() {
        return Err(MergeError::NoSources);
    }

    let workspace = tempfile::tempdir()?;
    let mut backups = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let dest = workspace.path().join(format!("backup-{index}"));
        std::fs::create_dir_all(&dest)?;
        backups.push(archive::extract_archive(input, &dest)?);
    }

    let databases: Vec<PathBuf> = backups.iter().map(|backup| backup.database.clone()).collect();
    let merged_db = workspace.path().join("merged_userData.db");
    let stats = merge::merge_databases(&databases, &merged_db, progress)?;

    let mut manifest = Manifest::load(&backups[0].manifest)?;
    manifest.restamp(&merged_db)?;
    archive::write_archive(&merged_db, &manifest, output)?;

    info!(output = %output.display(), "merged backup archive written");
    Ok(MergeOutcome { stats, manifest })
}

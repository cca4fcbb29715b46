//! Error types for the backup merge engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while merging backup archives.
///
/// Per-record anomalies (schema drift, constraint conflicts) are handled
/// locally inside the table merger and never surface here; these variants
/// cover the structural and transactional failures that abort a run.
#[derive(Error, Debug)]
pub enum MergeError {
    /// I/O failure reading or writing files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite failure outside the per-record skip paths
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error serializing/deserializing manifest JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unreadable or corrupt backup container
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The archive contained no recognized database file
    #[error("no database file (userData.db or user_data.db) in {0}")]
    MissingDatabase(PathBuf),

    /// The archive contained no manifest
    #[error("no manifest.json in {0}")]
    MissingManifest(PathBuf),

    /// The input directory held no backup archives
    #[error("no .jwlibrary archives found in {0}")]
    NoArchives(PathBuf),

    /// A merge was requested with an empty source list
    #[error("no source databases given")]
    NoSources,

    /// A table name outside the supported set reached the engine
    #[error("unsupported table: {0}")]
    UnknownTable(String),

    /// A failure inside the merge loop; the whole transaction was rolled back
    #[error("merging {table} from {archive}: {source}")]
    TableMerge {
        archive: String,
        table: &'static str,
        #[source]
        source: Box<MergeError>,
    },
}

/// Result type alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

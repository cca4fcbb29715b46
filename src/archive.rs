//! Reading and writing .jwlibrary backup containers.
//!
//! A backup archive is a zip holding exactly one database file and one
//! manifest.json. This module is a thin collaborator around the merge
//! engine: unpack inputs, repack the merged result.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{MergeError, MergeResult};
use crate::manifest::Manifest;

/// Recognized database filenames; older exports use the underscored
/// spelling.
pub const DATABASE_NAMES: [&str; 2] = ["userData.db", "user_data.db"];
const MANIFEST_NAME: &str = "manifest.json";

/// The two files every backup archive must contain, as extracted paths.
#[derive(Debug)]
pub struct ExtractedBackup {
    pub database: PathBuf,
    pub manifest: PathBuf,
}

/// Lists the .jwlibrary archives in a directory, sorted by name.
/// An empty result is a structural error: there is nothing to merge.
pub fn find_archives(dir: &Path) -> MergeResult<Vec<PathBuf>> {
    let mut archives: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jwlibrary"))
        .collect();
    archives.sort();
    if archives.is_empty() {
        return Err(MergeError::NoArchives(dir.to_path_buf()));
    }
    Ok(archives)
}

/// Unpacks a backup archive and locates its database and manifest.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> MergeResult<ExtractedBackup> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    archive.extract(dest)?;

    let database = DATABASE_NAMES
        .iter()
        .map(|name| dest.join(name))
        .find(|path| path.exists())
        .ok_or_else(|| MergeError::MissingDatabase(archive_path.to_path_buf()))?;
    let manifest = dest.join(MANIFEST_NAME);
    if !manifest.exists() {
        return Err(MergeError::MissingManifest(archive_path.to_path_buf()));
    }

    debug!(
        archive = %archive_path.display(),
        database = %database.display(),
        "extracted backup"
    );
    Ok(ExtractedBackup { database, manifest })
}

/// Writes the merged database and manifest as a new backup archive.
pub fn write_archive(database: &Path, manifest: &Manifest, output: &Path) -> MergeResult<()> {
    let file = File::create(output)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("userData.db", options)?;
    zip.write_all(&fs::read(database)?)?;

    zip.start_file(MANIFEST_NAME, options)?;
    zip.write_all(serde_json::to_string_pretty(manifest)?.as_bytes())?;

    zip.finish()?;
    Ok(())
}

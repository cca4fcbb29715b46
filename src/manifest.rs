//! The manifest document carried alongside the database in a backup archive.
//!
//! Only the fields the merge restamps are typed; everything else the
//! application puts into manifest.json passes through untouched via
//! flattened maps, so a regenerated manifest stays importable even when
//! the format grows new fields.

use std::fs;
use std::path::Path;

use chrono::{Local, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::MergeResult;

/// Backup manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub creation_date: String,
    pub user_data_backup: UserDataBackup,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `userDataBackup` block describing the database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataBackup {
    pub hash: String,
    pub last_modified_date: String,
    #[serde(default)]
    pub user_mark_count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Reads a manifest.json file.
    pub fn load(path: &Path) -> MergeResult<Manifest> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Restamps this manifest for a freshly merged database: merge-stamped
    /// name, today's creation date, recomputed database hash, current
    /// last-modified timestamp, refreshed user-mark count.
    pub fn restamp(&mut self, merged_db: &Path) -> MergeResult<()> {
        let now = Local::now();
        self.name = format!("CombinedUserDataBackup_{}", now.format("%Y-%m-%d_%H-%M-%S"));
        self.creation_date = now.format("%Y-%m-%d").to_string();
        self.user_data_backup.hash = file_sha256(merged_db)?;
        self.user_data_backup.last_modified_date = utc_timestamp();
        self.user_data_backup.user_mark_count = count_user_marks(merged_db)?;
        Ok(())
    }
}

/// Current UTC time at seconds precision with an explicit +00:00 offset,
/// the format the application writes into its backups.
pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

fn file_sha256(path: &Path) -> MergeResult<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// UserMark rows in the merged database; 0 when the table is absent.
fn count_user_marks(db: &Path) -> MergeResult<i64> {
    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let count = conn
        .query_row("SELECT COUNT(*) FROM UserMark", [], |row| row.get(0))
        .unwrap_or(0);
    Ok(count)
}

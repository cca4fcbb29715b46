//! Pre-merge validation of a backup database's table set.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::tables::TableKind;

/// Outcome of a schema check.
///
/// `is_valid` is false either because required tables are missing (listed
/// in `missing_tables`) or because the database could not be read at all
/// (empty missing list, error text in `message`).
#[derive(Debug, Clone)]
pub struct SchemaReport {
    pub is_valid: bool,
    pub missing_tables: Vec<String>,
    pub message: String,
}

/// Checks that a database exposes every table the merge engine needs.
///
/// Never fails: a structurally valid but incomplete database comes back
/// as invalid with its missing tables, and a read problem comes back as
/// invalid with the error as message.
pub fn validate_database_schema(path: &Path) -> SchemaReport {
    let existing = match list_tables(path) {
        Ok(existing) => existing,
        Err(err) => {
            return SchemaReport {
                is_valid: false,
                missing_tables: Vec::new(),
                message: format!("schema check failed: {err}"),
            }
        }
    };

    let missing: Vec<String> = TableKind::ORDER
        .iter()
        .filter(|kind| !existing.contains(kind.name()))
        .map(|kind| kind.name().to_string())
        .collect();

    if missing.is_empty() {
        SchemaReport {
            is_valid: true,
            missing_tables: missing,
            message: "database schema is valid".to_string(),
        }
    } else {
        let message = format!("missing tables: {}", missing.join(", "));
        SchemaReport {
            is_valid: false,
            missing_tables: missing,
            message,
        }
    }
}

/// Real (non-system) tables of a database, opened read-only.
fn list_tables(path: &Path) -> rusqlite::Result<HashSet<String>> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    names.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_tables(dir: &Path, tables: &[&str]) -> std::path::PathBuf {
        let path = dir.join("test.db");
        let conn = Connection::open(&path).unwrap();
        for table in tables {
            conn.execute_batch(&format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY)"))
                .unwrap();
        }
        path
    }

    #[test]
    fn complete_schema_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let all: Vec<&str> = TableKind::ORDER.iter().map(|kind| kind.name()).collect();
        let path = db_with_tables(dir.path(), &all);

        let report = validate_database_schema(&path);
        assert!(report.is_valid);
        assert!(report.missing_tables.is_empty());
    }

    #[test]
    fn missing_tag_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_with_tables(
            dir.path(),
            &[
                "Location",
                "UserMark",
                "Note",
                "TagMap",
                "Bookmark",
                "BlockRange",
            ],
        );

        let report = validate_database_schema(&path);
        assert!(!report.is_valid);
        assert_eq!(report.missing_tables, ["Tag"]);
    }

    #[test]
    fn unrelated_tables_do_not_satisfy_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_with_tables(dir.path(), &["some_other_table"]);

        let report = validate_database_schema(&path);
        assert!(!report.is_valid);
        assert_eq!(report.missing_tables.len(), TableKind::ORDER.len());
    }

    #[test]
    fn unreadable_database_is_invalid_with_empty_missing_list() {
        let report = validate_database_schema(Path::new("/nonexistent/path/db.sqlite"));
        assert!(!report.is_valid);
        assert!(report.missing_tables.is_empty());
        assert!(report.message.contains("schema check failed"));
    }
}

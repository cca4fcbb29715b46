//! Deduplicating merge of backup databases.
//!
//! The first source database seeds the output verbatim and its rows keep
//! their original identifiers. Every additional source is then streamed
//! table by table in a fixed parent-before-child order: each row is
//! fingerprinted, rows whose content was already accepted collapse onto
//! the surviving destination row, and the rest are inserted without
//! their source-local primary key so the destination assigns the
//! identifier. Either way the source-local identifier is mapped to the
//! destination one and used to rewrite foreign keys of child rows merged
//! afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::error::{MergeError, MergeResult};
use crate::fingerprint::{fingerprint, Record};
use crate::manifest::utc_timestamp;
use crate::progress::Progress;
use crate::tables::TableKind;

/// Per-table identifier mapping, populated only when the destination
/// row lives under a different identifier than the source row carried.
#[derive(Debug, Default)]
pub struct IdMapping {
    map: HashMap<TableKind, HashMap<i64, i64>>,
}

impl IdMapping {
    /// Destination identifier for a source identifier, when they differ.
    pub fn lookup(&self, kind: TableKind, old: i64) -> Option<i64> {
        self.map.get(&kind).and_then(|ids| ids.get(&old)).copied()
    }

    /// Number of remapped identifiers recorded for a table.
    pub fn len(&self, kind: TableKind) -> usize {
        self.map.get(&kind).map_or(0, HashMap::len)
    }

    fn record(&mut self, kind: TableKind, old: i64, new: i64) {
        let ids = self.map.entry(kind).or_default();
        if old == new {
            // Identical identifiers need no rewrite downstream, but an
            // earlier source may have left a mapping for the same
            // source-local identifier; it must not leak into this one.
            ids.remove(&old);
        } else {
            ids.insert(old, new);
        }
    }
}

/// Counters for one table of one source database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Rows accepted into the destination. Includes rows the destination
    /// already held under its own uniqueness constraints (the insert is
    /// ignored but the content is present either way).
    pub added: u64,
    /// Rows whose fingerprint was already seen; not inserted.
    pub duplicates: u64,
    /// Rows dropped on insert error (schema drift or otherwise).
    pub skipped: u64,
}

/// Statistics about a whole multi-source merge. Table order of the map
/// follows the processing order.
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    pub sources: u32,
    pub tables: BTreeMap<TableKind, TableStats>,
}

impl MergeStats {
    fn absorb(&mut self, kind: TableKind, stats: TableStats) {
        let entry = self.tables.entry(kind).or_default();
        entry.added += stats.added;
        entry.duplicates += stats.duplicates;
        entry.skipped += stats.skipped;
    }
}

/// Streams one table from a source database into the destination,
/// collapsing rows whose fingerprint is already in `seen` onto the
/// surviving destination row and rewriting foreign keys through
/// `id_map`.
///
/// The source-local primary key is left out of the insert so the
/// destination assigns its own; both inserted and deduplicated rows map
/// their source identifier to the destination one in `id_map`. A table
/// absent from the source is not an error; older export formats omit
/// tables, and that source simply contributes nothing. Individual row
/// failures are logged and skipped.
pub fn merge_table(
    src: &Connection,
    dst: &Connection,
    kind: TableKind,
    seen: &mut HashMap<String, i64>,
    id_map: &mut IdMapping,
) -> MergeResult<TableStats> {
    let mut stats = TableStats::default();

    if !table_exists(src, kind.name())? {
        debug!(table = kind.name(), "table absent in source, skipping");
        return Ok(stats);
    }

    let mut stmt = src.prepare(&format!("SELECT * FROM \"{}\"", kind.name()))?;
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let pk_index = columns.iter().position(|c| c == kind.id_column());
    let insert_sql = insert_statement(kind, &columns, pk_index);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values: Vec<Value> = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(row.get(index)?);
        }
        let record: Record = columns.iter().cloned().zip(values.iter().cloned()).collect();

        let print = fingerprint(kind, &record);
        if let Some(&surviving) = seen.get(&print) {
            // The content already lives in the destination; children of
            // this row must resolve to the surviving identifier, not the
            // discarded source-local one.
            if let Some(Value::Integer(old)) = record.get(kind.id_column()) {
                id_map.record(kind, *old, surviving);
            }
            stats.duplicates += 1;
            continue;
        }

        remap_references(kind, &columns, &mut values, id_map);

        let params = values
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != pk_index)
            .map(|(_, value)| value);
        match dst.execute(&insert_sql, params_from_iter(params)) {
            Ok(0) => {
                // The destination's own uniqueness constraints rejected the
                // row even though fingerprinting missed it; nothing was
                // inserted and the surviving identifier is unknown.
                stats.added += 1;
            }
            Ok(_) => {
                let assigned = dst.last_insert_rowid();
                seen.insert(print, assigned);
                if let Some(Value::Integer(old)) = record.get(kind.id_column()) {
                    id_map.record(kind, *old, assigned);
                }
                stats.added += 1;
            }
            Err(err) => {
                // Schema drift between backup versions: the destination may
                // lack a column the source row carries.
                if err.to_string().contains("has no column") {
                    debug!(
                        table = kind.name(),
                        error = %err,
                        "row carries a column missing in destination, skipped"
                    );
                } else {
                    warn!(table = kind.name(), error = %err, "row insert failed, skipped");
                }
                stats.skipped += 1;
            }
        }
    }

    debug!(
        table = kind.name(),
        added = stats.added,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        "table merged"
    );
    Ok(stats)
}

/// Registers the fingerprint and identifier of every row a table
/// already holds, without inserting anything. Run against the seed copy
/// so the first source's content deduplicates later sources and their
/// children resolve to the seed's identifiers.
pub fn register_fingerprints(
    conn: &Connection,
    kind: TableKind,
    seen: &mut HashMap<String, i64>,
) -> MergeResult<TableStats> {
    let mut stats = TableStats::default();

    if !table_exists(conn, kind.name())? {
        return Ok(stats);
    }

    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\"", kind.name()))?;
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut record = Record::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            record.insert(column.clone(), row.get(index)?);
        }
        let print = fingerprint(kind, &record);
        if seen.contains_key(&print) {
            stats.duplicates += 1;
        } else {
            if let Some(Value::Integer(id)) = record.get(kind.id_column()) {
                seen.insert(print, *id);
            }
            stats.added += 1;
        }
    }
    Ok(stats)
}

/// Merges every source database into a copy of the first one.
///
/// The first source seeds the output verbatim; its rows keep their
/// original identifiers and contribute only their fingerprints and the
/// identifiers duplicates will collapse onto. Foreign-key
/// enforcement is suspended for the run because child rows may be
/// inserted before all of their parents' remaps are known; the whole
/// merge commits or rolls back as one transaction.
pub fn merge_databases(
    sources: &[impl AsRef<Path>],
    output: &Path,
    progress: &mut dyn Progress,
) -> MergeResult<MergeStats> {
    let (first, rest) = sources.split_first().ok_or(MergeError::NoSources)?;
    std::fs::copy(first, output)?;

    let mut dst = Connection::open(output)?;
    dst.pragma_update(None, "foreign_keys", false)?;

    let mut seen: HashMap<TableKind, HashMap<String, i64>> = TableKind::ORDER
        .iter()
        .map(|kind| (*kind, HashMap::new()))
        .collect();
    let mut id_map = IdMapping::default();
    let mut stats = MergeStats::default();

    let tx = dst.transaction()?;

    let seed_name = source_name(first.as_ref());
    progress.source_started(0, sources.len(), &seed_name);
    for kind in TableKind::ORDER {
        let table_stats =
            register_fingerprints(&tx, kind, seen.get_mut(&kind).expect("all kinds initialized"))
                .map_err(|err| MergeError::TableMerge {
                    archive: seed_name.clone(),
                    table: kind.name(),
                    source: Box::new(err),
                })?;
        stats.absorb(kind, table_stats);
        progress.table_merged(kind, table_stats);
    }
    stats.sources += 1;

    for (index, source) in rest.iter().enumerate() {
        let source = source.as_ref();
        let name = source_name(source);
        debug!(source = %name, index = index + 2, total = sources.len(), "merging source database");
        progress.source_started(index + 1, sources.len(), &name);

        let src = Connection::open_with_flags(source, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        for kind in TableKind::ORDER {
            let table_stats = merge_table(
                &src,
                &tx,
                kind,
                seen.get_mut(&kind).expect("all kinds initialized"),
                &mut id_map,
            )
            .map_err(|err| MergeError::TableMerge {
                archive: name.clone(),
                table: kind.name(),
                source: Box::new(err),
            })?;
            stats.absorb(kind, table_stats);
            progress.table_merged(kind, table_stats);
        }
        stats.sources += 1;
    }

    touch_last_modified(&tx);
    tx.commit()?;
    dst.pragma_update(None, "foreign_keys", true)?;

    info!(output = %output.display(), sources = stats.sources, "merged database created");
    Ok(stats)
}

fn source_name(source: &Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}

fn insert_statement(kind: TableKind, columns: &[String], pk_index: Option<usize>) -> String {
    let names = columns
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != pk_index)
        .map(|(_, column)| format!("\"{column}\""))
        .collect::<Vec<_>>();
    let placeholders = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT OR IGNORE INTO \"{}\" ({}) VALUES ({})",
        kind.name(),
        names.join(", "),
        placeholders
    )
}

/// Rewrites foreign-key values whose parent row deduplicated into an
/// existing destination row. Values without a mapping are already valid
/// in the destination; null references stay null.
fn remap_references(kind: TableKind, columns: &[String], values: &mut [Value], id_map: &IdMapping) {
    for (column, parent) in kind.foreign_keys() {
        let Some(index) = columns.iter().position(|c| c == column) else {
            continue;
        };
        if let Value::Integer(old) = values[index] {
            if let Some(new) = id_map.lookup(*parent, old) {
                values[index] = Value::Integer(new);
            }
        }
    }
}

fn table_exists(conn: &Connection, name: &str) -> MergeResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Best-effort bump of the LastModified bookkeeping row; older backups
/// may not carry the table.
fn touch_last_modified(conn: &Connection) {
    if let Err(err) = conn.execute(
        "UPDATE LastModified SET LastModified = ?1",
        [utc_timestamp()],
    ) {
        debug!(error = %err, "LastModified not updated");
    }
}

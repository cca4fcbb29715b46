//! Merge result summaries.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::error::MergeResult;
use crate::merge::MergeStats;
use crate::tables::TableKind;

/// Row counts per table of a database, in processing order. Absent tables
/// count as zero.
pub fn table_counts(db: &Path) -> MergeResult<Vec<(TableKind, i64)>> {
    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut counts = Vec::with_capacity(TableKind::ORDER.len());
    for kind in TableKind::ORDER {
        let count = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", kind.name()),
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);
        counts.push((kind, count));
    }
    Ok(counts)
}

/// One table's deduplication outcome across a whole merge.
#[derive(Debug, Clone, Copy)]
pub struct DedupLine {
    pub kind: TableKind,
    /// Rows the source datasets offered in total.
    pub source_total: u64,
    /// Rows not carried over because an equivalent row was already accepted.
    pub removed: u64,
    pub percent: f64,
}

/// Per-table duplicates-removed summary of a finished merge.
pub fn dedup_summary(stats: &MergeStats) -> Vec<DedupLine> {
    stats
        .tables
        .iter()
        .map(|(kind, table)| {
            let source_total = table.added + table.duplicates;
            let removed = table.duplicates;
            let percent = if source_total > 0 {
                removed as f64 / source_total as f64 * 100.0
            } else {
                0.0
            };
            DedupLine {
                kind: *kind,
                source_total,
                removed,
                percent,
            }
        })
        .collect()
}

//! Progress reporting seam for front ends.
//!
//! The engine reports through this trait instead of depending on any
//! particular presentation library; interactive callers implement it and
//! forward to their own UI, headless callers pass [`NoProgress`].

use crate::merge::TableStats;
use crate::tables::TableKind;

/// Callbacks the merge engine emits while it works.
///
/// All methods default to no-ops so implementors only override what they
/// display.
pub trait Progress {
    /// A source database is about to be merged. `index` is zero-based.
    fn source_started(&mut self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// One table of the current source finished merging.
    fn table_merged(&mut self, kind: TableKind, stats: TableStats) {
        let _ = (kind, stats);
    }
}

/// Progress sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

//! The closed set of user-data tables the merge engine understands.

use std::fmt;

use crate::error::MergeError;

/// One of the seven user-data tables in a backup database.
///
/// Declaration order is the merge processing order: parent tables
/// (Location, UserMark, Tag) come before every table that references them,
/// so identifier mappings already exist when child rows are copied.
/// All dynamic SQL in the engine is built from this enum; free-form table
/// names never reach a query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    Location,
    UserMark,
    Tag,
    Note,
    TagMap,
    Bookmark,
    BlockRange,
}

impl TableKind {
    /// All supported tables, in processing order.
    pub const ORDER: [TableKind; 7] = [
        TableKind::Location,
        TableKind::UserMark,
        TableKind::Tag,
        TableKind::Note,
        TableKind::TagMap,
        TableKind::Bookmark,
        TableKind::BlockRange,
    ];

    /// Table name as it appears in the database schema.
    pub const fn name(self) -> &'static str {
        match self {
            TableKind::Location => "Location",
            TableKind::UserMark => "UserMark",
            TableKind::Tag => "Tag",
            TableKind::Note => "Note",
            TableKind::TagMap => "TagMap",
            TableKind::Bookmark => "Bookmark",
            TableKind::BlockRange => "BlockRange",
        }
    }

    /// Primary-key column of this table.
    pub const fn id_column(self) -> &'static str {
        match self {
            TableKind::Location => "LocationId",
            TableKind::UserMark => "UserMarkId",
            TableKind::Tag => "TagId",
            TableKind::Note => "NoteId",
            TableKind::TagMap => "TagMapId",
            TableKind::Bookmark => "BookmarkId",
            TableKind::BlockRange => "BlockRangeId",
        }
    }

    /// Foreign-key columns of this table and the parent table each points at.
    ///
    /// UserMark's own LocationId is intentionally not listed: only tables
    /// downstream of the parent set get their references rewritten when a
    /// parent row deduplicates.
    pub const fn foreign_keys(self) -> &'static [(&'static str, TableKind)] {
        match self {
            TableKind::Note => &[
                ("LocationId", TableKind::Location),
                ("UserMarkId", TableKind::UserMark),
            ],
            TableKind::TagMap => &[("TagId", TableKind::Tag)],
            TableKind::Bookmark => &[("LocationId", TableKind::Location)],
            TableKind::BlockRange => &[("UserMarkId", TableKind::UserMark)],
            TableKind::Location | TableKind::UserMark | TableKind::Tag => &[],
        }
    }

    /// Parses a schema table name, rejecting anything outside the
    /// supported set.
    pub fn parse(name: &str) -> Result<TableKind, MergeError> {
        TableKind::ORDER
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| MergeError::UnknownTable(name.to_string()))
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(kind: TableKind) -> usize {
        TableKind::ORDER.iter().position(|k| *k == kind).unwrap()
    }

    #[test]
    fn tag_processed_before_tagmap() {
        assert!(position(TableKind::Tag) < position(TableKind::TagMap));
    }

    #[test]
    fn usermark_processed_before_blockrange() {
        assert!(position(TableKind::UserMark) < position(TableKind::BlockRange));
    }

    #[test]
    fn location_processed_before_note_and_bookmark() {
        let location = position(TableKind::Location);
        assert!(location < position(TableKind::Note));
        assert!(location < position(TableKind::Bookmark));
    }

    #[test]
    fn every_foreign_key_parent_precedes_its_child() {
        for kind in TableKind::ORDER {
            for (_, parent) in kind.foreign_keys() {
                assert!(
                    position(*parent) < position(kind),
                    "{parent} must be merged before {kind}"
                );
            }
        }
    }

    #[test]
    fn parse_accepts_every_supported_table() {
        for kind in TableKind::ORDER {
            assert_eq!(TableKind::parse(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn parse_rejects_unknown_table() {
        let err = TableKind::parse("PlaylistItem").unwrap_err();
        assert!(matches!(err, MergeError::UnknownTable(name) if name == "PlaylistItem"));
    }

    #[test]
    fn derived_ordering_matches_processing_order() {
        let mut sorted = TableKind::ORDER;
        sorted.sort();
        assert_eq!(sorted, TableKind::ORDER);
    }
}

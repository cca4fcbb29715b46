//! Content-identity fingerprints for backup records.
//!
//! Records exported by different devices carry device-local row ids, so
//! deduplication has to work from content. Each table has a fixed set of
//! identity fields; this module joins them into a delimiter-separated
//! string and hashes it, giving a digest that compares equal across
//! processes and runs.

use std::collections::HashMap;

use rusqlite::types::Value;
use sha2::{Digest, Sha256};

use crate::tables::TableKind;

/// A record as a map of column names to SQLite values.
pub type Record = HashMap<String, Value>;

/// Computes the content-identity digest of a record.
///
/// Deterministic: the identity fields of the table kind are joined with
/// `|` in a fixed order and hashed with SHA-256 (64 lowercase hex chars).
/// Null or missing fields normalize to `""` for text and `0` for integers
/// before joining, so a null column and an absent column fingerprint
/// identically.
pub fn fingerprint(kind: TableKind, record: &Record) -> String {
    let identity = match kind {
        TableKind::Location => vec![
            int(record, "BookNumber"),
            int(record, "ChapterNumber"),
            int(record, "DocumentId"),
            text(record, "KeySymbol"),
            int(record, "IssueTagNumber"),
            int(record, "MepsLanguage"),
            text(record, "Title"),
        ],
        TableKind::UserMark => {
            let guid = text(record, "UserMarkGuid");
            if guid.is_empty() {
                vec![
                    int(record, "LocationId"),
                    int(record, "ColorIndex"),
                    int(record, "StyleIndex"),
                    int(record, "Version"),
                ]
            } else {
                // The guid is globally unique across devices; it wins over
                // the positional fields.
                vec![guid]
            }
        }
        TableKind::Tag => vec![text(record, "Name"), int(record, "Type")],
        TableKind::Note => vec![
            text(record, "Content"),
            text(record, "Title"),
            int(record, "LocationId"),
            int(record, "UserMarkId"),
            int(record, "BlockType"),
            text(record, "BlockIdentifier"),
            text(record, "Guid"),
        ],
        TableKind::TagMap => vec![
            int(record, "Type"),
            int(record, "TypeId"),
            int(record, "TagId"),
            int(record, "Position"),
        ],
        TableKind::Bookmark => vec![
            int(record, "LocationId"),
            int(record, "Slot"),
            text(record, "Title"),
            text(record, "Snippet"),
        ],
        TableKind::BlockRange => vec![
            int(record, "BlockType"),
            int(record, "Identifier"),
            int(record, "StartToken"),
            int(record, "EndToken"),
            int(record, "UserMarkId"),
        ],
    };

    hex::encode(Sha256::digest(identity.join("|").as_bytes()))
}

/// Text identity field; null, missing, or non-text values normalize to "".
fn text(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(Value::Text(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Integer identity field; null or missing normalizes to 0.
fn int(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(Value::Integer(i)) => i.to_string(),
        _ => "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn tag(name: &str, tag_type: i64) -> Record {
        record(&[
            ("Name", Value::Text(name.to_string())),
            ("Type", Value::Integer(tag_type)),
        ])
    }

    #[test]
    fn equal_tags_fingerprint_identically() {
        assert_eq!(
            fingerprint(TableKind::Tag, &tag("Test", 1)),
            fingerprint(TableKind::Tag, &tag("Test", 1)),
        );
    }

    #[test]
    fn tag_name_changes_fingerprint() {
        assert_ne!(
            fingerprint(TableKind::Tag, &tag("Test1", 1)),
            fingerprint(TableKind::Tag, &tag("Test2", 1)),
        );
    }

    #[test]
    fn tag_type_changes_fingerprint() {
        assert_ne!(
            fingerprint(TableKind::Tag, &tag("Test", 1)),
            fingerprint(TableKind::Tag, &tag("Test", 2)),
        );
    }

    #[test]
    fn non_identity_field_does_not_change_fingerprint() {
        let mut with_extra = tag("Test", 1);
        with_extra.insert("ImageFilename".to_string(), Value::Text("a.png".into()));
        assert_eq!(
            fingerprint(TableKind::Tag, &tag("Test", 1)),
            fingerprint(TableKind::Tag, &with_extra),
        );
    }

    #[test]
    fn digest_is_sha256_hex() {
        let digest = fingerprint(TableKind::Tag, &tag("", 0));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn null_and_missing_fields_fingerprint_identically() {
        let with_nulls = record(&[("Name", Value::Null), ("Type", Value::Null)]);
        let empty = record(&[]);
        assert_eq!(
            fingerprint(TableKind::Tag, &with_nulls),
            fingerprint(TableKind::Tag, &empty),
        );
    }

    #[test]
    fn usermark_guid_wins_over_positional_fields() {
        let a = record(&[
            ("UserMarkGuid", Value::Text("abc-123".into())),
            ("LocationId", Value::Integer(1)),
            ("ColorIndex", Value::Integer(1)),
        ]);
        let b = record(&[
            ("UserMarkGuid", Value::Text("abc-123".into())),
            ("LocationId", Value::Integer(2)),
            ("ColorIndex", Value::Integer(2)),
        ]);
        assert_eq!(
            fingerprint(TableKind::UserMark, &a),
            fingerprint(TableKind::UserMark, &b),
        );
    }

    #[test]
    fn usermark_without_guid_uses_positional_fields() {
        let mark = |location: i64| {
            record(&[
                ("UserMarkGuid", Value::Null),
                ("LocationId", Value::Integer(location)),
                ("ColorIndex", Value::Integer(1)),
                ("StyleIndex", Value::Integer(0)),
                ("Version", Value::Integer(0)),
            ])
        };
        assert_eq!(
            fingerprint(TableKind::UserMark, &mark(1)),
            fingerprint(TableKind::UserMark, &mark(1)),
        );
        assert_ne!(
            fingerprint(TableKind::UserMark, &mark(1)),
            fingerprint(TableKind::UserMark, &mark(2)),
        );
    }

    #[test]
    fn note_content_changes_fingerprint() {
        let note = |content: &str| {
            record(&[
                ("Content", Value::Text(content.to_string())),
                ("Title", Value::Text("Test".into())),
                ("LocationId", Value::Integer(1)),
                ("UserMarkId", Value::Null),
                ("BlockType", Value::Integer(0)),
                ("BlockIdentifier", Value::Null),
                ("Guid", Value::Text("g-1".into())),
            ])
        };
        assert_eq!(
            fingerprint(TableKind::Note, &note("same")),
            fingerprint(TableKind::Note, &note("same")),
        );
        assert_ne!(
            fingerprint(TableKind::Note, &note("one")),
            fingerprint(TableKind::Note, &note("two")),
        );
    }

    #[test]
    fn distinct_kinds_with_same_fields_fingerprint_differently() {
        // BlockRange and TagMap both hash four integers; the field sets
        // differ so identical raw values must not collide.
        let fields = record(&[
            ("Type", Value::Integer(1)),
            ("TypeId", Value::Integer(2)),
            ("TagId", Value::Integer(3)),
            ("Position", Value::Integer(4)),
        ]);
        assert_ne!(
            fingerprint(TableKind::TagMap, &fields),
            fingerprint(TableKind::BlockRange, &fields),
        );
    }
}

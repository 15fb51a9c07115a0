//! FILENAME: mapping-engine/src/limit.rs
//! PURPOSE: Truncates a table set to preview size without recomputing it.
//! CONTEXT: Live previews re-run on every edit, so the limiter works on the
//! finished output: the full result is computed once and a capped copy is
//! handed to the view. Capping the walk itself would change aggregated
//! cells, which must match the eventual export exactly.

use serde::{Deserialize, Serialize};

use crate::table::{FlattenedTable, OutputTableSet};

/// Upper bounds for a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCaps {
    pub max_tables: usize,
    /// Cap on body rows; protected header rows ride along for free.
    /// `usize::MAX` leaves rows uncapped.
    pub max_rows_per_table: usize,
}

impl PreviewCaps {
    pub fn new(max_tables: usize, max_rows_per_table: usize) -> Self {
        PreviewCaps {
            max_tables,
            max_rows_per_table,
        }
    }
}

/// Returns a capped copy of `set`: the first `max_tables` tables, each cut
/// to its protected header prefix plus the first `max_rows_per_table`
/// remaining rows. Surviving rows are untouched and `set` itself is never
/// modified.
pub fn limit_tables(set: &OutputTableSet, caps: PreviewCaps) -> OutputTableSet {
    let mut limited = OutputTableSet::new();
    for table in set.iter().take(caps.max_tables) {
        let protected = table.header_rows.min(table.row_count());
        let mut copy = FlattenedTable::new(table.name.clone());
        copy.header_rows = table.header_rows;
        copy.source_classes = table.source_classes.clone();
        copy.rows = table
            .rows
            .iter()
            .take(protected.saturating_add(caps.max_rows_per_table))
            .cloned()
            .collect();
        limited.merge(copy);
    }
    limited
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use entity_model::Value;

    use crate::definition::ItemRole;
    use crate::table::Cell;

    fn numbered_table(name: &str, rows: usize, header_rows: usize) -> FlattenedTable {
        let mut table = FlattenedTable::new(name);
        for i in 0..rows {
            table.push_row(vec![Cell::new(
                Value::Number(i as f64),
                ItemRole::FixedString,
            )]);
        }
        table.header_rows = header_rows;
        table
    }

    #[test]
    fn test_row_cap_keeps_a_prefix() {
        let mut set = OutputTableSet::new();
        set.merge(numbered_table("t", 10, 0));

        let limited = limit_tables(&set, PreviewCaps::new(5, 3));
        let table = limited.get("t").unwrap();
        assert_eq!(table.row_count(), 3);
        // Exactly the first rows, contents untouched.
        for i in 0..3 {
            assert_eq!(table.rows[i][0].value, Value::Number(i as f64));
        }
    }

    #[test]
    fn test_table_cap_keeps_the_first_tables_in_order() {
        let mut set = OutputTableSet::new();
        for name in ["a", "b", "c"] {
            set.merge(numbered_table(name, 2, 0));
        }

        let limited = limit_tables(&set, PreviewCaps::new(2, 10));
        let names: Vec<&str> = limited.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_protected_header_rows_do_not_count_against_the_cap() {
        let mut set = OutputTableSet::new();
        set.merge(numbered_table("t", 10, 1));

        let limited = limit_tables(&set, PreviewCaps::new(1, 2));
        let table = limited.get("t").unwrap();
        // Header plus two body rows.
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.header_rows, 1);
    }

    #[test]
    fn test_source_set_is_not_mutated() {
        let mut set = OutputTableSet::new();
        set.merge(numbered_table("t", 10, 0));
        let before = set.clone();

        let _ = limit_tables(&set, PreviewCaps::new(1, 1));
        assert_eq!(set, before);
    }

    #[test]
    fn test_zero_caps() {
        let mut set = OutputTableSet::new();
        set.merge(numbered_table("t", 4, 1));

        assert!(limit_tables(&set, PreviewCaps::new(0, 5)).is_empty());

        let rows_only_header = limit_tables(&set, PreviewCaps::new(1, 0));
        assert_eq!(rows_only_header.get("t").unwrap().row_count(), 1);
    }

    #[test]
    fn test_caps_larger_than_content_change_nothing() {
        let mut set = OutputTableSet::new();
        set.merge(numbered_table("t", 3, 1));

        let limited = limit_tables(&set, PreviewCaps::new(10, 100));
        assert_eq!(limited, set);
    }

    #[test]
    fn test_uncapped_row_sentinel_keeps_every_row_behind_a_header() {
        // usize::MAX rows plus a protected header must not wrap the prefix
        // length; the whole table survives, header included.
        let mut set = OutputTableSet::new();
        set.merge(numbered_table("t", 4, 1));

        let unbounded = limit_tables(&set, PreviewCaps::new(1, usize::MAX));
        assert_eq!(unbounded, set);
        assert_eq!(unbounded.get("t").unwrap().header_rows, 1);
    }
}

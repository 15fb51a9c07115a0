//! FILENAME: mapping-engine/src/compact.rs
//! PURPOSE: Removes all-empty rows and columns left by literal positions.
//! CONTEXT: Mapping positions are literal, so sparse specifications produce
//! gap columns and gap rows. Compaction is a separate post-process the host
//! applies on request; the flattener never compacts on its own, because
//! writers may rely on the raw geometry.

use crate::table::{FlattenedTable, OutputTableSet};

/// Drops every all-empty row and column, preserving relative order.
///
/// Column emptiness is judged across all rows, header and pivot rows
/// included, so a column holding nothing but its header title survives.
/// Rows inside the protected `header_rows` prefix are never dropped.
/// Idempotent: compacting a compacted table changes nothing.
pub fn compact_table(table: &mut FlattenedTable) {
    table.normalize();

    let width = table.width();
    let mut keep_column = vec![false; width];
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                keep_column[i] = true;
            }
        }
    }

    if keep_column.iter().any(|keep| !keep) {
        for row in &mut table.rows {
            let mut i = 0;
            row.retain(|_| {
                let keep = keep_column[i];
                i += 1;
                keep
            });
        }
    }

    let protected = table.header_rows.min(table.rows.len());
    let mut i = 0;
    table.rows.retain(|row| {
        let keep = i < protected || row.iter().any(|cell| !cell.is_empty());
        i += 1;
        keep
    });
}

/// Compacts every table in the set.
pub fn compact_tables(set: &mut OutputTableSet) {
    for table in set.tables_mut() {
        compact_table(table);
    }
}

// ============================================================================
// TESTS
// ============================================================================

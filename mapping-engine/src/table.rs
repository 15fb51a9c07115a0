//! FILENAME: mapping-engine/src/table.rs
//! PURPOSE: The flattened output model: cells, tables and the table set.
//! CONTEXT: This is what a run produces and what writers consume. Tables are
//! rectangular grids of role-tagged cells; the set keeps them in creation
//! order and reachable by name, so several runs can funnel rows into one
//! shared table.

use serde::{Deserialize, Serialize};

use entity_model::Value;
use rustc_hash::FxHashMap;

use crate::definition::ItemRole;

// ============================================================================
// CELLS
// ============================================================================

/// One output cell: a value plus the role of the mapping item that wrote it.
///
/// The role tag lets writers style header markers, dimension members and
/// parameter values differently without re-deriving where a cell came from.
/// Padding and never-written cells carry no role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: Value,
    #[serde(default)]
    pub role: Option<ItemRole>,
}

impl Cell {
    pub fn new(value: Value, role: ItemRole) -> Self {
        Cell {
            value,
            role: Some(role),
        }
    }

    pub fn empty() -> Self {
        Cell {
            value: Value::Empty,
            role: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::empty()
    }
}

// ============================================================================
// FLATTENED TABLES
// ============================================================================

/// One rectangular output table.
///
/// `header_rows` counts leading rows that the compactor and the preview
/// limiter must leave alone (at most 1 today: the always-exported header).
/// `source_classes` records which entity classes contributed rows, in first
/// contribution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedTable {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    pub header_rows: usize,
    pub source_classes: Vec<String>,
}

impl FlattenedTable {
    pub fn new(name: impl Into<String>) -> Self {
        FlattenedTable {
            name: name.into(),
            rows: Vec::new(),
            header_rows: 0,
            source_classes: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row. Equals every row's length once the table
    /// has been normalized.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Notes that `class` contributed rows to this table.
    pub fn record_source_class(&mut self, class: &str) {
        if !self.source_classes.iter().any(|c| c == class) {
            self.source_classes.push(class.to_string());
        }
    }

    /// Pads every row with empty cells to the width of the widest row.
    pub fn normalize(&mut self) {
        let width = self.width();
        for row in &mut self.rows {
            row.resize(width, Cell::empty());
        }
    }
}

// ============================================================================
// TABLE SET
// ============================================================================

/// The tables produced by one or more runs, in creation order.
///
/// Keyed by effective table name. Merging a table under an existing name
/// appends its body rows; the first run's header stays in place and later
/// runs' protected header rows are dropped rather than interleaved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FlattenedTable>", into = "Vec<FlattenedTable>")]
pub struct OutputTableSet {
    tables: Vec<FlattenedTable>,
    index: FxHashMap<String, usize>,
}

impl OutputTableSet {
    pub fn new() -> Self {
        OutputTableSet::default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FlattenedTable> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    pub fn tables(&self) -> &[FlattenedTable] {
        &self.tables
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlattenedTable> {
        self.tables.iter()
    }

    pub(crate) fn tables_mut(&mut self) -> impl Iterator<Item = &mut FlattenedTable> {
        self.tables.iter_mut()
    }

    /// Adds `table` to the set, appending to a same-named table if present.
    pub fn merge(&mut self, mut table: FlattenedTable) {
        table.normalize();
        match self.index.get(&table.name) {
            Some(&i) => {
                let existing = &mut self.tables[i];
                let skip = table.header_rows.min(table.rows.len());
                existing.rows.extend(table.rows.drain(skip..));
                for class in table.source_classes {
                    existing.record_source_class(&class);
                }
                existing.normalize();
            }
            None => {
                self.index.insert(table.name.clone(), self.tables.len());
                self.tables.push(table);
            }
        }
    }

    pub fn into_tables(self) -> Vec<FlattenedTable> {
        self.tables
    }
}

impl From<Vec<FlattenedTable>> for OutputTableSet {
    fn from(tables: Vec<FlattenedTable>) -> Self {
        let mut set = OutputTableSet::new();
        for table in tables {
            set.merge(table);
        }
        set
    }
}

impl From<OutputTableSet> for Vec<FlattenedTable> {
    fn from(set: OutputTableSet) -> Self {
        set.tables
    }
}

// ============================================================================
// TESTS
// ============================================================================

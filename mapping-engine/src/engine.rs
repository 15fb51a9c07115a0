//! FILENAME: mapping-engine/src/engine.rs
//! Table Flattener - turns a relational snapshot into flat tables.
//!
//! The flattening algorithm:
//! 1. Sort the specification's items into their geometric duties: row-axis
//!    items key and fill the static columns, column-axis items pivot across
//!    the table, header-axis items title it once.
//! 2. Walk classes of the configured kind, their entities, and (under a
//!    parameter scope) their parameter entries, in adapter order.
//! 3. Each visit renders every item and writes the results through per-cell
//!    accumulators; repeated writes into the same body cell fold via the
//!    group function.
//! 4. Finalize: header row, pivot header rows, then body rows in first-write
//!    order, padded rectangular.
//!
//! Data problems become diagnostics, never aborts. Cancellation is checked
//! between entities, so a granted cancel still yields a well-formed prefix
//! of the full output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use entity_model::{
    Entity, EntityClass, EntityModelAdapter, ParameterEntry, ParameterKind, Value,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::aggregate::{AggregationMismatch, CellAccumulator};
use crate::definition::{
    Axis, GroupFunction, ItemRole, MappingItem, MappingSpecification, ParameterScope,
};
use crate::error::Diagnostic;
use crate::limit::{limit_tables, PreviewCaps};
use crate::resolver;
use crate::table::{Cell, FlattenedTable, OutputTableSet};

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cloneable cancellation handle shared between a host and a running flatten.
///
/// Cancelling is a request: the run stops at the next entity boundary,
/// finalizes what it has and marks the outcome as canceled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Everything one run produced: tables, accumulated diagnostics and whether
/// the run was cut short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenOutcome {
    pub tables: OutputTableSet,
    pub diagnostics: Vec<Diagnostic>,
    pub canceled: bool,
}

// ============================================================================
// ITEM LAYOUT
// ============================================================================

/// Rendered values forming a row or column key.
type KeyTuple = SmallVec<[Value; 4]>;

/// A row-axis item at its literal column. `folds` marks the single item
/// whose repeated writes fold via the group function.
struct StaticItem<'a> {
    item: &'a MappingItem,
    folds: bool,
}

/// The specification's items sorted into their geometric duties.
///
/// With column-axis items present, the greatest-position row-axis item
/// leaves the static region and becomes the pivot body; the remaining
/// row-axis values key the rows. Without a pivot every row-axis item keeps
/// its literal column and the full value tuple keys the rows.
struct ItemLayout<'a> {
    static_items: Vec<StaticItem<'a>>,
    pivot_body: Option<&'a MappingItem>,
    column_items: Vec<&'a MappingItem>,
    header_items: Vec<&'a MappingItem>,
    /// Columns occupied by static and header cells; body columns follow.
    static_width: usize,
    /// Pivot header rows stacked above the body.
    pivot_rows: usize,
    emit_header: bool,
}

impl<'a> ItemLayout<'a> {
    fn new(spec: &'a MappingSpecification) -> Self {
        let mut row_items: Vec<&MappingItem> = spec
            .items()
            .iter()
            .filter(|i| i.axis == Axis::Row)
            .collect();
        row_items.sort_by_key(|i| i.position);

        let mut column_items: Vec<&MappingItem> = spec
            .items()
            .iter()
            .filter(|i| i.axis == Axis::Column)
            .collect();
        column_items.sort_by_key(|i| i.position);

        let mut header_items: Vec<&MappingItem> = spec
            .items()
            .iter()
            .filter(|i| i.axis == Axis::Header)
            .collect();
        header_items.sort_by_key(|i| i.position);

        let pivoted = !column_items.is_empty();
        let pivot_body = if pivoted { row_items.pop() } else { None };

        let fold_index = if pivoted {
            None
        } else {
            row_items.len().checked_sub(1)
        };
        let static_items: Vec<StaticItem> = row_items
            .into_iter()
            .enumerate()
            .map(|(i, item)| StaticItem {
                item,
                folds: Some(i) == fold_index,
            })
            .collect();

        let static_width = static_items
            .iter()
            .map(|s| s.item.position + 1)
            .chain(header_items.iter().map(|i| i.position + 1))
            .max()
            .unwrap_or(0);

        let pivot_rows = column_items
            .iter()
            .map(|i| i.position + 1)
            .max()
            .unwrap_or(0);

        ItemLayout {
            static_items,
            pivot_body,
            column_items,
            emit_header: !header_items.is_empty() || spec.always_export_header(),
            header_items,
            static_width,
            pivot_rows,
        }
    }

    fn pivoted(&self) -> bool {
        !self.column_items.is_empty()
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Everything one leaf visit (entity x optional parameter) renders from.
struct LeafContext<'c> {
    class: &'c EntityClass,
    entity: &'c Entity,
    dimensions: &'c [Value],
    parameter: Option<&'c ParameterEntry>,
}

/// Renders one item for the current visit. `Value::Empty` means "write
/// nothing", never "write an empty cell".
fn render(item: &MappingItem, ctx: &LeafContext) -> Value {
    // A per-item highlighted dimension re-filters this item alone: a
    // parameter scoped to a different member renders nothing here while the
    // rest of the row proceeds.
    let highlight_passes = match (item.highlighted_dimension, ctx.parameter) {
        (Some(slot), Some(entry)) => {
            resolver::highlight_passes(ctx.dimensions, Some(slot), entry)
        }
        _ => true,
    };

    match item.role {
        ItemRole::FixedString | ItemRole::HeaderMarker => {
            Value::text(item.text.clone().unwrap_or_default())
        }
        ItemRole::EntityClassName => Value::text(ctx.class.name.clone()),
        ItemRole::Dimension => item
            .dimension
            .and_then(|slot| ctx.dimensions.get(slot - 1))
            .cloned()
            .unwrap_or(Value::Empty),
        ItemRole::ParameterName => match ctx.parameter {
            Some(entry) if highlight_passes => Value::text(entry.name.clone()),
            _ => Value::Empty,
        },
        ItemRole::ParameterValue | ItemRole::ParameterDefaultValue => match ctx.parameter {
            Some(entry) if highlight_passes => entry.value.clone(),
            _ => Value::Empty,
        },
    }
}

/// Renders a header-axis item. Only entity-independent roles reach this
/// (validation keeps the rest off the header axis).
fn render_header(item: &MappingItem, class: &EntityClass) -> Value {
    match item.role {
        ItemRole::FixedString | ItemRole::HeaderMarker => {
            Value::text(item.text.clone().unwrap_or_default())
        }
        ItemRole::EntityClassName => Value::text(class.name.clone()),
        ItemRole::Dimension
        | ItemRole::ParameterName
        | ItemRole::ParameterValue
        | ItemRole::ParameterDefaultValue => Value::Empty,
    }
}

// ============================================================================
// TABLE BUILDER
// ============================================================================

/// Accumulating state for one table while a run is in flight.
struct TableBuilder {
    name: String,
    source_classes: Vec<String>,
    header_cells: Vec<Cell>,
    header_written: bool,
    row_index: FxHashMap<KeyTuple, usize>,
    rows: Vec<RowBuilder>,
    col_index: FxHashMap<KeyTuple, usize>,
    col_order: Vec<KeyTuple>,
}

struct RowBuilder {
    static_cells: Vec<Option<CellAccumulator>>,
    body_cells: Vec<Option<CellAccumulator>>,
}

impl RowBuilder {
    fn new(static_width: usize) -> Self {
        let mut static_cells = Vec::with_capacity(static_width);
        static_cells.resize_with(static_width, || None);
        RowBuilder {
            static_cells,
            body_cells: Vec::new(),
        }
    }
}

impl TableBuilder {
    fn new(name: &str, layout: &ItemLayout) -> Self {
        TableBuilder {
            name: name.to_string(),
            source_classes: Vec::new(),
            header_cells: vec![Cell::empty(); layout.static_width],
            header_written: false,
            row_index: FxHashMap::default(),
            rows: Vec::new(),
            col_index: FxHashMap::default(),
            col_order: Vec::new(),
        }
    }

    /// Marks `class` as contributing and writes the header cells on the
    /// first contribution. Under a fixed table name several classes share
    /// one table; the header keeps the first contributor's rendering.
    fn begin_class(&mut self, class: &EntityClass, layout: &ItemLayout) {
        if !self.source_classes.iter().any(|c| c == &class.name) {
            self.source_classes.push(class.name.clone());
        }
        if self.header_written || !layout.emit_header {
            return;
        }
        for item in &layout.header_items {
            let value = render_header(item, class);
            if !value.is_empty() {
                self.header_cells[item.position] = Cell::new(value, item.role);
            }
        }
        self.header_written = true;
    }

    fn row_entry(&mut self, key: KeyTuple, static_width: usize) -> usize {
        match self.row_index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.rows.len();
                self.rows.push(RowBuilder::new(static_width));
                self.row_index.insert(key, i);
                i
            }
        }
    }

    fn column_ordinal(&mut self, key: KeyTuple) -> usize {
        match self.col_index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.col_order.len();
                self.col_order.push(key.clone());
                self.col_index.insert(key, i);
                i
            }
        }
    }

    fn write_static(
        &mut self,
        row: usize,
        col: usize,
        function: GroupFunction,
        role: ItemRole,
        value: &Value,
    ) -> Result<(), AggregationMismatch> {
        self.rows[row].static_cells[col]
            .get_or_insert_with(|| CellAccumulator::new(function, role))
            .write(value)
    }

    fn write_body(
        &mut self,
        row: usize,
        ordinal: usize,
        function: GroupFunction,
        role: ItemRole,
        value: &Value,
    ) -> Result<(), AggregationMismatch> {
        let cells = &mut self.rows[row].body_cells;
        if cells.len() <= ordinal {
            cells.resize_with(ordinal + 1, || None);
        }
        cells[ordinal]
            .get_or_insert_with(|| CellAccumulator::new(function, role))
            .write(value)
    }

    /// Assembles the final grid: header row, pivot header rows, body rows.
    fn finalize(self, layout: &ItemLayout, protect_header: bool) -> FlattenedTable {
        let mut table = FlattenedTable::new(self.name);
        table.source_classes = self.source_classes;
        let width = layout.static_width + self.col_order.len();

        if layout.emit_header {
            let mut row = self.header_cells;
            row.resize(width, Cell::empty());
            table.push_row(row);
            if protect_header {
                table.header_rows = 1;
            }
        }

        // One pivot header row per literal column-item position; positions
        // nobody occupies stay as empty rows for the compactor to judge.
        for r in 0..layout.pivot_rows {
            let mut row = vec![Cell::empty(); layout.static_width];
            if let Some(component) = layout.column_items.iter().position(|i| i.position == r) {
                let role = layout.column_items[component].role;
                for key in &self.col_order {
                    let value = key[component].clone();
                    row.push(if value.is_empty() {
                        Cell::empty()
                    } else {
                        Cell::new(value, role)
                    });
                }
            }
            table.push_row(row);
        }

        for built in self.rows {
            let mut row: Vec<Cell> = Vec::with_capacity(width);
            for col in 0..layout.static_width {
                row.push(match built.static_cells.get(col).and_then(|a| a.as_ref()) {
                    Some(acc) => acc.materialize(),
                    None => Cell::empty(),
                });
            }
            for ordinal in 0..self.col_order.len() {
                row.push(match built.body_cells.get(ordinal).and_then(|a| a.as_ref()) {
                    Some(acc) => acc.materialize(),
                    None => Cell::empty(),
                });
            }
            table.push_row(row);
        }

        table.normalize();
        table
    }
}

// ============================================================================
// FLATTENER
// ============================================================================

/// One flattening run over one specification and one snapshot.
pub struct Flattener<'a> {
    spec: &'a MappingSpecification,
    adapter: &'a dyn EntityModelAdapter,
    cancel: Option<&'a CancelToken>,
}

impl<'a> Flattener<'a> {
    pub fn new(spec: &'a MappingSpecification, adapter: &'a dyn EntityModelAdapter) -> Self {
        Flattener {
            spec,
            adapter,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Runs to completion (or cancellation) and returns a fresh outcome.
    pub fn run(&self) -> FlattenOutcome {
        let mut tables = OutputTableSet::new();
        let mut diagnostics = Vec::new();
        let canceled = self.run_into(&mut tables, &mut diagnostics);
        FlattenOutcome {
            tables,
            diagnostics,
            canceled,
        }
    }

    /// Runs and merges the produced tables into `out`, appending body rows
    /// to any same-named table already there. Returns true when canceled.
    pub fn run_into(
        &self,
        out: &mut OutputTableSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        let layout = ItemLayout::new(self.spec);
        let mut builders: Vec<TableBuilder> = Vec::new();
        let mut builder_index: FxHashMap<String, usize> = FxHashMap::default();
        let mut canceled = false;

        log::debug!(
            "flatten start: kind {:?}, {} items, scope {:?}",
            self.spec.entity_class_kind(),
            self.spec.items().len(),
            self.spec.parameter_scope()
        );

        'classes: for class in self.adapter.classes(self.spec.entity_class_kind()) {
            if self.is_canceled() {
                canceled = true;
                break;
            }
            if let Err(diag) = resolver::check_class(self.spec, &class) {
                diagnostics.push(diag);
                continue;
            }
            let table_name = self.spec.table_name_for(&class.name).to_string();

            // Header-complete tables exist even for classes with no
            // entities when the header is always exported.
            if self.spec.always_export_header() {
                let builder =
                    ensure_builder(&mut builders, &mut builder_index, &table_name, &layout);
                builder.begin_class(&class, &layout);
            }

            for entity in self.adapter.entities(&class) {
                if self.is_canceled() {
                    canceled = true;
                    break 'classes;
                }
                let dimensions =
                    match resolver::resolve_dimensions(self.adapter, self.spec, &class, &entity)
                    {
                        Ok(values) => values,
                        Err(diag) => {
                            diagnostics.push(diag);
                            continue;
                        }
                    };

                let parameter_kind = match self.spec.parameter_scope() {
                    ParameterScope::None => None,
                    ParameterScope::Value => Some(ParameterKind::Value),
                    ParameterScope::DefaultValue => Some(ParameterKind::DefaultValue),
                };
                match parameter_kind {
                    None => {
                        let ctx = LeafContext {
                            class: &class,
                            entity: &entity,
                            dimensions: &dimensions,
                            parameter: None,
                        };
                        self.write_leaf(
                            &mut builders,
                            &mut builder_index,
                            &table_name,
                            &layout,
                            &ctx,
                            diagnostics,
                        );
                    }
                    Some(kind) => {
                        for entry in self.adapter.parameters(&entity, kind) {
                            if !resolver::highlight_passes(
                                &dimensions,
                                self.spec.highlighted_dimension(),
                                &entry,
                            ) {
                                continue;
                            }
                            let ctx = LeafContext {
                                class: &class,
                                entity: &entity,
                                dimensions: &dimensions,
                                parameter: Some(&entry),
                            };
                            self.write_leaf(
                                &mut builders,
                                &mut builder_index,
                                &table_name,
                                &layout,
                                &ctx,
                                diagnostics,
                            );
                        }
                    }
                }
            }
        }

        if canceled {
            diagnostics.push(Diagnostic::cancellation_requested());
        }

        let table_count = builders.len();
        let mut row_count = 0;
        for builder in builders {
            let table = builder.finalize(&layout, self.spec.always_export_header());
            row_count += table.row_count();
            out.merge(table);
        }

        log::debug!(
            "flatten done: {table_count} tables, {row_count} rows, {} diagnostics, canceled {canceled}",
            diagnostics.len()
        );
        canceled
    }

    /// Renders every item for one visit and writes the results.
    ///
    /// A visit whose renders are all empty writes nothing and claims no
    /// row; suppressed items must leave no trace.
    fn write_leaf(
        &self,
        builders: &mut Vec<TableBuilder>,
        builder_index: &mut FxHashMap<String, usize>,
        table_name: &str,
        layout: &ItemLayout,
        ctx: &LeafContext,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let static_values: Vec<Value> = layout
            .static_items
            .iter()
            .map(|s| render(s.item, ctx))
            .collect();

        let body_value = layout.pivot_body.map(|item| render(item, ctx));
        let column_key: Option<KeyTuple> = if layout.pivoted() {
            Some(layout.column_items.iter().map(|i| render(i, ctx)).collect())
        } else {
            None
        };

        let has_static_write = static_values.iter().any(|v| !v.is_empty());
        let has_body_write = body_value.as_ref().map(|v| !v.is_empty()).unwrap_or(false);
        let registers_column = column_key
            .as_ref()
            .map(|key| key.iter().any(|v| !v.is_empty()))
            .unwrap_or(false)
            || has_body_write;

        if !has_static_write && !has_body_write && !registers_column {
            return;
        }

        let builder = ensure_builder(builders, builder_index, table_name, layout);
        builder.begin_class(ctx.class, layout);

        // An all-empty column key claims no column.
        let ordinal = match column_key {
            Some(key) if registers_column => Some(builder.column_ordinal(key)),
            _ => None,
        };

        if !has_static_write && !has_body_write {
            return;
        }
        let row = builder.row_entry(
            static_values.iter().cloned().collect(),
            layout.static_width,
        );

        for (slot, value) in layout.static_items.iter().zip(&static_values) {
            if value.is_empty() {
                continue;
            }
            let function = if slot.folds {
                self.spec.group_function()
            } else {
                GroupFunction::Identity
            };
            if let Err(err) = builder.write_static(row, slot.item.position, function, slot.item.role, value)
            {
                diagnostics.push(Diagnostic::aggregation_type_error(
                    ctx.class.name.clone(),
                    Some(ctx.entity.name.clone()),
                    err.to_string(),
                ));
            }
        }

        if let (Some(item), Some(ordinal)) = (layout.pivot_body, ordinal) {
            if let Some(value) = body_value.as_ref().filter(|v| !v.is_empty()) {
                if let Err(err) =
                    builder.write_body(row, ordinal, self.spec.group_function(), item.role, value)
                {
                    diagnostics.push(Diagnostic::aggregation_type_error(
                        ctx.class.name.clone(),
                        Some(ctx.entity.name.clone()),
                        err.to_string(),
                    ));
                }
            }
        }
    }

    fn is_canceled(&self) -> bool {
        self.cancel.map(|t| t.is_canceled()).unwrap_or(false)
    }
}

fn ensure_builder<'b>(
    builders: &'b mut Vec<TableBuilder>,
    index: &mut FxHashMap<String, usize>,
    name: &str,
    layout: &ItemLayout,
) -> &'b mut TableBuilder {
    let i = match index.get(name) {
        Some(&i) => i,
        None => {
            let i = builders.len();
            builders.push(TableBuilder::new(name, layout));
            index.insert(name.to_string(), i);
            i
        }
    };
    &mut builders[i]
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Flattens for a live preview: computes the full result, then truncates a
/// copy to `caps`. Capping after the fact keeps aggregated cells identical
/// to what the real export would contain.
pub fn compute_preview(
    spec: &MappingSpecification,
    adapter: &dyn EntityModelAdapter,
    caps: PreviewCaps,
    cancel: Option<&CancelToken>,
) -> FlattenOutcome {
    let mut outcome = run_with(spec, adapter, cancel);
    outcome.tables = limit_tables(&outcome.tables, caps);
    outcome
}

/// Flattens the complete, uncapped output.
pub fn compute_export(
    spec: &MappingSpecification,
    adapter: &dyn EntityModelAdapter,
    cancel: Option<&CancelToken>,
) -> FlattenOutcome {
    run_with(spec, adapter, cancel)
}

/// Runs one specification into an existing table set, so several
/// specifications can write one export together. Returns true when the run
/// was canceled.
pub fn flatten_into(
    spec: &MappingSpecification,
    adapter: &dyn EntityModelAdapter,
    tables: &mut OutputTableSet,
    diagnostics: &mut Vec<Diagnostic>,
    cancel: Option<&CancelToken>,
) -> bool {
    let mut flattener = Flattener::new(spec, adapter);
    if let Some(token) = cancel {
        flattener = flattener.with_cancel(token);
    }
    flattener.run_into(tables, diagnostics)
}

fn run_with(
    spec: &MappingSpecification,
    adapter: &dyn EntityModelAdapter,
    cancel: Option<&CancelToken>,
) -> FlattenOutcome {
    let mut flattener = Flattener::new(spec, adapter);
    if let Some(token) = cancel {
        flattener = flattener.with_cancel(token);
    }
    flattener.run()
}

// ============================================================================
// TESTS
// ============================================================================

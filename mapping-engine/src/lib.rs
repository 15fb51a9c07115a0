//! FILENAME: mapping-engine/src/lib.rs
//! Export mapping subsystem.
//!
//! This crate turns relational snapshots into flat, writer-ready tables
//! under a declarative mapping specification. It depends on `entity-model`
//! only for the source-side contract (Value, EntityClass, the adapter).
//!
//! Layers:
//! - `definition`: Serializable, validated configuration (what the mapping IS)
//! - `resolver`: Per-entity dimension resolution and highlight filtering
//! - `aggregate`: Per-cell group-function accumulators
//! - `engine`: The flattener (HOW tables are produced)
//! - `table`: The flattened output model (WHAT a run produces)
//! - `compact` / `limit`: Post-processes for dense output and previews
//! - `error`: Construction errors and run diagnostics

pub mod aggregate;
pub mod compact;
pub mod definition;
pub mod engine;
pub mod error;
pub mod limit;
pub mod resolver;
pub mod table;

pub use compact::{compact_table, compact_tables};
pub use definition::{
    Axis, GroupFunction, ItemRole, MappingItem, MappingSpecification, ParameterScope,
    SpecificationData, MAX_POSITION,
};
pub use engine::{
    compute_export, compute_preview, flatten_into, CancelToken, FlattenOutcome, Flattener,
};
pub use error::{Diagnostic, DiagnosticKind, InvalidSpecification};
pub use limit::{limit_tables, PreviewCaps};
pub use table::{Cell, FlattenedTable, OutputTableSet};

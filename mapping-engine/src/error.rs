//! FILENAME: mapping-engine/src/error.rs
//! PURPOSE: The two failure channels of a mapping run.
//! CONTEXT: A malformed specification is rejected up front with
//! `InvalidSpecification` and nothing is computed. Everything that goes wrong
//! against live data is reported as a `Diagnostic` while the run keeps going,
//! so one bad entity never sinks an export.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definition::{Axis, ItemRole, MAX_POSITION};

// ============================================================================
// CONSTRUCTION-TIME ERRORS
// ============================================================================

/// Rejections raised while validating a mapping specification.
///
/// Item indices refer to positions in the specification's item list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidSpecification {
    #[error("items {first} and {second} both occupy position {position} on the {axis:?} axis")]
    DuplicatePosition {
        axis: Axis,
        position: usize,
        first: usize,
        second: usize,
    },

    #[error("item {index} names position {position}, legal positions are 0..={}", MAX_POSITION)]
    PositionOutOfRange { index: usize, position: usize },

    #[error("highlighted dimension {dimension} is outside 1..={dimension_count}")]
    HighlightedDimensionOutOfRange {
        dimension: usize,
        dimension_count: usize,
    },

    #[error("item {index} maps {role:?} but the parameter scope is none")]
    ParameterItemWithoutScope { index: usize, role: ItemRole },

    #[error("dimension item {index} does not name a dimension slot")]
    DimensionSlotMissing { index: usize },

    #[error("dimension item {index} names slot {slot}, valid slots are 1..={dimension_count}")]
    DimensionSlotOutOfRange {
        index: usize,
        slot: usize,
        dimension_count: usize,
    },

    #[error("item {index} maps entity-dependent {role:?} on the header axis")]
    EntityRoleOnHeaderAxis { index: usize, role: ItemRole },

    #[error("header marker item {index} must sit on the header axis")]
    HeaderMarkerOffHeaderAxis { index: usize },

    #[error("relationship dimension count must be at least 1")]
    ZeroDimensionCount,
}

// ============================================================================
// RUN-TIME DIAGNOSTICS
// ============================================================================

/// What went wrong for one class, entity or cell during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An entity (or a whole class) carried the wrong number of dimension
    /// values for the specification and was skipped.
    DimensionOutOfRange,
    /// A numeric group function met a non-numeric value; the cell was
    /// cleared and further writes to it ignored.
    AggregationTypeError,
    /// Cooperative cancellation stopped the run; the output is a prefix of
    /// the full result.
    CancellationRequested,
}

/// A non-fatal problem recorded during flattening.
///
/// `class` and `entity` locate the problem where that makes sense; a
/// run-level diagnostic such as cancellation carries neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub class: Option<String>,
    pub entity: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn dimension_out_of_range(
        class: impl Into<String>,
        entity: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            kind: DiagnosticKind::DimensionOutOfRange,
            class: Some(class.into()),
            entity,
            message: message.into(),
        }
    }

    pub fn aggregation_type_error(
        class: impl Into<String>,
        entity: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            kind: DiagnosticKind::AggregationTypeError,
            class: Some(class.into()),
            entity,
            message: message.into(),
        }
    }

    pub fn cancellation_requested() -> Self {
        Diagnostic {
            kind: DiagnosticKind::CancellationRequested,
            class: None,
            entity: None,
            message: "run canceled before completion; output is partial".to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offending_items() {
        let err = InvalidSpecification::DuplicatePosition {
            axis: Axis::Row,
            position: 3,
            first: 0,
            second: 2,
        };
        let text = err.to_string();
        assert!(text.contains("position 3"));
        assert!(text.contains("Row"));

        let err = InvalidSpecification::DimensionSlotOutOfRange {
            index: 1,
            slot: 4,
            dimension_count: 2,
        };
        assert!(err.to_string().contains("1..=2"));

        let err = InvalidSpecification::PositionOutOfRange {
            index: 5,
            position: usize::MAX,
        };
        assert!(err.to_string().contains(&format!("0..={}", MAX_POSITION)));
    }

    #[test]
    fn test_diagnostic_constructors() {
        let diag = Diagnostic::dimension_out_of_range(
            "unit__node",
            Some("u1__n1".to_string()),
            "expected 2 dimension values, found 3",
        );
        assert_eq!(diag.kind, DiagnosticKind::DimensionOutOfRange);
        assert_eq!(diag.class.as_deref(), Some("unit__node"));
        assert_eq!(diag.entity.as_deref(), Some("u1__n1"));

        let diag = Diagnostic::cancellation_requested();
        assert_eq!(diag.kind, DiagnosticKind::CancellationRequested);
        assert!(diag.class.is_none());
    }
}

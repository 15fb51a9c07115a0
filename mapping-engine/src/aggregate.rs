//! FILENAME: mapping-engine/src/aggregate.rs
//! PURPOSE: Per-cell accumulators for the group functions.
//! CONTEXT: When several leaf visits land in the same body cell, the cell
//! folds them incrementally instead of buffering writes. The fold is strictly
//! left-to-right in write order; a numeric fold that meets a non-numeric
//! value poisons the cell, which then materializes as empty and swallows
//! every later write.

use thiserror::Error;

use entity_model::Value;

use crate::definition::{GroupFunction, ItemRole};
use crate::table::Cell;

/// A numeric group function met a value it cannot fold.
///
/// Raised at most once per cell: the failing write poisons the cell and
/// subsequent writes are ignored without error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot fold a {value_kind} value with {function:?}")]
pub struct AggregationMismatch {
    pub function: GroupFunction,
    pub value_kind: &'static str,
}

#[derive(Debug, Clone)]
enum FoldState {
    Untouched,
    Identity(Value),
    Sum(f64),
    Count(u64),
    Average { sum: f64, count: u64 },
    Concatenate(String),
    Min(f64),
    Max(f64),
    Poisoned,
}

/// Incremental fold state for one output cell.
///
/// The accumulator remembers the role of the mapping item that feeds it and
/// tags the materialized cell with it.
#[derive(Debug, Clone)]
pub struct CellAccumulator {
    function: GroupFunction,
    role: ItemRole,
    state: FoldState,
}

impl CellAccumulator {
    pub fn new(function: GroupFunction, role: ItemRole) -> Self {
        CellAccumulator {
            function,
            role,
            state: FoldState::Untouched,
        }
    }

    /// Folds one rendered value into the cell.
    ///
    /// Empty values never reach an accumulator (rendering them is a
    /// non-write), but are tolerated here as no-ops.
    pub fn write(&mut self, value: &Value) -> Result<(), AggregationMismatch> {
        if value.is_empty() {
            return Ok(());
        }
        if matches!(self.state, FoldState::Poisoned) {
            return Ok(());
        }
        match self.function {
            GroupFunction::Identity => {
                self.state = FoldState::Identity(value.clone());
            }
            GroupFunction::Count => {
                let so_far = match self.state {
                    FoldState::Count(n) => n,
                    _ => 0,
                };
                self.state = FoldState::Count(so_far + 1);
            }
            GroupFunction::Concatenate => {
                let rendered = value.to_display_string();
                match &mut self.state {
                    FoldState::Concatenate(joined) => {
                        joined.push_str(", ");
                        joined.push_str(&rendered);
                    }
                    _ => self.state = FoldState::Concatenate(rendered),
                }
            }
            GroupFunction::Sum => {
                let n = self.numeric(value)?;
                let so_far = match self.state {
                    FoldState::Sum(s) => s,
                    _ => 0.0,
                };
                self.state = FoldState::Sum(so_far + n);
            }
            GroupFunction::Average => {
                let n = self.numeric(value)?;
                let (sum, count) = match self.state {
                    FoldState::Average { sum, count } => (sum, count),
                    _ => (0.0, 0),
                };
                self.state = FoldState::Average {
                    sum: sum + n,
                    count: count + 1,
                };
            }
            GroupFunction::Min => {
                let n = self.numeric(value)?;
                let folded = match self.state {
                    FoldState::Min(m) => m.min(n),
                    _ => n,
                };
                self.state = FoldState::Min(folded);
            }
            GroupFunction::Max => {
                let n = self.numeric(value)?;
                let folded = match self.state {
                    FoldState::Max(m) => m.max(n),
                    _ => n,
                };
                self.state = FoldState::Max(folded);
            }
        }
        Ok(())
    }

    /// Extracts the numeric content or poisons the cell.
    fn numeric(&mut self, value: &Value) -> Result<f64, AggregationMismatch> {
        match value.as_number() {
            Some(n) => Ok(n),
            None => {
                self.state = FoldState::Poisoned;
                Err(AggregationMismatch {
                    function: self.function,
                    value_kind: value.kind_label(),
                })
            }
        }
    }

    /// Produces the final cell.
    pub fn materialize(&self) -> Cell {
        match &self.state {
            FoldState::Untouched | FoldState::Poisoned => Cell::empty(),
            FoldState::Identity(value) => Cell::new(value.clone(), self.role),
            FoldState::Sum(sum) => Cell::new(Value::Number(*sum), self.role),
            FoldState::Count(count) => Cell::new(Value::Number(*count as f64), self.role),
            FoldState::Average { sum, count } => {
                Cell::new(Value::Number(sum / *count as f64), self.role)
            }
            FoldState::Concatenate(joined) => Cell::new(Value::text(joined.clone()), self.role),
            FoldState::Min(m) => Cell::new(Value::Number(*m), self.role),
            FoldState::Max(m) => Cell::new(Value::Number(*m), self.role),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(function: GroupFunction, values: &[Value]) -> Cell {
        let mut acc = CellAccumulator::new(function, ItemRole::ParameterValue);
        for value in values {
            // Mismatches are asserted in their own tests.
            let _ = acc.write(value);
        }
        acc.materialize()
    }

    #[test]
    fn test_identity_keeps_the_last_write() {
        let cell = fold(
            GroupFunction::Identity,
            &[Value::text("a"), Value::text("b")],
        );
        assert_eq!(cell.value, Value::text("b"));
        assert_eq!(cell.role, Some(ItemRole::ParameterValue));
    }

    #[test]
    fn test_sum_min_max() {
        let values = [Value::Number(3.0), Value::Number(-1.0), Value::Number(4.0)];
        assert_eq!(fold(GroupFunction::Sum, &values).value, Value::Number(6.0));
        assert_eq!(fold(GroupFunction::Min, &values).value, Value::Number(-1.0));
        assert_eq!(fold(GroupFunction::Max, &values).value, Value::Number(4.0));
    }

    #[test]
    fn test_average_materializes_at_the_end() {
        let cell = fold(
            GroupFunction::Average,
            &[Value::Number(1.0), Value::Number(2.0), Value::Number(6.0)],
        );
        assert_eq!(cell.value, Value::Number(3.0));
    }

    #[test]
    fn test_count_counts_non_numeric_writes_too() {
        let cell = fold(
            GroupFunction::Count,
            &[Value::text("x"), Value::Boolean(true), Value::Number(0.0)],
        );
        assert_eq!(cell.value, Value::Number(3.0));
    }

    #[test]
    fn test_concatenate_joins_in_write_order() {
        let cell = fold(
            GroupFunction::Concatenate,
            &[Value::text("b"), Value::Number(2.0), Value::text("a")],
        );
        assert_eq!(cell.value, Value::text("b, 2, a"));
    }

    #[test]
    fn test_empty_writes_do_not_disturb_the_fold() {
        let cell = fold(
            GroupFunction::Count,
            &[Value::text("x"), Value::Empty, Value::text("y")],
        );
        assert_eq!(cell.value, Value::Number(2.0));

        let cell = fold(GroupFunction::Identity, &[Value::text("a"), Value::Empty]);
        assert_eq!(cell.value, Value::text("a"));
    }

    #[test]
    fn test_non_numeric_write_poisons_numeric_fold() {
        let mut acc = CellAccumulator::new(GroupFunction::Sum, ItemRole::ParameterValue);
        acc.write(&Value::Number(2.0)).unwrap();

        let err = acc.write(&Value::text("oops")).unwrap_err();
        assert_eq!(err.function, GroupFunction::Sum);
        assert_eq!(err.value_kind, "text");

        // Later writes are swallowed without a second error.
        assert!(acc.write(&Value::Number(5.0)).is_ok());
        assert!(acc.write(&Value::text("still bad")).is_ok());

        assert_eq!(acc.materialize(), Cell::empty());
    }

    #[test]
    fn test_untouched_accumulator_materializes_empty() {
        let acc = CellAccumulator::new(GroupFunction::Sum, ItemRole::ParameterValue);
        assert_eq!(acc.materialize(), Cell::empty());
    }
}

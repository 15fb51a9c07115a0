//! FILENAME: mapping-engine/src/definition.rs
//! Mapping Specification - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a flattening, never
//! to perform one. These structures are designed to be:
//! - Serializable (for saving/loading export projects)
//! - Validated on construction, so the engine only ever sees sound input
//! - Immutable snapshots of user intent

use serde::{Deserialize, Serialize};

use entity_model::EntityClassKind;
use rustc_hash::FxHashMap;

use crate::error::InvalidSpecification;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Greatest legal `MappingItem::position` (spreadsheet formats top out at
/// 16,384 columns).
///
/// Positions are literal slot indices, so the widest row and the deepest
/// pivot header a specification can request scale with its greatest
/// position. The ceiling keeps a mistyped position out of the engine, which
/// sizes its buffers from validated input without re-checking.
pub const MAX_POSITION: usize = 16_383;

// ============================================================================
// AXES AND ROLES
// ============================================================================

/// Which table axis a mapping item feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// The item's values run down the table and take part in row keying.
    Row,
    /// The item's values pivot across the table as generated columns.
    Column,
    /// The item writes one title cell per table, not per entity.
    Header,
}

/// What datum a mapping item extracts at each visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemRole {
    /// The display name of the entity class being iterated.
    EntityClassName,
    /// One member value of the entity, selected by `MappingItem::dimension`.
    Dimension,
    /// The current parameter's name.
    ParameterName,
    /// The current parameter's assigned value.
    ParameterValue,
    /// The current parameter's class-level default value.
    ParameterDefaultValue,
    /// A literal from `MappingItem::text`, identical at every visit.
    FixedString,
    /// A literal column title; only legal on the header axis.
    HeaderMarker,
}

impl ItemRole {
    /// Roles that read the current parameter's value and therefore require
    /// a parameter scope to be configured.
    pub fn reads_parameter_value(&self) -> bool {
        matches!(self, ItemRole::ParameterValue | ItemRole::ParameterDefaultValue)
    }

    /// Roles that need a concrete entity (or its parameter) to render.
    /// These cannot sit on the header axis, which renders once per table.
    pub fn needs_entity(&self) -> bool {
        matches!(
            self,
            ItemRole::Dimension
                | ItemRole::ParameterName
                | ItemRole::ParameterValue
                | ItemRole::ParameterDefaultValue
        )
    }
}

// ============================================================================
// PARAMETER SCOPE
// ============================================================================

/// Which parameter records a run visits, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterScope {
    /// Entities are visited once each; parameter roles render nothing.
    None,
    /// Each entity is visited once per assigned parameter value.
    Value,
    /// Each entity is visited once per class-level default value.
    DefaultValue,
}

impl Default for ParameterScope {
    fn default() -> Self {
        ParameterScope::None
    }
}

// ============================================================================
// GROUP FUNCTIONS
// ============================================================================

/// How repeated writes into the same body cell are folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupFunction {
    /// Last write wins.
    Identity,
    Sum,
    /// Number of non-empty writes; never a type error.
    Count,
    Average,
    /// Stringified writes joined by ", " in write order; never a type error.
    Concatenate,
    Min,
    Max,
}

impl Default for GroupFunction {
    fn default() -> Self {
        GroupFunction::Identity
    }
}

// ============================================================================
// MAPPING ITEMS
// ============================================================================

/// One source-to-table assignment: a role, an axis and a slot on that axis.
///
/// Positions are literal. A sparse layout leaves empty columns in the raw
/// output; the compactor removes them on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingItem {
    pub role: ItemRole,
    pub axis: Axis,
    /// Slot index on the axis (column index for row/header items). Bounded
    /// by [`MAX_POSITION`].
    pub position: usize,
    /// Literal payload for `FixedString` and `HeaderMarker`.
    #[serde(default)]
    pub text: Option<String>,
    /// 1-based dimension slot for `Dimension` items.
    #[serde(default)]
    pub dimension: Option<usize>,
    /// Per-item override of the specification's highlighted dimension,
    /// honored by parameter roles only.
    #[serde(default)]
    pub highlighted_dimension: Option<usize>,
}

impl MappingItem {
    pub fn new(role: ItemRole, axis: Axis, position: usize) -> Self {
        MappingItem {
            role,
            axis,
            position,
            text: None,
            dimension: None,
            highlighted_dimension: None,
        }
    }

    /// A literal string written at every visit.
    pub fn fixed_string(axis: Axis, position: usize, text: impl Into<String>) -> Self {
        let mut item = MappingItem::new(ItemRole::FixedString, axis, position);
        item.text = Some(text.into());
        item
    }

    /// The entity's member value at 1-based `slot`.
    pub fn dimension(axis: Axis, position: usize, slot: usize) -> Self {
        let mut item = MappingItem::new(ItemRole::Dimension, axis, position);
        item.dimension = Some(slot);
        item
    }

    pub fn entity_class_name(axis: Axis, position: usize) -> Self {
        MappingItem::new(ItemRole::EntityClassName, axis, position)
    }

    pub fn parameter_name(axis: Axis, position: usize) -> Self {
        MappingItem::new(ItemRole::ParameterName, axis, position)
    }

    pub fn parameter_value(axis: Axis, position: usize) -> Self {
        MappingItem::new(ItemRole::ParameterValue, axis, position)
    }

    pub fn parameter_default_value(axis: Axis, position: usize) -> Self {
        MappingItem::new(ItemRole::ParameterDefaultValue, axis, position)
    }

    /// A column title cell, written once per table.
    pub fn header_marker(position: usize, text: impl Into<String>) -> Self {
        let mut item = MappingItem::new(ItemRole::HeaderMarker, Axis::Header, position);
        item.text = Some(text.into());
        item
    }

    pub fn with_highlighted_dimension(mut self, slot: usize) -> Self {
        self.highlighted_dimension = Some(slot);
        self
    }
}

// ============================================================================
// SPECIFICATION
// ============================================================================

fn default_dimension_count() -> usize {
    1
}

/// The raw, not-yet-validated field bag for a specification.
///
/// Fill it in, then call [`SpecificationData::validate`] to obtain a
/// [`MappingSpecification`]. Deserialization funnels through the same
/// validation, so a stored specification that no longer passes the rules is
/// rejected at load time rather than mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecificationData {
    pub entity_class_kind: EntityClassKind,
    #[serde(default)]
    pub items: Vec<MappingItem>,
    #[serde(default)]
    pub parameter_scope: ParameterScope,
    #[serde(default = "default_dimension_count")]
    pub relationship_dimension_count: usize,
    #[serde(default)]
    pub highlighted_dimension: Option<usize>,
    #[serde(default)]
    pub fixed_table_name: Option<String>,
    #[serde(default)]
    pub group_function: GroupFunction,
    #[serde(default)]
    pub always_export_header: bool,
}

impl SpecificationData {
    pub fn new(entity_class_kind: EntityClassKind) -> Self {
        SpecificationData {
            entity_class_kind,
            items: Vec::new(),
            parameter_scope: ParameterScope::None,
            relationship_dimension_count: 1,
            highlighted_dimension: None,
            fixed_table_name: None,
            group_function: GroupFunction::Identity,
            always_export_header: false,
        }
    }

    /// Checks every construction rule and freezes the result.
    pub fn validate(self) -> Result<MappingSpecification, InvalidSpecification> {
        MappingSpecification::try_from(self)
    }

    /// The number of dimension slots items may legally address.
    fn dimension_bound(&self) -> usize {
        if self.entity_class_kind.is_relationship_like() {
            self.relationship_dimension_count
        } else {
            1
        }
    }
}

/// A validated mapping specification.
///
/// Construction is the only gate: once built, the engine may assume every
/// invariant below without re-checking.
/// - no two items share an `(axis, position)` pair;
/// - no position exceeds [`MAX_POSITION`];
/// - dimension items name a slot within the class's dimension range;
/// - parameter-value roles appear only under a matching parameter scope;
/// - the header axis carries only entity-independent roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SpecificationData")]
pub struct MappingSpecification {
    entity_class_kind: EntityClassKind,
    items: Vec<MappingItem>,
    parameter_scope: ParameterScope,
    relationship_dimension_count: usize,
    highlighted_dimension: Option<usize>,
    fixed_table_name: Option<String>,
    group_function: GroupFunction,
    always_export_header: bool,
}

impl MappingSpecification {
    /// Validates a specification with default options: no parameter scope,
    /// identity grouping, one dimension, no fixed table name.
    pub fn new(
        entity_class_kind: EntityClassKind,
        items: Vec<MappingItem>,
    ) -> Result<Self, InvalidSpecification> {
        let mut data = SpecificationData::new(entity_class_kind);
        data.items = items;
        data.validate()
    }

    pub fn entity_class_kind(&self) -> EntityClassKind {
        self.entity_class_kind
    }

    pub fn items(&self) -> &[MappingItem] {
        &self.items
    }

    pub fn parameter_scope(&self) -> ParameterScope {
        self.parameter_scope
    }

    pub fn relationship_dimension_count(&self) -> usize {
        self.relationship_dimension_count
    }

    pub fn highlighted_dimension(&self) -> Option<usize> {
        self.highlighted_dimension
    }

    pub fn fixed_table_name(&self) -> Option<&str> {
        self.fixed_table_name.as_deref()
    }

    pub fn group_function(&self) -> GroupFunction {
        self.group_function
    }

    pub fn always_export_header(&self) -> bool {
        self.always_export_header
    }

    /// The output table a class's rows land in: the fixed name when one is
    /// configured, else the class's own name.
    pub fn table_name_for<'a>(&'a self, class_name: &'a str) -> &'a str {
        self.fixed_table_name.as_deref().unwrap_or(class_name)
    }

    /// The number of dimension values an entity must resolve to.
    pub fn expected_dimension_count(&self) -> usize {
        if self.entity_class_kind.is_relationship_like() {
            self.relationship_dimension_count
        } else {
            1
        }
    }
}

impl TryFrom<SpecificationData> for MappingSpecification {
    type Error = InvalidSpecification;

    fn try_from(data: SpecificationData) -> Result<Self, Self::Error> {
        if data.relationship_dimension_count == 0 {
            return Err(InvalidSpecification::ZeroDimensionCount);
        }
        let bound = data.dimension_bound();

        let check_highlight = |slot: Option<usize>| match slot {
            Some(s) if s == 0 || s > bound => {
                Err(InvalidSpecification::HighlightedDimensionOutOfRange {
                    dimension: s,
                    dimension_count: bound,
                })
            }
            _ => Ok(()),
        };
        check_highlight(data.highlighted_dimension)?;

        let mut occupied: FxHashMap<(Axis, usize), usize> = FxHashMap::default();
        for (index, item) in data.items.iter().enumerate() {
            if item.position > MAX_POSITION {
                return Err(InvalidSpecification::PositionOutOfRange {
                    index,
                    position: item.position,
                });
            }

            if let Some(&first) = occupied.get(&(item.axis, item.position)) {
                return Err(InvalidSpecification::DuplicatePosition {
                    axis: item.axis,
                    position: item.position,
                    first,
                    second: index,
                });
            }
            occupied.insert((item.axis, item.position), index);

            if item.role.reads_parameter_value() && data.parameter_scope == ParameterScope::None {
                return Err(InvalidSpecification::ParameterItemWithoutScope {
                    index,
                    role: item.role,
                });
            }

            if item.role == ItemRole::Dimension {
                match item.dimension {
                    None => return Err(InvalidSpecification::DimensionSlotMissing { index }),
                    Some(slot) if slot == 0 || slot > bound => {
                        return Err(InvalidSpecification::DimensionSlotOutOfRange {
                            index,
                            slot,
                            dimension_count: bound,
                        });
                    }
                    Some(_) => {}
                }
            }

            if item.axis == Axis::Header && item.role.needs_entity() {
                return Err(InvalidSpecification::EntityRoleOnHeaderAxis {
                    index,
                    role: item.role,
                });
            }

            if item.role == ItemRole::HeaderMarker && item.axis != Axis::Header {
                return Err(InvalidSpecification::HeaderMarkerOffHeaderAxis { index });
            }

            check_highlight(item.highlighted_dimension)?;
        }

        Ok(MappingSpecification {
            entity_class_kind: data.entity_class_kind,
            items: data.items,
            parameter_scope: data.parameter_scope,
            relationship_dimension_count: data.relationship_dimension_count,
            highlighted_dimension: data.highlighted_dimension,
            fixed_table_name: data.fixed_table_name,
            group_function: data.group_function,
            always_export_header: data.always_export_header,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

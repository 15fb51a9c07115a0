//! FILENAME: entity-model/src/class.rs
//! PURPOSE: Entity class descriptors and the closed set of class kinds.
//! CONTEXT: A mapping run iterates the classes of exactly one kind. The kind
//! set is closed on purpose: engine dispatch is by exhaustive `match`, so a
//! new kind fails compilation everywhere a decision is required instead of
//! falling into a default arm.

use serde::{Deserialize, Serialize};

/// The closed set of entity class kinds a mapping can target.
///
/// Relationship kinds are the only multi-dimensional ones;
/// `RelationshipClassWithObjectParameter` additionally carries per-member
/// parameter records (`ParameterEntry::applies_to`) that the
/// highlighted-dimension filter acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClassKind {
    ObjectClass,
    RelationshipClass,
    RelationshipClassWithObjectParameter,
    ObjectGroup,
    Alternative,
    Scenario,
    ScenarioAlternative,
    ParameterValueList,
    Feature,
    Tool,
    ToolFeature,
    ToolFeatureMethod,
}

impl EntityClassKind {
    /// True for the kinds whose entities span several dimensions.
    pub fn is_relationship_like(&self) -> bool {
        matches!(
            self,
            EntityClassKind::RelationshipClass
                | EntityClassKind::RelationshipClassWithObjectParameter
        )
    }

    /// Human-readable label used in diagnostics and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            EntityClassKind::ObjectClass => "object class",
            EntityClassKind::RelationshipClass => "relationship class",
            EntityClassKind::RelationshipClassWithObjectParameter => {
                "relationship class with object parameter"
            }
            EntityClassKind::ObjectGroup => "object group",
            EntityClassKind::Alternative => "alternative",
            EntityClassKind::Scenario => "scenario",
            EntityClassKind::ScenarioAlternative => "scenario alternative",
            EntityClassKind::ParameterValueList => "parameter value list",
            EntityClassKind::Feature => "feature",
            EntityClassKind::Tool => "tool",
            EntityClassKind::ToolFeature => "tool feature",
            EntityClassKind::ToolFeatureMethod => "tool feature method",
        }
    }
}

/// An entity class snapshot handed out by the model adapter.
///
/// `dimension_count` is the class's declared width: 1 for every
/// single-dimensional kind, the member class count for relationship kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityClass {
    pub name: String,
    pub kind: EntityClassKind,
    pub dimension_count: usize,
}

impl EntityClass {
    pub fn new(name: impl Into<String>, kind: EntityClassKind, dimension_count: usize) -> Self {
        EntityClass {
            name: name.into(),
            kind,
            dimension_count,
        }
    }

    /// A single-dimensional object class.
    pub fn object(name: impl Into<String>) -> Self {
        EntityClass::new(name, EntityClassKind::ObjectClass, 1)
    }

    /// A relationship class spanning `dimension_count` member classes.
    pub fn relationship(name: impl Into<String>, dimension_count: usize) -> Self {
        EntityClass::new(name, EntityClassKind::RelationshipClass, dimension_count)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_like_kinds() {
        assert!(EntityClassKind::RelationshipClass.is_relationship_like());
        assert!(EntityClassKind::RelationshipClassWithObjectParameter.is_relationship_like());
        assert!(!EntityClassKind::ObjectClass.is_relationship_like());
        assert!(!EntityClassKind::ScenarioAlternative.is_relationship_like());
        assert!(!EntityClassKind::ToolFeatureMethod.is_relationship_like());
    }

    #[test]
    fn test_constructors() {
        let objects = EntityClass::object("node");
        assert_eq!(objects.kind, EntityClassKind::ObjectClass);
        assert_eq!(objects.dimension_count, 1);

        let rel = EntityClass::relationship("unit__node", 2);
        assert_eq!(rel.kind, EntityClassKind::RelationshipClass);
        assert_eq!(rel.dimension_count, 2);
    }

    #[test]
    fn test_kind_serde_round_trip() {
        let kinds = vec![
            EntityClassKind::ObjectClass,
            EntityClassKind::RelationshipClassWithObjectParameter,
            EntityClassKind::ScenarioAlternative,
        ];
        let json = serde_json::to_string(&kinds).unwrap();
        let back: Vec<EntityClassKind> = serde_json::from_str(&json).unwrap();
        assert_eq!(kinds, back);
    }
}

//! FILENAME: mapping-engine/src/resolver.rs
//! PURPOSE: Per-entity dimension resolution and the highlighted-member filter.
//! CONTEXT: The flattener calls in here once per entity before rendering
//! anything. A shape mismatch produces a diagnostic and skips the entity (or
//! the whole class when its declaration is already wrong), never an abort.

use entity_model::{Entity, EntityClass, EntityModelAdapter, ParameterEntry, Value};

use crate::definition::MappingSpecification;
use crate::error::Diagnostic;

/// Rejects a class whose declared width cannot satisfy the specification.
///
/// One diagnostic for the class beats one per entity; the caller skips the
/// class entirely on `Err`.
pub fn check_class(
    spec: &MappingSpecification,
    class: &EntityClass,
) -> Result<(), Diagnostic> {
    let expected = spec.expected_dimension_count();
    if class.dimension_count != expected {
        return Err(Diagnostic::dimension_out_of_range(
            class.name.clone(),
            None,
            format!(
                "class declares {} dimensions, mapping expects {expected}; class skipped",
                class.dimension_count
            ),
        ));
    }
    Ok(())
}

/// Fetches and shape-checks one entity's member values.
///
/// The returned vector always has exactly the expected length, so dimension
/// items can index it without re-checking.
pub fn resolve_dimensions(
    adapter: &dyn EntityModelAdapter,
    spec: &MappingSpecification,
    class: &EntityClass,
    entity: &Entity,
) -> Result<Vec<Value>, Diagnostic> {
    let values = adapter.dimension_values(entity);
    let expected = spec.expected_dimension_count();
    if values.len() != expected {
        return Err(Diagnostic::dimension_out_of_range(
            class.name.clone(),
            Some(entity.name.clone()),
            format!(
                "expected {expected} dimension values, found {}; entity skipped",
                values.len()
            ),
        ));
    }
    Ok(values)
}

/// Whether a parameter entry survives the highlighted-member filter.
///
/// Entries scoped to no particular member (`applies_to = None`) always pass.
/// With no highlighted slot configured, everything passes. Otherwise the
/// entry passes only when it names the member value sitting at the 1-based
/// `slot`; comparison is by the member value's display form, since sources
/// scope parameters by member name.
pub fn highlight_passes(
    dimensions: &[Value],
    slot: Option<usize>,
    entry: &ParameterEntry,
) -> bool {
    let Some(member) = &entry.applies_to else {
        return true;
    };
    let Some(slot) = slot else {
        return true;
    };
    match dimensions.get(slot - 1) {
        Some(value) => value.to_display_string() == *member,
        None => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use entity_model::{EntityClassKind, MemoryModel};

    use crate::definition::{Axis, MappingItem, SpecificationData};
    use crate::error::DiagnosticKind;

    fn two_dimensional_spec() -> MappingSpecification {
        let mut data = SpecificationData::new(EntityClassKind::RelationshipClass);
        data.relationship_dimension_count = 2;
        data.items = vec![
            MappingItem::dimension(Axis::Row, 0, 1),
            MappingItem::dimension(Axis::Row, 1, 2),
        ];
        data.validate().unwrap()
    }

    #[test]
    fn test_class_precheck_rejects_wrong_declared_width() {
        let spec = two_dimensional_spec();
        let good = EntityClass::relationship("unit__node", 2);
        assert!(check_class(&spec, &good).is_ok());

        let bad = EntityClass::relationship("unit__node__time", 3);
        let diag = check_class(&spec, &bad).unwrap_err();
        assert_eq!(diag.kind, DiagnosticKind::DimensionOutOfRange);
        assert_eq!(diag.class.as_deref(), Some("unit__node__time"));
        assert!(diag.entity.is_none());
    }

    #[test]
    fn test_entity_with_wrong_value_count_is_reported() {
        let spec = two_dimensional_spec();
        let class = EntityClass::relationship("unit__node", 2);

        let mut model = MemoryModel::new();
        model.add_class(class.clone());
        model.add_entity("unit__node", "broken", vec![Value::text("u1")]);

        let entity = Entity::new("unit__node", "broken");
        let diag = resolve_dimensions(&model, &spec, &class, &entity).unwrap_err();
        assert_eq!(diag.kind, DiagnosticKind::DimensionOutOfRange);
        assert_eq!(diag.entity.as_deref(), Some("broken"));
        assert!(diag.message.contains("expected 2"));
    }

    #[test]
    fn test_resolved_dimensions_keep_adapter_order() {
        let spec = two_dimensional_spec();
        let class = EntityClass::relationship("unit__node", 2);

        let mut model = MemoryModel::new();
        model.add_class(class.clone());
        model.add_entity(
            "unit__node",
            "u1__n1",
            vec![Value::text("u1"), Value::text("n1")],
        );

        let entity = Entity::new("unit__node", "u1__n1");
        let values = resolve_dimensions(&model, &spec, &class, &entity).unwrap();
        assert_eq!(values, vec![Value::text("u1"), Value::text("n1")]);
    }

    #[test]
    fn test_highlight_filter() {
        let dims = vec![Value::text("u1"), Value::text("n1")];

        let class_level = ParameterEntry::new("flow", Value::Number(1.0));
        let on_n1 = ParameterEntry::new("flow", Value::Number(2.0)).applies_to("n1");
        let on_other = ParameterEntry::new("flow", Value::Number(3.0)).applies_to("n9");

        // No highlight configured: everything passes.
        assert!(highlight_passes(&dims, None, &on_other));

        // Member-scoped entries pass only on the highlighted member.
        assert!(highlight_passes(&dims, Some(2), &on_n1));
        assert!(!highlight_passes(&dims, Some(2), &on_other));
        assert!(!highlight_passes(&dims, Some(1), &on_n1));

        // Class-level entries always pass.
        assert!(highlight_passes(&dims, Some(2), &class_level));
    }
}

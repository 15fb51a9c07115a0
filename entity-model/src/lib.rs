//! FILENAME: entity-model/src/lib.rs
//! PURPOSE: Main library entry point for the entity model.
//! CONTEXT: Re-exports the value, class and adapter types consumed by the
//! mapping engine and by embedding hosts.

pub mod adapter;
pub mod class;
pub mod value;

// Re-export commonly used types at the crate root
pub use adapter::{Entity, EntityModelAdapter, MemoryModel, ParameterEntry, ParameterKind};
pub use class::{EntityClass, EntityClassKind};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_stages_a_snapshot() {
        let mut model = MemoryModel::new();
        model.add_class(EntityClass::relationship("unit__node", 2));
        model.add_entity(
            "unit__node",
            "u1__n1",
            vec![Value::text("u1"), Value::text("n1")],
        );
        model.add_parameter(
            "unit__node",
            "u1__n1",
            ParameterEntry::new("flow", Value::Number(5.0)).applies_to("n1"),
        );

        let classes = model.classes(EntityClassKind::RelationshipClass);
        assert_eq!(classes.len(), 1);

        let entities = model.entities(&classes[0]);
        assert_eq!(entities.len(), 1);
        assert_eq!(model.dimension_values(&entities[0]).len(), 2);

        let params = model.parameters(&entities[0], ParameterKind::Value);
        assert_eq!(params[0].applies_to.as_deref(), Some("n1"));
    }
}

//! FILENAME: entity-model/src/adapter.rs
//! PURPOSE: The read-only contract between a relational data source and the
//! mapping engine, plus an in-memory implementation.
//! CONTEXT: The engine never touches storage directly. It sees classes,
//! entities, dimension values and parameter entries through
//! `EntityModelAdapter`, in whatever order the adapter yields them, and it
//! relies on that order being stable for the lifetime of a run.

use serde::{Deserialize, Serialize};

use crate::class::{EntityClass, EntityClassKind};
use crate::value::Value;

// ============================================================================
// ADAPTER CONTRACT
// ============================================================================

/// Selects which parameter records `EntityModelAdapter::parameters` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Values assigned to a concrete entity.
    Value,
    /// Defaults declared on the entity's class.
    DefaultValue,
}

/// A lightweight handle to one entity, valid for the adapter that issued it.
///
/// `name` is unique within `class`; relationship entities usually carry a
/// generated name derived from their members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub class: String,
    pub name: String,
}

impl Entity {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Entity {
            class: class.into(),
            name: name.into(),
        }
    }
}

/// One parameter record as seen through the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    pub value: Value,
    /// Member object this record is defined on, when the source scopes
    /// parameters to a single dimension member. `None` applies to every
    /// member and always passes the highlighted-dimension filter.
    pub applies_to: Option<String>,
}

impl ParameterEntry {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        ParameterEntry {
            name: name.into(),
            value,
            applies_to: None,
        }
    }

    pub fn applies_to(mut self, member: impl Into<String>) -> Self {
        self.applies_to = Some(member.into());
        self
    }
}

/// Read-only view of a relational snapshot.
///
/// Implementations must return the same ordering across repeated calls
/// within one run; the engine derives row and column order from it.
pub trait EntityModelAdapter {
    /// All classes of one kind, in the source's declared order.
    fn classes(&self, kind: EntityClassKind) -> Vec<EntityClass>;

    /// All entities of a class, in the source's declared order.
    fn entities(&self, class: &EntityClass) -> Vec<Entity>;

    /// The entity's member values, one per dimension, in declared
    /// dimension order.
    fn dimension_values(&self, entity: &Entity) -> Vec<Value>;

    /// Parameter records for the entity. `ParameterKind::DefaultValue`
    /// yields the class-level defaults, identical for every member entity.
    fn parameters(&self, entity: &Entity, kind: ParameterKind) -> Vec<ParameterEntry>;
}

// ============================================================================
// IN-MEMORY MODEL
// ============================================================================

/// An in-memory `EntityModelAdapter` backed by plain vectors.
///
/// Iteration order is insertion order, which makes it deterministic by
/// construction. Embedding hosts use it to stage snapshots; the test suites
/// use it as their fixture model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryModel {
    classes: Vec<ClassData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassData {
    class: EntityClass,
    entities: Vec<EntityData>,
    default_parameters: Vec<ParameterEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntityData {
    name: String,
    dimensions: Vec<Value>,
    parameters: Vec<ParameterEntry>,
}

impl MemoryModel {
    pub fn new() -> Self {
        MemoryModel::default()
    }

    /// Registers a class. Entities and parameters attach to it by name.
    pub fn add_class(&mut self, class: EntityClass) {
        self.classes.push(ClassData {
            class,
            entities: Vec::new(),
            default_parameters: Vec::new(),
        });
    }

    /// Adds an entity with its per-dimension member values.
    ///
    /// Panics if the class has not been registered.
    pub fn add_entity(&mut self, class_name: &str, entity_name: &str, dimensions: Vec<Value>) {
        let class = self.class_data_mut(class_name);
        class.entities.push(EntityData {
            name: entity_name.to_string(),
            dimensions,
            parameters: Vec::new(),
        });
    }

    /// Attaches a parameter value record to an entity.
    ///
    /// Panics if the class or entity has not been registered.
    pub fn add_parameter(&mut self, class_name: &str, entity_name: &str, entry: ParameterEntry) {
        let class = self.class_data_mut(class_name);
        let entity = class
            .entities
            .iter_mut()
            .find(|e| e.name == entity_name)
            .unwrap_or_else(|| panic!("unknown entity '{entity_name}' in class '{class_name}'"));
        entity.parameters.push(entry);
    }

    /// Declares a class-level default, returned for every member entity.
    ///
    /// Panics if the class has not been registered.
    pub fn add_default_parameter(&mut self, class_name: &str, entry: ParameterEntry) {
        self.class_data_mut(class_name).default_parameters.push(entry);
    }

    fn class_data_mut(&mut self, class_name: &str) -> &mut ClassData {
        self.classes
            .iter_mut()
            .find(|c| c.class.name == class_name)
            .unwrap_or_else(|| panic!("unknown class '{class_name}'"))
    }

    fn class_data(&self, class_name: &str) -> Option<&ClassData> {
        self.classes.iter().find(|c| c.class.name == class_name)
    }
}

impl EntityModelAdapter for MemoryModel {
    fn classes(&self, kind: EntityClassKind) -> Vec<EntityClass> {
        self.classes
            .iter()
            .filter(|c| c.class.kind == kind)
            .map(|c| c.class.clone())
            .collect()
    }

    fn entities(&self, class: &EntityClass) -> Vec<Entity> {
        match self.class_data(&class.name) {
            Some(data) => data
                .entities
                .iter()
                .map(|e| Entity::new(class.name.clone(), e.name.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    fn dimension_values(&self, entity: &Entity) -> Vec<Value> {
        self.class_data(&entity.class)
            .and_then(|c| c.entities.iter().find(|e| e.name == entity.name))
            .map(|e| e.dimensions.clone())
            .unwrap_or_default()
    }

    fn parameters(&self, entity: &Entity, kind: ParameterKind) -> Vec<ParameterEntry> {
        let Some(class) = self.class_data(&entity.class) else {
            return Vec::new();
        };
        match kind {
            ParameterKind::Value => class
                .entities
                .iter()
                .find(|e| e.name == entity.name)
                .map(|e| e.parameters.clone())
                .unwrap_or_default(),
            ParameterKind::DefaultValue => class.default_parameters.clone(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

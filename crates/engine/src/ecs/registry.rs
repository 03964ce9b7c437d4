use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::components::{Component, ComponentData, ComponentKind};
use crate::random::SeededRandom;

/// Opaque entity identifier. The `<Type>-<suffix>` shape is for debugging
/// only; lookups never parse it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),
    #[error("component {kind:?} not found on entity {id}")]
    ComponentNotFound { id: EntityId, kind: ComponentKind },
    #[error("entity id already registered: {0}")]
    DuplicateEntity(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    type_name: String,
    components: BTreeMap<ComponentKind, Component>,
}

impl EntityRecord {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }
}

#[derive(Debug)]
pub struct EntityIdAllocator {
    rng: SeededRandom,
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self::with_seed(1)
    }
}

impl EntityIdAllocator {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            rng: SeededRandom::new(seed),
        }
    }

    pub fn allocate(&mut self, type_name: &str) -> EntityId {
        EntityId(format!("{type_name}-{:08x}", self.rng.next_u32()))
    }
}

/// In-memory entity store: each entity holds at most one component per kind.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    allocator: EntityIdAllocator,
    entities: BTreeMap<EntityId, EntityRecord>,
}

impl EntityRegistry {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            allocator: EntityIdAllocator::with_seed(seed),
            entities: BTreeMap::new(),
        }
    }

    pub fn create_entity(&mut self, type_name: &str) -> EntityId {
        loop {
            let id = self.allocator.allocate(type_name);
            if !self.entities.contains_key(&id) {
                self.insert_record(id.clone(), type_name);
                return id;
            }
        }
    }

    pub fn create_entity_with_id(&mut self, id: EntityId, type_name: &str) -> Result<(), EcsError> {
        if self.entities.contains_key(&id) {
            return Err(EcsError::DuplicateEntity(id));
        }
        self.insert_record(id, type_name);
        Ok(())
    }

    fn insert_record(&mut self, id: EntityId, type_name: &str) {
        self.entities.insert(
            id,
            EntityRecord {
                type_name: type_name.to_string(),
                components: BTreeMap::new(),
            },
        );
    }

    pub fn attach<T: ComponentData>(&mut self, id: &EntityId, component: T) -> Result<(), EcsError> {
        self.attach_component(id, component.into())
    }

    /// Overwrites any existing component of the same kind.
    pub fn attach_component(&mut self, id: &EntityId, component: Component) -> Result<(), EcsError> {
        let record = self
            .entities
            .get_mut(id)
            .ok_or_else(|| EcsError::EntityNotFound(id.clone()))?;
        record.components.insert(component.kind(), component);
        Ok(())
    }

    pub fn get<T: ComponentData>(&self, id: &EntityId) -> Result<&T, EcsError> {
        let record = self
            .entities
            .get(id)
            .ok_or_else(|| EcsError::EntityNotFound(id.clone()))?;
        record
            .components
            .get(&T::KIND)
            .and_then(T::from_component)
            .ok_or_else(|| EcsError::ComponentNotFound {
                id: id.clone(),
                kind: T::KIND,
            })
    }

    pub fn get_mut<T: ComponentData>(&mut self, id: &EntityId) -> Result<&mut T, EcsError> {
        let record = self
            .entities
            .get_mut(id)
            .ok_or_else(|| EcsError::EntityNotFound(id.clone()))?;
        record
            .components
            .get_mut(&T::KIND)
            .and_then(T::from_component_mut)
            .ok_or_else(|| EcsError::ComponentNotFound {
                id: id.clone(),
                kind: T::KIND,
            })
    }

    pub fn has<T: ComponentData>(&self, id: &EntityId) -> bool {
        self.entities
            .get(id)
            .is_some_and(|record| record.components.contains_key(&T::KIND))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Destroying an unknown (or already destroyed) id is caller error.
    pub fn destroy(&mut self, id: &EntityId) -> Result<(), EcsError> {
        self.entities
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EcsError::EntityNotFound(id.clone()))
    }

    pub fn record(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &EntityRecord)> {
        self.entities.iter()
    }

    pub fn ids_with<T: ComponentData>(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, record)| record.components.contains_key(&T::KIND))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

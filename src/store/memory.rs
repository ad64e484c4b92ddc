use anyhow::anyhow;
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::model::{generate_id, Entity, FieldValue, Id};
use crate::store::traits::EntityStore;

/// In-process reference store with version-checked writes.
pub struct MemoryStore<E: Entity> {
    rows: RwLock<BTreeMap<Id, E>>,
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn check_version(stored: &E, incoming: &E, id: &Id) -> Result<(), StoreError> {
        if stored.version() != incoming.version() {
            return Err(StoreError::VersionConflict {
                entity_type: E::ENTITY_TYPE.to_string(),
                id: id.clone(),
                expected: incoming.version(),
                actual: stored.version(),
            });
        }
        Ok(())
    }
}

impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    fn save(&self, mut entity: E) -> Result<E, StoreError> {
        let mut rows = self.rows.write();
        let id = match entity.id().cloned() {
            None => {
                let id = generate_id();
                let identity = entity.identity_mut();
                identity.id = Some(id.clone());
                identity.version = 1;
                id
            }
            Some(id) => {
                let stored = rows.get(&id).ok_or_else(|| StoreError::NotFound {
                    entity_type: E::ENTITY_TYPE.to_string(),
                    id: id.clone(),
                })?;
                Self::check_version(stored, &entity, &id)?;
                entity.identity_mut().version += 1;
                id
            }
        };
        if let Some(audit) = entity.audit_mut() {
            audit.touch();
        }
        debug!("Stored {} '{}' at version {}", E::ENTITY_TYPE, id, entity.version());
        rows.insert(id, entity.clone());
        Ok(entity)
    }

    fn delete(&self, entity: &E) -> Result<(), StoreError> {
        let id = entity.id().ok_or_else(|| {
            StoreError::Backend(anyhow!("cannot delete a {} that was never saved", E::ENTITY_TYPE))
        })?;
        let mut rows = self.rows.write();
        let stored = rows.get(id).ok_or_else(|| StoreError::NotFound {
            entity_type: E::ENTITY_TYPE.to_string(),
            id: id.clone(),
        })?;
        Self::check_version(stored, entity, id)?;
        rows.remove(id);
        Ok(())
    }

    fn find_by_id(&self, id: &Id) -> Result<Option<E>, StoreError> {
        Ok(self.rows.read().get(id).cloned())
    }

    fn find_by_field(&self, field_name: &str, value: Option<&FieldValue>) -> Result<Vec<E>, StoreError> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };
        let binding = E::bindings()
            .into_iter()
            .find(|b| b.field_name() == field_name)
            .ok_or_else(|| {
                StoreError::Backend(anyhow!("{} has no field '{}'", E::ENTITY_TYPE, field_name))
            })?;
        Ok(self
            .rows
            .read()
            .values()
            .filter(|row| binding.read(row).matches(value))
            .cloned()
            .collect())
    }

    fn list(&self) -> Result<Vec<E>, StoreError> {
        Ok(self.rows.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, Project};
    use crate::model::EntityRef;

    #[test]
    fn test_insert_assigns_identity_and_audit() {
        let store: MemoryStore<Project> = MemoryStore::new();
        let saved = store.save(Project::new("Apollo")).unwrap();
        assert!(saved.id().is_some());
        assert_eq!(saved.version(), 1);
        assert!(saved.audit.created_at.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_bumps_version_and_rejects_stale_writes() {
        let store: MemoryStore<Project> = MemoryStore::new();
        let first = store.save(Project::new("Apollo")).unwrap();
        let second = store.save(first.clone()).unwrap();
        assert_eq!(second.version(), 2);

        match store.save(first.clone()) {
            Err(StoreError::VersionConflict { expected, actual, .. }) => {
                assert_eq!((expected, actual), (1, 2));
            }
            other => panic!("expected conflict, got {:?}", other.map(|p| p.version())),
        }
        assert!(matches!(store.delete(&first), Err(StoreError::VersionConflict { .. })));
        store.delete(&second).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_of_missing_row_is_not_found() {
        let store: MemoryStore<Project> = MemoryStore::new();
        let mut ghost = Project::new("Ghost");
        ghost.identity = crate::model::Identity::persisted("p-404", 3);
        assert!(matches!(store.save(ghost), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_find_by_field() {
        let store: MemoryStore<Activity> = MemoryStore::new();
        let apollo = EntityRef::new("CProject", "p-1", "Apollo");
        let mut linked = Activity::new("Countdown");
        linked.project = Some(apollo.clone());
        store.save(linked).unwrap();
        store.save(Activity::new("Loose end")).unwrap();

        let found = store
            .find_by_field("project", Some(&FieldValue::Reference(apollo)))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Countdown");

        assert!(store.find_by_field("project", None).unwrap().is_empty());
        assert!(store.find_by_field("budget", None).unwrap().is_empty());
        assert!(store
            .find_by_field("budget", Some(&FieldValue::Empty))
            .is_err());
    }
}

use anyhow::anyhow;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{EntityRef, FieldValue, Id, RelationSetting};
use crate::store::traits::{EntityStore, MasterSide, RelationService};

/// Membership-style [`RelationService`] over a generic entity store.
///
/// At most one setting exists per (subject, target) pair: attaching a pair that
/// is already linked replaces the existing row.
pub struct MembershipService<R: RelationSetting> {
    store: Arc<dyn EntityStore<R>>,
    side: MasterSide,
}

impl<R: RelationSetting> MembershipService<R> {
    pub fn new(store: Arc<dyn EntityStore<R>>, side: MasterSide) -> Self {
        Self { store, side }
    }

    fn endpoint_type(field_name: &str) -> Result<String, StoreError> {
        R::descriptors()
            .into_iter()
            .find(|d| d.field_name == field_name)
            .and_then(|d| d.kind.target().map(str::to_string))
            .ok_or_else(|| {
                StoreError::Backend(anyhow!(
                    "{}.{} is not a reference field",
                    R::ENTITY_TYPE,
                    field_name
                ))
            })
    }

    /// Rows linking `subject` and `target`.
    fn find_pair(&self, subject: &Id, target: &Id) -> Result<Vec<R>, StoreError> {
        let subject_ref = EntityRef::new(&Self::endpoint_type(R::SUBJECT_FIELD)?, subject.clone(), "");
        Ok(self
            .store
            .find_by_field(R::SUBJECT_FIELD, Some(&FieldValue::Reference(subject_ref)))?
            .into_iter()
            .filter(|row| row.target().is_some_and(|t| &t.id == target))
            .collect())
    }

    fn endpoints(setting: &R) -> Result<(Id, Id), StoreError> {
        match (setting.subject(), setting.target()) {
            (Some(subject), Some(target)) => Ok((subject.id.clone(), target.id.clone())),
            _ => Err(StoreError::Backend(anyhow!(
                "{} needs both endpoints to be attached",
                R::LABEL
            ))),
        }
    }
}

impl<R: RelationSetting> RelationService<R> for MembershipService<R> {
    fn list_for_master(&self, master: &EntityRef) -> Result<Vec<R>, StoreError> {
        let field = self.side.master_field::<R>();
        self.store
            .find_by_field(field, Some(&FieldValue::Reference(master.clone())))
    }

    fn attach(&self, setting: R) -> Result<R, StoreError> {
        let (subject, target) = Self::endpoints(&setting)?;
        let existing = self.find_pair(&subject, &target)?;
        // Insert first so a failed write leaves the previous row in place
        let attached = self.store.save(setting)?;
        for row in existing.iter().filter(|row| row.id() != attached.id()) {
            debug!("Replacing existing {} for {} / {}", R::ENTITY_TYPE, subject, target);
            if let Err(err) = self.store.delete(row) {
                if let Err(undo) = self.store.delete(&attached) {
                    warn!("Could not roll back {} '{}': {}", R::ENTITY_TYPE, attached.display_text(), undo);
                }
                return Err(err);
            }
        }
        info!("Attached {} '{}'", R::ENTITY_TYPE, attached.display_text());
        Ok(attached)
    }

    fn save(&self, setting: R) -> Result<R, StoreError> {
        let (subject, target) = Self::endpoints(&setting)?;
        let taken = self
            .find_pair(&subject, &target)?
            .iter()
            .any(|row| row.id() != setting.id());
        if taken {
            return Err(StoreError::Duplicate {
                entity_type: R::LABEL.to_string(),
                key: format!("'{}'", setting.display_text()),
            });
        }
        self.store.save(setting)
    }

    fn detach(&self, subject: &Id, target: &Id) -> Result<(), StoreError> {
        let rows = self.find_pair(subject, target)?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                entity_type: R::ENTITY_TYPE.to_string(),
                id: format!("{}/{}", subject, target),
            });
        }
        for row in &rows {
            self.store.delete(row)?;
        }
        info!("Detached {} for {} / {}", R::ENTITY_TYPE, subject, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserProjectSettings;
    use crate::model::Entity;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore<UserProjectSettings>,
        failing: AtomicBool,
    }

    impl EntityStore<UserProjectSettings> for FlakyStore {
        fn save(&self, entity: UserProjectSettings) -> Result<UserProjectSettings, StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Backend(anyhow!("db down")));
            }
            self.inner.save(entity)
        }

        fn delete(&self, entity: &UserProjectSettings) -> Result<(), StoreError> {
            self.inner.delete(entity)
        }

        fn find_by_id(&self, id: &Id) -> Result<Option<UserProjectSettings>, StoreError> {
            self.inner.find_by_id(id)
        }

        fn find_by_field(
            &self,
            field_name: &str,
            value: Option<&FieldValue>,
        ) -> Result<Vec<UserProjectSettings>, StoreError> {
            self.inner.find_by_field(field_name, value)
        }

        fn list(&self) -> Result<Vec<UserProjectSettings>, StoreError> {
            self.inner.list()
        }
    }

    fn user(id: &str, name: &str) -> EntityRef {
        EntityRef::new("CUser", id, name)
    }

    fn project(id: &str, name: &str) -> EntityRef {
        EntityRef::new("CProject", id, name)
    }

    fn service() -> (Arc<MemoryStore<UserProjectSettings>>, MembershipService<UserProjectSettings>) {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn EntityStore<UserProjectSettings>> = store.clone();
        (store, MembershipService::new(dyn_store, MasterSide::Target))
    }

    #[test]
    fn test_attach_replaces_existing_pair() {
        let (store, service) = service();
        service
            .attach(UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "VIEWER"))
            .unwrap();
        service
            .attach(UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "OWNER"))
            .unwrap();
        service
            .attach(UserProjectSettings::link(user("u-2", "Bob"), project("p-1", "Apollo"), "VIEWER"))
            .unwrap();

        assert_eq!(store.len(), 2);
        let members = service.list_for_master(&project("p-1", "Apollo")).unwrap();
        assert_eq!(members.len(), 2);
        let ada = members
            .iter()
            .find(|m| m.user.as_ref().map(|u| u.id.as_str()) == Some("u-1"))
            .unwrap();
        assert_eq!(ada.role, "OWNER");
    }

    #[test]
    fn test_detach_by_endpoints() {
        let (store, service) = service();
        let attached = service
            .attach(UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "VIEWER"))
            .unwrap();
        assert!(attached.id().is_some());

        service.detach(&"u-1".to_string(), &"p-1".to_string()).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            service.detach(&"u-1".to_string(), &"p-1".to_string()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_attach_requires_both_endpoints() {
        let (_, service) = service();
        let mut setting = UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "VIEWER");
        setting.project = None;
        assert!(matches!(service.attach(setting), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_failed_attach_keeps_existing_pair() {
        let store = Arc::new(FlakyStore::default());
        let dyn_store: Arc<dyn EntityStore<UserProjectSettings>> = store.clone();
        let service = MembershipService::new(dyn_store, MasterSide::Target);
        service
            .attach(UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "OWNER"))
            .unwrap();

        store.failing.store(true, Ordering::SeqCst);
        let result =
            service.attach(UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "VIEWER"));
        assert!(matches!(result, Err(StoreError::Backend(_))));

        let members = service.list_for_master(&project("p-1", "Apollo")).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, "OWNER");
    }

    #[test]
    fn test_save_rejects_moving_onto_a_linked_pair() {
        let (store, service) = service();
        service
            .attach(UserProjectSettings::link(user("u-1", "Ada"), project("p-1", "Apollo"), "OWNER"))
            .unwrap();
        let mut bob = service
            .attach(UserProjectSettings::link(user("u-2", "Bob"), project("p-1", "Apollo"), "VIEWER"))
            .unwrap();

        bob.user = Some(user("u-1", "Ada"));
        assert!(matches!(service.save(bob.clone()), Err(StoreError::Duplicate { .. })));
        assert_eq!(store.len(), 2);
        let ada_rows = service.find_pair(&"u-1".to_string(), &"p-1".to_string()).unwrap();
        assert_eq!(ada_rows.len(), 1);

        // Saving a row onto its own pair is fine
        bob.user = Some(user("u-2", "Bob"));
        bob.role = "OWNER".to_string();
        assert_eq!(service.save(bob).unwrap().role, "OWNER");
    }
}

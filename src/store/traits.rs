use crate::error::StoreError;
use crate::model::{Entity, EntityRef, FieldValue, Id, RelationSetting, ScreenDefinition};

/// Generic persistence collaborator for one entity type.
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Insert (no id) or update (id present) `entity`. Updates are rejected with
    /// `StoreError::VersionConflict` when the stored version has moved on.
    fn save(&self, entity: E) -> Result<E, StoreError>;
    fn delete(&self, entity: &E) -> Result<(), StoreError>;
    fn find_by_id(&self, id: &Id) -> Result<Option<E>, StoreError>;
    /// Entities whose `field_name` matches `value`; a `None` value yields an empty list.
    fn find_by_field(&self, field_name: &str, value: Option<&FieldValue>) -> Result<Vec<E>, StoreError>;
    fn list(&self) -> Result<Vec<E>, StoreError>;
}

/// Which endpoint of a relation setting a panel is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterSide {
    Subject,
    Target,
}

impl MasterSide {
    pub fn master_field<R: RelationSetting>(self) -> &'static str {
        match self {
            Self::Subject => R::SUBJECT_FIELD,
            Self::Target => R::TARGET_FIELD,
        }
    }

    pub fn other_field<R: RelationSetting>(self) -> &'static str {
        match self {
            Self::Subject => R::TARGET_FIELD,
            Self::Target => R::SUBJECT_FIELD,
        }
    }

    /// The endpoint on the far side of the master.
    pub fn other<R: RelationSetting>(self, setting: &R) -> Option<&EntityRef> {
        match self {
            Self::Subject => setting.target(),
            Self::Target => setting.subject(),
        }
    }
}

/// Relationship-aware persistence for join entities.
pub trait RelationService<R: RelationSetting>: Send + Sync {
    fn list_for_master(&self, master: &EntityRef) -> Result<Vec<R>, StoreError>;
    /// Create a new setting, enforcing endpoint invariants.
    fn attach(&self, setting: R) -> Result<R, StoreError>;
    /// Update an existing setting.
    fn save(&self, setting: R) -> Result<R, StoreError>;
    /// Remove the setting linking `subject` and `target`, whatever its own id.
    fn detach(&self, subject: &Id, target: &Id) -> Result<(), StoreError>;
}

/// Persistence of screen definitions, keyed by route.
pub trait ScreenStore: Send + Sync {
    fn list(&self) -> anyhow::Result<Vec<ScreenDefinition>>;
    fn get(&self, route: &str) -> anyhow::Result<Option<ScreenDefinition>>;
    fn upsert(&self, screen: ScreenDefinition) -> anyhow::Result<()>;
    fn delete(&self, route: &str) -> anyhow::Result<bool>;
}

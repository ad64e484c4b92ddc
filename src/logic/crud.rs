use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::logic::form::FieldSet;
use crate::logic::listeners::{Confirmer, EntityListener, FanOut, ListenerSet};
use crate::model::{Entity, FieldValue};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudState {
    /// No instance bound
    Empty,
    /// Bound instance, form matches it
    Viewing,
    /// Bound instance with unsaved form changes
    Editing,
}

/// Which toolbar actions are currently available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affordances {
    pub create: bool,
    pub save: bool,
    pub delete: bool,
    pub refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// The refresh callback failed; the message has already been logged
    Failed(String),
}

type Factory<E> = Box<dyn Fn() -> E + Send + Sync>;
type RefreshCallback<E> = Box<dyn FnMut(Option<&E>) -> anyhow::Result<Option<E>> + Send>;

/// Create/save/delete/refresh lifecycle around one bound instance of `E`.
pub struct CrudController<E: Entity> {
    store: Arc<dyn EntityStore<E>>,
    form: FieldSet<E>,
    current: Option<E>,
    state: CrudState,
    factory: Option<Factory<E>>,
    refresh: Option<RefreshCallback<E>>,
    listeners: ListenerSet<E>,
    confirmer: Arc<dyn Confirmer>,
    affordances: Affordances,
}

impl<E: Entity> CrudController<E> {
    pub fn new(store: Arc<dyn EntityStore<E>>, form: FieldSet<E>, confirmer: Arc<dyn Confirmer>) -> Self {
        let mut controller = Self {
            store,
            form,
            current: None,
            state: CrudState::Empty,
            factory: None,
            refresh: None,
            listeners: ListenerSet::new(),
            confirmer,
            affordances: Affordances::default(),
        };
        controller.form.rebind(None);
        controller.update_affordances();
        controller
    }

    pub fn with_factory(mut self, factory: impl Fn() -> E + Send + Sync + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self.update_affordances();
        self
    }

    pub fn with_refresh(
        mut self,
        callback: impl FnMut(Option<&E>) -> anyhow::Result<Option<E>> + Send + 'static,
    ) -> Self {
        self.refresh = Some(Box::new(callback));
        self.update_affordances();
        self
    }

    pub fn add_listener(&mut self, listener: &Arc<dyn EntityListener<E>>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn EntityListener<E>>) {
        self.listeners.remove(listener);
    }

    pub fn state(&self) -> CrudState {
        self.state
    }

    pub fn current(&self) -> Option<&E> {
        self.current.as_ref()
    }

    pub fn form(&self) -> &FieldSet<E> {
        &self.form
    }

    pub fn affordances(&self) -> Affordances {
        self.affordances
    }

    fn update_affordances(&mut self) {
        self.affordances = Affordances {
            create: self.factory.is_some(),
            save: self.current.is_some(),
            delete: self.current.as_ref().is_some_and(|e| e.id().is_some()),
            refresh: self.refresh.is_some(),
        };
    }

    /// Bind `entity` (or nothing) and show it unmodified.
    pub fn set_current_entity(&mut self, entity: Option<E>) {
        self.form.rebind(entity.as_ref());
        self.state = if entity.is_some() {
            CrudState::Viewing
        } else {
            CrudState::Empty
        };
        self.current = entity;
        self.update_affordances();
    }

    /// Change one form control of the bound instance.
    pub fn edit(&mut self, field_name: &str, value: FieldValue) -> Result<()> {
        if self.current.is_none() {
            return Err(EngineError::precondition(format!(
                "Select or create a {} before editing.",
                E::LABEL.to_lowercase()
            )));
        }
        self.form.set_value(field_name, value)?;
        if self.form.is_dirty() {
            self.state = CrudState::Editing;
        }
        Ok(())
    }

    /// Bind a fresh, unsaved instance from the factory. Nothing is persisted or
    /// announced until it is saved.
    pub fn create(&mut self) -> Result<()> {
        let factory = self.factory.as_ref().ok_or_else(|| {
            EngineError::configuration(format!("no instance factory registered for {}", E::ENTITY_TYPE))
        })?;
        let entity = factory();
        self.form.rebind(Some(&entity));
        self.form.apply_defaults();
        self.current = Some(entity);
        self.state = CrudState::Editing;
        self.update_affordances();
        debug!("Created new {} for editing", E::ENTITY_TYPE);
        Ok(())
    }

    /// Write the form into the bound instance and persist it.
    ///
    /// On any failure the bound instance and the form edits are left untouched so
    /// the user can correct and retry.
    pub fn save(&mut self) -> Result<E> {
        let current = self.current.as_ref().ok_or_else(|| {
            EngineError::precondition(format!("There is no {} to save.", E::LABEL.to_lowercase()))
        })?;

        let mut draft = current.clone();
        if let Err(err) = self.form.write_into(&mut draft) {
            warn!("Not saving {}: {}", E::ENTITY_TYPE, err);
            return Err(err);
        }

        let saved = match self.store.save(draft) {
            Ok(saved) => saved,
            Err(store_err) => {
                let err = EngineError::from(store_err);
                if err.is_conflict() {
                    warn!("Save of {} rejected: {}", E::ENTITY_TYPE, err);
                } else {
                    error!("Save of {} failed: {}", E::ENTITY_TYPE, err);
                }
                return Err(err);
            }
        };

        self.set_current_entity(Some(saved.clone()));
        let fan_out = self.listeners.notify_saved(&saved);
        info!(
            "Saved {} '{}' (version {}, {} listeners notified)",
            E::ENTITY_TYPE,
            saved.display_text(),
            saved.version(),
            fan_out.delivered
        );
        Ok(saved)
    }

    /// Delete the bound, persisted instance after the user confirms.
    pub fn delete(&mut self) -> Result<DeleteOutcome> {
        let Some(current) = self.current.as_ref().filter(|e| e.id().is_some()) else {
            warn!("Delete of {} refused: nothing persisted is bound", E::ENTITY_TYPE);
            return Err(EngineError::precondition(format!(
                "Select a saved {} before deleting.",
                E::LABEL.to_lowercase()
            )));
        };

        let message = format!("Are you sure you want to delete this {}?", E::LABEL.to_lowercase());
        if !self.confirmer.confirm(&message) {
            debug!("Delete of {} cancelled by user", E::ENTITY_TYPE);
            return Ok(DeleteOutcome::Cancelled);
        }

        if let Err(store_err) = self.store.delete(current) {
            let err = EngineError::from(store_err);
            error!("Delete of {} failed: {}", E::ENTITY_TYPE, err);
            return Err(err);
        }

        let deleted = self.current.take();
        self.set_current_entity(None);
        if let Some(deleted) = deleted {
            let FanOut { delivered, failed } = self.listeners.notify_deleted(&deleted);
            info!(
                "Deleted {} '{}' ({} listeners notified, {} failed)",
                E::ENTITY_TYPE,
                deleted.display_text(),
                delivered,
                failed
            );
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Ask the refresh callback for the current version of the bound instance.
    /// Callback failures are reported in the outcome, never raised.
    pub fn refresh(&mut self) -> Result<RefreshOutcome> {
        let callback = self.refresh.as_mut().ok_or_else(|| {
            EngineError::configuration(format!("no refresh callback registered for {}", E::ENTITY_TYPE))
        })?;
        match callback(self.current.as_ref()) {
            Ok(fresh) => {
                self.set_current_entity(fresh);
                Ok(RefreshOutcome::Refreshed)
            }
            Err(err) => {
                error!("Refresh of {} failed: {:#}", E::ENTITY_TYPE, err);
                self.update_affordances();
                Ok(RefreshOutcome::Failed(format!("{:#}", err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Project;
    use crate::error::StoreError;
    use crate::logic::form::FormCompiler;
    use crate::model::{FieldValue, Id};
    use crate::store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a memory store and records which operations reached it.
    struct RecordingStore {
        inner: MemoryStore<Project>,
        calls: Mutex<Vec<&'static str>>,
        broken: bool,
    }

    impl RecordingStore {
        fn new(broken: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(),
                calls: Mutex::new(Vec::new()),
                broken,
            })
        }
    }

    impl EntityStore<Project> for RecordingStore {
        fn save(&self, entity: Project) -> std::result::Result<Project, StoreError> {
            self.calls.lock().push("save");
            if self.broken {
                return Err(StoreError::Backend(anyhow::anyhow!("connection reset")));
            }
            self.inner.save(entity)
        }

        fn delete(&self, entity: &Project) -> std::result::Result<(), StoreError> {
            self.calls.lock().push("delete");
            self.inner.delete(entity)
        }

        fn find_by_id(&self, id: &Id) -> std::result::Result<Option<Project>, StoreError> {
            self.inner.find_by_id(id)
        }

        fn find_by_field(
            &self,
            field_name: &str,
            value: Option<&FieldValue>,
        ) -> std::result::Result<Vec<Project>, StoreError> {
            self.inner.find_by_field(field_name, value)
        }

        fn list(&self) -> std::result::Result<Vec<Project>, StoreError> {
            self.inner.list()
        }
    }

    struct Counter {
        saved: AtomicUsize,
        deleted: AtomicUsize,
    }

    impl EntityListener<Project> for Counter {
        fn on_entity_saved(&self, _entity: &Project) -> anyhow::Result<()> {
            self.saved.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_entity_deleted(&self, _entity: &Project) -> anyhow::Result<()> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl EntityListener<Project> for Failing {
        fn on_entity_saved(&self, _entity: &Project) -> anyhow::Result<()> {
            anyhow::bail!("audit log unavailable")
        }
    }

    fn controller(store: Arc<RecordingStore>, answer: bool) -> (CrudController<Project>, Arc<AtomicUsize>) {
        let catalog = crate::seed::build_catalog().unwrap();
        let form = FormCompiler::new().compile_for::<Project>(&catalog, None).unwrap();
        let asked = Arc::new(AtomicUsize::new(0));
        let asked_in_confirmer = asked.clone();
        let confirmer: Arc<dyn Confirmer> = Arc::new(move |_: &str| {
            asked_in_confirmer.fetch_add(1, Ordering::SeqCst);
            answer
        });
        (CrudController::new(store, form, confirmer), asked)
    }

    fn counter() -> (Arc<Counter>, Arc<dyn EntityListener<Project>>) {
        let counter = Arc::new(Counter {
            saved: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        });
        let listener: Arc<dyn EntityListener<Project>> = counter.clone();
        (counter, listener)
    }

    #[test]
    fn test_affordances_follow_state() {
        let store = RecordingStore::new(false);
        let (controller, _) = controller(store.clone(), true);
        assert_eq!(controller.affordances(), Affordances::default());
        assert_eq!(controller.state(), CrudState::Empty);

        let mut controller = controller
            .with_factory(|| Project::new(""))
            .with_refresh(|current: Option<&Project>| Ok(current.cloned()));
        assert!(controller.affordances().create && controller.affordances().refresh);

        controller.create().unwrap();
        assert!(controller.affordances().save);
        assert!(!controller.affordances().delete);

        controller.edit("name", FieldValue::Text("Apollo".into())).unwrap();
        controller.save().unwrap();
        assert!(controller.affordances().delete);
    }

    #[test]
    fn test_create_without_factory_is_configuration_error() {
        let (mut controller, _) = controller(RecordingStore::new(false), true);
        assert!(matches!(controller.create(), Err(EngineError::Configuration(_))));
        assert_eq!(controller.state(), CrudState::Empty);
    }

    #[test]
    fn test_create_applies_defaults_without_events() {
        let (counter, listener) = counter();
        let (controller, _) = controller(RecordingStore::new(false), true);
        let mut controller = controller.with_factory(|| Project::new(""));
        controller.add_listener(&listener);

        controller.create().unwrap();
        assert_eq!(controller.state(), CrudState::Editing);
        assert_eq!(controller.form().value("active"), Some(&FieldValue::Boolean(true)));
        assert_eq!(counter.saved.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_required_field_aborts_before_store_call() {
        let store = RecordingStore::new(false);
        let (controller, _) = controller(store.clone(), true);
        let mut controller = controller.with_factory(|| Project::new(""));
        controller.create().unwrap();
        controller
            .edit("description", FieldValue::Text("No name yet".into()))
            .unwrap();

        match controller.save() {
            Err(EngineError::Validation(errors)) => assert_eq!(errors.field_names(), vec!["name"]),
            other => panic!("expected validation error, got {:?}", other.map(|p| p.name)),
        }
        assert!(store.calls.lock().is_empty());
        assert_eq!(controller.state(), CrudState::Editing);
        assert_eq!(
            controller.form().value("description"),
            Some(&FieldValue::Text("No name yet".into()))
        );
    }

    #[test]
    fn test_save_replaces_instance_and_notifies_listeners() {
        let store = RecordingStore::new(false);
        let (counter, listener) = counter();
        let failing: Arc<dyn EntityListener<Project>> = Arc::new(Failing);
        let (controller, _) = controller(store.clone(), true);
        let mut controller = controller.with_factory(|| Project::new(""));
        controller.add_listener(&failing);
        controller.add_listener(&listener);

        controller.create().unwrap();
        controller.edit("name", FieldValue::Text("Apollo".into())).unwrap();
        let saved = controller.save().unwrap();

        assert_eq!(saved.version(), 1);
        assert!(saved.id().is_some());
        assert_eq!(controller.current().map(|p| p.name.as_str()), Some("Apollo"));
        assert_eq!(controller.state(), CrudState::Viewing);
        assert_eq!(counter.saved.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_conflict_keeps_bound_instance_and_edits() {
        let store = RecordingStore::new(false);
        let original = store.inner.save(Project::new("Apollo")).unwrap();
        let mut concurrent = original.clone();
        concurrent.description = "changed elsewhere".into();
        store.inner.save(concurrent).unwrap();

        let (mut controller, _) = controller(store.clone(), true);
        controller.set_current_entity(Some(original.clone()));
        controller.edit("name", FieldValue::Text("Apollo 11".into())).unwrap();

        let err = controller.save().unwrap_err();
        assert!(err.is_conflict());
        assert_ne!(
            err.user_message(),
            EngineError::Collaborator(anyhow::anyhow!("x")).user_message()
        );
        assert_eq!(controller.current(), Some(&original));
        assert_eq!(controller.state(), CrudState::Editing);
        assert_eq!(
            controller.form().value("name"),
            Some(&FieldValue::Text("Apollo 11".into()))
        );
    }

    #[test]
    fn test_backend_failure_is_generic_collaborator_error() {
        let store = RecordingStore::new(true);
        let (mut controller, _) = controller(store, true);
        controller.set_current_entity(Some(Project::new("Apollo")));
        let err = controller.save().unwrap_err();
        assert!(matches!(err, EngineError::Collaborator(_)));
        assert_eq!(controller.current().map(|p| p.name.as_str()), Some("Apollo"));
    }

    #[test]
    fn test_delete_without_identity_never_asks() {
        let store = RecordingStore::new(false);
        let (mut controller, asked) = controller(store.clone(), true);
        assert!(matches!(controller.delete(), Err(EngineError::Precondition(_))));

        controller.set_current_entity(Some(Project::new("Unsaved")));
        assert!(matches!(controller.delete(), Err(EngineError::Precondition(_))));
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert!(store.calls.lock().is_empty());
    }

    #[test]
    fn test_declined_confirmation_skips_delete() {
        let store = RecordingStore::new(false);
        let saved = store.inner.save(Project::new("Apollo")).unwrap();
        let (mut controller, asked) = controller(store.clone(), false);
        controller.set_current_entity(Some(saved));

        assert_eq!(controller.delete().unwrap(), DeleteOutcome::Cancelled);
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert!(store.calls.lock().is_empty());
        assert!(controller.current().is_some());
    }

    #[test]
    fn test_confirmed_delete_clears_and_notifies() {
        let store = RecordingStore::new(false);
        let saved = store.inner.save(Project::new("Apollo")).unwrap();
        let (counter, listener) = counter();
        let (mut controller, _) = controller(store.clone(), true);
        controller.add_listener(&listener);
        controller.set_current_entity(Some(saved.clone()));

        assert_eq!(controller.delete().unwrap(), DeleteOutcome::Deleted);
        assert_eq!(controller.state(), CrudState::Empty);
        assert!(controller.current().is_none());
        assert_eq!(counter.deleted.load(Ordering::SeqCst), 1);
        assert!(store.inner.find_by_id(saved.id().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_delete_conflict_keeps_bound_instance() {
        let store = RecordingStore::new(false);
        let stale = store.inner.save(Project::new("Apollo")).unwrap();
        store.inner.save(stale.clone()).unwrap();
        let (counter, listener) = counter();
        let (mut controller, asked) = controller(store.clone(), true);
        controller.add_listener(&listener);
        controller.set_current_entity(Some(stale.clone()));

        let err = controller.delete().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert_eq!(controller.current(), Some(&stale));
        assert_ne!(controller.state(), CrudState::Empty);
        assert!(controller.affordances().delete);
        assert_eq!(counter.deleted.load(Ordering::SeqCst), 0);
        assert!(store.inner.find_by_id(stale.id().unwrap()).unwrap().is_some());
    }

    #[test]
    fn test_refresh_failures_are_reported_not_raised() {
        let (mut controller, _) = controller(RecordingStore::new(false), true);
        assert!(matches!(controller.refresh(), Err(EngineError::Configuration(_))));

        let mut controller = controller.with_refresh(|_: Option<&Project>| anyhow::bail!("offline"));
        controller.set_current_entity(Some(Project::new("Apollo")));
        match controller.refresh().unwrap() {
            RefreshOutcome::Failed(message) => assert!(message.contains("offline")),
            RefreshOutcome::Refreshed => panic!("refresh should have failed"),
        }
        assert_eq!(controller.current().map(|p| p.name.as_str()), Some("Apollo"));
    }

    #[test]
    fn test_refresh_rebinds_returned_instance() {
        let store = RecordingStore::new(false);
        let saved = store.inner.save(Project::new("Apollo")).unwrap();
        let reload_from = store.clone();
        let (controller, _) = controller(store, true);
        let mut controller = controller.with_refresh(move |current: Option<&Project>| {
            match current.and_then(|p| p.id().cloned()) {
                Some(id) => Ok(reload_from.inner.find_by_id(&id)?),
                None => Ok(None),
            }
        });
        let mut stale = saved.clone();
        stale.name = "Stale".into();
        controller.set_current_entity(Some(stale));

        assert_eq!(controller.refresh().unwrap(), RefreshOutcome::Refreshed);
        assert_eq!(controller.form().value("name"), Some(&FieldValue::Text("Apollo".into())));
        assert_eq!(controller.state(), CrudState::Viewing);
    }
}

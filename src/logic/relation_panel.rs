use log::{debug, error, info};
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::logic::catalog::MetadataCatalog;
use crate::logic::crud::DeleteOutcome;
use crate::logic::form::{FieldSet, FormCompiler};
use crate::logic::grid::{ColumnSet, GridCompiler};
use crate::logic::listeners::Confirmer;
use crate::model::{EntityRef, FieldDescriptor, FieldValue, Id, RelationSetting};
use crate::store::{MasterSide, RelationService};

/// Add/Edit/Delete availability for a relation panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelAffordances {
    pub add: bool,
    pub edit: bool,
    pub delete: bool,
}

/// Sub-form for adding or editing one relation setting.
pub struct RelationDialog<R: RelationSetting> {
    setting: R,
    form: FieldSet<R>,
}

impl<R: RelationSetting> RelationDialog<R> {
    pub fn is_new(&self) -> bool {
        self.setting.id().is_none()
    }

    pub fn form(&self) -> &FieldSet<R> {
        &self.form
    }

    pub fn set_value(&mut self, field_name: &str, value: FieldValue) -> Result<()> {
        self.form.set_value(field_name, value)
    }
}

type SettingFactory<R> = Box<dyn Fn(&EntityRef) -> R + Send + Sync>;

/// Join-entity rows of one master, with add/edit/delete sub-workflows.
///
/// Rows are never edited in place: after every mutation the panel pulls its rows
/// from the relation service again.
pub struct RelationPanel<R: RelationSetting> {
    service: Arc<dyn RelationService<R>>,
    side: MasterSide,
    forms: FormCompiler,
    descriptors: Vec<FieldDescriptor>,
    grid: ColumnSet<R>,
    factory: SettingFactory<R>,
    confirmer: Arc<dyn Confirmer>,
    master: Option<EntityRef>,
    rows: Vec<R>,
    selected: Option<Id>,
    dialog: Option<RelationDialog<R>>,
}

impl<R: RelationSetting> RelationPanel<R> {
    pub fn new(
        catalog: &MetadataCatalog,
        grids: &GridCompiler,
        forms: FormCompiler,
        service: Arc<dyn RelationService<R>>,
        side: MasterSide,
        confirmer: Arc<dyn Confirmer>,
        factory: impl Fn(&EntityRef) -> R + Send + Sync + 'static,
    ) -> Result<Self> {
        let descriptors = catalog.describe(R::ENTITY_TYPE)?.to_vec();
        // The master endpoint is the same on every row; the grid shows the other one
        let master_field = side.master_field::<R>();
        let columns: Vec<FieldDescriptor> = descriptors
            .iter()
            .filter(|d| d.field_name != master_field)
            .cloned()
            .collect();
        let grid = grids.compile(&columns)?;

        Ok(Self {
            service,
            side,
            forms,
            descriptors,
            grid,
            factory: Box::new(factory),
            confirmer,
            master: None,
            rows: Vec::new(),
            selected: None,
            dialog: None,
        })
    }

    pub fn master(&self) -> Option<&EntityRef> {
        self.master.as_ref()
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn headers(&self) -> Vec<&str> {
        self.grid.headers()
    }

    pub fn render(&self) -> Vec<Vec<String>> {
        self.grid.render(&self.rows)
    }

    pub fn affordances(&self) -> PanelAffordances {
        let has_selection = self.selected().is_some();
        PanelAffordances {
            add: self.master.is_some(),
            edit: has_selection,
            delete: has_selection,
        }
    }

    /// Scope the panel to `master` and load its rows.
    pub fn set_master(&mut self, master: Option<EntityRef>) -> Result<()> {
        self.master = master;
        self.selected = None;
        self.dialog = None;
        self.reload()
    }

    /// Pull the rows of the current master from the relation service.
    pub fn reload(&mut self) -> Result<()> {
        self.rows = match &self.master {
            Some(master) => self.service.list_for_master(master).map_err(|err| {
                error!("Loading {} rows failed: {}", R::ENTITY_TYPE, err);
                EngineError::from(err)
            })?,
            None => Vec::new(),
        };
        if let Some(selected) = &self.selected {
            if !self.rows.iter().any(|r| r.id() == Some(selected)) {
                self.selected = None;
            }
        }
        debug!("Loaded {} {} rows", self.rows.len(), R::ENTITY_TYPE);
        Ok(())
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        let row = self
            .rows
            .get(index)
            .ok_or_else(|| EngineError::precondition(format!("There is no row {}.", index + 1)))?;
        self.selected = row.id().cloned();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&R> {
        let selected = self.selected.as_ref()?;
        self.rows.iter().find(|r| r.id() == Some(selected))
    }

    pub fn dialog(&self) -> Option<&RelationDialog<R>> {
        self.dialog.as_ref()
    }

    pub fn dialog_mut(&mut self) -> Option<&mut RelationDialog<R>> {
        self.dialog.as_mut()
    }

    fn open_dialog(&mut self, setting: R) -> Result<&mut RelationDialog<R>> {
        let mut form = self.forms.compile(&self.descriptors, Some(&setting))?;
        form.set_read_only(self.side.master_field::<R>(), true)?;
        if setting.id().is_none() {
            form.apply_defaults();
        } else {
            // An existing setting keeps both endpoints; only its attributes are editable
            form.set_read_only(self.side.other_field::<R>(), true)?;
        }
        Ok(self.dialog.insert(RelationDialog { setting, form }))
    }

    /// Open the sub-form for a new setting under the current master.
    pub fn begin_add(&mut self) -> Result<&mut RelationDialog<R>> {
        let master = self.master.as_ref().ok_or_else(|| {
            EngineError::precondition(format!(
                "Select a record before adding a {}.",
                R::LABEL.to_lowercase()
            ))
        })?;
        let setting = (self.factory)(master);
        self.open_dialog(setting)
    }

    /// Open the sub-form for the selected setting.
    pub fn begin_edit(&mut self) -> Result<&mut RelationDialog<R>> {
        let setting = self.selected().cloned().ok_or_else(|| {
            EngineError::precondition(format!("Select a {} to edit.", R::LABEL.to_lowercase()))
        })?;
        self.open_dialog(setting)
    }

    pub fn cancel_dialog(&mut self) {
        self.dialog = None;
    }

    /// Persist the open dialog: new settings are attached, existing ones saved.
    /// The dialog stays open on failure.
    pub fn confirm_dialog(&mut self) -> Result<R> {
        let dialog = self
            .dialog
            .as_ref()
            .ok_or_else(|| EngineError::precondition("There is no open dialog to confirm."))?;

        let mut setting = dialog.setting.clone();
        dialog.form.write_into(&mut setting)?;

        let outcome = if setting.id().is_none() {
            self.service.attach(setting)
        } else {
            self.service.save(setting)
        };
        let saved = outcome.map_err(|err| {
            error!("Saving {} failed: {}", R::ENTITY_TYPE, err);
            EngineError::from(err)
        })?;

        info!("Saved {} '{}'", R::ENTITY_TYPE, saved.display_text());
        self.dialog = None;
        self.reload()?;
        self.selected = saved.id().cloned();
        Ok(saved)
    }

    /// Message shown before deleting `setting`, naming its far endpoint.
    pub fn delete_message(&self, setting: &R) -> String {
        let other = self
            .side
            .other(setting)
            .map(|r| r.display.as_str())
            .unwrap_or("");
        format!(
            "Are you sure you want to delete the {} for '{}'? This action cannot be undone.",
            R::LABEL.to_lowercase(),
            other
        )
    }

    /// Detach the selected setting by its endpoints after the user confirms.
    pub fn delete_selected(&mut self) -> Result<DeleteOutcome> {
        let setting = self.selected().ok_or_else(|| {
            EngineError::precondition(format!("Select a {} to delete.", R::LABEL.to_lowercase()))
        })?;
        let (Some(subject), Some(target)) = (setting.subject(), setting.target()) else {
            return Err(EngineError::precondition(format!(
                "The selected {} is missing an endpoint.",
                R::LABEL.to_lowercase()
            )));
        };
        let (subject, target) = (subject.id.clone(), target.id.clone());

        if !self.confirmer.confirm(&self.delete_message(setting)) {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.service.detach(&subject, &target).map_err(|err| {
            error!("Detaching {} failed: {}", R::ENTITY_TYPE, err);
            EngineError::from(err)
        })?;

        self.selected = None;
        self.reload()?;
        Ok(DeleteOutcome::Deleted)
    }
}

use itertools::Itertools;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::logic::catalog::{LookupRegistry, MetadataCatalog};
use crate::logic::validate::{FieldError, FieldValidator, ValidationErrorType, ValidationErrors};
use crate::model::{Entity, EntityRef, FieldBinding, FieldDescriptor, FieldKind, FieldValue};

/// Text fields longer than this (or unbounded) are edited in a text area.
const TEXT_AREA_THRESHOLD: i32 = 255;

/// Editable control chosen for a field's semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    TextField,
    TextArea,
    NumberField,
    Checkbox,
    DatePicker,
    DateTimePicker,
    ComboBox,
    MultiSelect,
}

impl Widget {
    pub fn for_descriptor(descriptor: &FieldDescriptor) -> Self {
        match descriptor.kind {
            FieldKind::Text => {
                if descriptor.max_length < 0 || descriptor.max_length > TEXT_AREA_THRESHOLD {
                    Self::TextArea
                } else {
                    Self::TextField
                }
            }
            FieldKind::Number => Self::NumberField,
            FieldKind::Boolean => Self::Checkbox,
            FieldKind::Date => Self::DatePicker,
            FieldKind::DateTime => Self::DateTimePicker,
            FieldKind::Reference { .. } => Self::ComboBox,
            FieldKind::MultiReference { .. } => Self::MultiSelect,
        }
    }
}

/// One bound control of a compiled form.
#[derive(Debug, Clone)]
pub struct FormControl {
    descriptor: FieldDescriptor,
    widget: Widget,
    read_only: bool,
    value: FieldValue,
    options: Vec<EntityRef>,
    dirty: bool,
}

impl FormControl {
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn field_name(&self) -> &str {
        &self.descriptor.field_name
    }

    pub fn label(&self) -> &str {
        &self.descriptor.display_name
    }

    pub fn widget(&self) -> Widget {
        self.widget
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Selectable options for reference controls, empty otherwise.
    pub fn options(&self) -> &[EntityRef] {
        &self.options
    }

    pub fn is_editable(&self) -> bool {
        !self.read_only
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Ordered set of controls bound to instances of `E`.
///
/// The set holds values, never the instance itself: reading happens in
/// [`FieldSet::rebind`] and writing in [`FieldSet::write_into`].
pub struct FieldSet<E> {
    controls: Vec<FormControl>,
    bindings: HashMap<String, FieldBinding<E>>,
}

impl<E: Entity> FieldSet<E> {
    pub fn controls(&self) -> &[FormControl] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn control(&self, field_name: &str) -> Option<&FormControl> {
        self.controls.iter().find(|c| c.field_name() == field_name)
    }

    fn control_mut(&mut self, field_name: &str) -> Result<&mut FormControl> {
        self.controls
            .iter_mut()
            .find(|c| c.descriptor.field_name == field_name)
            .ok_or_else(|| {
                EngineError::configuration(format!(
                    "form for {} has no field '{}'",
                    E::ENTITY_TYPE,
                    field_name
                ))
            })
    }

    pub fn value(&self, field_name: &str) -> Option<&FieldValue> {
        self.control(field_name).map(FormControl::value)
    }

    /// Edit a control as the user would.
    pub fn set_value(&mut self, field_name: &str, value: FieldValue) -> Result<()> {
        let control = self.control_mut(field_name)?;
        if control.read_only {
            return Err(EngineError::precondition(format!(
                "{} is read-only",
                control.descriptor.display_name
            )));
        }
        let value = match (value, &control.descriptor.kind) {
            (FieldValue::Empty, kind) => FieldValue::empty_for(kind),
            (value, _) => value,
        };
        if !value.fits(&control.descriptor.kind) {
            return Err(EngineError::Validation(ValidationErrors::single(FieldError {
                field_name: control.descriptor.field_name.clone(),
                display_name: control.descriptor.display_name.clone(),
                error_type: ValidationErrorType::TypeMismatch,
                message: format!("expects a {} value", control.descriptor.kind.name()),
            })));
        }
        if control.value != value {
            control.value = value;
            control.dirty = true;
        }
        Ok(())
    }

    /// Lock or unlock a control independently of its descriptor.
    pub fn set_read_only(&mut self, field_name: &str, read_only: bool) -> Result<()> {
        self.control_mut(field_name)?.read_only = read_only;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.controls.iter().any(|c| c.dirty)
    }

    /// Replace every control value from `instance`, or clear them all for `None`.
    pub fn rebind(&mut self, instance: Option<&E>) {
        for control in &mut self.controls {
            control.value = match (instance, self.bindings.get(&control.descriptor.field_name)) {
                (Some(instance), Some(binding)) => binding.read(instance),
                _ => FieldValue::empty_for(&control.descriptor.kind),
            };
            control.dirty = false;
        }
        debug!(
            "Rebound {} form to {}",
            E::ENTITY_TYPE,
            instance
                .and_then(|i| i.id().cloned())
                .unwrap_or_else(|| "<new>".to_string())
        );
    }

    /// Fill empty controls from their descriptor default values.
    pub fn apply_defaults(&mut self) {
        for control in &mut self.controls {
            if !control.value.is_empty() || control.descriptor.default_value.trim().is_empty() {
                continue;
            }
            match FieldValue::parse_default(&control.descriptor.default_value, &control.descriptor.kind) {
                Some(value) => control.value = value,
                None => warn!(
                    "Ignoring default '{}' for {}.{}: not a {} value",
                    control.descriptor.default_value,
                    E::ENTITY_TYPE,
                    control.descriptor.field_name,
                    control.descriptor.kind.name()
                ),
            }
        }
    }

    /// Check every editable control, collecting all failing fields.
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for control in self.controls.iter().filter(|c| !c.read_only) {
            errors.extend(FieldValidator::validate_value(&control.descriptor, &control.value));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, then copy every editable control value into `entity`.
    /// Nothing is written when validation fails.
    pub fn write_into(&self, entity: &mut E) -> Result<()> {
        self.validate().map_err(EngineError::Validation)?;
        for control in self.controls.iter().filter(|c| !c.read_only) {
            let binding = self
                .bindings
                .get(&control.descriptor.field_name)
                .ok_or_else(|| {
                    EngineError::configuration(format!(
                        "{}.{} has no accessor binding",
                        E::ENTITY_TYPE,
                        control.descriptor.field_name
                    ))
                })?;
            binding
                .write(entity, control.value.clone())
                .map_err(EngineError::Configuration)?;
        }
        Ok(())
    }
}

/// Turns field descriptors into bound, editable field sets.
#[derive(Clone, Default)]
pub struct FormCompiler {
    lookups: Option<Arc<LookupRegistry>>,
}

impl FormCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookups(lookups: Arc<LookupRegistry>) -> Self {
        Self {
            lookups: Some(lookups),
        }
    }

    /// Compile `descriptors` into a field set for `E`, ascending by order with hidden
    /// fields left out, bound to `instance` when one is given.
    pub fn compile<E: Entity>(
        &self,
        descriptors: &[FieldDescriptor],
        instance: Option<&E>,
    ) -> Result<FieldSet<E>> {
        let bindings: HashMap<String, FieldBinding<E>> = E::bindings()
            .into_iter()
            .map(|b| (b.field_name().to_string(), b))
            .collect();

        let mut controls = Vec::new();
        for descriptor in descriptors
            .iter()
            .filter(|d| !d.hidden)
            .sorted_by_key(|d| d.order)
        {
            let binding = bindings.get(&descriptor.field_name).ok_or_else(|| {
                EngineError::configuration(format!(
                    "{}.{} has no accessor binding",
                    E::ENTITY_TYPE,
                    descriptor.field_name
                ))
            })?;
            if !binding.serves(&descriptor.kind) {
                return Err(EngineError::configuration(format!(
                    "{}.{} is declared {} but bound as {}",
                    E::ENTITY_TYPE,
                    descriptor.field_name,
                    descriptor.kind.name(),
                    binding.kind_name()
                )));
            }

            let options = match (&descriptor.lookup_provider_ref, &self.lookups) {
                (Some(provider), Some(lookups)) => lookups.options(provider)?,
                _ => Vec::new(),
            };

            controls.push(FormControl {
                widget: Widget::for_descriptor(descriptor),
                read_only: descriptor.read_only,
                value: instance
                    .map(|i| binding.read(i))
                    .unwrap_or_else(|| FieldValue::empty_for(&descriptor.kind)),
                options,
                dirty: false,
                descriptor: descriptor.clone(),
            });
        }

        debug!("Compiled {} form with {} controls", E::ENTITY_TYPE, controls.len());
        Ok(FieldSet { controls, bindings })
    }

    pub fn compile_for<E: Entity>(
        &self,
        catalog: &MetadataCatalog,
        instance: Option<&E>,
    ) -> Result<FieldSet<E>> {
        self.compile(catalog.describe(E::ENTITY_TYPE)?, instance)
    }
}

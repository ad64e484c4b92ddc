use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{audit_bindings, audit_descriptors};
use crate::model::{Audit, Entity, EntityRef, FieldBinding, FieldDescriptor, Identity};

/// Unit of planned work inside a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub identity: Identity,
    pub audit: Audit,
    pub name: String,
    pub description: String,
    pub project: Option<EntityRef>,
    pub assigned_to: Option<EntityRef>,
    /// Percent complete
    pub progress: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

impl Activity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Entity for Activity {
    const ENTITY_TYPE: &'static str = "CActivity";
    const LABEL: &'static str = "Activity";

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    fn audit_mut(&mut self) -> Option<&mut Audit> {
        Some(&mut self.audit)
    }

    fn display_text(&self) -> String {
        self.name.clone()
    }

    fn descriptors() -> Vec<FieldDescriptor> {
        let mut fields = vec![
            FieldDescriptor::text("name", "Name").order(0).required().max_length(100),
            FieldDescriptor::text("description", "Description").order(1),
            FieldDescriptor::reference("project", "Project", "CProject")
                .order(2)
                .required()
                .lookup("projectService"),
            FieldDescriptor::reference("assigned_to", "Assigned To", "CUser")
                .order(3)
                .lookup("userService"),
            FieldDescriptor::number("progress", "Progress")
                .order(10)
                .range(0.0, 100.0)
                .default_value("0")
                .description("Percent complete"),
            FieldDescriptor::date("due_date", "Due Date").order(11),
        ];
        fields.extend(audit_descriptors());
        fields
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        let mut bindings = vec![
            FieldBinding::text("name", |a: &Self| a.name.clone(), |a, v| a.name = v),
            FieldBinding::text("description", |a: &Self| a.description.clone(), |a, v| a.description = v),
            FieldBinding::reference("project", |a: &Self| a.project.clone(), |a, v| a.project = v),
            FieldBinding::reference("assigned_to", |a: &Self| a.assigned_to.clone(), |a, v| a.assigned_to = v),
            FieldBinding::number("progress", |a: &Self| a.progress, |a, v| a.progress = v),
            FieldBinding::date("due_date", |a: &Self| a.due_date, |a, v| a.due_date = v),
        ];
        bindings.extend(audit_bindings::<Self>(|a| &a.audit));
        bindings
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{audit_bindings, audit_descriptors};
use crate::model::{Audit, Entity, FieldBinding, FieldDescriptor, Identity};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub identity: Identity,
    pub audit: Audit,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub start_date: Option<NaiveDate>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: true,
            ..Default::default()
        }
    }
}

impl Entity for Project {
    const ENTITY_TYPE: &'static str = "CProject";
    const LABEL: &'static str = "Project";

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
            FieldDescriptor::boolean("active", "Active").order(10).default_value("true"),
            FieldDescriptor::date("start_date", "Start Date").order(20),
        ];
        fields.extend(audit_descriptors());
        fields
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        let mut bindings = vec![
            FieldBinding::text("name", |p: &Self| p.name.clone(), |p, v| p.name = v),
            FieldBinding::text("description", |p: &Self| p.description.clone(), |p, v| p.description = v),
            FieldBinding::boolean("active", |p: &Self| p.active, |p, v| p.active = v),
            FieldBinding::date("start_date", |p: &Self| p.start_date, |p, v| p.start_date = v),
        ];
        bindings.extend(audit_bindings::<Self>(|p| &p.audit));
        bindings
    }
}

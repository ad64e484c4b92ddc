use serde::{Deserialize, Serialize};

use crate::domain::{audit_bindings, audit_descriptors};
use crate::model::{Audit, Entity, FieldBinding, FieldDescriptor, Identity};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub identity: Identity,
    pub audit: Audit,
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

impl Company {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            ..Default::default()
        }
    }
}

impl Entity for Company {
    const ENTITY_TYPE: &'static str = "CCompany";
    const LABEL: &'static str = "Company";

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
            FieldDescriptor::boolean("enabled", "Enabled").order(2).default_value("true"),
        ];
        fields.extend(audit_descriptors());
        fields
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        let mut bindings = vec![
            FieldBinding::text("name", |c: &Self| c.name.clone(), |c, v| c.name = v),
            FieldBinding::text("description", |c: &Self| c.description.clone(), |c, v| c.description = v),
            FieldBinding::boolean("enabled", |c: &Self| c.enabled, |c, v| c.enabled = v),
        ];
        bindings.extend(audit_bindings::<Self>(|c| &c.audit));
        bindings
    }
}

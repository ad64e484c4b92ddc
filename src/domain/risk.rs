use serde::{Deserialize, Serialize};

use crate::domain::{audit_bindings, audit_descriptors};
use crate::model::{Audit, Entity, EntityRef, FieldBinding, FieldDescriptor, Identity};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub identity: Identity,
    pub audit: Audit,
    pub name: String,
    pub description: String,
    pub project: Option<EntityRef>,
    /// LOW, MEDIUM, HIGH or CRITICAL
    pub severity: String,
    pub probability: Option<f64>,
    pub mitigated: bool,
}

impl Risk {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Entity for Risk {
    const ENTITY_TYPE: &'static str = "CRisk";
    const LABEL: &'static str = "Risk";

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
            FieldDescriptor::text("severity", "Severity")
                .order(3)
                .max_length(20)
                .default_value("MEDIUM"),
            FieldDescriptor::number("probability", "Probability")
                .order(4)
                .range(0.0, 1.0)
                .description("Likelihood between 0 and 1"),
            FieldDescriptor::boolean("mitigated", "Mitigated").order(5),
        ];
        fields.extend(audit_descriptors());
        fields
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        let mut bindings = vec![
            FieldBinding::text("name", |r: &Self| r.name.clone(), |r, v| r.name = v),
            FieldBinding::text("description", |r: &Self| r.description.clone(), |r, v| r.description = v),
            FieldBinding::reference("project", |r: &Self| r.project.clone(), |r, v| r.project = v),
            FieldBinding::text("severity", |r: &Self| r.severity.clone(), |r, v| r.severity = v),
            FieldBinding::number("probability", |r: &Self| r.probability, |r, v| r.probability = v),
            FieldBinding::boolean("mitigated", |r: &Self| r.mitigated, |r, v| r.mitigated = v),
        ];
        bindings.extend(audit_bindings::<Self>(|r| &r.audit));
        bindings
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{audit_bindings, audit_descriptors};
use crate::model::{Audit, Entity, EntityRef, FieldBinding, FieldDescriptor, Identity};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub identity: Identity,
    pub audit: Audit,
    pub name: String,
    pub description: String,
    pub project: Option<EntityRef>,
    pub meeting_date: Option<NaiveDateTime>,
    pub location: String,
    /// `None` until participants are first assigned
    pub participants: Option<Vec<EntityRef>>,
}

impl Meeting {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Entity for Meeting {
    const ENTITY_TYPE: &'static str = "CMeeting";
    const LABEL: &'static str = "Meeting";

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
            FieldDescriptor::date_time("meeting_date", "Meeting Date").order(3),
            FieldDescriptor::text("location", "Location").order(4).max_length(200),
            FieldDescriptor::multi_reference("participants", "Participants", "CUser")
                .order(5)
                .lookup("userService"),
        ];
        fields.extend(audit_descriptors());
        fields
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        let mut bindings = vec![
            FieldBinding::text("name", |m: &Self| m.name.clone(), |m, v| m.name = v),
            FieldBinding::text("description", |m: &Self| m.description.clone(), |m, v| m.description = v),
            FieldBinding::reference("project", |m: &Self| m.project.clone(), |m, v| m.project = v),
            FieldBinding::date_time("meeting_date", |m: &Self| m.meeting_date, |m, v| m.meeting_date = v),
            FieldBinding::text("location", |m: &Self| m.location.clone(), |m, v| m.location = v),
            FieldBinding::multi_reference(
                "participants",
                |m: &Self| m.participants.clone(),
                |m, v| m.participants = v,
            ),
        ];
        bindings.extend(audit_bindings::<Self>(|m| &m.audit));
        bindings
    }
}

use serde::{Deserialize, Serialize};

use crate::domain::{audit_bindings, audit_descriptors};
use crate::model::{Audit, Entity, EntityRef, FieldBinding, FieldDescriptor, Identity};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub identity: Identity,
    pub audit: Audit,
    pub login: String,
    pub name: String,
    pub email: String,
    pub enabled: bool,
    pub company: Option<EntityRef>,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl User {
    pub fn new(login: &str, name: &str) -> Self {
        Self {
            login: login.to_string(),
            name: name.to_string(),
            enabled: true,
            ..Default::default()
        }
    }
}

impl Entity for User {
    const ENTITY_TYPE: &'static str = "CUser";
    const LABEL: &'static str = "User";

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
        if self.name.is_empty() {
            self.login.clone()
        } else {
            self.name.clone()
        }
    }

    fn descriptors() -> Vec<FieldDescriptor> {
        let mut fields = vec![
            FieldDescriptor::text("login", "Login").order(0).required().max_length(50),
            FieldDescriptor::text("name", "Name").order(1).required().max_length(100),
            FieldDescriptor::text("email", "Email").order(2).max_length(100),
            FieldDescriptor::boolean("enabled", "Enabled").order(3).default_value("true"),
            FieldDescriptor::reference("company", "Company", "CCompany")
                .order(4)
                .lookup("companyService"),
            FieldDescriptor::text("password", "Password").order(99).hidden().max_length(255),
        ];
        fields.extend(audit_descriptors());
        fields
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        let mut bindings = vec![
            FieldBinding::text("login", |u: &Self| u.login.clone(), |u, v| u.login = v),
            FieldBinding::text("name", |u: &Self| u.name.clone(), |u, v| u.name = v),
            FieldBinding::text("email", |u: &Self| u.email.clone(), |u, v| u.email = v),
            FieldBinding::boolean("enabled", |u: &Self| u.enabled, |u, v| u.enabled = v),
            FieldBinding::reference("company", |u: &Self| u.company.clone(), |u, v| u.company = v),
            FieldBinding::text("password", |u: &Self| u.password.clone(), |u, v| u.password = v),
        ];
        bindings.extend(audit_bindings::<Self>(|u| &u.audit));
        bindings
    }
}

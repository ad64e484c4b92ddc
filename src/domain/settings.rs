use serde::{Deserialize, Serialize};

use crate::model::{Entity, EntityRef, FieldBinding, FieldDescriptor, Identity, RelationSetting};

/// Membership of a user in a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProjectSettings {
    pub identity: Identity,
    pub user: Option<EntityRef>,
    pub project: Option<EntityRef>,
    pub role: String,
    pub permission: String,
}

impl UserProjectSettings {
    pub fn link(user: EntityRef, project: EntityRef, role: &str) -> Self {
        Self {
            user: Some(user),
            project: Some(project),
            role: role.to_string(),
            ..Default::default()
        }
    }

    pub fn for_project(project: EntityRef) -> Self {
        Self {
            project: Some(project),
            ..Default::default()
        }
    }

    pub fn for_user(user: EntityRef) -> Self {
        Self {
            user: Some(user),
            ..Default::default()
        }
    }
}

fn endpoint_text(endpoint: &Option<EntityRef>) -> &str {
    endpoint.as_ref().map(|e| e.display.as_str()).unwrap_or("?")
}

impl Entity for UserProjectSettings {
    const ENTITY_TYPE: &'static str = "CUserProjectSettings";
    const LABEL: &'static str = "Project Setting";

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    fn display_text(&self) -> String {
        format!("{} in {}", endpoint_text(&self.user), endpoint_text(&self.project))
    }

    fn descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::reference("user", "User", "CUser")
                .order(0)
                .required()
                .lookup("userService"),
            FieldDescriptor::reference("project", "Project", "CProject")
                .order(1)
                .required()
                .lookup("projectService"),
            FieldDescriptor::text("role", "Role").order(2).max_length(50),
            FieldDescriptor::text("permission", "Permission").order(3).max_length(50),
        ]
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::reference("user", |s: &Self| s.user.clone(), |s, v| s.user = v),
            FieldBinding::reference("project", |s: &Self| s.project.clone(), |s, v| s.project = v),
            FieldBinding::text("role", |s: &Self| s.role.clone(), |s, v| s.role = v),
            FieldBinding::text("permission", |s: &Self| s.permission.clone(), |s, v| s.permission = v),
        ]
    }
}

impl RelationSetting for UserProjectSettings {
    const SUBJECT_FIELD: &'static str = "user";
    const TARGET_FIELD: &'static str = "project";

    fn subject(&self) -> Option<&EntityRef> {
        self.user.as_ref()
    }

    fn target(&self) -> Option<&EntityRef> {
        self.project.as_ref()
    }
}

/// Membership of a user in a company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCompanySettings {
    pub identity: Identity,
    pub user: Option<EntityRef>,
    pub company: Option<EntityRef>,
    /// OWNER, ADMIN or MEMBER
    pub ownership_level: String,
    pub role: String,
}

impl UserCompanySettings {
    pub fn link(user: EntityRef, company: EntityRef, ownership_level: &str) -> Self {
        Self {
            user: Some(user),
            company: Some(company),
            ownership_level: ownership_level.to_string(),
            ..Default::default()
        }
    }

    pub fn for_company(company: EntityRef) -> Self {
        Self {
            company: Some(company),
            ..Default::default()
        }
    }

    pub fn for_user(user: EntityRef) -> Self {
        Self {
            user: Some(user),
            ..Default::default()
        }
    }
}

impl Entity for UserCompanySettings {
    const ENTITY_TYPE: &'static str = "CUserCompanySettings";
    const LABEL: &'static str = "Company Setting";

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    fn display_text(&self) -> String {
        format!("{} at {}", endpoint_text(&self.user), endpoint_text(&self.company))
    }

    fn descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::reference("user", "User", "CUser")
                .order(0)
                .required()
                .lookup("userService"),
            FieldDescriptor::reference("company", "Company", "CCompany")
                .order(1)
                .required()
                .lookup("companyService"),
            FieldDescriptor::text("ownership_level", "Ownership Level")
                .order(2)
                .max_length(20)
                .default_value("MEMBER"),
            FieldDescriptor::text("role", "Role").order(3).max_length(50),
        ]
    }

    fn bindings() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::reference("user", |s: &Self| s.user.clone(), |s, v| s.user = v),
            FieldBinding::reference("company", |s: &Self| s.company.clone(), |s, v| s.company = v),
            FieldBinding::text(
                "ownership_level",
                |s: &Self| s.ownership_level.clone(),
                |s, v| s.ownership_level = v,
            ),
            FieldBinding::text("role", |s: &Self| s.role.clone(), |s, v| s.role = v),
        ]
    }
}

impl RelationSetting for UserCompanySettings {
    const SUBJECT_FIELD: &'static str = "user";
    const TARGET_FIELD: &'static str = "company";

    fn subject(&self) -> Option<&EntityRef> {
        self.user.as_ref()
    }

    fn target(&self) -> Option<&EntityRef> {
        self.company.as_ref()
    }
}

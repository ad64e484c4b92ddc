use crate::model::EntityRef;
use serde::{Deserialize, Serialize};

/// Authenticated user on whose behalf screens are opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_name: Option<String>,
    pub roles: Vec<String>,
}

impl UserContext {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_name: None,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|role| role.to_string()).collect();
        self
    }

    /// System user for internal operations such as seeding
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            user_name: Some("System".to_string()),
            roles: vec!["ADMIN".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Vertical,
    Horizontal,
}

impl LayoutMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Vertical => Self::Horizontal,
            Self::Horizontal => Self::Vertical,
        }
    }
}

/// Per-session state handed explicitly to the components that need it.
///
/// This is the only place the layout mode lives; it defaults to
/// [`LayoutMode::Vertical`] unless configuration says otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    user: Option<UserContext>,
    active_project: Option<EntityRef>,
    layout_mode: LayoutMode,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: UserContext) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout_mode: LayoutMode) -> Self {
        self.layout_mode = layout_mode;
        self
    }

    pub fn user(&self) -> Option<&UserContext> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn roles(&self) -> &[String] {
        self.user.as_ref().map_or(&[], |user| user.roles.as_slice())
    }

    pub fn active_project(&self) -> Option<&EntityRef> {
        self.active_project.as_ref()
    }

    pub fn set_active_project(&mut self, project: Option<EntityRef>) {
        log::debug!(
            "Active project changed to {}",
            project.as_ref().map_or("<none>", |p| p.display.as_str())
        );
        self.active_project = project;
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout_mode
    }

    pub fn set_layout_mode(&mut self, layout_mode: LayoutMode) {
        log::info!("Setting layout mode to {:?}", layout_mode);
        self.layout_mode = layout_mode;
    }

    pub fn toggle_layout_mode(&mut self) -> LayoutMode {
        self.set_layout_mode(self.layout_mode.toggle());
        self.layout_mode
    }

    /// Drop everything tied to the logged-in user.
    pub fn clear(&mut self) {
        self.user = None;
        self.active_project = None;
        self.layout_mode = LayoutMode::default();
    }
}

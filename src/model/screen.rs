use serde::{Deserialize, Serialize};

fn default_security() -> String {
    "PermitAll".to_string()
}

fn default_priority() -> String {
    "1.0".to_string()
}

fn default_enabled() -> bool {
    true
}

/// One line of a screen: a field of the screen's entity, or of an entity one
/// relationship hop away (`entity_line_type = "Project of Activity"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldReference {
    pub entity_line_type: String,
    pub field_name: String,
}

impl FieldReference {
    pub fn new(entity_line_type: &str, field_name: &str) -> Self {
        Self {
            entity_line_type: entity_line_type.to_string(),
            field_name: field_name.to_string(),
        }
    }
}

/// Persisted description of a runnable page, interpreted when the screen opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenDefinition {
    /// Unique route, e.g. "project-risks"
    pub route: String,

    /// Unique dotted menu path, e.g. "Project.Risks"
    pub title: String,

    #[serde(default)]
    pub parent_menu: String,

    /// "PermitAll", "RolesAllowed(ADMIN, MANAGER)" or empty for anonymous access
    #[serde(default = "default_security")]
    pub security_permissions: String,

    /// Catalog key of the primary entity type
    pub entity_type: String,

    /// Menu ordering priority as a decimal string
    #[serde(default = "default_priority")]
    pub order_priority: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Field lines in display order
    #[serde(default)]
    pub fields: Vec<FieldReference>,
}

impl ScreenDefinition {
    pub fn new(route: &str, title: &str, entity_type: &str) -> Self {
        Self {
            route: route.to_string(),
            title: title.to_string(),
            parent_menu: title
                .rsplit_once('.')
                .map(|(parent, _)| parent.to_string())
                .unwrap_or_default(),
            security_permissions: default_security(),
            entity_type: entity_type.to_string(),
            order_priority: default_priority(),
            enabled: true,
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, entity_line_type: &str, field_name: &str) -> Self {
        self.fields
            .push(FieldReference::new(entity_line_type, field_name));
        self
    }

    pub fn with_security(mut self, security_permissions: &str) -> Self {
        self.security_permissions = security_permissions.to_string();
        self
    }

    pub fn with_priority(mut self, order_priority: &str) -> Self {
        self.order_priority = order_priority.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Segments of the dotted title ("Project.Risks" -> ["Project", "Risks"]).
    pub fn menu_path(&self) -> Vec<&str> {
        self.title
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    pub fn priority(&self) -> Result<f64, String> {
        self.order_priority
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|priority| priority.is_finite())
            .ok_or_else(|| format!("order priority '{}' is not a decimal number", self.order_priority))
    }

    pub fn security(&self) -> Result<SecurityPredicate, String> {
        SecurityPredicate::parse(&self.security_permissions)
    }
}

/// Who may open a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityPredicate {
    /// No login required
    Anonymous,
    /// Any authenticated user
    PermitAll,
    /// Authenticated user holding at least one of the roles
    RolesAllowed(Vec<String>),
}

impl SecurityPredicate {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Ok(Self::Anonymous);
        }
        if expression.eq_ignore_ascii_case("PermitAll") {
            return Ok(Self::PermitAll);
        }
        let roles = expression
            .strip_prefix("RolesAllowed(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| format!("unrecognised security expression '{}'", expression))?;
        let roles: Vec<String> = roles
            .split(',')
            .map(|role| role.trim().trim_matches('"').to_string())
            .filter(|role| !role.is_empty())
            .collect();
        if roles.is_empty() {
            return Err(format!("'{}' names no roles", expression));
        }
        Ok(Self::RolesAllowed(roles))
    }

    pub fn permits(&self, authenticated: bool, roles: &[String]) -> bool {
        match self {
            Self::Anonymous => true,
            Self::PermitAll => authenticated,
            Self::RolesAllowed(allowed) => {
                authenticated && roles.iter().any(|role| allowed.contains(role))
            }
        }
    }
}

/// Grid configuration stored as a compact "field:order,field:order" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub name: String,
    pub entity_type: String,
    pub selected_fields: String,
}

impl GridDefinition {
    pub fn new(name: &str, entity_type: &str, selected_fields: &str) -> Self {
        Self {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            selected_fields: selected_fields.to_string(),
        }
    }

    /// Split `selected_fields` into `(field, order)` pairs, keeping malformed
    /// entries as errors so the caller can decide how loud to be.
    pub fn selected_pairs(&self) -> Vec<Result<(String, i32), String>> {
        self.selected_fields
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (field, order) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("'{}' is not a field:order pair", pair))?;
                let order = order
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| format!("'{}' has a non-numeric order", pair))?;
                Ok((field.trim().to_string(), order))
            })
            .collect()
    }
}

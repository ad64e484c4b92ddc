use crate::model::FieldKind;
use serde::{Deserialize, Serialize};

/// Order used when a field does not declare one.
pub const DEFAULT_ORDER: i32 = 100;

/// `max_length` value meaning "no limit".
pub const UNBOUNDED_LENGTH: i32 = -1;

fn unbounded_length() -> i32 {
    UNBOUNDED_LENGTH
}

fn lowest() -> f64 {
    f64::MIN
}

fn highest() -> f64 {
    f64::MAX
}

fn default_order() -> i32 {
    DEFAULT_ORDER
}

/// Presentation and validation rules for one entity field.
///
/// Descriptors are registered once per entity type and never change afterwards;
/// they are uniquely keyed by `(entity type, field_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Attribute name on the entity (e.g. "name", "project")
    pub field_name: String,

    /// Label shown in forms and grid headers
    pub display_name: String,

    pub kind: FieldKind,

    /// Helper text rendered under the control
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub hidden: bool,

    /// Sole rendering sort key, ascending
    #[serde(default = "default_order")]
    pub order: i32,

    /// Maximum character count for text, `-1` when unbounded
    #[serde(default = "unbounded_length")]
    pub max_length: i32,

    #[serde(default = "lowest")]
    pub min: f64,
    #[serde(default = "highest")]
    pub max: f64,

    /// Value used for freshly created instances, converted to `kind`
    #[serde(default)]
    pub default_value: String,

    /// Name of the provider of selectable options for reference fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_provider_ref: Option<String>,
}

impl FieldDescriptor {
    pub fn new(field_name: &str, display_name: &str, kind: FieldKind) -> Self {
        Self {
            field_name: field_name.to_string(),
            display_name: display_name.to_string(),
            kind,
            description: String::new(),
            required: false,
            read_only: false,
            hidden: false,
            order: DEFAULT_ORDER,
            max_length: UNBOUNDED_LENGTH,
            min: f64::MIN,
            max: f64::MAX,
            default_value: String::new(),
            lookup_provider_ref: None,
        }
    }

    pub fn text(field_name: &str, display_name: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::Text)
    }

    pub fn number(field_name: &str, display_name: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::Number)
    }

    pub fn boolean(field_name: &str, display_name: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::Boolean)
    }

    pub fn date(field_name: &str, display_name: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::Date)
    }

    pub fn date_time(field_name: &str, display_name: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::DateTime)
    }

    pub fn reference(field_name: &str, display_name: &str, target: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::reference(target))
    }

    pub fn multi_reference(field_name: &str, display_name: &str, target: &str) -> Self {
        Self::new(field_name, display_name, FieldKind::multi_reference(target))
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn max_length(mut self, max_length: i32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default_value = value.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn lookup(mut self, provider: &str) -> Self {
        self.lookup_provider_ref = Some(provider.to_string());
        self
    }

    /// Character limit, `None` when unbounded.
    pub fn length_limit(&self) -> Option<usize> {
        usize::try_from(self.max_length).ok()
    }

    /// Check the descriptor's own parameters. Returns a description of every problem.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.field_name.trim().is_empty() {
            problems.push("field name is empty".to_string());
        }
        if self.order < 0 {
            problems.push(format!("order {} is negative", self.order));
        }
        if self.max_length == 0 || self.max_length < UNBOUNDED_LENGTH {
            problems.push(format!(
                "max_length {} must be positive or -1",
                self.max_length
            ));
        }
        if self.min > self.max {
            problems.push(format!("min {} exceeds max {}", self.min, self.max));
        }
        if self.lookup_provider_ref.is_some() && self.kind.target().is_none() {
            problems.push("lookup provider set on a non-reference field".to_string());
        }
        problems
            .into_iter()
            .map(|problem| format!("field '{}': {}", self.field_name, problem))
            .collect()
    }
}

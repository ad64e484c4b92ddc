use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

pub type Id = String;

/// Semantic type of an entity attribute. Drives control and column selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Date,
    DateTime,
    Reference { target: String },
    MultiReference { target: String },
}

impl FieldKind {
    pub fn reference(target: &str) -> Self {
        Self::Reference {
            target: target.to_string(),
        }
    }

    pub fn multi_reference(target: &str) -> Self {
        Self::MultiReference {
            target: target.to_string(),
        }
    }

    /// Stable tag used to check descriptor/binding agreement.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "date_time",
            Self::Reference { .. } => "reference",
            Self::MultiReference { .. } => "multi_reference",
        }
    }

    /// Entity type referenced by reference kinds
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Reference { target } | Self::MultiReference { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_single_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }
}

/// Lightweight handle on another entity: type, identity and display text.
///
/// Equality, hashing and ordering only consider `(entity_type, id)`; the display
/// text is carried for rendering and may be stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: Id,
    pub display: String,
}

impl EntityRef {
    pub fn new(entity_type: &str, id: impl Into<Id>, display: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id: id.into(),
            display: display.into(),
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type && self.id == other.id
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_type.hash(state);
        self.id.hash(state);
    }
}

impl PartialOrd for EntityRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityRef {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.entity_type, &self.id).cmp(&(&other.entity_type, &other.id))
    }
}

/// Selected members of a multi-reference control.
pub type Selection = BTreeSet<EntityRef>;

/// Value held by a bound form control or produced by a grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Reference(EntityRef),
    References(Selection),
}

impl FieldValue {
    /// The "no value" representation for a control of the given kind.
    /// Multi-reference controls are never empty-valued, only empty-selected.
    pub fn empty_for(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::MultiReference { .. } => Self::References(Selection::new()),
            _ => Self::Empty,
        }
    }

    /// True for missing values, blank text and empty selections.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::References(selection) => selection.is_empty(),
            _ => false,
        }
    }

    /// Whether this value can be held by a control of `kind`.
    pub fn fits(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Self::Empty, _) => true,
            (Self::Text(_), FieldKind::Text) => true,
            (Self::Number(_), FieldKind::Number) => true,
            (Self::Boolean(_), FieldKind::Boolean) => true,
            (Self::Date(_), FieldKind::Date) => true,
            (Self::DateTime(_), FieldKind::DateTime) => true,
            (Self::Reference(reference), FieldKind::Reference { target }) => {
                &reference.entity_type == target
            }
            (Self::References(selection), FieldKind::MultiReference { target }) => {
                selection.iter().all(|r| &r.entity_type == target)
            }
            _ => false,
        }
    }

    /// Parse a descriptor default value (always stored as a string) into a
    /// value of the given kind. Returns `None` for blank defaults, reference
    /// kinds and unparseable input.
    pub fn parse_default(raw: &str, kind: &FieldKind) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match kind {
            FieldKind::Text => Some(Self::Text(raw.to_string())),
            FieldKind::Number => raw.parse::<f64>().ok().map(Self::Number),
            FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Some(Self::Boolean(true)),
                "false" => Some(Self::Boolean(false)),
                _ => None,
            },
            FieldKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(Self::Date),
            FieldKind::DateTime => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(Self::DateTime),
            FieldKind::Reference { .. } | FieldKind::MultiReference { .. } => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&EntityRef> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_selection(&self) -> Option<&Selection> {
        match self {
            Self::References(selection) => Some(selection),
            _ => None,
        }
    }

    /// Equality used by generic field queries: references compare by identity,
    /// and a single reference matches a selection that contains it.
    pub fn matches(&self, probe: &FieldValue) -> bool {
        match (self, probe) {
            (Self::References(selection), Self::Reference(reference)) => {
                selection.contains(reference)
            }
            (Self::Text(stored), Self::Text(wanted)) => stored == wanted,
            _ => self == probe,
        }
    }
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_identity_ignores_display() {
        let a = EntityRef::new("CUser", "u-1", "Ada");
        let b = EntityRef::new("CUser", "u-1", "Ada Lovelace");
        assert_eq!(a, b);

        let mut selection = Selection::new();
        selection.insert(a);
        selection.insert(b);
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_parse_default_by_kind() {
        assert_eq!(
            FieldValue::parse_default("true", &FieldKind::Boolean),
            Some(FieldValue::Boolean(true))
        );
        assert_eq!(
            FieldValue::parse_default("1.5", &FieldKind::Number),
            Some(FieldValue::Number(1.5))
        );
        assert_eq!(FieldValue::parse_default("", &FieldKind::Text), None);
        assert_eq!(FieldValue::parse_default("abc", &FieldKind::Number), None);
        assert_eq!(
            FieldValue::parse_default("x", &FieldKind::reference("CUser")),
            None
        );
    }

    #[test]
    fn test_empty_for_multi_reference_is_empty_selection() {
        let value = FieldValue::empty_for(&FieldKind::multi_reference("CUser"));
        assert_eq!(value, FieldValue::References(Selection::new()));
        assert!(value.is_empty());
    }

    #[test]
    fn test_fits_checks_reference_target() {
        let project = FieldValue::Reference(EntityRef::new("CProject", "p-1", "Apollo"));
        assert!(project.fits(&FieldKind::reference("CProject")));
        assert!(!project.fits(&FieldKind::reference("CUser")));
        assert!(!FieldValue::Number(1.0).fits(&FieldKind::Text));
        assert!(FieldValue::Empty.fits(&FieldKind::Number));
    }

    #[test]
    fn test_selection_matches_member_reference() {
        let user = EntityRef::new("CUser", "u-1", "Ada");
        let stored = FieldValue::References([user.clone()].into_iter().collect());
        assert!(stored.matches(&FieldValue::Reference(user)));
        assert!(!stored.matches(&FieldValue::Reference(EntityRef::new("CUser", "u-2", "Bob"))));
    }
}

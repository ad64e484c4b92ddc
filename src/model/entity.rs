use crate::model::{EntityRef, FieldDescriptor, FieldKind, FieldValue, Id, Selection};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Persistence identity embedded by every entity.
///
/// `id` stays `None` until the first successful save; `version` is the
/// optimistic-locking token and only the persistence collaborator advances it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Option<Id>,
    pub version: u64,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted(id: impl Into<Id>, version: u64) -> Self {
        Self {
            id: Some(id.into()),
            version,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Creation and modification timestamps maintained by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Audit {
    pub fn touch(&mut self) {
        let now = Utc::now().naive_utc();
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }
}

/// A domain object managed by the engine.
///
/// Field metadata and accessors are declared explicitly per type through
/// [`Entity::descriptors`] and [`Entity::bindings`]; nothing is discovered at runtime.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Catalog key, e.g. "CActivity"
    const ENTITY_TYPE: &'static str;

    /// Human label, e.g. "Activity"
    const LABEL: &'static str;

    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn audit_mut(&mut self) -> Option<&mut Audit> {
        None
    }

    /// Text used wherever the entity is shown as a reference.
    fn display_text(&self) -> String;

    fn descriptors() -> Vec<FieldDescriptor>;

    fn bindings() -> Vec<FieldBinding<Self>>;

    fn id(&self) -> Option<&Id> {
        self.identity().id.as_ref()
    }

    fn version(&self) -> u64 {
        self.identity().version
    }

    fn to_ref(&self) -> Option<EntityRef> {
        self.id()
            .map(|id| EntityRef::new(Self::ENTITY_TYPE, id.clone(), self.display_text()))
    }
}

/// Join entity linking a subject (e.g. a user) to a target (e.g. a project).
pub trait RelationSetting: Entity {
    /// Field holding the subject reference
    const SUBJECT_FIELD: &'static str;
    /// Field holding the target reference
    const TARGET_FIELD: &'static str;

    fn subject(&self) -> Option<&EntityRef>;

    fn target(&self) -> Option<&EntityRef>;
}

/// Typed converter pair between a model attribute `T` and its presentation `F`.
pub struct Binding<T, F> {
    to_field: fn(T) -> F,
    from_field: fn(F) -> T,
}

impl<T, F> Binding<T, F> {
    pub const fn new(to_field: fn(T) -> F, from_field: fn(F) -> T) -> Self {
        Self {
            to_field,
            from_field,
        }
    }

    pub fn to_field(&self, value: T) -> F {
        (self.to_field)(value)
    }

    pub fn from_field(&self, value: F) -> T {
        (self.from_field)(value)
    }
}

impl<T, F> Clone for Binding<T, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, F> Copy for Binding<T, F> {}

impl Binding<Option<Vec<EntityRef>>, Selection> {
    /// Nullable collection <-> selection set. A null collection reads as an empty
    /// selection and an empty selection writes back as an empty collection.
    pub fn multi_reference() -> Self {
        Self::new(
            |refs| refs.unwrap_or_default().into_iter().collect(),
            |selection| Some(selection.into_iter().collect()),
        )
    }
}

type Getter<E> = Arc<dyn Fn(&E) -> FieldValue + Send + Sync>;
type Setter<E> = Arc<dyn Fn(&mut E, FieldValue) -> Result<(), String> + Send + Sync>;

/// Erased accessor pair for one field of `E`.
pub struct FieldBinding<E> {
    field_name: &'static str,
    kind_name: &'static str,
    get: Getter<E>,
    set: Setter<E>,
}

impl<E> Clone for FieldBinding<E> {
    fn clone(&self) -> Self {
        Self {
            field_name: self.field_name,
            kind_name: self.kind_name,
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<E> fmt::Debug for FieldBinding<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field_name", &self.field_name)
            .field("kind", &self.kind_name)
            .finish()
    }
}

fn mismatch(field: &str, expected: &str, value: &FieldValue) -> String {
    format!("field '{}' expects a {} value, got {:?}", field, expected, value)
}

impl<E: 'static> FieldBinding<E> {
    pub fn field_name(&self) -> &'static str {
        self.field_name
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind_name
    }

    /// Whether this binding can serve a descriptor of the given kind.
    pub fn serves(&self, kind: &FieldKind) -> bool {
        self.kind_name == kind.name()
    }

    pub fn read(&self, entity: &E) -> FieldValue {
        (self.get)(entity)
    }

    pub fn write(&self, entity: &mut E, value: FieldValue) -> Result<(), String> {
        (self.set)(entity, value)
    }

    pub fn text(
        field_name: &'static str,
        get: impl Fn(&E) -> String + Send + Sync + 'static,
        set: impl Fn(&mut E, String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_name,
            kind_name: "text",
            get: Arc::new(move |entity: &E| {
                let text = get(entity);
                if text.is_empty() {
                    FieldValue::Empty
                } else {
                    FieldValue::Text(text)
                }
            }),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::Text(text) => {
                    set(entity, text);
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, String::new());
                    Ok(())
                }
                other => Err(mismatch(field_name, "text", &other)),
            }),
        }
    }

    pub fn number(
        field_name: &'static str,
        get: impl Fn(&E) -> Option<f64> + Send + Sync + 'static,
        set: impl Fn(&mut E, Option<f64>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_name,
            kind_name: "number",
            get: Arc::new(move |entity: &E| get(entity).map_or(FieldValue::Empty, FieldValue::Number)),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::Number(number) => {
                    set(entity, Some(number));
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, None);
                    Ok(())
                }
                other => Err(mismatch(field_name, "number", &other)),
            }),
        }
    }

    pub fn boolean(
        field_name: &'static str,
        get: impl Fn(&E) -> bool + Send + Sync + 'static,
        set: impl Fn(&mut E, bool) + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_name,
            kind_name: "boolean",
            get: Arc::new(move |entity: &E| FieldValue::Boolean(get(entity))),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::Boolean(flag) => {
                    set(entity, flag);
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, false);
                    Ok(())
                }
                other => Err(mismatch(field_name, "boolean", &other)),
            }),
        }
    }

    pub fn date(
        field_name: &'static str,
        get: impl Fn(&E) -> Option<NaiveDate> + Send + Sync + 'static,
        set: impl Fn(&mut E, Option<NaiveDate>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_name,
            kind_name: "date",
            get: Arc::new(move |entity: &E| get(entity).map_or(FieldValue::Empty, FieldValue::Date)),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::Date(date) => {
                    set(entity, Some(date));
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, None);
                    Ok(())
                }
                other => Err(mismatch(field_name, "date", &other)),
            }),
        }
    }

    pub fn date_time(
        field_name: &'static str,
        get: impl Fn(&E) -> Option<NaiveDateTime> + Send + Sync + 'static,
        set: impl Fn(&mut E, Option<NaiveDateTime>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_name,
            kind_name: "date_time",
            get: Arc::new(move |entity: &E| {
                get(entity).map_or(FieldValue::Empty, FieldValue::DateTime)
            }),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::DateTime(at) => {
                    set(entity, Some(at));
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, None);
                    Ok(())
                }
                other => Err(mismatch(field_name, "date and time", &other)),
            }),
        }
    }

    pub fn reference(
        field_name: &'static str,
        get: impl Fn(&E) -> Option<EntityRef> + Send + Sync + 'static,
        set: impl Fn(&mut E, Option<EntityRef>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_name,
            kind_name: "reference",
            get: Arc::new(move |entity: &E| {
                get(entity).map_or(FieldValue::Empty, FieldValue::Reference)
            }),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::Reference(reference) => {
                    set(entity, Some(reference));
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, None);
                    Ok(())
                }
                other => Err(mismatch(field_name, "reference", &other)),
            }),
        }
    }

    /// Multi-valued relationship bound through [`Binding::multi_reference`].
    pub fn multi_reference(
        field_name: &'static str,
        get: impl Fn(&E) -> Option<Vec<EntityRef>> + Send + Sync + 'static,
        set: impl Fn(&mut E, Option<Vec<EntityRef>>) + Send + Sync + 'static,
    ) -> Self {
        let converter = Binding::<Option<Vec<EntityRef>>, Selection>::multi_reference();
        Self {
            field_name,
            kind_name: "multi_reference",
            get: Arc::new(move |entity: &E| FieldValue::References(converter.to_field(get(entity)))),
            set: Arc::new(move |entity: &mut E, value: FieldValue| match value {
                FieldValue::References(selection) => {
                    set(entity, converter.from_field(selection));
                    Ok(())
                }
                FieldValue::Empty => {
                    set(entity, converter.from_field(Selection::new()));
                    Ok(())
                }
                other => Err(mismatch(field_name, "selection", &other)),
            }),
        }
    }
}

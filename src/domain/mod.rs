//! Demo project-management domain driven through the generic engine.

pub mod activity;
pub mod company;
pub mod meeting;
pub mod project;
pub mod risk;
pub mod settings;
pub mod user;

pub use activity::*;
pub use company::*;
pub use meeting::*;
pub use project::*;
pub use risk::*;
pub use settings::*;
pub use user::*;

use crate::model::{Audit, Entity, FieldBinding, FieldDescriptor};

/// Read-only audit columns shared by every audited entity.
pub(crate) fn audit_descriptors() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::date_time("created_date", "Created").order(80).read_only(),
        FieldDescriptor::date_time("last_modified", "Last Modified").order(81).read_only(),
    ]
}

/// Bindings for [`audit_descriptors`]. Writes are ignored: only the store touches audit data.
pub(crate) fn audit_bindings<E: Entity>(audit: fn(&E) -> &Audit) -> Vec<FieldBinding<E>> {
    vec![
        FieldBinding::date_time("created_date", move |e: &E| audit(e).created_at, |_, _| {}),
        FieldBinding::date_time("last_modified", move |e: &E| audit(e).updated_at, |_, _| {}),
    ]
}

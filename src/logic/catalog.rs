use itertools::Itertools;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::model::{Entity, EntityRef, FieldDescriptor};

/// Source of selectable options for reference fields, named by
/// `FieldDescriptor::lookup_provider_ref`.
pub trait LookupProvider: Send + Sync {
    fn options(&self) -> anyhow::Result<Vec<EntityRef>>;
}

impl<F> LookupProvider for F
where
    F: Fn() -> anyhow::Result<Vec<EntityRef>> + Send + Sync,
{
    fn options(&self) -> anyhow::Result<Vec<EntityRef>> {
        self()
    }
}

#[derive(Default, Clone)]
pub struct LookupRegistry {
    providers: HashMap<String, Arc<dyn LookupProvider>>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn LookupProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn options(&self, name: &str) -> Result<Vec<EntityRef>> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| EngineError::configuration(format!("lookup provider '{}' is not registered", name)))?;
        provider.options().map_err(EngineError::Collaborator)
    }
}

/// Target of an `entity_line_type` on a given base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTarget {
    pub entity_type: String,
    /// Reference field on the base type leading to `entity_type`, `None` for the base itself
    pub via: Option<String>,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    label: String,
    /// Sorted by order, ties kept in declaration order
    descriptors: Vec<FieldDescriptor>,
}

/// Read-only table of field descriptors per entity type.
///
/// Built once through [`CatalogBuilder`]; lookups afterwards take `&self` only and
/// the catalog is typically shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct MetadataCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl MetadataCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entries.contains_key(entity_type)
    }

    pub fn entity_types(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).sorted().collect()
    }

    fn entry(&self, entity_type: &str) -> Result<&CatalogEntry> {
        self.entries
            .get(entity_type)
            .ok_or_else(|| EngineError::configuration(format!("unknown entity type '{}'", entity_type)))
    }

    pub fn label(&self, entity_type: &str) -> Result<&str> {
        Ok(self.entry(entity_type)?.label.as_str())
    }

    /// All descriptors of `entity_type` ascending by order, hidden ones included.
    pub fn describe(&self, entity_type: &str) -> Result<&[FieldDescriptor]> {
        Ok(self.entry(entity_type)?.descriptors.as_slice())
    }

    pub fn describe_field(&self, entity_type: &str, field_name: &str) -> Result<&FieldDescriptor> {
        self.entry(entity_type)?
            .descriptors
            .iter()
            .find(|d| d.field_name == field_name)
            .ok_or_else(|| {
                EngineError::configuration(format!(
                    "entity type '{}' has no field '{}'",
                    entity_type, field_name
                ))
            })
    }

    /// Single-reference fields of `entity_type` with the line-type text that reaches them.
    fn hops(&self, entity_type: &str) -> Result<Vec<(String, &FieldDescriptor, &str)>> {
        let entry = self.entry(entity_type)?;
        let references: Vec<(&FieldDescriptor, &str)> = entry
            .descriptors
            .iter()
            .filter(|d| d.kind.is_single_reference())
            .filter_map(|d| d.kind.target().map(|target| (d, target)))
            .collect();

        let target_counts = references.iter().counts_by(|(_, target)| *target);
        references
            .into_iter()
            .map(|(descriptor, target)| {
                // Two references to the same type are told apart by their field label
                let prefix = if target_counts.get(target).copied().unwrap_or(0) > 1 {
                    descriptor.display_name.clone()
                } else {
                    self.label(target)?.to_string()
                };
                Ok((format!("{} of {}", prefix, entry.label), descriptor, target))
            })
            .collect()
    }

    /// Line types an administrator can pick for screens on `entity_type`: the type
    /// itself followed by one "<X> of <Label>" entry per single-reference field.
    pub fn available_line_types(&self, entity_type: &str) -> Result<Vec<String>> {
        let mut line_types = vec![entity_type.to_string()];
        line_types.extend(self.hops(entity_type)?.into_iter().map(|(line, _, _)| line));
        Ok(line_types)
    }

    /// Identify the entity type named by `line_type` on screens of `base`.
    pub fn resolve_line_type(&self, base: &str, line_type: &str) -> Result<LineTarget> {
        let label = self.label(base)?;
        let line_type = line_type.trim();
        if line_type == base || line_type == label {
            return Ok(LineTarget {
                entity_type: base.to_string(),
                via: None,
            });
        }
        self.hops(base)?
            .into_iter()
            .find(|(line, _, _)| line == line_type)
            .map(|(_, descriptor, target)| LineTarget {
                entity_type: target.to_string(),
                via: Some(descriptor.field_name.clone()),
            })
            .ok_or_else(|| {
                EngineError::configuration(format!(
                    "line type '{}' is not reachable from '{}'",
                    line_type, base
                ))
            })
    }

    /// Check that every lookup provider named by a descriptor is registered.
    pub fn verify_lookups(&self, lookups: &LookupRegistry) -> Result<()> {
        let missing: Vec<String> = self
            .entries
            .iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .flat_map(|(entity_type, entry)| {
                entry.descriptors.iter().filter_map(move |d| {
                    d.lookup_provider_ref
                        .as_deref()
                        .filter(|name| !lookups.contains(name))
                        .map(|name| format!("{}.{} uses unregistered lookup '{}'", entity_type, d.field_name, name))
                })
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::configuration(missing.join("; ")))
        }
    }
}

struct PendingEntry {
    entity_type: String,
    label: String,
    descriptors: Vec<FieldDescriptor>,
    /// `(field_name, kind_name)` of each accessor, `None` for metadata-only types
    bindings: Option<Vec<(&'static str, &'static str)>>,
}

/// Collects entity registrations and validates them as a whole.
#[derive(Default)]
pub struct CatalogBuilder {
    pending: Vec<PendingEntry>,
}

impl CatalogBuilder {
    pub fn register<E: Entity>(mut self) -> Self {
        self.pending.push(PendingEntry {
            entity_type: E::ENTITY_TYPE.to_string(),
            label: E::LABEL.to_string(),
            descriptors: E::descriptors(),
            bindings: Some(
                E::bindings()
                    .iter()
                    .map(|b| (b.field_name(), b.kind_name()))
                    .collect(),
            ),
        });
        self
    }

    /// Register descriptors for a type without typed accessors (e.g. loaded from config).
    pub fn register_raw(mut self, entity_type: &str, label: &str, descriptors: Vec<FieldDescriptor>) -> Self {
        self.pending.push(PendingEntry {
            entity_type: entity_type.to_string(),
            label: label.to_string(),
            descriptors,
            bindings: None,
        });
        self
    }

    /// Validate every registration and freeze the catalog. All problems are
    /// reported together in one configuration error.
    pub fn build(self) -> Result<MetadataCatalog> {
        let mut problems = Vec::new();

        for duplicate in self.pending.iter().map(|p| p.entity_type.as_str()).duplicates() {
            problems.push(format!("entity type '{}' registered more than once", duplicate));
        }
        let known: Vec<&str> = self.pending.iter().map(|p| p.entity_type.as_str()).collect();

        for pending in &self.pending {
            let prefix = &pending.entity_type;

            for duplicate in pending.descriptors.iter().map(|d| d.field_name.as_str()).duplicates() {
                problems.push(format!("{}: field '{}' declared more than once", prefix, duplicate));
            }

            for descriptor in &pending.descriptors {
                problems.extend(descriptor.check().into_iter().map(|p| format!("{}: {}", prefix, p)));

                if let Some(target) = descriptor.kind.target() {
                    if !known.contains(&target) {
                        problems.push(format!(
                            "{}: field '{}' references unknown type '{}'",
                            prefix, descriptor.field_name, target
                        ));
                    }
                }

                if let Some(bindings) = &pending.bindings {
                    match bindings.iter().find(|(name, _)| *name == descriptor.field_name) {
                        None => problems.push(format!(
                            "{}: field '{}' has no accessor binding",
                            prefix, descriptor.field_name
                        )),
                        Some((_, kind)) if *kind != descriptor.kind.name() => problems.push(format!(
                            "{}: field '{}' is declared {} but bound as {}",
                            prefix,
                            descriptor.field_name,
                            descriptor.kind.name(),
                            kind
                        )),
                        Some(_) => {}
                    }
                }
            }

            // Hidden fields may share order values; displayed ones may not
            let shared_orders = pending
                .descriptors
                .iter()
                .filter(|d| !d.hidden)
                .map(|d| d.order)
                .duplicates()
                .sorted();
            for order in shared_orders {
                problems.push(format!("{}: order {} is used by more than one visible field", prefix, order));
            }
        }

        if !problems.is_empty() {
            return Err(EngineError::configuration(problems.join("; ")));
        }

        let entries = self
            .pending
            .into_iter()
            .map(|pending| {
                debug!(
                    "Registered {} with {} field descriptors",
                    pending.entity_type,
                    pending.descriptors.len()
                );
                let descriptors = pending
                    .descriptors
                    .into_iter()
                    .sorted_by_key(|d| d.order)
                    .collect();
                (
                    pending.entity_type,
                    CatalogEntry {
                        label: pending.label,
                        descriptors,
                    },
                )
            })
            .collect();

        Ok(MetadataCatalog { entries })
    }
}

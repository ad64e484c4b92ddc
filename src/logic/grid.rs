use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::logic::catalog::MetadataCatalog;
use crate::logic::screen_resolve::ResolvedScreen;
use crate::model::{Entity, FieldBinding, FieldDescriptor, FieldValue, GridDefinition, Id};
use crate::store::EntityStore;

/// Fixed formatting applied to grid cells, per semantic type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRules {
    /// Text longer than this many characters is cut and suffixed with "..."
    pub truncate_at: usize,
    pub date_format: String,
    pub datetime_format: String,
}

impl Default for PresentationRules {
    fn default() -> Self {
        Self {
            truncate_at: 50,
            date_format: "%b %-d, %Y".to_string(),
            datetime_format: "%b %-d, %Y, %-I:%M:%S %p".to_string(),
        }
    }
}

impl PresentationRules {
    pub fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.truncate_at {
            return text.to_string();
        }
        let mut cut: String = text.chars().take(self.truncate_at).collect();
        cut.push_str("...");
        cut
    }

    /// Cell text for `value`; `placeholder` is shown for an empty reference.
    pub fn render(&self, value: &FieldValue, placeholder: &str) -> String {
        match value {
            FieldValue::Empty => placeholder.to_string(),
            FieldValue::Text(text) => self.truncate(text),
            FieldValue::Number(number) => number.to_string(),
            FieldValue::Boolean(true) => "Yes".to_string(),
            FieldValue::Boolean(false) => "No".to_string(),
            FieldValue::Date(date) => date.format(&self.date_format).to_string(),
            FieldValue::DateTime(at) => at.format(&self.datetime_format).to_string(),
            FieldValue::Reference(reference) => self.truncate(&reference.display),
            FieldValue::References(selection) => {
                self.truncate(&selection.iter().map(|r| r.display.as_str()).join(", "))
            }
        }
    }
}

/// Read access to a field of a stored entity, used by columns that display a
/// field one relationship hop away.
pub trait EntityReader: Send + Sync {
    fn read_field(&self, id: &Id, field_name: &str) -> anyhow::Result<Option<FieldValue>>;
}

/// [`EntityReader`] over a typed entity store.
pub struct StoreReader<T: Entity> {
    store: Arc<dyn EntityStore<T>>,
}

impl<T: Entity> StoreReader<T> {
    pub fn new(store: Arc<dyn EntityStore<T>>) -> Self {
        Self { store }
    }
}

impl<T: Entity> EntityReader for StoreReader<T> {
    fn read_field(&self, id: &Id, field_name: &str) -> anyhow::Result<Option<FieldValue>> {
        let Some(entity) = self.store.find_by_id(id)? else {
            return Ok(None);
        };
        Ok(T::bindings()
            .into_iter()
            .find(|b| b.field_name() == field_name)
            .map(|b| b.read(&entity)))
    }
}

/// Readers keyed by entity type.
#[derive(Default, Clone)]
pub struct EntityReaders {
    readers: HashMap<String, Arc<dyn EntityReader>>,
}

impl EntityReaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity_type: &str, reader: Arc<dyn EntityReader>) {
        self.readers.insert(entity_type.to_string(), reader);
    }

    fn get(&self, entity_type: &str) -> Option<&Arc<dyn EntityReader>> {
        self.readers.get(entity_type)
    }
}

enum CellSource<E> {
    Own(FieldBinding<E>),
    Related {
        via: FieldBinding<E>,
        /// Label of the related type
        label: String,
        reader: Arc<dyn EntityReader>,
    },
}

/// Read-only column of a compiled grid.
pub struct Column<E> {
    header: String,
    descriptor: FieldDescriptor,
    /// Text for a missing reference, e.g. "No Project"
    placeholder: String,
    source: CellSource<E>,
}

impl<E: Entity> Column<E> {
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn field_name(&self) -> &str {
        &self.descriptor.field_name
    }

    fn value(&self, row: &E) -> std::result::Result<FieldValue, String> {
        match &self.source {
            CellSource::Own(binding) => Ok(binding.read(row)),
            CellSource::Related { via, label, reader } => {
                let FieldValue::Reference(reference) = via.read(row) else {
                    return Err(format!("No {}", label));
                };
                match reader.read_field(&reference.id, &self.descriptor.field_name) {
                    Ok(Some(value)) => Ok(value),
                    Ok(None) => Ok(FieldValue::Empty),
                    Err(err) => {
                        warn!(
                            "Could not read {} {} for grid cell: {:#}",
                            label, self.descriptor.field_name, err
                        );
                        Ok(FieldValue::Empty)
                    }
                }
            }
        }
    }
}

/// Ordered columns for rows of `E`.
pub struct ColumnSet<E> {
    columns: Vec<Column<E>>,
    rules: PresentationRules,
}

impl<E: Entity> ColumnSet<E> {
    pub fn columns(&self) -> &[Column<E>] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(Column::header).collect()
    }

    pub fn render_row(&self, row: &E) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column.value(row) {
                Ok(value) => self.rules.render(&value, &column.placeholder),
                Err(missing_hop) => missing_hop,
            })
            .collect()
    }

    pub fn render(&self, rows: &[E]) -> Vec<Vec<String>> {
        rows.iter().map(|row| self.render_row(row)).collect()
    }
}

/// Turns descriptors into read-only grid columns.
#[derive(Clone)]
pub struct GridCompiler {
    catalog: Arc<MetadataCatalog>,
    rules: PresentationRules,
    readers: EntityReaders,
}

impl GridCompiler {
    pub fn new(catalog: Arc<MetadataCatalog>, rules: PresentationRules) -> Self {
        Self {
            catalog,
            rules,
            readers: EntityReaders::new(),
        }
    }

    pub fn with_readers(mut self, readers: EntityReaders) -> Self {
        self.readers = readers;
        self
    }

    fn placeholder(&self, descriptor: &FieldDescriptor) -> Result<String> {
        match descriptor.kind.target() {
            Some(target) if descriptor.kind.is_single_reference() => {
                Ok(format!("No {}", self.catalog.label(target)?))
            }
            _ => Ok(String::new()),
        }
    }

    fn binding<E: Entity>(bindings: &[FieldBinding<E>], descriptor: &FieldDescriptor) -> Result<FieldBinding<E>> {
        bindings
            .iter()
            .find(|b| b.field_name() == descriptor.field_name && b.serves(&descriptor.kind))
            .cloned()
            .ok_or_else(|| {
                EngineError::configuration(format!(
                    "{}.{} has no {} accessor binding",
                    E::ENTITY_TYPE,
                    descriptor.field_name,
                    descriptor.kind.name()
                ))
            })
    }

    /// Columns for the entity's own fields, ascending by order, hidden ones left out.
    pub fn compile<E: Entity>(&self, descriptors: &[FieldDescriptor]) -> Result<ColumnSet<E>> {
        let bindings = E::bindings();
        let columns = descriptors
            .iter()
            .filter(|d| !d.hidden)
            .sorted_by_key(|d| d.order)
            .map(|descriptor| {
                Ok(Column {
                    header: descriptor.display_name.clone(),
                    placeholder: self.placeholder(descriptor)?,
                    source: CellSource::Own(Self::binding(&bindings, descriptor)?),
                    descriptor: descriptor.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Compiled {} grid with {} columns", E::ENTITY_TYPE, columns.len());
        Ok(ColumnSet {
            columns,
            rules: self.rules.clone(),
        })
    }

    pub fn compile_for<E: Entity>(&self) -> Result<ColumnSet<E>> {
        self.compile(self.catalog.describe(E::ENTITY_TYPE)?)
    }

    /// Columns in screen order, including fields of related entities.
    pub fn compile_screen<E: Entity>(&self, screen: &ResolvedScreen) -> Result<ColumnSet<E>> {
        if screen.entity_type() != E::ENTITY_TYPE {
            return Err(EngineError::configuration(format!(
                "screen '{}' shows {}, not {}",
                screen.route(),
                screen.entity_type(),
                E::ENTITY_TYPE
            )));
        }
        let bindings = E::bindings();
        let mut columns = Vec::new();
        for field in screen.fields().iter().filter(|f| !f.descriptor.hidden) {
            let descriptor = &field.descriptor;
            let source = match &field.via {
                None => CellSource::Own(Self::binding(&bindings, descriptor)?),
                Some(via) => {
                    let via_descriptor = self.catalog.describe_field(E::ENTITY_TYPE, via)?;
                    let reader = self.readers.get(&field.owner_type).cloned().ok_or_else(|| {
                        EngineError::configuration(format!(
                            "no reader registered for related type '{}'",
                            field.owner_type
                        ))
                    })?;
                    CellSource::Related {
                        via: Self::binding(&bindings, via_descriptor)?,
                        label: self.catalog.label(&field.owner_type)?.to_string(),
                        reader,
                    }
                }
            };
            let header = match &field.via {
                None => descriptor.display_name.clone(),
                Some(_) => format!(
                    "{} {}",
                    self.catalog.label(&field.owner_type)?,
                    descriptor.display_name
                ),
            };
            columns.push(Column {
                header,
                placeholder: self.placeholder(descriptor)?,
                source,
                descriptor: descriptor.clone(),
            });
        }
        Ok(ColumnSet {
            columns,
            rules: self.rules.clone(),
        })
    }

    /// Columns listed by a grid definition's `selected_fields`.
    pub fn compile_grid<E: Entity>(&self, grid: &GridDefinition) -> Result<ColumnSet<E>> {
        let descriptors = parse_selected_fields(&self.catalog, grid)?;
        self.compile(&descriptors)
    }
}

/// Resolve `"field:order,field:order"` to descriptors carrying the listed order.
/// Unknown fields are configuration errors; malformed pairs are skipped.
pub fn parse_selected_fields(catalog: &MetadataCatalog, grid: &GridDefinition) -> Result<Vec<FieldDescriptor>> {
    let mut descriptors = Vec::new();
    for pair in grid.selected_pairs() {
        match pair {
            Ok((field_name, order)) => {
                let mut descriptor = catalog.describe_field(&grid.entity_type, &field_name)?.clone();
                descriptor.order = order;
                descriptors.push(descriptor);
            }
            Err(problem) => warn!("Skipping selected field in grid '{}': {}", grid.name, problem),
        }
    }
    descriptors.sort_by_key(|d| d.order);
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, Meeting, Project, User};
    use crate::logic::screen_resolve::{ScreenInterpreter, ScreenRegistry};
    use crate::model::{EntityRef, Identity, ScreenDefinition, SessionContext, UserContext};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn compiler() -> GridCompiler {
        GridCompiler::new(
            Arc::new(crate::seed::build_catalog().unwrap()),
            PresentationRules::default(),
        )
    }

    #[test]
    fn test_truncates_long_text_at_fifty_characters() {
        let rules = PresentationRules::default();
        let long = "x".repeat(60);
        let cell = rules.render(&FieldValue::Text(long), "");
        assert_eq!(cell.len(), 53);
        assert!(cell.ends_with("..."));
        assert_eq!(rules.render(&FieldValue::Text("x".repeat(50)), ""), "x".repeat(50));
    }

    #[test]
    fn test_medium_date_format_and_booleans() {
        let rules = PresentationRules::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(rules.render(&FieldValue::Date(date), ""), "Mar 7, 2024");
        let at = date.and_hms_opt(14, 5, 9).unwrap();
        assert_eq!(rules.render(&FieldValue::DateTime(at), ""), "Mar 7, 2024, 2:05:09 PM");
        assert_eq!(rules.render(&FieldValue::Boolean(true), ""), "Yes");
        assert_eq!(rules.render(&FieldValue::Number(3.0), ""), "3");
    }

    #[test]
    fn test_null_reference_renders_placeholder() {
        let grid = compiler().compile_for::<Activity>().unwrap();
        let headers = grid.headers();
        let project_column = headers.iter().position(|h| *h == "Project").unwrap();
        let activity = Activity::new("Design review");
        let row = grid.render_row(&activity);
        assert_eq!(row[project_column], "No Project");
        assert_eq!(row[0], "Design review");
    }

    #[test]
    fn test_hidden_columns_excluded() {
        let grid = compiler().compile_for::<User>().unwrap();
        assert!(!grid.columns().iter().any(|c| c.field_name() == "password"));
    }

    #[test]
    fn test_multi_reference_joins_display_text() {
        let grid = compiler().compile_for::<Meeting>().unwrap();
        let column = grid
            .columns()
            .iter()
            .position(|c| c.field_name() == "participants")
            .unwrap();
        let mut meeting = Meeting::new("Kickoff");
        meeting.participants = Some(vec![
            EntityRef::new("CUser", "u-2", "Bob"),
            EntityRef::new("CUser", "u-1", "Ada"),
        ]);
        assert_eq!(grid.render_row(&meeting)[column], "Ada, Bob");
    }

    #[test]
    fn test_screen_grid_reads_related_fields() {
        let catalog = Arc::new(crate::seed::build_catalog().unwrap());
        let projects: Arc<MemoryStore<Project>> = Arc::new(MemoryStore::new());
        let saved = projects.save(Project::new("Apollo")).unwrap();

        let mut readers = EntityReaders::new();
        let project_store: Arc<dyn EntityStore<Project>> = projects.clone();
        readers.register("CProject", Arc::new(StoreReader::new(project_store)));
        let compiler = GridCompiler::new(catalog.clone(), PresentationRules::default()).with_readers(readers);

        let registry = ScreenRegistry::load(
            ScreenInterpreter::new(catalog),
            vec![ScreenDefinition::new("activities", "Project.Activities", "CActivity")
                .with_field("CActivity", "name")
                .with_field("Project of Activity", "name")],
        )
        .unwrap();
        let screen = registry
            .open("activities", &SessionContext::for_user(UserContext::new("ada")))
            .unwrap();
        let grid = compiler.compile_screen::<Activity>(&screen).unwrap();
        assert_eq!(grid.headers(), vec!["Name", "Project Name"]);

        let mut linked = Activity::new("Countdown");
        linked.project = saved.to_ref();
        let mut orphan = Activity::new("Loose end");
        orphan.identity = Identity::persisted("a-2", 1);
        let rows = grid.render(&[linked, orphan]);
        assert_eq!(rows[0], vec!["Countdown", "Apollo"]);
        assert_eq!(rows[1], vec!["Loose end", "No Project"]);
    }

    #[test]
    fn test_selected_fields_grid() {
        let compiler = compiler();
        let grid = GridDefinition::new("activities", "CActivity", "progress:2,name:1,junk");
        let columns = compiler.compile_grid::<Activity>(&grid).unwrap();
        assert_eq!(columns.headers(), vec!["Name", "Progress"]);

        let unknown = GridDefinition::new("activities", "CActivity", "budget:1");
        assert!(matches!(
            compiler.compile_grid::<Activity>(&unknown),
            Err(EngineError::Configuration(_))
        ));
    }
}

use itertools::Itertools;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::logic::catalog::MetadataCatalog;
use crate::model::{
    FieldDescriptor, FieldReference, ScreenDefinition, SecurityPredicate, SessionContext,
};
use crate::store::ScreenStore;

/// A screen line matched to its concrete descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub reference: FieldReference,
    /// Entity type that owns `descriptor`
    pub owner_type: String,
    /// Reference field on the screen's entity traversed to reach `owner_type`
    pub via: Option<String>,
    pub descriptor: FieldDescriptor,
}

impl ResolvedField {
    pub fn is_related(&self) -> bool {
        self.via.is_some()
    }
}

/// Resolves screen definitions against the metadata catalog.
#[derive(Debug, Clone)]
pub struct ScreenInterpreter {
    catalog: Arc<MetadataCatalog>,
}

impl ScreenInterpreter {
    pub fn new(catalog: Arc<MetadataCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<MetadataCatalog> {
        &self.catalog
    }

    /// Match every field line of `screen` to a descriptor, in display order.
    /// Every unresolvable line is reported in one configuration error.
    pub fn resolve(&self, screen: &ScreenDefinition) -> Result<Vec<ResolvedField>> {
        if !self.catalog.contains(&screen.entity_type) {
            return Err(EngineError::configuration(format!(
                "screen '{}' names unknown entity type '{}'",
                screen.route, screen.entity_type
            )));
        }

        let mut resolved = Vec::with_capacity(screen.fields.len());
        let mut problems = Vec::new();
        for reference in &screen.fields {
            let field = self
                .catalog
                .resolve_line_type(&screen.entity_type, &reference.entity_line_type)
                .and_then(|target| {
                    let descriptor = self
                        .catalog
                        .describe_field(&target.entity_type, &reference.field_name)?;
                    Ok(ResolvedField {
                        reference: reference.clone(),
                        owner_type: target.entity_type,
                        via: target.via,
                        descriptor: descriptor.clone(),
                    })
                });
            match field {
                Ok(field) => resolved.push(field),
                Err(err) => problems.push(format!(
                    "'{}' / '{}': {}",
                    reference.entity_line_type, reference.field_name, err
                )),
            }
        }

        if !problems.is_empty() {
            return Err(EngineError::configuration(format!(
                "screen '{}' cannot be resolved: {}",
                screen.route,
                problems.join("; ")
            )));
        }
        debug!("Resolved screen '{}' to {} fields", screen.route, resolved.len());
        Ok(resolved)
    }
}

/// An opened screen with its resolution cached for its lifetime.
#[derive(Debug, Clone)]
pub struct ResolvedScreen {
    definition: ScreenDefinition,
    fields: Vec<ResolvedField>,
}

impl ResolvedScreen {
    pub fn definition(&self) -> &ScreenDefinition {
        &self.definition
    }

    pub fn route(&self) -> &str {
        &self.definition.route
    }

    pub fn entity_type(&self) -> &str {
        &self.definition.entity_type
    }

    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    /// Descriptors of the screen's own entity, re-ordered by screen position so that
    /// the form follows the administrator's layout.
    pub fn base_descriptors(&self) -> Vec<FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| !f.is_related())
            .enumerate()
            .map(|(position, field)| {
                let mut descriptor = field.descriptor.clone();
                descriptor.order = position as i32;
                descriptor
            })
            .collect()
    }
}

/// Navigation entry for an enabled screen.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub route: String,
    pub title: String,
    pub parent_menu: String,
    pub priority: f64,
}

/// Validated set of screen definitions, keyed by route.
#[derive(Debug, Clone)]
pub struct ScreenRegistry {
    interpreter: ScreenInterpreter,
    screens: Vec<ScreenDefinition>,
}

impl ScreenRegistry {
    /// Validate and resolve every definition up front; nothing is left to fail at
    /// render time. All problems are reported together.
    pub fn load(interpreter: ScreenInterpreter, screens: Vec<ScreenDefinition>) -> Result<Self> {
        let mut problems = Vec::new();
        let mut routes = HashSet::new();
        let mut titles = HashSet::new();

        for screen in &screens {
            if !routes.insert(screen.route.as_str()) {
                problems.push(format!("route '{}' is used by more than one screen", screen.route));
            }
            if !titles.insert(screen.title.as_str()) {
                problems.push(format!("title '{}' is used by more than one screen", screen.title));
            }
            if let Err(problem) = screen.priority() {
                problems.push(format!("screen '{}': {}", screen.route, problem));
            }
            if let Err(problem) = screen.security() {
                problems.push(format!("screen '{}': {}", screen.route, problem));
            }
            match interpreter.resolve(screen) {
                Ok(fields) => {
                    let mut seen = HashSet::new();
                    for field in &fields {
                        // "CActivity" and "Activity" name the same line, so compare resolved targets
                        if !seen.insert((field.via.as_deref(), field.descriptor.field_name.as_str())) {
                            problems.push(format!(
                                "screen '{}' lists '{}' / '{}' more than once",
                                screen.route, field.reference.entity_line_type, field.reference.field_name
                            ));
                        }
                    }
                }
                Err(err) => problems.push(err.to_string()),
            }
        }

        if !problems.is_empty() {
            return Err(EngineError::configuration(problems.join("; ")));
        }
        info!("Loaded {} screen definitions", screens.len());
        Ok(Self {
            interpreter,
            screens,
        })
    }

    pub fn from_store(interpreter: ScreenInterpreter, store: &dyn ScreenStore) -> Result<Self> {
        let screens = store.list().map_err(EngineError::Collaborator)?;
        Self::load(interpreter, screens)
    }

    pub fn get(&self, route: &str) -> Option<&ScreenDefinition> {
        self.screens.iter().find(|s| s.route == route)
    }

    pub fn screens(&self) -> &[ScreenDefinition] {
        &self.screens
    }

    /// Enabled screens the session may open, grouped by parent menu and ordered by
    /// numeric priority inside each group.
    pub fn menu(&self, session: &SessionContext) -> Vec<MenuEntry> {
        self.screens
            .iter()
            .filter(|s| s.enabled && Self::permits(s, session))
            .map(|s| MenuEntry {
                route: s.route.clone(),
                title: s.title.clone(),
                parent_menu: s.parent_menu.clone(),
                priority: s.priority().unwrap_or(f64::MAX),
            })
            .sorted_by(|a, b| {
                a.parent_menu
                    .cmp(&b.parent_menu)
                    .then(a.priority.total_cmp(&b.priority))
                    .then(a.title.cmp(&b.title))
            })
            .collect()
    }

    fn permits(screen: &ScreenDefinition, session: &SessionContext) -> bool {
        screen
            .security()
            .map(|predicate: SecurityPredicate| {
                predicate.permits(session.is_authenticated(), session.roles())
            })
            .unwrap_or(false)
    }

    /// Open the screen at `route` for `session`, resolving its fields once.
    pub fn open(&self, route: &str, session: &SessionContext) -> Result<ResolvedScreen> {
        let definition = self
            .get(route)
            .ok_or_else(|| EngineError::precondition(format!("There is no screen at '{}'.", route)))?;
        if !definition.enabled {
            return Err(EngineError::precondition(format!(
                "The screen '{}' is disabled.",
                definition.title
            )));
        }
        if !Self::permits(definition, session) {
            return Err(EngineError::precondition(format!(
                "You do not have access to '{}'.",
                definition.title
            )));
        }
        let fields = self.interpreter.resolve(definition)?;
        debug!(
            "Opened screen '{}' in {:?} layout",
            definition.route,
            session.layout_mode()
        );
        Ok(ResolvedScreen {
            definition: definition.clone(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserContext;

    fn interpreter() -> ScreenInterpreter {
        ScreenInterpreter::new(Arc::new(crate::seed::build_catalog().unwrap()))
    }

    fn activity_screen() -> ScreenDefinition {
        ScreenDefinition::new("activities", "Project.Activities", "CActivity")
            .with_field("CActivity", "name")
            .with_field("Project of Activity", "name")
            .with_field("CActivity", "progress")
    }

    #[test]
    fn test_related_line_resolves_to_target_descriptor() {
        let fields = interpreter().resolve(&activity_screen()).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].owner_type, "CActivity");
        assert_eq!(fields[1].owner_type, "CProject");
        assert_eq!(fields[1].via.as_deref(), Some("project"));
        assert_eq!(fields[1].descriptor.field_name, "name");
        assert_eq!(fields[1].descriptor.display_name, "Name");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let interpreter = interpreter();
        let screen = activity_screen();
        assert_eq!(
            interpreter.resolve(&screen).unwrap(),
            interpreter.resolve(&screen).unwrap()
        );
    }

    #[test]
    fn test_unresolvable_lines_fail_with_configuration_error() {
        let interpreter = interpreter();
        let bad_hop = activity_screen().with_field("Budget of Activity", "amount");
        let err = interpreter.resolve(&bad_hop).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("Budget of Activity"));

        let bad_field = activity_screen().with_field("CActivity", "budget");
        assert!(matches!(interpreter.resolve(&bad_field), Err(EngineError::Configuration(_))));

        let bad_type = ScreenDefinition::new("x", "X", "CBudget");
        assert!(matches!(interpreter.resolve(&bad_type), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_registry_rejects_duplicates_and_bad_priority_at_load() {
        let screens = vec![
            activity_screen(),
            ScreenDefinition::new("activities", "Project.Other", "CActivity"),
            ScreenDefinition::new("risks", "Project.Activities", "CRisk").with_priority("high"),
        ];
        let err = ScreenRegistry::load(interpreter(), screens).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("route 'activities'"));
        assert!(message.contains("title 'Project.Activities'"));
        assert!(message.contains("'high' is not a decimal"));
    }

    #[test]
    fn test_registry_rejects_repeated_field_lines() {
        let repeated = activity_screen().with_field("Activity", "name");
        let err = ScreenRegistry::load(interpreter(), vec![repeated]).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("'Activity' / 'name' more than once"));

        // The same field name on a related line is a different column
        let related = ScreenDefinition::new("activities", "Project.Activities", "CActivity")
            .with_field("CActivity", "name")
            .with_field("Project of Activity", "name");
        assert!(ScreenRegistry::load(interpreter(), vec![related]).is_ok());
    }

    #[test]
    fn test_open_checks_enabled_and_security() {
        let registry = ScreenRegistry::load(
            interpreter(),
            vec![
                activity_screen(),
                ScreenDefinition::new("admin-users", "Setup.Users", "CUser")
                    .with_field("CUser", "login")
                    .with_security("RolesAllowed(ADMIN)"),
                ScreenDefinition::new("old", "Setup.Old", "CCompany").disabled(),
            ],
        )
        .unwrap();

        let member = SessionContext::for_user(UserContext::new("bob").with_roles(&["USER"]));
        let admin = SessionContext::for_user(UserContext::new("ada").with_roles(&["ADMIN"]));

        let screen = registry.open("activities", &member).unwrap();
        assert_eq!(screen.fields().len(), 3);
        assert_eq!(screen.base_descriptors().len(), 2);
        assert_eq!(screen.base_descriptors()[1].order, 1);

        assert!(matches!(registry.open("admin-users", &member), Err(EngineError::Precondition(_))));
        assert!(registry.open("admin-users", &admin).is_ok());
        assert!(matches!(registry.open("old", &admin), Err(EngineError::Precondition(_))));
        assert!(matches!(registry.open("nowhere", &admin), Err(EngineError::Precondition(_))));
        assert!(matches!(
            registry.open("activities", &SessionContext::anonymous()),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn test_menu_groups_by_parent_then_priority() {
        let registry = ScreenRegistry::load(
            interpreter(),
            vec![
                ScreenDefinition::new("risks", "Project.Risks", "CRisk").with_priority("2"),
                ScreenDefinition::new("meetings", "Project.Meetings", "CMeeting").with_priority("1.5"),
                ScreenDefinition::new("companies", "Admin.Companies", "CCompany"),
                ScreenDefinition::new("old", "Admin.Old", "CCompany").disabled(),
            ],
        )
        .unwrap();
        let session = SessionContext::for_user(UserContext::new("ada"));
        let routes: Vec<String> = registry.menu(&session).into_iter().map(|m| m.route).collect();
        assert_eq!(routes, vec!["companies", "meetings", "risks"]);
    }
}

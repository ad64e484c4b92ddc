use log::info;
use std::sync::Arc;

use crate::domain::{
    Activity, Company, Meeting, Project, Risk, User, UserCompanySettings, UserProjectSettings,
};
use crate::error::Result;
use crate::logic::catalog::{LookupProvider, LookupRegistry, MetadataCatalog};
use crate::logic::grid::{EntityReaders, StoreReader};
use crate::model::{Entity, EntityRef, ScreenDefinition};
use crate::store::{EntityStore, MasterSide, MembershipService, MemoryStore, RelationService};

/// Catalog holding every demo entity type.
pub fn build_catalog() -> Result<MetadataCatalog> {
    MetadataCatalog::builder()
        .register::<Project>()
        .register::<Activity>()
        .register::<Meeting>()
        .register::<Risk>()
        .register::<User>()
        .register::<Company>()
        .register::<UserProjectSettings>()
        .register::<UserCompanySettings>()
        .build()
}

/// Screens shipped with the application before an administrator edits them.
pub fn default_screens() -> Vec<ScreenDefinition> {
    vec![
        ScreenDefinition::new("projects", "Project.Projects", Project::ENTITY_TYPE)
            .with_field(Project::ENTITY_TYPE, "name")
            .with_field(Project::ENTITY_TYPE, "description")
            .with_field(Project::ENTITY_TYPE, "active")
            .with_field(Project::ENTITY_TYPE, "start_date"),
        ScreenDefinition::new("activities", "Project.Activities", Activity::ENTITY_TYPE)
            .with_priority("2")
            .with_field(Activity::ENTITY_TYPE, "name")
            .with_field("Project of Activity", "name")
            .with_field(Activity::ENTITY_TYPE, "assigned_to")
            .with_field(Activity::ENTITY_TYPE, "progress")
            .with_field(Activity::ENTITY_TYPE, "due_date"),
        ScreenDefinition::new("meetings", "Project.Meetings", Meeting::ENTITY_TYPE)
            .with_priority("3")
            .with_field(Meeting::ENTITY_TYPE, "name")
            .with_field(Meeting::ENTITY_TYPE, "meeting_date")
            .with_field("Project of Meeting", "name")
            .with_field(Meeting::ENTITY_TYPE, "participants"),
        ScreenDefinition::new("risks", "Project.Risks", Risk::ENTITY_TYPE)
            .with_priority("4")
            .with_field(Risk::ENTITY_TYPE, "name")
            .with_field(Risk::ENTITY_TYPE, "severity")
            .with_field(Risk::ENTITY_TYPE, "probability")
            .with_field("Project of Risk", "name"),
        ScreenDefinition::new("users", "Setup.Users", User::ENTITY_TYPE)
            .with_security("RolesAllowed(ADMIN)")
            .with_field(User::ENTITY_TYPE, "login")
            .with_field(User::ENTITY_TYPE, "name")
            .with_field(User::ENTITY_TYPE, "email")
            .with_field("Company of User", "name"),
        ScreenDefinition::new("companies", "Setup.Companies", Company::ENTITY_TYPE)
            .with_security("RolesAllowed(ADMIN)")
            .with_priority("2")
            .with_field(Company::ENTITY_TYPE, "name")
            .with_field(Company::ENTITY_TYPE, "description")
            .with_field(Company::ENTITY_TYPE, "enabled"),
    ]
}

/// Options for a lookup field: every stored entity of `E`.
fn store_lookup<E: Entity>(store: Arc<MemoryStore<E>>) -> Arc<dyn LookupProvider> {
    Arc::new(move || -> anyhow::Result<Vec<EntityRef>> {
        Ok(store.list()?.iter().filter_map(Entity::to_ref).collect())
    })
}

/// In-memory stores for the demo domain, shared by lookups, grids and controllers.
#[derive(Default)]
pub struct DemoStores {
    pub projects: Arc<MemoryStore<Project>>,
    pub activities: Arc<MemoryStore<Activity>>,
    pub meetings: Arc<MemoryStore<Meeting>>,
    pub risks: Arc<MemoryStore<Risk>>,
    pub users: Arc<MemoryStore<User>>,
    pub companies: Arc<MemoryStore<Company>>,
    pub project_settings: Arc<MemoryStore<UserProjectSettings>>,
    pub company_settings: Arc<MemoryStore<UserCompanySettings>>,
}

impl DemoStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers named by the `lookup_provider_ref` of the demo descriptors.
    pub fn lookups(&self) -> LookupRegistry {
        let mut lookups = LookupRegistry::new();
        lookups.register("projectService", store_lookup(self.projects.clone()));
        lookups.register("userService", store_lookup(self.users.clone()));
        lookups.register("companyService", store_lookup(self.companies.clone()));
        lookups
    }

    /// Readers for the types that screens reach through one relationship hop.
    pub fn readers(&self) -> EntityReaders {
        let projects: Arc<dyn EntityStore<Project>> = self.projects.clone();
        let users: Arc<dyn EntityStore<User>> = self.users.clone();
        let companies: Arc<dyn EntityStore<Company>> = self.companies.clone();

        let mut readers = EntityReaders::new();
        readers.register(Project::ENTITY_TYPE, Arc::new(StoreReader::new(projects)));
        readers.register(User::ENTITY_TYPE, Arc::new(StoreReader::new(users)));
        readers.register(Company::ENTITY_TYPE, Arc::new(StoreReader::new(companies)));
        readers
    }

    /// Project memberships as seen from the project side.
    pub fn project_members(&self) -> MembershipService<UserProjectSettings> {
        MembershipService::new(self.project_settings.clone(), MasterSide::Target)
    }

    /// Company memberships as seen from the company side.
    pub fn company_members(&self) -> MembershipService<UserCompanySettings> {
        MembershipService::new(self.company_settings.clone(), MasterSide::Target)
    }

    /// Populate the stores with a small sample organisation.
    pub fn load_sample_data(&self) -> Result<()> {
        let acme = self.companies.save(Company::new("Acme"))?;
        let acme_ref = acme.to_ref();

        let mut ada = User::new("ada", "Ada Lovelace");
        ada.email = "ada@acme.test".to_string();
        ada.company = acme_ref.clone();
        let ada = self.users.save(ada)?;

        let mut grace = User::new("grace", "Grace Hopper");
        grace.company = acme_ref.clone();
        let grace = self.users.save(grace)?;

        let mut apollo = Project::new("Apollo");
        apollo.description = "Moon landing programme".to_string();
        let apollo = self.projects.save(apollo)?;

        let mut countdown = Activity::new("Countdown checklist");
        countdown.project = apollo.to_ref();
        countdown.assigned_to = ada.to_ref();
        countdown.progress = Some(40.0);
        self.activities.save(countdown)?;

        let mut kickoff = Meeting::new("Kickoff");
        kickoff.project = apollo.to_ref();
        kickoff.participants = Some(ada.to_ref().into_iter().chain(grace.to_ref()).collect());
        self.meetings.save(kickoff)?;

        let mut weather = Risk::new("Launch weather");
        weather.project = apollo.to_ref();
        weather.severity = "HIGH".to_string();
        weather.probability = Some(0.3);
        self.risks.save(weather)?;

        if let (Some(ada), Some(grace), Some(apollo), Some(acme)) =
            (ada.to_ref(), grace.to_ref(), apollo.to_ref(), acme_ref)
        {
            let members = self.project_members();
            members.attach(UserProjectSettings::link(ada.clone(), apollo.clone(), "OWNER"))?;
            members.attach(UserProjectSettings::link(grace.clone(), apollo, "MEMBER"))?;
            self.company_members()
                .attach(UserCompanySettings::link(ada, acme, "OWNER"))?;
        }

        info!(
            "Loaded sample data: {} projects, {} users, {} memberships",
            self.projects.len(),
            self.users.len(),
            self.project_settings.len()
        );
        Ok(())
    }
}

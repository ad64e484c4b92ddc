use anyhow::{Context, Result};
use log::info;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::model::ScreenDefinition;
use crate::store::traits::ScreenStore;

/// Screen definitions held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryScreenStore {
    screens: RwLock<Vec<ScreenDefinition>>,
}

impl MemoryScreenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screens(screens: Vec<ScreenDefinition>) -> Self {
        Self {
            screens: RwLock::new(screens),
        }
    }
}

impl ScreenStore for MemoryScreenStore {
    fn list(&self) -> Result<Vec<ScreenDefinition>> {
        Ok(self.screens.read().clone())
    }

    fn get(&self, route: &str) -> Result<Option<ScreenDefinition>> {
        Ok(self.screens.read().iter().find(|s| s.route == route).cloned())
    }

    fn upsert(&self, screen: ScreenDefinition) -> Result<()> {
        let mut screens = self.screens.write();
        match screens.iter_mut().find(|s| s.route == screen.route) {
            Some(existing) => *existing = screen,
            None => screens.push(screen),
        }
        Ok(())
    }

    fn delete(&self, route: &str) -> Result<bool> {
        let mut screens = self.screens.write();
        let before = screens.len();
        screens.retain(|s| s.route != route);
        Ok(screens.len() != before)
    }
}

/// Screen definitions persisted as a JSON array in a single file.
///
/// A missing file reads as an empty list; every write rewrites the whole file.
#[derive(Debug, Clone)]
pub struct JsonScreenFile {
    path: PathBuf,
}

impl JsonScreenFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<ScreenDefinition>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read screen definitions from {}", self.path.display()))?;
        let screens: Vec<ScreenDefinition> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse screen definitions in {}", self.path.display()))?;
        info!("Read {} screen definitions from {}", screens.len(), self.path.display());
        Ok(screens)
    }

    pub fn save(&self, screens: &[ScreenDefinition]) -> Result<()> {
        let content = serde_json::to_string_pretty(screens)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write screen definitions to {}", self.path.display()))?;
        Ok(())
    }
}

impl ScreenStore for JsonScreenFile {
    fn list(&self) -> Result<Vec<ScreenDefinition>> {
        self.load()
    }

    fn get(&self, route: &str) -> Result<Option<ScreenDefinition>> {
        Ok(self.load()?.into_iter().find(|s| s.route == route))
    }

    fn upsert(&self, screen: ScreenDefinition) -> Result<()> {
        let mut screens = self.load()?;
        match screens.iter_mut().find(|s| s.route == screen.route) {
            Some(existing) => *existing = screen,
            None => screens.push(screen),
        }
        self.save(&screens)
    }

    fn delete(&self, route: &str) -> Result<bool> {
        let mut screens = self.load()?;
        let before = screens.len();
        screens.retain(|s| s.route != route);
        if screens.len() == before {
            return Ok(false);
        }
        self.save(&screens)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn risks() -> ScreenDefinition {
        ScreenDefinition::new("project-risks", "Project.Risks", "CRisk")
            .with_field("CRisk", "name")
            .with_field("Project of Risk", "name")
    }

    #[test]
    fn test_memory_store_upsert_replaces_by_route() {
        let store = MemoryScreenStore::new();
        store.upsert(risks()).unwrap();
        store.upsert(risks().with_priority("3")).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.get("project-risks").unwrap().unwrap().order_priority, "3");
        assert!(store.delete("project-risks").unwrap());
        assert!(!store.delete("project-risks").unwrap());
    }

    #[test]
    fn test_json_file_missing_reads_empty() {
        let dir = tempdir().unwrap();
        let file = JsonScreenFile::new(dir.path().join("screens.json"));
        assert!(file.list().unwrap().is_empty());
    }

    #[test]
    fn test_json_file_persists_definitions() {
        let dir = tempdir().unwrap();
        let file = JsonScreenFile::new(dir.path().join("screens.json"));
        file.upsert(risks()).unwrap();
        file.upsert(ScreenDefinition::new("companies", "Admin.Companies", "CCompany")).unwrap();

        let reopened = JsonScreenFile::new(file.path());
        let screens = reopened.list().unwrap();
        assert_eq!(screens.len(), 2);
        assert_eq!(screens[0], risks());

        assert!(reopened.delete("companies").unwrap());
        assert_eq!(file.list().unwrap().len(), 1);
    }

    #[test]
    fn test_json_file_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("screens.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonScreenFile::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse screen definitions"));
    }
}

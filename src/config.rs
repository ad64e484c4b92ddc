use serde::{Deserialize, Serialize};

use crate::logic::grid::PresentationRules;
use crate::model::LayoutMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub screens: ScreensConfig,
    pub presentation: PresentationConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreensConfig {
    /// JSON file holding the screen definitions; the seeded screens are used when unset
    pub definitions_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationConfig {
    pub truncate_at: usize,
    pub date_format: String,
    pub datetime_format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub default_layout: LayoutMode,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        let rules = PresentationRules::default();
        Self {
            truncate_at: rules.truncate_at,
            date_format: rules.date_format,
            datetime_format: rules.datetime_format,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `pm-admin` file and `PMA_` environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("pm-admin").required(false));

        // Environment variables like PMA_PRESENTATION__TRUNCATE_AT
        config = config.add_source(
            config::Environment::with_prefix("PMA")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Rules the grid compiler formats cells with
    pub fn presentation_rules(&self) -> PresentationRules {
        PresentationRules {
            truncate_at: self.presentation.truncate_at,
            date_format: self.presentation.date_format.clone(),
            datetime_format: self.presentation.datetime_format.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_presentation_rules() {
        let config = AppConfig::default();
        assert_eq!(config.presentation_rules(), PresentationRules::default());
        assert_eq!(config.session.default_layout, LayoutMode::Vertical);
        assert!(config.screens.definitions_path.is_none());
    }

    #[test]
    fn test_layout_reads_lowercase_names() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "screens": {"definitions_path": "screens.json"},
                "presentation": {"truncate_at": 20, "date_format": "%Y-%m-%d", "datetime_format": "%Y-%m-%d %H:%M"},
                "session": {"default_layout": "horizontal"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.session.default_layout, LayoutMode::Horizontal);
        assert_eq!(config.presentation_rules().truncate_at, 20);
        assert_eq!(config.screens.definitions_path.as_deref(), Some("screens.json"));
    }
}

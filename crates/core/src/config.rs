use std::path::Path;

use serde::Deserialize;

use crate::error::CoreResult;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CRM_JOURNEY__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub journey: JourneyConfig,
}

// ─── Journey Config ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct JourneyConfig {
    /// How long an inverse command stays available for undo.
    #[serde(default = "default_undo_window_secs")]
    pub undo_window_secs: u64,
    #[serde(default = "default_undo_capacity")]
    pub undo_capacity: usize,
    /// Action type recorded in a contact's action log when a journey finishes.
    #[serde(default = "default_journey_finished_action")]
    pub journey_finished_action: String,
    #[serde(default = "default_strict_priorities")]
    pub strict_priorities: bool,
}

fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_undo_window_secs() -> u64 {
    10
}
fn default_undo_capacity() -> usize {
    20
}
fn default_journey_finished_action() -> String {
    "journey_finished".to_string()
}
fn default_strict_priorities() -> bool {
    true
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            undo_window_secs: default_undo_window_secs(),
            undo_capacity: default_undo_capacity(),
            journey_finished_action: default_journey_finished_action(),
            strict_priorities: default_strict_priorities(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            journey: JourneyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional config file overlaid with
    /// environment variables. Environment wins over the file.
    pub fn load_from(path: Option<&Path>) -> CoreResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CRM_JOURNEY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.node_id, "node-01");
        assert_eq!(config.journey.undo_window_secs, 10);
        assert_eq!(config.journey.undo_capacity, 20);
        assert_eq!(config.journey.journey_finished_action, "journey_finished");
        assert!(config.journey.strict_priorities);
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"journey": {"undo_capacity": 3}}"#).unwrap();
        assert_eq!(config.journey.undo_capacity, 3);
        assert_eq!(config.journey.undo_window_secs, 10);
        assert_eq!(config.node_id, "node-01");
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("crm-core-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("journey.toml");
        std::fs::write(
            &path,
            "node_id = \"edge-7\"\n[journey]\nundo_window_secs = 30\nstrict_priorities = false\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.node_id, "edge-7");
        assert_eq!(config.journey.undo_window_secs, 30);
        assert!(!config.journey.strict_priorities);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

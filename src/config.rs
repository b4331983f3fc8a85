//! Configuration loading and management
//!
//! Handles parsing of `.tasktracker/config.json`. The file belongs to the
//! wider tool; the store only reads the value sets it validates against and
//! a few storage knobs. Unknown keys are ignored.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atomic;
use crate::error::{Error, Result};
use crate::storage::{CONFIG_FILE, DATA_DIR};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Allowed task categories
    #[serde(default = "default_categories")]
    pub task_categories: Vec<String>,

    /// Allowed task statuses
    #[serde(default = "default_statuses")]
    pub task_statuses: Vec<String>,

    /// Allowed priority levels
    #[serde(default = "default_priorities")]
    pub priority_levels: Vec<String>,

    /// Allowed effort estimates
    #[serde(default = "default_efforts")]
    pub effort_estimation: Vec<String>,

    /// Status given to new tasks
    #[serde(default = "default_status")]
    pub default_status: String,

    /// Priority given to new tasks
    #[serde(default = "default_priority")]
    pub default_priority: String,

    /// Category given to new tasks
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Related-file extensions that are refused (without the dot)
    #[serde(default = "default_disallowed_extensions")]
    pub disallowed_file_extensions: Vec<String>,

    /// Freshness window for cached reads, in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn default_categories() -> Vec<String> {
    strings(&["feature", "bugfix", "refactor", "docs", "test", "chore"])
}

fn default_statuses() -> Vec<String> {
    strings(&["todo", "in-progress", "review", "done"])
}

fn default_priorities() -> Vec<String> {
    strings(&["p1-critical", "p2-medium", "p3-low"])
}

fn default_efforts() -> Vec<String> {
    strings(&["1-trivial", "2-small", "3-medium", "5-large", "8-xlarge"])
}

fn default_status() -> String {
    "todo".to_string()
}

fn default_priority() -> String {
    "p2-medium".to_string()
}

fn default_category() -> String {
    "feature".to_string()
}

fn default_disallowed_extensions() -> Vec<String> {
    strings(&["exe", "dll", "so", "dylib", "bin", "bat", "cmd", "com"])
}

fn default_cache_ttl_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            task_categories: default_categories(),
            task_statuses: default_statuses(),
            priority_levels: default_priorities(),
            effort_estimation: default_efforts(),
            default_status: default_status(),
            default_priority: default_priority(),
            default_category: default_category(),
            disallowed_file_extensions: default_disallowed_extensions(),
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `config.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(DATA_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file (atomic)
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_vec_pretty(self)?;
        content.push(b'\n');
        atomic::write_atomic(path, &content)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    fn validate(&self) -> Result<()> {
        let categories = validate_set("taskCategories", &self.task_categories)?;
        let statuses = validate_set("taskStatuses", &self.task_statuses)?;
        let priorities = validate_set("priorityLevels", &self.priority_levels)?;
        validate_set("effortEstimation", &self.effort_estimation)?;

        validate_default("defaultStatus", &self.default_status, &statuses, "taskStatuses")?;
        validate_default(
            "defaultPriority",
            &self.default_priority,
            &priorities,
            "priorityLevels",
        )?;
        validate_default(
            "defaultCategory",
            &self.default_category,
            &categories,
            "taskCategories",
        )?;

        for ext in &self.disallowed_file_extensions {
            let trimmed = ext.trim().trim_start_matches('.');
            if trimmed.is_empty() {
                return Err(Error::InvalidConfig(
                    "disallowedFileExtensions cannot include empty entries".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn validate_set<'a>(field: &str, values: &'a [String]) -> Result<HashSet<&'a str>> {
    if values.is_empty() {
        return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
    }

    let mut seen = HashSet::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{field} cannot include empty entries"
            )));
        }
        if !seen.insert(trimmed) {
            return Err(Error::InvalidConfig(format!(
                "{field} has duplicate entry '{trimmed}'"
            )));
        }
    }
    Ok(seen)
}

fn validate_default(
    field: &str,
    value: &str,
    allowed: &HashSet<&str>,
    set_name: &str,
) -> Result<()> {
    if allowed.contains(value.trim()) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{field} '{value}' not in {set_name}"
        )))
    }
}

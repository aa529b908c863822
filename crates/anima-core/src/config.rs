use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the anima runtime.
///
/// Loaded from `~/.anima/config.toml` by default. Each section corresponds
/// to a subsystem or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub components: ComponentsConfig,
}

impl AnimaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnimaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for notes, staged commands, etc.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.anima/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Action pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum correction rounds per model turn before the turn is abandoned.
    pub correction_budget: u32,
    /// Last-resort target interface when resolution rules 1-3 all fail.
    /// Unset means an unresolved target becomes a validation error.
    pub default_interface: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            correction_budget: 3,
            default_interface: None,
        }
    }
}

/// Per-component enable flags for the bundled components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsConfig {
    /// Console interface (send_text / send_file to the local terminal).
    pub console: bool,
    /// Scheduled-event provider (schedule_event / cancel_event).
    pub reminders: bool,
    /// Shell command provider. Commands are staged, never auto-executed.
    pub shell: bool,
    /// Quick-note provider (save_note).
    pub notes: bool,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            console: true,
            reminders: true,
            shell: false,
            notes: true,
        }
    }
}

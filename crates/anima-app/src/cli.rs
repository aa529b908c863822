//! CLI argument definitions for the anima binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// anima — a persona-hosting agent runtime's action pipeline.
#[derive(Parser, Debug)]
#[command(name = "anima", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Last-resort target interface for requests that omit one.
    #[arg(long = "default-interface")]
    pub default_interface: Option<String>,

    /// Offline mode: a file whose first `---`-separated block is the model
    /// reply for one turn and whose remaining blocks are queued as
    /// correction replies.
    #[arg(short = 's', long = "script")]
    pub script: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ANIMA_CONFIG env var > ~/.anima/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ANIMA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > ANIMA_LOG env var > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(level) = std::env::var("ANIMA_LOG") {
            return level;
        }
        config_level.to_string()
    }

    /// Resolve the default interface.
    ///
    /// Priority: --default-interface flag > config file value.
    pub fn resolve_default_interface(&self, config_value: Option<&str>) -> Option<String> {
        self.default_interface
            .clone()
            .or_else(|| config_value.map(str::to_string))
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".anima").join("config.toml");
    }
    PathBuf::from("config.toml")
}

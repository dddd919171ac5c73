//! Configuration management for fxrack
//!
//! This module provides:
//! - Configuration structs for the rack layout and application settings
//! - TOML serialization of the configuration file
//! - `ConfigManager` for the main config file with factory-default fallback
//! - `StateStore` for the saved rack document

use crate::domain::document::{DocumentFormat, RackDocument};
use crate::domain::soft_takeover::DEFAULT_TAKEOVER_THRESHOLD;
use crate::domain::MAX_PARAMETER_SLOTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Document error: {0}")]
    Document(#[from] crate::domain::document::DocumentError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Saved rack state, relative paths resolve against the config directory
    pub state_file: PathBuf,

    /// Write the rack state back when the console exits
    pub auto_save_on_exit: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("rack.toml"),
            auto_save_on_exit: true,
        }
    }
}

/// Layout and behavior of the effect rack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RackConfig {
    /// Number of effect chains (units)
    pub chains: usize,

    /// Effect slots per chain
    pub slots_per_chain: usize,

    /// Parameter slots active when an effect slot is created
    pub initial_parameter_slots: usize,

    /// Normalized distance beyond which an unforced write counts as a jump
    pub soft_takeover_threshold: f64,
}

impl Default for RackConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            slots_per_chain: 3,
            initial_parameter_slots: MAX_PARAMETER_SLOTS,
            soft_takeover_threshold: DEFAULT_TAKEOVER_THRESHOLD,
        }
    }
}

impl RackConfig {
    /// Correct out-of-range settings, logging each correction
    pub fn validated(mut self) -> Self {
        if self.chains == 0 {
            warn!("Rack needs at least one chain, using 1");
            self.chains = 1;
        }
        if self.slots_per_chain == 0 {
            warn!("Chains need at least one slot, using 1");
            self.slots_per_chain = 1;
        }
        if self.initial_parameter_slots > MAX_PARAMETER_SLOTS {
            warn!(
                requested = self.initial_parameter_slots,
                max = MAX_PARAMETER_SLOTS,
                "Too many initial parameter slots"
            );
            self.initial_parameter_slots = MAX_PARAMETER_SLOTS;
        }
        if !self.soft_takeover_threshold.is_finite() || self.soft_takeover_threshold < 0.0 {
            warn!(
                threshold = self.soft_takeover_threshold,
                "Invalid soft takeover threshold, using default"
            );
            self.soft_takeover_threshold = DEFAULT_TAKEOVER_THRESHOLD;
        }
        self
    }
}

/// Complete fxrack configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FxRackConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub rack: RackConfig,
}

impl FxRackConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let mut config: Self = toml::from_str(&contents)?;
        config.rack = config.rack.validated();

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }
}

/// Configuration manager for the main fxrack config
///
/// Manages the configuration file at `~/.config/fxrack/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Use an explicit config file; its directory becomes the config directory
    pub fn with_file(config_path: PathBuf) -> Self {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/fxrack` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("fxrack"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Resolve a path from the configuration against the config directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns the factory default.
    /// If the config file is corrupt, backs it up and returns the factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> FxRackConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = FxRackConfig::factory_default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }
            return config;
        }

        match FxRackConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                FxRackConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &FxRackConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    /// Delete the config file
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(path = %self.config_path.display(), "Configuration cleared");
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

/// Saved rack state on disk
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved rack document.
    ///
    /// A missing file is `None`. An unreadable or malformed file is logged
    /// and also `None`: there is simply nothing to restore.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<RackDocument> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No saved rack state");
            return None;
        }
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read rack state");
                return None;
            }
        };
        match DocumentFormat::Toml.parse(&contents) {
            Ok(document) => {
                info!(path = %self.path.display(), "Rack state loaded");
                Some(document)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed rack state");
                None
            }
        }
    }

    #[instrument(skip(self, document))]
    pub async fn save(&self, document: &RackDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let text = DocumentFormat::Toml.render(document)?;
        fs::write(&self.path, text).await?;
        info!(path = %self.path.display(), "Rack state saved");
        Ok(())
    }
}

use crate::Error;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which periodic notification drives expiry checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryMode {
    /// Check every connected, live player on each server tick
    #[default]
    Tick,
    /// Check a player whenever the host reports a state update for them
    PlayerUpdate,
}

/// Plugin configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Flag definition list, e.g. `WG=15;ST=0;GM=30`
    pub flags: String,
    /// Periodic notification used for expiry checks
    pub expiry: ExpiryMode,
    /// Only arm the expiry timer when the host confirms the grant
    pub strict_grants: bool,
    /// Seed for the random flag choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Configuration file path
    #[serde(skip)]
    pub path: Option<String>,
}

impl PluginConfig {
    /// Configuration with default options for a raw definition list
    pub fn from_flags(flags: impl Into<String>) -> Self {
        Self {
            flags: flags.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()
            .map_err(|e| Error::Config(format!("Failed to load config: {}", e)))?;

        let mut plugin_config: Self = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;
        plugin_config.path = Some(path.to_string_lossy().to_string());

        Ok(plugin_config)
    }

    /// Resolve the string a plugin is loaded with.
    ///
    /// A `.toml` path is read as a configuration file; anything else is the
    /// flag definition list itself.
    pub fn from_init(init: &str) -> Result<Self, Error> {
        let trimmed = init.trim();
        let path = Path::new(trimmed);

        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_file(path)
        } else {
            Ok(Self::from_flags(init))
        }
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string(self).map_err(|e| Error::Config(format!("Failed to convert to TOML: {}", e)))
    }
}

//! Exporter configuration.
//!
//! The hardware description is a TOML file, optionally overridden by
//! `GPIO_EXPORT_`-prefixed environment variables (`__` separates nested
//! keys, e.g. `GPIO_EXPORT_EXPORT__ALIAS=board`).
//!
//! ```toml
//! [export]
//! class = "xbrother"
//! root = "gpio"
//! alias = "board"
//!
//! [sysfs]
//! root = "/sys"
//! namespace = "/run/gpio-export"
//!
//! [[lines]]
//! label = "led1"
//! gpios = { chip = "gpiochip0", offset = 17 }
//! direction = "low"
//! direction_may_change = true
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gpio_export::config::load_config;
//!
//! let config = load_config(Path::new("/etc/gpio-export.toml"))?;
//! let specs = config.specification_set();
//! ```

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use gpio_export_core::{LineDeclaration, LineProvider, LineSpecificationSet, NamespacePublisher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{Exporter, DEFAULT_CLASS, DEFAULT_ROOT};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "GPIO_EXPORT_";

/// Error types for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Parse error (invalid TOML or wrong types)
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Group naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSection {
    /// Class the group is registered under
    #[serde(default = "default_class")]
    pub class: String,

    /// Name of the group root node
    #[serde(default = "default_root")]
    pub root: String,

    /// Alias linked to the root node; the engine default when absent
    #[serde(default)]
    pub alias: Option<String>,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            class: default_class(),
            root: default_root(),
            alias: None,
        }
    }
}

/// Locations used by the sysfs collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysfsSection {
    /// Mount point of sysfs
    #[serde(default = "default_sysfs_root")]
    pub root: PathBuf,

    /// Directory the published namespace lives in
    #[serde(default = "default_namespace")]
    pub namespace: PathBuf,
}

impl Default for SysfsSection {
    fn default() -> Self {
        Self {
            root: default_sysfs_root(),
            namespace: default_namespace(),
        }
    }
}

/// Full exporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Group naming
    #[serde(default)]
    pub export: ExportSection,

    /// Sysfs locations
    #[serde(default)]
    pub sysfs: SysfsSection,

    /// Line declarations, in export order
    #[serde(default)]
    pub lines: Vec<LineDeclaration>,
}

fn default_class() -> String {
    DEFAULT_CLASS.to_string()
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys")
}

fn default_namespace() -> PathBuf {
    PathBuf::from("/run/gpio-export")
}

impl ExportConfig {
    /// Parse configuration from a TOML string (no environment overrides).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| ConfigLoadError::ParseError(e.to_string()).into())
    }

    /// Decode the line declarations into a specification set.
    pub fn specification_set(&self) -> LineSpecificationSet {
        LineSpecificationSet::decode(&self.lines)
    }

    /// Build an exporter using the configured class and root names.
    pub fn exporter(
        &self,
        provider: Arc<dyn LineProvider>,
        publisher: Arc<dyn NamespacePublisher>,
    ) -> Exporter {
        Exporter::new(provider, publisher)
            .with_class(&self.export.class)
            .with_root(&self.export.root)
    }
}

/// Load the configuration from `path`, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<ExportConfig> {
    if !path.exists() {
        return Err(ConfigLoadError::NotFound(path.display().to_string()).into());
    }

    debug!("Loading export config from: {}", path.display());

    let config: ExportConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigLoadError::ParseError(e.to_string()))
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;

    info!(
        "Loaded export config: {} line declaration(s), class '{}'",
        config.lines.len(),
        config.export.class
    );

    Ok(config)
}

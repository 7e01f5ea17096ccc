//! Tool configuration helpers.
//!
//! Loads, validates, and writes the JSON config naming the NCO programs and
//! the attribute labels the fixes write.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current schema version for the ncfix config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "NCFIX_CONFIG";

/// Program names (or paths) of the external NCO tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPaths {
    pub ncatted: String,
    pub ncks: String,
    pub ncap2: String,
    pub ncpdq: String,
}

impl ToolPaths {
    /// (label, program) pairs in a stable order.
    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("ncatted", self.ncatted.as_str()),
            ("ncks", self.ncks.as_str()),
            ("ncap2", self.ncap2.as_str()),
            ("ncpdq", self.ncpdq.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NcfixConfig {
    pub schema_version: u32,
    pub tools: ToolPaths,
    #[serde(default = "default_history_attribute")]
    pub history_attribute: String,
    #[serde(default = "default_celsius_units")]
    pub celsius_units: String,
}

fn default_history_attribute() -> String {
    "history".to_string()
}

fn default_celsius_units() -> String {
    "degC".to_string()
}

/// Build the default config: NCO programs resolved on `PATH`.
pub fn default_config() -> NcfixConfig {
    NcfixConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        tools: ToolPaths {
            ncatted: "ncatted".to_string(),
            ncks: "ncks".to_string(),
            ncap2: "ncap2".to_string(),
            ncpdq: "ncpdq".to_string(),
        },
        history_attribute: default_history_attribute(),
        celsius_units: default_celsius_units(),
    }
}

/// User-level config location, when the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ncfix").join("config.json"))
}

/// Resolve which config file applies: explicit flag > env var > user config.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = std::env::var_os(CONFIG_ENV) {
        if !value.is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    user_config_path().filter(|path| path.is_file())
}

/// Load and validate the effective config, falling back to defaults.
pub fn load_effective_config(explicit: Option<&Path>) -> Result<NcfixConfig> {
    let Some(path) = resolve_config_path(explicit) else {
        tracing::debug!("no config file; using defaults");
        return Ok(default_config());
    };
    let config = load_config(&path)?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<NcfixConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: NcfixConfig =
        serde_json::from_slice(&bytes).context("parse ncfix config JSON")?;
    Ok(config)
}

/// Persist a config in a stable JSON format, replacing any existing file atomically.
pub fn write_config(path: &Path, config: &NcfixConfig) -> Result<()> {
    let text = serde_json::to_string_pretty(config).context("serialize ncfix config")?;
    write_atomic(path, text.as_bytes())
}

pub fn validate_config(config: &NcfixConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported ncfix config schema_version {}",
            config.schema_version
        ));
    }
    for (label, program) in config.tools.entries() {
        if program.trim().is_empty() {
            return Err(anyhow!("tools.{label} must be non-empty"));
        }
    }
    if config.history_attribute.trim().is_empty() {
        return Err(anyhow!("history_attribute must be non-empty"));
    }
    if config.history_attribute.contains(',') {
        return Err(anyhow!(
            "history_attribute must not contain ',' (got {:?})",
            config.history_attribute
        ));
    }
    if config.celsius_units.trim().is_empty() {
        return Err(anyhow!("celsius_units must be non-empty"));
    }
    Ok(())
}

/// Write through a temp file in the destination directory, then rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

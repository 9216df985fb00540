//! User configuration stored under `<config_dir>/devkit/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "DEVKIT_CONFIG";

/// devkit configuration (TOML).
///
/// Edited by hand. Missing fields fall back to defaults so an absent or
/// partial file is always usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DevkitConfig {
    pub open: OpenConfig,
    pub setup: SetupConfig,
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OpenConfig {
    /// Directories scanned for projects. Relative entries resolve against the home directory.
    pub roots: Vec<PathBuf>,
    /// Editor program. Falls back to `$EDITOR`, then `code`.
    pub editor: Option<String>,
    /// Directory names never descended into.
    pub ignore: Vec<String>,
    /// Upper bound on threads scanning one directory level.
    pub scan_workers: usize,
    /// Projects whose named subfolders are listed as separate entries.
    pub expand: Vec<ExpandRule>,
}

impl Default for OpenConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("Developer")],
            editor: None,
            ignore: vec!["node_modules".to_string()],
            scan_workers: 8,
            expand: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpandRule {
    pub project: String,
    pub subfolders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupConfig {
    /// Stop the setup run at the first failed task.
    pub fail_fast: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self { fail_fast: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Truncate captured stdout/stderr of child processes beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            output_limit_bytes: 100_000,
        }
    }
}

impl DevkitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.open.roots.is_empty() {
            return Err(anyhow!("open.roots must list at least one directory"));
        }
        if self
            .open
            .editor
            .as_deref()
            .is_some_and(|editor| editor.trim().is_empty())
        {
            return Err(anyhow!("open.editor must not be empty"));
        }
        if self.open.scan_workers == 0 {
            return Err(anyhow!("open.scan_workers must be > 0"));
        }
        for rule in &self.open.expand {
            if rule.project.trim().is_empty() {
                return Err(anyhow!("open.expand.project must not be empty"));
            }
        }
        if self.process.output_limit_bytes == 0 {
            return Err(anyhow!("process.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// `<config_dir>/devkit/config.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("devkit").join("config.toml"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DevkitConfig::default()`.
pub fn load_config(path: &Path) -> Result<DevkitConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        let cfg = DevkitConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DevkitConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Load from `path` when given, else from the default location.
pub fn load_config_or_default(path: Option<&Path>) -> Result<DevkitConfig> {
    match path {
        Some(path) => load_config(path),
        None => match default_config_path() {
            Some(path) => load_config(&path),
            None => Ok(DevkitConfig::default()),
        },
    }
}

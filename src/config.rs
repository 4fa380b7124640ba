use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::migrations::MigrationTarget;

pub const ENV_DATABASE: &str = "CASEBOOK_DATABASE";
pub const ENV_CHECKPOINT: &str = "CASEBOOK_CHECKPOINT";
pub const ENV_PORT: &str = "CASEBOOK_PORT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasebookConfig {
    pub database: PathBuf,
    /// Last migration script allowed to be current; absent means latest and
    /// an empty string rolls everything back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    pub port: u16,
    pub migrate_on_start: bool,
}

impl Default for CasebookConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("casebook.db"),
            checkpoint: None,
            port: 3000,
            migrate_on_start: true,
        }
    }
}

impl CasebookConfig {
    pub fn target(&self) -> MigrationTarget {
        MigrationTarget::from_checkpoint(self.checkpoint.as_deref())
    }

    /// Apply `CASEBOOK_*` environment overrides
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(database) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(checkpoint) = lookup(ENV_CHECKPOINT) {
            self.checkpoint = Some(checkpoint);
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.is_empty()) {
            self.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", ENV_PORT, port, e))?;
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("casebook.toml")
}

pub fn read_config(path: &Path) -> anyhow::Result<Option<CasebookConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)?;
    let config: CasebookConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

/// Config file (or defaults) with environment overrides applied
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CasebookConfig> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut config = match read_config(&path)? {
        Some(config) => config,
        None if explicit => anyhow::bail!("config file not found: {}", path.display()),
        None => CasebookConfig::default(),
    };
    config.apply_env()?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

pub fn write_config(path: &Path, config: &CasebookConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::config::GravityConfig;
use crate::error::{GravityError, Result};

/// Environment variable that points the installer at a different config file
pub const CONFIG_ENV: &str = "GRAVITY_CONFIG";

const CONFIG_FILE_NAME: &str = "gravity.json";

/// Reads and writes the per-user config file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the config file: `$GRAVITY_CONFIG`, else `~/.config/gravity.json`.
    pub fn locate() -> Result<Self> {
        let from_env = env::var(CONFIG_ENV).ok();
        let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());

        resolve_config_path(from_env, home)
            .map(Self::new)
            .ok_or_else(|| GravityError::Config("Could not determine the home directory".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, creating the file (and its directory) with `{}` first
    /// if it does not exist yet.
    pub fn load_or_init(&self) -> Result<GravityConfig> {
        if !self.path.exists() {
            self.ensure_parent()?;
            fs::write(&self.path, "{}").map_err(|e| {
                GravityError::Config(format!("Failed to create {}: {}", self.path.display(), e))
            })?;
            log::debug!("Created empty config at {}", self.path.display());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            GravityError::Config(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|source| GravityError::ConfigParse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, config: &GravityConfig) -> Result<()> {
        self.ensure_parent()?;

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| GravityError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.path, json).map_err(|e| {
            GravityError::Config(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    /// Store a new license key and persist it right away.
    ///
    /// Returns the updated config; callers continue with the returned value.
    pub fn set_license_key(&self, config: GravityConfig, key: impl Into<String>) -> Result<GravityConfig> {
        let updated = config.with_license_key(key);
        self.save(&updated)?;
        log::debug!("Stored license key in {}", self.path.display());
        Ok(updated)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| GravityError::Config(format!("Failed to create directory: {}", e)))?;
        }
        Ok(())
    }
}

fn resolve_config_path(from_env: Option<String>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = from_env.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    home.map(|home| home.join(".config").join(CONFIG_FILE_NAME))
}

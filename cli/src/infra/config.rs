//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::{ENV_CONFIG, OpsConfig};

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
///
/// Environment overrides are read through an injectable lookup.
pub struct YamlConfigStore {
    lookup: EnvLookup,
}

impl YamlConfigStore {
    /// Reads overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<OpsConfig> {
        let path = self.path()?;
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            if content.trim().is_empty() {
                OpsConfig::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("cannot parse {}", path.display()))?
            }
        } else {
            OpsConfig::default()
        };
        config
            .apply_env(&self.lookup)
            .context("invalid environment override")?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(val) = (self.lookup)(ENV_CONFIG).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".opskit").join("config.yaml"))
    }
}

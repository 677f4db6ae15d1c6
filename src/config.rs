use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::identity::{
    IdentityPaths, IdentitySource, LookupPolicy, Provisioner, SystemLookup, DEFAULT_ACCOUNT,
};

/// remapping configuration stored in a toml file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// remapped root specification, e.g. "default" or "1000:1000"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remapped_root: Option<String>,
    /// account used when the remapped root is "default"
    #[serde(default = "default_account")]
    pub default_account: String,
    /// account whose uid stands in for root during tree translation
    #[serde(default = "default_account")]
    pub container_root_account: String,
    /// degrade to an identity mapping when the remapping account is missing
    #[serde(default)]
    pub best_effort_lookup: bool,
    /// identity file locations
    #[serde(default)]
    pub paths: IdentityPaths,
}

fn default_account() -> String {
    DEFAULT_ACCOUNT.to_string()
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    pub fn lookup_policy(&self) -> LookupPolicy {
        if self.best_effort_lookup {
            LookupPolicy::BestEffort
        } else {
            LookupPolicy::Strict
        }
    }

    /// identity source over the system account databases
    pub fn identity_source(&self) -> IdentitySource<SystemLookup> {
        IdentitySource::new(self.paths.clone(), SystemLookup)
            .with_provisioner(Provisioner::detect())
            .with_policy(self.lookup_policy())
            .with_default_account(self.default_account.clone())
            .with_container_root_account(self.container_root_account.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: IdentityPaths::default(),
            remapped_root: None,
            default_account: default_account(),
            container_root_account: default_account(),
            best_effort_lookup: false,
        }
    }
}

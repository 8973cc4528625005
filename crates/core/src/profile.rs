//! Drive profiles
//!
//! A profile is a named drive: the S3-compatible endpoint and credentials the
//! store client needs, plus the mount scope (pinned container, project id,
//! depth limit). Paths on the drive are written `<name>:/container/key`.
//! Profiles live in the configuration file.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::drive::MountOptions;
use crate::error::{Error, Result};
use crate::path;
use crate::transfer::TransferConfig;

/// A named drive backed by an S3-compatible endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveProfile {
    /// Unique name for this drive
    pub name: String,

    /// S3 endpoint URL
    pub endpoint: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    /// Restrict the drive to one container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Project or account id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,

    /// Maximum key depth below a container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl DriveProfile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            container: None,
            scope_id: None,
            max_depth: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Drive root used when resolving paths (`<name>:`)
    pub fn root(&self) -> String {
        format!("{}:", self.name)
    }

    /// Check the profile before it is stored
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\', ':']) {
            return Err(Error::Config(format!(
                "invalid drive name '{}'",
                self.name
            )));
        }
        url::Url::parse(&self.endpoint)?;
        if let Some(container) = &self.container {
            path::validate_name(container)?;
        }
        if !matches!(self.bucket_lookup.as_str(), "auto" | "path" | "dns") {
            return Err(Error::Config(format!(
                "bucket lookup must be auto, path or dns, got '{}'",
                self.bucket_lookup
            )));
        }
        Ok(())
    }

    /// Mount parameters for this drive
    pub fn mount_options(&self, transfer: TransferConfig) -> MountOptions {
        MountOptions {
            root: self.root(),
            container: self.container.clone(),
            scope_id: self.scope_id.clone(),
            max_depth: self.max_depth,
            transfer,
        }
    }
}

/// Manager for drive profiles stored in the configuration file
#[derive(Debug, Clone)]
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    /// List all configured drives
    pub fn list(&self) -> Result<Vec<DriveProfile>> {
        Ok(self.config_manager.load()?.drives)
    }

    /// Get a drive by name
    pub fn get(&self, name: &str) -> Result<DriveProfile> {
        self.config_manager
            .load()?
            .drives
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(format!("drive '{name}'")))
    }

    /// Add or replace a drive
    pub fn set(&self, profile: DriveProfile) -> Result<()> {
        profile.validate()?;
        let mut config = self.config_manager.load()?;
        config.drives.retain(|d| d.name != profile.name);
        config.drives.push(profile);
        self.config_manager.save(&config)
    }

    /// Remove a drive
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.drives.len();
        config.drives.retain(|d| d.name != name);
        if config.drives.len() == original_len {
            return Err(Error::NotFound(format!("drive '{name}'")));
        }
        self.config_manager.save(&config)
    }

    /// Check if a drive exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .config_manager
            .load()?
            .drives
            .iter()
            .any(|d| d.name == name))
    }
}

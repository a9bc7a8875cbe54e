//! VM configuration (`datacode.toml`)
//!
//! ```toml
//! search_paths = ["./modules", "/usr/lib/datacode"]
//! collision_policy = "replace"
//! use_env_path = true
//!
//! [abi_version]
//! major = 1
//! minor = 0
//! ```

use std::path::{Path, PathBuf};

use datacode_abi::{AbiVersion, DATACODE_ABI_VERSION};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::CollisionPolicy;
use crate::resolver::ModuleResolver;

/// Settings for a [`crate::NativeVm`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Directories searched for module libraries, in order
    pub search_paths: Vec<PathBuf>,

    /// Behaviour on function name collisions between modules
    pub collision_policy: CollisionPolicy,

    /// Also search `DATACODE_MODULE_PATH`
    pub use_env_path: bool,

    /// ABI version the VM claims to implement
    pub abi_version: VersionConfig,
}

/// Serializable form of [`AbiVersion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConfig {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
}

impl Default for VersionConfig {
    fn default() -> Self {
        DATACODE_ABI_VERSION.into()
    }
}

impl From<AbiVersion> for VersionConfig {
    fn from(v: AbiVersion) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
        }
    }
}

impl From<VersionConfig> for AbiVersion {
    fn from(v: VersionConfig) -> Self {
        AbiVersion::new(v.major, v.minor)
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            collision_policy: CollisionPolicy::default(),
            use_env_path: true,
            abi_version: VersionConfig::default(),
        }
    }
}

impl VmConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Append a search directory
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Set the collision policy
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Override the ABI version the VM implements
    pub fn with_abi_version(mut self, version: AbiVersion) -> Self {
        self.abi_version = version.into();
        self
    }

    /// Enable or disable `DATACODE_MODULE_PATH`
    pub fn with_env_path(mut self, enabled: bool) -> Self {
        self.use_env_path = enabled;
        self
    }

    /// Effective ABI version
    pub fn abi_version(&self) -> AbiVersion {
        self.abi_version.into()
    }

    /// Resolver for these settings
    pub fn resolver(&self) -> ModuleResolver {
        let resolver = ModuleResolver::new(self.search_paths.clone());
        if self.use_env_path {
            resolver.with_env_paths()
        } else {
            resolver
        }
    }
}

//! Engine configuration
//!
//! Defaults match the production behavior: a 60 second memory tier and a
//! bounded wait on every store call. Configuration can be loaded from YAML:
//!
//! ```yaml
//! memory_ttl_secs: 60
//! store_timeout_ms: 10000
//! publish_events: true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default memory tier TTL
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(60);

/// Default bound on a single collaborator call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the streak cache manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a memory entry is served before the persistent tier is
    /// consulted again
    pub memory_ttl: Duration,

    /// Timeout applied to each store / directory call (`None` = unbounded)
    pub store_timeout: Option<Duration>,

    /// Publish domain events on derivation and invalidation
    pub publish_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_ttl: DEFAULT_MEMORY_TTL,
            store_timeout: Some(DEFAULT_STORE_TIMEOUT),
            publish_events: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory tier TTL.
    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    /// Set the per-call store timeout.
    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Enable or disable event publishing.
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.publish_events = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.store_timeout {
            if timeout.is_zero() {
                return Err(Error::Config(
                    "store_timeout must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let config = Self::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Serializable view, as written to YAML.
    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            memory_ttl_secs: self.memory_ttl.as_secs(),
            store_timeout_ms: self.store_timeout.map(|t| t.as_millis() as u64),
            publish_events: self.publish_events,
        }
    }
}

/// On-disk form of [`EngineConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub memory_ttl_secs: u64,
    /// `null` disables the timeout
    pub store_timeout_ms: Option<u64>,
    pub publish_events: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        EngineConfig::default().to_file()
    }
}

impl From<ConfigFile> for EngineConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            memory_ttl: Duration::from_secs(file.memory_ttl_secs),
            store_timeout: file.store_timeout_ms.map(Duration::from_millis),
            publish_events: file.publish_events,
        }
    }
}

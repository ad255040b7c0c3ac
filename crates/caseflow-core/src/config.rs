//! TOML configuration for the Caseflow desk and its HTTP client.
//!
//! Every field has a default, so an empty document is a valid
//! configuration:
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000"
//! timeout_secs = 10
//! token_env = "CASEFLOW_TOKEN"
//!
//! [aggregation]
//! max_in_flight = 8
//! sub_fetch_attempts = 1
//!
//! [cache]
//! path = "/var/lib/caseflow/cases.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use caseflow_contracts::error::{CaseflowError, CaseflowResult};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseflowConfig {
    pub api: ApiConfig,
    pub aggregation: AggregationConfig,
    pub cache: CacheConfig,
}

impl CaseflowConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `CaseflowError::ConfigError` if the TOML is malformed or a
    /// value fails validation.
    pub fn from_toml_str(s: &str) -> CaseflowResult<Self> {
        let config: CaseflowConfig = toml::from_str(s).map_err(|e| CaseflowError::ConfigError {
            reason: format!("failed to parse configuration TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> CaseflowResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CaseflowError::ConfigError {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> CaseflowResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CaseflowError::ConfigError {
                reason: "api.base_url must not be empty".to_string(),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(CaseflowError::ConfigError {
                reason: "api.timeout_secs must be at least 1".to_string(),
            });
        }
        if self.aggregation.sub_fetch_attempts == 0 {
            return Err(CaseflowError::ConfigError {
                reason: "aggregation.sub_fetch_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Upstream API settings consumed by the HTTP resource client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
            token_env: "CASEFLOW_TOKEN".to_string(),
        }
    }
}

/// Fan-out limits and retry policy for the case assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Maximum patients assembled concurrently. `0` means unbounded.
    pub max_in_flight: usize,
    /// Attempts per sub-fetch before the field is declared absent.
    pub sub_fetch_attempts: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            sub_fetch_attempts: 1,
        }
    }
}

/// Location of the optional local case cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: Option<PathBuf>,
}

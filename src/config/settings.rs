//! TOML-based configuration for the gateway.
//!
//! Supports a config file (quarry.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! workgroup = "${QUARRY_WORKGROUP}"
//!
//! [warehouse]
//! sidecar_path = "./quarry-dataapi"
//! timeout_secs = 30
//!
//! [poll]
//! initial_interval_ms = 250
//! max_interval_ms = 5000
//! multiplier = 2.0
//! max_wait_ms = 300000
//!
//! [response]
//! max_body_bytes = 24000
//!
//! [acl]
//! sudipta = [
//!     { db = "sample_data_dev", schema = "tpcds" },
//!     { db = "sample_data_prod", schema = "public" },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acl::{AclEntry, StaticAclResolver};
use crate::executor::PollPolicy;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("No workgroup configured: set workgroup in config or QUARRY_WORKGROUP")]
    MissingWorkgroup,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Warehouse workgroup identifier (supports ${ENV_VAR} expansion).
    pub workgroup: String,

    /// Sidecar configuration.
    pub warehouse: WarehouseSettings,

    /// Statement poll configuration.
    pub poll: PollSettings,

    /// Response encoding configuration.
    pub response: ResponseSettings,

    /// Static ACL table: user id → authorized (db, schema) pairs.
    /// Falls back to the built-in sample table when empty.
    pub acl: HashMap<String, Vec<AclEntry>>,
}

/// Sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Path to the data-api sidecar binary.
    pub sidecar_path: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            sidecar_path: None,
            timeout_secs: 30,
        }
    }
}

/// Statement poll configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    pub max_wait_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 250,
            max_interval_ms: 5_000,
            multiplier: 2.0,
            max_wait_ms: 300_000,
        }
    }
}

impl PollSettings {
    /// Convert to the executor's poll policy.
    pub fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            multiplier: self.multiplier,
            max_wait: Duration::from_millis(self.max_wait_ms),
        }
    }
}

/// Response encoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseSettings {
    /// Serialized payload ceiling in bytes.
    pub max_body_bytes: usize,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: crate::gateway::MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default locations.
    ///
    /// Searches in order: the `QUARRY_CONFIG` environment variable, then
    /// `./quarry.toml`. Defaults when neither exists.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("QUARRY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Self::default())
    }

    /// The workgroup with environment variables expanded.
    ///
    /// Falls back to the `QUARRY_WORKGROUP` environment variable when no
    /// workgroup is configured.
    pub fn resolved_workgroup(&self) -> Result<String, SettingsError> {
        if self.workgroup.is_empty() {
            return env::var("QUARRY_WORKGROUP").map_err(|_| SettingsError::MissingWorkgroup);
        }
        expand_env_vars(&self.workgroup)
    }

    /// Sidecar request timeout.
    pub fn warehouse_timeout(&self) -> Duration {
        Duration::from_secs(self.warehouse.timeout_secs)
    }

    /// Resolver over the configured ACL table, or over the built-in
    /// sample table when no entries are configured.
    pub fn acl_resolver(&self) -> StaticAclResolver {
        if self.acl.is_empty() {
            StaticAclResolver::sample()
        } else {
            StaticAclResolver::new(self.acl.clone())
        }
    }
}

/// Expand `${VAR}` and `$VAR` references against the process environment.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(ch);
                    chars.next();
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.warehouse.timeout_secs, 30);
        assert_eq!(settings.poll.initial_interval_ms, 250);
        assert_eq!(settings.response.max_body_bytes, 24_000);
        assert!(settings.acl.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let settings: Settings = toml::from_str(
            r#"
            workgroup = "analytics-wg"

            [warehouse]
            sidecar_path = "/opt/quarry/dataapi"
            timeout_secs = 10

            [poll]
            initial_interval_ms = 100
            max_wait_ms = 60000

            [acl]
            sudipta = [
                { db = "sample_data_dev", schema = "tpcds" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(settings.workgroup, "analytics-wg");
        assert_eq!(
            settings.warehouse.sidecar_path.as_deref(),
            Some("/opt/quarry/dataapi")
        );
        assert_eq!(settings.poll.initial_interval_ms, 100);
        // Unspecified poll fields keep their defaults.
        assert_eq!(settings.poll.multiplier, 2.0);
        assert_eq!(settings.acl["sudipta"].len(), 1);
    }

    #[test]
    fn test_poll_settings_to_policy() {
        let policy = PollSettings::default().to_policy();
        assert_eq!(policy.initial_interval, Duration::from_millis(250));
        assert_eq!(policy.max_wait, Duration::from_secs(300));
    }

    #[test]
    fn test_expand_env_vars() {
        env::set_var("QUARRY_TEST_WG", "wg-from-env");
        assert_eq!(expand_env_vars("${QUARRY_TEST_WG}").unwrap(), "wg-from-env");
        assert_eq!(
            expand_env_vars("prefix-$QUARRY_TEST_WG").unwrap(),
            "prefix-wg-from-env"
        );
        assert_eq!(expand_env_vars("plain").unwrap(), "plain");
        assert!(matches!(
            expand_env_vars("${QUARRY_TEST_MISSING_VAR}"),
            Err(SettingsError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_configured_acl_overrides_sample() {
        let mut acl = HashMap::new();
        acl.insert("ada".to_string(), vec![AclEntry::new("prod", "finance")]);
        let settings = Settings {
            acl,
            ..Settings::default()
        };

        use crate::acl::AclResolver;
        let resolver = settings.acl_resolver();
        assert_eq!(resolver.resolve("ada").len(), 1);
        assert!(resolver.resolve("sudipta").is_empty());
    }
}

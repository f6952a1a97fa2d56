//! Configuration loading and persistence.
//!
//! Reads `config.json` from the relay's config directory, then applies
//! environment variable overrides. Nothing secret lives here: VAPID keys
//! arrive with each send request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::constants::{
    DEFAULT_CONTENT_TYPE, DEFAULT_TOKEN_LIFETIME_SECS, DEFAULT_TTL_SECS, HTTP_REQUEST_TIMEOUT,
    MAX_TOKEN_LIFETIME_SECS, MAX_TTL_SECS,
};
use crate::crypto::{AuthScheme, KeySchedule};

const CONFIG_FILE: &str = "config.json";

/// Runtime configuration for the push relay.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Default message TTL in seconds when a request omits one.
    pub ttl_seconds: u32,
    /// Lifetime of each VAPID assertion in seconds.
    pub token_lifetime_seconds: u32,
    /// Timeout for the outbound push request.
    pub request_timeout_secs: u64,
    /// Site keys allowed to send. Empty allows every caller.
    pub allowed_site_keys: Vec<String>,
    /// How the VAPID credential is presented.
    pub auth_scheme: AuthScheme,
    /// Content-encryption key schedule.
    pub key_schedule: KeySchedule,
    /// Content-Type of the encrypted request body.
    pub content_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECS,
            token_lifetime_seconds: DEFAULT_TOKEN_LIFETIME_SECS,
            request_timeout_secs: HTTP_REQUEST_TIMEOUT.as_secs(),
            allowed_site_keys: Vec::new(),
            auth_scheme: AuthScheme::default(),
            key_schedule: KeySchedule::default(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `WEBPUSH_CONFIG_DIR` overrides the platform config directory
    /// (macOS: ~/Library/Application Support/webpush-relay).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("WEBPUSH_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("webpush-relay"))
    }

    /// Path of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            log::debug!("[Config] No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file without applying overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ttl) = lookup("WEBPUSH_TTL").and_then(|v| v.parse().ok()) {
            self.ttl_seconds = ttl;
        }

        if let Some(lifetime) = lookup("WEBPUSH_TOKEN_LIFETIME").and_then(|v| v.parse().ok()) {
            self.token_lifetime_seconds = lifetime;
        }

        if let Some(timeout) = lookup("WEBPUSH_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = timeout;
        }

        if let Some(keys) = lookup("ALLOWED_SITE_KEYS") {
            self.allowed_site_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(scheme) = lookup("WEBPUSH_AUTH_SCHEME") {
            match scheme.parse() {
                Ok(scheme) => self.auth_scheme = scheme,
                Err(e) => log::warn!("[Config] Ignoring WEBPUSH_AUTH_SCHEME: {e}"),
            }
        }

        if let Some(schedule) = lookup("WEBPUSH_KEY_SCHEDULE") {
            match schedule.parse() {
                Ok(schedule) => self.key_schedule = schedule,
                Err(e) => log::warn!("[Config] Ignoring WEBPUSH_KEY_SCHEDULE: {e}"),
            }
        }

        if let Some(content_type) = lookup("WEBPUSH_CONTENT_TYPE") {
            self.content_type = content_type;
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.token_lifetime_seconds == 0 || self.token_lifetime_seconds > MAX_TOKEN_LIFETIME_SECS
        {
            anyhow::bail!(
                "token_lifetime_seconds must be between 1 and {MAX_TOKEN_LIFETIME_SECS}, got {}",
                self.token_lifetime_seconds
            );
        }
        if self.ttl_seconds > MAX_TTL_SECS {
            anyhow::bail!(
                "ttl_seconds must be at most {MAX_TTL_SECS}, got {}",
                self.ttl_seconds
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    /// Outbound request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `site_key` may send. An empty allow-list admits everyone.
    pub fn is_site_key_allowed(&self, site_key: &str) -> bool {
        crate::validation::validate_site_key(site_key, &self.allowed_site_keys)
    }

    /// Persists the configuration to the config directory.
    pub fn save(&self) -> Result<PathBuf> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(CONFIG_FILE);
        self.save_to(&path)?;
        Ok(path)
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ttl_seconds, 86_400);
        assert_eq!(config.token_lifetime_seconds, 43_200);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.allowed_site_keys.is_empty());
        assert_eq!(config.auth_scheme, AuthScheme::Vapid);
        assert_eq!(config.key_schedule, KeySchedule::Contextual);
        assert_eq!(config.content_type, "application/octet-stream");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            ttl_seconds: 60,
            allowed_site_keys: vec!["site-a".into()],
            key_schedule: KeySchedule::Rfc8291,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::default().save_to(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ttl_seconds": 120, "auth_scheme": "webpush"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ttl_seconds, 120);
        assert_eq!(config.auth_scheme, AuthScheme::WebPush);
        assert_eq!(config.token_lifetime_seconds, 43_200);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("WEBPUSH_TTL", "300"),
            ("WEBPUSH_TOKEN_LIFETIME", "600"),
            ("WEBPUSH_REQUEST_TIMEOUT", "3"),
            ("ALLOWED_SITE_KEYS", "alpha, beta,,gamma"),
            ("WEBPUSH_AUTH_SCHEME", "webpush"),
            ("WEBPUSH_KEY_SCHEDULE", "rfc8291"),
            ("WEBPUSH_CONTENT_TYPE", "application/json"),
        ]));

        assert_eq!(config.ttl_seconds, 300);
        assert_eq!(config.token_lifetime_seconds, 600);
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.allowed_site_keys, vec!["alpha", "beta", "gamma"]);
        assert_eq!(config.auth_scheme, AuthScheme::WebPush);
        assert_eq!(config.key_schedule, KeySchedule::Rfc8291);
        assert_eq!(config.content_type, "application/json");
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("WEBPUSH_TTL", "soon"),
            ("WEBPUSH_AUTH_SCHEME", "bearer"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_ranges() {
        let zero_lifetime = Config {
            token_lifetime_seconds: 0,
            ..Config::default()
        };
        assert!(zero_lifetime.validate().is_err());

        let long_lifetime = Config {
            token_lifetime_seconds: 86_401,
            ..Config::default()
        };
        assert!(long_lifetime.validate().is_err());

        let long_ttl = Config {
            ttl_seconds: 28 * 86_400 + 1,
            ..Config::default()
        };
        assert!(long_ttl.validate().is_err());

        let no_timeout = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_site_key_allow_list() {
        let open = Config::default();
        assert!(open.is_site_key_allowed("anything"));

        let closed = Config {
            allowed_site_keys: vec!["alpha".into()],
            ..Config::default()
        };
        assert!(closed.is_site_key_allowed("alpha"));
        assert!(!closed.is_site_key_allowed("alph"));
        assert!(!closed.is_site_key_allowed(""));
    }
}

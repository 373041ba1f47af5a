//! Configuration for the snapshot vault.
//!
//! Loaded from a TOML file (every key optional), then overridden from the
//! environment, then validated. The resulting struct is passed explicitly into
//! `VaultBuilder`; nothing here is process-global.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{RetentionPolicy, VaultError};

pub const ENV_STORAGE_ROOT: &str = "VELLUM_STORAGE_ROOT";
pub const ENV_MAX_DEPTH: &str = "VELLUM_MAX_DEPTH";
pub const ENV_MAX_ARTIFACTS_PER_PAGE: &str = "VELLUM_MAX_ARTIFACTS_PER_PAGE";
pub const ENV_MAX_AGE_DAYS: &str = "VELLUM_MAX_AGE_DAYS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Directory holding the artifacts.
    pub storage_root: PathBuf,
    /// Traversal depth bound used by capture.
    pub max_depth: usize,
    pub retention: RetentionConfig,
    pub gateway: GatewayConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./backups"),
            max_depth: 10,
            retention: RetentionConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub max_artifacts_per_page: usize,
    pub max_age_days: u32,
    /// Period of the background retention loop.
    pub interval_secs: u64,
    /// Run eviction right after every successful capture.
    pub prune_after_capture: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_artifacts_per_page: 10,
            max_age_days: 30,
            interval_secs: 3600,
            prune_after_capture: false,
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.max_artifacts_per_page, self.max_age_days)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Sent as the `Notion-Version` header.
    pub api_version: String,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
    pub timeout_secs: u64,
    /// Children requested per page.
    pub page_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            api_version: "2022-06-28".to_string(),
            token_env: "NOTION_TOKEN".to_string(),
            timeout_secs: 30,
            page_size: 100,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VaultConfig {
    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, VaultError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!("cannot read `{}`: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, VaultError> {
        toml::from_str(contents).map_err(|e| VaultError::Config(e.to_string()))
    }

    /// File (if given) + process environment, validated.
    pub fn resolve(path: Option<&Path>) -> Result<Self, VaultError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VELLUM_*` overrides. `lookup` abstracts the environment for tests.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), VaultError> {
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            self.max_depth = parse_env(ENV_MAX_DEPTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ARTIFACTS_PER_PAGE) {
            self.retention.max_artifacts_per_page = parse_env(ENV_MAX_ARTIFACTS_PER_PAGE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_AGE_DAYS) {
            self.retention.max_age_days = parse_env(ENV_MAX_AGE_DAYS, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        let problems: Vec<&str> = [
            (self.storage_root.as_os_str().is_empty(), "storage_root must not be empty"),
            (self.max_depth == 0, "max_depth must be at least 1"),
            (
                self.retention.max_artifacts_per_page == 0,
                "retention.max_artifacts_per_page must be at least 1",
            ),
            (self.retention.max_age_days == 0, "retention.max_age_days must be at least 1"),
            (self.retention.interval_secs == 0, "retention.interval_secs must be at least 1"),
            (self.gateway.base_url.trim().is_empty(), "gateway.base_url must not be empty"),
            (self.gateway.page_size == 0, "gateway.page_size must be at least 1"),
            (self.gateway.timeout_secs == 0, "gateway.timeout_secs must be at least 1"),
        ]
        .into_iter()
        .filter_map(|(bad, message)| bad.then_some(message))
        .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(VaultError::Config(problems.join("; ")))
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, VaultError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| VaultError::Config(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let config = VaultConfig::from_toml("").unwrap();
        assert_eq!(config, VaultConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = VaultConfig::from_toml(
            r#"
            storage_root = "/var/lib/vellum"

            [retention]
            max_artifacts_per_page = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/var/lib/vellum"));
        assert_eq!(config.retention.max_artifacts_per_page, 3);
        assert_eq!(config.retention.max_age_days, 30);
        assert_eq!(config.gateway.page_size, 100);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(VaultConfig::from_toml("max_dpeth = 3").is_err());
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STORAGE_ROOT, "/tmp/b"),
            (ENV_MAX_DEPTH, "4"),
            (ENV_MAX_AGE_DAYS, " 7 "),
        ]);
        let mut config = VaultConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/tmp/b"));
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.retention.max_age_days, 7);
        assert_eq!(config.retention.max_artifacts_per_page, 10);
    }

    #[test]
    fn bad_env_values_are_reported() {
        let mut config = VaultConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == ENV_MAX_DEPTH).then(|| "deep".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_DEPTH));
    }

    #[test]
    fn validation_lists_every_problem() {
        let mut config = VaultConfig::default();
        config.max_depth = 0;
        config.retention.max_artifacts_per_page = 0;

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("max_depth"));
        assert!(message.contains("max_artifacts_per_page"));
    }

    #[test]
    fn retention_section_maps_to_policy() {
        let policy = RetentionConfig::default().policy();
        assert_eq!(policy.max_artifacts_per_page, Some(10));
        assert_eq!(policy.max_age_days, Some(30));
    }
}

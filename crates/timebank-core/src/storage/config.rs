//! TOML-based application configuration.
//!
//! Stores engine tunables including:
//! - The job code that marks TOIL usage entries
//! - Event coordinator batching windows and batch cap
//! - Entry store write retry/backoff policy
//! - Summary cache refresh limiting
//!
//! Configuration is stored at `~/.config/timebank/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::entry::RetryPolicy;
use crate::toil::{CoordinatorSettings, ServiceSettings};

/// Calculation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationConfig {
    /// Entries with this job code draw down TOIL instead of accruing.
    #[serde(default = "default_toil_job_number")]
    pub toil_job_number: String,
}

/// Event coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

/// Entry store write retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

/// Summary cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum gap between forced refreshes of the same key.
    #[serde(default = "default_min_refresh_gap_ms")]
    pub min_refresh_gap_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/timebank/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calculation: CalculationConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

// Default functions
fn default_toil_job_number() -> String {
    "TOIL".into()
}
fn default_debounce_window_ms() -> u64 {
    500
}
fn default_dedup_window_ms() -> u64 {
    1000
}
fn default_max_batch() -> usize {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_min_refresh_gap_ms() -> u64 {
    250
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            toil_job_number: default_toil_job_number(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: default_debounce_window_ms(),
            dedup_window_ms: default_dedup_window_ms(),
            max_batch: default_max_batch(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_refresh_gap_ms: default_min_refresh_gap_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calculation: CalculationConfig::default(),
            coordinator: CoordinatorConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err("config key is empty".into());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| format!("unknown config key: {key}"))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| format!("unknown config key: {key}"))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(value.parse::<bool>()?),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| format!("cannot parse '{value}' as number"))?
                        } else {
                            return Err(format!("cannot parse '{value}' as number").into());
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value)?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| format!("unknown config key: {key}"))?;
        }

        Err(format!("unknown config key: {key}").into())
    }

    fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        self.save()?;
        Ok(())
    }

    /// Retry policy for the entry store's write lock.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.store.max_attempts,
            base_delay: std::time::Duration::from_millis(self.store.base_delay_ms),
            backoff_multiplier: self.store.backoff_multiplier,
        }
    }

    /// Service tunables derived from this configuration.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            toil_job_number: self.calculation.toil_job_number.clone(),
            coordinator: CoordinatorSettings {
                debounce_window_ms: self.coordinator.debounce_window_ms as i64,
                dedup_window_ms: self.coordinator.dedup_window_ms as i64,
                max_batch: self.coordinator.max_batch,
            },
            min_refresh_gap_ms: self.cache.min_refresh_gap_ms as i64,
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.calculation.toil_job_number, "TOIL");
        assert_eq!(parsed.coordinator.max_batch, 10);
        assert_eq!(parsed.store.max_attempts, 3);
    }

    #[test]
    fn partial_file_fills_missing_fields_with_defaults() {
        let parsed: Config = toml::from_str("[coordinator]\nmax_batch = 4\n").unwrap();
        assert_eq!(parsed.coordinator.max_batch, 4);
        assert_eq!(parsed.coordinator.debounce_window_ms, 500);
        assert_eq!(parsed.cache.min_refresh_gap_ms, 250);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(
            cfg.get("calculation.toil_job_number").as_deref(),
            Some("TOIL")
        );
        assert_eq!(cfg.get("coordinator.debounce_window_ms").as_deref(), Some("500"));
        assert!(cfg.get("coordinator.missing_key").is_none());
    }

    #[test]
    fn set_json_value_by_path_updates_nested_number() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "coordinator.max_batch", "25").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "coordinator.max_batch").unwrap(),
            &serde_json::Value::Number(25.into())
        );
    }

    #[test]
    fn set_json_value_by_path_updates_nested_string() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "calculation.toil_job_number", "TIL").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "calculation.toil_job_number").unwrap(),
            &serde_json::Value::String("TIL".to_string())
        );
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        assert!(Config::set_json_value_by_path(&mut json, "coordinator.nope", "1").is_err());
        assert!(Config::set_json_value_by_path(&mut json, "", "1").is_err());
    }

    #[test]
    fn retry_policy_conversion() {
        let cfg = Config::default();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, std::time::Duration::from_millis(50));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn service_settings_conversion() {
        let cfg = Config::default();
        let settings = cfg.service_settings();
        assert_eq!(settings.toil_job_number, "TOIL");
        assert_eq!(settings.coordinator.debounce_window_ms, 500);
        assert_eq!(settings.coordinator.dedup_window_ms, 1000);
        assert_eq!(settings.min_refresh_gap_ms, 250);
    }
}

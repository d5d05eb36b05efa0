//! Pipeline tuning knobs.
//!
//! Sources, highest precedence first: an explicit JSON file, then
//! `LEARNPATH_*` environment variables, then the built-in defaults. A file
//! replaces the environment entirely; fields it omits take their defaults.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const BATCH_SIZE_ENV: &str = "LEARNPATH_BATCH_SIZE";
pub const RATE_LIMIT_DELAY_MS_ENV: &str = "LEARNPATH_RATE_LIMIT_DELAY_MS";
pub const BATCH_TIMEOUT_SECS_ENV: &str = "LEARNPATH_BATCH_TIMEOUT_SECS";
pub const DECOMPOSITION_TIMEOUT_SECS_ENV: &str = "LEARNPATH_DECOMPOSITION_TIMEOUT_SECS";

const MAX_BATCH_SIZE: u64 = 100;
const MAX_RATE_LIMIT_DELAY_MS: u64 = 60_000;
const MAX_CALL_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Materials per summarization call.
    pub batch_size: usize,
    /// Pause between consecutive batch calls.
    #[serde(rename = "rate_limit_delay_ms", with = "millis")]
    pub rate_limit_delay: Duration,
    /// Characters of each material quoted into a batch prompt.
    pub content_prefix_chars: usize,
    /// Meta-summaries longer than this many characters are compressed.
    pub meta_compression_threshold: usize,
    pub meta_compression_aggressiveness: f64,
    /// Demonstrated-knowledge claims quoted into the decomposition prompt.
    pub demonstrated_knowledge_prompt_cap: usize,
    #[serde(rename = "batch_call_timeout_secs", with = "secs")]
    pub batch_call_timeout: Duration,
    #[serde(rename = "decomposition_call_timeout_secs", with = "secs")]
    pub decomposition_call_timeout: Duration,
    /// Node count range requested from the oracle.
    pub min_nodes: usize,
    pub max_nodes: usize,
    /// Prepended to every document path; empty for none.
    pub storage_bucket_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            rate_limit_delay: Duration::from_secs(2),
            content_prefix_chars: 5000,
            meta_compression_threshold: 10_000,
            meta_compression_aggressiveness: 0.4,
            demonstrated_knowledge_prompt_cap: 20,
            batch_call_timeout: Duration::from_secs(25),
            decomposition_call_timeout: Duration::from_secs(120),
            min_nodes: 40,
            max_nodes: 80,
            storage_bucket_prefix: String::new(),
        }
    }
}

impl PipelineConfig {
    /// Load from `path` when given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            PipelineError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            batch_size: env_u64(BATCH_SIZE_ENV, defaults.batch_size as u64, MAX_BATCH_SIZE)? as usize,
            rate_limit_delay: Duration::from_millis(env_u64(
                RATE_LIMIT_DELAY_MS_ENV,
                defaults.rate_limit_delay.as_millis() as u64,
                MAX_RATE_LIMIT_DELAY_MS,
            )?),
            batch_call_timeout: Duration::from_secs(env_u64(
                BATCH_TIMEOUT_SECS_ENV,
                defaults.batch_call_timeout.as_secs(),
                MAX_CALL_TIMEOUT_SECS,
            )?),
            decomposition_call_timeout: Duration::from_secs(env_u64(
                DECOMPOSITION_TIMEOUT_SECS_ENV,
                defaults.decomposition_call_timeout.as_secs(),
                MAX_CALL_TIMEOUT_SECS,
            )?),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.meta_compression_aggressiveness) {
            return Err(PipelineError::Config(format!(
                "meta_compression_aggressiveness must be within [0, 1], got {}",
                self.meta_compression_aggressiveness
            )));
        }
        if self.min_nodes > self.max_nodes {
            return Err(PipelineError::Config(format!(
                "min_nodes ({}) exceeds max_nodes ({})",
                self.min_nodes, self.max_nodes
            )));
        }
        if self.batch_call_timeout.is_zero() || self.decomposition_call_timeout.is_zero() {
            return Err(PipelineError::Config("oracle call timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Where the document of a `(user, session)` run is stored.
    pub fn storage_path(&self, user_id: &str, session_id: &str) -> String {
        let path = format!("{user_id}/{session_id}/learning_path.json");
        let prefix = self.storage_bucket_prefix.trim_matches('/');
        if prefix.is_empty() {
            path
        } else {
            format!("{prefix}/{path}")
        }
    }
}

/// Integer env var no greater than `max`. Unset or blank means `default`.
fn env_u64(name: &str, default: u64, max: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                return Ok(default);
            }
            let parsed = v.parse::<u64>().map_err(|_| {
                PipelineError::Config(format!("invalid {name}={v:?} (expected integer)"))
            })?;
            if parsed > max {
                return Err(PipelineError::Config(format!(
                    "invalid {name}={parsed} (maximum is {max})"
                )));
            }
            Ok(parsed)
        }
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(PipelineError::Config(format!("failed to read {name}: {e}"))),
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.rate_limit_delay, Duration::from_secs(2));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn env_values_above_the_maximum_are_rejected() {
        let name = "LEARNPATH_TEST_ENV_U64_RANGE";
        std::env::set_var(name, "500");
        let err = env_u64(name, 5, 100).unwrap_err();
        std::env::set_var(name, "100");
        let at_max = env_u64(name, 5, 100).unwrap();
        std::env::set_var(name, " ");
        let blank = env_u64(name, 5, 100).unwrap();
        std::env::remove_var(name);

        assert!(matches!(&err, PipelineError::Config(msg) if msg.contains(name) && msg.contains("500")));
        assert_eq!(at_max, 100);
        assert_eq!(blank, 5);
        assert_eq!(env_u64(name, 5, 100).unwrap(), 5);
    }

    #[test]
    fn file_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"batch_size": 3, "rate_limit_delay_ms": 0}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.batch_size, 3);
        assert!(config.rate_limit_delay.is_zero());
        assert_eq!(config.decomposition_call_timeout, Duration::from_secs(120));

        std::fs::write(&path, r#"{"batch_size": 0}"#).unwrap();
        assert!(PipelineConfig::from_file(&path).is_err());
    }

    #[test]
    fn storage_path_honours_prefix() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.storage_path("7", "s1"), "7/s1/learning_path.json");
        config.storage_bucket_prefix = "learning_paths/".into();
        assert_eq!(config.storage_path("7", "s1"), "learning_paths/7/s1/learning_path.json");
    }
}

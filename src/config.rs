//! Configuration for mixscan
//!
//! Layered resolution, highest priority last applied:
//! compiled defaults → TOML config file → `MIXSCAN_*` environment variables.
//! CLI flags are applied on top by the binary. Every value is validated at
//! load time; the core modules assume a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default config file consulted when no path is given
const DEFAULT_CONFIG_FILE: &str = "mixscan.toml";

/// Valid output format selectors
pub const VALID_OUTPUT_FORMATS: &[&str] = &["json", "markdown", "m3u", "all"];

/// Track identification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Analysis window length in seconds
    pub segment_length: u64,
    /// Fraction of a window shared with its successor, in [0, 1)
    pub overlap_ratio: f64,
    /// Hits at or below this confidence are dropped (0-100)
    pub min_confidence: f32,
    /// Maximum seconds between similar hits considered duplicates
    pub time_threshold: u64,
    /// Retained occurrences of one song across distinct segments
    pub max_duplicates: usize,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            segment_length: 60,
            overlap_ratio: 0.5,
            min_confidence: 50.0,
            time_threshold: 60,
            max_duplicates: 2,
        }
    }
}

/// Gap/overlap reporting thresholds (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum gap between consecutive tracks worth reporting
    pub min_gap_threshold: f64,
    /// Minimum overlap between consecutive tracks worth reporting
    pub min_overlap_threshold: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_gap_threshold: 1.0,
            min_overlap_threshold: 0.5,
        }
    }
}

/// Identification provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Providers tried in order for each segment
    pub chain: Vec<String>,
    /// AudD API token (TOML or `MIXSCAN_AUDD_API_TOKEN`)
    pub audd_api_token: Option<String>,
    /// Shazam RapidAPI key (TOML or `MIXSCAN_SHAZAM_API_KEY`)
    pub shazam_api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            chain: vec!["audd".to_string(), "shazam".to_string()],
            audd_api_token: None,
            shazam_api_key: None,
            timeout_secs: 10,
        }
    }
}

/// Application-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_requests_per_minute: u32,
    pub rate_limit_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 60,
            rate_limit_enabled: true,
        }
    }
}

/// Identification cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".mixscan-cache"),
            ttl_secs: 86400,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// json | markdown | m3u | all
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("tracklists"),
            format: "all".to_string(),
        }
    }
}

/// Complete mixscan configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identification: IdentificationConfig,
    pub timing: TimingConfig,
    pub providers: ProvidersConfig,
    pub app: AppConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration: defaults → TOML file → environment overrides
    ///
    /// An explicit `path` must exist; with no path, `mixscan.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_toml_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_toml_file(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        override_from_env("MIXSCAN_SEGMENT_LENGTH", &mut self.identification.segment_length)?;
        override_from_env("MIXSCAN_OVERLAP_RATIO", &mut self.identification.overlap_ratio)?;
        override_from_env("MIXSCAN_MIN_CONFIDENCE", &mut self.identification.min_confidence)?;
        override_from_env("MIXSCAN_TIME_THRESHOLD", &mut self.identification.time_threshold)?;
        override_from_env("MIXSCAN_MAX_DUPLICATES", &mut self.identification.max_duplicates)?;
        override_from_env("MIXSCAN_MIN_GAP_THRESHOLD", &mut self.timing.min_gap_threshold)?;
        override_from_env(
            "MIXSCAN_MIN_OVERLAP_THRESHOLD",
            &mut self.timing.min_overlap_threshold,
        )?;
        override_from_env("MIXSCAN_PROVIDER_TIMEOUT", &mut self.providers.timeout_secs)?;
        override_from_env(
            "MIXSCAN_MAX_REQUESTS_PER_MINUTE",
            &mut self.app.max_requests_per_minute,
        )?;
        override_from_env("MIXSCAN_RATE_LIMIT_ENABLED", &mut self.app.rate_limit_enabled)?;
        override_from_env("MIXSCAN_CACHE_ENABLED", &mut self.cache.enabled)?;
        override_from_env("MIXSCAN_CACHE_DIR", &mut self.cache.directory)?;
        override_from_env("MIXSCAN_CACHE_TTL", &mut self.cache.ttl_secs)?;
        override_from_env("MIXSCAN_OUTPUT_DIR", &mut self.output.directory)?;
        override_from_env("MIXSCAN_OUTPUT_FORMAT", &mut self.output.format)?;

        if let Ok(chain) = std::env::var("MIXSCAN_PROVIDERS") {
            self.providers.chain = chain
                .split(',')
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Ok(token) = std::env::var("MIXSCAN_AUDD_API_TOKEN") {
            self.providers.audd_api_token = Some(token);
        }
        if let Ok(key) = std::env::var("MIXSCAN_SHAZAM_API_KEY") {
            self.providers.shazam_api_key = Some(key);
        }
        Ok(())
    }

    /// Validate every field, naming the offender on failure
    pub fn validate(&self) -> Result<()> {
        if self.identification.segment_length == 0 {
            return Err(Error::Config("segment_length must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.identification.overlap_ratio) {
            return Err(Error::Config(
                "overlap_ratio must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.identification.min_confidence) {
            return Err(Error::Config(
                "min_confidence must be between 0 and 100".to_string(),
            ));
        }
        if self.identification.time_threshold == 0 {
            return Err(Error::Config("time_threshold must be positive".to_string()));
        }
        if self.identification.max_duplicates == 0 {
            return Err(Error::Config("max_duplicates must be at least 1".to_string()));
        }
        if self.timing.min_gap_threshold < 0.0 || self.timing.min_overlap_threshold < 0.0 {
            return Err(Error::Config(
                "timing thresholds must not be negative".to_string(),
            ));
        }
        if self.providers.chain.is_empty() {
            return Err(Error::Config("provider chain must not be empty".to_string()));
        }
        if self.providers.timeout_secs == 0 {
            return Err(Error::Config("provider timeout must be positive".to_string()));
        }
        if self.app.max_requests_per_minute == 0 {
            return Err(Error::Config(
                "max_requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::Config("cache ttl must be positive".to_string()));
        }
        if !VALID_OUTPUT_FORMATS.contains(&self.output.format.as_str()) {
            return Err(Error::Config(format!(
                "invalid output format: {}",
                self.output.format
            )));
        }
        Ok(())
    }
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .parse()
            .map_err(|e| Error::Config(format!("invalid value for {key}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.identification.segment_length, 60);
        assert_eq!(config.identification.overlap_ratio, 0.5);
        assert_eq!(config.providers.chain, vec!["audd", "shazam"]);
    }

    #[test]
    #[serial]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixscan.toml");
        std::fs::write(
            &path,
            "[identification]\nsegment_length = 30\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.identification.segment_length, 30);
        assert_eq!(config.identification.time_threshold, 60);
        assert_eq!(config.output.format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixscan.toml");
        std::fs::write(&path, "[identification]\nsegment_length = 30\n").unwrap();

        std::env::set_var("MIXSCAN_SEGMENT_LENGTH", "15");
        std::env::set_var("MIXSCAN_PROVIDERS", "shazam");
        std::env::set_var("MIXSCAN_SHAZAM_API_KEY", "secret");
        let config = Config::load(Some(&path));
        std::env::remove_var("MIXSCAN_SEGMENT_LENGTH");
        std::env::remove_var("MIXSCAN_PROVIDERS");
        std::env::remove_var("MIXSCAN_SHAZAM_API_KEY");

        let config = config.unwrap();
        assert_eq!(config.identification.segment_length, 15);
        assert_eq!(config.providers.chain, vec!["shazam"]);
        assert_eq!(config.providers.shazam_api_key.as_deref(), Some("secret"));
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_config_error() {
        std::env::set_var("MIXSCAN_SEGMENT_LENGTH", "soon");
        let result = Config::load(None);
        std::env::remove_var("MIXSCAN_SEGMENT_LENGTH");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/mixscan.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.identification.segment_length = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.identification.overlap_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.identification.min_confidence = 150.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.providers.chain.clear();
        assert!(config.validate().is_err());
    }
}

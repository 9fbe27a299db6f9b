//! Identification providers
//!
//! External audio-identification services behind one object-safe async
//! trait. A provider receives the raw bytes of one analysis window and
//! reports at most one identification. Provider failures are recoverable per
//! segment: the orchestration loop logs them and moves on.

pub mod audd;
pub mod shazam;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProvidersConfig;
use crate::error::Error;

pub use audd::AudDProvider;
pub use shazam::ShazamProvider;

/// User-Agent sent with provider requests
pub const USER_AGENT: &str = concat!("mixscan/", env!("CARGO_PKG_VERSION"));

/// Provider request errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected by the service
    #[error("Invalid API credentials")]
    InvalidApiKey,

    /// Service-side rate limit hit
    #[error("Rate limited by provider")]
    RateLimited,

    /// Non-success HTTP status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body did not match the expected schema
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// One provider-reported identification for one analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedTrack {
    pub title: String,
    pub artist: String,
    /// Identification confidence, 0-100
    pub confidence: f32,
    /// Track duration when the service reports one
    pub duration_secs: Option<f64>,
}

/// An external audio-identification service
#[async_trait]
pub trait IdentificationProvider: Send + Sync {
    /// Provider name for logs and provenance
    fn name(&self) -> &'static str;

    /// Identify the track playing in the given audio bytes
    ///
    /// `Ok(None)` is a clean no-match; errors are per-segment recoverable.
    async fn identify(&self, audio: &[u8]) -> Result<Option<IdentifiedTrack>, ProviderError>;
}

/// Builds the ordered provider chain from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Instantiate every configured provider that has credentials
    ///
    /// Providers without credentials are skipped with a warning; an empty
    /// chain is a configuration error.
    pub fn from_config(
        config: &ProvidersConfig,
    ) -> Result<Vec<Box<dyn IdentificationProvider>>, Error> {
        let timeout = std::time::Duration::from_secs(config.timeout_secs);
        let mut providers: Vec<Box<dyn IdentificationProvider>> = Vec::new();

        for name in &config.chain {
            match name.as_str() {
                "audd" => match &config.audd_api_token {
                    Some(token) => providers.push(Box::new(
                        AudDProvider::new(token.clone(), timeout)
                            .map_err(|e| Error::Config(format!("audd provider: {e}")))?,
                    )),
                    None => {
                        tracing::warn!("Skipping audd provider: no API token configured");
                    }
                },
                "shazam" => match &config.shazam_api_key {
                    Some(key) => providers.push(Box::new(
                        ShazamProvider::new(key.clone(), timeout)
                            .map_err(|e| Error::Config(format!("shazam provider: {e}")))?,
                    )),
                    None => {
                        tracing::warn!("Skipping shazam provider: no API key configured");
                    }
                },
                other => {
                    tracing::warn!(provider = other, "Unknown identification provider, skipping");
                }
            }
        }

        if providers.is_empty() {
            return Err(Error::Config(
                "no identification provider configured; set MIXSCAN_AUDD_API_TOKEN or \
                 MIXSCAN_SHAZAM_API_KEY"
                    .to_string(),
            ));
        }
        Ok(providers)
    }
}

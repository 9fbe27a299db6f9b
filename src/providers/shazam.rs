//! Shazam identification client (RapidAPI gateway)
//!
//! Submits the base64-encoded window audio to the Shazam song-detection
//! endpoint. Shazam reports no numeric score either; confidence is
//! synthesized the same way as for AudD, from metadata completeness.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use super::{IdentificationProvider, IdentifiedTrack, ProviderError, USER_AGENT};

const SHAZAM_API_URL: &str = "https://shazam.p.rapidapi.com/songs/v2/detect";
const SHAZAM_API_HOST: &str = "shazam.p.rapidapi.com";

/// Base confidence for any titled match
const BASE_CONFIDENCE: f32 = 90.0;

#[derive(Debug, Deserialize)]
struct ShazamResponse {
    #[serde(default)]
    track: Option<ShazamTrack>,
}

#[derive(Debug, Deserialize)]
struct ShazamTrack {
    title: String,
    /// Artist credit
    subtitle: String,
    #[serde(default)]
    genres: Option<serde_json::Value>,
    #[serde(default)]
    sections: Vec<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
}

/// Shazam API client
pub struct ShazamProvider {
    http_client: reqwest::Client,
    api_key: String,
}

impl ShazamProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }

    fn to_identified(track: ShazamTrack) -> Option<IdentifiedTrack> {
        if track.title.trim().is_empty() || track.subtitle.trim().is_empty() {
            return None;
        }

        let completeness = [
            track.genres.is_some(),
            !track.sections.is_empty(),
            track.url.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as f32
            / 3.0;

        Some(IdentifiedTrack {
            title: track.title,
            artist: track.subtitle,
            confidence: (BASE_CONFIDENCE + 10.0 * completeness).min(100.0),
            duration_secs: None,
        })
    }
}

#[async_trait]
impl IdentificationProvider for ShazamProvider {
    fn name(&self) -> &'static str {
        "shazam"
    }

    async fn identify(&self, audio: &[u8]) -> Result<Option<IdentifiedTrack>, ProviderError> {
        let encoded = BASE64.encode(audio);

        tracing::debug!(bytes = audio.len(), "Querying Shazam API");

        let response = self
            .http_client
            .post(SHAZAM_API_URL)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", SHAZAM_API_HOST)
            .header("content-type", "text/plain")
            .body(encoded)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(ProviderError::InvalidApiKey),
            429 => return Err(ProviderError::RateLimited),
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api(status.as_u16(), body));
            }
            _ => {}
        }

        let parsed: ShazamResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok(parsed.track.and_then(Self::to_identified))
    }
}

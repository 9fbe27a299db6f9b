//! AudD identification client
//!
//! Submits the base64-encoded window audio to the AudD recognition API.
//! AudD does not report a match score, so confidence is synthesized from
//! metadata completeness: a confident base for any titled match, boosted by
//! how much supporting metadata came back with it.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use super::{IdentificationProvider, IdentifiedTrack, ProviderError, USER_AGENT};

const AUDD_API_URL: &str = "https://api.audd.io/";

/// AudD error code for a rejected API token
const ERROR_WRONG_TOKEN: i64 = 900;
/// AudD error code for an exhausted request quota
const ERROR_LIMIT_REACHED: i64 = 901;

/// Base confidence for any titled match
const BASE_CONFIDENCE: f32 = 90.0;

#[derive(Debug, Deserialize)]
struct AudDResponse {
    status: String,
    #[serde(default)]
    result: Option<AudDResult>,
    #[serde(default)]
    error: Option<AudDError>,
}

#[derive(Debug, Deserialize)]
struct AudDResult {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    song_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudDError {
    error_code: i64,
    error_message: String,
}

/// AudD API client
pub struct AudDProvider {
    http_client: reqwest::Client,
    api_token: String,
}

impl AudDProvider {
    pub fn new(api_token: String, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_token,
        })
    }

    fn to_identified(result: AudDResult) -> Option<IdentifiedTrack> {
        let title = result.title.filter(|t| !t.trim().is_empty())?;
        let artist = result.artist.filter(|a| !a.trim().is_empty())?;

        let completeness = [
            result.album.is_some(),
            result.release_date.is_some(),
            result.song_link.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as f32
            / 3.0;

        Some(IdentifiedTrack {
            title,
            artist,
            confidence: (BASE_CONFIDENCE + 10.0 * completeness).min(100.0),
            duration_secs: None,
        })
    }
}

#[async_trait]
impl IdentificationProvider for AudDProvider {
    fn name(&self) -> &'static str {
        "audd"
    }

    async fn identify(&self, audio: &[u8]) -> Result<Option<IdentifiedTrack>, ProviderError> {
        let encoded = BASE64.encode(audio);
        let params = [
            ("api_token", self.api_token.as_str()),
            ("audio", encoded.as_str()),
            ("return", "timecode"),
        ];

        tracing::debug!(bytes = audio.len(), "Querying AudD API");

        let response = self
            .http_client
            .post(AUDD_API_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        let parsed: AudDResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        if parsed.status == "error" {
            return match parsed.error {
                Some(err) if err.error_code == ERROR_WRONG_TOKEN => {
                    Err(ProviderError::InvalidApiKey)
                }
                Some(err) if err.error_code == ERROR_LIMIT_REACHED => {
                    Err(ProviderError::RateLimited)
                }
                Some(err) => Err(ProviderError::Api(200, err.error_message)),
                None => Err(ProviderError::MalformedResponse(
                    "error status without error body".to_string(),
                )),
            };
        }

        Ok(parsed.result.and_then(Self::to_identified))
    }
}

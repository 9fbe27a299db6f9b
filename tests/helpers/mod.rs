//! Test fixtures: generated WAV mixes and scripted identification providers

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mixscan::providers::{IdentificationProvider, IdentifiedTrack, ProviderError};

/// Generate a mono 8 kHz test WAV of the given duration
pub fn generate_test_wav(path: &Path, duration_secs: f64) -> anyhow::Result<PathBuf> {
    let sample_rate = 8000u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (duration_secs * sample_rate as f64) as usize;
    for i in 0..total_samples {
        // 440Hz tone at 30% amplitude
        let t = i as f32 / sample_rate as f32;
        let sample = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * i16::MAX as f32) as i16;
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// One scripted provider response
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Hit(IdentifiedTrack),
    NoMatch,
    Fail,
}

/// Hit with a confidence and duration, for script building
pub fn hit(title: &str, artist: &str, confidence: f32, duration_secs: f64) -> ScriptedResponse {
    ScriptedResponse::Hit(IdentifiedTrack {
        title: title.to_string(),
        artist: artist.to_string(),
        confidence,
        duration_secs: Some(duration_secs),
    })
}

/// Provider that replays a fixed script of responses in call order
///
/// Returns no-match once the script is exhausted. Optionally cancels a token
/// during the Nth call to exercise mid-run cancellation.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptedResponse>>,
    calls: Arc<AtomicUsize>,
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
            cancel_on_call: None,
        }
    }

    pub fn with_call_counter(script: Vec<ScriptedResponse>, calls: Arc<AtomicUsize>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls,
            cancel_on_call: None,
        }
    }

    pub fn cancelling_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((call, token));
        self
    }
}

#[async_trait]
impl IdentificationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn identify(&self, _audio: &[u8]) -> Result<Option<IdentifiedTrack>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((cancel_call, token)) = &self.cancel_on_call {
            if call == *cancel_call {
                token.cancel();
            }
        }

        let response = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedResponse::NoMatch);
        match response {
            ScriptedResponse::Hit(hit) => Ok(Some(hit)),
            ScriptedResponse::NoMatch => Ok(None),
            ScriptedResponse::Fail => Err(ProviderError::Network("scripted failure".to_string())),
        }
    }
}

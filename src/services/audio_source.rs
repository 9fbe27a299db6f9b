//! Mix audio source
//!
//! Probes the source file for duration and tags using lofty and serves
//! byte-range segment reads for the identification providers. Byte offsets
//! are mapped proportionally from time offsets, which is accurate enough for
//! constant-bitrate sources and keeps the reader format-agnostic.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use thiserror::Error;

use crate::models::MixInfo;

/// Audio source errors (fatal to the run)
#[derive(Debug, Error)]
pub enum AudioSourceError {
    /// Source file does not exist
    #[error("Audio file not found: {0}")]
    NotFound(PathBuf),

    /// Source file is empty
    #[error("Audio file is empty: {0}")]
    Empty(PathBuf),

    /// File exists but its audio properties could not be read
    #[error("Failed to read audio metadata: {0}")]
    Unreadable(String),

    /// I/O error while reading the source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opened mix audio file
#[derive(Debug)]
pub struct MixAudioSource {
    path: PathBuf,
    file_size: u64,
    duration_secs: f64,
    mix_info: MixInfo,
}

impl MixAudioSource {
    /// Open and probe a mix audio file
    ///
    /// # Errors
    /// Missing, empty, or unprobeable files are fatal; the caller wraps the
    /// error into the run-level identification failure.
    pub fn open(path: &Path) -> Result<Self, AudioSourceError> {
        if !path.exists() {
            return Err(AudioSourceError::NotFound(path.to_path_buf()));
        }
        let file_size = std::fs::metadata(path)?.len();
        if file_size == 0 {
            return Err(AudioSourceError::Empty(path.to_path_buf()));
        }

        let tagged_file = Probe::open(path)
            .map_err(|e| AudioSourceError::Unreadable(e.to_string()))?
            .read()
            .map_err(|e| AudioSourceError::Unreadable(e.to_string()))?;

        let duration_secs = tagged_file.properties().duration().as_secs_f64();
        if duration_secs <= 0.0 {
            return Err(AudioSourceError::Unreadable(format!(
                "zero duration reported for {}",
                path.display()
            )));
        }

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        let title = tag
            .and_then(|t| t.title().map(|s| s.to_string()))
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Unknown Mix".to_string())
            });
        let artist = tag.and_then(|t| t.artist().map(|s| s.to_string()));
        let date = tag.and_then(|t| t.year()).map(|y| format!("{y}-01-01"));

        tracing::debug!(
            path = %path.display(),
            duration_secs,
            file_size,
            "Opened mix audio source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_size,
            duration_secs,
            mix_info: MixInfo {
                title,
                artist,
                date,
                source: path.display().to_string(),
                duration_secs,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn mix_info(&self) -> &MixInfo {
        &self.mix_info
    }

    /// Read the bytes covering a time range of the mix
    ///
    /// Offsets are mapped proportionally onto the file size and clamped to
    /// the file bounds.
    pub fn read_range_secs(&self, start_secs: f64, end_secs: f64) -> std::io::Result<Vec<u8>> {
        let start_byte = self.byte_offset(start_secs);
        let end_byte = self.byte_offset(end_secs).max(start_byte);

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start_byte))?;
        let mut buffer = Vec::with_capacity((end_byte - start_byte) as usize);
        file.take(end_byte - start_byte).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn byte_offset(&self, secs: f64) -> u64 {
        let fraction = (secs / self.duration_secs).clamp(0.0, 1.0);
        (fraction * self.file_size as f64) as u64
    }
}

//! Identification result cache
//!
//! File-per-entry JSON cache of positive provider identifications, keyed by
//! a stable hash of the source identity and segment offset. Entries expire
//! after a configurable TTL; unreadable or corrupt entries are treated as
//! misses, never as errors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::providers::IdentifiedTrack;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    cached_at: DateTime<Utc>,
    hit: IdentifiedTrack,
}

/// File-based cache of segment identification results
#[derive(Debug)]
pub struct IdentificationCache {
    dir: PathBuf,
    ttl_secs: u64,
}

impl IdentificationCache {
    /// Open (creating if needed) a cache directory with the given TTL
    pub fn open(dir: impl Into<PathBuf>, ttl_secs: u64) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl_secs })
    }

    /// Stable cache key for one segment of one source
    pub fn segment_key(source: &str, start_secs: f64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{source}:{start_secs:.3}").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a cached identification
    ///
    /// Expired entries are deleted on read; corrupt or unreadable entries are
    /// logged and reported as misses.
    pub fn get(&self, key: &str) -> Option<IdentifiedTrack> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt cache entry treated as miss");
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(entry.cached_at);
        if age.num_seconds() < 0 || age.num_seconds() as u64 > self.ttl_secs {
            tracing::debug!(key, "Cache entry expired");
            let _ = std::fs::remove_file(&path);
            return None;
        }

        tracing::debug!(key, "Cache hit");
        Some(entry.hit)
    }

    /// Store an identification (best-effort; failures are logged)
    pub fn set(&self, key: &str, hit: &IdentifiedTrack) {
        let entry = CacheEntry {
            cached_at: Utc::now(),
            hit: hit.clone(),
        };
        let path = self.entry_path(key);
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!(key, error = %e, "Failed to write cache entry");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "Failed to serialize cache entry"),
        }
    }

    /// Remove all cache entries
    pub fn clear(&self) -> std::io::Result<()> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

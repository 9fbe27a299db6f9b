//! Mix-level metadata carried through to the output writers

use serde::Serialize;

/// Metadata describing the source mix as a whole
#[derive(Debug, Clone, Serialize)]
pub struct MixInfo {
    /// Mix title (tag title, falling back to the file stem)
    pub title: String,
    /// Mix artist/uploader, when tagged
    pub artist: Option<String>,
    /// Release date (`YYYY-MM-DD`), when tagged
    pub date: Option<String>,
    /// Source path or URL the mix was read from
    pub source: String,
    /// Total mix duration in seconds
    pub duration_secs: f64,
}

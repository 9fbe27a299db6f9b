//! Fuzzy track similarity
//!
//! Decides whether two identified tracks are the same logical song despite
//! differing metadata formatting: remix/edit qualifiers, featuring-artist
//! variants, punctuation, and provider-specific casing.
//!
//! Built as a pipeline of small, independently testable string transforms
//! feeding a length-penalized similarity ratio, rather than one regex
//! cascade. The base ratio is `strsim::normalized_levenshtein`.

use crate::models::Track;

/// Minimum penalized ratio for two base titles to match
const TITLE_THRESHOLD: f64 = 0.90;

/// Minimum penalized ratio for two normalized artists to match
const ARTIST_THRESHOLD: f64 = 0.85;

/// Minimum plain ratio between base titles for a remix relationship
const REMIX_BASE_THRESHOLD: f64 = 0.8;

/// Base titles whose lengths differ by more than this never match on ratio
const MAX_TITLE_LENGTH_DIFF: usize = 3;

/// Remix/version vocabulary recognized in title qualifiers
const VERSION_VOCAB: &[&str] = &[
    "remix",
    "mix",
    "edit",
    "version",
    "extended",
    "radio",
    "club",
    "original",
    "instrumental",
    "remaster",
    "remastered",
    "live",
    "acoustic",
    "unplugged",
];

/// Artist-joining tokens folded into a canonical `feat` separator
const ARTIST_JOINERS: &[&str] = &["feat", "ft", "featuring", "with", "and", "vs"];

/// Featuring markers that start a strippable title suffix
const FEAT_MARKERS: &[&str] = &["feat", "ft", "featuring"];

/// Spelled-out trailing numerals stripped from base titles
const SPELLED_NUMBERS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

fn strip_token_dot(token: &str) -> &str {
    token.trim_end_matches('.')
}

/// Lowercase, collapse whitespace, and drop punctuation
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an artist credit for comparison
///
/// All joining conventions (`feat`, `ft.`, `featuring`, `with`, `and`, `&`,
/// `vs`) collapse into a single canonical ` feat ` separator, then
/// punctuation is dropped. `"A & B"`, `"A feat. B"`, and `"A featuring B"`
/// all normalize to `"a feat b"`.
pub fn normalize_artist(artist: &str) -> String {
    let lowered = artist.to_lowercase();
    let folded: Vec<&str> = lowered
        .split_whitespace()
        .map(|token| {
            if token == "&" || ARTIST_JOINERS.contains(&strip_token_dot(token)) {
                "feat"
            } else {
                token
            }
        })
        .collect();
    normalize(&folded.join(" "))
}

/// Primary artist: the credit before the first canonical `feat` separator
pub fn primary_artist(normalized: &str) -> &str {
    normalized.split(" feat ").next().unwrap_or("").trim()
}

fn strip_featuring_suffix(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && FEAT_MARKERS.contains(&strip_token_dot(token)) {
            return tokens[..i].join(" ");
        }
    }
    tokens.join(" ")
}

fn strip_bracketed(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth_paren = 0usize;
    let mut depth_square = 0usize;
    for c in text.chars() {
        match c {
            '(' => depth_paren += 1,
            ')' => depth_paren = depth_paren.saturating_sub(1),
            '[' => depth_square += 1,
            ']' => depth_square = depth_square.saturating_sub(1),
            _ if depth_paren == 0 && depth_square == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn strip_hyphen_qualifier(text: &str) -> &str {
    match text.find(" - ") {
        Some(idx) => &text[..idx],
        None => text,
    }
}

fn strip_version_suffix(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && VERSION_VOCAB.contains(token) {
            return tokens[..i].join(" ");
        }
    }
    tokens.join(" ")
}

fn strip_number_suffix(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() > 1 && tokens[tokens.len() - 1].chars().all(|c| c.is_ascii_digit()) {
        tokens.pop();
        // "Pt. 3" / "Part 2" style suffixes drop the marker token too
        if tokens.len() > 1 && matches!(*tokens.last().unwrap(), "pt" | "part") {
            tokens.pop();
        }
    }
    if tokens.len() > 1 && SPELLED_NUMBERS.contains(tokens.last().unwrap()) {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Reduce a title to its base name: qualifiers, featuring credits,
/// remix/version vocabulary, and numbered suffixes stripped
pub fn base_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let no_feat = strip_featuring_suffix(&collapsed);
    let no_brackets = strip_bracketed(&no_feat);
    let no_hyphen = strip_hyphen_qualifier(&no_brackets);
    let normalized = normalize(no_hyphen);
    let no_version = strip_version_suffix(&normalized);
    strip_number_suffix(&no_version)
}

/// Whether a raw title carries a trailing numeral (covers `Song 2`,
/// `Pt. 3`, `Part 2` alike)
pub fn has_numbered_suffix(title: &str) -> bool {
    title
        .trim_end()
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_digit())
}

/// Whether a raw title contains remix/version vocabulary as a whole word
pub fn contains_version_vocab(title: &str) -> bool {
    let lowered = title.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| VERSION_VOCAB.contains(&word))
}

/// Plain similarity ratio between two strings (0.0 for any empty side)
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Penalty factor for an absolute length difference between compared strings
///
/// Steep falloff: 1.0 at equal lengths, then 0.85, 0.65, 0.45, 0.25,
/// shrinking by 0.20 per additional character down to 0.0.
fn length_penalty(len_diff: usize) -> f64 {
    if len_diff == 0 {
        1.0
    } else {
        (0.85 - 0.20 * (len_diff as f64 - 1.0)).max(0.0)
    }
}

/// Similarity ratio penalized by the absolute string-length difference
pub fn length_penalized_ratio(a: &str, b: &str) -> f64 {
    let len_diff = a.chars().count().abs_diff(b.chars().count());
    similarity_ratio(a, b) * length_penalty(len_diff)
}

/// Whether two raw titles are remix/version variants of the same base song
fn is_remix_relationship(raw_a: &str, raw_b: &str, base_a: &str, base_b: &str) -> bool {
    similarity_ratio(base_a, base_b) >= REMIX_BASE_THRESHOLD
        && (contains_version_vocab(raw_a) || contains_version_vocab(raw_b))
}

/// Decide whether two tracks identify the same logical song
///
/// A numbered variation (`Song` vs `Song 2`) is never similar, overriding
/// every other heuristic. Otherwise the tracks match when the base titles
/// match (exact, or penalized ratio over the title threshold with a bounded
/// length difference) or stand in a remix relationship, and the normalized
/// artists match (exact, shared primary artist, or penalized ratio over the
/// artist threshold).
pub fn is_similar(a: &Track, b: &Track) -> bool {
    if has_numbered_suffix(a.song_name()) || has_numbered_suffix(b.song_name()) {
        return false;
    }

    let base_a = base_title(a.song_name());
    let base_b = base_title(b.song_name());

    let title_match = if base_a == base_b {
        true
    } else if base_a.chars().count().abs_diff(base_b.chars().count()) > MAX_TITLE_LENGTH_DIFF {
        false
    } else {
        length_penalized_ratio(&base_a, &base_b) >= TITLE_THRESHOLD
    };

    let remix = is_remix_relationship(a.song_name(), b.song_name(), &base_a, &base_b);

    let artist_a = normalize_artist(a.artist());
    let artist_b = normalize_artist(b.artist());
    let artist_match = artist_a == artist_b
        || primary_artist(&artist_a) == primary_artist(&artist_b)
        || length_penalized_ratio(&artist_a, &artist_b) >= ARTIST_THRESHOLD;

    (title_match || remix) && artist_match
}

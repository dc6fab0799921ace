//! Track metadata type

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Values that sources emit when they have nothing real to report
const PLACEHOLDERS: &[&str] = &[
    "",
    "unknown",
    "unknown artist",
    "unknown title",
    "null",
    "(null)",
    "n/a",
    "-",
];

/// Metadata for the track a device is playing
///
/// Two records describe the same track when artist, title and album match;
/// genre, track number and duration are informational only. A changed
/// track is always a new instance, never a mutation of the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Artist name
    pub artist: String,
    /// Track title
    pub title: String,
    /// Album name
    pub album: Option<String>,
    /// Genre
    pub genre: Option<String>,
    /// Position of the track on its album
    pub track_number: Option<u32>,
    /// Track duration in microseconds
    pub duration_us: Option<u64>,
}

impl TrackMetadata {
    /// Create track metadata from artist and title
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into().trim().to_string(),
            title: title.into().trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = non_empty(album.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = non_empty(genre.into());
        self
    }

    pub fn with_track_number(mut self, number: u32) -> Self {
        self.track_number = Some(number);
        self
    }

    pub fn with_duration_us(mut self, duration_us: u64) -> Self {
        self.duration_us = Some(duration_us);
        self
    }

    /// Whether both artist and title carry real values
    pub fn is_valid(&self) -> bool {
        !is_placeholder(&self.artist) && !is_placeholder(&self.title)
    }

    /// Duration in whole seconds, if known
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_us.map(|us| us / 1_000_000)
    }

    fn album_key(&self) -> Option<&str> {
        self.album.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Check whether a metadata value is empty or a known placeholder
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    PLACEHOLDERS.contains(&value.as_str())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl PartialEq for TrackMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.artist.trim() == other.artist.trim()
            && self.title.trim() == other.title.trim()
            && self.album_key() == other.album_key()
    }
}

impl Eq for TrackMetadata {}

impl Hash for TrackMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.artist.trim().hash(state);
        self.title.trim().hash(state);
        self.album_key().hash(state);
    }
}

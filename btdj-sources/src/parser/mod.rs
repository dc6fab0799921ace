//! Text parsers for external tool output
//!
//! One module per output format. Every parser is a pure function that
//! returns an optional structured result; none of them fail loudly, since
//! malformed output simply means "no candidate".

pub mod bluetoothctl;
pub mod bus;
pub mod key_value;
pub mod pactl;
pub mod playerctl;

use btdj_state::{Candidate, DeviceId, PlaybackState, SourceKind, TrackMetadata};

/// What one parser could extract about one player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlayer {
    /// Device the output belongs to, when the format names one
    pub device: Option<DeviceId>,
    pub track: Option<TrackMetadata>,
    pub state: Option<PlaybackState>,
}

impl ParsedPlayer {
    /// Convert into a reconciler candidate, or `None` if nothing usable was found
    pub fn into_candidate(self, source: SourceKind) -> Option<Candidate> {
        let mut candidate = Candidate::new(self.device, source);
        candidate.track = self.track;
        candidate.state = self.state.filter(|s| s.is_known());
        (!candidate.is_empty()).then_some(candidate)
    }
}

/// Accumulates track fields under the names the different tools use
#[derive(Debug, Default)]
pub(crate) struct TrackFields {
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    track_number: Option<u32>,
    pub(crate) duration_us: Option<u64>,
    pub(crate) status: Option<PlaybackState>,
}

impl TrackFields {
    /// Record a field by its (namespace-free, case-insensitive) key
    ///
    /// Returns `false` for keys this helper does not know, leaving
    /// format-specific keys such as durations to the caller.
    pub(crate) fn set(&mut self, key: &str, value: &str) -> bool {
        let value = value.trim();
        match normalize_key(key).as_str() {
            "artist" => self.artist = Some(value.to_string()),
            "albumartist" | "performer" => {
                self.artist.get_or_insert_with(|| value.to_string());
            }
            "title" => self.title = Some(value.to_string()),
            "album" => self.album = Some(value.to_string()),
            "genre" => self.genre = Some(value.to_string()),
            "tracknumber" | "tracknum" => {
                self.track_number = parse_number(value).and_then(|n| u32::try_from(n).ok());
            }
            "status" | "state" | "playbackstatus" => {
                self.status = Some(PlaybackState::from_status(value));
            }
            _ => return false,
        }
        true
    }

    /// Build the track if both artist and title were seen
    pub(crate) fn track(&self) -> Option<TrackMetadata> {
        let artist = self.artist.as_deref()?;
        let title = self.title.as_deref()?;

        let mut track = TrackMetadata::new(artist, title);
        if let Some(album) = &self.album {
            track = track.with_album(album.as_str());
        }
        if let Some(genre) = &self.genre {
            track = track.with_genre(genre.as_str());
        }
        if let Some(number) = self.track_number {
            track = track.with_track_number(number);
        }
        if let Some(duration) = self.duration_us {
            track = track.with_duration_us(duration);
        }
        Some(track)
    }

    pub(crate) fn into_player(self, device: Option<DeviceId>) -> ParsedPlayer {
        ParsedPlayer {
            device,
            track: self.track(),
            state: self.status.filter(|s| s.is_known()),
        }
    }
}

/// Lower-case a key and drop any `xesam:`-style namespace and separators
pub(crate) fn normalize_key(key: &str) -> String {
    let key = key.trim();
    let key = key.rsplit_once(':').map_or(key, |(_, name)| name);
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parse `42`, `0x0000002a` or `0x0000002a (42)`
pub(crate) fn parse_number(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Some((_, rest)) = value.split_once('(') {
        if let Some(decimal) = rest.strip_suffix(')') {
            if let Ok(n) = decimal.trim().parse() {
                return Some(n);
            }
        }
    }

    let token = value.split_whitespace().next()?;
    match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

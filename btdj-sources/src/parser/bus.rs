//! Property dictionaries from the audio-control bus
//!
//! A media player on the bus exposes `Status`, a `Track` dictionary and,
//! on the device object, `Connected`. Change notifications carry only the
//! properties that changed.

use std::collections::HashMap;

use btdj_state::PlaybackState;
use serde::{Deserialize, Serialize};

use super::{ParsedPlayer, TrackFields};

/// A loosely typed bus property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BusValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    Str(String),
    Dict(BusProperties),
}

/// Property name to value
pub type BusProperties = HashMap<String, BusValue>;

impl BusValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BusValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            BusValue::U32(n) => Some(u64::from(*n)),
            BusValue::U64(n) => Some(*n),
            BusValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BusValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BusProperties> {
        match self {
            BusValue::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<&str> for BusValue {
    fn from(value: &str) -> Self {
        BusValue::Str(value.to_string())
    }
}

impl From<u32> for BusValue {
    fn from(value: u32) -> Self {
        BusValue::U32(value)
    }
}

impl From<bool> for BusValue {
    fn from(value: bool) -> Self {
        BusValue::Bool(value)
    }
}

/// Everything a property dictionary can say about a device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusUpdate {
    pub player: ParsedPlayer,
    /// `Some(false)` is explicit disconnect evidence
    pub connected: Option<bool>,
}

/// Interpret a property dictionary
///
/// `Track.Duration` is in milliseconds. Properties that are missing or of
/// the wrong type are skipped.
pub fn parse_properties(properties: &BusProperties) -> BusUpdate {
    let mut fields = TrackFields::default();

    if let Some(status) = properties.get("Status").and_then(BusValue::as_str) {
        fields.status = Some(PlaybackState::from_status(status));
    }

    if let Some(track) = properties.get("Track").and_then(BusValue::as_dict) {
        for (key, value) in track {
            match (key.as_str(), value) {
                ("Duration", value) => {
                    fields.duration_us = value.as_u64().map(|ms| ms * 1_000);
                }
                ("TrackNumber", value) => {
                    if let Some(number) = value.as_u64() {
                        fields.set(key, &number.to_string());
                    }
                }
                (_, BusValue::Str(text)) => {
                    fields.set(key, text);
                }
                _ => {}
            }
        }
    }

    BusUpdate {
        player: fields.into_player(None),
        connected: properties.get("Connected").and_then(BusValue::as_bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btdj_state::TrackMetadata;

    fn track_dict(entries: &[(&str, BusValue)]) -> BusValue {
        BusValue::Dict(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_parse_full_properties() {
        let mut properties = BusProperties::new();
        properties.insert("Status".into(), "playing".into());
        properties.insert(
            "Track".into(),
            track_dict(&[
                ("Title", "Test Song".into()),
                ("Artist", "Test Artist".into()),
                ("Album", "Test Album".into()),
                ("TrackNumber", 4u32.into()),
                ("Duration", 240_000u32.into()),
            ]),
        );

        let update = parse_properties(&properties);
        let track = update.player.track.unwrap();

        assert_eq!(update.player.state, Some(PlaybackState::Playing));
        assert_eq!(
            track,
            TrackMetadata::new("Test Artist", "Test Song").with_album("Test Album")
        );
        assert_eq!(track.track_number, Some(4));
        assert_eq!(track.duration_us, Some(240_000_000));
        assert_eq!(update.connected, None);
    }

    #[test]
    fn test_parse_connected_flag() {
        let mut properties = BusProperties::new();
        properties.insert("Connected".into(), false.into());

        let update = parse_properties(&properties);
        assert_eq!(update.connected, Some(false));
        assert!(update.player.track.is_none());
        assert!(update.player.state.is_none());
    }

    #[test]
    fn test_wrong_types_are_skipped() {
        let mut properties = BusProperties::new();
        properties.insert("Status".into(), 3u32.into());
        properties.insert("Track".into(), "not a dict".into());

        let update = parse_properties(&properties);
        assert_eq!(update, BusUpdate::default());
    }
}

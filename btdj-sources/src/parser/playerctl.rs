//! `playerctl` output
//!
//! `playerctl metadata` prints either a table
//! ```text
//! spotify mpris:length         240000000
//! spotify xesam:artist         Test Artist
//! spotify xesam:title          Test Song
//! ```
//! or, with a custom format, `key: value` lines. `mpris:length` is in
//! microseconds. `playerctl status` prints a single word.

use btdj_state::PlaybackState;

use super::key_value::split_pair;
use super::{normalize_key, parse_number, ParsedPlayer, TrackFields};

/// Split a table row into `(key, value)`
///
/// The key is the second column and always carries a namespace.
fn split_table_row(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let (player, rest) = line.split_once(char::is_whitespace)?;
    if player.ends_with(':') {
        return None;
    }
    let rest = rest.trim_start();
    let (key, value) = match rest.split_once(char::is_whitespace) {
        Some((key, value)) => (key, value.trim()),
        None => (rest, ""),
    };
    let (namespace, name) = key.split_once(':')?;
    let valid = !namespace.is_empty()
        && !name.is_empty()
        && namespace.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some((key, value))
}

/// Parse `playerctl metadata` output
pub fn parse_metadata(output: &str) -> Option<ParsedPlayer> {
    let mut fields = TrackFields::default();
    let mut recognised = false;

    for line in output.lines() {
        let Some((key, value)) = split_table_row(line).or_else(|| split_pair(line)) else {
            continue;
        };
        if normalize_key(key) == "length" {
            fields.duration_us = parse_number(value);
            recognised = true;
        } else if fields.set(key, value) {
            recognised = true;
        }
    }

    recognised.then(|| fields.into_player(None))
}

/// Parse `playerctl status` output
///
/// "No players found" and anything else unrecognised yields `None`.
pub fn parse_status(output: &str) -> Option<PlaybackState> {
    let state = PlaybackState::from_status(output.lines().next()?.trim());
    state.is_known().then_some(state)
}

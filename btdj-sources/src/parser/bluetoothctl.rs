//! `bluetoothctl` output
//!
//! Two commands are understood:
//!
//! `bluetoothctl devices Connected`
//! ```text
//! Device AA:BB:CC:DD:EE:FF Pixel 8
//! Device 11:22:33:44:55:66 WH-1000XM4
//! ```
//!
//! `bluetoothctl player.show`
//! ```text
//! Player /org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0 (default)
//!         Name: Spotify
//!         Status: playing
//!         Track:
//!                 Title: Song
//!                 Artist: Band
//!                 Duration: 0x0003a980 (240000)
//! ```

use btdj_state::{DeviceId, DeviceInfo};

use super::key_value::split_pair;
use super::{normalize_key, parse_number, ParsedPlayer, TrackFields};

/// Parse the connected-device list
pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("Device ")?;
            let (address, name) = match rest.split_once(char::is_whitespace) {
                Some((address, name)) => (address, name.trim()),
                None => (rest, ""),
            };
            let id = DeviceId::find_in(address)?;
            Some(if name.is_empty() || name.eq_ignore_ascii_case(address) {
                DeviceInfo::new(id)
            } else {
                DeviceInfo::named(id, name)
            })
        })
        .collect()
}

/// Parse `player.show` output
///
/// Fields may appear inside an indented `Track:` block or at the top level.
/// `Duration` is in milliseconds. Returns `None` when the output holds no
/// recognised field (for example "No default player available").
pub fn parse_player(output: &str) -> Option<ParsedPlayer> {
    let mut fields = TrackFields::default();
    let mut device = None;
    let mut recognised = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(path) = trimmed.strip_prefix("Player ") {
            device = DeviceId::find_in(path);
            continue;
        }

        let Some((key, value)) = split_pair(trimmed) else {
            continue;
        };
        if normalize_key(key) == "duration" {
            fields.duration_us = parse_number(value).map(|ms| ms * 1_000);
            recognised = true;
        } else if normalize_key(key) == "name" {
            // Player application name, not the track title
            continue;
        } else if fields.set(key, value) {
            recognised = true;
        }
    }

    recognised.then(|| fields.into_player(device))
}

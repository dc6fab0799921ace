//! Device identity type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one connected audio device
///
/// Sources report devices in different shapes: a bare address
/// (`aa:bb:cc:dd:ee:ff`), an underscore address (`AA_BB_CC_DD_EE_FF`) or a
/// bus object path (`/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0`). All of
/// them normalize to the upper-case colon form so that observations from
/// different sources land on the same device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new DeviceId, normalizing the format
    pub fn new(id: impl AsRef<str>) -> Self {
        let raw = id.as_ref().trim();
        match extract_address(raw) {
            Some(address) => Self(address),
            None => Self(raw.to_string()),
        }
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Find the first device address embedded anywhere in `text`
    ///
    /// Useful for tool output that mentions the device inside a longer
    /// token, e.g. `bluez_sink.AA_BB_CC_DD_EE_FF.a2dp_sink`.
    pub fn find_in(text: &str) -> Option<Self> {
        extract_address(text).map(Self)
    }
}

/// Scan for six two-digit hex groups separated by `:` or `_`
fn extract_address(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    // "XX:XX:XX:XX:XX:XX" is 17 bytes long
    if bytes.len() < 17 {
        return None;
    }

    'outer: for start in 0..=bytes.len() - 17 {
        let window = &bytes[start..start + 17];
        let separator = window[2];
        if separator != b':' && separator != b'_' {
            continue;
        }
        for (index, byte) in window.iter().enumerate() {
            let valid = if index % 3 == 2 {
                *byte == separator
            } else {
                byte.is_ascii_hexdigit()
            };
            if !valid {
                continue 'outer;
            }
        }
        // Reject matches that are part of a longer hex run
        if start > 0 && bytes[start - 1].is_ascii_hexdigit() {
            continue;
        }
        if bytes.get(start + 17).is_some_and(|b| b.is_ascii_hexdigit()) {
            continue;
        }

        let address = window
            .iter()
            .map(|b| if *b == b'_' { ':' } else { b.to_ascii_uppercase() as char })
            .collect();
        return Some(address);
    }

    None
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

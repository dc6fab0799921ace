//! Generic `key: value` / `key = value` metadata
//!
//! The catch-all format for helper scripts and tools that print one field
//! per line:
//!
//! ```text
//! device: AA:BB:CC:DD:EE:FF
//! artist: Test Artist
//! title = Test Song
//! duration: 3:45
//! status: Playing
//! ```

use btdj_state::DeviceId;

use super::{parse_number, normalize_key, ParsedPlayer, TrackFields};

/// Split one line at the first `:` or `=` separator
///
/// `:` only counts when followed by whitespace or the end of the line, so
/// addresses and `xesam:artist`-style keys stay intact.
pub fn split_pair(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let colon = line
        .match_indices(':')
        .map(|(index, _)| index)
        .find(|&index| line[index + 1..].chars().next().map_or(true, char::is_whitespace));
    let equals = line.find('=');

    let index = match (colon, equals) {
        (Some(c), Some(e)) => c.min(e),
        (Some(c), None) => c,
        (None, Some(e)) => e,
        (None, None) => return None,
    };

    let key = line[..index].trim();
    let value = line[index + 1..].trim();
    (!key.is_empty()).then_some((key, value))
}

/// Parse a duration given as seconds (`225`), `m:ss` or `h:mm:ss`
pub fn parse_duration_us(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.contains(':') {
        let mut seconds: u64 = 0;
        for part in value.split(':') {
            seconds = seconds.checked_mul(60)?.checked_add(part.trim().parse().ok()?)?;
        }
        return seconds.checked_mul(1_000_000);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1_000_000.0).round() as u64)
}

/// Parse key/value lines into a player snapshot
///
/// Returns `None` when no recognised field was present.
pub fn parse(output: &str) -> Option<ParsedPlayer> {
    let mut fields = TrackFields::default();
    let mut device = None;
    let mut recognised = false;

    for (key, value) in output.lines().filter_map(split_pair) {
        if fields.set(key, value) {
            recognised = true;
            continue;
        }
        match normalize_key(key).as_str() {
            "device" | "address" => {
                device = Some(DeviceId::new(value));
                recognised = true;
            }
            "duration" => {
                fields.duration_us = parse_duration_us(value);
                recognised = true;
            }
            "durationms" => {
                fields.duration_us = parse_number(value).map(|ms| ms * 1_000);
                recognised = true;
            }
            "length" | "durationus" => {
                fields.duration_us = parse_number(value);
                recognised = true;
            }
            _ => {}
        }
    }

    recognised.then(|| fields.into_player(device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use btdj_state::{PlaybackState, TrackMetadata};
    use rstest::rstest;

    #[rstest]
    #[case("artist: Test Artist", Some(("artist", "Test Artist")))]
    #[case("Title = Test Song", Some(("Title", "Test Song")))]
    #[case("xesam:title: Song", Some(("xesam:title", "Song")))]
    #[case("device: AA:BB:CC:DD:EE:FF", Some(("device", "AA:BB:CC:DD:EE:FF")))]
    #[case("status:", Some(("status", "")))]
    #[case("no separator here", None)]
    #[case(": value", None)]
    fn test_split_pair(#[case] line: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(split_pair(line), expected);
    }

    #[rstest]
    #[case("225", Some(225_000_000))]
    #[case("3:45", Some(225_000_000))]
    #[case("1:00:00", Some(3_600_000_000))]
    #[case("2.5", Some(2_500_000))]
    #[case("soon", None)]
    fn test_parse_duration(#[case] value: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_duration_us(value), expected);
    }

    #[test]
    fn test_parse_scenario_lines() {
        let player = parse("artist: Test Artist\ntitle: Test Song\n").unwrap();
        assert_eq!(player.track, Some(TrackMetadata::new("Test Artist", "Test Song")));
        assert_eq!(player.device, None);
        assert_eq!(player.state, None);
    }

    #[test]
    fn test_parse_full_block() {
        let output = "\
device: aa:bb:cc:dd:ee:ff
Artist = Band
Title = Song
Album = Record
duration: 3:45
status: Paused
";
        let player = parse(output).unwrap();
        let track = player.track.unwrap();

        assert_eq!(player.device, Some(DeviceId::new("AA:BB:CC:DD:EE:FF")));
        assert_eq!(track.album.as_deref(), Some("Record"));
        assert_eq!(track.duration_us, Some(225_000_000));
        assert_eq!(player.state, Some(PlaybackState::Paused));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse("").is_none());
        assert!(parse("hello world\nfoo: bar").is_none());
    }
}

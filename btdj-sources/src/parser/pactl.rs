//! `pactl list short sinks|sources` output
//!
//! ```text
//! 1	bluez_sink.AA_BB_CC_DD_EE_FF.a2dp_sink	module-bluez5-device.c	s16le 2ch 44100Hz	RUNNING
//! 52	bluez_input.AA:BB:CC:DD:EE:FF.2	PipeWire	s16le 2ch 48000Hz	SUSPENDED
//! ```
//!
//! Only Bluetooth rows are reported. The state column is all the
//! information there is: audio is flowing or it is not.

use btdj_state::DeviceId;

/// Audio activity of one Bluetooth stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamActivity {
    pub device: DeviceId,
    pub active: bool,
}

/// Parse the short listing into per-device activity
pub fn parse_activity(output: &str) -> Vec<StreamActivity> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _index = columns.next()?;
            let name = columns.next()?;
            if !name.starts_with("bluez_") {
                return None;
            }
            let device = DeviceId::find_in(name)?;
            let active = match line.split_whitespace().last()? {
                "RUNNING" => true,
                "IDLE" | "SUSPENDED" => false,
                _ => return None,
            };
            Some(StreamActivity { device, active })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_activity() {
        let output = "\
0\talsa_output.pci-0000_00_1f.3.analog-stereo\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tRUNNING
1\tbluez_sink.AA_BB_CC_DD_EE_FF.a2dp_sink\tmodule-bluez5-device.c\ts16le 2ch 44100Hz\tRUNNING
2\tbluez_input.11:22:33:44:55:66.2\tPipeWire\ts16le 2ch 48000Hz\tSUSPENDED
3\tbluez_source.77_88_99_AA_BB_CC.a2dp_source\tmodule-bluez5-device.c\ts16le 2ch 44100Hz\tIDLE
";
        let streams = parse_activity(output);

        assert_eq!(
            streams,
            vec![
                StreamActivity {
                    device: DeviceId::new("AA:BB:CC:DD:EE:FF"),
                    active: true,
                },
                StreamActivity {
                    device: DeviceId::new("11:22:33:44:55:66"),
                    active: false,
                },
                StreamActivity {
                    device: DeviceId::new("77:88:99:AA:BB:CC"),
                    active: false,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_state_is_skipped() {
        let output = "1\tbluez_sink.AA_BB_CC_DD_EE_FF.a2dp_sink\tmodule-bluez5-device.c\ts16le 2ch 44100Hz\tUNKNOWN\n";
        assert!(parse_activity(output).is_empty());
    }
}

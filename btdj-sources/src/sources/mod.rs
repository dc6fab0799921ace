//! Polling sources backed by command-line tools
//!
//! Each source shells out through a shared [`CommandRunner`](crate::CommandRunner)
//! and hands the output to one parser.

mod bluetoothctl;
mod key_value;
mod pactl;
mod playerctl;

pub use bluetoothctl::{BluetoothctlDevices, BluetoothctlPlayer};
pub use key_value::KeyValueCommandSource;
pub use pactl::PactlActivity;
pub use playerctl::Playerctl;

// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::motor::Channel;

/// Command from teleop/scripts -> runtime
///
/// Power is a `u8`, so the 0-255 range is enforced at the wire boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DriveCommand {
    Forward { channel: Channel, power: u8 },
    Backward { channel: Channel, power: u8 },
    Stop { channel: Channel },
    StopAll,
    SetSmooth { enabled: bool },
    SetCalibration { channel: Channel, value: f32 },
    SetStatusInterval { ms: u32 },
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

// Timeouts, topics, motor configuration
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(500);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "diffdrive/cmd/drive"; // commands
pub const TOPIC_STATUS: &str = "diffdrive/state/status"; // telemetry records
pub const TOPIC_HEALTH: &str = "diffdrive/state/health"; // health status

// Serial port for the PWM bridge board
pub const DEFAULT_MOTOR_PORT: &str = "/dev/ttyUSB0";

// PWM bridge channel assignments (forward, backward per motor)
pub const LEFT_FORWARD_PIN: u8 = 12;
pub const LEFT_BACKWARD_PIN: u8 = 13;
pub const RIGHT_FORWARD_PIN: u8 = 14;
pub const RIGHT_BACKWARD_PIN: u8 = 15;

// Calibration persistence
pub const DEFAULT_CALIBRATION_FILE: &str = "calibration.json";

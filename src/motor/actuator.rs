// Single motor channel: direction, commanded power, calibration
//
// Drive operations convert (direction, power) into two non-negative duty
// levels on the forward/backward pins. The forward pin is written before the
// backward pin, so switching to backward zeroes forward first and the two
// windings are never energized together.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pwm::PwmSink;

/// Motor direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Stopped,
}

/// One of the two drive channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }

    pub fn other(self) -> Channel {
        match self {
            Channel::Left => Channel::Right,
            Channel::Right => Channel::Left,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Right => "right",
        }
    }
}

/// One independently actuated motor
pub struct Actuator {
    name: &'static str,
    forward_pin: u8,
    backward_pin: u8,
    direction: Direction,
    power: u8,
    calibration: f32,
    // Last state emitted as a diagnostic, to suppress repeats
    last_reported: (Direction, u8),
}

impl Actuator {
    pub fn new(name: &'static str, forward_pin: u8, backward_pin: u8, calibration: f32) -> Self {
        Self {
            name,
            forward_pin,
            backward_pin,
            direction: Direction::Stopped,
            power: 0,
            calibration: calibration.clamp(0.0, 1.0),
            last_reported: (Direction::Stopped, 0),
        }
    }

    /// Drive forward at `power` (0-255, pre-calibration).
    pub fn forward(&mut self, sink: &mut dyn PwmSink, power: u8) {
        self.direction = Direction::Forward;
        self.power = power;

        let calibrated = self.calibrated_power();
        self.apply(sink, calibrated, 0);
        self.report("forward", calibrated);
    }

    /// Drive backward at `power` (0-255, pre-calibration).
    pub fn backward(&mut self, sink: &mut dyn PwmSink, power: u8) {
        self.direction = Direction::Backward;
        self.power = power;

        let calibrated = self.calibrated_power();
        self.apply(sink, 0, calibrated);
        self.report("backward", calibrated);
    }

    /// Cut power on both pins.
    pub fn stop(&mut self, sink: &mut dyn PwmSink) {
        self.direction = Direction::Stopped;
        self.power = 0;

        self.apply(sink, 0, 0);
        self.report("stop", 0);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn power(&self) -> u8 {
        self.power
    }

    /// Clamped to [0, 1]; takes effect on the next drive call.
    pub fn set_calibration(&mut self, calibration: f32) {
        self.calibration = calibration.clamp(0.0, 1.0);
    }

    pub fn calibration(&self) -> f32 {
        self.calibration
    }

    // Truncating, not rounding: floor(power * calibration)
    fn calibrated_power(&self) -> u8 {
        (self.power as f32 * self.calibration) as u8
    }

    fn apply(&mut self, sink: &mut dyn PwmSink, forward_duty: u8, backward_duty: u8) {
        sink.set_duty(self.forward_pin, forward_duty);
        sink.set_duty(self.backward_pin, backward_duty);
    }

    fn report(&mut self, action: &str, calibrated: u8) {
        if self.last_reported != (self.direction, self.power) {
            debug!(
                "{} motor {}: power {} (calibrated {})",
                self.name, action, self.power, calibrated
            );
            self.last_reported = (self.direction, self.power);
        }
    }
}

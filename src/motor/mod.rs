// Motor control module for the differential-drive pair
//
// Provides:
// - Per-channel actuation with calibration (Actuator)
// - The non-blocking acceleration state machine (RampEngine)
// - PWM bridge serial protocol and a simulated sink

mod actuator;
pub mod pwm;
pub mod ramp;

pub use actuator::{Actuator, Channel, Direction};
pub use pwm::{PwmError, PwmSink, SerialPwmBridge, SimPwmSink};
pub use ramp::{RampEngine, RampParams, DEFAULT_RAMP_STEPS, DEFAULT_STEP_DELAY_MS};

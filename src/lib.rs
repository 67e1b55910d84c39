// Runtime for a two-wheel differential-drive base
//
// The motor module holds the ramp engine: per-channel actuation with
// calibration and a non-blocking stepwise acceleration state machine.
// Everything else adapts it to the outside world: zenoh command ingress,
// rate-limited status egress, calibration persistence.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod telemetry;

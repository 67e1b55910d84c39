// Wrapping millisecond clock for ramp stepping and telemetry pacing
//
// The counter wraps after ~49.7 days, so elapsed time is always computed
// with wrapping subtraction. A comparison across the wrap boundary still
// yields a small non-negative duration.

use std::time::Instant;

/// Monotonic millisecond timestamp, wrapping at `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Millis(pub u32);

impl Millis {
    /// Milliseconds elapsed since `earlier`, correct across wraparound.
    pub fn since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

/// Millisecond source backed by `Instant`, used by the live runtime.
/// Tests construct `Millis` values directly instead.
pub struct MillisClock {
    start: Instant,
}

impl MillisClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> Millis {
        Millis(self.start.elapsed().as_millis() as u32)
    }
}

// Change-aware, rate-limited status publishing
//
// The publisher holds the last materialized snapshot of engine-visible
// state. A new snapshot is materialized only when a field differs from the
// held one, and a record goes out only when the publish interval has also
// elapsed. Changed-but-too-soon data waits; unchanged-but-due data is not
// re-sent. Serialization to the external sink is the runtime's job.

use serde::Serialize;

use crate::clock::Millis;

pub const DEFAULT_PUBLISH_INTERVAL_MS: u32 = 1000;

/// Mirrored state of one motor channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotorStatus {
    pub power: u8,
    pub forward: bool,
    pub cal: f32,
}

/// Engine-visible state mirrored by telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineStatus {
    pub left: MotorStatus,
    pub right: MotorStatus,
    pub accelerating: bool,
    pub smooth_enabled: bool,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            left: MotorStatus {
                power: 0,
                forward: true,
                cal: 1.0,
            },
            right: MotorStatus {
                power: 0,
                forward: true,
                cal: 1.0,
            },
            accelerating: false,
            smooth_enabled: true,
        }
    }
}

/// One published telemetry record; serializes to a single JSON line
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusRecord {
    pub left_motor: MotorStatus,
    pub right_motor: MotorStatus,
    pub accelerating: bool,
    pub smooth_enabled: bool,
    /// Millisecond timestamp of the state change this record captures
    pub timestamp: u32,
}

/// De-duplicating, interval-gated snapshot publisher
pub struct StatusPublisher {
    status: EngineStatus,
    changed_at: Millis,
    dirty: bool,
    enabled: bool,
    interval_ms: u32,
    last_publish_at: Millis,
}

impl StatusPublisher {
    pub fn new(now: Millis) -> Self {
        Self {
            status: EngineStatus::default(),
            changed_at: now,
            dirty: false,
            enabled: true,
            interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
            last_publish_at: now,
        }
    }

    /// Replace the held snapshot if any field differs; no-op otherwise, so
    /// identical updates never churn the timestamp.
    pub fn update(&mut self, candidate: EngineStatus, now: Millis) {
        if candidate != self.status {
            self.status = candidate;
            self.changed_at = now;
            self.dirty = true;
        }
    }

    /// Produce a record when telemetry is enabled, the interval elapsed,
    /// and the snapshot changed since the last publish.
    pub fn publish(&mut self, now: Millis) -> Option<StatusRecord> {
        if !self.enabled {
            return None;
        }
        if now.since(self.last_publish_at) < self.interval_ms {
            return None;
        }
        if !self.dirty {
            return None;
        }

        self.dirty = false;
        self.last_publish_at = now;
        Some(StatusRecord {
            left_motor: self.status.left,
            right_motor: self.status.right,
            accelerating: self.status.accelerating,
            smooth_enabled: self.status.smooth_enabled,
            timestamp: self.changed_at.0,
        })
    }

    /// Minimum spacing between published records.
    pub fn set_interval(&mut self, ms: u32) {
        self.interval_ms = ms;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }
}

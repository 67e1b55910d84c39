// Motion ramp engine for the differential-drive pair
//
// Owns both actuators and one shared ramp cycle. Control operations either
// actuate immediately or set up a cycle toward a per-channel target; the
// cycle is advanced by poll() from the runtime loop, never by blocking.
// A channel whose target direction is Stopped sits out the cycle and keeps
// whatever power it had.

use tracing::{debug, trace};

use super::actuator::{Actuator, Channel, Direction};
use super::pwm::PwmSink;
use crate::calibration::Calibration;
use crate::clock::Millis;
use crate::telemetry::{EngineStatus, MotorStatus, StatusPublisher, StatusRecord};

pub const DEFAULT_SMOOTH_ENABLED: bool = true;
pub const DEFAULT_RAMP_STEPS: u8 = 10;
pub const DEFAULT_STEP_DELAY_MS: u32 = 20;

// Extra steps inserted before ramping into the opposite direction, so the
// reversal gets a non-blocking pause after the intermediate stop.
pub const REVERSAL_PAUSE_STEPS: u16 = 2;

/// Step count and inter-step delay for one ramp cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampParams {
    pub steps: u8,
    pub step_delay_ms: u32,
}

impl Default for RampParams {
    fn default() -> Self {
        Self {
            steps: DEFAULT_RAMP_STEPS,
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
        }
    }
}

/// Per-channel ramp target. Direction Stopped means the channel is not part
/// of the current cycle.
#[derive(Debug, Clone, Copy)]
struct ChannelTarget {
    direction: Direction,
    power: u8,
    // Power at cycle start, the interpolation origin
    start_power: u8,
}

impl ChannelTarget {
    fn idle() -> Self {
        Self {
            direction: Direction::Stopped,
            power: 0,
            start_power: 0,
        }
    }
}

/// Differential-drive ramp engine
pub struct RampEngine<S: PwmSink> {
    sink: S,
    actuators: [Actuator; 2],
    params: RampParams,
    smooth_enabled: bool,

    // Shared ramp cycle state
    accelerating: bool,
    current_step: u16,
    total_steps: u16,
    step_delay_ms: u32,
    last_step_at: Millis,
    targets: [ChannelTarget; 2],

    telemetry: StatusPublisher,
}

impl<S: PwmSink> RampEngine<S> {
    pub fn new(
        sink: S,
        left_pins: (u8, u8),
        right_pins: (u8, u8),
        calibration: Calibration,
        now: Millis,
    ) -> Self {
        Self {
            sink,
            actuators: [
                Actuator::new("left", left_pins.0, left_pins.1, calibration.left),
                Actuator::new("right", right_pins.0, right_pins.1, calibration.right),
            ],
            params: RampParams::default(),
            smooth_enabled: DEFAULT_SMOOTH_ENABLED,
            accelerating: false,
            current_step: 0,
            total_steps: 0,
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
            last_step_at: now,
            targets: [ChannelTarget::idle(), ChannelTarget::idle()],
            telemetry: StatusPublisher::new(now),
        }
    }

    /// Put both channels in a known stopped state and seed the telemetry
    /// snapshot.
    pub fn begin(&mut self, now: Millis) {
        for actuator in &mut self.actuators {
            actuator.stop(&mut self.sink);
        }
        debug!("ramp engine initialized");
        self.refresh_status(now);
    }

    /// Drive a channel forward. Ramps when `smooth` and smoothing is on.
    pub fn forward(&mut self, channel: Channel, power: u8, smooth: bool, now: Millis) {
        self.drive(channel, Direction::Forward, power, self.params, smooth, now);
    }

    /// Drive a channel backward. Ramps when `smooth` and smoothing is on.
    pub fn backward(&mut self, channel: Channel, power: u8, smooth: bool, now: Millis) {
        self.drive(channel, Direction::Backward, power, self.params, smooth, now);
    }

    /// Smooth drive with per-call ramp parameters.
    pub fn drive_with(
        &mut self,
        channel: Channel,
        direction: Direction,
        power: u8,
        params: RampParams,
        now: Millis,
    ) {
        self.drive(channel, direction, power, params, true, now);
    }

    fn drive(
        &mut self,
        channel: Channel,
        direction: Direction,
        power: u8,
        params: RampParams,
        smooth: bool,
        now: Millis,
    ) {
        if direction == Direction::Stopped {
            self.stop_channel(channel, now);
            return;
        }

        let idx = channel.index();
        if smooth && self.smooth_enabled {
            if self.actuators[idx].direction() == direction {
                // Already moving this way; ramp only if the power changes
                if power != self.actuators[idx].power() {
                    self.begin_ramp(channel, direction, power, params, now);
                }
            } else {
                // Direction change or start from stop
                self.begin_transition(channel, direction, power, params, now);
            }
        } else {
            // Immediate change cancels any ramp in progress
            self.accelerating = false;
            match direction {
                Direction::Forward => self.actuators[idx].forward(&mut self.sink, power),
                Direction::Backward => self.actuators[idx].backward(&mut self.sink, power),
                Direction::Stopped => unreachable!(),
            }
        }
        self.refresh_status(now);
    }

    /// Stop one channel: decelerate when smoothing is on and the channel is
    /// moving, otherwise cut power immediately.
    pub fn stop_channel(&mut self, channel: Channel, now: Millis) {
        let idx = channel.index();
        if self.smooth_enabled && self.actuators[idx].power() > 0 {
            // Ramp down at the current direction; the terminal step stops
            let direction = self.actuators[idx].direction();
            self.begin_ramp(channel, direction, 0, self.params, now);
        } else {
            self.accelerating = false;
            self.actuators[idx].stop(&mut self.sink);
        }
        self.refresh_status(now);
    }

    /// Full stop: cancel any ramp and cut power on both channels.
    pub fn stop_all(&mut self, now: Millis) {
        debug!("stopping both channels");
        self.accelerating = false;
        for actuator in &mut self.actuators {
            actuator.stop(&mut self.sink);
        }
        self.refresh_status(now);
    }

    pub fn set_smooth_enabled(&mut self, enabled: bool, now: Millis) {
        self.smooth_enabled = enabled;
        debug!(
            "smooth acceleration {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.refresh_status(now);
    }

    pub fn smooth_enabled(&self) -> bool {
        self.smooth_enabled
    }

    pub fn is_accelerating(&self) -> bool {
        self.accelerating
    }

    pub fn set_ramp_params(&mut self, params: RampParams) {
        self.params = params;
    }

    pub fn set_calibration(&mut self, channel: Channel, value: f32, now: Millis) {
        let idx = channel.index();
        let old = self.actuators[idx].calibration();
        self.actuators[idx].set_calibration(value);
        debug!(
            "{} calibration changed: {:.2} -> {:.2}",
            channel.name(),
            old,
            self.actuators[idx].calibration()
        );
        self.refresh_status(now);
    }

    pub fn calibration(&self, channel: Channel) -> f32 {
        self.actuators[channel.index()].calibration()
    }

    pub fn power(&self, channel: Channel) -> u8 {
        self.actuators[channel.index()].power()
    }

    pub fn direction(&self, channel: Channel) -> Direction {
        self.actuators[channel.index()].direction()
    }

    /// Advance the ramp cycle if one is active and the step delay elapsed.
    /// Pure state advance; never waits.
    pub fn poll(&mut self, now: Millis) {
        if !self.accelerating || !self.smooth_enabled {
            return;
        }
        if now.since(self.last_step_at) < self.step_delay_ms {
            return;
        }

        self.last_step_at = now;
        self.current_step += 1;

        trace!(
            "ramp step {}/{} ({:.0}%)",
            self.current_step,
            self.total_steps,
            self.current_step as f32 / self.total_steps as f32 * 100.0
        );

        if self.current_step >= self.total_steps {
            // Terminal step: apply the exact target so no rounding drift
            // survives the cycle
            for idx in 0..2 {
                let target = self.targets[idx];
                match target.direction {
                    Direction::Stopped => {}
                    _ if target.power == 0 => self.actuators[idx].stop(&mut self.sink),
                    Direction::Forward => {
                        self.actuators[idx].forward(&mut self.sink, target.power)
                    }
                    Direction::Backward => {
                        self.actuators[idx].backward(&mut self.sink, target.power)
                    }
                }
            }
            self.accelerating = false;
            self.refresh_status(now);
            return;
        }

        let progress = self.current_step as f32 / self.total_steps as f32;
        for idx in 0..2 {
            let target = self.targets[idx];
            let power = ramp_power(target.start_power, target.power, progress);
            match target.direction {
                Direction::Stopped => {}
                Direction::Forward => self.actuators[idx].forward(&mut self.sink, power),
                Direction::Backward => self.actuators[idx].backward(&mut self.sink, power),
            }
        }
        self.refresh_status(now);
    }

    /// Set up a ramp cycle for one channel; the other channel sits it out.
    fn begin_ramp(
        &mut self,
        channel: Channel,
        direction: Direction,
        power: u8,
        params: RampParams,
        now: Millis,
    ) {
        self.start_cycle(channel, direction, power, params.steps.max(1) as u16, params, now);
    }

    /// Direction change or start from stop. A channel moving the other way
    /// is stopped immediately and the cycle gets extra steps as a pause, so
    /// the reversal never energizes both windings together.
    fn begin_transition(
        &mut self,
        channel: Channel,
        direction: Direction,
        power: u8,
        params: RampParams,
        now: Millis,
    ) {
        let idx = channel.index();
        let mut total = params.steps.max(1) as u16;

        let current = self.actuators[idx].direction();
        if current != Direction::Stopped && current != direction {
            self.actuators[idx].stop(&mut self.sink);
            total += REVERSAL_PAUSE_STEPS;
        }

        self.start_cycle(channel, direction, power, total, params, now);
    }

    fn start_cycle(
        &mut self,
        channel: Channel,
        direction: Direction,
        power: u8,
        total_steps: u16,
        params: RampParams,
        now: Millis,
    ) {
        let idx = channel.index();
        self.targets[channel.other().index()] = ChannelTarget::idle();
        self.targets[idx] = ChannelTarget {
            direction,
            power,
            start_power: self.actuators[idx].power(),
        };
        self.current_step = 0;
        self.total_steps = total_steps;
        self.step_delay_ms = params.step_delay_ms;
        self.last_step_at = now;
        self.accelerating = true;
        trace!(
            "ramp cycle: {} -> {:?} {} over {} steps",
            channel.name(),
            direction,
            power,
            total_steps
        );
    }

    /// Current engine-visible state, as mirrored by telemetry.
    pub fn status(&self) -> EngineStatus {
        let motor = |a: &Actuator| MotorStatus {
            power: a.power(),
            forward: a.direction() == Direction::Forward,
            cal: a.calibration(),
        };
        EngineStatus {
            left: motor(&self.actuators[0]),
            right: motor(&self.actuators[1]),
            accelerating: self.accelerating,
            smooth_enabled: self.smooth_enabled,
        }
    }

    /// Publish the status snapshot if due; the caller forwards the record
    /// to the telemetry sink.
    pub fn publish(&mut self, now: Millis) -> Option<StatusRecord> {
        self.telemetry.publish(now)
    }

    pub fn publisher(&mut self) -> &mut StatusPublisher {
        &mut self.telemetry
    }

    fn refresh_status(&mut self, now: Millis) {
        let status = self.status();
        self.telemetry.update(status, now);
    }
}

// Linear interpolation from the cycle's start power toward the target,
// truncating. From a standstill this reduces to floor(target * progress);
// toward a lower target the sequence is non-increasing. The terminal step
// bypasses this and applies the target exactly.
fn ramp_power(start: u8, target: u8, progress: f32) -> u8 {
    (start as f32 + (target as f32 - start as f32) * progress) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::pwm::testing::RecordingSink;
    use crate::motor::pwm::SimPwmSink;

    const LEFT_PINS: (u8, u8) = (12, 13);
    const RIGHT_PINS: (u8, u8) = (14, 15);
    const T0: Millis = Millis(1_000);

    fn engine<S: PwmSink>(sink: S) -> RampEngine<S> {
        let mut engine = RampEngine::new(sink, LEFT_PINS, RIGHT_PINS, Calibration::default(), T0);
        engine.begin(T0);
        engine
    }

    // Poll once per configured step delay, starting after `from`
    fn run_steps<S: PwmSink>(engine: &mut RampEngine<S>, from: Millis, steps: u32) -> Millis {
        let mut now = from;
        for _ in 0..steps {
            now = Millis(now.0.wrapping_add(DEFAULT_STEP_DELAY_MS));
            engine.poll(now);
        }
        now
    }

    #[test]
    fn test_accelerate_from_stop_hits_target_exactly() {
        let mut engine = engine(SimPwmSink::new());

        engine.forward(Channel::Left, 200, true, T0);
        assert!(engine.is_accelerating());
        // Target not applied yet; ramping starts on poll
        assert_eq!(engine.power(Channel::Left), 0);

        // Step 5 of 10: floor(200 * 5/10) = 100
        let now = run_steps(&mut engine, T0, 5);
        assert_eq!(engine.power(Channel::Left), 100);
        assert_eq!(engine.direction(Channel::Left), Direction::Forward);

        // Steps 6..10 finish the cycle at the exact target
        run_steps(&mut engine, now, 5);
        assert_eq!(engine.power(Channel::Left), 200);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_polled_powers_monotone_while_accelerating() {
        let mut engine = engine(SimPwmSink::new());
        engine.forward(Channel::Right, 255, true, T0);

        let mut now = T0;
        let mut last = 0u8;
        for _ in 0..DEFAULT_RAMP_STEPS {
            now = Millis(now.0 + DEFAULT_STEP_DELAY_MS);
            engine.poll(now);
            let power = engine.power(Channel::Right);
            assert!(power >= last, "power {} dropped below {}", power, last);
            last = power;
        }
        assert_eq!(last, 255);
    }

    #[test]
    fn test_decelerate_is_monotone_and_exact() {
        let mut engine = engine(SimPwmSink::new());

        // Get moving without a ramp, then request a lower power smoothly
        engine.forward(Channel::Left, 200, false, T0);
        assert_eq!(engine.power(Channel::Left), 200);

        engine.forward(Channel::Left, 80, true, T0);
        assert!(engine.is_accelerating());

        let mut now = T0;
        let mut last = 200u8;
        for _ in 0..DEFAULT_RAMP_STEPS {
            now = Millis(now.0 + DEFAULT_STEP_DELAY_MS);
            engine.poll(now);
            let power = engine.power(Channel::Left);
            assert!(power <= last, "power {} rose above {}", power, last);
            last = power;
        }
        assert_eq!(engine.power(Channel::Left), 80);
        assert_eq!(engine.direction(Channel::Left), Direction::Forward);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_same_direction_same_power_starts_no_ramp() {
        let mut engine = engine(SimPwmSink::new());
        engine.forward(Channel::Left, 150, false, T0);
        engine.forward(Channel::Left, 150, true, T0);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_reversal_stops_first_and_inflates_steps() {
        let mut engine = engine(SimPwmSink::new());

        engine.forward(Channel::Left, 150, false, T0);
        engine.backward(Channel::Left, 200, true, T0);

        // Intermediate stop observed before the reverse ramp begins
        assert_eq!(engine.direction(Channel::Left), Direction::Stopped);
        assert_eq!(engine.power(Channel::Left), 0);
        assert!(engine.is_accelerating());
        assert_eq!(engine.total_steps, DEFAULT_RAMP_STEPS as u16 + REVERSAL_PAUSE_STEPS);

        // The inflated cycle still converges on the exact target
        run_steps(&mut engine, T0, DEFAULT_RAMP_STEPS as u32 + 2);
        assert_eq!(engine.direction(Channel::Left), Direction::Backward);
        assert_eq!(engine.power(Channel::Left), 200);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_reversal_never_energizes_both_windings() {
        let mut engine = engine(RecordingSink::new());

        engine.forward(Channel::Left, 150, false, T0);
        engine.backward(Channel::Left, 200, true, T0);
        run_steps(&mut engine, T0, DEFAULT_RAMP_STEPS as u32 + 2);

        // Replay every write; the left pins must never be nonzero together
        let mut forward_duty = 0u8;
        let mut backward_duty = 0u8;
        for &(pin, duty) in &engine.sink.writes {
            if pin == LEFT_PINS.0 {
                forward_duty = duty;
            } else if pin == LEFT_PINS.1 {
                backward_duty = duty;
            }
            assert!(
                forward_duty == 0 || backward_duty == 0,
                "both windings energized: fwd {} bwd {}",
                forward_duty,
                backward_duty
            );
        }
    }

    #[test]
    fn test_other_channel_sits_out_the_cycle() {
        let mut engine = engine(SimPwmSink::new());

        engine.forward(Channel::Right, 120, false, T0);
        engine.forward(Channel::Left, 200, true, T0);
        run_steps(&mut engine, T0, DEFAULT_RAMP_STEPS as u32);

        // The right channel kept its power through the left ramp
        assert_eq!(engine.power(Channel::Right), 120);
        assert_eq!(engine.power(Channel::Left), 200);
    }

    #[test]
    fn test_poll_respects_step_delay() {
        let mut engine = engine(SimPwmSink::new());
        engine.forward(Channel::Left, 200, true, T0);

        // Too soon: no step
        engine.poll(Millis(T0.0 + DEFAULT_STEP_DELAY_MS - 1));
        assert_eq!(engine.current_step, 0);
        assert_eq!(engine.power(Channel::Left), 0);

        engine.poll(Millis(T0.0 + DEFAULT_STEP_DELAY_MS));
        assert_eq!(engine.current_step, 1);
    }

    #[test]
    fn test_poll_steps_across_clock_wraparound() {
        let t0 = Millis(u32::MAX - 50);
        let mut engine =
            RampEngine::new(SimPwmSink::new(), LEFT_PINS, RIGHT_PINS, Calibration::default(), t0);
        engine.begin(t0);

        engine.forward(Channel::Left, 200, true, t0);
        run_steps(&mut engine, t0, DEFAULT_RAMP_STEPS as u32);

        assert_eq!(engine.power(Channel::Left), 200);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_stop_all_cancels_ramp_immediately() {
        let mut engine = engine(SimPwmSink::new());

        engine.forward(Channel::Left, 200, true, T0);
        let now = run_steps(&mut engine, T0, 3);
        assert!(engine.is_accelerating());

        engine.stop_all(now);
        assert!(!engine.is_accelerating());
        assert_eq!(engine.power(Channel::Left), 0);
        assert_eq!(engine.power(Channel::Right), 0);
        assert_eq!(engine.direction(Channel::Left), Direction::Stopped);

        // No queued step survives the stop
        run_steps(&mut engine, now, 3);
        assert_eq!(engine.power(Channel::Left), 0);
        assert_eq!(engine.current_step, 3);
    }

    #[test]
    fn test_stop_channel_decelerates_to_stopped() {
        let mut engine = engine(SimPwmSink::new());

        engine.forward(Channel::Left, 120, false, T0);
        engine.stop_channel(Channel::Left, T0);
        assert!(engine.is_accelerating());
        // Still moving forward while the ramp winds down
        assert_eq!(engine.direction(Channel::Left), Direction::Forward);

        run_steps(&mut engine, T0, DEFAULT_RAMP_STEPS as u32);
        assert_eq!(engine.direction(Channel::Left), Direction::Stopped);
        assert_eq!(engine.power(Channel::Left), 0);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_stop_channel_immediate_when_smoothing_off() {
        let mut engine = engine(SimPwmSink::new());
        engine.set_smooth_enabled(false, T0);

        engine.forward(Channel::Left, 120, false, T0);
        engine.stop_channel(Channel::Left, T0);
        assert_eq!(engine.power(Channel::Left), 0);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_immediate_when_smoothing_disabled() {
        let mut engine = engine(SimPwmSink::new());
        engine.set_smooth_enabled(false, T0);

        engine.forward(Channel::Left, 200, true, T0);
        assert_eq!(engine.power(Channel::Left), 200);
        assert!(!engine.is_accelerating());
    }

    #[test]
    fn test_immediate_request_cancels_ramp() {
        let mut engine = engine(SimPwmSink::new());

        engine.forward(Channel::Left, 200, true, T0);
        assert!(engine.is_accelerating());

        engine.forward(Channel::Left, 90, false, T0);
        assert!(!engine.is_accelerating());
        assert_eq!(engine.power(Channel::Left), 90);
    }

    #[test]
    fn test_drive_with_overrides_params() {
        let mut engine = engine(SimPwmSink::new());
        let params = RampParams {
            steps: 4,
            step_delay_ms: 50,
        };

        engine.drive_with(Channel::Left, Direction::Forward, 100, params, T0);
        assert_eq!(engine.total_steps, 4);

        // The per-call delay gates stepping
        engine.poll(Millis(T0.0 + 20));
        assert_eq!(engine.current_step, 0);
        engine.poll(Millis(T0.0 + 50));
        assert_eq!(engine.current_step, 1);
        assert_eq!(engine.power(Channel::Left), 25);
    }

    #[test]
    fn test_calibration_delegates_and_clamps() {
        let mut engine = engine(SimPwmSink::new());
        engine.set_calibration(Channel::Right, 1.4, T0);
        assert_eq!(engine.calibration(Channel::Right), 1.0);
        engine.set_calibration(Channel::Right, 0.5, T0);
        assert_eq!(engine.calibration(Channel::Right), 0.5);

        // floor(201 * 0.5) = 100 on the wire
        engine.forward(Channel::Right, 201, false, T0);
        assert_eq!(engine.sink.duty(RIGHT_PINS.0), 100);
    }
}

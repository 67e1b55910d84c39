// 50 Hz loop with watchdog
//
// Drains drive commands from zenoh, applies them to the ramp engine, and
// advances the ramp and telemetry on every tick. The watchdog stops both
// channels if the command stream goes stale, so a crashed teleop cannot
// leave the robot driving.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

use crate::calibration::{Calibration, CalibrationStore};
use crate::clock::{Millis, MillisClock};
use crate::config::{
    CMD_TIMEOUT, LEFT_BACKWARD_PIN, LEFT_FORWARD_PIN, LOOP_HZ, RIGHT_BACKWARD_PIN,
    RIGHT_FORWARD_PIN, TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_STATUS,
};
use crate::messages::{DriveCommand, RuntimeHealth};
use crate::motor::{Channel, PwmSink, RampEngine, SerialPwmBridge, SimPwmSink};

/// Runtime configuration, filled in from the CLI
pub struct RunOptions {
    /// Serial port of the PWM bridge; None runs with a simulated sink
    pub port: Option<String>,
    pub calibration_file: PathBuf,
    pub status_interval_ms: u32,
    pub smooth: bool,
}

/// Apply one decoded command to the engine; calibration changes are also
/// persisted through the store.
fn apply_command<S: PwmSink>(
    engine: &mut RampEngine<S>,
    store: &CalibrationStore,
    cmd: DriveCommand,
    now: Millis,
) {
    match cmd {
        DriveCommand::Forward { channel, power } => engine.forward(channel, power, true, now),
        DriveCommand::Backward { channel, power } => engine.backward(channel, power, true, now),
        DriveCommand::Stop { channel } => engine.stop_channel(channel, now),
        DriveCommand::StopAll => engine.stop_all(now),
        DriveCommand::SetSmooth { enabled } => engine.set_smooth_enabled(enabled, now),
        DriveCommand::SetCalibration { channel, value } => {
            engine.set_calibration(channel, value, now);
            let calibration = Calibration {
                left: engine.calibration(Channel::Left),
                right: engine.calibration(Channel::Right),
            };
            if let Err(e) = store.save(calibration) {
                warn!("Failed to persist calibration: {}", e);
            }
        }
        DriveCommand::SetStatusInterval { ms } => engine.publisher().set_interval(ms),
    }
}

pub async fn run(opts: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let pub_status = session.declare_publisher(TOPIC_STATUS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let store = CalibrationStore::new(&opts.calibration_file);
    let calibration = match store.load() {
        Ok(calibration) => calibration,
        Err(e) => {
            warn!("Failed to load calibration, using defaults: {}", e);
            Calibration::default()
        }
    };
    info!(
        "Calibration: left={:.2}, right={:.2}",
        calibration.left, calibration.right
    );

    let sink: Box<dyn PwmSink + Send> = match &opts.port {
        Some(port) => {
            info!("Opening PWM bridge on {}", port);
            Box::new(SerialPwmBridge::open(port)?)
        }
        None => {
            info!("No serial port given, running with simulated motors");
            Box::new(SimPwmSink::new())
        }
    };

    let clock = MillisClock::start();
    let now = clock.now();
    let mut engine = RampEngine::new(
        sink,
        (LEFT_FORWARD_PIN, LEFT_BACKWARD_PIN),
        (RIGHT_FORWARD_PIN, RIGHT_BACKWARD_PIN),
        calibration,
        now,
    );
    engine.begin(now);
    engine.set_smooth_enabled(opts.smooth, now);
    engine.publisher().set_interval(opts.status_interval_ms);

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let mut last_cmd_at = Instant::now();
    let mut health = RuntimeHealth::CmdStale; // Start stale until first cmd

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_DRIVE);
    info!("Publishing to: {}, {}", TOPIC_STATUS, TOPIC_HEALTH);

    loop {
        tick.tick().await;
        let now = clock.now();

        // 1. Drain all pending commands (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => {
                    last_cmd_at = Instant::now();
                    health = RuntimeHealth::Ok;
                    apply_command(&mut engine, &store, cmd, now);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Watchdog: stop the robot once when commands go stale
        if last_cmd_at.elapsed() > CMD_TIMEOUT {
            if health == RuntimeHealth::Ok {
                warn!(
                    "Command stale ({:?} old), stopping robot",
                    last_cmd_at.elapsed()
                );
                engine.stop_all(now);
            }
            health = RuntimeHealth::CmdStale;
        }

        // 3. Advance the ramp state machine
        engine.poll(now);

        // 4. Publish telemetry when due and changed
        if let Some(record) = engine.publish(now) {
            let record_json = serde_json::to_string(&record)?;
            pub_status.put(record_json).await?;
        }

        // 5. Publish health
        let health_json = serde_json::to_string(&health)?;
        pub_health.put(health_json).await?;
    }
}

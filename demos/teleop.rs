// Keyboard teleop: W/S drive, A/D pivot, R/F power, Space stop, Q quit
//
// Movement commands go out on change and as a 400ms keepalive so the
// runtime watchdog stays fed without restarting ramps mid-cycle.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use diffdrive_runtime::config::TOPIC_CMD_DRIVE;
use diffdrive_runtime::messages::DriveCommand;
use diffdrive_runtime::motor::Channel;

const POWER_LEVELS: [u8; 3] = [80, 160, 240];
const CALIBRATION_STEP: f32 = 0.05;
const INPUT_TIMEOUT_MS: u64 = 150; // Stop after this much time with no input
const KEEPALIVE_MS: u64 = 400; // Re-send held state for the watchdog

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Stopped,
    Forward,
    Backward,
    PivotLeft,
    PivotRight,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: W/S=drive, A/D=pivot, R/F=power, U/J & I/K=calibration, M=smooth, Space=stop, Q=quit");
    info!("Power: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut power_idx: usize = 0;
    let mut motion = Motion::Stopped;
    let mut published_motion = Motion::Stopped;
    let mut smooth = true;
    let mut left_cal: f32 = 1.0;
    let mut right_cal: f32 = 1.0;

    let mut last_movement_input = Instant::now();
    let mut last_sent = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Movement - update desired motion and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        motion = Motion::Forward;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        motion = Motion::Backward;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        motion = Motion::PivotLeft;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        motion = Motion::PivotRight;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char(' ') if pressed => {
                        motion = Motion::Stopped;
                    }

                    // Power level
                    KeyCode::Char('r') if pressed => {
                        power_idx = (power_idx + 1).min(2);
                        print_power(power_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        power_idx = power_idx.saturating_sub(1);
                        print_power(power_idx);
                    }

                    // Calibration trim
                    KeyCode::Char('u') if pressed => {
                        left_cal = (left_cal + CALIBRATION_STEP).clamp(0.0, 1.0);
                        send_calibration(publisher, Channel::Left, left_cal).await?;
                    }
                    KeyCode::Char('j') if pressed => {
                        left_cal = (left_cal - CALIBRATION_STEP).clamp(0.0, 1.0);
                        send_calibration(publisher, Channel::Left, left_cal).await?;
                    }
                    KeyCode::Char('i') if pressed => {
                        right_cal = (right_cal + CALIBRATION_STEP).clamp(0.0, 1.0);
                        send_calibration(publisher, Channel::Right, right_cal).await?;
                    }
                    KeyCode::Char('k') if pressed => {
                        right_cal = (right_cal - CALIBRATION_STEP).clamp(0.0, 1.0);
                        send_calibration(publisher, Channel::Right, right_cal).await?;
                    }

                    // Smoothing toggle
                    KeyCode::Char('m') if pressed => {
                        smooth = !smooth;
                        info!("Smooth: {}", if smooth { "ON" } else { "OFF" });
                        send(publisher, DriveCommand::SetSmooth { enabled: smooth }).await?;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Stop if no movement input for INPUT_TIMEOUT_MS
        if motion != Motion::Stopped
            && last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS)
        {
            motion = Motion::Stopped;
        }

        // Send on change, or as keepalive while held
        let keepalive_due = last_sent.elapsed() > Duration::from_millis(KEEPALIVE_MS);
        if motion != published_motion || keepalive_due {
            send_motion(publisher, motion, POWER_LEVELS[power_idx]).await?;
            published_motion = motion;
            last_sent = Instant::now();
        }
    }

    send(publisher, DriveCommand::StopAll).await?;
    Ok(())
}

async fn send_motion(
    publisher: &zenoh::pubsub::Publisher<'_>,
    motion: Motion,
    power: u8,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (left, right) = match motion {
        Motion::Stopped => {
            send(publisher, DriveCommand::StopAll).await?;
            return Ok(());
        }
        Motion::Forward => (
            DriveCommand::Forward {
                channel: Channel::Left,
                power,
            },
            DriveCommand::Forward {
                channel: Channel::Right,
                power,
            },
        ),
        Motion::Backward => (
            DriveCommand::Backward {
                channel: Channel::Left,
                power,
            },
            DriveCommand::Backward {
                channel: Channel::Right,
                power,
            },
        ),
        Motion::PivotLeft => (
            DriveCommand::Backward {
                channel: Channel::Left,
                power,
            },
            DriveCommand::Forward {
                channel: Channel::Right,
                power,
            },
        ),
        Motion::PivotRight => (
            DriveCommand::Forward {
                channel: Channel::Left,
                power,
            },
            DriveCommand::Backward {
                channel: Channel::Right,
                power,
            },
        ),
    };
    send(publisher, left).await?;
    send(publisher, right).await?;
    Ok(())
}

async fn send_calibration(
    publisher: &zenoh::pubsub::Publisher<'_>,
    channel: Channel,
    value: f32,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Calibration {:?}: {:.2}", channel, value);
    send(publisher, DriveCommand::SetCalibration { channel, value }).await
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: DriveCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(&cmd)?).await?;
    Ok(())
}

fn print_power(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Power: {}", label);
}

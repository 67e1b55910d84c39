// PWM bridge board serial protocol
//
// The bridge exposes one PWM output per pin; each frame sets one duty level:
// [0xAA, 0x55, Pin, Duty, Checksum]

use serialport::{self, SerialPort};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

/// Default serial configuration for the bridge board
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Frame header bytes
const HEADER: [u8; 2] = [0xAA, 0x55];

/// Error types for bridge communication
#[derive(Debug, thiserror::Error)]
pub enum PwmError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for per-pin PWM duty levels.
///
/// The control loop has no recovery path for a failed write, so the trait
/// reports nothing; implementations log failures and carry on.
pub trait PwmSink {
    fn set_duty(&mut self, pin: u8, duty: u8);
}

impl<S: PwmSink + ?Sized> PwmSink for Box<S> {
    fn set_duty(&mut self, pin: u8, duty: u8) {
        (**self).set_duty(pin, duty);
    }
}

/// Serial transport to the PWM bridge board
pub struct SerialPwmBridge {
    port: Box<dyn SerialPort>,
}

impl SerialPwmBridge {
    /// Open a new connection to the bridge
    pub fn open(port_name: &str) -> Result<Self, PwmError> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self, PwmError> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Checksum over the payload bytes (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a duty frame with header and checksum
    fn build_frame(pin: u8, duty: u8) -> [u8; 5] {
        let checksum = Self::checksum(&[pin, duty]);
        [HEADER[0], HEADER[1], pin, duty, checksum]
    }
}

impl PwmSink for SerialPwmBridge {
    fn set_duty(&mut self, pin: u8, duty: u8) {
        let frame = Self::build_frame(pin, duty);
        let result = self.port.write_all(&frame).and_then(|_| self.port.flush());
        if let Err(e) = result {
            warn!("PWM write to pin {} failed: {}", pin, e);
        }
    }
}

/// Stand-in sink for running without hardware attached.
///
/// Remembers the last duty per pin so the runtime (and tests) can observe
/// what would have been driven.
pub struct SimPwmSink {
    duties: [u8; 256],
}

impl SimPwmSink {
    pub fn new() -> Self {
        Self { duties: [0; 256] }
    }

    pub fn duty(&self, pin: u8) -> u8 {
        self.duties[pin as usize]
    }
}

impl Default for SimPwmSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmSink for SimPwmSink {
    fn set_duty(&mut self, pin: u8, duty: u8) {
        if self.duties[pin as usize] != duty {
            debug!("sim pwm: pin {} duty {}", pin, duty);
        }
        self.duties[pin as usize] = duty;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::PwmSink;

    /// Records every write in order, for assertions on actuation sequences.
    pub struct RecordingSink {
        pub writes: Vec<(u8, u8)>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self { writes: Vec::new() }
        }

        /// Last duty written to a pin, or 0 if never written.
        pub fn duty(&self, pin: u8) -> u8 {
            self.writes
                .iter()
                .rev()
                .find(|&&(p, _)| p == pin)
                .map(|&(_, d)| d)
                .unwrap_or(0)
        }
    }

    impl PwmSink for RecordingSink {
        fn set_duty(&mut self, pin: u8, duty: u8) {
            self.writes.push((pin, duty));
        }
    }
}

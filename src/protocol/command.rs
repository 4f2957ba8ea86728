//! Outbound commands for the Neuroduino protocol.
//!
//! Commands are fire-and-forget text tags. The only command carrying an
//! argument is the pulse start, whose trigger level is inlined as four
//! binary digits.

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::frame;

/// Highest trigger level a pulse can carry (4 bits).
pub const MAX_PULSE_TRIGGER: u8 = 0b1111;

/// A validated pulse trigger level in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PulseTrigger(u8);

impl PulseTrigger {
    /// Creates a trigger level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `level` is above 15.
    pub fn new(level: u8) -> Result<Self> {
        if level > MAX_PULSE_TRIGGER {
            return Err(Error::InvalidArgument {
                reason: format!("pulse trigger {level} out of range (0 to {MAX_PULSE_TRIGGER})"),
            });
        }
        Ok(Self(level))
    }

    /// Returns the raw level.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PulseTrigger {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        Self::new(level)
    }
}

impl TryFrom<i32> for PulseTrigger {
    type Error = Error;

    fn try_from(level: i32) -> Result<Self> {
        let level = u8::try_from(level).map_err(|_| Error::InvalidArgument {
            reason: format!("pulse trigger {level} out of range (0 to {MAX_PULSE_TRIGGER})"),
        })?;
        Self::new(level)
    }
}

/// Commands sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Identity probe; the device answers with `NEURODUINO`.
    Who,
    /// Host is ready to receive asynchronous events.
    Done,
    /// Graceful teardown notice.
    Disconnect,
    /// Flash the indicator LED.
    Blink,
    /// Start a pulse with the given trigger level.
    StartPulse(PulseTrigger),
    /// Cancel a running pulse.
    CancelPulse,
    /// Enable photoresistor sampling.
    PhotoStart,
    /// Disable photoresistor sampling.
    PhotoStop,
    /// Run the ~100 ms photoresistor calibration window.
    PhotoCalibrate,
}

impl Command {
    /// Returns the tag text, with inline arguments, without the terminator.
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::Who => "WHO".into(),
            Self::Done => "DONE".into(),
            Self::Disconnect => "DISCONNECT".into(),
            Self::Blink => "BLINK".into(),
            Self::StartPulse(trigger) => format!("PULSE+{:04b}", trigger.level()),
            Self::CancelPulse => "PULSE-".into(),
            Self::PhotoStart => "PHOTO+".into(),
            Self::PhotoStop => "PHOTO-".into(),
            Self::PhotoCalibrate => "PHOTO-CALIBRATE".into(),
        }
    }

    /// Encodes the command into a framed message.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        frame::encode(&self.tag())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

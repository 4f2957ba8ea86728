//! Device hardware types.

use std::fmt;

/// Modem control line levels applied when a port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLines {
    /// Request To Send, the ready line.
    pub rts: bool,
    /// Data Terminal Ready, the reset-trigger line.
    pub dtr: bool,
}

/// Board variant running the Neuroduino firmware.
///
/// The variants differ in how they react to DTR: the Leonardo firmware
/// needs it asserted to start talking, while asserting it on an Uno
/// reboots the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    /// ATmega32U4 boards (native USB).
    #[default]
    Leonardo,
    /// ATmega328P boards behind a USB-serial bridge.
    Uno,
}

impl DeviceModel {
    /// Returns the control line levels for this model.
    ///
    /// RTS is always asserted; DTR only on the Leonardo.
    #[must_use]
    pub const fn control_lines(self) -> ControlLines {
        ControlLines {
            rts: true,
            dtr: matches!(self, Self::Leonardo),
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leonardo => f.write_str("Leonardo"),
            Self::Uno => f.write_str("Uno"),
        }
    }
}

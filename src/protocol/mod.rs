//! Protocol definitions for Neuroduino communication.
//!
//! This module contains the low-level protocol types including:
//! - Line framing (encoding, decoding and segmentation)
//! - Outbound commands
//! - Device message parsing

pub mod command;
pub mod frame;
pub mod message;

pub use command::{Command, MAX_PULSE_TRIGGER, PulseTrigger};
pub use frame::{LineDecoder, MAX_LINE_LEN, TERMINATOR, decode as decode_line, encode as encode_frame};
pub use message::{DONE_TAG, DeviceMessage, PHOTO_DATA_TAG, PHOTO_HIGH_TAG};

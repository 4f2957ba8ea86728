//! Data types for Neuroduino hardware.

pub mod device;

pub use device::{ControlLines, DeviceModel};

//! # neuroduino
//!
//! A Rust host library for Neuroduino boards: Arduino-based peripherals used
//! to blink, pulse and sense during timing experiments.
//!
//! This library finds the board among the host's serial ports, verifies its
//! identity and exchanges `!`-terminated text commands with it.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Blind port discovery with a `WHO`/`NEURODUINO` identity handshake
//! - Background dispatch of device events to listener hooks
//! - Broadcast event stream for awaiting device responses
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use neuroduino::{DeviceEventListener, EventFilter, EventKind, Session, SessionConfig};
//!
//! struct PrintDone;
//!
//! impl DeviceEventListener for PrintDone {
//!     fn on_done(&self, payload: &str) {
//!         println!("device done: {payload}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), neuroduino::Error> {
//!     // Scan serial ports for the board and start the dispatch loop
//!     let config = SessionConfig::new()
//!         .timeout(Duration::from_millis(100))
//!         .dispatch(true);
//!     let mut session = Session::serial(config).with_listener(Arc::new(PrintDone));
//!     session.connect().await?;
//!
//!     println!("Connected on: {:?}", session.endpoint());
//!
//!     // Blink and wait for the board to report completion
//!     let done = session.subscribe();
//!     session.blink().await?;
//!     let event = neuroduino::event::wait_on(
//!         done,
//!         EventFilter::kind(EventKind::Done),
//!         Duration::from_secs(1),
//!     )
//!     .await;
//!     println!("Event: {event:?}");
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Line framing, commands and device message parsing
//! - [`types`] - Board variants and control line levels
//! - [`transport`] - Connector traits and the USB/Serial implementation
//! - [`handshake`] - Port discovery and identity verification
//! - [`event`] - Listener hooks and async event broadcasting
//! - [`commands`] - Command handler for device operations
//! - [`dispatch`] - Background routing of device messages
//! - [`session`] - High-level [`Session`]

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handshake;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use commands::CommandHandler;
pub use dispatch::DispatchHandle;
pub use error::{Error, FrameError, Result};
pub use event::{
    DeviceEventListener, Event, EventDispatcher, EventFilter, EventKind, NoopListener,
    Subscription,
};
pub use handshake::{Discovered, IDENTITY_TOKEN, ProbeOutcome};
pub use protocol::{Command, DeviceMessage, PulseTrigger};
pub use session::{Session, SessionConfig};
pub use transport::{
    Connector, LineReader, LineWriter, Link, LinkSettings, SerialConnector, serial::list_ports,
};
pub use types::{ControlLines, DeviceModel};

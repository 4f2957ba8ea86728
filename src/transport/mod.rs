//! Transport layer for Neuroduino communication.
//!
//! A [`Connector`] knows how to enumerate and open endpoints. Opening one
//! yields a [`Link`] split into a [`LineReader`] and a [`LineWriter`], so the
//! dispatch loop can block on reads while commands are written.
//! Currently only USB/Serial is implemented.

pub mod serial;

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::ControlLines;

/// Settings applied when opening an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate.
    pub baud_rate: u32,
    /// Upper bound for a single line read.
    pub timeout: Duration,
    /// Control line levels set after opening.
    pub control_lines: ControlLines,
    /// Pause after opening before the link is used.
    pub settle_delay: Duration,
}

/// Reading half of an open link.
pub trait LineReader: Send {
    /// Reads the next line, delimiter included.
    ///
    /// Returns `Ok(None)` if no complete line arrived within the link
    /// timeout. Never blocks longer than that timeout.
    fn read_line(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>>;
}

/// Writing half of an open link.
pub trait LineWriter: Send {
    /// Writes an already framed message.
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Closes the link. Closing twice is a no-op.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Returns true until [`LineWriter::close`] is called.
    fn is_open(&self) -> bool;
}

/// An open, not yet verified connection to one endpoint.
pub struct Link<R, W> {
    /// Reading half.
    pub reader: R,
    /// Writing half.
    pub writer: W,
}

/// Opens links and lists candidate endpoints.
pub trait Connector: Send + Sync + 'static {
    /// Reader type produced by [`Connector::open`].
    type Reader: LineReader + 'static;
    /// Writer type produced by [`Connector::open`].
    type Writer: LineWriter + 'static;

    /// Opens `endpoint` and applies `settings`.
    fn open<'a>(
        &'a self,
        endpoint: &'a str,
        settings: &'a LinkSettings,
    ) -> BoxFuture<'a, Result<Link<Self::Reader, Self::Writer>>>;

    /// Lists up to `limit` endpoints in platform enumeration order.
    fn candidate_endpoints(&self, limit: usize) -> Result<Vec<String>>;
}

pub use serial::SerialConnector;

//! Command handlers for Neuroduino operations.
//!
//! Every command is fire-and-forget: one framed message is written and no
//! response is awaited. Responses, where the firmware sends any, arrive
//! through the dispatch loop.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::protocol::{Command, PulseTrigger};
use crate::transport::LineWriter;

/// Command handler writing to one open link.
pub struct CommandHandler<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for CommandHandler<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: LineWriter> CommandHandler<W> {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Writes a single command.
    pub async fn send(&self, command: Command) -> Result<()> {
        tracing::trace!("sending command: {}", command);
        let mut writer = self.writer.lock().await;
        writer.send(command.encode()).await
    }

    /// Returns true while the underlying link is open.
    ///
    /// A writer held by an in-flight send counts as open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.writer
            .try_lock()
            .map_or(true, |writer| writer.is_open())
    }

    /// Closes the underlying link.
    pub async fn close(&self) -> Result<()> {
        self.writer.lock().await.close().await
    }

    // ==================== Session Commands ====================

    /// Tells the device the host is ready for asynchronous events.
    pub async fn ready(&self) -> Result<()> {
        self.send(Command::Done).await
    }

    /// Announces a graceful disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    // ==================== Device Commands ====================

    /// Flashes the indicator LED.
    pub async fn blink(&self) -> Result<()> {
        self.send(Command::Blink).await
    }

    /// Starts a pulse.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `trigger` is above 15.
    /// Nothing is written in that case.
    pub async fn start_pulse(&self, trigger: u8) -> Result<()> {
        let trigger = PulseTrigger::new(trigger)?;
        self.send(Command::StartPulse(trigger)).await
    }

    /// Cancels a running pulse.
    pub async fn cancel_pulse(&self) -> Result<()> {
        self.send(Command::CancelPulse).await
    }

    /// Enables photoresistor sampling.
    pub async fn photoresistor_start(&self) -> Result<()> {
        self.send(Command::PhotoStart).await
    }

    /// Disables photoresistor sampling.
    pub async fn photoresistor_stop(&self) -> Result<()> {
        self.send(Command::PhotoStop).await
    }

    /// Starts the photoresistor calibration window (~100 ms on the device).
    pub async fn photoresistor_calibrate(&self) -> Result<()> {
        self.send(Command::PhotoCalibrate).await
    }
}

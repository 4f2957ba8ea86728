//! Main [`Session`] implementation.
//!
//! This module provides the high-level [`Session`] that combines discovery,
//! the command API and background dispatch into a unified interface.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::commands::CommandHandler;
use crate::dispatch::DispatchHandle;
use crate::error::Result;
use crate::event::{
    DeviceEventListener, Event, EventDispatcher, EventFilter, NoopListener, Subscription,
};
use crate::handshake::{self, DEFAULT_DISCOVERY_LIMIT};
use crate::protocol::decode_line;
use crate::transport::{Connector, LineReader, LinkSettings, SerialConnector};
use crate::types::DeviceModel;

/// Default baud rate of the firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default line read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Configuration for a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Preferred endpoint, tried before scanning. Empty means scan only.
    pub endpoint: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Upper bound for a single line read.
    pub timeout: Duration,
    /// Board variant; selects control line levels.
    pub model: DeviceModel,
    /// Start the dispatch loop after connecting.
    pub dispatch: bool,
    /// Pause after opening a port before probing it.
    pub settle_delay: Duration,
    /// Maximum number of enumerated endpoints to probe.
    pub discovery_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            model: DeviceModel::default(),
            dispatch: false,
            settle_delay: Duration::ZERO,
            discovery_limit: DEFAULT_DISCOVERY_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with default settings and automatic discovery.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preferred endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the board variant.
    #[must_use]
    pub const fn model(mut self, model: DeviceModel) -> Self {
        self.model = model;
        self
    }

    /// Enables or disables the dispatch loop.
    #[must_use]
    pub const fn dispatch(mut self, enabled: bool) -> Self {
        self.dispatch = enabled;
        self
    }

    /// Sets the settle delay.
    #[must_use]
    pub const fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the discovery limit.
    #[must_use]
    pub const fn discovery_limit(mut self, limit: usize) -> Self {
        self.discovery_limit = limit;
        self
    }

    /// Returns the settings used to open links.
    #[must_use]
    pub const fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.baud_rate,
            timeout: self.timeout,
            control_lines: self.model.control_lines(),
            settle_delay: self.settle_delay,
        }
    }
}

/// The verified link a session is bound to.
struct Bound<C: Connector> {
    endpoint: String,
    reader: Arc<Mutex<C::Reader>>,
    commands: CommandHandler<C::Writer>,
}

/// Session with a Neuroduino board.
///
/// A session starts closed. [`Session::connect`] runs discovery and binds
/// the first endpoint that identifies itself.
pub struct Session<C: Connector = SerialConnector> {
    connector: C,
    config: SessionConfig,
    remembered: String,
    listener: Arc<dyn DeviceEventListener>,
    dispatcher: EventDispatcher,
    bound: Option<Bound<C>>,
    dispatch: Option<DispatchHandle>,
}

impl Session<SerialConnector> {
    /// Creates a session over native serial ports.
    #[must_use]
    pub fn serial(config: SessionConfig) -> Self {
        Self::with_connector(SerialConnector::new(), config)
    }
}

impl<C: Connector> Session<C> {
    /// Creates a session using the given connector.
    #[must_use]
    pub fn with_connector(connector: C, config: SessionConfig) -> Self {
        let remembered = config.endpoint.clone();
        Self {
            connector,
            config,
            remembered,
            listener: Arc::new(NoopListener),
            dispatcher: EventDispatcher::new(EVENT_CAPACITY),
            bound: None,
            dispatch: None,
        }
    }

    /// Installs the listener whose hooks the dispatch loop calls.
    ///
    /// Takes effect the next time the dispatch loop starts.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn DeviceEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the connector.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Connects to the device.
    ///
    /// Does nothing if already open. Otherwise this will:
    /// 1. Probe the remembered endpoint, then scan candidates
    /// 2. Send `DONE` to tell the firmware the host is ready
    /// 3. Start the dispatch loop if configured
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NoDeviceFound`] if no endpoint identified itself.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        if self.bound.is_some() {
            tracing::info!("link closed underneath the session, rebinding");
            if let Err(e) = self.disconnect().await {
                tracing::debug!("cleanup of closed link failed: {}", e);
            }
        }

        let settings = self.config.link_settings();
        let found = handshake::discover(
            &self.connector,
            &self.remembered,
            &settings,
            self.config.discovery_limit,
        )
        .await?;

        tracing::info!("connected to neuroduino on {}", found.endpoint);

        let bound = Bound {
            endpoint: found.endpoint,
            reader: Arc::new(Mutex::new(found.link.reader)),
            commands: CommandHandler::new(found.link.writer),
        };
        self.remembered.clone_from(&bound.endpoint);
        let endpoint = bound.endpoint.clone();

        bound.commands.ready().await?;
        self.bound = Some(bound);

        if self.config.dispatch {
            self.start_dispatch();
        }

        self.dispatcher.dispatch(Event::Connected { endpoint });
        Ok(())
    }

    /// Returns true if the session is bound to a device whose link is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.bound.as_ref().is_some_and(|b| b.commands.is_open())
    }

    /// Returns the endpoint bound by the last successful handshake.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.open_bound().map(|b| b.endpoint.as_str())
    }

    fn open_bound(&self) -> Option<&Bound<C>> {
        self.bound.as_ref().filter(|b| b.commands.is_open())
    }

    /// Disconnects from the device.
    ///
    /// Sends `DISCONNECT`, stops the dispatch loop and closes the link.
    /// Does nothing if already closed.
    ///
    /// # Errors
    ///
    /// Returns an error if closing the link fails. The session is closed
    /// either way.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(bound) = self.bound.take() else {
            return Ok(());
        };

        tracing::info!("disconnecting from {}", bound.endpoint);

        if let Err(e) = bound.commands.disconnect().await {
            tracing::warn!("failed to send DISCONNECT: {}", e);
        }

        self.stop_dispatch().await;

        let closed = bound.commands.close().await;
        self.dispatcher.dispatch(Event::Disconnected);
        closed
    }

    /// Disconnects and reconnects.
    ///
    /// The endpoint bound by the last handshake is probed first. Does
    /// nothing if the session is closed. A failure while closing the old
    /// link is logged and does not prevent the reconnect.
    ///
    /// # Errors
    ///
    /// Returns the error of the reconnect.
    pub async fn reset(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        if let Err(e) = self.disconnect().await {
            tracing::warn!("closing link during reset failed: {}", e);
        }
        self.connect().await
    }

    /// Reads one line from the device.
    ///
    /// Returns `Ok(None)` if the session is closed or no line arrived within
    /// the configured timeout. While the dispatch loop runs, it competes for
    /// the same lines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Frame`] if the line is not valid UTF-8 or
    /// overran the line length limit.
    pub async fn read_line(&self) -> Result<Option<String>> {
        let Some(bound) = self.open_bound() else {
            return Ok(None);
        };

        let raw = {
            let mut reader = bound.reader.lock().await;
            reader.read_line().await?
        };

        match raw {
            Some(raw) => Ok(Some(decode_line(&raw)?)),
            None => Ok(None),
        }
    }

    // ==================== Dispatch ====================

    /// Starts the dispatch loop.
    ///
    /// Returns false if the session is closed or a loop is already running.
    pub fn start_dispatch(&mut self) -> bool {
        let Some(bound) = self.open_bound() else {
            return false;
        };
        let reader = Arc::clone(&bound.reader);
        if self.dispatch.as_ref().is_some_and(DispatchHandle::is_running) {
            return false;
        }

        self.dispatch = Some(DispatchHandle::spawn(
            reader,
            Arc::clone(&self.listener),
            self.dispatcher.clone(),
        ));
        true
    }

    /// Stops the dispatch loop, waiting for it to exit.
    pub async fn stop_dispatch(&mut self) {
        if let Some(handle) = self.dispatch.take() {
            handle.stop().await;
        }
    }

    /// Returns true while the dispatch loop is running.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.dispatch.as_ref().is_some_and(DispatchHandle::is_running)
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Waits for an event matching the filter with timeout.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(filter, timeout).await
    }

    /// Returns the command handler for direct command access.
    ///
    /// `None` while the session is closed.
    #[must_use]
    pub fn commands(&self) -> Option<&CommandHandler<C::Writer>> {
        self.open_bound().map(|b| &b.commands)
    }

    // ==================== Device Commands ====================
    //
    // Each returns `Ok(false)` without writing when the session is closed.

    /// Flashes the indicator LED.
    pub async fn blink(&self) -> Result<bool> {
        let Some(commands) = self.commands() else {
            return Ok(false);
        };
        commands.blink().await?;
        Ok(true)
    }

    /// Starts a pulse with the given trigger level.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `trigger` is above 15.
    pub async fn start_pulse(&self, trigger: u8) -> Result<bool> {
        let Some(commands) = self.commands() else {
            return Ok(false);
        };
        commands.start_pulse(trigger).await?;
        Ok(true)
    }

    /// Cancels a running pulse.
    pub async fn cancel_pulse(&self) -> Result<bool> {
        let Some(commands) = self.commands() else {
            return Ok(false);
        };
        commands.cancel_pulse().await?;
        Ok(true)
    }

    /// Enables photoresistor sampling.
    pub async fn photoresistor_start(&self) -> Result<bool> {
        let Some(commands) = self.commands() else {
            return Ok(false);
        };
        commands.photoresistor_start().await?;
        Ok(true)
    }

    /// Disables photoresistor sampling.
    pub async fn photoresistor_stop(&self) -> Result<bool> {
        let Some(commands) = self.commands() else {
            return Ok(false);
        };
        commands.photoresistor_stop().await?;
        Ok(true)
    }

    /// Runs the photoresistor calibration window.
    pub async fn photoresistor_calibrate(&self) -> Result<bool> {
        let Some(commands) = self.commands() else {
            return Ok(false);
        };
        commands.photoresistor_calibrate().await?;
        Ok(true)
    }
}

//! Background dispatch of device-originated messages.
//!
//! The loop owns nothing but clones of the session's read half, listener and
//! event dispatcher. It is stopped through a watch channel raced against the
//! pending read, so stopping never waits for a read timeout.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::event::{DeviceEventListener, Event, EventDispatcher};
use crate::protocol::{DeviceMessage, decode_line};
use crate::transport::LineReader;

/// Handle to a running dispatch loop.
///
/// Dropping the handle aborts the task.
pub struct DispatchHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// Spawns the dispatch loop on the current tokio runtime.
    pub(crate) fn spawn<R: LineReader + 'static>(
        reader: Arc<Mutex<R>>,
        listener: Arc<dyn DeviceEventListener>,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(reader, listener, dispatcher, stop_rx));
        Self {
            stop,
            task: Some(task),
        }
    }

    /// Returns true while the loop task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the loop to stop and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            match task.await {
                Err(e) if e.is_panic() => tracing::error!("dispatch task panicked: {}", e),
                _ => {}
            }
        }
    }
}

impl Drop for DispatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run<R: LineReader>(
    reader: Arc<Mutex<R>>,
    listener: Arc<dyn DeviceEventListener>,
    dispatcher: EventDispatcher,
    mut stop: watch::Receiver<bool>,
) {
    tracing::debug!("dispatch loop started");

    loop {
        let result = tokio::select! {
            biased;
            _ = stop.changed() => break,
            result = async {
                let mut reader = reader.lock().await;
                reader.read_line().await
            } => result,
        };

        match result {
            Ok(Some(raw)) => route(&raw, listener.as_ref(), &dispatcher),
            Ok(None) => {} // Timed out, poll again
            Err(Error::Frame(e)) => {
                tracing::warn!("skipping malformed input: {}", e);
            }
            Err(e) => {
                tracing::error!("dispatch read error: {}", e);
                break;
            }
        }
    }

    tracing::debug!("dispatch loop stopped");
}

/// Decodes one raw line and routes it to the listener and subscribers.
///
/// Undecodable and unrecognized lines are skipped.
pub(crate) fn route(raw: &[u8], listener: &dyn DeviceEventListener, dispatcher: &EventDispatcher) {
    let line = match decode_line(raw) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("skipping undecodable line {}: {}", hex::encode(raw), e);
            return;
        }
    };

    let Some(message) = DeviceMessage::parse(&line) else {
        tracing::trace!("ignoring line: {:?}", line);
        return;
    };

    match &message {
        DeviceMessage::Done { payload } => listener.on_done(payload),
        DeviceMessage::SensorActivated { payload } => listener.on_sensor_activated(payload),
        DeviceMessage::SensorData { value } => listener.on_sensor_data(value),
    }

    dispatcher.dispatch(Event::from(message));
}

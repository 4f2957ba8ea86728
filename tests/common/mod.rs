//! Scripted stand-in for serial hardware.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use neuroduino::{
    Connector, DeviceEventListener, Error, LineReader, LineWriter, Link, LinkSettings, Result,
};

/// Installs a test log subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How a scripted endpoint reacts.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answers `WHO` with the identity token.
    Device,
    /// Opens but never answers.
    Silent,
    /// Answers `WHO` with some other text.
    Stranger(&'static str),
    /// Answers `WHO` with invalid UTF-8.
    Garbage,
    /// Cannot be opened.
    Unopenable,
    /// Opens, but every write fails.
    Broken,
    /// Answers like [`Behavior::Device`], but closing reports an error.
    FailingClose,
}

#[derive(Default)]
struct StubState {
    candidates: Vec<String>,
    behaviors: HashMap<String, Behavior>,
    opened: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Bytes)>>,
    feeds: Mutex<HashMap<String, mpsc::UnboundedSender<Bytes>>>,
    list_calls: AtomicUsize,
}

/// Connector over scripted endpoints.
#[derive(Clone, Default)]
pub struct StubConnector {
    state: Arc<StubState>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an enumerated endpoint.
    pub fn candidate(self, endpoint: &str, behavior: Behavior) -> Self {
        let mut state = self.into_state();
        state.candidates.push(endpoint.to_owned());
        state.behaviors.insert(endpoint.to_owned(), behavior);
        Self {
            state: Arc::new(state),
        }
    }

    /// Adds an endpoint that can be opened but is not enumerated.
    pub fn hidden(self, endpoint: &str, behavior: Behavior) -> Self {
        let mut state = self.into_state();
        state.behaviors.insert(endpoint.to_owned(), behavior);
        Self {
            state: Arc::new(state),
        }
    }

    fn into_state(self) -> StubState {
        Arc::try_unwrap(self.state)
            .unwrap_or_else(|_| panic!("stub is configured before it is shared"))
    }

    /// Endpoints in the order they were opened.
    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().unwrap().clone()
    }

    /// Endpoints in the order their links were closed.
    pub fn closed(&self) -> Vec<String> {
        self.state.closed.lock().unwrap().clone()
    }

    /// Number of times the candidate list was requested.
    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }

    /// Frames written to `endpoint`, as text.
    pub fn writes_to(&self, endpoint: &str) -> Vec<String> {
        self.state
            .writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(ep, _)| ep == endpoint)
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    /// Makes the device on `endpoint` send `line`.
    pub fn inject(&self, endpoint: &str, line: &[u8]) {
        let feeds = self.state.feeds.lock().unwrap();
        let feed = feeds.get(endpoint).expect("endpoint was opened");
        feed.send(Bytes::copy_from_slice(line)).unwrap();
    }
}

impl Connector for StubConnector {
    type Reader = StubReader;
    type Writer = StubWriter;

    fn open<'a>(
        &'a self,
        endpoint: &'a str,
        settings: &'a LinkSettings,
    ) -> BoxFuture<'a, Result<Link<Self::Reader, Self::Writer>>> {
        Box::pin(async move {
            self.state.opened.lock().unwrap().push(endpoint.to_owned());

            let behavior = match self.state.behaviors.get(endpoint) {
                None | Some(Behavior::Unopenable) => {
                    return Err(Error::Open {
                        endpoint: endpoint.to_owned(),
                        reason: "device busy".into(),
                    });
                }
                Some(behavior) => behavior.clone(),
            };

            let (tx, rx) = mpsc::unbounded_channel();
            self.state
                .feeds
                .lock()
                .unwrap()
                .insert(endpoint.to_owned(), tx.clone());

            Ok(Link {
                reader: StubReader {
                    lines: rx,
                    timeout: settings.timeout,
                },
                writer: StubWriter {
                    endpoint: endpoint.to_owned(),
                    behavior,
                    reply: tx,
                    state: Arc::clone(&self.state),
                    open: true,
                },
            })
        })
    }

    fn candidate_endpoints(&self, _limit: usize) -> Result<Vec<String>> {
        // The limit is deliberately ignored so callers' own bound is tested.
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.candidates.clone())
    }
}

pub struct StubReader {
    lines: mpsc::UnboundedReceiver<Bytes>,
    timeout: Duration,
}

impl LineReader for StubReader {
    fn read_line(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.lines.recv()).await {
                Ok(Some(line)) => Ok(Some(line)),
                Ok(None) => Err(Error::NotConnected),
                Err(_) => Ok(None),
            }
        })
    }
}

pub struct StubWriter {
    endpoint: String,
    behavior: Behavior,
    reply: mpsc::UnboundedSender<Bytes>,
    state: Arc<StubState>,
    open: bool,
}

impl LineWriter for StubWriter {
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.open || matches!(self.behavior, Behavior::Broken) {
                return Err(Error::NotConnected);
            }
            self.state
                .writes
                .lock()
                .unwrap()
                .push((self.endpoint.clone(), data.clone()));

            if &data[..] == b"WHO!" {
                let answer: Option<Bytes> = match self.behavior {
                    Behavior::Device | Behavior::FailingClose => {
                        Some(Bytes::from_static(b"NEURODUINO v2\r\n"))
                    }
                    Behavior::Stranger(text) => Some(Bytes::from_static(text.as_bytes())),
                    Behavior::Garbage => Some(Bytes::from_static(&[0xff, 0xfe, b'\n'])),
                    Behavior::Silent | Behavior::Unopenable | Behavior::Broken => None,
                };
                if let Some(answer) = answer {
                    let _ = self.reply.send(answer);
                }
            }
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.open {
                self.open = false;
                self.state.closed.lock().unwrap().push(self.endpoint.clone());
                if matches!(self.behavior, Behavior::FailingClose) {
                    return Err(Error::Io(std::io::Error::other("port vanished")));
                }
            }
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Listener forwarding every hook call to a channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<(&'static str, String)>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(&'static str, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl DeviceEventListener for ChannelListener {
    fn on_done(&self, payload: &str) {
        let _ = self.tx.send(("done", payload.to_owned()));
    }

    fn on_sensor_activated(&self, payload: &str) {
        let _ = self.tx.send(("activated", payload.to_owned()));
    }

    fn on_sensor_data(&self, value: &str) {
        let _ = self.tx.send(("data", value.to_owned()));
    }
}

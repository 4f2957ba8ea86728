//! Serial/USB transport implementation.
//!
//! This module provides serial port communication for Neuroduino boards
//! connected via USB.

use std::io;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::Instant;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::protocol::LineDecoder;
use crate::transport::{Connector, LineReader, LineWriter, Link, LinkSettings};

/// Size of a single read from the port.
const READ_CHUNK: usize = 256;

/// Opens endpoints as native serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl SerialConnector {
    /// Creates a serial connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for SerialConnector {
    type Reader = SerialLineReader;
    type Writer = SerialLineWriter;

    fn open<'a>(
        &'a self,
        endpoint: &'a str,
        settings: &'a LinkSettings,
    ) -> BoxFuture<'a, Result<Link<Self::Reader, Self::Writer>>> {
        Box::pin(async move {
            tracing::debug!("opening serial port: {} @ {} baud", endpoint, settings.baud_rate);

            let mut stream = tokio_serial::new(endpoint, settings.baud_rate)
                .timeout(settings.timeout)
                .open_native_async()
                .map_err(|e| Error::Open {
                    endpoint: endpoint.to_owned(),
                    reason: e.to_string(),
                })?;

            let lines = settings.control_lines;
            if let Err(e) = stream.write_request_to_send(lines.rts) {
                tracing::warn!("failed to set RTS on {}: {}", endpoint, e);
            }
            if let Err(e) = stream.write_data_terminal_ready(lines.dtr) {
                tracing::warn!("failed to set DTR on {}: {}", endpoint, e);
            }

            if !settings.settle_delay.is_zero() {
                tokio::time::sleep(settings.settle_delay).await;
            }

            let (reader, writer) = tokio::io::split(stream);
            Ok(Link {
                reader: SerialLineReader::new(reader, settings.timeout),
                writer: SerialLineWriter::new(writer),
            })
        })
    }

    fn candidate_endpoints(&self, limit: usize) -> Result<Vec<String>> {
        let mut ports = list_ports()?;
        ports.truncate(limit);
        Ok(ports)
    }
}

/// Reading half of a serial link.
pub struct SerialLineReader {
    half: ReadHalf<SerialStream>,
    decoder: LineDecoder,
    timeout: std::time::Duration,
}

impl SerialLineReader {
    fn new(half: ReadHalf<SerialStream>, timeout: std::time::Duration) -> Self {
        Self {
            half,
            decoder: LineDecoder::new(),
            timeout,
        }
    }
}

impl LineReader for SerialLineReader {
    fn read_line(&mut self) -> BoxFuture<'_, Result<Option<Bytes>>> {
        Box::pin(async move {
            let deadline = Instant::now() + self.timeout;
            let mut buf = [0u8; READ_CHUNK];

            loop {
                if let Some(line) = self.decoder.decode()? {
                    tracing::trace!("decoded line: {} bytes", line.len());
                    return Ok(Some(line));
                }

                // Partial lines stay buffered for the next call.
                let n = match tokio::time::timeout_at(deadline, self.half.read(&mut buf)).await {
                    Err(_) => return Ok(None),
                    Ok(Ok(0)) => {
                        tracing::debug!("serial port closed");
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::ConnectionReset,
                            "serial port closed",
                        )));
                    }
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                    Ok(Err(e)) => {
                        tracing::error!("serial read error: {}", e);
                        return Err(Error::Io(e));
                    }
                };

                tracing::trace!("received {} bytes", n);
                self.decoder.feed(&buf[..n]);
            }
        })
    }
}

/// Writing half of a serial link.
pub struct SerialLineWriter {
    half: Option<WriteHalf<SerialStream>>,
}

impl SerialLineWriter {
    const fn new(half: WriteHalf<SerialStream>) -> Self {
        Self { half: Some(half) }
    }
}

impl LineWriter for SerialLineWriter {
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let half = self.half.as_mut().ok_or(Error::NotConnected)?;

            tracing::trace!("sending frame: {} bytes", data.len());
            half.write_all(&data).await.map_err(Error::Io)?;
            half.flush().await.map_err(Error::Io)?;

            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(mut half) = self.half.take() {
                half.shutdown().await.map_err(Error::Io)?;
            }
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.half.is_some()
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

//! Device discovery and identity handshake.
//!
//! Serial enumeration cannot tell a Neuroduino from any other USB-serial
//! adapter, so every candidate is opened and asked `WHO`. Only a reply
//! containing [`IDENTITY_TOKEN`] counts as a match.

use crate::error::{Error, Result};
use crate::protocol::{Command, decode_line};
use crate::transport::{Connector, LineReader, LineWriter, Link, LinkSettings};

/// Token the firmware includes in its `WHO` reply.
pub const IDENTITY_TOKEN: &str = "NEURODUINO";

/// Default bound on enumerated candidates.
pub const DEFAULT_DISCOVERY_LIMIT: usize = 32;

/// Result of probing one endpoint.
pub enum ProbeOutcome<R, W> {
    /// The endpoint answered with the identity token; the link stays open.
    Matched(Link<R, W>),
    /// The endpoint opened but did not identify itself. Its link was closed.
    NoMatch(String),
    /// The endpoint could not be opened.
    OpenFailed(Error),
}

impl<R, W> ProbeOutcome<R, W> {
    /// Returns true for [`ProbeOutcome::Matched`].
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

/// A verified link together with the endpoint it was opened on.
pub struct Discovered<R, W> {
    /// Endpoint that answered.
    pub endpoint: String,
    /// Open, verified link.
    pub link: Link<R, W>,
}

/// Opens `endpoint` and runs the identity exchange.
///
/// Never fails: every problem is folded into the returned outcome.
pub async fn probe<C: Connector>(
    connector: &C,
    endpoint: &str,
    settings: &LinkSettings,
) -> ProbeOutcome<C::Reader, C::Writer> {
    let mut link = match connector.open(endpoint, settings).await {
        Ok(link) => link,
        Err(e) => {
            tracing::debug!("couldn't open {}: {}", endpoint, e);
            return ProbeOutcome::OpenFailed(e);
        }
    };

    match identify(&mut link).await {
        Ok(()) => {
            tracing::debug!("{} identified as neuroduino", endpoint);
            ProbeOutcome::Matched(link)
        }
        Err(reason) => {
            close_quietly(endpoint, &mut link.writer).await;
            ProbeOutcome::NoMatch(reason)
        }
    }
}

/// Sends `WHO` and checks the single reply line.
///
/// The error describes why the endpoint is not a match.
async fn identify<R: LineReader, W: LineWriter>(
    link: &mut Link<R, W>,
) -> std::result::Result<(), String> {
    link.writer
        .send(Command::Who.encode())
        .await
        .map_err(|e| format!("WHO write failed: {e}"))?;

    let raw = match link.reader.read_line().await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Err("no identity reply within timeout".to_owned()),
        Err(e) => return Err(format!("identity read failed: {e}")),
    };

    match decode_line(&raw) {
        Ok(line) if line.contains(IDENTITY_TOKEN) => Ok(()),
        Ok(line) => Err(format!("unexpected identity reply: {line:?}")),
        Err(e) => Err(format!("undecodable identity reply {}: {e}", hex::encode(&raw))),
    }
}

async fn close_quietly<W: LineWriter>(endpoint: &str, writer: &mut W) {
    if let Err(e) = writer.close().await {
        tracing::debug!("failed to close {}: {}", endpoint, e);
    }
}

/// Finds the device.
///
/// `remembered`, when non-empty, is probed first. Otherwise, or if it does
/// not answer, up to `limit` candidates are listed and probed in order. The
/// first match wins and no further endpoints are opened.
///
/// # Errors
///
/// Returns [`Error::NoDeviceFound`] if nothing answered, or the connector's
/// error if the candidate list could not be retrieved.
pub async fn discover<C: Connector>(
    connector: &C,
    remembered: &str,
    settings: &LinkSettings,
    limit: usize,
) -> Result<Discovered<C::Reader, C::Writer>> {
    let mut probed = 0usize;

    if !remembered.is_empty() {
        probed += 1;
        match probe(connector, remembered, settings).await {
            ProbeOutcome::Matched(link) => {
                return Ok(Discovered {
                    endpoint: remembered.to_owned(),
                    link,
                });
            }
            ProbeOutcome::NoMatch(reason) => {
                tracing::info!("{} did not answer ({}), scanning ports", remembered, reason);
            }
            ProbeOutcome::OpenFailed(e) => {
                tracing::info!("{} could not be opened ({}), scanning ports", remembered, e);
            }
        }
    }

    let candidates = connector.candidate_endpoints(limit)?;
    tracing::debug!("probing {} candidate endpoint(s)", candidates.len());

    for endpoint in candidates.into_iter().take(limit) {
        probed += 1;
        match probe(connector, &endpoint, settings).await {
            ProbeOutcome::Matched(link) => return Ok(Discovered { endpoint, link }),
            ProbeOutcome::NoMatch(reason) => {
                tracing::debug!("{} is not a neuroduino ({}), continuing", endpoint, reason);
            }
            ProbeOutcome::OpenFailed(e) => {
                tracing::debug!("port {} failed ({}), continuing", endpoint, e);
            }
        }
    }

    Err(Error::NoDeviceFound { probed })
}

//! Line framing for the Neuroduino protocol.
//!
//! The wire format is plain UTF-8 text with a one-byte terminator:
//! ```text
//! ┌──────────────────────┬──────┐
//! │  tag [+ inline args] │  !   │
//! │  n bytes             │  1   │
//! └──────────────────────┴──────┘
//! ```
//!
//! The firmware may also end lines with `\r\n` (it prints with `println`),
//! so the inbound side accepts either `!` or `\n` as a line delimiter.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Message terminator byte.
pub const TERMINATOR: u8 = b'!';

/// Line feed, the firmware's secondary delimiter.
const LINE_FEED: u8 = b'\n';

/// Carriage return, stripped from the end of lines.
const CARRIAGE_RETURN: u8 = b'\r';

/// Maximum number of bytes buffered without a delimiter.
///
/// Firmware lines are a few dozen bytes; anything longer is noise.
pub const MAX_LINE_LEN: usize = 1024;

/// Bytes of a discarded line shown in logs.
const PREVIEW_LEN: usize = 16;

/// Encodes a tag into a framed message.
///
/// Arguments are expected to be inlined into the tag already
/// (e.g. `PULSE+0101`).
///
/// # Panics
///
/// Panics if the tag contains the terminator byte. The protocol has no
/// escaping, so such a tag cannot be framed.
#[must_use]
pub fn encode(tag: &str) -> Bytes {
    assert!(
        !tag.as_bytes().contains(&TERMINATOR),
        "tag must not contain the terminator"
    );

    let mut buf = BytesMut::with_capacity(tag.len() + 1);
    buf.put_slice(tag.as_bytes());
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

/// Decodes a raw line into text.
///
/// Trailing terminator, carriage return and line feed bytes are stripped
/// before UTF-8 decoding.
///
/// # Errors
///
/// Returns [`FrameError::InvalidUtf8`] if the remaining bytes are not valid UTF-8.
pub fn decode(raw: &[u8]) -> Result<String, FrameError> {
    let end = raw
        .iter()
        .rposition(|&b| !is_delimiter(b))
        .map_or(0, |pos| pos + 1);
    let text = std::str::from_utf8(&raw[..end])?;
    Ok(text.to_owned())
}

const fn is_delimiter(byte: u8) -> bool {
    matches!(byte, TERMINATOR | LINE_FEED | CARRIAGE_RETURN)
}

/// Line decoder that handles partial data.
///
/// Each yielded line includes its delimiter byte; [`decode`] strips it.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    /// Creates a new line decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to take the next complete line.
    ///
    /// Returns `Ok(None)` if no delimiter has been received yet. Delimiter
    /// bytes left in front of a line (the `\r\n` following a `!`-terminated
    /// message) are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::LineTooLong`] once more than [`MAX_LINE_LEN`]
    /// bytes are buffered without a delimiter. The buffered bytes are
    /// dropped, so decoding resumes with the next input.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        let residue = self.buffer.iter().take_while(|&&b| is_delimiter(b)).count();
        self.buffer.advance(residue);

        if let Some(pos) = self
            .buffer
            .iter()
            .position(|&b| b == TERMINATOR || b == LINE_FEED)
        {
            return Ok(Some(self.buffer.split_to(pos + 1).freeze()));
        }

        let size = self.buffer.len();
        if size > MAX_LINE_LEN {
            let preview = &self.buffer[..PREVIEW_LEN.min(size)];
            tracing::warn!(
                "dropping {} bytes without delimiter, starting {}",
                size,
                hex::encode(preview)
            );
            self.buffer.clear();
            return Err(FrameError::LineTooLong {
                size,
                max: MAX_LINE_LEN,
            });
        }

        Ok(None)
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple() {
        let frame = encode("BLINK");
        assert_eq!(&frame[..], b"BLINK!");
    }

    #[test]
    #[should_panic(expected = "terminator")]
    fn test_encode_rejects_terminator() {
        let _ = encode("BAD!TAG");
    }

    #[test]
    fn test_decode_strips_terminators() {
        assert_eq!(decode(b"DONE123!").unwrap(), "DONE123");
        assert_eq!(decode(b"NEURODUINO\r\n").unwrap(), "NEURODUINO");
        assert_eq!(decode(b"PHOTO-HIGH7!\r\n").unwrap(), "PHOTO-HIGH7");
        assert_eq!(decode(b"").unwrap(), "");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let result = decode(&[b'D', 0xff, 0xfe, b'!']);
        assert!(matches!(result, Err(FrameError::InvalidUtf8(_))));
    }

    #[test]
    fn test_round_trip() {
        for tag in ["WHO", "PULSE+1010", "PHOTO-CALIBRATE", "ünïcode"] {
            assert_eq!(decode(&encode(tag)).unwrap(), tag);
        }
    }

    #[test]
    fn test_decoder_partial_line() {
        let mut decoder = LineDecoder::new();

        decoder.feed(b"DON");
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), 3);

        decoder.feed(b"E42!");
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"DONE42!")));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_multiple_lines() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"DONE1!\r\nPHOTO-HIGH2!\r\nNEURODUINO\n");

        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"DONE1!")));
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"PHOTO-HIGH2!")));
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"NEURODUINO\n")));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_decoder_drops_delimiter_residue() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"\r\n\n!");
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_bounds_undelimited_input() {
        let mut decoder = LineDecoder::new();

        decoder.feed(&[b'A'; MAX_LINE_LEN]);
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), MAX_LINE_LEN);

        for _ in 0..1024 {
            decoder.feed(&[b'A'; 4096]);
            assert!(matches!(
                decoder.decode(),
                Err(FrameError::LineTooLong {
                    max: MAX_LINE_LEN,
                    ..
                })
            ));
            assert_eq!(decoder.buffered(), 0);
        }

        decoder.feed(b"DONE7!");
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"DONE7!")));
    }

    #[test]
    fn test_decoder_too_long_then_recovers() {
        let mut decoder = LineDecoder::new();
        decoder.feed(&[b'A'; MAX_LINE_LEN + 1]);

        let result = decoder.decode();
        assert!(matches!(
            result,
            Err(FrameError::LineTooLong { size, .. }) if size == MAX_LINE_LEN + 1
        ));
        assert_eq!(decoder.buffered(), 0);

        decoder.feed(b"PHOTO-HIGH1!");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Bytes::from_static(b"PHOTO-HIGH1!"))
        );
    }

    #[test]
    fn test_decoder_clear() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"partial");
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }
}

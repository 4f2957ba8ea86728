//! Parsing of device-originated messages.
//!
//! Device messages are a tag followed by a free-form payload, e.g.
//! `DONE1534` or `PHOTO-HIGH7`. The tag is located by search rather than by
//! position, so leading noise on the line is tolerated.

/// Tag of the asynchronous completion event.
pub const DONE_TAG: &str = "DONE";

/// Tag of the photoresistor activation event.
pub const PHOTO_HIGH_TAG: &str = "PHOTO-HIGH";

/// Tag of a photoresistor reading.
pub const PHOTO_DATA_TAG: &str = "PHOTO-DATA";

/// A recognized message sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// The device finished an action; payload carries its timing data.
    Done { payload: String },
    /// The photoresistor crossed its calibrated threshold.
    SensorActivated { payload: String },
    /// A raw photoresistor reading.
    SensorData { value: String },
}

impl DeviceMessage {
    /// Parses a decoded line.
    ///
    /// When several known tags occur, the one starting earliest wins.
    /// Returns `None` for lines carrying no known tag.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (start, tag) = [DONE_TAG, PHOTO_HIGH_TAG, PHOTO_DATA_TAG]
            .into_iter()
            .filter_map(|tag| line.find(tag).map(|pos| (pos, tag)))
            .min_by_key(|&(pos, _)| pos)?;

        let payload = line[start + tag.len()..]
            .trim_end_matches(['!', '\r', '\n'])
            .to_owned();

        Some(match tag {
            DONE_TAG => Self::Done { payload },
            PHOTO_HIGH_TAG => Self::SensorActivated { payload },
            _ => Self::SensorData { value: payload },
        })
    }

    /// Returns the tag this message was parsed from.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Done { .. } => DONE_TAG,
            Self::SensorActivated { .. } => PHOTO_HIGH_TAG,
            Self::SensorData { .. } => PHOTO_DATA_TAG,
        }
    }
}

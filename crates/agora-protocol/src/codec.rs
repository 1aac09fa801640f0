//! Codecs: turning [`Envelope`]s into frames and back.
//!
//! The routing core never sees bytes. Only the agents, which sit between
//! the network and the bus, encode outbound envelopes and decode inbound
//! frames. The [`Codec`] trait is the seam that lets them swap formats.

use crate::{Envelope, ProtocolError};

/// Encodes and decodes envelopes.
///
/// `Send + Sync + 'static` because one codec is shared by every
/// connection task of an agent.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into one frame.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one frame.
    ///
    /// # Errors
    /// [`ProtocolError::FrameTooLarge`] if the frame exceeds the codec's
    /// limit; otherwise a decode error for malformed input.
    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// Default frame limit for [`JsonCodec`]: 64 KiB.
#[cfg(feature = "json")]
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// A [`Codec`] producing one JSON document per frame.
///
/// Frames larger than `max_frame_len` are rejected before parsing, so a
/// client cannot make the agent allocate for an arbitrarily large
/// document.
///
/// ```rust
/// use agora_protocol::{Channel, Codec, Envelope, JsonCodec, Message};
///
/// let codec = JsonCodec::default();
/// let envelope = Envelope::new(Channel(100_001), Channel(1), Message::Disconnect);
/// let frame = codec.encode(&envelope).unwrap();
/// assert_eq!(codec.decode(&frame).unwrap(), envelope);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    max_frame_len: usize,
}

#[cfg(feature = "json")]
impl JsonCodec {
    /// Creates a codec with a custom frame limit.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

#[cfg(feature = "json")]
impl Default for JsonCodec {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(envelope).map_err(ProtocolError::Encode)
    }

    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError> {
        if frame.len() > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len: frame.len(),
                limit: self.max_frame_len,
            });
        }
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}

//! Turning views into frames.
//!
//! The lobby produces [`ViewBlob`](crate::ViewBlob) values and the server
//! picks a codec to put them on the wire. A different codec (say, server
//! rendered HTML) would not touch the lobby at all.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes outbound values and decodes inbound ones.
///
/// One codec is shared by every connection task, hence `Send + Sync`.
/// Decoding targets `DeserializeOwned` so the frame buffer can be dropped
/// as soon as the value is built.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// [`ProtocolError::Encode`] when `value` cannot be serialized.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// [`ProtocolError::Decode`] for malformed bytes or a shape mismatch.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// JSON via `serde_json`.
///
/// The output is always UTF-8, so every view leaves as a text frame.
///
/// ```rust
/// use buzzline_protocol::{Codec, JsonCodec, ViewBlob};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ViewBlob::error("Not enough players")).unwrap();
/// let decoded: ViewBlob = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded.name(), "error-alert");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

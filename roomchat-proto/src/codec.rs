//! JSON serialization for frames and REST bodies.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::frame::InboundFrame;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Input was not a valid document of the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Encodes a value as a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a JSON document.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if the bytes are not valid JSON or do not
/// match `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Decodes a frame received from the server.
///
/// # Errors
///
/// Returns `CodecError::Malformed` for anything that is not a frame.
pub fn decode_inbound(bytes: &[u8]) -> Result<InboundFrame, CodecError> {
    decode(bytes)
}

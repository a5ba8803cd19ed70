//! CBOR encoding for wire messages.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a serializable value to CBOR bytes.
///
/// Struct fields are written in declaration order, so equal values always
/// produce identical bytes.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// A message that travels over the wire as CBOR.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Encodes to CBOR.
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

use invariant_types::{Codec as CodecKind, Payload};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Serializes/deserializes handler values and exception descriptors into
/// [`Payload`]s.
///
/// `encode`/`decode` must round-trip: `decode(encode(v)) == v` for every
/// value the codec supports. `JsonCodec` is the only implementation shipped
/// here; `Codec::Cbor`/`Codec::Borsh` remain tagged data with no bundled
/// crate (see DESIGN.md).
pub trait ValueCodec {
    fn kind(&self) -> CodecKind;
    fn encode<T: Serialize>(&self, value: &T) -> Result<Payload, CodecError>;
    fn decode<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, CodecError>;
}

/// Default codec: JSON via `serde_json`, matching `chrono`'s RFC3339
/// timestamp serialization.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Json
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Payload, CodecError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        Ok(Payload::new(bytes, CodecKind::Json))
    }

    fn decode<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, CodecError> {
        if payload.codec != CodecKind::Json {
            return Err(CodecError::UnsupportedCodec(payload.codec.clone()));
        }
        serde_json::from_slice(&payload.bytes).map_err(|e| CodecError::DecodeFailed(e.to_string()))
    }
}

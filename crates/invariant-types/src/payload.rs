use serde::{Deserialize, Serialize};

/// Codec used to encode/decode payload bytes.
/// Matches the SDK's supported serialization formats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    Cbor,
    Json,
    Borsh,
}

/// Opaque bytes with an associated codec.
///
/// SDK boundary handles conversion to/from the SDK's Payload type.
/// For Invariant types they are just bytes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub codec: Codec,
}

impl Payload {
    /// Create a payload from raw bytes and their codec.
    pub fn new(bytes: Vec<u8>, codec: Codec) -> Self {
        Self { bytes, codec }
    }

    /// An empty JSON payload, used where a call site has no value (e.g. `Wait`).
    pub fn empty() -> Self {
        Self::new(Vec::new(), Codec::Json)
    }

    /// Serialized size in bytes, used by the checkpoint coordinator's
    /// oversize-splitting logic.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

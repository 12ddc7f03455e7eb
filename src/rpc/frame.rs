//! Wire frames exchanged between mesh endpoints.
//!
//! Frames travel between endpoints as values; argument and return payloads
//! inside them are always serialized bytes, which is what gives calls their
//! copy-by-value semantics.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FragmentError, Result};
use crate::types::ProcId;

/// Identifies one registered dispatch target on every peer. Registration
/// order is identical across the group, so the same id names the same
/// logical object everywhere.
pub type ObjectId = u32;

/// Reserved object id for transport control traffic.
pub const CONTROL_OBJECT: ObjectId = 0;

/// Control methods handled by the endpoint itself.
pub mod control {
    /// No-op request used to flush a peer's incoming channel.
    pub const PING: u16 = 0;
}

#[derive(Debug)]
pub enum Frame {
    /// Fire-and-forget invocation. No reply, no error propagation.
    Call {
        from: ProcId,
        obj: ObjectId,
        method: u16,
        payload: Vec<u8>,
    },
    /// Blocking invocation; the peer answers with a `Reply` carrying `seq`.
    Request {
        from: ProcId,
        seq: u64,
        obj: ObjectId,
        method: u16,
        payload: Vec<u8>,
    },
    Reply {
        seq: u64,
        result: std::result::Result<Vec<u8>, String>,
    },
    /// One-shot group broadcast payload from a root process.
    Broadcast { payload: Vec<u8> },
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| FragmentError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| FragmentError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip() {
        let value = (ProcId(3), vec![1u32, 2, 3], "tail".to_string());
        let bytes = encode(&value).unwrap();
        let back: (ProcId, Vec<u32>, String) = decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode::<Vec<String>>(&[0xFF; 3]).unwrap_err();
        assert!(matches!(err, FragmentError::Serialization(_)));
    }
}

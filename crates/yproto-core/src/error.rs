//! Error types for the yproto wire codec and RPC multiplex.

use thiserror::Error;

/// Top-level codec error, wrapping the more specific kinds below.
#[derive(Debug, Error)]
pub enum Error {
    /// Decoding a frame or envelope failed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An RPC call failed or timed out.
    #[error("rpc error: {0}")]
    Rpc(#[from] crate::rpc::RpcError),
}

/// Errors raised while decoding varints, envelopes, or messages.
///
/// Every variant that can occur mid-buffer carries a byte `offset` so a
/// caller can report where in the frame decoding went wrong, per the
/// protocol's `MalformedFrame` diagnostic contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Ran out of bytes while reading a fixed- or variable-length field.
    #[error("truncated input at offset {offset}: need {need} bytes, have {have}")]
    Truncated {
        /// Byte offset the read started at.
        offset: usize,
        /// Bytes required to complete the read.
        need: usize,
        /// Bytes actually remaining.
        have: usize,
    },

    /// A varint used more continuation bytes than fit in a `u64`.
    #[error("varint overflow at offset {offset}")]
    VarintOverflow {
        /// Byte offset the varint started at.
        offset: usize,
    },

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid utf-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset the string's bytes started at.
        offset: usize,
    },

    /// The first three magic bytes were not `59 4A 53` ("YJS").
    #[error("bad magic bytes")]
    BadMagic,

    /// The version byte was not a version this codec understands.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The target-type byte did not match any known dispatch target.
    #[error("unknown target type: 0x{0:02X}")]
    UnknownTargetType(u8),

    /// A tag byte inside a target's body did not match any known step.
    #[error("unknown step tag 0x{tag:02X} for target {target}")]
    UnknownStepTag {
        /// The target whose body is being decoded (e.g. "doc", "file").
        target: &'static str,
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// Bytes remained after a frame was fully decoded, and the target
    /// does not permit trailing data (only RPC success payloads do).
    #[error("trailing bytes after frame: {count} unconsumed")]
    TrailingBytes {
        /// Number of bytes left unconsumed.
        count: usize,
    },
}

impl DecodeError {
    /// The byte offset associated with this error, if any.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Truncated { offset, .. }
            | Self::VarintOverflow { offset }
            | Self::InvalidUtf8 { offset } => Some(*offset),
            _ => None,
        }
    }
}

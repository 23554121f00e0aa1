//! # yproto-core
//!
//! The wire codec and RPC multiplex for the yproto collaborative-editing
//! transport: self-describing binary envelopes carrying CRDT sync
//! steps, awareness updates, acknowledgements, file-transfer frames, and
//! a generic request/stream/response RPC multiplex.
//!
//! This crate provides:
//! - **Varint codec**: unsigned varints, length-prefixed bytes/strings,
//!   fixed-width scalars, operating over a cursor (no streaming API).
//! - **Envelope codec**: magic+version framing, document name, the
//!   encrypted flag, and target-type dispatch.
//! - **Message taxonomy**: Doc / Awareness / Ack / File / Rpc decoded
//!   variants with deterministic, round-trippable encoding.
//! - **Ping/Pong heartbeats**: fixed 7-byte frames distinguishable from
//!   envelopes without parsing.
//! - **Message-array codec**: a self-delimited batch of envelopes.
//! - **RPC multiplex**: request/stream/response correlation, pluggable
//!   payload (de)serialization, and an HTTP-like error taxonomy.
//!
//! This crate performs no I/O: encoders and decoders are synchronous
//! pure functions over a byte cursor, and the RPC call table is the
//! only piece of state, updated by whichever transport owns it. See
//! `yproto-files` for the file-transfer state machines built on top of
//! this codec.
//!
//! ## Module structure
//!
//! - [`varint`]: primitive wire encodings and the cursor/writer types
//! - [`message`]: envelope framing and the Doc/Awareness/Ack/File taxonomy
//! - [`heartbeat`]: ping/pong frames
//! - [`batch`]: the message-array codec
//! - [`rpc`]: the RPC multiplex and call-correlation table
//! - [`error`]: error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod rpc;
pub mod varint;

pub use error::{DecodeError, Error};
pub use message::{
    AwarenessStep, DocStep, Envelope, FileStep, Target, TargetType, is_binary_message, message_id,
};
pub use rpc::{
    CallOutcome, CallTable, PayloadCodec, RawPayloadCodec, RpcBody, RpcError, RpcFrame,
    RpcRequestType,
};

/// Fixed chunk size for file transfer, in bytes (64 KiB). Not
/// negotiable in protocol v1; `yproto_files::DEFAULT_CHUNK_SIZE`
/// re-exports this same constant for the file-transfer crate.
pub const CHUNK_SIZE: usize = 65_536;

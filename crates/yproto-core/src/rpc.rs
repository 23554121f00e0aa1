//! RPC multiplex: request / stream / response frames sharing the
//! `Target::Rpc` envelope body, plus the client/server call-correlation
//! tables built on top of it.
//!
//! Three frame shapes share one wire layout: a `request` starts a call
//! and is assigned a fresh id (the content-defined id of its *encoded
//! envelope*, see [`crate::message::message_id`]); zero or more `stream`
//! frames and exactly one terminal `response` then carry that id back as
//! their `correlation_id` so the caller can route them. Payload
//! (de)serialization is pluggable via [`PayloadCodec`]: callers that
//! don't need a custom wire shape for their method payloads can use
//! [`RawPayloadCodec`], which treats the payload as an opaque byte blob.

use crate::error::DecodeError;
use crate::varint::{Cursor, Writer};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

/// Which of the three RPC frame shapes this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RpcRequestType {
    /// Starts a call. Always status success; never carries a correlation id.
    Request = 0x00,
    /// A unit of streamed output for an in-flight call.
    Stream = 0x01,
    /// The terminal result of a call.
    Response = 0x02,
}

impl TryFrom<u8> for RpcRequestType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Request),
            0x01 => Ok(Self::Stream),
            0x02 => Ok(Self::Response),
            other => Err(DecodeError::UnknownStepTag {
                target: "rpc.request_type",
                tag: other,
            }),
        }
    }
}

/// The success/error status and payload carried by an RPC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcBody {
    /// Call succeeded (or streamed data); payload is the serialized result.
    Success {
        /// Opaque, codec-serialized payload bytes.
        payload: Vec<u8>,
    },
    /// Call failed. Only valid on a `response` frame.
    Error {
        /// HTTP-like numeric status (403 denied, 404 not found, 408/504
        /// timeout, 500 internal — see [`RpcError`]'s constants).
        status_code: u64,
        /// Human-readable detail message.
        details: String,
        /// Optional payload accompanying the error (e.g. partial data).
        payload: Option<Vec<u8>>,
    },
}

impl RpcBody {
    fn encode(&self, w: &mut Writer) {
        match self {
            Self::Success { payload } => {
                w.write_u8(0x00);
                w.write_bytes_lp(payload);
            }
            Self::Error {
                status_code,
                details,
                payload,
            } => {
                w.write_u8(0x01);
                w.write_varuint(*status_code);
                w.write_string(details);
                match payload {
                    Some(p) => {
                        w.write_u8(1);
                        w.write_bytes_lp(p);
                    }
                    None => w.write_u8(0),
                }
            }
        }
    }

    fn decode(c: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let status = c.read_u8()?;
        match status {
            0x00 => {
                let payload = c.read_bytes_lp()?.to_vec();
                Ok(Self::Success { payload })
            }
            0x01 => {
                let status_code = c.read_varuint()?;
                let details = c.read_string()?;
                let has_payload = c.read_u8()?;
                let payload = if has_payload != 0 {
                    Some(c.read_bytes_lp()?.to_vec())
                } else {
                    None
                };
                Ok(Self::Error {
                    status_code,
                    details,
                    payload,
                })
            }
            other => Err(DecodeError::UnknownStepTag {
                target: "rpc.status",
                tag: other,
            }),
        }
    }
}

/// A decoded RPC frame (the body of `Target::Rpc`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcFrame {
    /// Method name the call is addressed to.
    pub method: String,
    /// Which frame shape this is.
    pub request_type: RpcRequestType,
    /// Present on `stream`/`response`, equal to the originating request's id.
    pub correlation_id: Option<String>,
    /// Status and payload.
    pub body: RpcBody,
}

impl RpcFrame {
    /// Build a `request` frame. Always status-success by construction.
    #[must_use]
    pub fn request(method: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            method: method.into(),
            request_type: RpcRequestType::Request,
            correlation_id: None,
            body: RpcBody::Success { payload },
        }
    }

    /// Build a `stream` frame correlated to `request_id`.
    #[must_use]
    pub fn stream(method: impl Into<String>, request_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            method: method.into(),
            request_type: RpcRequestType::Stream,
            correlation_id: Some(request_id.into()),
            body: RpcBody::Success { payload },
        }
    }

    /// Build a successful `response` frame correlated to `request_id`.
    #[must_use]
    pub fn response_ok(
        method: impl Into<String>,
        request_id: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            method: method.into(),
            request_type: RpcRequestType::Response,
            correlation_id: Some(request_id.into()),
            body: RpcBody::Success { payload },
        }
    }

    /// Build an error `response` frame correlated to `request_id`.
    #[must_use]
    pub fn response_err(
        method: impl Into<String>,
        request_id: impl Into<String>,
        status_code: u64,
        details: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            request_type: RpcRequestType::Response,
            correlation_id: Some(request_id.into()),
            body: RpcBody::Error {
                status_code,
                details: details.into(),
                payload: None,
            },
        }
    }

    pub(crate) fn encode(&self, w: &mut Writer) {
        w.write_string(&self.method);
        w.write_u8(self.request_type as u8);
        if let Some(id) = &self.correlation_id {
            w.write_string(id);
        }
        self.body.encode(w);
    }

    pub(crate) fn decode(c: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let method = c.read_string()?;
        let request_type = RpcRequestType::try_from(c.read_u8()?)?;
        let correlation_id = match request_type {
            RpcRequestType::Request => None,
            RpcRequestType::Stream | RpcRequestType::Response => Some(c.read_string()?),
        };
        let body = RpcBody::decode(c)?;
        Ok(Self {
            method,
            request_type,
            correlation_id,
            body,
        })
    }
}

/// Error surfaced by a failed or timed-out RPC call.
///
/// Status codes follow HTTP-like semantics, as encouraged by the
/// protocol: 403 denied, 404 not found, 408/504 timeout, 500 internal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rpc error {status_code}: {details}")]
pub struct RpcError {
    /// Numeric status code.
    pub status_code: u64,
    /// Human-readable detail message.
    pub details: String,
}

impl RpcError {
    /// 403 — the caller lacked permission.
    pub const DENIED: u64 = 403;
    /// 404 — the requested resource does not exist.
    pub const NOT_FOUND: u64 = 404;
    /// 408 — the call timed out waiting on the peer.
    pub const REQUEST_TIMEOUT: u64 = 408;
    /// 500 — an unexpected internal failure.
    pub const INTERNAL: u64 = 500;
    /// 504 — a downstream dependency timed out.
    pub const GATEWAY_TIMEOUT: u64 = 504;

    /// Build a new RPC error.
    #[must_use]
    pub fn new(status_code: u64, details: impl Into<String>) -> Self {
        Self {
            status_code,
            details: details.into(),
        }
    }

    /// A 408 timeout error with the standard wording.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(Self::REQUEST_TIMEOUT, "rpc call timed out")
    }
}

/// Pluggable (de)serialization for RPC method payloads.
///
/// The codec accepts a typed value at encode time and may emit a custom
/// byte form; at decode time the inverse operation receives the raw
/// payload bytes and returns a typed value. [`RawPayloadCodec`] is the
/// identity (pass-through) implementation used when no method-specific
/// shape is needed.
pub trait PayloadCodec<T>: Send + Sync {
    /// Serialize a typed payload to wire bytes for `method`.
    fn encode(&self, method: &str, value: &T) -> Vec<u8>;

    /// Deserialize wire bytes for `method` back into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `bytes` is not a valid encoding.
    fn decode(&self, method: &str, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// Identity codec: payloads are passed through as raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawPayloadCodec;

impl PayloadCodec<Vec<u8>> for RawPayloadCodec {
    fn encode(&self, _method: &str, value: &Vec<u8>) -> Vec<u8> {
        value.clone()
    }

    fn decode(&self, _method: &str, bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(bytes.to_vec())
    }
}

/// Outcome delivered to a caller when its RPC call finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call's terminal response carried a success payload.
    Ok(Vec<u8>),
    /// The call's terminal response (or a local timeout) was an error.
    Err(RpcError),
}

struct PendingCall {
    resolver: oneshot::Sender<CallOutcome>,
    stream_sink: Option<tokio::sync::mpsc::UnboundedSender<Vec<u8>>>,
    deadline: Instant,
}

/// Tracks outstanding RPC calls keyed by request id.
///
/// Symmetric on both client and server: whichever side issued the
/// `request` owns the corresponding entry here until its terminal
/// `response` arrives or its deadline passes. This type is internally
/// synchronized so it may be shared behind an `Arc`.
pub struct CallTable {
    calls: dashmap::DashMap<String, PendingCall>,
    default_timeout: Duration,
}

impl CallTable {
    /// Create a call table with the given default per-call timeout.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            calls: dashmap::DashMap::new(),
            default_timeout,
        }
    }

    /// Register a new outstanding call, returning a receiver for its
    /// terminal outcome and a sink to register stream frames against.
    pub fn begin(
        &self,
        request_id: impl Into<String>,
    ) -> (
        oneshot::Receiver<CallOutcome>,
        tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        self.begin_with_timeout(request_id, self.default_timeout)
    }

    /// Same as [`Self::begin`] but with an explicit timeout.
    pub fn begin_with_timeout(
        &self,
        request_id: impl Into<String>,
        timeout: Duration,
    ) -> (
        oneshot::Receiver<CallOutcome>,
        tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        let (resolver, rx) = oneshot::channel();
        let (stream_tx, stream_rx) = tokio::sync::mpsc::unbounded_channel();
        self.calls.insert(
            request_id.into(),
            PendingCall {
                resolver,
                stream_sink: Some(stream_tx),
                deadline: Instant::now() + timeout,
            },
        );
        (rx, stream_rx)
    }

    /// Route an incoming `stream` frame's payload to its call, if still pending.
    ///
    /// Stray stream frames for an unknown or already-finished id are
    /// silently ignored (`SessionNotFound` policy).
    pub fn on_stream(&self, correlation_id: &str, payload: Vec<u8>) {
        if let Some(entry) = self.calls.get(correlation_id)
            && let Some(sink) = &entry.stream_sink
        {
            let _ = sink.send(payload);
        }
    }

    /// Complete a call with its terminal outcome, removing it from the table.
    ///
    /// Removal happens before the resolver fires, so a concurrent
    /// timeout sweep can never also resolve the same call (the map
    /// entry's removal is the race-winner barrier).
    pub fn complete(&self, correlation_id: &str, outcome: CallOutcome) {
        if let Some((_, pending)) = self.calls.remove(correlation_id) {
            let _ = pending.resolver.send(outcome);
        }
    }

    /// Sweep calls whose deadline has passed, resolving each with a timeout error.
    pub fn sweep_timeouts(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .calls
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for id in expired {
            self.complete(&id, CallOutcome::Err(RpcError::timeout()));
        }
    }

    /// Number of calls currently outstanding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// True if no calls are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl std::fmt::Debug for CallTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallTable")
            .field("outstanding", &self.calls.len())
            .finish()
    }
}

/// Shared handle to a [`CallTable`], for use by both sides of a transport.
pub type SharedCallTable = Arc<CallTable>;

/// Registry of method name to handler, used by an RPC server to dispatch
/// incoming `request` frames. Not part of the wire format; a convenience
/// for composing the server half of an RPC call.
#[derive(Default)]
pub struct MethodTable<H> {
    handlers: HashMap<String, H>,
}

impl<H> MethodTable<H> {
    /// Create an empty method table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `method`.
    pub fn register(&mut self, method: impl Into<String>, handler: H) {
        self.handlers.insert(method.into(), handler);
    }

    /// Look up the handler for `method`, if registered.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&H> {
        self.handlers.get(method)
    }
}

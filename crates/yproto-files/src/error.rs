//! Error types for Merkle construction and file-transfer state machines.

use thiserror::Error;

/// Errors from building, proving, or verifying a Merkle tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// `build` was called with zero chunks.
    #[error("cannot build a merkle tree over zero chunks")]
    EmptyInput,
    /// A requested leaf index is outside `[0, chunk_count)`.
    #[error("leaf index {index} out of range for {len} chunks")]
    IndexOutOfRange {
        /// The index that was requested.
        index: usize,
        /// The number of leaves the tree was built over.
        len: usize,
    },
    /// `deserialize` was given bytes that don't decode as a valid tree.
    #[error("corrupt serialized merkle tree: {reason}")]
    CorruptSerialization {
        /// What was wrong with the serialized form.
        reason: &'static str,
    },
}

/// Errors from the upload/download file-transfer state machines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// A permission hook denied the operation.
    #[error("permission denied: {reason}")]
    InvalidPermission {
        /// The reason the hook gave, if any.
        reason: String,
    },
    /// The requested content id has no stored file.
    #[error("file not found")]
    NotFound,
    /// A chunk's Merkle proof did not verify against the session's root.
    #[error("proof verification failed for chunk {chunk_index}")]
    ProofVerificationFailed {
        /// The chunk index that failed verification.
        chunk_index: u64,
    },
    /// A chunk or stream frame referenced a session that doesn't exist
    /// (already completed, expired, or never begun).
    #[error("session not found")]
    SessionNotFound,
    /// The session did not complete within its configured deadline.
    #[error("transfer timed out")]
    Timeout,
    /// The declared file size exceeds the configured maximum.
    #[error("file size {actual} exceeds limit {limit}")]
    SizeExceeded {
        /// The configured maximum.
        limit: u64,
        /// The size that was rejected.
        actual: u64,
    },
    /// A storage backend or other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// The HTTP-like status code this error maps to on the RPC wire.
    #[must_use]
    pub fn status_code(&self) -> u64 {
        match self {
            Self::InvalidPermission { .. } => yproto_core::RpcError::DENIED,
            Self::NotFound | Self::SessionNotFound => yproto_core::RpcError::NOT_FOUND,
            Self::Timeout => yproto_core::RpcError::REQUEST_TIMEOUT,
            Self::SizeExceeded { .. } => 413,
            Self::ProofVerificationFailed { .. } => 422,
            Self::Internal(_) => yproto_core::RpcError::INTERNAL,
        }
    }

    /// Render as the RPC error frame body this transfer failure should
    /// surface as: errors cross component boundaries as results, never
    /// exceptions, and become RPC error responses.
    #[must_use]
    pub fn to_rpc_error(&self) -> yproto_core::RpcError {
        yproto_core::RpcError::new(self.status_code(), self.to_string())
    }
}

//! # yproto-files
//!
//! Content-addressed chunked file transfer built on top of
//! `yproto-core`'s envelope and RPC codec: a per-file SHA-256 Merkle
//! tree for integrity, and the upload/download session state machines
//! that use it.
//!
//! This crate provides:
//! - [`merkle`]: tree construction, inclusion proofs, and
//!   (de)serialization for durable caching.
//! - [`chunker`]: splitting a file into protocol-fixed chunks and
//!   reassembling an incoming stream of them.
//! - [`storage`]: the extrinsic storage interface (`TemporaryUploadStore`,
//!   `FileStore`) plus in-memory reference implementations.
//! - [`upload`] / [`download`]: the receiver/uploader and
//!   responder/downloader halves of the transfer protocol.
//! - [`cleanup`]: the periodic upload-session GC sweep.
//! - [`config`]: `TransferConfig`, serde+TOML.
//!
//! Depends on `yproto-core` for the fixed chunk size constant and for
//! frame emission in the layers above this crate; this crate itself
//! does not encode or decode envelopes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunker;
pub mod cleanup;
pub mod config;
pub mod download;
pub mod error;
pub mod merkle;
pub mod storage;
pub mod upload;

pub use config::TransferConfig;
pub use download::{DownloadResponder, DownloadSession};
pub use error::{MerkleError, TransferError};
pub use merkle::{verify, MerkleTree};
pub use storage::{
    FileMetadata, FileStore, InMemoryFileStore, InMemoryUploadStore, PermissionDecision,
    StoredFile, TemporaryUploadStore, UploadCompletion, UploadProgress,
};
pub use upload::{InFlightChunkGate, UploadReceiver, UploadSender};

/// The protocol-fixed chunk size (64 KiB). Not negotiable in v1; this
/// re-exports [`yproto_core::CHUNK_SIZE`] so callers only need one name.
pub const DEFAULT_CHUNK_SIZE: usize = yproto_core::CHUNK_SIZE;

//! The extrinsic storage interface the file-transfer core depends on:
//! a temporary store for in-flight uploads, a durable store for
//! completed files, and the data shapes passed across that boundary.
//! Neither trait prescribes a backend; `InMemoryUploadStore` and
//! `InMemoryFileStore` below are `DashMap`-backed reference
//! implementations for tests and the demo CLI.

use std::time::{Duration, Instant};

use crate::error::TransferError;
use crate::merkle::MerkleTree;

/// File metadata as carried by upload-metadata and download-response frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Caller-supplied file name.
    pub filename: String,
    /// Total size in bytes.
    pub size: u64,
    /// MIME type, if known.
    pub mime_type: String,
    /// Whether the stored bytes are themselves encrypted (the flag is
    /// carried but never interpreted).
    pub encrypted: bool,
    /// Client-reported last-modified time, in milliseconds since epoch.
    pub last_modified: u64,
}

/// A snapshot of an in-flight upload's progress.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    /// The metadata the upload began with.
    pub metadata: FileMetadata,
    /// Indices of chunks received so far, in ascending order.
    pub received_chunk_indices: Vec<u64>,
    /// Bytes received so far, summed across chunks.
    pub bytes_uploaded: u64,
}

/// The result of promoting a completed upload session to durable storage.
#[derive(Debug, Clone)]
pub struct UploadCompletion {
    /// The content id: base64 of the Merkle root over the file's chunks.
    pub content_id: String,
    /// The file's chunks in index order.
    pub chunks: Vec<Vec<u8>>,
    /// The metadata the upload began with.
    pub metadata: FileMetadata,
}

/// A durably stored file, as returned to a downloader.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// The file's chunks in index order.
    pub chunks: Vec<Vec<u8>>,
    /// The file's metadata.
    pub metadata: FileMetadata,
    /// The Merkle tree over `chunks`, cached so every download doesn't
    /// rebuild it.
    pub tree: MerkleTree,
}

/// The outcome of a permission check: denial carries an optional
/// human-readable reason and, for a download allow, the metadata to
/// answer with.
#[derive(Debug, Clone)]
pub struct PermissionDecision {
    /// Whether the operation is allowed.
    pub allowed: bool,
    /// Why it was denied, if it was.
    pub reason: Option<String>,
}

impl PermissionDecision {
    /// An unconditional allow.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// A denial with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Storage for in-flight uploads: the server-side half of the upload
/// session lifecycle (begin → chunk writes → complete → GC).
pub trait TemporaryUploadStore: Send + Sync {
    /// Begin a new upload session keyed by `file_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if a session already exists for `file_id`.
    fn begin_upload(&self, file_id: &str, metadata: FileMetadata) -> Result<(), TransferError>;

    /// Record one chunk's bytes and its claimed Merkle proof for an
    /// in-flight upload. The proof is checked once the upload
    /// completes and the tree over all received chunks is known.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::SessionNotFound`] if `file_id` has no
    /// open session.
    fn store_chunk(
        &self,
        file_id: &str,
        index: u64,
        bytes: Vec<u8>,
        proof: Vec<[u8; 32]>,
    ) -> Result<(), TransferError>;

    /// A snapshot of an in-flight upload's progress.
    ///
    /// Returns `None` if there is no session for `file_id`.
    fn upload_progress(&self, file_id: &str) -> Option<UploadProgress>;

    /// Complete an upload: all chunks must have arrived. Builds the
    /// Merkle tree over the assembled chunks, checks every chunk's
    /// claimed proof against that tree's root, removes the session,
    /// and returns the assembled chunks plus the content id.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::SessionNotFound`] if there is no
    /// session, [`TransferError::Internal`] if the session is missing
    /// chunks, or [`TransferError::ProofVerificationFailed`] if any
    /// chunk's proof doesn't verify against the assembled tree.
    fn complete_upload(&self, file_id: &str) -> Result<UploadCompletion, TransferError>;

    /// Drop every upload session whose age exceeds `ttl`, returning how
    /// many were reclaimed.
    fn cleanup_expired_uploads(&self, ttl: Duration) -> usize;
}

/// Storage for completed, durable files, keyed by content id.
pub trait FileStore: Send + Sync {
    /// Look up a file by content id.
    fn get_file(&self, content_id: &str) -> Option<StoredFile>;

    /// Promote an upload's result into durable storage.
    fn store_file_from_upload(&self, result: UploadCompletion) -> Result<(), TransferError>;

    /// Remove a stored file. No-op if it doesn't exist.
    fn delete_file(&self, content_id: &str);
}

struct UploadSessionState {
    metadata: FileMetadata,
    chunks: std::collections::BTreeMap<u64, (Vec<u8>, Vec<[u8; 32]>)>,
    started_at: Instant,
}

/// An in-memory [`TemporaryUploadStore`], backed by a `DashMap` keyed
/// by file id.
#[derive(Default)]
pub struct InMemoryUploadStore {
    sessions: dashmap::DashMap<String, UploadSessionState>,
}

impl InMemoryUploadStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemporaryUploadStore for InMemoryUploadStore {
    fn begin_upload(&self, file_id: &str, metadata: FileMetadata) -> Result<(), TransferError> {
        if self.sessions.contains_key(file_id) {
            return Err(TransferError::Internal(format!(
                "upload session {file_id} already exists"
            )));
        }
        self.sessions.insert(
            file_id.to_string(),
            UploadSessionState {
                metadata,
                chunks: std::collections::BTreeMap::new(),
                started_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn store_chunk(
        &self,
        file_id: &str,
        index: u64,
        bytes: Vec<u8>,
        proof: Vec<[u8; 32]>,
    ) -> Result<(), TransferError> {
        let mut session = self
            .sessions
            .get_mut(file_id)
            .ok_or(TransferError::SessionNotFound)?;
        session.chunks.insert(index, (bytes, proof));
        Ok(())
    }

    fn upload_progress(&self, file_id: &str) -> Option<UploadProgress> {
        let session = self.sessions.get(file_id)?;
        Some(UploadProgress {
            metadata: session.metadata.clone(),
            received_chunk_indices: session.chunks.keys().copied().collect(),
            bytes_uploaded: session.chunks.values().map(|(c, _)| c.len() as u64).sum(),
        })
    }

    fn complete_upload(&self, file_id: &str) -> Result<UploadCompletion, TransferError> {
        let (_, session) = self
            .sessions
            .remove(file_id)
            .ok_or(TransferError::SessionNotFound)?;

        let expected = crate::chunker::chunk_count(session.metadata.size, crate::DEFAULT_CHUNK_SIZE);
        if session.chunks.len() as u64 != expected {
            return Err(TransferError::Internal(format!(
                "upload {file_id} completed with {}/{expected} chunks",
                session.chunks.len()
            )));
        }

        let chunks: Vec<Vec<u8>> = session
            .chunks
            .values()
            .map(|(bytes, _)| bytes.clone())
            .collect();
        let tree = MerkleTree::build(&chunks).map_err(|e| TransferError::Internal(e.to_string()))?;
        let root = tree.root();

        for (index, (bytes, proof)) in &session.chunks {
            if !crate::merkle::verify(bytes, proof, &root, *index as usize) {
                return Err(TransferError::ProofVerificationFailed {
                    chunk_index: *index,
                });
            }
        }

        Ok(UploadCompletion {
            content_id: tree.root_base64(),
            chunks,
            metadata: session.metadata,
        })
    }

    fn cleanup_expired_uploads(&self, ttl: Duration) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.started_at.elapsed() > ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &expired {
            self.sessions.remove(key);
        }
        expired.len()
    }
}

/// An in-memory [`FileStore`], backed by a `DashMap` keyed by content id.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: dashmap::DashMap<String, StoredFile>,
}

impl InMemoryFileStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for InMemoryFileStore {
    fn get_file(&self, content_id: &str) -> Option<StoredFile> {
        self.files.get(content_id).map(|entry| entry.clone())
    }

    fn store_file_from_upload(&self, result: UploadCompletion) -> Result<(), TransferError> {
        let tree =
            MerkleTree::build(&result.chunks).map_err(|e| TransferError::Internal(e.to_string()))?;
        self.files.insert(
            result.content_id,
            StoredFile {
                chunks: result.chunks,
                metadata: result.metadata,
                tree,
            },
        );
        Ok(())
    }

    fn delete_file(&self, content_id: &str) {
        self.files.remove(content_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(size: u64) -> FileMetadata {
        FileMetadata {
            filename: "t.txt".to_string(),
            size,
            mime_type: "text/plain".to_string(),
            encrypted: false,
            last_modified: 0,
        }
    }

    #[test]
    fn upload_lifecycle_begin_store_complete() {
        let store = InMemoryUploadStore::new();
        store.begin_upload("f1", metadata(5)).unwrap();
        store
            .store_chunk("f1", 0, vec![1, 2, 3, 4, 5], vec![])
            .unwrap();

        let progress = store.upload_progress("f1").unwrap();
        assert_eq!(progress.bytes_uploaded, 5);

        let completion = store.complete_upload("f1").unwrap();
        assert_eq!(completion.chunks, vec![vec![1, 2, 3, 4, 5]]);
        assert!(store.upload_progress("f1").is_none());
    }

    #[test]
    fn complete_upload_without_session_is_not_found() {
        let store = InMemoryUploadStore::new();
        assert_eq!(
            store.complete_upload("missing").unwrap_err(),
            TransferError::SessionNotFound
        );
    }

    #[test]
    fn store_chunk_without_session_is_not_found() {
        let store = InMemoryUploadStore::new();
        assert_eq!(
            store.store_chunk("missing", 0, vec![], vec![]).unwrap_err(),
            TransferError::SessionNotFound
        );
    }

    #[test]
    fn cleanup_removes_only_expired_sessions() {
        let store = InMemoryUploadStore::new();
        store.begin_upload("old", metadata(1)).unwrap();
        let removed = store.cleanup_expired_uploads(Duration::from_secs(0));
        assert_eq!(removed, 1);
        assert!(store.upload_progress("old").is_none());
    }

    #[test]
    fn file_store_roundtrip() {
        let store = InMemoryFileStore::new();
        let completion = UploadCompletion {
            content_id: "abc".to_string(),
            chunks: vec![vec![1, 2, 3]],
            metadata: metadata(3),
        };
        store.store_file_from_upload(completion).unwrap();

        let stored = store.get_file("abc").unwrap();
        assert_eq!(stored.chunks, vec![vec![1, 2, 3]]);

        store.delete_file("abc");
        assert!(store.get_file("abc").is_none());
    }
}

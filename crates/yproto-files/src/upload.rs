//! Upload protocol: the receiver-side session lifecycle
//! driven by RPC request/stream frames, and the uploader-side chunk
//! emitter with bounded in-flight flow control.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::merkle::MerkleTree;
use crate::storage::{FileMetadata, FileStore, PermissionDecision, TemporaryUploadStore};

/// Server-side half of the upload protocol: permission check, session
/// lifetime, and promotion to durable storage on completion.
pub struct UploadReceiver<U, F> {
    uploads: Arc<U>,
    files: Arc<F>,
    config: TransferConfig,
}

impl<U: TemporaryUploadStore, F: FileStore> UploadReceiver<U, F> {
    /// Build a receiver over the given stores and configuration.
    pub fn new(uploads: Arc<U>, files: Arc<F>, config: TransferConfig) -> Self {
        Self {
            uploads,
            files,
            config,
        }
    }

    /// Handle an upload's opening RPC request: check size and
    /// permission, then begin the session.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::SizeExceeded`] if `metadata.size`
    /// exceeds the configured maximum, or [`TransferError::InvalidPermission`]
    /// if `permission` denies the upload.
    pub fn begin(
        &self,
        file_id: &str,
        metadata: FileMetadata,
        permission: impl FnOnce(&str, &FileMetadata) -> PermissionDecision,
    ) -> Result<(), TransferError> {
        if metadata.size > self.config.max_file_size {
            return Err(TransferError::SizeExceeded {
                limit: self.config.max_file_size,
                actual: metadata.size,
            });
        }

        let decision = permission(file_id, &metadata);
        if !decision.allowed {
            return Err(TransferError::InvalidPermission {
                reason: decision.reason.unwrap_or_else(|| "denied".to_string()),
            });
        }

        tracing::info!(file_id, size = metadata.size, "upload session begin");
        self.uploads.begin_upload(file_id, metadata)
    }

    /// Record one incoming chunk frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::SessionNotFound`] for a stray chunk
    /// with no matching session; the caller ignores this rather than
    /// treating it as a protocol violation.
    pub fn accept_chunk(
        &self,
        file_id: &str,
        index: u64,
        bytes: Vec<u8>,
        proof: Vec<[u8; 32]>,
    ) -> Result<(), TransferError> {
        tracing::debug!(file_id, index, "upload chunk received");
        self.uploads.store_chunk(file_id, index, bytes, proof)
    }

    /// A progress snapshot for an in-flight upload, if one exists.
    pub fn progress(&self, file_id: &str) -> Option<crate::storage::UploadProgress> {
        self.uploads.upload_progress(file_id)
    }

    /// Finalize an upload once every chunk has arrived: verifies every
    /// chunk's proof against the tree built from what was actually
    /// received, promotes the result to durable storage, and returns
    /// the content id.
    ///
    /// # Errors
    ///
    /// Propagates [`TransferError::ProofVerificationFailed`] from the
    /// store's proof check, or any storage-layer error.
    pub fn complete(&self, file_id: &str) -> Result<String, TransferError> {
        let result = self.uploads.complete_upload(file_id)?;
        let content_id = result.content_id.clone();
        self.files.store_file_from_upload(result)?;
        tracing::info!(file_id, content_id, "upload session complete");
        Ok(content_id)
    }
}

/// A permit-gated limit on unacknowledged chunk frames in flight.
/// `max_in_flight == 0` means unbounded (every `acquire` call succeeds
/// immediately, holding no permit).
#[derive(Clone)]
pub struct InFlightChunkGate {
    semaphore: Option<Arc<Semaphore>>,
}

impl InFlightChunkGate {
    /// Build a gate from the configured limit.
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            semaphore: (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight))),
        }
    }

    /// Wait for a send slot. Holding the returned permit (if any)
    /// reserves one in-flight chunk; dropping it (typically on ACK)
    /// frees the slot for the next send.
    pub async fn acquire(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        match &self.semaphore {
            Some(sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .expect("gate semaphore is never closed"),
            ),
            None => None,
        }
    }
}

/// Client-side chunk emitter: owns the Merkle tree over the whole
/// file (known up front) and tracks which chunk ids are still
/// unacknowledged.
pub struct UploadSender {
    chunks: Vec<Vec<u8>>,
    tree: MerkleTree,
    outstanding: HashSet<u64>,
}

impl UploadSender {
    /// Build a sender over a file's chunks, computing the Merkle tree
    /// once up front.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunks` is empty.
    pub fn new(chunks: Vec<Vec<u8>>) -> Result<Self, crate::error::MerkleError> {
        let tree = MerkleTree::build(&chunks)?;
        let outstanding = (0..chunks.len() as u64).collect();
        Ok(Self {
            chunks,
            tree,
            outstanding,
        })
    }

    /// The content id this upload will resolve to once complete.
    #[must_use]
    pub fn content_id(&self) -> String {
        self.tree.root_base64()
    }

    /// Build the `(bytes, proof)` pair for one chunk frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn chunk_frame(
        &self,
        index: u64,
    ) -> Result<(&[u8], Vec<[u8; 32]>), crate::error::MerkleError> {
        let proof = self.tree.proof(index as usize)?;
        Ok((&self.chunks[index as usize], proof))
    }

    /// Mark a chunk acknowledged. Idempotent: acknowledging an
    /// already-cleared index is a no-op.
    pub fn ack(&mut self, index: u64) {
        self.outstanding.remove(&index);
    }

    /// True once every chunk has been acknowledged.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Indices still awaiting acknowledgement.
    #[must_use]
    pub fn outstanding(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.outstanding.iter().copied().collect();
        indices.sort_unstable();
        indices
    }
}

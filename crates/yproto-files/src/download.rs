//! Download protocol: the server-side responder that
//! answers a download request from durable storage, and the
//! client-side session that verifies incoming chunks against the
//! content id and assembles the final blob.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine as _;

use crate::chunker;
use crate::error::TransferError;
use crate::storage::{FileMetadata, FileStore, PermissionDecision, StoredFile};

/// Server-side half of the download protocol.
pub struct DownloadResponder<F> {
    files: Arc<F>,
}

impl<F: FileStore> DownloadResponder<F> {
    /// Build a responder over a file store.
    pub fn new(files: Arc<F>) -> Self {
        Self { files }
    }

    /// Handle a download request: check permission, then look up the
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NotFound`] if the permission hook's
    /// denial reason is exactly `"not found"`, or the file doesn't
    /// exist in storage. Returns [`TransferError::InvalidPermission`]
    /// for any other denial.
    pub fn handle_request(
        &self,
        content_id: &str,
        permission: impl FnOnce(&str) -> PermissionDecision,
    ) -> Result<StoredFile, TransferError> {
        let decision = permission(content_id);
        if !decision.allowed {
            return Err(match decision.reason.as_deref() {
                Some("not found") => TransferError::NotFound,
                other => TransferError::InvalidPermission {
                    reason: other.unwrap_or("denied").to_string(),
                },
            });
        }

        let file = self.files.get_file(content_id).ok_or(TransferError::NotFound)?;
        tracing::info!(content_id, "download request served");
        Ok(file)
    }
}

/// Client-side download session: buffers verified chunks by index and
/// assembles the blob once every chunk has arrived.
pub struct DownloadSession {
    content_id: String,
    root: [u8; 32],
    metadata: Option<FileMetadata>,
    expected_chunks: Option<u64>,
    received: BTreeMap<u64, Vec<u8>>,
}

impl DownloadSession {
    /// Start a session for the given content id.
    ///
    /// # Errors
    ///
    /// Returns an error if `content_id` is not valid base64 or does
    /// not decode to a 32-byte SHA-256 root.
    pub fn new(content_id: impl Into<String>) -> Result<Self, TransferError> {
        let content_id = content_id.into();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&content_id)
            .map_err(|e| TransferError::Internal(format!("bad content id: {e}")))?;
        let root: [u8; 32] = decoded
            .try_into()
            .map_err(|_| TransferError::Internal("content id is not a sha-256 root".to_string()))?;

        Ok(Self {
            content_id,
            root,
            metadata: None,
            expected_chunks: None,
            received: BTreeMap::new(),
        })
    }

    /// Record the metadata response, fixing how many chunks to expect.
    pub fn on_metadata(&mut self, metadata: FileMetadata) {
        self.expected_chunks = Some(chunker::chunk_count(
            metadata.size,
            crate::DEFAULT_CHUNK_SIZE,
        ));
        self.metadata = Some(metadata);
    }

    /// Verify and record one incoming chunk frame. A chunk for an
    /// index already received is dropped (idempotent merge).
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ProofVerificationFailed`] if the
    /// chunk's proof does not verify against the session's root.
    pub fn on_chunk(
        &mut self,
        index: u64,
        bytes: Vec<u8>,
        proof: &[[u8; 32]],
    ) -> Result<(), TransferError> {
        if self.received.contains_key(&index) {
            return Ok(());
        }
        if !crate::merkle::verify(&bytes, proof, &self.root, index as usize) {
            return Err(TransferError::ProofVerificationFailed { chunk_index: index });
        }
        self.received.insert(index, bytes);
        Ok(())
    }

    /// `(chunks_received, total)`, or `None` until metadata arrives.
    #[must_use]
    pub fn progress(&self) -> Option<(u64, u64)> {
        self.expected_chunks
            .map(|total| (self.received.len() as u64, total))
    }

    /// True once every expected chunk has arrived and verified.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.expected_chunks, Some(total) if self.received.len() as u64 == total)
    }

    /// Assemble the received chunks into the complete blob.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Internal`] if the session isn't
    /// complete yet.
    pub fn assemble(self) -> Result<Vec<u8>, TransferError> {
        if !self.is_complete() {
            return Err(TransferError::Internal(format!(
                "download {} incomplete: {}/{:?} chunks",
                self.content_id,
                self.received.len(),
                self.expected_chunks
            )));
        }
        Ok(self.received.into_values().flatten().collect())
    }

    /// The content id this session was opened for.
    #[must_use]
    pub fn content_id(&self) -> &str {
        &self.content_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::MerkleTree;
    use crate::storage::InMemoryFileStore;

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
    fn end_to_end_download_reassembles_stored_bytes() {
        let files = Arc::new(InMemoryFileStore::new());
        let data = vec![1u8, 2, 3, 4, 5];
        let tree = MerkleTree::build(&[data.clone()]).unwrap();
        files
            .store_file_from_upload(crate::storage::UploadCompletion {
                content_id: tree.root_base64(),
                chunks: vec![data.clone()],
                metadata: metadata(5),
            })
            .unwrap();

        let responder = DownloadResponder::new(files);
        let stored = responder
            .handle_request(&tree.root_base64(), |_| PermissionDecision::allow())
            .unwrap();

        let mut session = DownloadSession::new(tree.root_base64()).unwrap();
        session.on_metadata(stored.metadata.clone());
        let proof = stored.tree.proof(0).unwrap();
        session.on_chunk(0, stored.chunks[0].clone(), &proof).unwrap();

        assert!(session.is_complete());
        assert_eq!(session.assemble().unwrap(), data);
    }

    #[test]
    fn missing_file_is_not_found() {
        let files: Arc<InMemoryFileStore> = Arc::new(InMemoryFileStore::new());
        let responder = DownloadResponder::new(files);
        let result = responder.handle_request("nonexistent", |_| PermissionDecision::allow());
        assert!(matches!(result, Err(TransferError::NotFound)));
    }

    #[test]
    fn permission_denial_with_not_found_reason_maps_to_404() {
        let files: Arc<InMemoryFileStore> = Arc::new(InMemoryFileStore::new());
        let responder = DownloadResponder::new(files);
        let result =
            responder.handle_request("x", |_| PermissionDecision::deny("not found"));
        assert!(matches!(result, Err(TransferError::NotFound)));
    }

    #[test]
    fn permission_denial_with_other_reason_maps_to_403() {
        let files: Arc<InMemoryFileStore> = Arc::new(InMemoryFileStore::new());
        let responder = DownloadResponder::new(files);
        let result =
            responder.handle_request("x", |_| PermissionDecision::deny("not a collaborator"));
        assert!(matches!(result, Err(TransferError::InvalidPermission { .. })));
    }

    #[test]
    fn tampered_chunk_is_rejected() {
        let data = vec![1u8, 2, 3];
        let tree = MerkleTree::build(&[data]).unwrap();
        let mut session = DownloadSession::new(tree.root_base64()).unwrap();
        session.on_metadata(metadata(3));

        let proof = tree.proof(0).unwrap();
        let result = session.on_chunk(0, vec![9, 9, 9], &proof);
        assert!(matches!(
            result,
            Err(TransferError::ProofVerificationFailed { chunk_index: 0 })
        ));
    }

    #[test]
    fn duplicate_chunk_delivery_is_idempotent() {
        let data = vec![1u8, 2, 3];
        let tree = MerkleTree::build(&[data.clone()]).unwrap();
        let mut session = DownloadSession::new(tree.root_base64()).unwrap();
        session.on_metadata(metadata(3));

        let proof = tree.proof(0).unwrap();
        session.on_chunk(0, data.clone(), &proof).unwrap();
        session.on_chunk(0, data.clone(), &proof).unwrap();
        assert_eq!(session.progress(), Some((1, 1)));
    }
}

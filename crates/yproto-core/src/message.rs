//! Message taxonomy: the typed decoded values carried by an
//! [`Envelope`] — Doc, Awareness, Ack, File, and RPC — and the envelope
//! framing that wraps them: magic bytes, version, document name,
//! the encrypted flag, and target-type dispatch.
//!
//! Encoding is deterministic: the same decoded value, with the same
//! field order, always produces bit-identical bytes, which is what
//! makes the SHA-256-based message id (see [`message_id`]) stable. A
//! decoded [`Envelope`] is explicitly untrusted input — it has been
//! neither authenticated nor authorized; that is a downstream policy
//! concern, not this module's.

use crate::error::DecodeError;
use crate::rpc::RpcFrame;
use crate::varint::{Cursor, Writer};
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Magic bytes identifying a yproto envelope ("YJS").
pub const MAGIC: [u8; 3] = [0x59, 0x4A, 0x53];
/// The only protocol version this codec understands.
pub const VERSION: u8 = 0x01;

/// True iff `bytes` begins with the envelope magic, without attempting
/// to parse anything further. Used to distinguish a framed envelope
/// from an unrelated byte stream (heartbeats excepted — see
/// [`crate::heartbeat::is_ping_message`]).
#[must_use]
pub fn is_binary_message(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0..3] == MAGIC
}

/// The byte that follows the 3-byte magic: `0x01` marks a full
/// envelope, `0x70` marks a ping/pong heartbeat (see [`crate::heartbeat`]).
pub const DISCRIMINATOR_ENVELOPE: u8 = 0x01;

/// One-byte target-type codes, dispatched on after the encrypted flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TargetType {
    /// CRDT sync-step traffic.
    Doc = 0x00,
    /// Presence/cursor traffic, opaque to this codec.
    Awareness = 0x01,
    /// Acknowledgement of a prior envelope by id.
    Ack = 0x02,
    /// File-transfer traffic (legacy tagged taxonomy, see [`FileStep`]).
    File = 0x03,
    /// Request/stream/response RPC multiplex.
    Rpc = 0x04,
}

impl TryFrom<u8> for TargetType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Doc),
            0x01 => Ok(Self::Awareness),
            0x02 => Ok(Self::Ack),
            0x03 => Ok(Self::File),
            0x04 => Ok(Self::Rpc),
            other => Err(DecodeError::UnknownTargetType(other)),
        }
    }
}

/// A CRDT sync-step segment carried by `Target::Doc`. The update/state
/// vector payloads are opaque — this codec neither interprets nor
/// merges them, it only carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocStep {
    /// Step 1 of the sync handshake: the sender's state vector.
    SyncStep1(Vec<u8>),
    /// Step 2 of the sync handshake: an update computed against a peer's
    /// state vector.
    SyncStep2(Vec<u8>),
    /// An incremental update outside the initial sync handshake.
    Update(Vec<u8>),
    /// Marks the sync handshake complete; carries no payload.
    SyncDone,
    /// The peer's write was denied; `permission` is reserved to `0`
    /// ("denied") in this protocol version.
    AuthDeny {
        /// Permission outcome; only `0` is defined.
        permission: u8,
        /// Human-readable denial reason.
        reason: String,
    },
}

impl DocStep {
    fn encode(&self, w: &mut Writer) {
        match self {
            Self::SyncStep1(sv) => {
                w.write_u8(0x00);
                w.write_bytes_lp(sv);
            }
            Self::SyncStep2(update) => {
                w.write_u8(0x01);
                w.write_bytes_lp(update);
            }
            Self::Update(update) => {
                w.write_u8(0x02);
                w.write_bytes_lp(update);
            }
            Self::SyncDone => {
                w.write_u8(0x03);
            }
            Self::AuthDeny { permission, reason } => {
                w.write_u8(0x04);
                w.write_u8(*permission);
                w.write_string(reason);
            }
        }
    }

    fn decode(c: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        match c.read_u8()? {
            0x00 => Ok(Self::SyncStep1(c.read_bytes_lp()?.to_vec())),
            0x01 => Ok(Self::SyncStep2(c.read_bytes_lp()?.to_vec())),
            0x02 => Ok(Self::Update(c.read_bytes_lp()?.to_vec())),
            0x03 => Ok(Self::SyncDone),
            0x04 => {
                let permission = c.read_u8()?;
                let reason = c.read_string()?;
                Ok(Self::AuthDeny { permission, reason })
            }
            tag => Err(DecodeError::UnknownStepTag {
                target: "doc",
                tag,
            }),
        }
    }
}

/// Presence/cursor traffic carried by `Target::Awareness`. Payloads are
/// opaque to this codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwarenessStep {
    /// An awareness state update.
    Update(Vec<u8>),
    /// A request for the peer's current awareness state.
    Request,
}

impl AwarenessStep {
    fn encode(&self, w: &mut Writer) {
        match self {
            Self::Update(update) => {
                w.write_u8(0x00);
                w.write_bytes_lp(update);
            }
            Self::Request => {
                w.write_u8(0x01);
            }
        }
    }

    fn decode(c: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        match c.read_u8()? {
            0x00 => Ok(Self::Update(c.read_bytes_lp()?.to_vec())),
            0x01 => Ok(Self::Request),
            tag => Err(DecodeError::UnknownStepTag {
                target: "awareness",
                tag,
            }),
        }
    }
}

/// The legacy tagged file-transfer taxonomy carried by `Target::File`.
///
/// Deprecated in favor of the RPC-based transfer protocol
/// (`yproto-files`'s upload/download state machines), but the wire
/// shapes remain part of the format and must still decode — older
/// peers, or a re-streamed capture, may still emit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStep {
    /// Request to download a file by content id.
    DownloadRequest {
        /// Content-addressed file id.
        file_id: Vec<u8>,
    },
    /// Announces an upload's metadata ahead of its chunks.
    UploadMetadata {
        /// Whether the file's bytes are encrypted (policy opaque to this codec).
        encrypted: bool,
        /// Client-assigned file id for this upload.
        file_id: Vec<u8>,
        /// Original filename.
        filename: String,
        /// Total file size in bytes.
        size: u64,
        /// MIME type.
        mime_type: String,
        /// Source last-modified time (caller-defined unit, typically epoch ms).
        last_modified: u64,
    },
    /// One chunk of file data with its Merkle inclusion proof.
    Part {
        /// File id this chunk belongs to.
        file_id: Vec<u8>,
        /// Zero-based chunk index.
        chunk_index: u64,
        /// Raw chunk bytes.
        chunk_data: Vec<u8>,
        /// Sibling hashes from this chunk's leaf to the Merkle root.
        proof: Vec<[u8; 32]>,
        /// Total chunk count for the file.
        total_chunks: u64,
        /// Bytes uploaded so far, including this chunk.
        bytes_uploaded: u64,
        /// Whether the chunk bytes are encrypted.
        encrypted: bool,
    },
    /// The peer denied access to a file-transfer operation.
    FileAuthDeny {
        /// Permission outcome; only `0` ("denied") is defined.
        permission: u8,
        /// File id the denial applies to.
        file_id: Vec<u8>,
        /// HTTP-like status code (e.g. 403, 404).
        status_code: u64,
        /// Optional human-readable reason.
        reason: Option<String>,
    },
}

impl FileStep {
    fn encode(&self, w: &mut Writer) {
        match self {
            Self::DownloadRequest { file_id } => {
                w.write_u8(0x00);
                w.write_bytes_lp(file_id);
            }
            Self::UploadMetadata {
                encrypted,
                file_id,
                filename,
                size,
                mime_type,
                last_modified,
            } => {
                w.write_u8(0x01);
                w.write_u8(u8::from(*encrypted));
                w.write_bytes_lp(file_id);
                w.write_string(filename);
                w.write_varuint(*size);
                w.write_string(mime_type);
                w.write_varuint(*last_modified);
            }
            Self::Part {
                file_id,
                chunk_index,
                chunk_data,
                proof,
                total_chunks,
                bytes_uploaded,
                encrypted,
            } => {
                w.write_u8(0x02);
                w.write_bytes_lp(file_id);
                w.write_varuint(*chunk_index);
                w.write_bytes_lp(chunk_data);
                w.write_varuint(proof.len() as u64);
                for hash in proof {
                    w.write_bytes(hash);
                }
                w.write_varuint(*total_chunks);
                w.write_varuint(*bytes_uploaded);
                w.write_u8(u8::from(*encrypted));
            }
            Self::FileAuthDeny {
                permission,
                file_id,
                status_code,
                reason,
            } => {
                w.write_u8(0x03);
                w.write_u8(*permission);
                w.write_bytes_lp(file_id);
                w.write_varuint(*status_code);
                match reason {
                    Some(r) => {
                        w.write_u8(1);
                        w.write_string(r);
                    }
                    None => w.write_u8(0),
                }
            }
        }
    }

    fn decode(c: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        match c.read_u8()? {
            0x00 => Ok(Self::DownloadRequest {
                file_id: c.read_bytes_lp()?.to_vec(),
            }),
            0x01 => {
                let encrypted = c.read_u8()? != 0;
                let file_id = c.read_bytes_lp()?.to_vec();
                let filename = c.read_string()?;
                let size = c.read_varuint()?;
                let mime_type = c.read_string()?;
                let last_modified = c.read_varuint()?;
                Ok(Self::UploadMetadata {
                    encrypted,
                    file_id,
                    filename,
                    size,
                    mime_type,
                    last_modified,
                })
            }
            0x02 => {
                let file_id = c.read_bytes_lp()?.to_vec();
                let chunk_index = c.read_varuint()?;
                let chunk_data = c.read_bytes_lp()?.to_vec();
                let proof_len = c.read_varuint()? as usize;
                let mut proof = Vec::with_capacity(proof_len);
                for _ in 0..proof_len {
                    let arr = c.read_bytes(32)?;
                    let mut hash = [0u8; 32];
                    hash.copy_from_slice(arr);
                    proof.push(hash);
                }
                let total_chunks = c.read_varuint()?;
                let bytes_uploaded = c.read_varuint()?;
                let encrypted = c.read_u8()? != 0;
                Ok(Self::Part {
                    file_id,
                    chunk_index,
                    chunk_data,
                    proof,
                    total_chunks,
                    bytes_uploaded,
                    encrypted,
                })
            }
            0x03 => {
                let permission = c.read_u8()?;
                let file_id = c.read_bytes_lp()?.to_vec();
                let status_code = c.read_varuint()?;
                let has_reason = c.read_u8()?;
                let reason = if has_reason != 0 {
                    Some(c.read_string()?)
                } else {
                    None
                };
                Ok(Self::FileAuthDeny {
                    permission,
                    file_id,
                    status_code,
                    reason,
                })
            }
            tag => Err(DecodeError::UnknownStepTag {
                target: "file",
                tag,
            }),
        }
    }
}

/// The typed, decoded body of an [`Envelope`], dispatched on target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// CRDT sync-step traffic.
    Doc(DocStep),
    /// Presence/cursor traffic.
    Awareness(AwarenessStep),
    /// Acknowledgement of a prior envelope, by id.
    Ack {
        /// The acknowledged envelope's id, as raw bytes (its decoded
        /// form is `base64::encode` of a SHA-256 digest, but this field
        /// carries the raw bytes so no re-encoding is needed to compare).
        message_id: Vec<u8>,
    },
    /// Legacy tagged file-transfer traffic.
    File(FileStep),
    /// Request/stream/response RPC multiplex.
    Rpc(RpcFrame),
}

impl Target {
    fn type_byte(&self) -> TargetType {
        match self {
            Self::Doc(_) => TargetType::Doc,
            Self::Awareness(_) => TargetType::Awareness,
            Self::Ack { .. } => TargetType::Ack,
            Self::File(_) => TargetType::File,
            Self::Rpc(_) => TargetType::Rpc,
        }
    }

    fn encode(&self, w: &mut Writer) {
        w.write_u8(self.type_byte() as u8);
        match self {
            Self::Doc(step) => step.encode(w),
            Self::Awareness(step) => step.encode(w),
            Self::Ack { message_id } => w.write_bytes_lp(message_id),
            Self::File(step) => step.encode(w),
            Self::Rpc(frame) => frame.encode(w),
        }
    }

    fn decode(c: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let target_type = TargetType::try_from(c.read_u8()?)?;
        match target_type {
            TargetType::Doc => Ok(Self::Doc(DocStep::decode(c)?)),
            TargetType::Awareness => Ok(Self::Awareness(AwarenessStep::decode(c)?)),
            TargetType::Ack => Ok(Self::Ack {
                message_id: c.read_bytes_lp()?.to_vec(),
            }),
            TargetType::File => Ok(Self::File(FileStep::decode(c)?)),
            TargetType::Rpc => Ok(Self::Rpc(RpcFrame::decode(c)?)),
        }
    }
}

/// A fully framed protocol message: magic, version, document name, the
/// encrypted flag, and a typed [`Target`] body.
///
/// Encoded bytes and the derived message id are memoized explicitly
/// (there is no implicit laziness in Rust the way the source's
/// lazy-getter message classes have): call [`Self::id`] or
/// [`Self::encoded`] to compute-and-cache, and [`Self::invalidate`]
/// after mutating `document`/`encrypted`/`target` in place.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The document this envelope concerns; may be empty.
    pub document: String,
    /// Whether the payload inside `target` is encrypted. Policy on what
    /// "encrypted" means is out of scope for this codec.
    pub encrypted: bool,
    /// The typed body.
    pub target: Target,
    encoded: Option<Vec<u8>>,
}

impl Envelope {
    /// Build a new envelope. The encoded-bytes cache starts empty.
    #[must_use]
    pub fn new(document: impl Into<String>, encrypted: bool, target: Target) -> Self {
        Self {
            document: document.into(),
            encrypted,
            target,
            encoded: None,
        }
    }

    /// Encode to bytes, ignoring any cache (always recomputes).
    #[must_use]
    pub fn encode_fresh(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(64);
        w.write_bytes(&MAGIC);
        w.write_u8(VERSION);
        w.write_string(&self.document);
        w.write_u8(u8::from(self.encrypted));
        self.target.encode(&mut w);
        w.into_bytes()
    }

    /// Encode to bytes, computing once and caching the result.
    pub fn encoded(&mut self) -> &[u8] {
        if self.encoded.is_none() {
            self.encoded = Some(self.encode_fresh());
        }
        self.encoded.as_ref().expect("just set")
    }

    /// Drop the cached encoded bytes, forcing recomputation on next access.
    /// Call after mutating `document`, `encrypted`, or `target` in place.
    pub fn invalidate(&mut self) {
        self.encoded = None;
    }

    /// The envelope's content-defined id: base64 of the SHA-256 of its
    /// encoded bytes. Stable for identical decoded values; two
    /// encodings of semantically equal envelopes collide by design.
    pub fn id(&mut self) -> String {
        message_id(self.encoded())
    }

    /// Decode an envelope from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::BadMagic` if the first three bytes aren't
    /// `YJS`, `DecodeError::UnsupportedVersion` if the version byte
    /// isn't `0x01`, `DecodeError::UnknownTargetType` for an
    /// unrecognized target byte, and `DecodeError::TrailingBytes` if
    /// bytes remain after a fully-consumed body.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut c = Cursor::new(bytes);
        let magic = c.read_bytes(3)?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = c.read_u8()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let document = c.read_string()?;
        let encrypted = c.read_u8()? != 0;
        let target = Target::decode(&mut c)?;
        if !c.is_empty() {
            return Err(DecodeError::TrailingBytes {
                count: c.remaining(),
            });
        }
        Ok(Self {
            document,
            encrypted,
            target,
            encoded: Some(bytes.to_vec()),
        })
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document
            && self.encrypted == other.encrypted
            && self.target == other.target
    }
}

impl Eq for Envelope {}

/// Compute an envelope's content-defined id from its encoded bytes:
/// base64 of the SHA-256 digest.
#[must_use]
pub fn message_id(encoded: &[u8]) -> String {
    let digest = Sha256::digest(encoded);
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awareness_request_matches_known_good_bytes() {
        let mut env = Envelope::new("d", false, Target::Awareness(AwarenessStep::Request));
        let bytes = env.encoded().to_vec();
        assert_eq!(
            bytes,
            vec![0x59, 0x4A, 0x53, 0x01, 0x01, 0x64, 0x00, 0x01, 0x01]
        );
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(decoded.document, "d");
        assert!(!decoded.encrypted);
        assert_eq!(decoded.target, Target::Awareness(AwarenessStep::Request));
    }

    #[test]
    fn ack_matches_known_good_bytes() {
        let mut env = Envelope::new(
            "",
            false,
            Target::Ack {
                message_id: vec![0xAA, 0xBB],
            },
        );
        let bytes = env.encoded().to_vec();
        assert_eq!(
            bytes,
            vec![0x59, 0x4A, 0x53, 0x01, 0x00, 0x00, 0x02, 0x02, 0xAA, 0xBB]
        );
    }

    #[test]
    fn round_trip_is_deterministic() {
        let mut env = Envelope::new(
            "doc-1",
            true,
            Target::Doc(DocStep::Update(vec![1, 2, 3, 4])),
        );
        let first = env.encoded().to_vec();
        let decoded = Envelope::decode(&first).unwrap();
        let mut re_encoded_env = Envelope::new(decoded.document, decoded.encrypted, decoded.target);
        assert_eq!(first, re_encoded_env.encoded());
    }

    #[test]
    fn stable_id_for_identical_values() {
        let mut a = Envelope::new("x", false, Target::Doc(DocStep::SyncDone));
        let mut b = Envelope::new("x", false, Target::Doc(DocStep::SyncDone));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn different_payload_different_id() {
        let mut a = Envelope::new("x", false, Target::Doc(DocStep::Update(vec![1])));
        let mut b = Envelope::new("x", false, Target::Doc(DocStep::Update(vec![2])));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn bad_magic_rejected() {
        let bytes = [0x00, 0x4A, 0x53, 0x01, 0x00, 0x00, 0x01, 0x01];
        assert!(matches!(Envelope::decode(&bytes), Err(DecodeError::BadMagic)));
    }

    #[test]
    fn bad_version_rejected() {
        let mut env = Envelope::new("", false, Target::Awareness(AwarenessStep::Request));
        let mut bytes = env.encoded().to_vec();
        bytes[3] = 0x02;
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(DecodeError::UnsupportedVersion(0x02))
        ));
    }

    #[test]
    fn unknown_target_type_rejected() {
        let mut env = Envelope::new("", false, Target::Awareness(AwarenessStep::Request));
        let mut bytes = env.encoded().to_vec();
        bytes[7] = 0x7F;
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(DecodeError::UnknownTargetType(0x7F))
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut env = Envelope::new("", false, Target::Doc(DocStep::SyncDone));
        let mut bytes = env.encoded().to_vec();
        bytes.push(0xFF);
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(DecodeError::TrailingBytes { count: 1 })
        ));
    }

    #[test]
    fn is_binary_message_detects_magic() {
        let mut env = Envelope::new("", false, Target::Doc(DocStep::SyncDone));
        assert!(is_binary_message(env.encoded()));
        assert!(!is_binary_message(b"not-yjs"));
        assert!(!is_binary_message(b"yj"));
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut env = Envelope::new("a", false, Target::Doc(DocStep::SyncDone));
        let first = env.encoded().to_vec();
        env.document = "b".to_string();
        env.invalidate();
        let second = env.encoded().to_vec();
        assert_ne!(first, second);
    }

    #[test]
    fn doc_auth_deny_roundtrip() {
        let mut env = Envelope::new(
            "d",
            false,
            Target::Doc(DocStep::AuthDeny {
                permission: 0,
                reason: "not a collaborator".into(),
            }),
        );
        let bytes = env.encoded().to_vec();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(
            decoded.target,
            Target::Doc(DocStep::AuthDeny {
                permission: 0,
                reason: "not a collaborator".into()
            })
        );
    }

    #[test]
    fn file_part_roundtrip_with_proof() {
        let step = FileStep::Part {
            file_id: vec![1, 2, 3],
            chunk_index: 4,
            chunk_data: vec![9; 128],
            proof: vec![[1u8; 32], [2u8; 32]],
            total_chunks: 10,
            bytes_uploaded: 512,
            encrypted: true,
        };
        let mut env = Envelope::new("d", true, Target::File(step.clone()));
        let bytes = env.encoded().to_vec();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(decoded.target, Target::File(step));
    }

    #[test]
    fn file_auth_deny_with_and_without_reason() {
        for reason in [None, Some("over quota".to_string())] {
            let step = FileStep::FileAuthDeny {
                permission: 0,
                file_id: vec![7, 7],
                status_code: 403,
                reason: reason.clone(),
            };
            let mut env = Envelope::new("", false, Target::File(step.clone()));
            let bytes = env.encoded().to_vec();
            let decoded = Envelope::decode(&bytes).unwrap();
            assert_eq!(decoded.target, Target::File(step));
        }
    }
}

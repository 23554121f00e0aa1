//! Transfer configuration: chunk size, timeouts, and size limits for
//! the file-transfer state machines, loaded and validated as TOML.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CHUNK_SIZE;

/// Configuration for the file-transfer state machines.
///
/// `chunk_size` is exposed for tests only: v1 of the protocol fixes it
/// at 65 536 bytes, and the upload/download session types do not
/// accept a different value from a peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferConfig {
    /// Chunk size in bytes. Fixed at 65 536 in protocol v1.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// How long a download session waits for its next frame before
    /// timing out, in milliseconds.
    #[serde(default = "default_download_timeout_ms")]
    pub download_timeout_ms: u64,
    /// How long an upload session may sit incomplete before the
    /// periodic sweep reclaims it, in milliseconds.
    #[serde(default = "default_upload_session_ttl_ms")]
    pub upload_session_ttl_ms: u64,
    /// Interval between upload-session GC sweeps, in milliseconds.
    #[serde(default = "default_upload_cleanup_interval_ms")]
    pub upload_cleanup_interval_ms: u64,
    /// Largest file size an upload may declare, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum unacknowledged chunk frames an uploader may have in
    /// flight at once. `0` means unbounded.
    #[serde(default)]
    pub max_in_flight_chunks: usize,
    /// Default timeout for an RPC call that isn't a download, in
    /// milliseconds.
    #[serde(default = "default_rpc_default_timeout_ms")]
    pub rpc_default_timeout_ms: u64,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_download_timeout_ms() -> u64 {
    60_000
}

fn default_upload_session_ttl_ms() -> u64 {
    3_600_000
}

fn default_upload_cleanup_interval_ms() -> u64 {
    300_000
}

fn default_max_file_size() -> u64 {
    1_073_741_824
}

fn default_rpc_default_timeout_ms() -> u64 {
    30_000
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            download_timeout_ms: default_download_timeout_ms(),
            upload_session_ttl_ms: default_upload_session_ttl_ms(),
            upload_cleanup_interval_ms: default_upload_cleanup_interval_ms(),
            max_file_size: default_max_file_size(),
            max_in_flight_chunks: 0,
            rpc_default_timeout_ms: default_rpc_default_timeout_ms(),
        }
    }
}

impl TransferConfig {
    /// Load from a TOML file, falling back to defaults if it doesn't
    /// parse any particular field (every field has a `#[serde(default)]`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or isn't valid TOML.
    pub fn load(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize to a pretty-printed TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (it shouldn't, for this type).
    pub fn save(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations that can't work: a zero chunk size, a
    /// cleanup interval longer than the TTL it's meant to enforce, or
    /// a timeout of zero.
    ///
    /// # Errors
    ///
    /// Returns an error describing which field failed validation.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be non-zero");
        }
        if self.download_timeout_ms == 0 {
            anyhow::bail!("download_timeout_ms must be non-zero");
        }
        if self.rpc_default_timeout_ms == 0 {
            anyhow::bail!("rpc_default_timeout_ms must be non-zero");
        }
        if self.upload_cleanup_interval_ms > self.upload_session_ttl_ms {
            anyhow::bail!(
                "upload_cleanup_interval_ms ({}) must not exceed upload_session_ttl_ms ({})",
                self.upload_cleanup_interval_ms,
                self.upload_session_ttl_ms
            );
        }
        Ok(())
    }
}

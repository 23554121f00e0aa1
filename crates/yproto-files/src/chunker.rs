//! Splitting a file into protocol-fixed chunks, and reassembling an
//! incoming stream of (possibly out-of-order) chunks back into a file.
//!
//! The chunk size is not configurable: it is the protocol constant
//! re-exported as [`crate::DEFAULT_CHUNK_SIZE`]. A file is cut
//! into chunks of exactly that size, except the last, which may be
//! shorter; an empty file is one empty chunk.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::DEFAULT_CHUNK_SIZE;

/// Number of chunks a file of `total_size` bytes splits into, given
/// `chunk_size`. An empty file is one chunk, not zero.
#[must_use]
pub fn chunk_count(total_size: u64, chunk_size: usize) -> u64 {
    if total_size == 0 {
        1
    } else {
        total_size.div_ceil(chunk_size as u64)
    }
}

/// Split an in-memory buffer into fixed-size chunks. An empty buffer
/// yields a single empty chunk, matching the on-disk chunker.
#[must_use]
pub fn split(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![Vec::new()];
    }
    data.chunks(chunk_size).map(<[u8]>::to_vec).collect()
}

/// Sequential/random-access chunk reader over a file on disk.
pub struct FileChunker {
    file: File,
    chunk_size: usize,
    total_size: u64,
    current_offset: u64,
}

impl FileChunker {
    /// Open a file for chunked reading with a given chunk size.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata
    /// cannot be read.
    pub fn new<P: AsRef<Path>>(path: P, chunk_size: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        let total_size = file.metadata()?.len();
        Ok(Self {
            file,
            chunk_size,
            total_size,
            current_offset: 0,
        })
    }

    /// Open a file for chunked reading using the protocol chunk size.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata
    /// cannot be read.
    pub fn with_default_size<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::new(path, DEFAULT_CHUNK_SIZE)
    }

    /// Total number of chunks this file splits into.
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        chunk_count(self.total_size, self.chunk_size)
    }

    /// The configured chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total file size in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Read the next chunk in sequence, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    pub fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.total_size == 0 && self.current_offset == 0 {
            self.current_offset = 1;
            return Ok(Some(Vec::new()));
        }
        if self.current_offset >= self.total_size {
            return Ok(None);
        }

        let remaining = self.total_size - self.current_offset;
        let chunk_len = remaining.min(self.chunk_size as u64) as usize;
        let mut buffer = vec![0u8; chunk_len];
        self.file.read_exact(&mut buffer)?;
        self.current_offset += chunk_len as u64;
        Ok(Some(buffer))
    }

    /// Seek the reader to the start of a given chunk index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or seeking fails.
    pub fn seek_to_chunk(&mut self, chunk_index: u64) -> io::Result<()> {
        if chunk_index >= self.num_chunks() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk index out of bounds",
            ));
        }
        let offset = chunk_index * self.chunk_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.current_offset = offset;
        Ok(())
    }

    /// Read one chunk by index, independent of sequential position.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is invalid or reading fails.
    pub fn read_chunk_at(&mut self, chunk_index: u64) -> io::Result<Vec<u8>> {
        self.seek_to_chunk(chunk_index)?;
        self.read_chunk()?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "chunk not found"))
    }
}

/// Receiving-side writer that accepts chunks in any order and tracks
/// which indices have arrived.
pub struct FileReassembler {
    file: File,
    chunk_size: usize,
    total_chunks: u64,
    received_chunks: HashSet<u64>,
}

impl FileReassembler {
    /// Create (or truncate) the destination file, pre-allocated to the
    /// expected size.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or pre-allocated.
    pub fn new<P: AsRef<Path>>(path: P, total_size: u64, chunk_size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_size)?;

        Ok(Self {
            file,
            chunk_size,
            total_chunks: chunk_count(total_size, chunk_size),
            received_chunks: HashSet::new(),
        })
    }

    /// Write one chunk at its index. Out-of-order and duplicate writes
    /// are both fine; a duplicate simply overwrites the same bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or writing fails.
    pub fn write_chunk(&mut self, chunk_index: u64, data: &[u8]) -> io::Result<()> {
        if chunk_index >= self.total_chunks {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk index out of bounds",
            ));
        }
        let offset = chunk_index * self.chunk_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.received_chunks.insert(chunk_index);
        Ok(())
    }

    /// True iff this index has already been written.
    #[must_use]
    pub fn has_chunk(&self, chunk_index: u64) -> bool {
        self.received_chunks.contains(&chunk_index)
    }

    /// Indices not yet received, in ascending order.
    #[must_use]
    pub fn missing_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks)
            .filter(|i| !self.received_chunks.contains(i))
            .collect()
    }

    /// Fraction of chunks received, in `[0.0, 1.0]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.received_chunks.len() as f64 / self.total_chunks as f64
    }

    /// True once every chunk has arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() as u64 == self.total_chunks
    }

    /// Flush the file to disk, rejecting if the transfer isn't complete.
    ///
    /// # Errors
    ///
    /// Returns an error if chunks are still missing or syncing fails.
    pub fn finalize(mut self) -> io::Result<()> {
        if !self.is_complete() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "transfer incomplete: {}/{} chunks received",
                    self.received_chunks.len(),
                    self.total_chunks
                ),
            ));
        }
        self.file.sync_all()
    }
}

//! Message-array codec: a concatenated, self-delimited list of
//! envelopes for batched delivery. Each element is written as a varint
//! length followed by that many bytes of encoded envelope; decoding
//! reads length-prefixed elements until the buffer is exhausted.

use crate::error::DecodeError;
use crate::message::Envelope;
use crate::varint::{Cursor, Writer};

/// Encode a batch of envelopes as a single concatenated, self-delimited buffer.
#[must_use]
pub fn encode_batch(envelopes: &mut [Envelope]) -> Vec<u8> {
    let mut w = Writer::new();
    for env in envelopes {
        w.write_bytes_lp(env.encoded());
    }
    w.into_bytes()
}

/// Decode a batch buffer into its constituent envelopes.
///
/// A malformed element aborts decoding of the whole batch — partial
/// results are not returned — and the error carries the byte offset at
/// which decoding failed.
///
/// # Errors
///
/// Propagates whatever [`Envelope::decode`] or the length-prefix reader
/// returns, with offsets relative to the start of `bytes`.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Envelope>, DecodeError> {
    let mut c = Cursor::new(bytes);
    let mut out = Vec::new();
    while !c.is_empty() {
        let element = c.read_bytes_lp()?;
        out.push(Envelope::decode(element)?);
    }
    Ok(out)
}

//! Fuzz target for the primitive varint/string/bytes cursor.
//!
//! Every read on [`Cursor`] must return `Err(DecodeError::Truncated |
//! VarintOverflow | InvalidUtf8)` on bad input rather than panicking,
//! and a round-tripped varint must decode back to the value written.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yproto_core::varint::{Cursor, Writer};

fuzz_target!(|data: &[u8]| {
    let mut c = Cursor::new(data);
    // Drain the buffer with a mix of reads; any error is fine, a panic is not.
    while !c.is_empty() {
        if c.read_varuint().is_err() {
            break;
        }
    }

    let mut c = Cursor::new(data);
    while !c.is_empty() {
        if c.read_string().is_err() {
            break;
        }
    }

    if data.len() >= 8 {
        let mut w = Writer::new();
        let v = u64::from_le_bytes(data[..8].try_into().unwrap());
        w.write_varuint(v);
        let bytes = w.into_bytes();
        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_varuint().unwrap(), v);
        assert!(c.is_empty());
    }
});

//! Fuzz target for the message-array batch codec.
//!
//! `decode_batch` must never panic: a malformed element aborts the
//! whole batch with an `Err`, never a crash.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yproto_core::batch::decode_batch;

fuzz_target!(|data: &[u8]| {
    let _ = decode_batch(data);
});

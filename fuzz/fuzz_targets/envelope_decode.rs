//! Fuzz target for the envelope codec.
//!
//! `Envelope::decode` must never panic on arbitrary input: malformed
//! magic, an unsupported version, an unknown target/step tag, a
//! truncated body, or trailing bytes are all ordinary `Err` results.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yproto_core::message::Envelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut env) = Envelope::decode(data) {
        // A successfully decoded envelope must re-encode to bytes whose
        // own decode reproduces an equal value (decode . encode . decode
        // is idempotent).
        let bytes = env.encoded().to_vec();
        let redecoded = Envelope::decode(&bytes).expect("re-encoding a decoded envelope must itself decode");
        assert_eq!(redecoded, env);
    }
});

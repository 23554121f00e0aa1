//! Fuzz target for opening a download session from an arbitrary
//! (attacker-controlled) content id string. `DownloadSession::new` must
//! reject anything that isn't valid base64 of a 32-byte SHA-256 root
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yproto_files::DownloadSession;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = DownloadSession::new(s);
    }
});

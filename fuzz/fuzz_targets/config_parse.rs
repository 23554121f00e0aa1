//! Fuzz test for transfer configuration parsing.
//!
//! Arbitrary TOML input must never panic when deserialized as
//! [`TransferConfig`]; invalid or partial documents simply fail to parse.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yproto_files::TransferConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<toml::Value, _> = toml::from_str(s);
        if let Ok(config) = TransferConfig::load(s) {
            let _ = config.validate();
            let _ = config.save();
        }
    }
});

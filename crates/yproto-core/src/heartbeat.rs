//! Ping/Pong heartbeat frames.
//!
//! These are not envelopes: there is no magic/version/document/target
//! structure, just a fixed 7-byte literal. A receiver tells a heartbeat
//! apart from an envelope by looking at byte index 3 — `0x01` for an
//! envelope, `0x70` for a heartbeat — without running the envelope
//! decoder at all. Heartbeats must never be handed to
//! [`crate::message::Envelope::decode`].

/// The literal bytes of a ping frame: `"YJSping"`.
pub const PING: [u8; 7] = *b"YJSping";
/// The literal bytes of a pong frame: `"YJSpong"`.
pub const PONG: [u8; 7] = *b"YJSpong";

/// Encode a ping heartbeat.
#[must_use]
pub fn encode_ping() -> Vec<u8> {
    PING.to_vec()
}

/// Encode a pong heartbeat.
#[must_use]
pub fn encode_pong() -> Vec<u8> {
    PONG.to_vec()
}

/// True iff `bytes` is exactly the ping literal.
#[must_use]
pub fn is_ping_message(bytes: &[u8]) -> bool {
    bytes == PING
}

/// True iff `bytes` is exactly the pong literal.
#[must_use]
pub fn is_pong_message(bytes: &[u8]) -> bool {
    bytes == PONG
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::is_binary_message;

    #[test]
    fn ping_is_recognized() {
        let bytes = encode_ping();
        assert!(is_ping_message(&bytes));
        assert!(!is_pong_message(&bytes));
    }

    #[test]
    fn pong_is_recognized() {
        let bytes = encode_pong();
        assert!(is_pong_message(&bytes));
        assert!(!is_ping_message(&bytes));
    }

    #[test]
    fn heartbeats_look_binary_but_arent_envelopes() {
        let ping = encode_ping();
        // Shares the 3-byte magic prefix with real envelopes...
        assert!(is_binary_message(&ping));
        // ...but the discriminator byte at index 3 marks it as a heartbeat.
        assert_eq!(ping[3], 0x70);
        assert_ne!(ping[3], crate::message::DISCRIMINATOR_ENVELOPE);
    }

    #[test]
    fn decoding_a_heartbeat_as_an_envelope_fails() {
        let ping = encode_ping();
        assert!(crate::message::Envelope::decode(&ping).is_err());
    }
}

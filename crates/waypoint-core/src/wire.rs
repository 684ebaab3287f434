//! Frozen wire exchanges spoken with existing clients and relays.
//!
//! Two tiny binary handshakes, both inherited from the deployed client
//! fleet and not open to redesign:
//!
//!   Reachability ping — the registry connects to an announced host,
//!   writes the 4-byte probe token, and expects one of two 4-byte magics
//!   back. Anything else marks the host as protocol-incompatible.
//!
//!   Relay open — the registry connects to a relay, writes an 8-byte open
//!   command, and reads a 12-byte reply: an 8-byte acknowledgement magic
//!   followed by a big-endian u32 carrying the allocated port.
//!
//! Byte sequences here must be preserved bit-for-bit.

/// Probe token written to an announced host.
pub const PROBE_TOKEN: [u8; 4] = *b"POKE";

/// Reply magic: host accepted the probe and has free slots.
pub const PROBE_ACK: [u8; 4] = *b"RANP";

/// Reply magic: host accepted the probe but the session is full.
pub const PROBE_FULL: [u8; 4] = *b"FULL";

/// "Open session" command sent to a relay.
pub const RELAY_OPEN_REQUEST: [u8; 8] = [0x00, 0x00, 0x46, 0x49, 0x00, 0x00, 0x00, 0x00];

/// Expected prefix of the relay's reply.
pub const RELAY_OPEN_ACK: [u8; 8] = [0x00, 0x00, 0x46, 0x4A, 0x00, 0x00, 0x00, 0x04];

/// Total size of the relay reply: acknowledgement plus a u32 port.
pub const RELAY_OPEN_REPLY_LEN: usize = 12;

/// Is this 4-byte reply one of the recognized probe magics?
pub fn is_probe_ack(magic: &[u8; 4]) -> bool {
    magic == &PROBE_ACK || magic == &PROBE_FULL
}

/// Parse a relay "open session" reply.
///
/// Returns the allocated port, or None when the acknowledgement magic is
/// wrong or the port does not fit in u16.
pub fn parse_relay_open_reply(reply: &[u8; RELAY_OPEN_REPLY_LEN]) -> Option<u16> {
    if reply[..8] != RELAY_OPEN_ACK {
        return None;
    }
    let port = u32::from_be_bytes(reply[8..12].try_into().unwrap());
    u16::try_from(port).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_magics_are_recognized() {
        assert!(is_probe_ack(b"RANP"));
        assert!(is_probe_ack(b"FULL"));
        assert!(!is_probe_ack(b"POKE"));
        assert!(!is_probe_ack(b"ranp"));
        assert!(!is_probe_ack(&[0u8; 4]));
    }

    #[test]
    fn relay_reply_parses_port() {
        let mut reply = [0u8; RELAY_OPEN_REPLY_LEN];
        reply[..8].copy_from_slice(&RELAY_OPEN_ACK);
        reply[8..].copy_from_slice(&55435u32.to_be_bytes());
        assert_eq!(parse_relay_open_reply(&reply), Some(55435));
    }

    #[test]
    fn relay_reply_rejects_wrong_magic() {
        let mut reply = [0u8; RELAY_OPEN_REPLY_LEN];
        reply[..8].copy_from_slice(&RELAY_OPEN_REQUEST);
        reply[8..].copy_from_slice(&1234u32.to_be_bytes());
        assert_eq!(parse_relay_open_reply(&reply), None);
    }

    #[test]
    fn relay_reply_rejects_oversized_port() {
        let mut reply = [0u8; RELAY_OPEN_REPLY_LEN];
        reply[..8].copy_from_slice(&RELAY_OPEN_ACK);
        reply[8..].copy_from_slice(&70000u32.to_be_bytes());
        assert_eq!(parse_relay_open_reply(&reply), None);
    }

    #[test]
    fn relay_reply_accepts_port_zero() {
        // Port zero is a relay-side decision, not ours to police here.
        let mut reply = [0u8; RELAY_OPEN_REPLY_LEN];
        reply[..8].copy_from_slice(&RELAY_OPEN_ACK);
        assert_eq!(parse_relay_open_reply(&reply), Some(0));
    }
}

//! Binary protocol for the G-80 door controller.
//!
//! The device exposes two characteristics: a command characteristic that
//! accepts fixed 32-byte frames, and a status characteristic whose packet
//! carries the battery level at a fixed offset. Frames were captured from
//! the vendor app; bytes 21 and 31 are the command code and checksum.

/// Command characteristic (acknowledged writes).
pub const COMMAND_CHAR: &str = "00000000-8e22-4541-9d4c-21edae82ed19";

/// Status characteristic (plain read).
pub const STATUS_CHAR: &str = "00000001-8e22-4541-9d4c-21edae82ed19";

/// One "open" pulse. The door travels only while the session stays up.
pub const OPEN_FRAME: [u8; 32] = [
    0x00, 0x27, 0x29, 0xe5, 0x68, 0x27, 0x29, 0xe5, 0x68, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x0e, 0x34, 0x0e, 0x34, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x13,
];

/// Close command. Runs to mechanical completion on its own.
pub const CLOSE_FRAME: [u8; 32] = [
    0x00, 0x2a, 0x29, 0xe5, 0x68, 0x2a, 0x29, 0xe5, 0x68, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x0e, 0x34, 0x0e, 0x34, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x2a,
];

/// Byte offset of the battery percentage within the status packet.
pub const BATTERY_OFFSET: usize = 48;

/// Extract the battery percentage from a raw status packet, if the packet
/// is long enough to carry one.
pub fn battery_from_status(packet: &[u8]) -> Option<u8> {
    packet.get(BATTERY_OFFSET).copied().filter(|pct| *pct <= 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_distinct_command_codes() {
        assert_eq!(OPEN_FRAME.len(), CLOSE_FRAME.len());
        assert_eq!(OPEN_FRAME[21], 0x01);
        assert_eq!(CLOSE_FRAME[21], 0x02);
    }

    #[test]
    fn battery_read_from_offset() {
        let mut packet = vec![0u8; 49];
        packet[BATTERY_OFFSET] = 87;
        assert_eq!(battery_from_status(&packet), Some(87));
    }

    #[test]
    fn short_packet_has_no_battery() {
        assert_eq!(battery_from_status(&[0u8; 10]), None);
    }

    #[test]
    fn out_of_range_reading_is_discarded() {
        let mut packet = vec![0u8; 49];
        packet[BATTERY_OFFSET] = 255;
        assert_eq!(battery_from_status(&packet), None);
    }
}

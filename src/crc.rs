//! Reflected CRC16 engine for ETH200 frames.
//!
//! The protocol uses a right-shifting (reflected) CRC16 with a fixed mask of
//! 0x8408 and a seed selected by device type. The sync word 0x7E is part of
//! the CRC preimage even though it never appears in a payload buffer, and
//! the final value is transmitted byte-swapped. The same functions serve the
//! encode (append) and decode (verify) paths.

/// Folds one input byte into a reflected CRC16.
///
/// Eight bit-steps, LSB first: if bit 0 of `crc XOR c` is set, shift right
/// and apply `mask`, otherwise just shift right.
pub fn crc16r_update(c: u8, crc: u16, mask: u16) -> u16 {
    let mut c = c as u16;
    let mut crc = crc;
    for _ in 0..8 {
        if (crc ^ c) & 1 != 0 {
            crc = (crc >> 1) ^ mask;
        } else {
            crc >>= 1;
        }
        c >>= 1;
    }
    crc
}

/// Computes the CRC16 of a logical packet.
///
/// The sync word is folded in as an implicit first input byte, followed by
/// `packet`. The two result bytes are swapped before returning, so the value
/// can be appended (or compared) big-endian as the frame's trailing pair.
pub fn packet_crc16r(packet: &[u8], seed: u16, mask: u16) -> u16 {
    let mut crc = crc16r_update(crate::consts::ETH200_SYNC_WORD, seed, mask);
    for &byte in packet {
        crc = crc16r_update(byte, crc, mask);
    }
    (crc & 0x00FF) << 8 | crc >> 8
}

//! Constants of the ETH200 wire protocol.
//!
//! Everything in here is reverse-engineered from on-air captures of the
//! original devices; none of it comes from a public specification. The CRC
//! seeds and mask in particular are opaque protocol constants and must not
//! be re-derived.
//!
//! ## Key concepts
//!
//! - **Packet sizes**: a logical payload is 8 (window sensor) or 9 (remote
//!   control) bytes including the trailing CRC pair. Bit stuffing can push
//!   the on-air frame one byte longer, so the chip-level read/write window
//!   is always 10 bytes.
//! - **Sync word**: 0x7E marks frame start. It is part of the CRC preimage
//!   but never stored in a payload buffer.
//! - **Repetitions**: actors only react reliably when a frame is repeated
//!   hundreds of times back to back with no byte realignment in between.

/// Maximum chip-level frame size in bytes: the 9-byte payload plus one byte
/// of possible bit-stuffing overflow.
pub const ETH200_MAX_PACKET_SIZE: u8 = 10;

/// See [`ETH200_MAX_PACKET_SIZE`].
pub const ETH200_MAX_PACKET_SIZE_USIZE: usize = ETH200_MAX_PACKET_SIZE as usize;

/// Maximum logical payload length in bytes (remote control, incl. CRC pair).
pub const ETH200_MAX_PAYLOAD_LEN: u8 = 9;

/// See [`ETH200_MAX_PAYLOAD_LEN`].
pub const ETH200_MAX_PAYLOAD_LEN_USIZE: usize = ETH200_MAX_PAYLOAD_LEN as usize;

/// Frame sync word. Transmitted Manchester-encoded as `0x6A 0xA9`.
pub const ETH200_SYNC_WORD: u8 = 0x7E;

/// CRC16 seed for window sensor frames.
pub const ETH200_CRC_SEED_WINDOW_SENSOR: u16 = 0xBDB7;

/// CRC16 seed for remote control frames.
pub const ETH200_CRC_SEED_REMOTE_CONTROL: u16 = 0xC11F;

/// CRC16 polynomial mask, shared by every device type.
pub const ETH200_CRC_MASK: u16 = 0x8408;

/// How often one frame is repeated per transmission. 350 and above
/// occasionally makes a thermostat trigger twice.
pub const ETH200_SEND_REPEATS: u16 = 330;

/// Opaque 2-byte preamble pushed once before the first repetition
/// (`0x55 55 AA AA` after Manchester encoding). Empirically captured from a
/// window sensor; the chip's own preamble generator cannot produce it.
pub const ETH200_TX_PREAMBLE: [u8; 2] = [0x00, 0xFF];

/// Channel is considered clear for transmit below this RSSI (dBm).
pub const CSMA_RSSI_LIMIT: i16 = -90;

/// Upper bound on the clear-channel wait before transmitting, in ms.
pub const CSMA_LIMIT_MS: u32 = 1000;

/// Bounded wait for the chip to report a mode change during init, in ms.
pub const MODE_READY_TIMEOUT_MS: u32 = 50;

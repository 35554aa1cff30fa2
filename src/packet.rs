//! Mapping between the raw ETH200 byte layout and semantic fields.
//!
//! A logical payload, before CRC and bit stuffing, is laid out as
//!
//! ```text
//! counter(1) | device type(1) | address(3, high byte first) | command(1) | extra command(0..1)
//! ```
//!
//! followed by the two CRC bytes. Window sensors carry no extra command byte
//! (8 bytes total), remote controls carry one (9 bytes total). The device
//! type byte doubles as the CRC seed selector.

use crate::consts::{
    ETH200_CRC_MASK, ETH200_CRC_SEED_REMOTE_CONTROL, ETH200_CRC_SEED_WINDOW_SENSOR,
    ETH200_MAX_PAYLOAD_LEN_USIZE,
};
use crate::crc::packet_crc16r;
use heapless::Vec;

/// Protocol discriminator selecting payload length and CRC seed.
///
/// Wall thermostats (0x30) and the USB programming stick (0x31..0x33) exist
/// on air but are not implemented; their frames classify as [`Unknown`] and
/// are discarded by the receive pipeline.
///
/// [`Unknown`]: DeviceType::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum DeviceType {
    /// Handheld remote control, 9-byte payload.
    RemoteControl,
    /// Window open/close sensor, 8-byte payload.
    WindowSensor,
    /// Any device type this driver does not speak.
    Unknown,
}

impl DeviceType {
    /// Classifies the device type byte of a decoded payload.
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0x10 => DeviceType::RemoteControl,
            0x20 => DeviceType::WindowSensor,
            _ => DeviceType::Unknown,
        }
    }

    /// The on-air device type byte. [`DeviceType::Unknown`] has none and
    /// maps to zero.
    pub fn wire_value(self) -> u8 {
        match self {
            DeviceType::RemoteControl => 0x10,
            DeviceType::WindowSensor => 0x20,
            DeviceType::Unknown => 0x00,
        }
    }

    /// Expected logical payload length including the CRC pair; zero for
    /// unknown types, which the receive pipeline rejects before any CRC work.
    pub fn payload_len(self) -> u8 {
        match self {
            DeviceType::RemoteControl => 9,
            DeviceType::WindowSensor => 8,
            DeviceType::Unknown => 0,
        }
    }

    /// CRC seed for this device type.
    pub fn crc_seed(self) -> Option<u16> {
        match self {
            DeviceType::RemoteControl => Some(ETH200_CRC_SEED_REMOTE_CONTROL),
            DeviceType::WindowSensor => Some(ETH200_CRC_SEED_WINDOW_SENSOR),
            DeviceType::Unknown => None,
        }
    }
}

/// Builds a logical payload with its trailing CRC pair.
///
/// The payload is zero-initialized to the device type's length and filled
/// with the counter, type byte, big-endian 3-byte address and command
/// byte(s); the CRC is computed over everything before its own two bytes.
///
/// Returns `None` for [`DeviceType::Unknown`] or when `extra_commands` does
/// not fit the device's layout (window sensors take none, remote controls
/// exactly one).
pub fn assemble(
    counter: u8,
    device_type: DeviceType,
    address: u32,
    command: u8,
    extra_commands: &[u8],
) -> Option<Vec<u8, ETH200_MAX_PAYLOAD_LEN_USIZE>> {
    let length = usize::from(device_type.payload_len());
    let seed = device_type.crc_seed()?;
    if 6 + extra_commands.len() + 2 != length {
        return None;
    }

    let mut payload: Vec<u8, ETH200_MAX_PAYLOAD_LEN_USIZE> = Vec::new();
    payload.resize_default(length).ok()?;
    payload[0] = counter;
    payload[1] = device_type.wire_value();
    payload[2] = (address >> 16) as u8;
    payload[3] = (address >> 8) as u8;
    payload[4] = address as u8;
    payload[5] = command;
    let mut pos = 6;
    for &extra in extra_commands {
        payload[pos] = extra;
        pos += 1;
    }

    let crc = packet_crc16r(&payload[..pos], seed, ETH200_CRC_MASK);
    payload[pos] = (crc >> 8) as u8;
    payload[pos + 1] = crc as u8;
    Some(payload)
}

/// One successfully received and CRC-verified frame.
///
/// Produced per receive cycle; the driver's internal scratch state is
/// overwritten by the next cycle, so this owns its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DecodedPacket {
    /// Rolling communication counter of the sender.
    pub counter: u8,
    /// Classified device type.
    pub device_type: DeviceType,
    /// Full logical payload including the trailing CRC pair.
    pub payload: Vec<u8, ETH200_MAX_PAYLOAD_LEN_USIZE>,
    /// Signal strength at the end of the receive cycle, in dBm.
    pub rssi: i16,
}

impl DecodedPacket {
    /// Disassembles a validated payload.
    ///
    /// Returns `None` when the device type is unknown or the length does not
    /// match the type; CRC verification is the receive pipeline's job and is
    /// not repeated here.
    pub fn from_payload(payload: &[u8], rssi: i16) -> Option<Self> {
        if payload.len() < 2 {
            return None;
        }
        let device_type = DeviceType::from_wire(payload[1]);
        if payload.len() != usize::from(device_type.payload_len()) {
            return None;
        }
        Some(Self {
            counter: payload[0],
            device_type,
            payload: Vec::from_slice(payload).ok()?,
            rssi,
        })
    }

    /// The 3-byte device address, high byte first.
    pub fn address(&self) -> u32 {
        u32::from(self.payload[2]) << 16 | u32::from(self.payload[3]) << 8 | u32::from(self.payload[4])
    }

    /// The command byte.
    pub fn command(&self) -> u8 {
        self.payload[5]
    }

    /// The extra command byte carried by remote control frames.
    pub fn extra_command(&self) -> Option<u8> {
        match self.device_type {
            DeviceType::RemoteControl => Some(self.payload[6]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_golden_window_sensor() {
        let payload = assemble(0xA0, DeviceType::WindowSensor, 0x01_4F_5E, 0x41, &[]).unwrap();
        assert_eq!(
            payload.as_slice(),
            &[0xA0, 0x20, 0x01, 0x4F, 0x5E, 0x41, 0xBC, 0x5D]
        );
    }

    #[test]
    fn test_assemble_remote_control_with_extra_command() {
        let payload = assemble(0x05, DeviceType::RemoteControl, 0x0A_0B_0C, 0x33, &[0x44]).unwrap();
        assert_eq!(
            payload.as_slice(),
            &[0x05, 0x10, 0x0A, 0x0B, 0x0C, 0x33, 0x44, 0x97, 0x8F]
        );
    }

    #[test]
    fn test_assemble_rejects_unknown_type() {
        assert!(assemble(1, DeviceType::Unknown, 0x01_02_03, 0x41, &[]).is_none());
    }

    #[test]
    fn test_assemble_rejects_mismatched_extras() {
        // Window sensors carry no extra command byte, remote controls one.
        assert!(assemble(1, DeviceType::WindowSensor, 0x01_02_03, 0x41, &[0x01]).is_none());
        assert!(assemble(1, DeviceType::RemoteControl, 0x01_02_03, 0x41, &[]).is_none());
        assert!(assemble(1, DeviceType::RemoteControl, 0x01_02_03, 0x41, &[0x01, 0x02]).is_none());
    }

    #[test]
    fn test_disassemble_golden_frame() {
        let payload = [0xA0, 0x20, 0x01, 0x4F, 0x5E, 0x41, 0xBC, 0x5D];
        let packet = DecodedPacket::from_payload(&payload, -72).unwrap();
        assert_eq!(packet.counter, 0xA0);
        assert_eq!(packet.device_type, DeviceType::WindowSensor);
        assert_eq!(packet.address(), 0x01_4F_5E);
        assert_eq!(packet.command(), 0x41);
        assert_eq!(packet.extra_command(), None);
        assert_eq!(packet.rssi, -72);
    }

    #[test]
    fn test_disassemble_rejects_length_type_mismatch() {
        // Window sensor byte with a remote control length.
        let payload = [0x01, 0x20, 0x0A, 0x0B, 0x0C, 0x33, 0x44, 0x97, 0x8F];
        assert!(DecodedPacket::from_payload(&payload, 0).is_none());
        assert!(DecodedPacket::from_payload(&[], 0).is_none());
        assert!(DecodedPacket::from_payload(&[0x01], 0).is_none());
    }

    #[test]
    fn test_assemble_disassemble_inverse() {
        let payload = assemble(0x07, DeviceType::RemoteControl, 0xAB_CD_EF, 0x12, &[0x34]).unwrap();
        let packet = DecodedPacket::from_payload(&payload, -80).unwrap();
        assert_eq!(packet.counter, 0x07);
        assert_eq!(packet.device_type, DeviceType::RemoteControl);
        assert_eq!(packet.address(), 0xAB_CD_EF);
        assert_eq!(packet.command(), 0x12);
        assert_eq!(packet.extra_command(), Some(0x34));
    }
}

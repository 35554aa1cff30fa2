//! ETH200 protocol driver for RFM69(C)W transceivers.
//!
//! This module provides the [`Eth200Driver`] struct, which owns the chip's
//! SPI bus, register set and FIFO and implements the full protocol framer
//! on top of them: interrupt-flagged frame reception and a manually
//! bit-packed, FIFO-paced transmission loop.
//!
//! ## Reception
//!
//! The chip matches the Manchester image of the 0x7E sync word in hardware
//! and raises DIO0 once a fixed 10-byte window is in the FIFO. The edge
//! handler sets an [`IrqFlag`]; [`receive_done`](Eth200Driver::receive_done)
//! picks it up from mainline code, freezes the chip, reads the window and
//! runs destuff → byte reversal → device type classification → length
//! bounds → CRC verification. Frames failing any step are discarded
//! silently and the receiver is re-armed; nothing is surfaced or counted.
//!
//! ## Transmission
//!
//! The devices only react reliably when a frame is repeated hundreds of
//! times with each repetition's bits packed directly against the previous
//! one, so [`send`](Eth200Driver::send) reprograms the chip's fixed packet
//! length to an effectively unbounded value and feeds the FIFO one
//! repetition at a time, pacing on the FIFO threshold flag. The call blocks
//! until the last repetition has left the modulator.
//!
//! A transmit call exclusively owns the chip for its whole duration;
//! transmit and receive never overlap. A stuck packet-sent flag blocks
//! indefinitely — an accepted limitation of the protocol's fire-and-forget
//! design, not a recoverable condition.

use crate::consts::{
    CSMA_LIMIT_MS, CSMA_RSSI_LIMIT, ETH200_CRC_MASK, ETH200_MAX_PACKET_SIZE,
    ETH200_MAX_PACKET_SIZE_USIZE, ETH200_MAX_PAYLOAD_LEN, ETH200_MAX_PAYLOAD_LEN_USIZE,
    ETH200_SEND_REPEATS, ETH200_SYNC_WORD, ETH200_TX_PREAMBLE, MODE_READY_TIMEOUT_MS,
};
use crate::crc::packet_crc16r;
use crate::encoding::{TxBitPacker, destuff, reverse_byte, stuff};
use crate::irq::IrqFlag;
use crate::packet::{DecodedPacket, DeviceType, assemble};
use crate::registers::{
    BASE_CONFIG, FIFO_SIZE, FIFOTHRESH_TXSTART_NOT_EMPTY, IRQFLAGS1_MODE_READY,
    IRQFLAGS2_FIFO_LEVEL, IRQFLAGS2_PACKET_SENT, IRQFLAGS2_PAYLOAD_READY, OPMODE_MODE_MASK,
    OPMODE_RX, OPMODE_STANDBY, OPMODE_TX, PACKETCONFIG2_RX_RESTART, PACKETCONFIG2_RX_RESTART_MASK,
    REG_FIFO, REG_FIFOTHRESH, REG_IRQFLAGS1, REG_IRQFLAGS2, REG_OPMODE, REG_PACKETCONFIG2,
    REG_PAYLOADLENGTH, REG_RSSIVALUE, REG_SYNCVALUE1, SPI_WRITE_BIT,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};
use heapless::Vec;
use thiserror::Error;

/// Sync word plus the largest stuffed frame.
const TX_FRAME_CAP: usize = ETH200_MAX_PACKET_SIZE_USIZE + 1;
/// One FIFO chunk: the 2-byte preamble plus one packed repetition.
const TX_CHUNK_CAP: usize = ETH200_TX_PREAMBLE.len() + TX_FRAME_CAP + 1;

/// Errors crossing the driver boundary.
///
/// Protocol-level receive errors never show up here; rejected frames are
/// discarded silently and the receiver re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error<E> {
    /// The underlying SPI transfer failed.
    #[error("bus transfer failed")]
    Spi(E),
    /// The chip did not respond, or a mode change was not signaled ready
    /// within the init timeout.
    #[error("chip did not become ready within timeout")]
    Timeout,
    /// `send_packet` was asked to encode for a device type this driver
    /// does not speak. Nothing was transmitted.
    #[error("unknown device type")]
    UnknownDeviceType,
    /// The requested frame does not fit the protocol's byte layout.
    #[error("frame does not fit the protocol layout")]
    InvalidFrame,
}

/// Chip operating mode as tracked by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Mode {
    /// Powered and configured, neither sending nor listening.
    #[default]
    Standby,
    /// Listening; the packet engine fills the FIFO on sync match.
    Rx,
    /// Draining the FIFO through the modulator.
    Tx,
}

impl Mode {
    fn opmode_bits(self) -> u8 {
        match self {
            Mode::Standby => OPMODE_STANDBY,
            Mode::Rx => OPMODE_RX,
            Mode::Tx => OPMODE_TX,
        }
    }
}

/// ETH200 protocol framer on an RFM69(C)W transceiver.
///
/// Generic over an `embedded-hal` [`SpiDevice`] (owning chip select) and a
/// [`DelayNs`] provider used for mode-ready polling and cooperative waits.
/// The chip's register set, FIFO and bus belong exclusively to this
/// instance; all access is single-threaded and lock-free, the only
/// concurrent party being the edge-triggered interrupt that sets the
/// [`IrqFlag`].
///
/// ## Example
///
/// ```ignore
/// static DIO0_FLAG: IrqFlag = IrqFlag::new();
///
/// let mut radio = Eth200Driver::new(spi, delay, &DIO0_FLAG);
/// radio.initialize()?;
/// loop {
///     if radio.receive_done()? {
///         if let Some(packet) = radio.decoded_packet() {
///             // packet.device_type, packet.address(), packet.command()
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Eth200Driver<SPI, D> {
    spi: SPI,
    delay: D,
    irq: &'static IrqFlag,
    mode: Mode,
    /// Expected payload length of the frame currently held in `data`;
    /// zero while no validated frame is pending.
    payload_len: u8,
    data: Vec<u8, ETH200_MAX_PAYLOAD_LEN_USIZE>,
    rssi: i16,
    counter: u8,
    last_sent: Vec<u8, ETH200_MAX_PACKET_SIZE_USIZE>,
    send_repeats: u16,
}

impl<SPI, D> Eth200Driver<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Creates a driver over the given bus and delay provider.
    ///
    /// `irq` is the flag set by the DIO0 edge handler. The packet counter
    /// starts at 1; no chip I/O happens until
    /// [`initialize`](Eth200Driver::initialize).
    pub fn new(spi: SPI, delay: D, irq: &'static IrqFlag) -> Self {
        Self {
            spi,
            delay,
            irq,
            mode: Mode::Standby,
            payload_len: 0,
            data: Vec::new(),
            rssi: 0,
            counter: 1,
            last_sent: Vec::new(),
            send_repeats: ETH200_SEND_REPEATS,
        }
    }

    /// Programs the chip and verifies it responds.
    ///
    /// Runs a register read/write round-trip on the first sync value
    /// register, applies the full [`BASE_CONFIG`] table and waits for
    /// standby to be signaled ready. Returns [`Error::Timeout`] when the
    /// chip is unresponsive or the mode never settles.
    pub fn initialize(&mut self) -> Result<(), Error<SPI::Error>> {
        self.check_register_round_trip(0xAA)?;
        self.check_register_round_trip(0x55)?;

        for &(reg, value) in BASE_CONFIG.iter() {
            self.write_reg(reg, value)?;
        }

        // BASE_CONFIG already selected standby; wait for it to settle.
        self.mode = Mode::Standby;
        self.wait_mode_ready(Some(MODE_READY_TIMEOUT_MS))?;
        debug_log!("radio initialized");
        Ok(())
    }

    /// Non-blocking receive poll.
    ///
    /// Returns `Ok(true)` exactly once per successfully decoded frame and
    /// freezes the chip in standby so the decoded buffer stays stable; the
    /// next call re-arms the receiver as a side effect. Returns `Ok(false)`
    /// while idle or mid-frame.
    pub fn receive_done(&mut self) -> Result<bool, Error<SPI::Error>> {
        if self.irq.take() {
            self.interrupt_handler()?;
        }
        if self.mode == Mode::Rx && self.payload_len > 0 {
            self.set_mode(Mode::Standby)?;
            Ok(true)
        } else if self.mode == Mode::Rx {
            // Already listening, nothing decoded yet.
            Ok(false)
        } else {
            self.receive_begin()?;
            Ok(false)
        }
    }

    /// The decoded payload of the last accepted frame, including its CRC
    /// pair. Valid until the receiver is re-armed by the next poll.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Signal strength in dBm, refreshed at the end of every receive cycle
    /// regardless of accept or reject.
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// The last accepted frame as semantic fields, if one is pending.
    pub fn decoded_packet(&self) -> Option<DecodedPacket> {
        DecodedPacket::from_payload(&self.data, self.rssi)
    }

    /// Diagnostic snapshot of the most recent wire frame handed to the
    /// chip; overwritten by every successful send.
    pub fn last_sent_packet(&self) -> &[u8] {
        &self.last_sent
    }

    /// The rolling packet counter used by the next
    /// [`send_packet`](Eth200Driver::send_packet).
    pub fn packet_counter(&self) -> u8 {
        self.counter
    }

    /// Overrides the per-transmission frame repeat count.
    ///
    /// Defaults to [`ETH200_SEND_REPEATS`]; values of 350 and above make
    /// some thermostats trigger twice.
    pub fn set_send_repeats(&mut self, repeats: u16) {
        self.send_repeats = repeats;
    }

    /// Transmits a raw, already stuffed frame.
    ///
    /// `stuffed_bits` is the number of valid bits in the frame's last byte
    /// when stuffing left it partial, or zero for a byte-aligned frame.
    /// Frames must hold 1 to [`ETH200_MAX_PACKET_SIZE`] bytes with at most
    /// 8 carry bits; anything else is rejected as [`Error::InvalidFrame`].
    /// Waits up to [`CSMA_LIMIT_MS`] for a clear channel (receive polling
    /// continues meanwhile), then blocks until every repetition has been
    /// sent. The frame is retained as the last-sent snapshot.
    pub fn send(&mut self, buffer: &[u8], stuffed_bits: u8) -> Result<(), Error<SPI::Error>> {
        if buffer.is_empty() || buffer.len() > ETH200_MAX_PACKET_SIZE_USIZE || stuffed_bits > 8 {
            return Err(Error::InvalidFrame);
        }

        // Avoid RX deadlocks while we wait for a quiet channel.
        let config2 = self.read_reg(REG_PACKETCONFIG2)?;
        self.write_reg(
            REG_PACKETCONFIG2,
            config2 & PACKETCONFIG2_RX_RESTART_MASK | PACKETCONFIG2_RX_RESTART,
        )?;

        let mut waited_ms: u32 = 0;
        while !self.can_send()? && waited_ms < CSMA_LIMIT_MS {
            let _ = self.receive_done()?;
            self.delay.delay_ms(1);
            waited_ms += 1;
        }

        debug_log!("sending frame {} times", self.send_repeats);
        self.send_frame(buffer, stuffed_bits)?;

        self.last_sent.clear();
        let _ = self.last_sent.extend_from_slice(buffer);
        Ok(())
    }

    /// Protocol-aware encode and transmit.
    ///
    /// Assembles the logical payload with the driver's rolling counter,
    /// appends the CRC, reverses, stuffs and transmits it. The counter
    /// increments once per successful send, wrapping from 255 to 1.
    ///
    /// Returns [`Error::UnknownDeviceType`] immediately, without touching
    /// the chip, for a device type this driver does not speak, and
    /// [`Error::InvalidFrame`] when `extra_commands` does not fit the
    /// device's layout (window sensors take none, remote controls one).
    pub fn send_packet(
        &mut self,
        device_type: DeviceType,
        address: u32,
        command: u8,
        extra_commands: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        if device_type.crc_seed().is_none() {
            debug_log!("send_packet: unknown device type, aborting");
            return Err(Error::UnknownDeviceType);
        }
        let payload = assemble(self.counter, device_type, address, command, extra_commands)
            .ok_or(Error::InvalidFrame)?;

        let mut wire = [0u8; ETH200_MAX_PAYLOAD_LEN_USIZE];
        for (out, &byte) in wire.iter_mut().zip(payload.iter()) {
            *out = reverse_byte(byte);
        }

        let length = payload.len();
        let mut stuffed = [0u8; ETH200_MAX_PACKET_SIZE_USIZE];
        let inserted = stuff(&wire[..length], &mut stuffed[..length + 1]);
        // With no insertion the overflow byte carries nothing and the frame
        // length stays at the payload length.
        let stuffed_len = if inserted == 0 { length } else { length + 1 };

        self.send(&stuffed[..stuffed_len], inserted)?;
        self.bump_counter();
        Ok(())
    }

    /// Current chip mode as tracked by the driver.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn bump_counter(&mut self) {
        // 1..=255; zero never appears on air.
        self.counter = if self.counter < 255 { self.counter + 1 } else { 1 };
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Error<SPI::Error>> {
        let mut buf = [reg & !SPI_WRITE_BIT, 0];
        self.spi.transfer_in_place(&mut buf).map_err(Error::Spi)?;
        Ok(buf[1])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error<SPI::Error>> {
        self.spi
            .write(&[reg | SPI_WRITE_BIT, value])
            .map_err(Error::Spi)
    }

    fn read_fifo(&mut self, buf: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[REG_FIFO & !SPI_WRITE_BIT]),
                Operation::Read(buf),
            ])
            .map_err(Error::Spi)
    }

    fn write_fifo(&mut self, bytes: &[u8]) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[REG_FIFO | SPI_WRITE_BIT]),
                Operation::Write(bytes),
            ])
            .map_err(Error::Spi)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), Error<SPI::Error>> {
        if self.mode == mode {
            return Ok(());
        }
        let opmode = self.read_reg(REG_OPMODE)?;
        self.write_reg(REG_OPMODE, opmode & OPMODE_MODE_MASK | mode.opmode_bits())?;
        self.mode = mode;
        Ok(())
    }

    /// Polls the mode-ready flag. Every mode change must settle before the
    /// next command; only init bounds the wait.
    fn wait_mode_ready(&mut self, timeout_ms: Option<u32>) -> Result<(), Error<SPI::Error>> {
        let mut waited_ms: u32 = 0;
        loop {
            if self.read_reg(REG_IRQFLAGS1)? & IRQFLAGS1_MODE_READY != 0 {
                return Ok(());
            }
            if let Some(limit) = timeout_ms {
                if waited_ms >= limit {
                    return Err(Error::Timeout);
                }
            }
            self.delay.delay_ms(1);
            waited_ms = waited_ms.saturating_add(1);
        }
    }

    /// Writes `value` to the first sync value register until it reads back,
    /// bounded by the init timeout.
    fn check_register_round_trip(&mut self, value: u8) -> Result<(), Error<SPI::Error>> {
        let mut waited_ms: u32 = 0;
        loop {
            self.write_reg(REG_SYNCVALUE1, value)?;
            if self.read_reg(REG_SYNCVALUE1)? == value {
                return Ok(());
            }
            if waited_ms >= MODE_READY_TIMEOUT_MS {
                return Err(Error::Timeout);
            }
            self.delay.delay_ms(1);
            waited_ms += 1;
        }
    }

    fn receive_begin(&mut self) -> Result<(), Error<SPI::Error>> {
        self.data.clear();
        self.payload_len = 0;
        if self.read_reg(REG_IRQFLAGS2)? & IRQFLAGS2_PAYLOAD_READY != 0 {
            // Stale payload in the FIFO; force a receiver restart.
            let config2 = self.read_reg(REG_PACKETCONFIG2)?;
            self.write_reg(
                REG_PACKETCONFIG2,
                config2 & PACKETCONFIG2_RX_RESTART_MASK | PACKETCONFIG2_RX_RESTART,
            )?;
        }
        self.set_mode(Mode::Rx)
    }

    /// Mainline half of the receive state machine, run once per consumed
    /// IRQ flag.
    fn interrupt_handler(&mut self) -> Result<(), Error<SPI::Error>> {
        if self.mode == Mode::Rx && self.read_reg(REG_IRQFLAGS2)? & IRQFLAGS2_PAYLOAD_READY != 0 {
            // Freeze the chip while we drain and parse the window.
            self.set_mode(Mode::Standby)?;
            let mut window = [0u8; ETH200_MAX_PACKET_SIZE_USIZE];
            self.read_fifo(&mut window)?;

            let mut payload = [0u8; ETH200_MAX_PACKET_SIZE_USIZE - 1];
            let _ = destuff(&window, &mut payload);
            for byte in payload.iter_mut() {
                *byte = reverse_byte(*byte);
            }

            match Self::validate_window(&payload) {
                Some(length) => {
                    self.data.clear();
                    let _ = self.data.extend_from_slice(&payload[..usize::from(length)]);
                    self.payload_len = length;
                    debug_log!("rx accept: counter {} length {}", payload[0], length);
                    self.set_mode(Mode::Rx)?;
                }
                None => {
                    // Not for us; discard and resume listening.
                    self.payload_len = 0;
                    self.receive_begin()?;
                }
            }
        }
        self.rssi = self.read_rssi()?;
        Ok(())
    }

    /// Classifies and CRC-verifies a destuffed, reversed window; `None`
    /// means silent discard.
    fn validate_window(payload: &[u8; ETH200_MAX_PACKET_SIZE_USIZE - 1]) -> Option<u8> {
        let device_type = DeviceType::from_wire(payload[1]);
        let length = device_type.payload_len();
        if length == 0 || length > ETH200_MAX_PAYLOAD_LEN {
            debug_log!("rx reject: unusable device type {}", payload[1]);
            return None;
        }
        let seed = device_type.crc_seed()?;

        let len = usize::from(length);
        let calculated = packet_crc16r(&payload[..len - 2], seed, ETH200_CRC_MASK);
        let received = u16::from(payload[len - 2]) << 8 | u16::from(payload[len - 1]);
        if calculated != received {
            debug_log!("rx reject: crc mismatch ({} != {})", received, calculated);
            return None;
        }
        Some(length)
    }

    fn read_rssi(&mut self) -> Result<i16, Error<SPI::Error>> {
        Ok(-i16::from(self.read_reg(REG_RSSIVALUE)?) >> 1)
    }

    /// Channel is clear when we are listening, nothing is pending and the
    /// instantaneous RSSI sits below the clear-channel limit.
    fn can_send(&mut self) -> Result<bool, Error<SPI::Error>> {
        if self.mode == Mode::Rx && self.payload_len == 0 && self.read_rssi()? < CSMA_RSSI_LIMIT {
            self.set_mode(Mode::Standby)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn poll_packet_sent(&mut self) -> nb::Result<(), Error<SPI::Error>> {
        if self.read_reg(REG_IRQFLAGS2).map_err(nb::Error::Other)? & IRQFLAGS2_PACKET_SENT != 0 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// FIFO-paced transmission of `send_repeats` back-to-back frame
    /// repetitions.
    fn send_frame(&mut self, buffer: &[u8], stuffed_bits: u8) -> Result<(), Error<SPI::Error>> {
        // Turn off the receiver to prevent reception while filling the FIFO.
        self.set_mode(Mode::Standby)?;
        self.wait_mode_ready(None)?;

        // After each fixed-length payload the chip would re-send its sync
        // word on its own; an effectively unbounded length lets us frame the
        // repeated sync+payload stream ourselves.
        self.write_reg(REG_PAYLOADLENGTH, 0xFF)?;
        // The level flag reads set once the fill strictly exceeds the
        // threshold, so one worst-case chunk (preamble, sync plus frame,
        // carry byte) written on a clear flag can never run past the FIFO
        // end.
        let chunk_cap = ETH200_TX_PREAMBLE.len() as u8 + 1 + buffer.len() as u8 + 1;
        let fifo_threshold = FIFO_SIZE - chunk_cap;
        self.write_reg(REG_FIFOTHRESH, FIFOTHRESH_TXSTART_NOT_EMPTY | fifo_threshold)?;

        let mut frame: Vec<u8, TX_FRAME_CAP> = Vec::new();
        let _ = frame.push(ETH200_SYNC_WORD);
        let _ = frame.extend_from_slice(buffer);

        // Sync word + full bytes + carry bits of a partial trailing byte.
        let num_bits = if stuffed_bits == 0 {
            8 + 8 * buffer.len() as u16
        } else {
            8 + 8 * (buffer.len() as u16 - 1) + u16::from(stuffed_bits)
        };

        // One continuous bit stream across all repetitions: the packer's
        // carry byte is never reset between them.
        let mut packer = TxBitPacker::new();
        let mut sent: u16 = 0;
        while sent < self.send_repeats {
            if self.read_reg(REG_IRQFLAGS2)? & IRQFLAGS2_FIFO_LEVEL == 0 {
                // Below threshold: at least one repetition still fits.
                let mut chunk: Vec<u8, TX_CHUNK_CAP> = Vec::new();
                if sent == 0 {
                    // The devices expect this fixed preamble ahead of the
                    // first sync word; the chip's own preamble generator
                    // cannot produce it.
                    let _ = chunk.extend_from_slice(&ETH200_TX_PREAMBLE);
                }
                packer.pack_repetition(&frame, num_bits, &mut chunk);
                self.write_fifo(&chunk)?;
                sent += 1;
            } else {
                if self.mode != Mode::Tx {
                    // FIFO is prefilled; let the modulator start draining
                    // while we keep feeding.
                    debug_log!("fifo threshold reached, starting tx");
                    self.set_mode(Mode::Tx)?;
                }
                self.delay.delay_us(100);
            }
        }

        // Unbounded by design: a stuck flag blocks forever.
        loop {
            match self.poll_packet_sent() {
                Ok(()) => break,
                Err(nb::Error::WouldBlock) => self.delay.delay_us(100),
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }

        self.set_mode(Mode::Standby)?;
        // Restore default fixed-length framing.
        self.write_reg(REG_PAYLOADLENGTH, ETH200_MAX_PACKET_SIZE)?;
        debug_log!("finished sending");
        Ok(())
    }
}

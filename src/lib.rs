//! # eth200
//!
//! A portable, no_std Rust driver for the ELV ETH comfort 200 868 MHz
//! home-automation protocol (window sensors, remote controls, simulated
//! thermostats) on RFM69(C)W FSK transceiver modules.
//!
//! This driver implements the reverse-engineered ETH200 wire format on top of
//! the chip's packet engine using:
//! - `embedded-hal` traits for SPI register access and timing
//! - bit stuffing/destuffing and per-byte bit-order reversal
//! - a reflected CRC16 with device-type-specific seeds
//! - an interrupt-flagged receive state machine and a FIFO-paced,
//!   bit-packed transmit loop that repeats a frame hundreds of times
//!
//! ## Crate features
//! | Feature         | Description |
//! |-----------------|-------------|
//! | `std`           | Disables `#![no_std]` support (used for host testing) |
//! | `irq` (default) | Global driver cell helpers using `critical_section` |
//! | `defmt-0-3`     | Uses `defmt` logging |
//! | `log`           | Uses `log` logging |
//!
//! ## Usage
//!
//! ```ignore
//! use eth200::driver::Eth200Driver;
//! use eth200::irq::IrqFlag;
//! use eth200::packet::DeviceType;
//!
//! static DIO0_FLAG: IrqFlag = IrqFlag::new();
//!
//! let mut radio = Eth200Driver::new(spi, delay, &DIO0_FLAG);
//! radio.initialize()?;
//!
//! // Wire the radio's DIO0 pin to an edge-triggered interrupt that only
//! // calls DIO0_FLAG.signal(); all chip I/O happens in mainline code.
//! loop {
//!     if radio.receive_done()? {
//!         let payload = radio.data();
//!         // ...
//!     }
//! }
//!
//! // Protocol-aware transmit: encodes, stuffs and repeats the frame.
//! radio.send_packet(DeviceType::WindowSensor, 0x01_4F_5E, 0x41, &[])?;
//! ```
//!
//! ## Integration notes
//!
//! - The chip's register set, FIFO and bus are exclusively owned by the
//!   driver instance; transmit and receive never overlap.
//! - The interrupt handler must only set the [`irq::IrqFlag`]; decoding runs
//!   from [`driver::Eth200Driver::receive_done`] in mainline code.
//! - A transmit call blocks until all frame repetitions have drained from
//!   the FIFO, which takes on the order of seconds at 9.6 kbit/s.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "irq")]
pub use critical_section;

pub use heapless;

// Forwards to whichever logging backend is enabled; evaluates and discards
// the arguments otherwise so log-only bindings never trip unused lints.
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
        #[cfg(feature = "defmt-0-3")]
        ::defmt::debug!($($arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
        {
            let _ = ($($arg)*,);
        }
    }};
}

pub mod consts;
pub mod crc;
pub mod driver;
pub mod encoding;
pub mod irq;
pub mod packet;
pub mod registers;

//! Interrupt plumbing for the DIO0 payload-ready signal.
//!
//! The chip raises an edge on its DIO0 pin when a full payload sits in the
//! FIFO. The handler for that edge must do nothing but call
//! [`IrqFlag::signal`]; all SPI traffic, parsing and state transitions run
//! from mainline code via
//! [`receive_done`](crate::driver::Eth200Driver::receive_done). Keeping the
//! handler free of bus access avoids re-entrant SPI transactions at
//! interrupt priority.
//!
//! With the `irq` feature enabled this module also provides helpers to park
//! the driver itself in a `critical_section`-protected static, for firmware
//! that needs to reach it from more than one execution context.

use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "irq")]
use crate::driver::Eth200Driver;
#[cfg(feature = "irq")]
use core::cell::RefCell;
#[cfg(feature = "irq")]
use critical_section::Mutex;
#[cfg(feature = "irq")]
use embedded_hal::{delay::DelayNs, spi::SpiDevice};

/// Single-writer/single-reader flag connecting the DIO0 edge to mainline
/// polling.
///
/// The interrupt context only ever sets the flag; the mainline only ever
/// consumes it. Plain atomics are sufficient, no locking happens at
/// interrupt priority.
#[derive(Debug)]
pub struct IrqFlag(AtomicBool);

impl IrqFlag {
    /// Creates an unset flag, suitable for a `static`.
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Marks the flag set. The only call allowed from interrupt context.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consumes the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Acquire)
    }

    /// Peeks at the flag without consuming it.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for IrqFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Used to initialize a global static driver cell.
///
/// # Example
/// ```ignore
/// static RADIO: Mutex<RefCell<Option<Eth200Driver<Spi, Delay>>>> =
///     global_radio_init::<Spi, Delay>();
/// ```
#[cfg(feature = "irq")]
pub const fn global_radio_init<SPI: SpiDevice, D: DelayNs>()
-> Mutex<RefCell<Option<Eth200Driver<SPI, D>>>> {
    Mutex::new(RefCell::new(None))
}

/// Moves a constructed driver into the global cell.
///
/// # Example
/// ```ignore
/// fn main() {
///     let radio = Eth200Driver::new(spi, delay, &DIO0_FLAG);
///     global_radio_setup(&RADIO, radio);
/// }
/// ```
#[cfg(feature = "irq")]
pub fn global_radio_setup<SPI: SpiDevice, D: DelayNs>(
    global_radio: &'static Mutex<RefCell<Option<Eth200Driver<SPI, D>>>>,
    radio: Eth200Driver<SPI, D>,
) {
    critical_section::with(|cs| {
        let _ = global_radio.borrow(cs).replace(Some(radio));
    });
}

/// Runs a closure against the parked driver, if it has been set up.
///
/// # Example
/// ```ignore
/// let got_frame = with_radio(&RADIO, |radio| radio.receive_done()).transpose()?;
/// ```
#[cfg(feature = "irq")]
pub fn with_radio<SPI: SpiDevice, D: DelayNs, R>(
    global_radio: &'static Mutex<RefCell<Option<Eth200Driver<SPI, D>>>>,
    f: impl FnOnce(&mut Eth200Driver<SPI, D>) -> R,
) -> Option<R> {
    critical_section::with(|cs| global_radio.borrow(cs).borrow_mut().as_mut().map(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_unset() {
        let flag = IrqFlag::new();
        assert!(!flag.is_set());
        assert!(!flag.take());
    }

    #[test]
    fn test_signal_take_cycle() {
        let flag = IrqFlag::new();
        flag.signal();
        assert!(flag.is_set());
        assert!(flag.take());
        // Consumed: a second take sees nothing.
        assert!(!flag.take());
    }

    #[test]
    fn test_signal_is_idempotent() {
        let flag = IrqFlag::new();
        flag.signal();
        flag.signal();
        assert!(flag.take());
        assert!(!flag.take());
    }
}

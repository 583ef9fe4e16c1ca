//! Collaborator traits used by the engine
//!
//! The engine never touches hardware directly. Everything it needs from the
//! electrical programming protocol goes through [`TargetPort`]; the activity
//! LED and the slow-clock jumper are the narrow [`Indicator`] and
//! [`StrapSensor`] traits.

use crate::protocol::SckOption;

/// Target programming port
///
/// One implementation per programming protocol. The engine treats every
/// primitive as infallible; implementations log problems and carry on, the
/// only status the host ever sees is the byte returned by
/// [`TargetPort::enter_programming_mode`].
pub trait TargetPort {
    /// Select the clock used by the next [`TargetPort::connect`]
    fn set_clock(&mut self, clock: SckOption);

    /// Drive the programming lines and hold the target in reset
    fn connect(&mut self);

    /// Release the programming lines and the target
    fn disconnect(&mut self);

    /// Clock one raw byte out and return the byte clocked in
    fn transmit(&mut self, byte: u8) -> u8;

    /// Send the programming-enable sequence
    ///
    /// Returns 0 on success, any other value when the target did not answer.
    fn enter_programming_mode(&mut self) -> u8;

    /// Read one byte of program memory
    fn read_flash(&mut self, address: u32) -> u8;

    /// Read one byte of data EEPROM
    fn read_eeprom(&mut self, address: u32) -> u8;

    /// Write one byte of program memory
    ///
    /// With `commit` the byte is programmed immediately (unpaged devices).
    /// Without it the byte is only loaded into the target's page buffer.
    fn write_flash(&mut self, address: u32, data: u8, commit: bool);

    /// Commit the page buffer to the page containing `address`
    ///
    /// `poll_value` is a byte of the page that can be used to detect the end
    /// of the write cycle.
    fn flush_page(&mut self, address: u32, poll_value: u8);

    /// Write one byte of data EEPROM (always committed)
    fn write_eeprom(&mut self, address: u32, data: u8);
}

impl<T: TargetPort + ?Sized> TargetPort for &mut T {
    fn set_clock(&mut self, clock: SckOption) {
        (**self).set_clock(clock)
    }

    fn connect(&mut self) {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn transmit(&mut self, byte: u8) -> u8 {
        (**self).transmit(byte)
    }

    fn enter_programming_mode(&mut self) -> u8 {
        (**self).enter_programming_mode()
    }

    fn read_flash(&mut self, address: u32) -> u8 {
        (**self).read_flash(address)
    }

    fn read_eeprom(&mut self, address: u32) -> u8 {
        (**self).read_eeprom(address)
    }

    fn write_flash(&mut self, address: u32, data: u8, commit: bool) {
        (**self).write_flash(address, data, commit)
    }

    fn flush_page(&mut self, address: u32, poll_value: u8) {
        (**self).flush_page(address, poll_value)
    }

    fn write_eeprom(&mut self, address: u32, data: u8) {
        (**self).write_eeprom(address, data)
    }
}

/// Activity indicator (the "busy" LED)
pub trait Indicator {
    /// Turn the indicator on
    fn on(&mut self);
    /// Turn the indicator off
    fn off(&mut self);
}

/// Slow-clock strap (jumper) sensor
pub trait StrapSensor {
    /// Whether the strap forcing the slow ISP clock is fitted
    fn is_asserted(&self) -> bool;
}

/// Indicator that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn on(&mut self) {}
    fn off(&mut self) {}
}

/// Strap with a fixed state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixedStrap(pub bool);

impl StrapSensor for FixedStrap {
    fn is_asserted(&self) -> bool {
        self.0
    }
}

//! Bit-banged ISP bus
//!
//! Used for the clock options below what a hardware SPI block can divide down
//! to, and on hosts where the programming lines are plain GPIOs.

use super::IspBus;
use crate::protocol::SckOption;

/// Pin-level operations needed to bit-bang the ISP bus
pub trait BitbangPins {
    /// Set SCK level
    fn set_sck(&mut self, high: bool);

    /// Set MOSI level
    fn set_mosi(&mut self, high: bool);

    /// Sample MISO
    fn get_miso(&self) -> bool;

    /// Drive RESET (`true` holds the target in reset)
    fn set_reset(&mut self, asserted: bool);

    /// Switch SCK, MOSI and RESET between driven and high impedance
    fn set_outputs_enabled(&mut self, enabled: bool);

    /// Busy-wait
    fn delay_us(&mut self, us: u32);
}

/// Shift one byte MSB first in SPI mode 0
///
/// MOSI is set up while SCK is low, MISO is sampled after the rising edge.
pub fn transfer_byte<P: BitbangPins + ?Sized>(pins: &mut P, byte: u8, half_period_us: u32) -> u8 {
    let mut received = 0u8;
    for i in (0..8).rev() {
        pins.set_mosi((byte >> i) & 1 != 0);
        pins.delay_us(half_period_us);
        pins.set_sck(true);
        received <<= 1;
        if pins.get_miso() {
            received |= 1;
        }
        pins.delay_us(half_period_us);
        pins.set_sck(false);
    }
    received
}

/// [`IspBus`] over [`BitbangPins`]
pub struct BitbangIsp<P> {
    pins: P,
    half_period_us: u32,
}

impl<P: BitbangPins> BitbangIsp<P> {
    /// Create a bus running at the default clock
    pub fn new(pins: P) -> Self {
        Self {
            pins,
            half_period_us: SckOption::Auto.half_period_us(),
        }
    }

    /// Pins
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Consume the bus and return the pins
    pub fn into_inner(self) -> P {
        self.pins
    }
}

impl<P: BitbangPins> IspBus for BitbangIsp<P> {
    fn set_clock(&mut self, clock: SckOption) {
        self.half_period_us = clock.half_period_us();
    }

    fn attach(&mut self) {
        self.pins.set_sck(false);
        self.pins.set_mosi(false);
        self.pins.set_outputs_enabled(true);
    }

    fn release(&mut self) {
        self.pins.set_reset(false);
        self.pins.set_outputs_enabled(false);
    }

    fn set_reset(&mut self, asserted: bool) {
        self.pins.set_reset(asserted);
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        transfer_byte(&mut self.pins, byte, self.half_period_us)
    }

    fn delay_us(&mut self, us: u32) {
        self.pins.delay_us(us);
    }
}

//! AVR in-system programming over a 4-wire serial bus
//!
//! [`Isp`] turns the engine's byte-level primitives into serial programming
//! instructions and handles the write-cycle timing of the target. The wires
//! themselves are behind [`IspBus`], implemented either by a hardware SPI
//! block or by [`bitbang::BitbangIsp`].

pub mod bitbang;
pub mod opcodes;

use log::{debug, warn};

use crate::port::TargetPort;
use crate::protocol::SckOption;

/// Electrical ISP bus
pub trait IspBus {
    /// Configure the SCK frequency
    fn set_clock(&mut self, clock: SckOption);

    /// Start driving RESET, SCK and MOSI
    fn attach(&mut self);

    /// Stop driving the bus and let the target run
    fn release(&mut self);

    /// Drive the target's RESET line (`true` holds the target in reset)
    fn set_reset(&mut self, asserted: bool);

    /// Shift one byte out on MOSI while shifting one in from MISO
    fn transfer(&mut self, byte: u8) -> u8;

    /// Busy-wait
    fn delay_us(&mut self, us: u32);
}

impl<T: IspBus + ?Sized> IspBus for &mut T {
    fn set_clock(&mut self, clock: SckOption) {
        (**self).set_clock(clock)
    }

    fn attach(&mut self) {
        (**self).attach()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn set_reset(&mut self, asserted: bool) {
        (**self).set_reset(asserted)
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        (**self).transfer(byte)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Serial programming port
pub struct Isp<B> {
    bus: B,
    extended_address: Option<u8>,
}

impl<B: IspBus> Isp<B> {
    /// Create a port on top of `bus`
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            extended_address: None,
        }
    }

    /// Underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Consume the port and return the bus
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Send one 4-byte instruction and return the 4 response bytes
    pub fn command(&mut self, frame: [u8; 4]) -> [u8; 4] {
        let mut response = [0u8; 4];
        for (slot, byte) in response.iter_mut().zip(frame) {
            *slot = self.bus.transfer(byte);
        }
        response
    }

    fn pulse_reset(&mut self) {
        self.bus.set_reset(false);
        self.bus.delay_us(opcodes::POLL_INTERVAL_US);
        self.bus.set_reset(true);
        self.bus.delay_us(opcodes::POLL_INTERVAL_US);
    }

    fn load_extended_address(&mut self, address: u32) {
        let ext = (address >> 17) as u8;
        if self.extended_address != Some(ext) {
            debug!("Loading extended address byte {:#04x}", ext);
            self.command([opcodes::LOAD_EXTENDED_ADDRESS, 0x00, ext, 0x00]);
            self.extended_address = Some(ext);
        }
    }

    fn flash_frame(opcode: u8, address: u32, data: u8) -> [u8; 4] {
        let word = address >> 1;
        let select = if address & 1 != 0 { opcodes::HIGH_BYTE } else { 0 };
        [opcode | select, (word >> 8) as u8, word as u8, data]
    }

    /// Poll flash at `address` until it no longer reads `busy`
    fn poll_flash(&mut self, address: u32, busy: u8) {
        for _ in 0..opcodes::POLL_RETRIES {
            if self.read_flash(address) != busy {
                return;
            }
            self.bus.delay_us(opcodes::POLL_INTERVAL_US);
        }
        warn!("Flash write at {:#x} did not finish in time", address);
    }
}

impl<B: IspBus> TargetPort for Isp<B> {
    fn set_clock(&mut self, clock: SckOption) {
        self.bus.set_clock(clock);
    }

    fn connect(&mut self) {
        self.bus.attach();
        self.bus.set_reset(true);
        self.bus.delay_us(opcodes::POLL_INTERVAL_US);
        self.pulse_reset();
        self.extended_address = None;
    }

    fn disconnect(&mut self) {
        self.bus.release();
    }

    fn transmit(&mut self, byte: u8) -> u8 {
        self.bus.transfer(byte)
    }

    fn enter_programming_mode(&mut self) -> u8 {
        let [op, arg] = opcodes::PROGRAMMING_ENABLE;
        for attempt in 0..opcodes::ENABLE_ATTEMPTS {
            let response = self.command([op, arg, 0x00, 0x00]);
            if response[2] == opcodes::PROGRAMMING_ENABLE_ECHO {
                debug!("Programming enabled after {} attempt(s)", attempt + 1);
                return 0;
            }
            self.pulse_reset();
        }
        warn!("Target did not acknowledge programming enable");
        1
    }

    fn read_flash(&mut self, address: u32) -> u8 {
        self.load_extended_address(address);
        self.command(Self::flash_frame(opcodes::READ_FLASH, address, 0))[3]
    }

    fn read_eeprom(&mut self, address: u32) -> u8 {
        self.command([opcodes::READ_EEPROM, (address >> 8) as u8, address as u8, 0])[3]
    }

    fn write_flash(&mut self, address: u32, data: u8, commit: bool) {
        self.load_extended_address(address);
        self.command(Self::flash_frame(opcodes::LOAD_FLASH, address, data));
        if !commit {
            return;
        }
        if data == opcodes::FLASH_BUSY {
            self.bus.delay_us(opcodes::FLASH_WRITE_DELAY_US);
        } else {
            self.poll_flash(address, opcodes::FLASH_BUSY);
        }
    }

    fn flush_page(&mut self, address: u32, poll_value: u8) {
        self.load_extended_address(address);
        self.command(Self::flash_frame(opcodes::WRITE_PAGE, address, 0));
        if poll_value == opcodes::PAGE_BUSY {
            self.bus.delay_us(opcodes::FLASH_WRITE_DELAY_US);
        } else {
            self.poll_flash(address, opcodes::PAGE_BUSY);
        }
    }

    fn write_eeprom(&mut self, address: u32, data: u8) {
        self.command([opcodes::WRITE_EEPROM, (address >> 8) as u8, address as u8, data]);
        self.bus.delay_us(opcodes::EEPROM_WRITE_DELAY_US);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::vec::Vec;

    use super::*;

    #[derive(Default)]
    struct ScriptedBus {
        sent: Vec<u8>,
        responses: VecDeque<u8>,
        resets: Vec<bool>,
        delays: Vec<u32>,
        attached: bool,
        clock: Option<SckOption>,
    }

    impl ScriptedBus {
        fn frames(&self) -> Vec<[u8; 4]> {
            self.sent
                .chunks(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect()
        }
    }

    impl IspBus for ScriptedBus {
        fn set_clock(&mut self, clock: SckOption) {
            self.clock = Some(clock);
        }

        fn attach(&mut self) {
            self.attached = true;
        }

        fn release(&mut self) {
            self.attached = false;
        }

        fn set_reset(&mut self, asserted: bool) {
            self.resets.push(asserted);
        }

        fn transfer(&mut self, byte: u8) -> u8 {
            self.sent.push(byte);
            self.responses.pop_front().unwrap_or(0)
        }

        fn delay_us(&mut self, us: u32) {
            self.delays.push(us);
        }
    }

    #[test]
    fn test_connect_pulses_reset() {
        let mut isp = Isp::new(ScriptedBus::default());
        isp.set_clock(SckOption::Khz8);
        isp.connect();
        assert!(isp.bus().attached);
        assert_eq!(isp.bus().clock, Some(SckOption::Khz8));
        assert_eq!(isp.bus().resets, [true, false, true]);

        isp.disconnect();
        assert!(!isp.bus().attached);
    }

    #[test]
    fn test_enable_retries_until_echo() {
        let mut bus = ScriptedBus::default();
        bus.responses.extend([0u8; 8]);
        bus.responses.extend([0x00, 0xAC, 0x53, 0x00]);
        let mut isp = Isp::new(bus);
        assert_eq!(isp.enter_programming_mode(), 0);
        assert_eq!(isp.bus().frames().len(), 3);
        assert_eq!(isp.bus().resets, [false, true, false, true]);
    }

    #[test]
    fn test_enable_gives_up() {
        let mut isp = Isp::new(ScriptedBus::default());
        assert_eq!(isp.enter_programming_mode(), 1);
        assert_eq!(isp.bus().frames().len(), opcodes::ENABLE_ATTEMPTS as usize);
    }

    #[test]
    fn test_read_flash_word_addressing() {
        let mut isp = Isp::new(ScriptedBus::default());
        isp.read_flash(0x0201);
        isp.read_flash(0x0200);
        let frames = isp.bus().frames();
        assert_eq!(frames[0], [0x4D, 0x00, 0x00, 0x00]);
        assert_eq!(frames[1], [0x28, 0x01, 0x00, 0x00]);
        assert_eq!(frames[2], [0x20, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_extended_address_loaded_on_change_only() {
        let mut isp = Isp::new(ScriptedBus::default());
        isp.read_flash(0x2_0000);
        isp.read_flash(0x2_0001);
        isp.write_flash(0x3_FFFE, 0x12, false);
        isp.read_flash(0x4_0000);

        let frames = isp.bus().frames();
        let loads: Vec<u8> = frames
            .iter()
            .filter(|f| f[0] == opcodes::LOAD_EXTENDED_ADDRESS)
            .map(|f| f[2])
            .collect();
        assert_eq!(loads, [1, 2]);

        isp.connect();
        isp.read_flash(0x4_0000);
        assert_eq!(isp.bus().frames().last().map(|f| f[0]), Some(0x20));
        let frames = isp.bus().frames();
        assert_eq!(frames[frames.len() - 2], [0x4D, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn test_flush_page_fixed_delay_for_erased_value() {
        let mut isp = Isp::new(ScriptedBus::default());
        isp.flush_page(0x40, 0xFF);
        let frames = isp.bus().frames();
        assert_eq!(frames.last(), Some(&[0x4C, 0x00, 0x20, 0x00]));
        assert_eq!(isp.bus().delays, [opcodes::FLASH_WRITE_DELAY_US]);
    }

    #[test]
    fn test_flush_page_polls_until_ready() {
        let mut bus = ScriptedBus::default();
        // extended address load + page write
        bus.responses.extend([0u8; 8]);
        // two busy reads then the programmed value
        bus.responses.extend([0, 0, 0, 0xFF, 0, 0, 0, 0xFF, 0, 0, 0, 0x42]);
        let mut isp = Isp::new(bus);
        isp.flush_page(0x10, 0x42);
        assert_eq!(isp.bus().frames().len(), 5);
        assert_eq!(isp.bus().delays, [opcodes::POLL_INTERVAL_US; 2]);
    }

    #[test]
    fn test_eeprom_write_waits() {
        let mut isp = Isp::new(ScriptedBus::default());
        isp.write_eeprom(0x1FF, 0xAB);
        assert_eq!(isp.bus().frames(), [[0xC0, 0x01, 0xFF, 0xAB]]);
        assert_eq!(isp.bus().delays, [opcodes::EEPROM_WRITE_DELAY_US]);
    }
}

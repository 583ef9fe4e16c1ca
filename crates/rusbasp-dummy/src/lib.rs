//! rusbasp-dummy - In-memory AVR target for testing
//!
//! This crate provides a simulated AVR microcontroller that answers the
//! serial programming instruction set on an [`IspBus`]. It keeps flash,
//! EEPROM, fuses and the page buffer in memory, so the whole programming
//! path can be exercised without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use log::{debug, trace, warn};
#[cfg(feature = "alloc")]
use rusbasp_core::isp::{opcodes, IspBus};
#[cfg(feature = "alloc")]
use rusbasp_core::protocol::SckOption;

/// Configuration for the simulated target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Signature bytes
    pub signature: [u8; 3],
    /// Flash size in bytes
    pub flash_size: usize,
    /// Flash page size in bytes, 0 for byte-programmed parts
    pub page_size: usize,
    /// EEPROM size in bytes
    pub eeprom_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            signature: [0x1E, 0x95, 0x0F], // ATmega328P
            flash_size: 32 * 1024,
            page_size: 128,
            eeprom_size: 1024,
        }
    }
}

#[cfg(feature = "std")]
impl From<&rusbasp_core::part::Part> for DummyConfig {
    fn from(part: &rusbasp_core::part::Part) -> Self {
        Self {
            signature: part.signature,
            flash_size: part.flash_size as usize,
            page_size: part.flash_page_size as usize,
            eeprom_size: part.eeprom_size as usize,
        }
    }
}

/// Fuse and lock bytes reported by the fuse read instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fuses {
    /// Low fuse
    pub low: u8,
    /// High fuse
    pub high: u8,
    /// Extended fuse
    pub extended: u8,
    /// Lock bits
    pub lock: u8,
}

impl Default for Fuses {
    fn default() -> Self {
        Self {
            low: 0x62,
            high: 0xD9,
            extended: 0xFF,
            lock: 0xFF,
        }
    }
}

/// Simulated AVR target
///
/// Instructions are only decoded while the bus is attached and the target is
/// held in reset. Memory instructions additionally require a preceding
/// programming enable; a reset pulse drops back out of programming mode.
#[cfg(feature = "alloc")]
pub struct DummyAvr {
    config: DummyConfig,
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    page_buffer: Vec<u8>,
    fuses: Fuses,
    attached: bool,
    in_reset: bool,
    enabled: bool,
    frame: [u8; 4],
    position: usize,
    extended_address: u8,
    clock: SckOption,
    page_writes: usize,
    byte_writes: usize,
    chip_erases: usize,
    elapsed_us: u64,
}

#[cfg(feature = "alloc")]
impl DummyAvr {
    /// Create an erased target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let flash = vec![0xFF; config.flash_size];
        let eeprom = vec![0xFF; config.eeprom_size];
        let page_buffer = vec![0xFF; config.page_size];
        Self {
            config,
            flash,
            eeprom,
            page_buffer,
            fuses: Fuses::default(),
            attached: false,
            in_reset: false,
            enabled: false,
            frame: [0; 4],
            position: 0,
            extended_address: 0,
            clock: SckOption::Auto,
            page_writes: 0,
            byte_writes: 0,
            chip_erases: 0,
            elapsed_us: 0,
        }
    }

    /// Create a target with default configuration (ATmega328P)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a target with pre-filled flash
    pub fn with_flash(config: DummyConfig, initial: &[u8]) -> Self {
        let mut avr = Self::new(config);
        let len = core::cmp::min(initial.len(), avr.flash.len());
        avr.flash[..len].copy_from_slice(&initial[..len]);
        avr
    }

    /// Flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable flash contents
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// EEPROM contents
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    /// Mutable EEPROM contents
    pub fn eeprom_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom
    }

    /// Clock selected by the last [`IspBus::set_clock`]
    pub fn clock(&self) -> SckOption {
        self.clock
    }

    /// Number of page writes (`4C`) executed
    pub fn page_writes(&self) -> usize {
        self.page_writes
    }

    /// Number of directly programmed flash bytes (unpaged parts)
    pub fn byte_writes(&self) -> usize {
        self.byte_writes
    }

    /// Number of chip erases executed
    pub fn chip_erases(&self) -> usize {
        self.chip_erases
    }

    /// Total time the programmer spent waiting
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    fn word_address(&self, hi: u8, lo: u8) -> usize {
        ((self.extended_address as usize) << 16) | ((hi as usize) << 8) | lo as usize
    }

    fn flash_address(&self, op: u8, hi: u8, lo: u8) -> usize {
        let high_byte = (op & opcodes::HIGH_BYTE != 0) as usize;
        (self.word_address(hi, lo) << 1) | high_byte
    }

    fn eeprom_address(hi: u8, lo: u8) -> usize {
        ((hi as usize) << 8) | lo as usize
    }

    /// Value shifted out while the fourth byte of `frame` is shifted in
    fn output(&self, frame: &[u8; 4]) -> u8 {
        if !self.enabled {
            return 0xFF;
        }
        let [op, b1, b2, _] = *frame;
        match (op, b1) {
            (opcodes::READ_FLASH, _) | (0x28, _) => {
                let addr = self.flash_address(op, b1, b2);
                self.flash.get(addr).copied().unwrap_or(0xFF)
            }
            (opcodes::READ_EEPROM, _) => self
                .eeprom
                .get(Self::eeprom_address(b1, b2))
                .copied()
                .unwrap_or(0xFF),
            (opcodes::READ_SIGNATURE, _) => {
                self.config.signature.get(b2 as usize).copied().unwrap_or(0xFF)
            }
            _ if [op, b1] == opcodes::READ_FUSE_LOW => self.fuses.low,
            _ if [op, b1] == opcodes::READ_FUSE_HIGH => self.fuses.high,
            _ if [op, b1] == opcodes::READ_FUSE_EXTENDED => self.fuses.extended,
            _ if [op, b1] == opcodes::READ_LOCK => self.fuses.lock,
            _ => 0x00,
        }
    }

    fn execute(&mut self, frame: [u8; 4]) {
        let [op, b1, b2, data] = frame;
        trace!("Dummy AVR instruction {:02X?}", frame);

        if [op, b1] == opcodes::PROGRAMMING_ENABLE {
            if !self.enabled {
                debug!("Dummy AVR entered programming mode");
            }
            self.enabled = true;
            return;
        }
        if !self.enabled {
            return;
        }

        match op {
            _ if [op, b1] == opcodes::CHIP_ERASE => self.chip_erase(),
            opcodes::LOAD_EXTENDED_ADDRESS => self.extended_address = b2,
            0x40 | 0x48 => {
                let addr = self.flash_address(op, b1, b2);
                self.load_flash(addr, data);
            }
            opcodes::WRITE_PAGE => {
                let addr = self.flash_address(op, b1, b2);
                self.write_page(addr);
            }
            opcodes::WRITE_EEPROM => {
                let addr = Self::eeprom_address(b1, b2);
                match self.eeprom.get_mut(addr) {
                    Some(byte) => *byte = data,
                    None => warn!("Dummy AVR: EEPROM write beyond end at {:#x}", addr),
                }
            }
            _ => {}
        }
    }

    fn load_flash(&mut self, addr: usize, data: u8) {
        if self.config.page_size == 0 {
            match self.flash.get_mut(addr) {
                Some(byte) => {
                    *byte &= data;
                    self.byte_writes += 1;
                }
                None => warn!("Dummy AVR: flash write beyond end at {:#x}", addr),
            }
        } else {
            let offset = addr % self.config.page_size;
            self.page_buffer[offset] = data;
        }
    }

    fn write_page(&mut self, addr: usize) {
        let page_size = self.config.page_size;
        if page_size == 0 {
            return;
        }
        let base = addr - addr % page_size;
        match self.flash.get_mut(base..base + page_size) {
            Some(page) => {
                // Programming can only clear bits
                for (cell, &byte) in page.iter_mut().zip(&self.page_buffer) {
                    *cell &= byte;
                }
                self.page_writes += 1;
                debug!("Dummy AVR wrote page at {:#x}", base);
            }
            None => warn!("Dummy AVR: page write beyond end at {:#x}", base),
        }
        self.page_buffer.fill(0xFF);
    }

    fn chip_erase(&mut self) {
        self.flash.fill(0xFF);
        self.eeprom.fill(0xFF);
        self.page_buffer.fill(0xFF);
        self.fuses.lock = 0xFF;
        self.chip_erases += 1;
        debug!("Dummy AVR chip erased");
    }
}

#[cfg(feature = "alloc")]
impl IspBus for DummyAvr {
    fn set_clock(&mut self, clock: SckOption) {
        self.clock = clock;
    }

    fn attach(&mut self) {
        self.attached = true;
        self.position = 0;
    }

    fn release(&mut self) {
        self.attached = false;
        self.in_reset = false;
        self.enabled = false;
        self.position = 0;
    }

    fn set_reset(&mut self, asserted: bool) {
        if !asserted {
            self.enabled = false;
            self.position = 0;
        }
        self.in_reset = asserted;
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        if !self.attached || !self.in_reset {
            return 0xFF;
        }

        let position = self.position;
        self.frame[position] = byte;
        let out = match position {
            0 => 0x00,
            1 => self.frame[0],
            2 if [self.frame[0], self.frame[1]] == opcodes::PROGRAMMING_ENABLE => {
                opcodes::PROGRAMMING_ENABLE_ECHO
            }
            2 => self.frame[1],
            _ => self.output(&self.frame),
        };

        if position == 3 {
            self.position = 0;
            self.execute(self.frame);
        } else {
            self.position += 1;
        }
        out
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusbasp_core::engine::Programmer;
    use rusbasp_core::isp::Isp;
    use rusbasp_core::port::TargetPort;
    use rusbasp_core::protocol::{
        BlockFlags, Command, SetupPacket, REQUEST_TYPE_VENDOR_IN, REQUEST_TYPE_VENDOR_OUT,
    };

    fn connected(config: DummyConfig) -> Isp<DummyAvr> {
        let mut isp = Isp::new(DummyAvr::new(config));
        isp.connect();
        assert_eq!(isp.enter_programming_mode(), 0);
        isp
    }

    #[test]
    fn test_ignores_bus_outside_reset() {
        let mut avr = DummyAvr::new_default();
        assert_eq!(avr.transfer(0xAC), 0xFF);

        let mut isp = Isp::new(avr);
        isp.connect();
        isp.disconnect();
        assert_eq!(isp.enter_programming_mode(), 1);
    }

    #[test]
    fn test_signature_and_fuses() {
        let mut isp = connected(DummyConfig::default());
        let sig: Vec<u8> = (0..3)
            .map(|i| isp.command([opcodes::READ_SIGNATURE, 0, i, 0])[3])
            .collect();
        assert_eq!(sig, [0x1E, 0x95, 0x0F]);

        let [op, arg] = opcodes::READ_FUSE_HIGH;
        assert_eq!(isp.command([op, arg, 0, 0])[3], 0xD9);
    }

    #[test]
    fn test_paged_write_and_read_back() {
        let mut isp = connected(DummyConfig::default());
        for addr in 0..128u32 {
            isp.write_flash(addr, addr as u8, false);
        }
        assert_eq!(isp.bus().page_writes(), 0);
        isp.flush_page(127, 127);
        assert_eq!(isp.bus().page_writes(), 1);

        for addr in 0..128u32 {
            assert_eq!(isp.read_flash(addr), addr as u8);
        }
        assert_eq!(isp.read_flash(128), 0xFF);
    }

    #[test]
    fn test_unpaged_write() {
        let config = DummyConfig {
            signature: [0x1E, 0x91, 0x01],
            flash_size: 2048,
            page_size: 0,
            eeprom_size: 128,
        };
        let mut isp = connected(config);
        isp.write_flash(0x10, 0x5A, true);
        isp.write_flash(0x11, 0x7F, true);
        assert_eq!(isp.bus().byte_writes(), 2);
        assert_eq!(&isp.bus().flash()[0x10..0x12], &[0x5A, 0x7F]);
    }

    #[test]
    fn test_chip_erase() {
        let mut flash = vec![0u8; 256];
        flash[0] = 0x12;
        let mut isp = Isp::new(DummyAvr::with_flash(DummyConfig::default(), &flash));
        isp.connect();
        isp.enter_programming_mode();
        assert_eq!(isp.read_flash(0), 0x12);

        let [op, arg] = opcodes::CHIP_ERASE;
        isp.command([op, arg, 0, 0]);
        assert_eq!(isp.read_flash(0), 0xFF);
        assert_eq!(isp.bus().chip_erases(), 1);
    }

    #[test]
    fn test_engine_end_to_end() {
        let mut prog = Programmer::new(Isp::new(DummyAvr::new_default()));
        let mut reply = [0u8; 8];

        prog.setup_raw(&[0xC0, Command::Connect.code(), 0, 0, 0, 0, 0, 0], &mut reply);
        let len = prog.setup_raw(
            &[0xC0, Command::EnableProgrammingMode.code(), 0, 0, 0, 0, 0, 0],
            &mut reply,
        );
        assert_eq!(len, 1);
        assert_eq!(reply[0], 0);

        let data: Vec<u8> = (0..200).map(|i| (i * 7) as u8).collect();
        let write = SetupPacket::new(REQUEST_TYPE_VENDOR_OUT, Command::WriteFlash)
            .with_address(0x100)
            .with_page(128, BlockFlags::FIRST | BlockFlags::LAST)
            .with_byte_count(data.len() as u16);
        assert!(prog.setup(&write).is_chunked());
        let mut done = 0;
        for chunk in data.chunks(8) {
            done += prog.write_raw(chunk) as usize;
        }
        assert_eq!(done, 1);
        assert_eq!(prog.port().bus().page_writes(), 2);

        let read = SetupPacket::new(REQUEST_TYPE_VENDOR_IN, Command::ReadFlash)
            .with_address(0x100)
            .with_byte_count(200);
        prog.setup(&read);
        let mut back = Vec::new();
        let mut remaining = 200usize;
        while remaining > 0 {
            let mut buf = [0u8; 8];
            let n = remaining.min(8);
            assert_eq!(prog.read_raw(&mut buf[..n]) as usize, n);
            back.extend_from_slice(&buf[..n]);
            remaining -= n;
        }
        assert_eq!(back, data);
        assert_eq!(prog.port().bus().flash()[0xFF], 0xFF);
    }
}

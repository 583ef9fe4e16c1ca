//! USBasp device driver
//!
//! Implements the host side of the protocol on top of any [`Transport`]:
//! clock selection, connect/disconnect, programming enable, raw ISP
//! instructions and block-wise memory transfers with long addresses and
//! paged-write block flags.

use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rusbasp_core::isp::opcodes;
use rusbasp_core::protocol::{
    BlockFlags, Command, MemoryKind, SckOption, SetupPacket, MAX_PAGE_SIZE,
    REQUEST_TYPE_VENDOR_IN, REQUEST_TYPE_VENDOR_OUT,
};

use crate::error::{HostError, Result};
use crate::transport::Transport;

/// Bytes per read command
pub const READ_BLOCK_SIZE: usize = 200;
/// Bytes per write command
pub const WRITE_BLOCK_SIZE: usize = 200;

/// Driver configuration
#[derive(Debug, Clone, Copy)]
pub struct UsbAspConfig {
    /// ISP clock requested at open
    pub clock: SckOption,
    /// Send SetExtendedAddress before every block
    ///
    /// Without it only the 16-bit legacy address field is available.
    pub long_addresses: bool,
}

impl Default for UsbAspConfig {
    fn default() -> Self {
        Self {
            clock: SckOption::Auto,
            long_addresses: true,
        }
    }
}

/// Fuse and lock bytes as read over ISP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseBytes {
    /// Low fuse
    pub low: u8,
    /// High fuse
    pub high: u8,
    /// Extended fuse
    pub extended: u8,
    /// Lock bits
    pub lock: u8,
}

/// Callback for progress reporting during memory transfers
pub trait TransferProgress {
    /// Called when a read of `total_bytes` starts
    fn reading(&mut self, _total_bytes: usize) {}

    /// Called after each read block
    fn read_progress(&mut self, _bytes_read: usize) {}

    /// Called when a write of `total_bytes` starts
    fn writing(&mut self, _total_bytes: usize) {}

    /// Called after each write block
    fn write_progress(&mut self, _bytes_written: usize) {}

    /// Called when the transfer is done
    fn complete(&mut self) {}
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferProgress for NoProgress {}

/// USBasp programmer
pub struct UsbAsp<T> {
    transport: T,
    config: UsbAspConfig,
}

impl<T: Transport> UsbAsp<T> {
    /// Open a programmer and select the configured clock
    pub fn open(transport: T, config: UsbAspConfig) -> Result<Self> {
        let mut usbasp = Self { transport, config };
        usbasp.set_clock(config.clock)?;
        Ok(usbasp)
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Select the ISP clock used by the next connect
    pub fn set_clock(&mut self, clock: SckOption) -> Result<()> {
        let setup = Self::setup_in(Command::SetClock).with_params([clock.code(), 0, 0, 0]);
        let mut reply = [0u8; 4];
        let n = self.transport.control_in(&setup, &mut reply)?;
        if n != 1 || reply[0] != 0 {
            warn!("usbasp: Programmer does not support clock selection, using its default");
        } else {
            debug!("usbasp: Clock set to {:?} ({} Hz)", clock, clock.frequency_hz());
        }
        Ok(())
    }

    /// Attach to the target and hold it in reset
    pub fn connect(&mut self) -> Result<()> {
        let mut reply = [0u8; 4];
        self.transport
            .control_in(&Self::setup_in(Command::Connect), &mut reply)?;
        Ok(())
    }

    /// Release the target
    pub fn disconnect(&mut self) -> Result<()> {
        let mut reply = [0u8; 4];
        self.transport
            .control_in(&Self::setup_in(Command::Disconnect), &mut reply)?;
        Ok(())
    }

    /// Put the target into programming mode
    pub fn enable_programming(&mut self) -> Result<()> {
        let mut reply = [0u8; 4];
        let n = self
            .transport
            .control_in(&Self::setup_in(Command::EnableProgrammingMode), &mut reply)?;
        if n != 1 {
            return Err(HostError::ShortTransfer {
                expected: 1,
                actual: n,
            });
        }
        if reply[0] != 0 {
            return Err(HostError::TargetNotResponding(reply[0]));
        }
        Ok(())
    }

    /// Connect and enter programming mode
    pub fn initialize(&mut self) -> Result<()> {
        self.connect()?;
        self.enable_programming()?;
        info!("usbasp: Target in programming mode");
        Ok(())
    }

    /// Clock one raw 4-byte ISP instruction through
    pub fn transmit(&mut self, frame: [u8; 4]) -> Result<[u8; 4]> {
        let setup = Self::setup_in(Command::RawTransmit).with_params(frame);
        let mut reply = [0u8; 4];
        let n = self.transport.control_in(&setup, &mut reply)?;
        if n != 4 {
            return Err(HostError::ShortTransfer {
                expected: 4,
                actual: n,
            });
        }
        Ok(reply)
    }

    /// Read the three signature bytes
    pub fn read_signature(&mut self) -> Result<[u8; 3]> {
        let mut signature = [0u8; 3];
        for (i, byte) in signature.iter_mut().enumerate() {
            *byte = self.transmit([opcodes::READ_SIGNATURE, 0, i as u8, 0])?[3];
        }
        debug!("usbasp: Signature {:02X?}", signature);
        Ok(signature)
    }

    /// Read fuse and lock bytes
    pub fn read_fuses(&mut self) -> Result<FuseBytes> {
        let mut read = |[op, arg]: [u8; 2]| -> Result<u8> { Ok(self.transmit([op, arg, 0, 0])?[3]) };
        Ok(FuseBytes {
            low: read(opcodes::READ_FUSE_LOW)?,
            high: read(opcodes::READ_FUSE_HIGH)?,
            extended: read(opcodes::READ_FUSE_EXTENDED)?,
            lock: read(opcodes::READ_LOCK)?,
        })
    }

    /// Erase flash and EEPROM, wait `delay_us` and re-enter programming mode
    pub fn chip_erase(&mut self, delay_us: u32) -> Result<()> {
        let [op, arg] = opcodes::CHIP_ERASE;
        self.transmit([op, arg, 0, 0])?;
        thread::sleep(Duration::from_micros(delay_us as u64));
        self.initialize()?;
        info!("usbasp: Chip erased");
        Ok(())
    }

    /// Read `buf.len()` bytes of `kind` starting at `address`
    pub fn read_memory(
        &mut self,
        kind: MemoryKind,
        address: u32,
        buf: &mut [u8],
        progress: &mut dyn TransferProgress,
    ) -> Result<()> {
        self.check_range(address, buf.len())?;
        progress.reading(buf.len());

        let mut done = 0;
        for block in buf.chunks_mut(READ_BLOCK_SIZE) {
            let block_address = address + done as u32;
            let setup = self.prepare_block(kind.read_command(), block_address)?;
            let n = self.transport.control_in(&setup, block)?;
            if n != block.len() {
                return Err(HostError::ShortTransfer {
                    expected: block.len(),
                    actual: n,
                });
            }
            done += n;
            progress.read_progress(done);
        }

        progress.complete();
        debug!("usbasp: Read {} bytes of {} at {:#x}", done, kind, address);
        Ok(())
    }

    /// Write `data` to `kind` starting at `address`
    ///
    /// For flash, `page_size` selects paged programming (0 writes byte by
    /// byte) and a paged write must start on a page boundary. EEPROM writes
    /// ignore `page_size`.
    pub fn write_memory(
        &mut self,
        kind: MemoryKind,
        address: u32,
        data: &[u8],
        page_size: u16,
        progress: &mut dyn TransferProgress,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(address, data.len())?;

        let page_size = match kind {
            MemoryKind::Flash => page_size,
            MemoryKind::Eeprom => 0,
        };
        if page_size > MAX_PAGE_SIZE {
            return Err(HostError::InvalidParameter(format!(
                "page size {} exceeds {}",
                page_size, MAX_PAGE_SIZE
            )));
        }
        if page_size != 0 && address % page_size as u32 != 0 {
            return Err(HostError::InvalidParameter(format!(
                "paged write must start on a page boundary ({:#x} is not a multiple of {})",
                address, page_size
            )));
        }

        progress.writing(data.len());
        let blocks = data.len().div_ceil(WRITE_BLOCK_SIZE);
        let mut done = 0;
        for (index, block) in data.chunks(WRITE_BLOCK_SIZE).enumerate() {
            let mut flags = BlockFlags::empty();
            if index == 0 {
                flags |= BlockFlags::FIRST;
            }
            if index + 1 == blocks {
                flags |= BlockFlags::LAST;
            }

            let block_address = address + done as u32;
            let setup = self
                .prepare_block(kind.write_command(), block_address)?
                .with_page(page_size, flags);
            self.transport.control_out(&setup, block)?;
            done += block.len();
            progress.write_progress(done);
        }

        progress.complete();
        debug!("usbasp: Wrote {} bytes of {} at {:#x}", done, kind, address);
        Ok(())
    }

    /// Compare `kind` starting at `address` with `expected`
    pub fn verify_memory(
        &mut self,
        kind: MemoryKind,
        address: u32,
        expected: &[u8],
        progress: &mut dyn TransferProgress,
    ) -> Result<()> {
        let mut actual = vec![0u8; expected.len()];
        self.read_memory(kind, address, &mut actual, progress)?;
        match expected.iter().zip(&actual).position(|(e, a)| e != a) {
            Some(offset) => Err(HostError::VerifyFailed {
                address: address + offset as u32,
                expected: expected[offset],
                actual: actual[offset],
            }),
            None => Ok(()),
        }
    }

    /// Release the target and return the transport
    pub fn close(mut self) -> Result<T> {
        self.disconnect()?;
        Ok(self.transport)
    }

    fn setup_in(command: Command) -> SetupPacket {
        SetupPacket::new(REQUEST_TYPE_VENDOR_IN, command)
    }

    /// Latch the block address and build the command's setup record
    fn prepare_block(&mut self, command: Command, address: u32) -> Result<SetupPacket> {
        let request_type = match command {
            Command::WriteFlash | Command::WriteEeprom => REQUEST_TYPE_VENDOR_OUT,
            _ => REQUEST_TYPE_VENDOR_IN,
        };
        if self.config.long_addresses {
            let setup = Self::setup_in(Command::SetExtendedAddress).with_extended_address(address);
            let mut reply = [0u8; 4];
            self.transport.control_in(&setup, &mut reply)?;
        }
        Ok(SetupPacket::new(request_type, command).with_address(address as u16))
    }

    fn check_range(&self, address: u32, len: usize) -> Result<()> {
        let end = address as u64 + len as u64;
        let limit = if self.config.long_addresses {
            u32::MAX as u64 + 1
        } else {
            u16::MAX as u64 + 1
        };
        if end > limit {
            return Err(HostError::InvalidParameter(format!(
                "range {:#x}+{:#x} is not addressable",
                address, len
            )));
        }
        Ok(())
    }
}

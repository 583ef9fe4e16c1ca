//! USBasp protocol constants and types
//!
//! Every command is a USB vendor control transfer. The 8-byte setup record is
//! the only command payload; memory contents travel in the data stage of the
//! same control transfer, split by the device's USB stack into chunks of at
//! most [`CHUNK_CAPACITY`] bytes.
//!
//! Setup record layout:
//!
//! | Byte | Meaning |
//! |------|---------|
//! | 0 | bmRequestType (consumed by the USB stack) |
//! | 1 | command code, see [`Command`] |
//! | 2-3 | legacy 16-bit address, little endian |
//! | 4 | page size, bits 0-7 |
//! | 5 | bits 0-3 block flags, bits 4-7 page size bits 8-11 |
//! | 6-7 | byte count (wLength), little endian |
//!
//! [`Command::SetExtendedAddress`] reads bytes 2-5 as one little-endian
//! 32-bit address instead.

use bitflags::bitflags;
use core::fmt;

use crate::error::{Error, Result};

/// Size of a setup record
pub const SETUP_LEN: usize = 8;

/// Maximum payload of one data-stage chunk
///
/// A chunk shorter than this terminates a chunked read.
pub const CHUNK_CAPACITY: usize = 8;

/// Maximum length of an immediate reply
pub const REPLY_CAPACITY: usize = 8;

/// Length byte telling the USB stack that a chunked transfer follows
pub const CHUNKED_TRANSFER: u8 = 0xFF;

/// Length byte returned by a chunk callback that found no armed transfer
pub const STATE_ERROR: u8 = 0xFF;

/// bmRequestType for vendor requests with a device-to-host data stage
pub const REQUEST_TYPE_VENDOR_IN: u8 = 0xC0;
/// bmRequestType for vendor requests with a host-to-device data stage
pub const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;

/// Largest page size expressible in a setup record (12 bits)
pub const MAX_PAGE_SIZE: u16 = 0x0FFF;

// =============================================================================
// Commands
// =============================================================================

/// Command codes (bRequest values for vendor control transfers)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Attach to the target and hold it in reset
    Connect = 1,
    /// Release the target
    Disconnect = 2,
    /// Clock four raw bytes through the ISP interface
    RawTransmit = 3,
    /// Chunked read of program memory
    ReadFlash = 4,
    /// Send the programming enable instruction
    EnableProgrammingMode = 5,
    /// Chunked write of program memory
    WriteFlash = 6,
    /// Chunked read of data EEPROM
    ReadEeprom = 7,
    /// Chunked write of data EEPROM
    WriteEeprom = 8,
    /// Latch a 32-bit address that overrides the legacy address field
    SetExtendedAddress = 9,
    /// Select the ISP clock used by the next connect
    SetClock = 10,
}

impl Command {
    /// Decode a command code, `None` for codes this engine does not handle
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Command::Connect),
            2 => Some(Command::Disconnect),
            3 => Some(Command::RawTransmit),
            4 => Some(Command::ReadFlash),
            5 => Some(Command::EnableProgrammingMode),
            6 => Some(Command::WriteFlash),
            7 => Some(Command::ReadEeprom),
            8 => Some(Command::WriteEeprom),
            9 => Some(Command::SetExtendedAddress),
            10 => Some(Command::SetClock),
            _ => None,
        }
    }

    /// Wire code of this command
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Connect => "CONNECT",
            Command::Disconnect => "DISCONNECT",
            Command::RawTransmit => "TRANSMIT",
            Command::ReadFlash => "READFLASH",
            Command::EnableProgrammingMode => "ENABLEPROG",
            Command::WriteFlash => "WRITEFLASH",
            Command::ReadEeprom => "READEEPROM",
            Command::WriteEeprom => "WRITEEEPROM",
            Command::SetExtendedAddress => "SETLONGADDRESS",
            Command::SetClock => "SETISPSCK",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Position of a write command inside a multi-command paged transfer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockFlags: u8 {
        /// First block: restart the page countdown
        const FIRST = 1 << 0;
        /// Last block: flush a partially filled page at the end
        const LAST  = 1 << 1;
    }
}

impl Default for BlockFlags {
    fn default() -> Self {
        BlockFlags::empty()
    }
}

/// Target memory selected by a read or write command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Program memory
    Flash,
    /// Data EEPROM
    Eeprom,
}

impl MemoryKind {
    /// Command that arms a chunked read of this memory
    pub fn read_command(self) -> Command {
        match self {
            MemoryKind::Flash => Command::ReadFlash,
            MemoryKind::Eeprom => Command::ReadEeprom,
        }
    }

    /// Command that arms a chunked write of this memory
    pub fn write_command(self) -> Command {
        match self {
            MemoryKind::Flash => Command::WriteFlash,
            MemoryKind::Eeprom => Command::WriteEeprom,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Flash => f.write_str("flash"),
            MemoryKind::Eeprom => f.write_str("eeprom"),
        }
    }
}

// =============================================================================
// ISP clock options (parameter of Command::SetClock)
// =============================================================================

/// ISP clock selector
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SckOption {
    /// Let the programmer pick (375 kHz)
    #[default]
    Auto = 0,
    /// 0.5 kHz
    Hz500 = 1,
    /// 1 kHz
    Khz1 = 2,
    /// 2 kHz
    Khz2 = 3,
    /// 4 kHz
    Khz4 = 4,
    /// 8 kHz, also forced by the slow-clock jumper
    Khz8 = 5,
    /// 16 kHz
    Khz16 = 6,
    /// 32 kHz
    Khz32 = 7,
    /// 93.75 kHz
    Khz93_75 = 8,
    /// 187.5 kHz
    Khz187_5 = 9,
    /// 375 kHz
    Khz375 = 10,
    /// 750 kHz
    Khz750 = 11,
    /// 1.5 MHz
    Mhz1_5 = 12,
}

const SCK_NAMES: &[(&str, SckOption)] = &[
    ("auto", SckOption::Auto),
    ("0.5k", SckOption::Hz500),
    ("1k", SckOption::Khz1),
    ("2k", SckOption::Khz2),
    ("4k", SckOption::Khz4),
    ("8k", SckOption::Khz8),
    ("16k", SckOption::Khz16),
    ("32k", SckOption::Khz32),
    ("93.75k", SckOption::Khz93_75),
    ("187.5k", SckOption::Khz187_5),
    ("375k", SckOption::Khz375),
    ("750k", SckOption::Khz750),
    ("1.5m", SckOption::Mhz1_5),
];

impl SckOption {
    /// Decode a clock code; unknown codes select [`SckOption::Auto`]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SckOption::Hz500,
            2 => SckOption::Khz1,
            3 => SckOption::Khz2,
            4 => SckOption::Khz4,
            5 => SckOption::Khz8,
            6 => SckOption::Khz16,
            7 => SckOption::Khz32,
            8 => SckOption::Khz93_75,
            9 => SckOption::Khz187_5,
            10 => SckOption::Khz375,
            11 => SckOption::Khz750,
            12 => SckOption::Mhz1_5,
            _ => SckOption::Auto,
        }
    }

    /// Parse a human-readable clock name such as `8k`, `187.5k` or `1.5M`
    pub fn parse(s: &str) -> Option<Self> {
        SCK_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, option)| option)
    }

    /// Wire code of this option
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Nominal SCK frequency in Hz
    pub fn frequency_hz(self) -> u32 {
        match self {
            SckOption::Auto => 375_000,
            SckOption::Hz500 => 500,
            SckOption::Khz1 => 1_000,
            SckOption::Khz2 => 2_000,
            SckOption::Khz4 => 4_000,
            SckOption::Khz8 => 8_000,
            SckOption::Khz16 => 16_000,
            SckOption::Khz32 => 32_000,
            SckOption::Khz93_75 => 93_750,
            SckOption::Khz187_5 => 187_500,
            SckOption::Khz375 => 375_000,
            SckOption::Khz750 => 750_000,
            SckOption::Mhz1_5 => 1_500_000,
        }
    }

    /// Half of one SCK period in microseconds (0 below 1 us)
    pub fn half_period_us(self) -> u32 {
        500_000 / self.frequency_hz()
    }

    /// Names accepted by [`SckOption::parse`]
    pub fn names() -> impl Iterator<Item = &'static str> {
        SCK_NAMES.iter().map(|(name, _)| *name)
    }
}

// =============================================================================
// Setup record
// =============================================================================

/// One 8-byte setup record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetupPacket {
    bytes: [u8; SETUP_LEN],
}

impl SetupPacket {
    /// Build an empty record for `command`
    pub fn new(request_type: u8, command: Command) -> Self {
        let mut bytes = [0u8; SETUP_LEN];
        bytes[0] = request_type;
        bytes[1] = command.code();
        Self { bytes }
    }

    /// Wrap raw setup bytes as received from the USB stack
    pub const fn from_bytes(bytes: [u8; SETUP_LEN]) -> Self {
        Self { bytes }
    }

    /// Parse the first 8 bytes of `data`
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let head = data.get(..SETUP_LEN).ok_or(Error::BufferTooSmall)?;
        let mut bytes = [0u8; SETUP_LEN];
        bytes.copy_from_slice(head);
        Ok(Self { bytes })
    }

    /// Raw bytes of the record
    pub fn as_bytes(&self) -> &[u8; SETUP_LEN] {
        &self.bytes
    }

    /// bmRequestType
    pub fn request_type(&self) -> u8 {
        self.bytes[0]
    }

    /// Command code (bRequest)
    pub fn code(&self) -> u8 {
        self.bytes[1]
    }

    /// Decoded command, `None` for unknown codes
    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.code())
    }

    /// The four parameter bytes 2-5
    pub fn params(&self) -> [u8; 4] {
        [self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5]]
    }

    /// Legacy 16-bit address from bytes 2-3
    pub fn legacy_address(&self) -> u16 {
        u16::from_le_bytes([self.bytes[2], self.bytes[3]])
    }

    /// 32-bit address from bytes 2-5
    pub fn extended_address(&self) -> u32 {
        u32::from_le_bytes(self.params())
    }

    /// Page size packed into byte 4 and the high nibble of byte 5
    pub fn page_size(&self) -> u16 {
        self.bytes[4] as u16 | (((self.bytes[5] & 0xF0) as u16) << 4)
    }

    /// Block flags from the low nibble of byte 5
    pub fn block_flags(&self) -> BlockFlags {
        BlockFlags::from_bits_truncate(self.bytes[5] & 0x0F)
    }

    /// Byte count (wLength) from bytes 6-7
    pub fn byte_count(&self) -> u16 {
        u16::from_le_bytes([self.bytes[6], self.bytes[7]])
    }

    /// Set the four parameter bytes 2-5
    pub fn with_params(mut self, params: [u8; 4]) -> Self {
        self.bytes[2..6].copy_from_slice(&params);
        self
    }

    /// Set the legacy 16-bit address
    pub fn with_address(mut self, address: u16) -> Self {
        self.bytes[2..4].copy_from_slice(&address.to_le_bytes());
        self
    }

    /// Set a 32-bit address in bytes 2-5
    pub fn with_extended_address(self, address: u32) -> Self {
        self.with_params(address.to_le_bytes())
    }

    /// Pack a page size (truncated to 12 bits) and block flags into bytes 4-5
    pub fn with_page(mut self, page_size: u16, flags: BlockFlags) -> Self {
        let page_size = page_size & MAX_PAGE_SIZE;
        self.bytes[4] = page_size as u8;
        self.bytes[5] = (((page_size >> 4) as u8) & 0xF0) | (flags.bits() & 0x0F);
        self
    }

    /// Set the byte count (wLength)
    pub fn with_byte_count(mut self, count: u16) -> Self {
        self.bytes[6..8].copy_from_slice(&count.to_le_bytes());
        self
    }
}

impl From<[u8; SETUP_LEN]> for SetupPacket {
    fn from(bytes: [u8; SETUP_LEN]) -> Self {
        Self::from_bytes(bytes)
    }
}

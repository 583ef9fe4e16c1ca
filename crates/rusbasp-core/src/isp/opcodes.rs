//! AVR serial programming instructions
//!
//! Every instruction is a 4-byte frame. The target echoes the first byte of
//! the frame in the second response byte and the second in the third; the
//! fourth response byte carries read data.

/// Programming enable: `AC 53 00 00`
pub const PROGRAMMING_ENABLE: [u8; 2] = [0xAC, 0x53];
/// Byte echoed in the third response byte of a successful enable
pub const PROGRAMMING_ENABLE_ECHO: u8 = 0x53;
/// Chip erase: `AC 80 00 00`
pub const CHIP_ERASE: [u8; 2] = [0xAC, 0x80];

/// Read program memory, low byte of the word (`| 0x08` for the high byte)
pub const READ_FLASH: u8 = 0x20;
/// Load program memory byte into the page buffer or program it directly
pub const LOAD_FLASH: u8 = 0x40;
/// Write program memory page
pub const WRITE_PAGE: u8 = 0x4C;
/// Load extended address byte (addresses above 128 KiB)
pub const LOAD_EXTENDED_ADDRESS: u8 = 0x4D;
/// Bit selecting the high byte of a program memory word
pub const HIGH_BYTE: u8 = 0x08;

/// Read EEPROM byte
pub const READ_EEPROM: u8 = 0xA0;
/// Write EEPROM byte
pub const WRITE_EEPROM: u8 = 0xC0;

/// Read signature byte: `30 00 idx 00`
pub const READ_SIGNATURE: u8 = 0x30;
/// Read low fuse: `50 00 00 00`
pub const READ_FUSE_LOW: [u8; 2] = [0x50, 0x00];
/// Read high fuse: `58 08 00 00`
pub const READ_FUSE_HIGH: [u8; 2] = [0x58, 0x08];
/// Read extended fuse: `50 08 00 00`
pub const READ_FUSE_EXTENDED: [u8; 2] = [0x50, 0x08];
/// Read lock bits: `58 00 00 00`
pub const READ_LOCK: [u8; 2] = [0x58, 0x00];

/// Value read back from flash while an unpaged write is in progress
pub const FLASH_BUSY: u8 = 0x7F;
/// Value read back from flash while a page write is in progress
pub const PAGE_BUSY: u8 = 0xFF;

/// Unit of the poll and settle delays
pub const POLL_INTERVAL_US: u32 = 320;
/// Poll attempts before giving up on a flash write
pub const POLL_RETRIES: u32 = 30;
/// Fixed wait when the written value cannot be polled
pub const FLASH_WRITE_DELAY_US: u32 = 4_800;
/// Fixed wait after an EEPROM byte write
pub const EEPROM_WRITE_DELAY_US: u32 = 9_600;
/// Programming enable attempts
pub const ENABLE_ATTEMPTS: u32 = 32;

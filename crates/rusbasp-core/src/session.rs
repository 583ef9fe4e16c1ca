//! Programming session state
//!
//! One session exists per engine. It remembers what the last setup record
//! armed so the chunk callbacks know which memory to touch and when the
//! transfer ends.

use crate::protocol::{BlockFlags, MemoryKind};

/// Transfer currently armed by the dispatcher
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Operation {
    /// No transfer in progress
    #[default]
    Idle,
    /// Chunked read of program memory
    ReadFlash,
    /// Chunked read of data EEPROM
    ReadEeprom,
    /// Chunked write of program memory
    WriteFlash,
    /// Chunked write of data EEPROM
    WriteEeprom,
}

impl Operation {
    /// Read operation for `kind`
    pub fn read(kind: MemoryKind) -> Self {
        match kind {
            MemoryKind::Flash => Operation::ReadFlash,
            MemoryKind::Eeprom => Operation::ReadEeprom,
        }
    }

    /// Write operation for `kind`
    pub fn write(kind: MemoryKind) -> Self {
        match kind {
            MemoryKind::Flash => Operation::WriteFlash,
            MemoryKind::Eeprom => Operation::WriteEeprom,
        }
    }

    /// Memory targeted by this operation, `None` when idle
    pub fn memory(self) -> Option<MemoryKind> {
        match self {
            Operation::Idle => None,
            Operation::ReadFlash | Operation::WriteFlash => Some(MemoryKind::Flash),
            Operation::ReadEeprom | Operation::WriteEeprom => Some(MemoryKind::Eeprom),
        }
    }

    /// Whether this is a read
    pub fn is_read(self) -> bool {
        matches!(self, Operation::ReadFlash | Operation::ReadEeprom)
    }

    /// Whether this is a write
    pub fn is_write(self) -> bool {
        matches!(self, Operation::WriteFlash | Operation::WriteEeprom)
    }
}

/// Programming session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    /// Armed transfer
    pub operation: Operation,
    /// Current target address, advanced by one per transferred byte
    pub address: u32,
    /// Set by SetExtendedAddress, cleared by Connect
    pub address_extended: bool,
    /// Bytes left in the armed write
    pub remaining: u16,
    /// Flash page size in bytes, 0 for unpaged writes
    pub page_size: u16,
    /// Block position flags of the armed write
    pub block_flags: BlockFlags,
    /// Bytes left until the current page is full
    pub page_counter: u16,
}

impl Session {
    /// Fresh idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no transfer is armed
    pub fn is_idle(&self) -> bool {
        self.operation == Operation::Idle
    }

    /// Latch a 32-bit address that survives until the next connect
    pub fn latch_extended_address(&mut self, address: u32) {
        self.address = address;
        self.address_extended = true;
    }

    /// Forget the latched address
    pub fn clear_extended_address(&mut self) {
        self.address_extended = false;
    }

    /// Arm a transfer
    ///
    /// The legacy address only replaces the current address when no extended
    /// address is latched.
    pub fn arm(&mut self, operation: Operation, legacy_address: u16, count: u16) {
        if !self.address_extended {
            self.address = legacy_address as u32;
        }
        self.remaining = count;
        self.operation = operation;
    }

    /// Set paging parameters for a flash write
    ///
    /// With [`BlockFlags::FIRST`] the page countdown restarts; otherwise it
    /// carries over from the previous block.
    pub fn set_paging(&mut self, page_size: u16, flags: BlockFlags) {
        self.page_size = page_size;
        self.block_flags = flags;
        if flags.contains(BlockFlags::FIRST) {
            self.page_counter = page_size;
        }
    }

    /// Whether the current page holds bytes that were not flushed yet
    pub fn page_pending(&self) -> bool {
        self.page_counter != self.page_size
    }

    /// Return to idle
    pub fn finish(&mut self) {
        self.operation = Operation::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert!(session.is_idle());
        assert!(!session.address_extended);
        assert!(!session.page_pending());
    }

    #[test]
    fn test_arm_respects_extended_address() {
        let mut session = Session::new();
        session.arm(Operation::ReadFlash, 0x1234, 10);
        assert_eq!(session.address, 0x1234);

        session.latch_extended_address(0x0002_0000);
        session.arm(Operation::ReadFlash, 0x1234, 10);
        assert_eq!(session.address, 0x0002_0000);

        session.clear_extended_address();
        session.arm(Operation::ReadEeprom, 0x10, 4);
        assert_eq!(session.address, 0x10);
        assert_eq!(session.operation.memory(), Some(MemoryKind::Eeprom));
    }

    #[test]
    fn test_paging_counter_carries_without_first() {
        let mut session = Session::new();
        session.set_paging(64, BlockFlags::FIRST);
        assert_eq!(session.page_counter, 64);

        session.page_counter = 10;
        session.set_paging(64, BlockFlags::LAST);
        assert_eq!(session.page_counter, 10);
        assert!(session.page_pending());
    }
}

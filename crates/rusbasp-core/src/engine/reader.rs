//! Device-to-host data stage

use log::trace;

use super::Programmer;
use crate::error::{Error, Result};
use crate::port::{Indicator, StrapSensor, TargetPort};
use crate::protocol::{CHUNK_CAPACITY, STATE_ERROR};
use crate::session::Operation;

impl<P, I, S> Programmer<P, I, S>
where
    P: TargetPort,
    I: Indicator,
    S: StrapSensor,
{
    /// Fill one read chunk
    ///
    /// Every byte of `buf` is read from the armed memory. A chunk shorter than
    /// [`CHUNK_CAPACITY`] is the last one of the transfer and returns the
    /// session to idle. The armed byte count is not consulted; the USB stack
    /// sizes the final chunk.
    pub fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let operation = self.session.operation;
        if !operation.is_read() {
            return Err(Error::ProtocolState);
        }

        for slot in buf.iter_mut() {
            let address = self.session.address;
            *slot = match operation {
                Operation::ReadFlash => self.port.read_flash(address),
                _ => self.port.read_eeprom(address),
            };
            self.session.address = address.wrapping_add(1);
        }
        trace!("Read chunk of {} bytes, next {:#x}", buf.len(), self.session.address);

        if buf.len() < CHUNK_CAPACITY {
            self.session.finish();
        }
        Ok(buf.len())
    }

    /// Raw form of [`Programmer::pull`]
    ///
    /// Returns the number of bytes produced, or `0xFF` when no read is armed.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> u8 {
        match self.pull(buf) {
            Ok(n) => n as u8,
            Err(_) => STATE_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Event, RecordingPort};
    use super::*;
    use crate::protocol::{Command, SetupPacket, REQUEST_TYPE_VENDOR_IN};

    fn armed(cmd: Command, address: u16, count: u16) -> Programmer<RecordingPort> {
        let mut prog = Programmer::new(RecordingPort::default());
        prog.setup(
            &SetupPacket::new(REQUEST_TYPE_VENDOR_IN, cmd)
                .with_address(address)
                .with_byte_count(count),
        );
        prog
    }

    #[test]
    fn test_pull_while_idle_is_state_error() {
        let mut prog = Programmer::new(RecordingPort::default());
        let mut buf = [0u8; 8];
        assert_eq!(prog.pull(&mut buf), Err(Error::ProtocolState));
        assert_eq!(prog.read_raw(&mut buf), STATE_ERROR);
        assert_eq!(prog.port().memory_accesses(), 0);
    }

    #[test]
    fn test_pull_while_write_armed_is_state_error() {
        let mut prog = armed(Command::WriteEeprom, 0x0040, 16);
        let mut buf = [0u8; 8];
        assert_eq!(prog.pull(&mut buf), Err(Error::ProtocolState));
        assert_eq!(prog.read_raw(&mut buf), STATE_ERROR);
        assert_eq!(prog.port().memory_accesses(), 0);
        assert_eq!(prog.session().operation, Operation::WriteEeprom);
        assert_eq!(prog.session().address, 0x0040);
    }

    #[test]
    fn test_address_continues_across_chunks() {
        let mut prog = armed(Command::ReadFlash, 0x0100, 20);
        let mut out = std::vec::Vec::new();
        for len in [8usize, 8, 4] {
            let mut buf = [0u8; 8];
            assert_eq!(prog.pull(&mut buf[..len]), Ok(len));
            out.extend_from_slice(&buf[..len]);
        }
        let expected: std::vec::Vec<u8> = (0x100u32..0x114).map(|a| a as u8).collect();
        assert_eq!(out, expected);
        assert!(prog.session().is_idle());
        assert_eq!(prog.session().address, 0x114);
    }

    #[test]
    fn test_short_chunk_ends_transfer_early() {
        let mut prog = armed(Command::ReadEeprom, 0, 64);
        let mut buf = [0u8; 3];
        assert_eq!(prog.read_raw(&mut buf), 3);
        assert_eq!(buf, [0x80, 0x81, 0x82]);
        assert!(prog.session().is_idle());
        assert_eq!(prog.read_raw(&mut buf), STATE_ERROR);
    }

    #[test]
    fn test_full_chunk_keeps_read_armed() {
        let mut prog = armed(Command::ReadFlash, 0, 8);
        let mut buf = [0u8; 8];
        assert_eq!(prog.pull(&mut buf), Ok(8));
        assert!(!prog.session().is_idle());

        assert_eq!(prog.pull(&mut []), Ok(0));
        assert!(prog.session().is_idle());
        assert_eq!(
            prog.port().events.last(),
            Some(&Event::ReadFlash(7))
        );
    }
}

//! Host-to-device data stage

use log::{debug, trace};

use super::Programmer;
use crate::error::{Error, Result};
use crate::port::{Indicator, StrapSensor, TargetPort};
use crate::protocol::{BlockFlags, STATE_ERROR};
use crate::session::Operation;

impl<P, I, S> Programmer<P, I, S>
where
    P: TargetPort,
    I: Indicator,
    S: StrapSensor,
{
    /// Consume one write chunk
    ///
    /// Returns `true` on the chunk that brings the armed byte count to zero.
    /// Bytes following the completing byte in the same chunk are discarded.
    pub fn push(&mut self, data: &[u8]) -> Result<bool> {
        let operation = self.session.operation;
        if !operation.is_write() {
            return Err(Error::ProtocolState);
        }

        let mut complete = false;
        for &byte in data {
            let address = self.session.address;

            if operation == Operation::WriteFlash {
                self.write_flash_byte(address, byte);
            } else {
                self.port.write_eeprom(address, byte);
            }

            self.session.remaining = self.session.remaining.wrapping_sub(1);
            if self.session.remaining == 0 {
                self.session.finish();
                if operation == Operation::WriteFlash
                    && self.session.block_flags.contains(BlockFlags::LAST)
                    && self.session.page_pending()
                {
                    debug!("Flushing partial page at {:#x}", address);
                    self.port.flush_page(address, byte);
                }
                complete = true;
            }

            self.session.address = address.wrapping_add(1);
            if complete {
                break;
            }
        }
        trace!(
            "Write chunk of {} bytes, {} remaining",
            data.len(),
            self.session.remaining
        );
        Ok(complete)
    }

    /// Raw form of [`Programmer::push`]
    ///
    /// Returns 1 when the transfer completed, 0 when more data is expected and
    /// `0xFF` when no write is armed.
    pub fn write_raw(&mut self, data: &[u8]) -> u8 {
        match self.push(data) {
            Ok(true) => 1,
            Ok(false) => 0,
            Err(_) => STATE_ERROR,
        }
    }

    fn write_flash_byte(&mut self, address: u32, byte: u8) {
        let session = &mut self.session;
        if session.page_size == 0 {
            self.port.write_flash(address, byte, true);
            return;
        }

        self.port.write_flash(address, byte, false);
        session.page_counter = session.page_counter.wrapping_sub(1);
        if session.page_counter == 0 {
            self.port.flush_page(address, byte);
            session.page_counter = session.page_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::super::testing::{Event, RecordingPort};
    use super::*;
    use crate::protocol::{Command, SetupPacket, REQUEST_TYPE_VENDOR_OUT};

    fn arm(prog: &mut Programmer<RecordingPort>, cmd: Command, page: u16, flags: BlockFlags, count: u16) {
        prog.setup(
            &SetupPacket::new(REQUEST_TYPE_VENDOR_OUT, cmd)
                .with_address(0)
                .with_page(page, flags)
                .with_byte_count(count),
        );
    }

    fn feed(prog: &mut Programmer<RecordingPort>, data: &[u8]) -> Vec<bool> {
        data.chunks(8).map(|chunk| prog.push(chunk).unwrap()).collect()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_push_while_idle_is_state_error() {
        let mut prog = Programmer::new(RecordingPort::default());
        assert_eq!(prog.push(&[1, 2, 3]), Err(Error::ProtocolState));
        assert_eq!(prog.write_raw(&[1, 2, 3]), STATE_ERROR);
        assert_eq!(prog.port().memory_accesses(), 0);
    }

    #[test]
    fn test_push_while_read_armed_is_state_error() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::ReadFlash, 0, BlockFlags::empty(), 16);
        assert_eq!(prog.push(&[1]), Err(Error::ProtocolState));
        assert_eq!(prog.write_raw(&[1]), STATE_ERROR);
        assert_eq!(prog.port().memory_accesses(), 0);
        assert_eq!(prog.session().operation, Operation::ReadFlash);
        assert_eq!(prog.session().address, 0);
    }

    #[test]
    fn test_page_counter_resets_after_each_flush() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::WriteFlash, 64, BlockFlags::FIRST, 256);
        let data = pattern(256);
        let mut flushed = 0;
        for chunk in data.chunks(8) {
            prog.push(chunk).unwrap();
            let flushes = prog.port().flushes().len();
            if flushes > flushed {
                assert_eq!(prog.session().page_counter, 64);
                flushed = flushes;
            } else {
                assert!(prog.session().page_counter < 64);
            }
        }
        assert_eq!(flushed, 4);
    }

    #[test]
    fn test_full_pages_flush_on_boundaries() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::WriteFlash, 64, BlockFlags::FIRST, 256);
        let results = feed(&mut prog, &pattern(256));

        assert_eq!(results.iter().filter(|&&done| done).count(), 1);
        assert_eq!(results.last(), Some(&true));
        assert_eq!(
            prog.port().flushes(),
            [(63, 63), (127, 127), (191, 191), (255, 255)]
        );
        assert_eq!(prog.session().page_counter, 64);
        assert!(prog.session().is_idle());
    }

    #[test]
    fn test_last_block_forces_partial_flush() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(
            &mut prog,
            Command::WriteFlash,
            64,
            BlockFlags::FIRST | BlockFlags::LAST,
            200,
        );
        feed(&mut prog, &pattern(200));
        assert_eq!(
            prog.port().flushes(),
            [(63, 63), (127, 127), (191, 191), (199, 199)]
        );
    }

    #[test]
    fn test_last_block_on_page_boundary_flushes_once() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(
            &mut prog,
            Command::WriteFlash,
            64,
            BlockFlags::FIRST | BlockFlags::LAST,
            128,
        );
        feed(&mut prog, &pattern(128));
        assert_eq!(prog.port().flushes(), [(63, 63), (127, 127)]);
    }

    #[test]
    fn test_page_counter_carries_across_blocks() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::WriteFlash, 64, BlockFlags::FIRST, 40);
        feed(&mut prog, &pattern(40));
        assert!(prog.port().flushes().is_empty());
        assert_eq!(prog.session().page_counter, 24);

        prog.setup(
            &SetupPacket::new(REQUEST_TYPE_VENDOR_OUT, Command::WriteFlash)
                .with_address(40)
                .with_page(64, BlockFlags::LAST)
                .with_byte_count(40),
        );
        feed(&mut prog, &pattern(40));
        assert_eq!(prog.port().flushes(), [(63, 23), (79, 39)]);
    }

    #[test]
    fn test_unpaged_flash_commits_every_byte() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::WriteFlash, 0, BlockFlags::FIRST, 10);
        feed(&mut prog, &pattern(10));

        let events = &prog.port().events;
        assert_eq!(events.len(), 10);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event, &Event::WriteFlash(i as u32, i as u8, true));
        }
    }

    #[test]
    fn test_eeprom_writes_and_address_continuity() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::WriteEeprom, 0, BlockFlags::empty(), 12);
        assert_eq!(prog.write_raw(&[0xA0; 8]), 0);
        assert_eq!(prog.write_raw(&[0xA1; 4]), 1);

        let addresses: Vec<u32> = prog
            .port()
            .events
            .iter()
            .map(|e| match e {
                Event::WriteEeprom(a, _) => *a,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(addresses, (0..12).collect::<Vec<u32>>());
        assert_eq!(prog.session().address, 12);
    }

    #[test]
    fn test_bytes_after_completion_are_discarded() {
        let mut prog = Programmer::new(RecordingPort::default());
        arm(&mut prog, Command::WriteEeprom, 0, BlockFlags::empty(), 3);
        assert_eq!(prog.push(&[1, 2, 3, 4, 5]), Ok(true));
        assert_eq!(prog.port().memory_accesses(), 3);
        assert_eq!(prog.push(&[6]), Err(Error::ProtocolState));
    }
}

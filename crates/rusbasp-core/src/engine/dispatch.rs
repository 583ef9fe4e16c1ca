//! Setup record dispatch

use log::{debug, info};

use super::{Direction, Programmer, Reply};
use crate::port::{Indicator, StrapSensor, TargetPort};
use crate::protocol::{BlockFlags, Command, MemoryKind, SckOption, SetupPacket, SETUP_LEN};
use crate::session::Operation;

impl<P, I, S> Programmer<P, I, S>
where
    P: TargetPort,
    I: Indicator,
    S: StrapSensor,
{
    /// Handle one setup record
    ///
    /// Unknown command codes are ignored and answered with an empty reply.
    pub fn setup(&mut self, setup: &SetupPacket) -> Reply {
        let Some(command) = setup.command() else {
            debug!("Ignoring unknown command code {}", setup.code());
            return Reply::empty();
        };
        debug!("Setup {} params={:02X?}", command, setup.params());

        match command {
            Command::Connect => {
                self.connect();
                Reply::empty()
            }
            Command::Disconnect => {
                self.port.disconnect();
                self.indicator.off();
                info!("Target released");
                Reply::empty()
            }
            Command::RawTransmit => {
                let mut out = [0u8; 4];
                for (slot, byte) in out.iter_mut().zip(setup.params()) {
                    *slot = self.port.transmit(byte);
                }
                Reply::from_slice(&out)
            }
            Command::ReadFlash => self.arm_read(MemoryKind::Flash, setup),
            Command::ReadEeprom => self.arm_read(MemoryKind::Eeprom, setup),
            Command::EnableProgrammingMode => {
                let status = self.port.enter_programming_mode();
                if status != 0 {
                    debug!("Programming enable failed (status {})", status);
                }
                Reply::from_slice(&[status])
            }
            Command::WriteFlash => {
                self.session
                    .set_paging(setup.page_size(), setup.block_flags());
                self.arm_write(MemoryKind::Flash, setup)
            }
            Command::WriteEeprom => {
                self.session.page_size = 0;
                self.session.block_flags = BlockFlags::empty();
                self.arm_write(MemoryKind::Eeprom, setup)
            }
            Command::SetExtendedAddress => {
                self.session
                    .latch_extended_address(setup.extended_address());
                Reply::empty()
            }
            Command::SetClock => {
                self.clock = SckOption::from_code(setup.params()[0]);
                debug!("ISP clock set to {:?}", self.clock);
                Reply::from_slice(&[0])
            }
        }
    }

    /// Handle raw setup bytes
    ///
    /// Immediate reply data is copied into `reply`. Returns the reply length,
    /// or `0xFF` when a chunked data stage follows.
    pub fn setup_raw(&mut self, setup: &[u8; SETUP_LEN], reply: &mut [u8; SETUP_LEN]) -> u8 {
        let answer = self.setup(&SetupPacket::from_bytes(*setup));
        let data = answer.data();
        reply[..data.len()].copy_from_slice(data);
        answer.length_byte()
    }

    fn connect(&mut self) {
        let clock = if self.strap.is_asserted() {
            SckOption::Khz8
        } else {
            self.clock
        };
        self.port.set_clock(clock);
        self.session.clear_extended_address();
        self.port.connect();
        self.indicator.on();
        info!("Target connected at {:?}", clock);
    }

    fn arm_read(&mut self, kind: MemoryKind, setup: &SetupPacket) -> Reply {
        self.session
            .arm(Operation::read(kind), setup.legacy_address(), setup.byte_count());
        debug!(
            "Read {} armed at {:#x}, {} bytes",
            kind,
            self.session.address,
            setup.byte_count()
        );
        Reply::Chunked(Direction::In)
    }

    fn arm_write(&mut self, kind: MemoryKind, setup: &SetupPacket) -> Reply {
        self.session
            .arm(Operation::write(kind), setup.legacy_address(), setup.byte_count());
        debug!(
            "Write {} armed at {:#x}, {} bytes, page {} flags {:?}",
            kind,
            self.session.address,
            setup.byte_count(),
            self.session.page_size,
            self.session.block_flags
        );
        Reply::Chunked(Direction::Out)
    }
}

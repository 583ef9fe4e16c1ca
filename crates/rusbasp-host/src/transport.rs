//! Transport layer abstraction for USBasp communication
//!
//! Every USBasp command is a vendor control transfer. A transport performs
//! one such transfer, with the data stage either flowing to the host
//! ([`Transport::control_in`]) or to the device ([`Transport::control_out`]).

use crate::error::Result;
use rusbasp_core::protocol::SetupPacket;

/// Control-transfer transport
pub trait Transport {
    /// Run a transfer with a device-to-host data stage
    ///
    /// wLength of `setup` is replaced by `buf.len()`. Returns the number of
    /// bytes the device delivered.
    fn control_in(&mut self, setup: &SetupPacket, buf: &mut [u8]) -> Result<usize>;

    /// Run a transfer with a host-to-device data stage
    ///
    /// wLength of `setup` is replaced by `data.len()`.
    fn control_out(&mut self, setup: &SetupPacket, data: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn control_in(&mut self, setup: &SetupPacket, buf: &mut [u8]) -> Result<usize> {
        (**self).control_in(setup, buf)
    }

    fn control_out(&mut self, setup: &SetupPacket, data: &[u8]) -> Result<()> {
        (**self).control_out(setup, data)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn control_in(&mut self, setup: &SetupPacket, buf: &mut [u8]) -> Result<usize> {
        (**self).control_in(setup, buf)
    }

    fn control_out(&mut self, setup: &SetupPacket, data: &[u8]) -> Result<()> {
        (**self).control_out(setup, data)
    }
}

pub mod loopback {
    //! In-process transport driving a [`Programmer`] directly
    //!
    //! Data stages are cut into packets the way a low-speed device stack
    //! does: at most 8 bytes each, the final IN packet sized to what is left
    //! of wLength.

    use super::*;
    use crate::error::HostError;
    use log::trace;
    use rusbasp_core::engine::{Direction, Programmer, Reply};
    use rusbasp_core::port::{FixedStrap, Indicator, NoIndicator, StrapSensor, TargetPort};
    use rusbasp_core::protocol::{CHUNK_CAPACITY, STATE_ERROR};

    /// Loopback transport around an engine
    pub struct Loopback<P, I = NoIndicator, S = FixedStrap> {
        programmer: Programmer<P, I, S>,
    }

    impl<P, I, S> Loopback<P, I, S>
    where
        P: TargetPort,
        I: Indicator,
        S: StrapSensor,
    {
        /// Wrap an engine
        pub fn new(programmer: Programmer<P, I, S>) -> Self {
            Self { programmer }
        }

        /// Wrapped engine
        pub fn programmer(&self) -> &Programmer<P, I, S> {
            &self.programmer
        }

        /// Unwrap the engine
        pub fn into_inner(self) -> Programmer<P, I, S> {
            self.programmer
        }

        fn dispatch(&mut self, setup: &SetupPacket, len: usize) -> Result<Reply> {
            let count = u16::try_from(len).map_err(|_| {
                HostError::InvalidParameter(format!("data stage of {} bytes is too long", len))
            })?;
            Ok(self.programmer.setup(&setup.with_byte_count(count)))
        }
    }

    impl<P, I, S> Transport for Loopback<P, I, S>
    where
        P: TargetPort,
        I: Indicator,
        S: StrapSensor,
    {
        fn control_in(&mut self, setup: &SetupPacket, buf: &mut [u8]) -> Result<usize> {
            match self.dispatch(setup, buf.len())? {
                Reply::Data(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Reply::Chunked(Direction::In) => {
                    for packet in buf.chunks_mut(CHUNK_CAPACITY) {
                        let len = packet.len();
                        if self.programmer.read_raw(packet) == STATE_ERROR {
                            return Err(HostError::Stall(setup.code()));
                        }
                        trace!("loopback: IN packet of {} bytes", len);
                    }
                    Ok(buf.len())
                }
                Reply::Chunked(Direction::Out) => Err(HostError::UnexpectedReply(setup.code())),
            }
        }

        fn control_out(&mut self, setup: &SetupPacket, data: &[u8]) -> Result<()> {
            match self.dispatch(setup, data.len())? {
                Reply::Data(_) => Ok(()),
                Reply::Chunked(Direction::Out) => {
                    let mut packets = data.chunks(CHUNK_CAPACITY).peekable();
                    while let Some(packet) = packets.next() {
                        match self.programmer.write_raw(packet) {
                            STATE_ERROR => return Err(HostError::Stall(setup.code())),
                            // Device finished early, the host still has data
                            1 if packets.peek().is_some() => {
                                return Err(HostError::Stall(setup.code()))
                            }
                            _ => trace!("loopback: OUT packet of {} bytes", packet.len()),
                        }
                    }
                    Ok(())
                }
                Reply::Chunked(Direction::In) => Err(HostError::UnexpectedReply(setup.code())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::loopback::Loopback;
    use super::*;
    use crate::error::HostError;
    use rusbasp_core::engine::Programmer;
    use rusbasp_core::isp::Isp;
    use rusbasp_core::protocol::{
        BlockFlags, Command, REQUEST_TYPE_VENDOR_IN, REQUEST_TYPE_VENDOR_OUT,
    };
    use rusbasp_dummy::DummyAvr;

    fn loopback() -> Loopback<Isp<DummyAvr>> {
        Loopback::new(Programmer::new(Isp::new(DummyAvr::new_default())))
    }

    #[test]
    fn test_immediate_reply() {
        let mut transport = loopback();
        let mut buf = [0u8; 4];
        let setup = SetupPacket::new(REQUEST_TYPE_VENDOR_IN, Command::SetClock);
        assert_eq!(transport.control_in(&setup, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn test_write_data_stage_sets_count() {
        let mut transport = loopback();
        let setup = SetupPacket::new(REQUEST_TYPE_VENDOR_OUT, Command::WriteEeprom);
        transport.control_out(&setup, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
        assert!(transport.programmer().session().is_idle());
        assert_eq!(transport.programmer().session().address, 10);
    }

    #[test]
    fn test_read_without_arm_is_unexpected() {
        let mut transport = loopback();
        let setup = SetupPacket::new(REQUEST_TYPE_VENDOR_OUT, Command::WriteFlash)
            .with_page(0, BlockFlags::FIRST);
        let mut buf = [0u8; 8];
        assert!(matches!(
            transport.control_in(&setup, &mut buf),
            Err(HostError::UnexpectedReply(6))
        ));
    }

    #[test]
    fn test_boxed_transport() {
        let mut transport: Box<dyn Transport> = Box::new(loopback());
        let mut buf = [0u8; 4];
        let setup = SetupPacket::new(REQUEST_TYPE_VENDOR_IN, Command::RawTransmit)
            .with_params([0x30, 0, 0, 0]);
        assert_eq!(transport.control_in(&setup, &mut buf).unwrap(), 4);
    }
}

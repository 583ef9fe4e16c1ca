//! Programming engine
//!
//! [`Programmer`] owns the session and the collaborators. The USB stack drives
//! it through three entry points, mirroring the callbacks of a low-speed
//! device stack:
//!
//! - [`Programmer::setup`] for every setup record
//! - [`Programmer::pull`] for each chunk of a device-to-host data stage
//! - [`Programmer::push`] for each chunk of a host-to-device data stage
//!
//! The `*_raw` variants speak the byte-level convention of such stacks, where
//! `0xFF` means either "chunked transfer follows" or "state error".

mod dispatch;
mod reader;
mod writer;

use heapless::Vec;

use crate::port::{FixedStrap, Indicator, NoIndicator, StrapSensor, TargetPort};
use crate::protocol::{SckOption, REPLY_CAPACITY};
use crate::session::Session;

/// Direction of a chunked data stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Device to host (reads)
    In,
    /// Host to device (writes)
    Out,
}

/// Answer to a setup record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Immediate reply data (possibly empty)
    Data(Vec<u8, REPLY_CAPACITY>),
    /// The data stage is served chunk by chunk
    Chunked(Direction),
}

impl Reply {
    /// Empty immediate reply
    pub fn empty() -> Self {
        Reply::Data(Vec::new())
    }

    /// Immediate reply carrying `bytes` (truncated to the reply capacity)
    pub fn from_slice(bytes: &[u8]) -> Self {
        let len = bytes.len().min(REPLY_CAPACITY);
        Reply::Data(Vec::from_slice(&bytes[..len]).unwrap_or_default())
    }

    /// Immediate reply data, empty for chunked replies
    pub fn data(&self) -> &[u8] {
        match self {
            Reply::Data(data) => data.as_slice(),
            Reply::Chunked(_) => &[],
        }
    }

    /// Whether a chunked data stage follows
    pub fn is_chunked(&self) -> bool {
        matches!(self, Reply::Chunked(_))
    }

    /// Length byte as returned to the USB stack
    pub fn length_byte(&self) -> u8 {
        match self {
            Reply::Data(data) => data.len() as u8,
            Reply::Chunked(_) => crate::protocol::CHUNKED_TRANSFER,
        }
    }
}

/// Command-driven programming engine
pub struct Programmer<P, I = NoIndicator, S = FixedStrap> {
    port: P,
    indicator: I,
    strap: S,
    session: Session,
    clock: SckOption,
}

impl<P: TargetPort> Programmer<P> {
    /// Engine without indicator and with the slow-clock strap open
    pub fn new(port: P) -> Self {
        Self::with_peripherals(port, NoIndicator, FixedStrap(false))
    }
}

impl<P, I, S> Programmer<P, I, S>
where
    P: TargetPort,
    I: Indicator,
    S: StrapSensor,
{
    /// Engine with explicit indicator and strap
    pub fn with_peripherals(port: P, indicator: I, strap: S) -> Self {
        Self {
            port,
            indicator,
            strap,
            session: Session::new(),
            clock: SckOption::Auto,
        }
    }

    /// Current session state
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Clock option stored for the next connect
    pub fn clock(&self) -> SckOption {
        self.clock
    }

    /// Target port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable target port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Indicator
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Consume the engine and return the target port
    pub fn into_port(self) -> P {
        self.port
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fake port shared by the engine tests

    use std::vec::Vec;

    use crate::port::{Indicator, TargetPort};
    use crate::protocol::SckOption;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Event {
        SetClock(SckOption),
        Connect,
        Disconnect,
        Transmit(u8),
        EnterProgrammingMode,
        ReadFlash(u32),
        ReadEeprom(u32),
        WriteFlash(u32, u8, bool),
        FlushPage(u32, u8),
        WriteEeprom(u32, u8),
    }

    #[derive(Default)]
    pub struct RecordingPort {
        pub events: Vec<Event>,
        pub enter_status: u8,
    }

    impl RecordingPort {
        pub fn flushes(&self) -> Vec<(u32, u8)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::FlushPage(a, v) => Some((*a, *v)),
                    _ => None,
                })
                .collect()
        }

        pub fn memory_accesses(&self) -> usize {
            self.events
                .iter()
                .filter(|e| {
                    matches!(
                        e,
                        Event::ReadFlash(_)
                            | Event::ReadEeprom(_)
                            | Event::WriteFlash(..)
                            | Event::FlushPage(..)
                            | Event::WriteEeprom(..)
                    )
                })
                .count()
        }
    }

    impl TargetPort for RecordingPort {
        fn set_clock(&mut self, clock: SckOption) {
            self.events.push(Event::SetClock(clock));
        }

        fn connect(&mut self) {
            self.events.push(Event::Connect);
        }

        fn disconnect(&mut self) {
            self.events.push(Event::Disconnect);
        }

        fn transmit(&mut self, byte: u8) -> u8 {
            self.events.push(Event::Transmit(byte));
            !byte
        }

        fn enter_programming_mode(&mut self) -> u8 {
            self.events.push(Event::EnterProgrammingMode);
            self.enter_status
        }

        fn read_flash(&mut self, address: u32) -> u8 {
            self.events.push(Event::ReadFlash(address));
            address as u8
        }

        fn read_eeprom(&mut self, address: u32) -> u8 {
            self.events.push(Event::ReadEeprom(address));
            (address as u8).wrapping_add(0x80)
        }

        fn write_flash(&mut self, address: u32, data: u8, commit: bool) {
            self.events.push(Event::WriteFlash(address, data, commit));
        }

        fn flush_page(&mut self, address: u32, poll_value: u8) {
            self.events.push(Event::FlushPage(address, poll_value));
        }

        fn write_eeprom(&mut self, address: u32, data: u8) {
            self.events.push(Event::WriteEeprom(address, data));
        }
    }

    #[derive(Default)]
    pub struct Led {
        pub lit: bool,
    }

    impl Indicator for Led {
        fn on(&mut self) {
            self.lit = true;
        }

        fn off(&mut self) {
            self.lit = false;
        }
    }
}

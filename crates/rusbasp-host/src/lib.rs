//! rusbasp-host - Host-side driver for USBasp-style AVR programmers
//!
//! This crate talks to a programmer running the `rusbasp-core` engine through
//! vendor control transfers. The transfer mechanism is abstracted behind
//! [`Transport`]; the crate ships an in-process [`Loopback`] transport that
//! drives an engine directly, cutting data stages into 8-byte packets like a
//! low-speed USB device stack.
//!
//! # Example
//!
//! ```
//! use rusbasp_core::engine::Programmer;
//! use rusbasp_core::isp::Isp;
//! use rusbasp_core::protocol::MemoryKind;
//! use rusbasp_dummy::DummyAvr;
//! use rusbasp_host::{Loopback, NoProgress, UsbAsp, UsbAspConfig};
//!
//! let engine = Programmer::new(Isp::new(DummyAvr::new_default()));
//! let mut usbasp = UsbAsp::open(Loopback::new(engine), UsbAspConfig::default())?;
//! usbasp.initialize()?;
//! println!("Signature: {:02X?}", usbasp.read_signature()?);
//!
//! let mut buf = [0u8; 16];
//! usbasp.read_memory(MemoryKind::Flash, 0, &mut buf, &mut NoProgress)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod error;
pub mod transport;

// Re-exports
pub use device::{
    FuseBytes, NoProgress, TransferProgress, UsbAsp, UsbAspConfig, READ_BLOCK_SIZE,
    WRITE_BLOCK_SIZE,
};
pub use error::{HostError, Result};
pub use transport::loopback::Loopback;
pub use transport::Transport;

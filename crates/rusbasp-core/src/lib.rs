//! rusbasp-core - Programming engine for USBasp-style AVR programmers
//!
//! This crate contains the command-driven state machine that sits between a
//! USB control-transfer transport and the target's in-system programming
//! interface. It is `no_std` so the same engine can run inside firmware and
//! inside host-side simulations and tests.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`) and the
//!   RON part database
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use rusbasp_core::engine::Programmer;
//! use rusbasp_core::protocol::{Command, SetupPacket, REQUEST_TYPE_VENDOR_IN};
//!
//! fn connect<P: rusbasp_core::port::TargetPort>(port: P) {
//!     let mut programmer = Programmer::new(port);
//!     let setup = SetupPacket::new(REQUEST_TYPE_VENDOR_IN, Command::Connect);
//!     let reply = programmer.setup(&setup);
//!     assert!(reply.data().is_empty());
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod engine;
pub mod error;
pub mod isp;
#[cfg(feature = "std")]
pub mod part;
pub mod port;
pub mod protocol;
pub mod session;

pub use engine::{Programmer, Reply};
pub use error::{Error, Result};

//! Keyboard, mouse and timer device layer over the i8042 keyboard controller.
//!
//! Everything runs on one thread: interrupt handlers only raise a bit in
//! [`irq::Notifications`], and the main loop hands the collected mask to
//! [`driver::InputDriver::dispatch`], which does all port traffic.

#![cfg_attr(not(test), no_std)]

pub mod constants;
pub mod driver;
pub mod error;
pub mod irq;
pub mod kbc;
pub mod keyboard;
pub mod mouse;
pub mod port;
pub mod timer;

#[cfg(test)]
mod testing;

pub use driver::{DriverConfig, Events, InputDriver};
pub use error::{Error, Result};
pub use mouse::MousePacket;

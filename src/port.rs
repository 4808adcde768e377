//! Register access: the single fallible read/write seam every device goes through.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Byte-wide I/O port access
///
/// The production implementation talks to real ports; tests script the
/// controller through a mock. Neither side retries: polling discipline
/// belongs to the caller.
pub trait PortIo {
    fn read(&mut self, port: u16) -> Result<u8>;
    fn write(&mut self, port: u16, value: u8) -> Result<()>;
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn read(&mut self, port: u16) -> Result<u8> {
        (**self).read(port)
    }

    fn write(&mut self, port: u16, value: u8) -> Result<()> {
        (**self).write(port, value)
    }
}

/// Read one register, mapping any failure to `Error::ReadFailed`
pub fn read_register<P: PortIo + ?Sized>(io: &mut P, port: u16) -> Result<u8> {
    io.read(port).map_err(|_| Error::ReadFailed { port })
}

/// Write one register, mapping any failure to `Error::WriteFailed`
pub fn write_register<P: PortIo + ?Sized>(io: &mut P, port: u16, value: u8) -> Result<()> {
    io.write(port, value).map_err(|_| Error::WriteFailed { port })
}

bitflags! {
    /// KBC status register, read fresh on every poll
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusRegister: u8 {
        /// A data byte is waiting on the data port
        const OUTPUT_BUFFER_FULL = 1 << 0;
        /// Controller has not consumed the last write yet
        const INPUT_BUFFER_FULL = 1 << 1;
        const SYSTEM = 1 << 2;
        /// Last write went to the command port
        const COMMAND_DATA = 1 << 3;
        const INHIBIT = 1 << 4;
        /// Buffered byte came from the mouse line
        const AUX_DATA = 1 << 5;
        const TIMEOUT_ERROR = 1 << 6;
        const PARITY_ERROR = 1 << 7;
    }
}

impl StatusRegister {
    pub fn has_error(self) -> bool {
        self.intersects(Self::PARITY_ERROR | Self::TIMEOUT_ERROR)
    }

    pub fn mouse_data_ready(self) -> bool {
        self.contains(Self::OUTPUT_BUFFER_FULL | Self::AUX_DATA)
    }
}

/// Sleep between polling attempts
pub trait Delay {
    fn delay_us(&mut self, micros: u32);
}

/// Real x86 I/O ports
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Ports;

#[cfg(target_arch = "x86_64")]
impl PortIo for X86Ports {
    fn read(&mut self, port: u16) -> Result<u8> {
        use x86_64::instructions::port::Port;

        let mut port = Port::<u8>::new(port);
        Ok(unsafe { port.read() })
    }

    fn write(&mut self, port: u16, value: u8) -> Result<()> {
        use x86_64::instructions::port::Port;

        let mut port = Port::<u8>::new(port);
        unsafe { port.write(value) };
        Ok(())
    }
}

/// Busy wait on the unused POST port, about one microsecond per read
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct IoWaitDelay;

#[cfg(target_arch = "x86_64")]
impl Delay for IoWaitDelay {
    fn delay_us(&mut self, micros: u32) {
        use x86_64::instructions::port::Port;

        let mut wait_port: Port<u8> = Port::new(crate::constants::interrupts::IO_WAIT_PORT);
        for _ in 0..micros {
            unsafe {
                wait_port.read();
            }
        }
    }
}

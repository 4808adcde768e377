use log::debug;

use crate::constants::pit;
use crate::error::{Error, Result};
use crate::port::{read_register, write_register, PortIo};

fn timer_port(timer: u8) -> Result<u16> {
    match timer {
        0 => Ok(pit::TIMER_0),
        1 => Ok(pit::TIMER_1),
        2 => Ok(pit::TIMER_2),
        other => Err(Error::InvalidTimer(other)),
    }
}

/// Read back the status byte of one PIT counter
pub fn get_config<P: PortIo>(io: &mut P, timer: u8) -> Result<u8> {
    let port = timer_port(timer)?;
    let command = pit::READ_BACK | pit::READ_BACK_NO_COUNT | (1 << (timer + 1));
    write_register(io, pit::CONTROL_PORT, command)?;
    read_register(io, port)
}

/// Program a PIT counter to fire at `frequency` Hz
///
/// Counting mode and BCD setting are kept from the current configuration.
pub fn set_frequency<P: PortIo>(io: &mut P, timer: u8, frequency: u32) -> Result<()> {
    let port = timer_port(timer)?;
    if frequency == 0 {
        return Err(Error::InvalidFrequency(frequency));
    }
    let divisor = pit::FREQUENCY / frequency;
    let divisor = u16::try_from(divisor)
        .ok()
        .filter(|d| *d != 0)
        .ok_or(Error::InvalidFrequency(frequency))?;

    let current = get_config(io, timer)?;
    let control = (current & 0x0F) | pit::ACCESS_LSB_MSB | (timer << pit::SELECT_SHIFT);
    let [lsb, msb] = divisor.to_le_bytes();

    write_register(io, pit::CONTROL_PORT, control)?;
    write_register(io, port, lsb)?;
    write_register(io, port, msb)?;
    debug!("pit: timer {} at {} Hz (divisor {})", timer, frequency, divisor);
    Ok(())
}

/// Timer interrupt state
#[derive(Debug, Default)]
pub struct Timer {
    ticks: u32,
}

impl Timer {
    pub const fn new() -> Self {
        Timer { ticks: 0 }
    }

    pub fn handle_interrupt(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn elapsed_seconds(&self, frequency: u32) -> u32 {
        if frequency == 0 {
            return 0;
        }
        self.ticks / frequency
    }
}

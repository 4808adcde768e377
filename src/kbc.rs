//! i8042 command protocol.
//!
//! Every exchange with the controller is a bounded poll on the status
//! register followed by one access to the command or data port. Mouse
//! commands go through the `0xD4` passthrough and are answered with an
//! acknowledge byte; a NACK re-issues the whole exchange.

use log::{debug, warn};

use crate::constants::{kbc, mouse};
use crate::error::{Error, Result};
use crate::port::{read_register, write_register, Delay, PortIo, StatusRegister};

/// Polling discipline for controller exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Status polls per write or read before giving up with `Busy`
    pub attempts: u32,
    /// Wait between two polls
    pub interval_us: u32,
    /// How many times a NACKed mouse command is re-issued.
    /// `None` keeps retrying for as long as the device answers NACK.
    pub max_nack_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: kbc::DEFAULT_ATTEMPTS,
            interval_us: kbc::DEFAULT_INTERVAL_US,
            max_nack_retries: None,
        }
    }
}

/// Response to a mouse command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledge {
    Ack,
    /// Resend requested
    Nack,
    Error,
    Other(u8),
}

impl From<u8> for Acknowledge {
    fn from(byte: u8) -> Self {
        match byte {
            kbc::ACK => Acknowledge::Ack,
            kbc::NACK => Acknowledge::Nack,
            kbc::ERROR => Acknowledge::Error,
            other => Acknowledge::Other(other),
        }
    }
}

/// Keyboard controller: port access plus the delay used between polls
pub struct Kbc<P, D> {
    io: P,
    delay: D,
    policy: RetryPolicy,
}

impl<P: PortIo, D: Delay> Kbc<P, D> {
    pub fn new(io: P, delay: D, policy: RetryPolicy) -> Self {
        Kbc { io, delay, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Raw port access for other devices sharing the bus (the PIT)
    pub fn io_mut(&mut self) -> &mut P {
        &mut self.io
    }

    #[cfg(test)]
    pub(crate) fn delay(&self) -> &D {
        &self.delay
    }

    pub fn read_status(&mut self) -> Result<StatusRegister> {
        let status = read_register(&mut self.io, kbc::STATUS_COMMAND_PORT)?;
        Ok(StatusRegister::from_bits_truncate(status))
    }

    /// Read the data port without polling; the caller has checked OBF
    pub fn read_data(&mut self) -> Result<u8> {
        read_register(&mut self.io, kbc::DATA_PORT)
    }

    /// Write a command byte once the input buffer is empty
    pub fn write_command(&mut self, command: u8) -> Result<()> {
        self.write_when_ready(kbc::STATUS_COMMAND_PORT, command)
    }

    /// Write an argument byte to the data port once the input buffer is empty
    pub fn write_argument(&mut self, argument: u8) -> Result<()> {
        self.write_when_ready(kbc::DATA_PORT, argument)
    }

    /// Wait for the output buffer to fill and read the byte in it
    ///
    /// A byte received with a parity or timeout error is consumed and
    /// dropped; the caller gets `CorruptedByte` instead.
    pub fn read_acknowledge(&mut self) -> Result<u8> {
        for attempt in 0..self.policy.attempts {
            let status = self.read_status()?;
            if status.contains(StatusRegister::OUTPUT_BUFFER_FULL) {
                let data = self.read_data()?;
                if status.has_error() {
                    return Err(Error::CorruptedByte);
                }
                return Ok(data);
            }
            if attempt + 1 < self.policy.attempts {
                self.delay.delay_us(self.policy.interval_us);
            }
        }
        Err(Error::Busy)
    }

    fn write_when_ready(&mut self, port: u16, value: u8) -> Result<()> {
        for attempt in 0..self.policy.attempts {
            let status = self.read_status()?;
            if !status.contains(StatusRegister::INPUT_BUFFER_FULL) {
                return write_register(&mut self.io, port, value);
            }
            if attempt + 1 < self.policy.attempts {
                self.delay.delay_us(self.policy.interval_us);
            }
        }
        Err(Error::Busy)
    }

    pub fn read_command_byte(&mut self) -> Result<u8> {
        self.write_command(kbc::CMD_READ_COMMAND_BYTE)?;
        self.read_acknowledge()
    }

    pub fn write_command_byte(&mut self, value: u8) -> Result<()> {
        self.write_command(kbc::CMD_WRITE_COMMAND_BYTE)?;
        self.write_argument(value)
    }

    pub fn enable_mouse_interface(&mut self) -> Result<()> {
        self.write_command(kbc::CMD_ENABLE_MOUSE)
    }

    pub fn disable_mouse_interface(&mut self) -> Result<()> {
        self.write_command(kbc::CMD_DISABLE_MOUSE)
    }

    /// Turn on both ports and their interrupts in the controller command byte
    pub fn enable_port_interrupts(&mut self) -> Result<()> {
        let current = self.read_command_byte()?;
        let updated = (current | kbc::COMMAND_BYTE_KBD_INT | kbc::COMMAND_BYTE_MOUSE_INT)
            & !(kbc::COMMAND_BYTE_KBD_DISABLE | kbc::COMMAND_BYTE_MOUSE_DISABLE);
        debug!("kbc command byte {:#04x} -> {:#04x}", current, updated);
        self.write_command_byte(updated)
    }

    /// Send one command to the mouse through the passthrough
    ///
    /// The exchange is repeated from the passthrough command on every NACK,
    /// up to `max_nack_retries` re-issues when bounded. Only ACK succeeds.
    pub fn write_mouse_command(&mut self, command: u8) -> Result<()> {
        let mut retries = 0u32;
        loop {
            self.write_command(kbc::CMD_WRITE_TO_MOUSE)?;
            self.write_argument(command)?;
            let response = self.read_acknowledge()?;

            match Acknowledge::from(response) {
                Acknowledge::Ack => return Ok(()),
                Acknowledge::Nack => {
                    if let Some(max) = self.policy.max_nack_retries {
                        if retries >= max {
                            warn!("mouse command {:#04x}: NACK after {} retries", command, retries);
                            return Err(Error::NotAcknowledged);
                        }
                    }
                    retries = retries.saturating_add(1);
                    debug!("mouse command {:#04x}: NACK, re-issuing", command);
                }
                Acknowledge::Error | Acknowledge::Other(_) => {
                    return Err(Error::CommandRejected(response));
                }
            }
        }
    }

    pub fn enable_data_reporting(&mut self) -> Result<()> {
        self.write_mouse_command(mouse::CMD_ENABLE_DATA_REPORTING)
    }

    pub fn disable_data_reporting(&mut self) -> Result<()> {
        self.write_mouse_command(mouse::CMD_DISABLE_DATA_REPORTING)
    }

    pub fn set_defaults(&mut self) -> Result<()> {
        self.write_mouse_command(mouse::CMD_SET_DEFAULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPorts, NoDelay, IBF, OBF};

    fn controller(io: MockPorts) -> Kbc<MockPorts, NoDelay> {
        Kbc::new(io, NoDelay::default(), RetryPolicy::default())
    }

    #[test]
    fn write_command_waits_for_input_buffer() {
        let mut io = MockPorts::new();
        io.push_status(IBF);
        io.push_status(IBF);
        io.push_status(0x00);
        let mut kbc = controller(io);

        kbc.write_command(0xA8).unwrap();
        assert_eq!(kbc.io_mut().writes(), &[(0x64, 0xA8)]);
        assert_eq!(kbc.delay().calls, 2);
        assert_eq!(kbc.delay().total_us, 40_000);
    }

    #[test]
    fn write_argument_goes_to_data_port() {
        let mut kbc = controller(MockPorts::new());
        kbc.write_argument(0xF4).unwrap();
        assert_eq!(kbc.io_mut().writes(), &[(0x60, 0xF4)]);
    }

    #[test]
    fn stuck_input_buffer_is_busy() {
        let mut io = MockPorts::new();
        io.set_idle(0x64, IBF);
        let mut kbc = controller(io);

        assert_eq!(kbc.write_command(0xD4), Err(Error::Busy));
        assert_eq!(kbc.write_argument(0xF4), Err(Error::Busy));
        assert!(kbc.io_mut().writes().is_empty());
        assert_eq!(kbc.io_mut().reads_of(0x64), 20);
        assert_eq!(kbc.delay().calls, 18);
    }

    #[test]
    fn acknowledge_read_times_out_when_nothing_arrives() {
        let mut kbc = controller(MockPorts::new());
        assert_eq!(kbc.read_acknowledge(), Err(Error::Busy));
        assert_eq!(kbc.io_mut().reads_of(0x60), 0);
    }

    #[test]
    fn acknowledge_read_rejects_corrupted_byte() {
        let mut io = MockPorts::new();
        io.push_byte(OBF | 0x80, kbc::ACK);
        let mut kbc = controller(io);

        assert_eq!(kbc.read_acknowledge(), Err(Error::CorruptedByte));
        // the bad byte is still drained from the output buffer
        assert_eq!(kbc.io_mut().reads_of(0x60), 1);

        let mut io = MockPorts::new();
        io.push_byte(OBF | 0x40, kbc::ACK);
        let mut kbc = controller(io);
        assert_eq!(kbc.read_acknowledge(), Err(Error::CorruptedByte));
    }

    #[test]
    fn status_read_failure_propagates() {
        let mut io = MockPorts::new();
        io.fail_reads_on(0x64);
        let mut kbc = controller(io);
        assert_eq!(kbc.write_command(0xA8), Err(Error::ReadFailed { port: 0x64 }));
    }

    #[test]
    fn enable_reporting_first_try() {
        let mut io = MockPorts::new();
        io.push_exchange(kbc::ACK);
        let mut kbc = controller(io);

        kbc.enable_data_reporting().unwrap();
        assert_eq!(kbc.io_mut().writes(), &[(0x64, 0xD4), (0x60, 0xF4)]);
    }

    #[test]
    fn nack_then_ack_reissues_whole_exchange() {
        let mut io = MockPorts::new();
        io.push_exchange(kbc::NACK);
        io.push_exchange(kbc::ACK);
        let mut kbc = controller(io);

        assert_eq!(kbc.enable_data_reporting(), Ok(()));
        assert_eq!(
            kbc.io_mut().writes(),
            &[(0x64, 0xD4), (0x60, 0xF4), (0x64, 0xD4), (0x60, 0xF4)]
        );
    }

    #[test]
    fn disable_reporting_uses_f5() {
        let mut io = MockPorts::new();
        io.push_exchange(kbc::ACK);
        let mut kbc = controller(io);

        kbc.disable_data_reporting().unwrap();
        assert_eq!(kbc.io_mut().writes_to(0x60), vec![0xF5]);
    }

    #[test]
    fn error_acknowledge_is_hard_failure() {
        let mut io = MockPorts::new();
        io.push_exchange(kbc::ERROR);
        io.push_exchange(kbc::ACK);
        let mut kbc = controller(io);

        assert_eq!(kbc.enable_data_reporting(), Err(Error::CommandRejected(0xFC)));
        assert_eq!(kbc.io_mut().writes().len(), 2);
    }

    #[test]
    fn unexpected_acknowledge_is_hard_failure() {
        let mut io = MockPorts::new();
        io.push_exchange(0x42);
        let mut kbc = controller(io);
        assert_eq!(kbc.set_defaults(), Err(Error::CommandRejected(0x42)));
    }

    #[test]
    fn bounded_nack_retries() {
        let mut io = MockPorts::new();
        for _ in 0..4 {
            io.push_exchange(kbc::NACK);
        }
        let policy = RetryPolicy {
            max_nack_retries: Some(2),
            ..RetryPolicy::default()
        };
        let mut kbc = Kbc::new(io, NoDelay::default(), policy);

        assert_eq!(kbc.enable_data_reporting(), Err(Error::NotAcknowledged));
        // first attempt plus two re-issues
        assert_eq!(kbc.io_mut().writes_to(0x60).len(), 3);
    }

    #[test]
    fn many_nacks_are_retried_when_unbounded() {
        let mut io = MockPorts::new();
        for _ in 0..50 {
            io.push_exchange(kbc::NACK);
        }
        io.push_exchange(kbc::ACK);
        let mut kbc = controller(io);

        assert_eq!(kbc.enable_data_reporting(), Ok(()));
        assert_eq!(kbc.io_mut().writes_to(0x60).len(), 51);
    }

    #[test]
    fn port_interrupts_are_enabled_in_command_byte() {
        let mut io = MockPorts::new();
        // write 0x20, read back, write 0x60, write value
        io.push_status(0x00);
        io.push_status(OBF);
        io.push_data(0x70);
        let mut kbc = controller(io);

        kbc.enable_port_interrupts().unwrap();
        assert_eq!(kbc.io_mut().writes(), &[(0x64, 0x20), (0x64, 0x60), (0x60, 0x43)]);
    }

    #[test]
    fn acknowledge_decoding() {
        assert_eq!(Acknowledge::from(0xFA), Acknowledge::Ack);
        assert_eq!(Acknowledge::from(0xFE), Acknowledge::Nack);
        assert_eq!(Acknowledge::from(0xFC), Acknowledge::Error);
        assert_eq!(Acknowledge::from(0x00), Acknowledge::Other(0x00));
    }
}

use core::fmt;

/// Errors raised by the controller protocol layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A register read failed at the hardware access boundary
    ReadFailed { port: u16 },
    /// A register write failed at the hardware access boundary
    WriteFailed { port: u16 },
    /// A bounded poll ran out of attempts without seeing the expected status bit
    Busy,
    /// The byte was read while the parity or timeout bit was set
    CorruptedByte,
    /// The device kept answering NACK past the configured retry bound
    NotAcknowledged,
    /// The device answered something other than ACK or NACK
    CommandRejected(u8),
    /// The keyboard handler saw an error bit in the status register
    ProtocolError,
    AlreadySubscribed(u8),
    NotSubscribed(u8),
    /// The driver is already running
    AlreadyStarted,
    /// A shared line has no room for another subscriber
    TooManySubscribers(u8),
    InvalidLine(u8),
    InvalidTimer(u8),
    InvalidFrequency(u32),
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ReadFailed { port } => write!(f, "read from port {:#04x} failed", port),
            Error::WriteFailed { port } => write!(f, "write to port {:#04x} failed", port),
            Error::Busy => write!(f, "controller busy: retry budget exhausted"),
            Error::CorruptedByte => write!(f, "parity or timeout error on received byte"),
            Error::NotAcknowledged => write!(f, "device did not acknowledge command"),
            Error::CommandRejected(byte) => write!(f, "device rejected command ({:#04x})", byte),
            Error::ProtocolError => write!(f, "status register reports a transmission error"),
            Error::AlreadySubscribed(line) => write!(f, "IRQ line {} already subscribed", line),
            Error::NotSubscribed(line) => write!(f, "IRQ line {} is not subscribed", line),
            Error::AlreadyStarted => write!(f, "input driver already started"),
            Error::TooManySubscribers(line) => {
                write!(f, "IRQ line {} has too many subscribers", line)
            }
            Error::InvalidLine(line) => write!(f, "IRQ line {} does not exist", line),
            Error::InvalidTimer(timer) => write!(f, "timer {} does not exist", timer),
            Error::InvalidFrequency(hz) => write!(f, "frequency {} Hz out of range", hz),
        }
    }
}

//! PS/2 mouse packet synchronizer.
//!
//! The mouse delivers one byte per interrupt. Three consecutive bytes form
//! a packet:
//! - byte 0: buttons, sync bit (always 1), sign bits, overflow bits
//! - byte 1: X movement
//! - byte 2: Y movement
//!
//! Framing is recovered by dropping bytes until one with the sync bit set
//! arrives while a packet start is expected. Lost bytes are normal
//! operation and never surface as errors.

use log::{debug, info, warn};

use crate::constants::mouse::{
    LEFT_BUTTON, MIDDLE_BUTTON, PACKET_LEN, RIGHT_BUTTON, SYNC_BIT, X_OVERFLOW, X_SIGN,
    Y_OVERFLOW, Y_SIGN,
};
use crate::error::{Error, Result};
use crate::irq::{InterruptController, InterruptHandle, IrqPolicy, IrqSubscriptions};
use crate::kbc::Kbc;
use crate::port::{Delay, PortIo};

/// A decoded 3-byte mouse packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MousePacket {
    pub bytes: [u8; PACKET_LEN],
    pub left_button: bool,
    pub right_button: bool,
    pub middle_button: bool,
    pub x_overflow: bool,
    pub y_overflow: bool,
    pub delta_x: i16,
    pub delta_y: i16,
}

impl MousePacket {
    pub fn decode(bytes: [u8; PACKET_LEN]) -> Self {
        let status = bytes[0];
        MousePacket {
            bytes,
            left_button: status & LEFT_BUTTON != 0,
            right_button: status & RIGHT_BUTTON != 0,
            middle_button: status & MIDDLE_BUTTON != 0,
            x_overflow: status & X_OVERFLOW != 0,
            y_overflow: status & Y_OVERFLOW != 0,
            delta_x: extend(bytes[1], status & X_SIGN != 0),
            delta_y: extend(bytes[2], status & Y_SIGN != 0),
        }
    }
}

/// Widen a 9-bit two's complement movement value
fn extend(low: u8, negative: bool) -> i16 {
    if negative {
        (0xFF00 | u16::from(low)) as i16
    } else {
        i16::from(low)
    }
}

/// Position of the next byte within the packet being assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketAssemblyState {
    #[default]
    AwaitingByte0,
    AwaitingByte1,
    AwaitingByte2,
}

/// Three-byte framing state machine
#[derive(Debug, Default)]
pub struct PacketSynchronizer {
    state: PacketAssemblyState,
    buffer: [u8; PACKET_LEN],
}

impl PacketSynchronizer {
    pub const fn new() -> Self {
        PacketSynchronizer {
            state: PacketAssemblyState::AwaitingByte0,
            buffer: [0; PACKET_LEN],
        }
    }

    pub fn state(&self) -> PacketAssemblyState {
        self.state
    }

    /// Feed one byte; returns a packet when it completes a triplet
    pub fn feed(&mut self, byte: u8) -> Option<MousePacket> {
        match self.state {
            PacketAssemblyState::AwaitingByte0 => {
                if byte & SYNC_BIT == 0 {
                    debug!("mouse: dropping unsynchronized byte {:#04x}", byte);
                    return None;
                }
                self.buffer[0] = byte;
                self.state = PacketAssemblyState::AwaitingByte1;
                None
            }
            PacketAssemblyState::AwaitingByte1 => {
                self.buffer[1] = byte;
                self.state = PacketAssemblyState::AwaitingByte2;
                None
            }
            PacketAssemblyState::AwaitingByte2 => {
                self.buffer[2] = byte;
                self.state = PacketAssemblyState::AwaitingByte0;
                Some(MousePacket::decode(self.buffer))
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = PacketAssemblyState::AwaitingByte0;
    }
}

/// Mouse interrupt handler state
///
/// Holds a single "latest packet" slot; an unconsumed packet is overwritten
/// by the next one.
#[derive(Debug, Default)]
pub struct MouseHandler {
    sync: PacketSynchronizer,
    latest: MousePacket,
    ready: bool,
    last_byte: u8,
    packet_count: u32,
    handle: Option<InterruptHandle>,
}

impl MouseHandler {
    pub const fn new() -> Self {
        MouseHandler {
            sync: PacketSynchronizer::new(),
            latest: MousePacket {
                bytes: [0; PACKET_LEN],
                left_button: false,
                right_button: false,
                middle_button: false,
                x_overflow: false,
                y_overflow: false,
                delta_x: 0,
                delta_y: 0,
            },
            ready: false,
            last_byte: 0,
            packet_count: 0,
            handle: None,
        }
    }

    /// Process one mouse interrupt
    ///
    /// Does nothing unless the output buffer holds a byte from the AUX line.
    /// Returns whether a packet was completed. A byte flagged with a parity
    /// or timeout error is drained and dropped with `CorruptedByte`.
    pub fn handle_interrupt<P: PortIo, D: Delay>(&mut self, kbc: &mut Kbc<P, D>) -> Result<bool> {
        let status = kbc.read_status()?;
        if !status.mouse_data_ready() {
            return Ok(false);
        }
        let byte = kbc.read_data()?;
        if status.has_error() {
            debug!("mouse: dropping corrupted byte {:#04x}", byte);
            return Err(Error::CorruptedByte);
        }
        Ok(self.accept(byte))
    }

    /// Feed a byte already read from the controller
    pub fn accept(&mut self, byte: u8) -> bool {
        self.last_byte = byte;
        match self.sync.feed(byte) {
            Some(packet) => {
                self.latest = packet;
                self.ready = true;
                self.packet_count = self.packet_count.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> PacketAssemblyState {
        self.sync.state()
    }

    /// One-shot: true once per completed packet batch
    pub fn take_packet_ready(&mut self) -> bool {
        core::mem::take(&mut self.ready)
    }

    /// Latest packet, consuming the ready flag
    pub fn take_packet(&mut self) -> Option<MousePacket> {
        self.take_packet_ready().then_some(self.latest)
    }

    /// Latest packet regardless of the ready flag
    pub fn packet(&self) -> &MousePacket {
        &self.latest
    }

    pub fn last_byte(&self) -> u8 {
        self.last_byte
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    /// Zero the packet counter and restart framing
    pub fn reset(&mut self) {
        self.packet_count = 0;
        self.sync.reset();
    }

    pub fn handle(&self) -> Option<&InterruptHandle> {
        self.handle.as_ref()
    }

    /// Subscribe the mouse line and turn on data reporting
    ///
    /// The subscription is undone if the reporting handshake fails.
    pub fn enable<P, D, C>(
        &mut self,
        line: u8,
        kbc: &mut Kbc<P, D>,
        irqs: &mut IrqSubscriptions<C>,
    ) -> Result<()>
    where
        P: PortIo,
        D: Delay,
        C: InterruptController,
    {
        let handle = irqs.subscribe(line, IrqPolicy::REENABLE | IrqPolicy::EXCLUSIVE)?;
        if let Err(e) = kbc.enable_data_reporting() {
            warn!("mouse: enabling data reporting failed: {}", e);
            if let Err(undo) = irqs.unsubscribe(handle) {
                warn!("mouse: unsubscribe after failed enable: {}", undo);
            }
            return Err(e);
        }
        self.sync.reset();
        info!("mouse: subscribed (bit {})", handle.bit());
        self.handle = Some(handle);
        Ok(())
    }

    /// Turn off data reporting and unsubscribe
    ///
    /// A reporting failure is logged; the line is unsubscribed either way.
    pub fn disable<P, D, C>(
        &mut self,
        kbc: &mut Kbc<P, D>,
        irqs: &mut IrqSubscriptions<C>,
    ) -> Result<()>
    where
        P: PortIo,
        D: Delay,
        C: InterruptController,
    {
        if let Err(e) = kbc.disable_data_reporting() {
            warn!("mouse: disabling data reporting failed: {}", e);
        }
        match self.handle.take() {
            Some(handle) => {
                irqs.unsubscribe(handle)?;
                info!("mouse: unsubscribed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

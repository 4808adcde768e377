//! Interrupt subscription: line-agnostic enable/disable of hardware
//! notifications and the handoff from interrupt context to the main loop.

use core::sync::atomic::{AtomicU16, Ordering};

use bitflags::bitflags;
use log::info;

use crate::constants::irq::{CASCADE, LINE_COUNT};
use crate::error::{Error, Result};

bitflags! {
    /// How a line behaves once subscribed
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqPolicy: u8 {
        /// Keep the line unmasked after each notification
        const REENABLE = 1 << 0;
        /// Refuse any other subscriber on the same line
        const EXCLUSIVE = 1 << 1;
    }
}

/// Token for one subscription; `bit` is its position in a notification mask
///
/// Handles cannot be copied. `unsubscribe` takes the handle by value, so a
/// released subscription cannot be released a second time:
///
/// ```compile_fail
/// # use kbc_input::irq::{InterruptController, IrqPolicy, IrqSubscriptions};
/// # struct Pic;
/// # impl InterruptController for Pic {
/// #     fn mask(&mut self, _: u8) -> kbc_input::Result<()> { Ok(()) }
/// #     fn unmask(&mut self, _: u8) -> kbc_input::Result<()> { Ok(()) }
/// # }
/// let mut irqs = IrqSubscriptions::new(Pic);
/// let handle = irqs.subscribe(0, IrqPolicy::REENABLE).unwrap();
/// irqs.unsubscribe(handle).unwrap();
/// irqs.unsubscribe(handle).unwrap();
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct InterruptHandle {
    line: u8,
    bit: u8,
}

impl InterruptHandle {
    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn bit(&self) -> u8 {
        self.bit
    }

    pub fn mask(&self) -> u16 {
        1 << self.bit
    }

    /// Whether this line fired in a notification mask
    pub fn is_set(&self, mask: u16) -> bool {
        mask & self.mask() != 0
    }
}

/// Masks and unmasks interrupt lines
pub trait InterruptController {
    fn mask(&mut self, line: u8) -> Result<()>;
    fn unmask(&mut self, line: u8) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct LineState {
    policy: IrqPolicy,
    subscribers: u8,
}

/// Subscription table over all lines of an interrupt controller
pub struct IrqSubscriptions<C> {
    controller: C,
    lines: [Option<LineState>; LINE_COUNT as usize],
}

impl<C: InterruptController> IrqSubscriptions<C> {
    pub fn new(controller: C) -> Self {
        IrqSubscriptions {
            controller,
            lines: [None; LINE_COUNT as usize],
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    #[cfg(test)]
    pub(crate) fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn is_subscribed(&self, line: u8) -> bool {
        self.lines
            .get(usize::from(line))
            .map_or(false, |state| state.is_some())
    }

    /// Start receiving notifications for `line`
    pub fn subscribe(&mut self, line: u8, policy: IrqPolicy) -> Result<InterruptHandle> {
        let slot = self
            .lines
            .get_mut(usize::from(line))
            .ok_or(Error::InvalidLine(line))?;

        match *slot {
            Some(ref mut state) => {
                if state.policy.contains(IrqPolicy::EXCLUSIVE)
                    || policy.contains(IrqPolicy::EXCLUSIVE)
                {
                    return Err(Error::AlreadySubscribed(line));
                }
                state.subscribers = state
                    .subscribers
                    .checked_add(1)
                    .ok_or(Error::TooManySubscribers(line))?;
            }
            None => {
                // the line is recorded only once the controller has let it through
                if line >= 8 {
                    self.controller.unmask(CASCADE)?;
                }
                self.controller.unmask(line)?;
                *slot = Some(LineState {
                    policy,
                    subscribers: 1,
                });
                info!("irq: subscribed line {} ({:?})", line, policy);
            }
        }

        Ok(InterruptHandle { line, bit: line })
    }

    /// Stop receiving notifications for the handle's line
    pub fn unsubscribe(&mut self, handle: InterruptHandle) -> Result<()> {
        let line = handle.line;
        let slot = self
            .lines
            .get_mut(usize::from(line))
            .ok_or(Error::InvalidLine(line))?;
        let state = slot.as_mut().ok_or(Error::NotSubscribed(line))?;

        state.subscribers -= 1;
        if state.subscribers == 0 {
            *slot = None;
            self.controller.mask(line)?;
            info!("irq: unsubscribed line {}", line);
        }
        Ok(())
    }

    /// Mask lines that fired and were subscribed without `REENABLE`
    pub fn acknowledge(&mut self, mask: u16) -> Result<()> {
        for line in 0..LINE_COUNT {
            if mask & (1 << line) == 0 {
                continue;
            }
            if let Some(state) = self.lines[usize::from(line)] {
                if !state.policy.contains(IrqPolicy::REENABLE) {
                    self.controller.mask(line)?;
                }
            }
        }
        Ok(())
    }
}

/// Pending notifications raised from interrupt context
///
/// Interrupt handlers only `raise()` their line; the main loop `take()`s the
/// whole mask and runs the device handlers.
pub struct Notifications {
    pending: AtomicU16,
}

impl Notifications {
    pub const fn new() -> Self {
        Notifications {
            pending: AtomicU16::new(0),
        }
    }

    pub fn raise(&self, line: u8) {
        if line < LINE_COUNT {
            self.pending.fetch_or(1 << line, Ordering::AcqRel);
        }
    }

    /// Return and clear every pending bit
    pub fn take(&self) -> u16 {
        self.pending.swap(0, Ordering::AcqRel)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

/// Chained 8259 mask registers
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct PicMask;

#[cfg(target_arch = "x86_64")]
impl PicMask {
    fn port_and_bit(line: u8) -> (u16, u8) {
        use crate::constants::interrupts::{PIC_1_DATA, PIC_2_DATA};

        if line < 8 {
            (PIC_1_DATA, line)
        } else {
            (PIC_2_DATA, line - 8)
        }
    }
}

#[cfg(target_arch = "x86_64")]
impl InterruptController for PicMask {
    fn mask(&mut self, line: u8) -> Result<()> {
        use x86_64::instructions::port::Port;

        let (port, bit) = Self::port_and_bit(line);
        let mut data: Port<u8> = Port::new(port);
        unsafe {
            let current = data.read();
            data.write(current | (1 << bit));
        }
        Ok(())
    }

    fn unmask(&mut self, line: u8) -> Result<()> {
        use x86_64::instructions::port::Port;

        let (port, bit) = Self::port_and_bit(line);
        let mut data: Port<u8> = Port::new(port);
        unsafe {
            let current = data.read();
            data.write(current & !(1 << bit));
        }
        Ok(())
    }
}

//! The input driver object: owns every device's state and the subscriptions,
//! and is driven by the main loop one notification mask at a time.

use log::{info, warn};

use crate::constants::{irq, keyboard, pit};
use crate::error::{Error, Result};
use crate::irq::{InterruptController, InterruptHandle, IrqPolicy, IrqSubscriptions};
use crate::kbc::{Kbc, RetryPolicy};
use crate::keyboard::KeyboardHandler;
use crate::mouse::MouseHandler;
use crate::port::{Delay, PortIo};
use crate::timer::{self, Timer};

/// Start-up configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub retry: RetryPolicy,
    /// Timer interrupts per second
    pub timer_frequency: u32,
    /// Scancode that requests exit
    pub exit_scancode: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            retry: RetryPolicy::default(),
            timer_frequency: pit::DEFAULT_FREQUENCY,
            exit_scancode: keyboard::ESC_BREAK,
        }
    }
}

/// What one dispatch produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Events {
    pub timer_tick: bool,
    /// Scancode read by the keyboard handler
    pub scancode: Option<u8>,
    /// A mouse packet was completed
    pub mouse_packet: bool,
}

impl Events {
    pub fn is_empty(&self) -> bool {
        !self.timer_tick && self.scancode.is_none() && !self.mouse_packet
    }
}

pub struct InputDriver<P, D, C> {
    config: DriverConfig,
    kbc: Kbc<P, D>,
    irqs: IrqSubscriptions<C>,
    keyboard: KeyboardHandler,
    mouse: MouseHandler,
    timer: Timer,
    timer_handle: Option<InterruptHandle>,
    keyboard_handle: Option<InterruptHandle>,
}

impl<P, D, C> InputDriver<P, D, C>
where
    P: PortIo,
    D: Delay,
    C: InterruptController,
{
    pub fn new(io: P, delay: D, controller: C, config: DriverConfig) -> Self {
        InputDriver {
            config,
            kbc: Kbc::new(io, delay, config.retry),
            irqs: IrqSubscriptions::new(controller),
            keyboard: KeyboardHandler::new(config.exit_scancode),
            mouse: MouseHandler::new(),
            timer: Timer::new(),
            timer_handle: None,
            keyboard_handle: None,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Whether `start` succeeded and `shutdown` has not run since
    pub fn is_started(&self) -> bool {
        self.timer_handle.is_some()
    }

    /// Program the timer, subscribe timer, keyboard and mouse, and turn on
    /// mouse data reporting
    ///
    /// On failure the subscriptions made by this call are undone. A running
    /// driver refuses to start again.
    pub fn start(&mut self) -> Result<()> {
        if self.is_started() {
            return Err(Error::AlreadyStarted);
        }
        timer::set_frequency(self.kbc.io_mut(), 0, self.config.timer_frequency)?;

        let timer_handle = self.irqs.subscribe(irq::TIMER, IrqPolicy::REENABLE)?;
        let keyboard_handle = match self
            .irqs
            .subscribe(irq::KEYBOARD, IrqPolicy::REENABLE | IrqPolicy::EXCLUSIVE)
        {
            Ok(handle) => handle,
            Err(e) => {
                self.release([timer_handle]);
                return Err(e);
            }
        };

        let mouse_ready = self
            .kbc
            .enable_mouse_interface()
            .and_then(|()| self.kbc.enable_port_interrupts())
            .and_then(|()| self.mouse.enable(irq::MOUSE, &mut self.kbc, &mut self.irqs));
        if let Err(e) = mouse_ready {
            self.release([keyboard_handle, timer_handle]);
            return Err(e);
        }

        info!(
            "input driver started: timer bit {}, keyboard bit {}, mouse bit {}",
            timer_handle.bit(),
            keyboard_handle.bit(),
            self.mouse.handle().map_or(0, |h| h.bit())
        );
        self.timer_handle = Some(timer_handle);
        self.keyboard_handle = Some(keyboard_handle);
        Ok(())
    }

    fn release<I: IntoIterator<Item = InterruptHandle>>(&mut self, handles: I) {
        for handle in handles {
            let line = handle.line();
            if let Err(e) = self.irqs.unsubscribe(handle) {
                warn!("release of line {} failed: {}", line, e);
            }
        }
    }

    /// Combined notification mask of every subscribed line
    pub fn notification_mask(&self) -> u16 {
        [self.timer_handle.as_ref(), self.keyboard_handle.as_ref(), self.mouse.handle()]
            .into_iter()
            .flatten()
            .fold(0, |mask, handle| mask | handle.mask())
    }

    /// Run the handlers for the lines set in `mask`
    ///
    /// Handler errors mean "no new data this interrupt": they are logged and
    /// the previous state stays visible.
    pub fn dispatch(&mut self, mask: u16) -> Events {
        let mut events = Events::default();

        if self.timer_handle.as_ref().map_or(false, |h| h.is_set(mask)) {
            self.timer.handle_interrupt();
            events.timer_tick = true;
        }

        if self.keyboard_handle.as_ref().map_or(false, |h| h.is_set(mask)) {
            match self.keyboard.handle_interrupt(&mut self.kbc) {
                Ok(scancode) => events.scancode = scancode,
                Err(e) => warn!("keyboard interrupt: {}", e),
            }
        }

        if self.mouse.handle().map_or(false, |h| h.is_set(mask)) {
            match self.mouse.handle_interrupt(&mut self.kbc) {
                Ok(completed) => events.mouse_packet = completed,
                Err(e) => warn!("mouse interrupt: {}", e),
            }
        }

        if let Err(e) = self.irqs.acknowledge(mask) {
            warn!("irq acknowledge: {}", e);
        }
        events
    }

    /// Undo `start`: mouse reporting off, then unsubscribe mouse, keyboard
    /// and timer
    ///
    /// Every step runs; the first failure is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Err(e) = self.mouse.disable(&mut self.kbc, &mut self.irqs) {
            warn!("shutdown: mouse: {}", e);
            first_error.get_or_insert(e);
        }
        for handle in [self.keyboard_handle.take(), self.timer_handle.take()]
            .into_iter()
            .flatten()
        {
            let line = handle.line();
            if let Err(e) = self.irqs.unsubscribe(handle) {
                warn!("shutdown: line {}: {}", line, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("input driver stopped");
                Ok(())
            }
        }
    }

    pub fn keyboard(&self) -> &KeyboardHandler {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardHandler {
        &mut self.keyboard
    }

    pub fn mouse(&self) -> &MouseHandler {
        &self.mouse
    }

    pub fn mouse_mut(&mut self) -> &mut MouseHandler {
        &mut self.mouse
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn kbc_mut(&mut self) -> &mut Kbc<P, D> {
        &mut self.kbc
    }

    pub fn subscriptions(&self) -> &IrqSubscriptions<C> {
        &self.irqs
    }
}

use log::{debug, warn};
use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};

use crate::constants::keyboard::{BREAK_BIT, ESC_BREAK, EXTENDED_PREFIX};
use crate::error::{Error, Result};
use crate::kbc::Kbc;
use crate::port::{Delay, PortIo, StatusRegister};

/// Break codes are the make code with the high bit set
pub fn is_break_code(scancode: u8) -> bool {
    scancode & BREAK_BIT != 0
}

/// Lead byte of a two-byte scancode
pub fn is_extended_prefix(scancode: u8) -> bool {
    scancode == EXTENDED_PREFIX
}

/// Keyboard interrupt handler state
///
/// Keeps a single slot for the last scancode and for the last decoded key;
/// a new byte overwrites both. The exit flag and the decoded key are cleared
/// when read.
pub struct KeyboardHandler {
    exit_scancode: u8,
    last_scancode: Option<u8>,
    exit_requested: bool,
    last_key: Option<DecodedKey>,
    decoder: Keyboard<layouts::Us104Key, ScancodeSet1>,
}

impl Default for KeyboardHandler {
    fn default() -> Self {
        Self::new(ESC_BREAK)
    }
}

impl KeyboardHandler {
    pub fn new(exit_scancode: u8) -> Self {
        KeyboardHandler {
            exit_scancode,
            last_scancode: None,
            exit_requested: false,
            last_key: None,
            decoder: Keyboard::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::Ignore,
            ),
        }
    }

    /// Read one scancode from the controller
    ///
    /// Returns the scancode read, `None` if the output buffer held nothing
    /// for the keyboard, and `ProtocolError` if the status register reports
    /// a parity or timeout error (the data port is left untouched then).
    pub fn handle_interrupt<P: PortIo, D: Delay>(
        &mut self,
        kbc: &mut Kbc<P, D>,
    ) -> Result<Option<u8>> {
        let status = kbc.read_status()?;
        if status.has_error() {
            warn!("keyboard: status error {:#04x}", status.bits());
            return Err(Error::ProtocolError);
        }
        if !status.contains(StatusRegister::OUTPUT_BUFFER_FULL) {
            return Ok(None);
        }
        if status.contains(StatusRegister::AUX_DATA) {
            // mouse byte, left for the mouse handler
            return Ok(None);
        }

        let scancode = kbc.read_data()?;
        self.accept(scancode);
        Ok(Some(scancode))
    }

    fn accept(&mut self, scancode: u8) {
        self.last_scancode = Some(scancode);
        if scancode == self.exit_scancode {
            self.exit_requested = true;
        }

        match self.decoder.add_byte(scancode) {
            Ok(Some(event)) => {
                if let Some(key) = self.decoder.process_keyevent(event) {
                    self.last_key = Some(key);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("keyboard: undecodable scancode {:#04x}: {:?}", scancode, e),
        }
    }

    pub fn last_scancode(&self) -> Option<u8> {
        self.last_scancode
    }

    /// Whether the last scancode seen is the exit key
    pub fn is_exit_scancode(&self) -> bool {
        self.last_scancode == Some(self.exit_scancode)
    }

    /// One-shot: true once per exit key event
    pub fn take_exit_request(&mut self) -> bool {
        core::mem::take(&mut self.exit_requested)
    }

    /// Last key decoded from a make code, cleared on read
    pub fn take_key(&mut self) -> Option<DecodedKey> {
        self.last_key.take()
    }
}

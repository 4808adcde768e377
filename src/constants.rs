/// Hardware constants to avoid magic numbers

/// VGA text mode buffer
pub mod vga {
    /// Physical address of the text buffer
    pub const BUFFER_ADDR: usize = 0xb8000;

    /// Text mode dimensions
    pub const BUFFER_HEIGHT: usize = 25;
    pub const BUFFER_WIDTH: usize = 80;
}

/// i8042 keyboard controller (KBC) constants
pub mod kbc {
    /// Data port: write = argument, read = output buffer
    pub const DATA_PORT: u16 = 0x60;

    /// Status/command port: write = command, read = status
    pub const STATUS_COMMAND_PORT: u16 = 0x64;

    /// Read the controller command byte
    pub const CMD_READ_COMMAND_BYTE: u8 = 0x20;
    /// Write the controller command byte (value follows on the data port)
    pub const CMD_WRITE_COMMAND_BYTE: u8 = 0x60;
    /// Disable the auxiliary (mouse) interface
    pub const CMD_DISABLE_MOUSE: u8 = 0xA7;
    /// Enable the auxiliary (mouse) interface
    pub const CMD_ENABLE_MOUSE: u8 = 0xA8;
    /// Forward the next argument byte to the mouse
    pub const CMD_WRITE_TO_MOUSE: u8 = 0xD4;

    /// Command byte bits
    pub const COMMAND_BYTE_KBD_INT: u8 = 1 << 0;
    pub const COMMAND_BYTE_MOUSE_INT: u8 = 1 << 1;
    pub const COMMAND_BYTE_KBD_DISABLE: u8 = 1 << 4;
    pub const COMMAND_BYTE_MOUSE_DISABLE: u8 = 1 << 5;

    /// Acknowledge bytes
    pub const ACK: u8 = 0xFA;
    pub const NACK: u8 = 0xFE;
    pub const ERROR: u8 = 0xFC;

    /// Default polling discipline: 10 attempts, 20 ms apart
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    pub const DEFAULT_INTERVAL_US: u32 = 20_000;
}

/// PS/2 mouse constants (sent after `kbc::CMD_WRITE_TO_MOUSE`)
pub mod mouse {
    pub const CMD_SET_DEFAULTS: u8 = 0xF6;
    pub const CMD_DISABLE_DATA_REPORTING: u8 = 0xF5;
    pub const CMD_ENABLE_DATA_REPORTING: u8 = 0xF4;

    /// Packet byte 0 layout
    pub const LEFT_BUTTON: u8 = 1 << 0;
    pub const RIGHT_BUTTON: u8 = 1 << 1;
    pub const MIDDLE_BUTTON: u8 = 1 << 2;
    pub const SYNC_BIT: u8 = 1 << 3;
    pub const X_SIGN: u8 = 1 << 4;
    pub const Y_SIGN: u8 = 1 << 5;
    pub const X_OVERFLOW: u8 = 1 << 6;
    pub const Y_OVERFLOW: u8 = 1 << 7;

    pub const PACKET_LEN: usize = 3;
}

/// Scancode set 1 constants
pub mod keyboard {
    /// ESC make code
    pub const ESC_MAKE: u8 = 0x01;
    /// ESC break code; releasing ESC is the global exit signal
    pub const ESC_BREAK: u8 = 0x81;
    /// Break codes are the make code with this bit set
    pub const BREAK_BIT: u8 = 1 << 7;
    /// Lead byte of two-byte scancodes
    pub const EXTENDED_PREFIX: u8 = 0xE0;
}

/// i8254 programmable interval timer constants
pub mod pit {
    pub const TIMER_0: u16 = 0x40;
    pub const TIMER_1: u16 = 0x41;
    pub const TIMER_2: u16 = 0x42;
    pub const CONTROL_PORT: u16 = 0x43;

    /// Input clock of the PIT
    pub const FREQUENCY: u32 = 1_193_182;

    /// Read-back command, latching status only (count not latched)
    pub const READ_BACK: u8 = 0xC0;
    pub const READ_BACK_NO_COUNT: u8 = 1 << 5;

    /// Access mode: LSB followed by MSB
    pub const ACCESS_LSB_MSB: u8 = (1 << 4) | (1 << 5);

    /// Counter select bits in a control word
    pub const SELECT_SHIFT: u8 = 6;

    pub const DEFAULT_FREQUENCY: u32 = 60;
}

/// IRQ lines of the devices this layer drives
pub mod irq {
    pub const TIMER: u8 = 0;
    pub const KEYBOARD: u8 = 1;
    pub const CASCADE: u8 = 2;
    pub const MOUSE: u8 = 12;

    /// Lines handled by a pair of chained 8259s
    pub const LINE_COUNT: u8 = 16;
}

/// Interrupt constants
pub mod interrupts {
    /// PIC (Programmable Interrupt Controller) offset
    /// We remap PIC interrupts to start at 32 to avoid conflicts with CPU exceptions
    pub const PIC_1_OFFSET: u8 = 32;
    pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

    /// PIC mask (data) ports
    pub const PIC_1_DATA: u16 = 0x21;
    pub const PIC_2_DATA: u16 = 0xA1;

    /// Unused port, one read takes roughly a microsecond
    pub const IO_WAIT_PORT: u16 = 0x80;
}

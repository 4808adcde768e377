use lazy_static::lazy_static;
use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::interrupts as cpu;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};

use kbc_input::constants::interrupts::{PIC_1_DATA, PIC_1_OFFSET, PIC_2_DATA, PIC_2_OFFSET};
use kbc_input::constants::irq;
use kbc_input::irq::Notifications;

use crate::println;

/// Remapped vector of a PIC line
const fn vector(line: u8) -> u8 {
    PIC_1_OFFSET + line
}

/// Chained PICs, remapped above the CPU exceptions
static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Lines that fired since the main loop last looked
static NOTIFICATIONS: Notifications = Notifications::new();

/// Device ISR: record the line and send EOI. The device handler itself runs
/// from the main loop.
macro_rules! device_isr {
    ($name:ident, $line:expr) => {
        extern "x86-interrupt" fn $name(_frame: InterruptStackFrame) {
            NOTIFICATIONS.raise($line);
            unsafe {
                PICS.lock().notify_end_of_interrupt(vector($line));
            }
        }
    };
}

device_isr!(timer_isr, irq::TIMER);
device_isr!(keyboard_isr, irq::KEYBOARD);
device_isr!(mouse_isr, irq::MOUSE);

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        // unhandled faults escalate here, on a known-good stack
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(crate::gdt::DOUBLE_FAULT_IST_INDEX);
        }

        for v in vector(0)..vector(16) {
            idt[v].set_handler_fn(stray_isr);
        }
        idt[vector(irq::TIMER)].set_handler_fn(timer_isr);
        idt[vector(irq::KEYBOARD)].set_handler_fn(keyboard_isr);
        idt[vector(irq::MOUSE)].set_handler_fn(mouse_isr);

        idt
    };
}

/// Load the IDT, remap the PICs with every line masked, enable interrupts
///
/// Lines are unmasked one by one as devices subscribe.
pub fn init() {
    IDT.load();

    unsafe {
        PICS.lock().initialize();
        Port::<u8>::new(PIC_1_DATA).write(0xFF);
        Port::<u8>::new(PIC_2_DATA).write(0xFF);
    }

    cpu::enable();
}

/// Block until a subscribed line fires; returns the pending mask
pub fn receive() -> u16 {
    loop {
        cpu::disable();
        let mask = NOTIFICATIONS.take();
        if mask != 0 {
            cpu::enable();
            return mask;
        }
        // sti; hlt so a notification cannot slip in between check and halt
        cpu::enable_and_hlt();
    }
}

extern "x86-interrupt" fn double_fault_handler(frame: InterruptStackFrame, _code: u64) -> ! {
    println!("double fault\n{:#?}", frame);
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn stray_isr(_frame: InterruptStackFrame) {
    // line unknown: EOI both PICs
    unsafe {
        PICS.lock().notify_end_of_interrupt(PIC_2_OFFSET);
    }
}

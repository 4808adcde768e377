#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

mod gdt;
mod interrupts;
mod logger;
mod vga_buffer;

use core::panic::PanicInfo;

use kbc_input::irq::PicMask;
use kbc_input::port::{IoWaitDelay, X86Ports};
use kbc_input::{DriverConfig, InputDriver};
use log::{error, LevelFilter};
use pc_keyboard::DecodedKey;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("{}", info);
    loop {
        x86_64::instructions::hlt();
    }
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    gdt::init();
    interrupts::init();
    if logger::init(LevelFilter::Info).is_err() {
        println!("logger already installed");
    }

    let mut driver = InputDriver::new(X86Ports, IoWaitDelay, PicMask, DriverConfig::default());
    if let Err(e) = driver.start() {
        error!("input driver failed to start: {}", e);
        halt();
    }

    println!("Type to echo, click to report. Release ESC to quit.");

    loop {
        let mask = interrupts::receive();
        let events = driver.dispatch(mask);
        if events.is_empty() {
            continue;
        }

        if let Some(key) = driver.keyboard_mut().take_key() {
            match key {
                DecodedKey::Unicode(c) => print!("{}", c),
                DecodedKey::RawKey(code) => print!("<{:?}>", code),
            }
        }

        if let Some(packet) = driver.mouse_mut().take_packet() {
            if packet.left_button || packet.right_button || packet.middle_button {
                println!(
                    "\nclick L{} M{} R{} dx={} dy={}",
                    packet.left_button as u8,
                    packet.middle_button as u8,
                    packet.right_button as u8,
                    packet.delta_x,
                    packet.delta_y
                );
            }
        }

        if driver.keyboard_mut().take_exit_request() {
            break;
        }
    }

    println!("\nexit after {} s", driver.timer().elapsed_seconds(driver.config().timer_frequency));
    if let Err(e) = driver.shutdown() {
        error!("input driver shutdown: {}", e);
    }
    halt();
}

fn halt() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

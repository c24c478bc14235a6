//! Bitbang mode example.
//!
//! Toggles all pins on a connected FT232R in asynchronous bitbang mode.
//! Connect LEDs (with appropriate resistors) to observe the output.
//!
//! Usage: cargo run --example bitbang

use std::thread;
use std::time::Duration;

use ftdi_session::constants::{pid, FTDI_VID};
use ftdi_session::{DeviceContext, NusbBus};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Opening FTDI device for bitbang...");
    let mut ctx = DeviceContext::create(NusbBus::new())?;
    ctx.open(FTDI_VID, pid::FT232)?;
    println!("Chip type: {:?}", ctx.chip_type());

    // All pins as outputs
    ctx.enable_bitbang(0xFF)?;
    ctx.set_baudrate(9600)?; // Pins are clocked at 4x the baud rate
    println!("Bitbang mode enabled (all outputs, 9600 baud clock)");

    for cycle in 0..10u32 {
        let val = if cycle % 2 == 0 { 0xFF } else { 0x00 };
        ctx.write_bitbang(val)?;

        let pins = ctx.read_pins()?;
        println!("Cycle {cycle}: wrote 0x{val:02X}, pins=0x{pins:02X}");

        thread::sleep(Duration::from_millis(500));
    }

    ctx.disable_bitbang()?;
    println!("Bitbang disabled.");

    ctx.close()?;
    ctx.destroy()?;
    Ok(())
}

//! List all connected FTDI devices with their strings.
//!
//! Usage: cargo run --example find_all

use ftdi_session::constants::{pid, FTDI_VID};
use ftdi_session::{DeviceContext, NusbBus};

fn main() -> Result<(), ftdi_session::Error> {
    env_logger::init();

    let pids = [
        ("FT232/FT245", pid::FT232),
        ("FT2232", pid::FT2232),
        ("FT4232H", pid::FT4232),
    ];

    let mut ctx = DeviceContext::create(NusbBus::new())?;
    let mut found_any = false;

    for (name, product_id) in &pids {
        for dev in ctx.find_all(FTDI_VID, *product_id)? {
            found_any = true;
            let show = |s: &Option<ftdi_session::DescriptorString>| {
                s.as_ref().map_or_else(|| "(none)".to_owned(), ToString::to_string)
            };
            println!(
                "{name}: vid={:#06x} pid={:#06x} manufacturer={} description={} serial={}",
                dev.vendor_id,
                dev.product_id,
                show(&dev.manufacturer),
                show(&dev.description),
                show(&dev.serial),
            );
        }
    }

    if !found_any {
        println!("No FTDI devices found.");
    }

    ctx.destroy()
}

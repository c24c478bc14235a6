//! A full session against a simulated FT232R, no hardware needed.
//!
//! Usage: RUST_LOG=debug cargo run --example simulated

use ftdi_session::constants::{pid, FTDI_VID};
use ftdi_session::transport::{MockBus, MockDevice};
use ftdi_session::{eeprom, status_code, transfer_status, DeviceContext};

fn main() -> Result<(), ftdi_session::Error> {
    env_logger::init();

    let bus = MockBus::new();
    let id = bus.attach(MockDevice::ft232r("SIM00001"));
    let mut ctx = DeviceContext::create(bus.clone())?;

    let devices = ctx.find_all(FTDI_VID, pid::FT232)?;
    for dev in &devices {
        println!(
            "found {:?} serial {:?}",
            dev.description.as_ref().map(|s| s.as_str()),
            dev.serial.as_ref().map(|s| s.as_str()),
        );
    }
    let Some(first) = devices.first() else {
        return Ok(());
    };

    ctx.open_device(first)?;
    ctx.set_baudrate(9600)?;
    println!("chip id 0x{:08X}", ctx.read_chip_id()?);

    ctx.enable_bitbang(0xFF)?;
    println!("write status {}", transfer_status(&ctx.write_bitbang(0xA5)));
    println!("pins 0x{:02X}", bus.pins(id));
    ctx.disable_bitbang()?;

    // Out of the bitbang window the write is refused with a status code.
    let refused = ctx.write_bitbang(0x00);
    println!("write outside bitbang: {} ({})", status_code(&refused), ctx.error_string());

    let image = eeprom::decode(&ctx.read_eeprom()?, true)?;
    println!("EEPROM serial {:?}", image.config().serial);

    ctx.close()?;
    ctx.destroy()
}

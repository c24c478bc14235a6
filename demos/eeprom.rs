//! EEPROM read and decode example.
//!
//! Reads the EEPROM from the first connected FT232 device, decodes it,
//! and prints the stored configuration.
//!
//! Usage: cargo run --example eeprom

use ftdi_session::constants::{pid, FTDI_VID};
use ftdi_session::{eeprom, ChipType, DeviceContext, NusbBus};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Opening FTDI device...");
    let mut ctx = DeviceContext::create(NusbBus::new())?;
    ctx.open(FTDI_VID, pid::FT232)?;
    println!("Chip type: {:?}", ctx.chip_type());

    println!("Reading EEPROM...");
    let raw = ctx.read_eeprom()?;
    println!("EEPROM size: {} bytes", raw.size());
    if raw.is_blank() {
        println!("EEPROM is blank.");
    } else {
        let image = eeprom::decode(&raw, false)?;
        let config = image.config();
        println!("\nDecoded EEPROM contents:");
        println!("  Vendor ID:    0x{:04X}", config.vendor_id);
        println!("  Product ID:   0x{:04X}", config.product_id);
        println!("  Release:      0x{:04X}", config.release_number);
        println!("  Self-powered: {}", config.self_powered);
        println!("  Max power:    {} mA", config.max_power);
        println!("  Use serial:   {}", config.use_serial);

        let (mfr, prod, ser) = config.strings();
        println!("  Manufacturer: {}", mfr.unwrap_or("(none)"));
        println!("  Product:      {}", prod.unwrap_or("(none)"));
        println!("  Serial:       {}", ser.unwrap_or("(none)"));
    }

    if ctx.chip_type() == Some(ChipType::Ft232R) {
        match ctx.read_chip_id() {
            Ok(id) => println!("  Chip ID:      0x{id:08X}"),
            Err(e) => println!("  Chip ID:      (error: {e})"),
        }
    }

    println!("\nRaw EEPROM (first 32 bytes):");
    for (i, chunk) in raw.as_bytes()[..32].chunks(16).enumerate() {
        print!("  {:04X}: ", i * 16);
        for b in chunk {
            print!("{b:02X} ");
        }
        println!();
    }

    ctx.close()?;
    ctx.destroy()?;
    Ok(())
}

//! Probe command implementation

use rusbasp_core::part::PartDatabase;

use super::probe_part;
use crate::programmers::Device;

/// Run the probe command
pub fn run_probe(device: &mut Device<'_>, db: &PartDatabase) -> Result<(), Box<dyn std::error::Error>> {
    let part = probe_part(device, db)?;

    println!("  Flash:  {} bytes ({} KiB)", part.flash_size, part.flash_size / 1024);
    if part.is_paged() {
        println!("  Page:   {} bytes", part.flash_page_size);
    } else {
        println!("  Page:   none (byte programming)");
    }
    println!("  EEPROM: {} bytes", part.eeprom_size);

    let fuses = device.read_fuses()?;
    println!(
        "  Fuses:  low=0x{:02X} high=0x{:02X} ext=0x{:02X} lock=0x{:02X}",
        fuses.low, fuses.high, fuses.extended, fuses.lock
    );

    Ok(())
}

//! Erase command implementation

use rusbasp_core::part::PartDatabase;

use super::probe_part;
use crate::programmers::Device;

/// Run the erase command
pub fn run_erase(device: &mut Device<'_>, db: &PartDatabase) -> Result<(), Box<dyn std::error::Error>> {
    let part = probe_part(device, db)?;

    println!("Erasing {}...", part.name);
    device.chip_erase(part.chip_erase_delay_us)?;

    println!("Erase complete");
    Ok(())
}

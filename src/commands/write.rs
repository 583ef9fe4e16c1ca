//! Write command implementation

use rusbasp_core::part::PartDatabase;
use rusbasp_core::protocol::MemoryKind;
use std::fs;
use std::path::Path;

use super::{memory_size, probe_part, IndicatifProgress};
use crate::programmers::Device;

/// Run the write command
pub fn run_write(
    device: &mut Device<'_>,
    db: &PartDatabase,
    kind: MemoryKind,
    input: &Path,
    do_verify: bool,
    no_erase: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let part = probe_part(device, db)?;

    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let size = memory_size(part, kind);
    if data.len() > size {
        return Err(format!(
            "File size ({} bytes) exceeds {} size ({} bytes)",
            data.len(),
            kind,
            size
        )
        .into());
    }

    if kind == MemoryKind::Flash && !no_erase {
        println!("Erasing chip...");
        device.chip_erase(part.chip_erase_delay_us)?;
    }

    let mut progress = IndicatifProgress::new("Write complete");
    device.write_memory(kind, 0, &data, part.flash_page_size, &mut progress)?;

    if do_verify {
        let mut progress = IndicatifProgress::new("Verification passed");
        device.verify_memory(kind, 0, &data, &mut progress)?;
        println!("Verified {} bytes", data.len());
    }

    println!("Wrote {} bytes of {}", data.len(), kind);
    Ok(())
}

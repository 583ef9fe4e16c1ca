//! Read command implementation

use rusbasp_core::part::PartDatabase;
use rusbasp_core::protocol::MemoryKind;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::{memory_size, probe_part, IndicatifProgress};
use crate::programmers::Device;

/// Run the read command
pub fn run_read(
    device: &mut Device<'_>,
    db: &PartDatabase,
    kind: MemoryKind,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let part = probe_part(device, db)?;

    let size = memory_size(part, kind);
    if size == 0 {
        return Err(format!("{} has no {}", part.name, kind).into());
    }

    let mut data = vec![0u8; size];
    let mut progress = IndicatifProgress::new("Read complete");
    device.read_memory(kind, 0, &mut data, &mut progress)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes of {} to {:?}", data.len(), kind, output);

    Ok(())
}

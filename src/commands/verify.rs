//! Verify command implementation

use rusbasp_core::part::PartDatabase;
use rusbasp_core::protocol::MemoryKind;
use std::fs;
use std::path::Path;

use super::{memory_size, probe_part, IndicatifProgress};
use crate::programmers::Device;

/// Run the verify command
pub fn run_verify(
    device: &mut Device<'_>,
    db: &PartDatabase,
    kind: MemoryKind,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let part = probe_part(device, db)?;

    let expected = fs::read(input)?;
    println!("Read {} bytes from {:?}", expected.len(), input);

    let size = memory_size(part, kind);
    if expected.len() > size {
        return Err(format!(
            "File size ({} bytes) exceeds {} size ({} bytes)",
            expected.len(),
            kind,
            size
        )
        .into());
    }

    let mut progress = IndicatifProgress::new("Verification passed");
    device.verify_memory(kind, 0, &expected, &mut progress)?;

    if expected.len() < size {
        println!(
            "Note: File is {} bytes smaller than {}. Remaining bytes not verified.",
            size - expected.len(),
            kind
        );
    }

    println!("Verification passed!");
    Ok(())
}

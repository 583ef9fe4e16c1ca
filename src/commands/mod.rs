//! CLI command implementations
//!
//! Every device command runs on a [`Device`](crate::programmers::Device),
//! i.e. a `UsbAsp` driver over whatever transport the selected programmer
//! provides. The target is identified by its signature before memory is
//! touched.

mod erase;
mod list;
mod probe;
mod read;
mod verify;
mod write;

use indicatif::{ProgressBar, ProgressStyle};
use rusbasp_core::part::{Part, PartDatabase};
use rusbasp_core::protocol::MemoryKind;
use rusbasp_host::TransferProgress;

use crate::programmers::Device;

pub use erase::run_erase;
pub use list::{list_parts, list_programmers};
pub use probe::run_probe;
pub use read::run_read;
pub use verify::run_verify;
pub use write::run_write;

/// Connect, enter programming mode and look the signature up
pub fn probe_part<'db>(
    device: &mut Device<'_>,
    db: &'db PartDatabase,
) -> Result<&'db Part, Box<dyn std::error::Error>> {
    device.initialize()?;
    let signature = device.read_signature()?;

    if signature == [0xFF; 3] || signature == [0x00; 3] {
        return Err(format!(
            "Invalid signature {:02X?}, target not responding or locked",
            signature
        )
        .into());
    }

    match db.find_by_signature(signature) {
        Some(part) => {
            println!(
                "Found: {} {} (signature {})",
                part.vendor,
                part.name,
                part.signature_string()
            );
            Ok(part)
        }
        None => Err(format!(
            "Unknown signature {:02X} {:02X} {:02X} (use --part-db to add the part)",
            signature[0], signature[1], signature[2]
        )
        .into()),
    }
}

/// Size of `kind` on `part`
pub fn memory_size(part: &Part, kind: MemoryKind) -> usize {
    match kind {
        MemoryKind::Flash => part.flash_size as usize,
        MemoryKind::Eeprom => part.eeprom_size as usize,
    }
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
    done_message: &'static str,
}

impl IndicatifProgress {
    /// Create a reporter; `done_message` is shown when a transfer completes
    pub fn new(done_message: &'static str) -> Self {
        Self {
            bar: None,
            done_message,
        }
    }

    fn create_bar(&mut self, total: u64, phase: &'static str) {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(phase);
        self.bar = Some(pb);
    }

    fn set_position(&self, position: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(position as u64);
        }
    }
}

impl TransferProgress for IndicatifProgress {
    fn reading(&mut self, total_bytes: usize) {
        self.create_bar(total_bytes as u64, "Reading");
    }

    fn read_progress(&mut self, bytes_read: usize) {
        self.set_position(bytes_read);
    }

    fn writing(&mut self, total_bytes: usize) {
        self.create_bar(total_bytes as u64, "Writing");
    }

    fn write_progress(&mut self, bytes_written: usize) {
        self.set_position(bytes_written);
    }

    fn complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message(self.done_message);
        }
    }
}

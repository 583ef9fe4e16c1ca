//! List commands implementation

use rusbasp_core::part::PartDatabase;

use crate::programmers;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        if p.aliases.is_empty() {
            println!("  {:8} - {}", p.name, p.description);
        } else {
            println!(
                "  {:8} - {} (aliases: {})",
                p.name,
                p.description,
                p.aliases.join(", ")
            );
        }
    }
}

/// List all known parts
pub fn list_parts(db: &PartDatabase, name_filter: Option<&str>) {
    let parts = match name_filter {
        Some(pattern) => db.search(pattern),
        None => db.parts().iter().collect(),
    };

    println!("Known parts:");
    println!();
    println!(
        "{:<8} {:<14} {:>10} {:>6} {:>10} {:>10}",
        "Vendor", "Name", "Flash", "Page", "EEPROM", "Signature"
    );
    println!("{}", "-".repeat(63));

    for part in parts {
        let page = if part.is_paged() {
            part.flash_page_size.to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:<8} {:<14} {:>10} {:>6} {:>10} {:>10}",
            part.vendor,
            part.name,
            format_size(part.flash_size),
            page,
            format_size(part.eeprom_size),
            part.signature_string()
        );
    }
}

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

//! rusbasp - AVR programmer for USBasp-style devices
//!
//! # Architecture
//!
//! The programmer firmware logic lives in `rusbasp-core`: a control-request
//! engine that decodes USBasp vendor requests and drives an AVR target over
//! ISP. `rusbasp-host` is the other end of the cable, turning memory
//! operations into 200-byte request blocks. The CLI picks a programmer,
//! wires a transport between the two and runs a command on the resulting
//! device handle.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use rusbasp_core::part::PartDatabase;
use std::path::{Path, PathBuf};

/// Parts shipped with the binary
const BUILTIN_PARTS: &str = include_str!("../parts/atmel.ron");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_part_database(cli.part_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load part database: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Loaded {} part definitions", db.len());

    match cli.command {
        Commands::Probe { device } => {
            programmers::with_programmer(&device, &db, |dev| commands::run_probe(dev, &db))
        }
        Commands::Read {
            device,
            memory,
            output,
        } => programmers::with_programmer(&device, &db, |dev| {
            commands::run_read(dev, &db, memory.into(), &output)
        }),
        Commands::Write {
            device,
            memory,
            input,
            no_verify,
            no_erase,
        } => programmers::with_programmer(&device, &db, |dev| {
            commands::run_write(dev, &db, memory.into(), &input, !no_verify, no_erase)
        }),
        Commands::Verify {
            device,
            memory,
            input,
        } => programmers::with_programmer(&device, &db, |dev| {
            commands::run_verify(dev, &db, memory.into(), &input)
        }),
        Commands::Erase { device } => {
            programmers::with_programmer(&device, &db, |dev| commands::run_erase(dev, &db))
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::ListParts { name } => {
            commands::list_parts(&db, name.as_deref());
            Ok(())
        }
    }
}

/// Load the builtin parts, then any user-supplied database on top
fn load_part_database(path: Option<&Path>) -> Result<PartDatabase, Box<dyn std::error::Error>> {
    let mut db = PartDatabase::new();
    db.load_ron(BUILTIN_PARTS)?;

    if let Some(path) = path {
        if !path.exists() {
            return Err(format!("Part database path not found: {}", path.display()).into());
        }
        let count = db.load_path(path)?;
        log::debug!("Loaded {} parts from {}", count, path.display());
    } else {
        let default_paths = [
            PathBuf::from("/usr/share/rusbasp/parts"),
            PathBuf::from("/usr/local/share/rusbasp/parts"),
        ];

        for dir in default_paths.iter().filter(|d| d.is_dir()) {
            match db.load_dir(dir) {
                Ok(count) => log::debug!("Loaded {} parts from {}", count, dir.display()),
                Err(e) => log::warn!("Failed to load parts from {}: {}", dir.display(), e),
            }
        }
    }

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_parts_load() {
        let mut db = PartDatabase::new();
        let count = db.load_ron(BUILTIN_PARTS).unwrap();
        assert_eq!(count, db.len());
        assert!(db.find_by_name("ATmega328P").is_some());
        assert!(db.find_by_signature([0x1E, 0x93, 0x0B]).is_some());
    }
}

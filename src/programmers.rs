//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use crate::cli::DeviceArgs;
use rusbasp_core::part::PartDatabase;
use rusbasp_core::port::Indicator;
use rusbasp_host::{Transport, UsbAsp, UsbAspConfig};

/// Programmer handle passed to the commands
pub type Device<'a> = UsbAsp<&'a mut dyn Transport>;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Programmer engine driving a simulated AVR (part=<name>,image=<file>,eeprom=<file>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:8} - {}\n", p.name, p.description));
    }
    help
}

/// Check if a programmer name matches any available programmer
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Indicator that reports the activity LED through the log
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn on(&mut self) {
        log::debug!("Activity LED on");
    }

    fn off(&mut self) {
        log::debug!("Activity LED off");
    }
}

/// Execute a function with the specified programmer
///
/// The programmer string can be just the name (e.g., "dummy") or include
/// parameters (e.g., "dummy:part=ATtiny85,image=fw.bin").
#[allow(unused_variables)]
pub fn with_programmer<F>(
    device: &DeviceArgs,
    db: &PartDatabase,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Device<'_>) -> Result<(), Box<dyn std::error::Error>>,
{
    let (name, options) = parse_programmer_string(&device.programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    let config = UsbAspConfig {
        clock: device.sck,
        ..Default::default()
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => dummy::run(&options, device.slow_jumper, config, db, f),

        _ => Err(unknown_programmer_error(name)),
    }
}

#[cfg(feature = "dummy")]
mod dummy {
    //! Simulated programmer: engine, ISP layer and AVR model in-process

    use super::{Device, LogIndicator};
    use rusbasp_core::engine::Programmer;
    use rusbasp_core::isp::Isp;
    use rusbasp_core::part::PartDatabase;
    use rusbasp_core::port::FixedStrap;
    use rusbasp_dummy::{DummyAvr, DummyConfig};
    use rusbasp_host::{Loopback, UsbAsp, UsbAspConfig};
    use std::fs;
    use std::path::Path;

    pub fn run<F>(
        options: &[(&str, &str)],
        slow_jumper: bool,
        config: UsbAspConfig,
        db: &PartDatabase,
        f: F,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        F: FnOnce(&mut Device<'_>) -> Result<(), Box<dyn std::error::Error>>,
    {
        let option = |key: &str| options.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

        let target_config = match option("part") {
            Some(name) => {
                let part = db
                    .find_by_name(name)
                    .ok_or_else(|| format!("Unknown part '{}' (see 'rusbasp list-parts')", name))?;
                log::info!("Simulating {} {}", part.vendor, part.name);
                DummyConfig::from(part)
            }
            None => DummyConfig::default(),
        };

        let image = option("image").map(Path::new);
        let eeprom_image = option("eeprom").map(Path::new);

        let mut avr = DummyAvr::new(target_config);
        if let Some(path) = image.filter(|p| p.exists()) {
            let data = fs::read(path)?;
            let len = data.len().min(avr.flash().len());
            avr.flash_mut()[..len].copy_from_slice(&data[..len]);
            log::info!("Loaded {} bytes of flash from {}", len, path.display());
        }
        if let Some(path) = eeprom_image.filter(|p| p.exists()) {
            let data = fs::read(path)?;
            let len = data.len().min(avr.eeprom().len());
            avr.eeprom_mut()[..len].copy_from_slice(&data[..len]);
            log::info!("Loaded {} bytes of EEPROM from {}", len, path.display());
        }

        let engine =
            Programmer::with_peripherals(Isp::new(avr), LogIndicator, FixedStrap(slow_jumper));
        let mut loopback = Loopback::new(engine);

        {
            let transport: &mut dyn rusbasp_host::Transport = &mut loopback;
            let mut usbasp = UsbAsp::open(transport, config)?;
            let result = f(&mut usbasp);
            let closed = usbasp.close();
            result?;
            closed?;
        }

        let avr = loopback.into_inner().into_port().into_inner();
        log::debug!(
            "Simulated target: {} page writes, {} byte writes, {} chip erases, {} us busy",
            avr.page_writes(),
            avr.byte_writes(),
            avr.chip_erases(),
            avr.elapsed_us()
        );
        if let Some(path) = image {
            fs::write(path, avr.flash())?;
            log::info!("Saved flash to {}", path.display());
        }
        if let Some(path) = eeprom_image {
            fs::write(path, avr.eeprom())?;
            log::info!("Saved EEPROM to {}", path.display());
        }
        Ok(())
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'rusbasp list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        let (name, opts) = parse_programmer_string("dummy:part=ATtiny85,image=fw.bin");
        assert_eq!(name, "dummy");
        assert_eq!(opts, vec![("part", "ATtiny85"), ("image", "fw.bin")]);

        let (name, opts) = parse_programmer_string("dummy");
        assert_eq!(name, "dummy");
        assert!(opts.is_empty());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_find_programmer_alias() {
        assert_eq!(find_programmer("sim"), Some("dummy"));
        assert_eq!(find_programmer("usbtiny"), None);
    }
}

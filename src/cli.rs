//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use rusbasp_core::protocol::{MemoryKind, SckOption};
use std::path::PathBuf;

/// Parse an ISP clock name such as `8k`, `187.5k` or `1.5M`
fn parse_sck(s: &str) -> Result<SckOption, String> {
    SckOption::parse(s).ok_or_else(|| {
        format!(
            "Invalid clock '{}' [valid: {}]",
            s,
            SckOption::names().collect::<Vec<_>>().join(", ")
        )
    })
}

#[derive(Parser)]
#[command(name = "rusbasp")]
#[command(author, version, about = "AVR programmer for USBasp-style devices", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Additional part database (a .ron file or a directory of them)
    #[arg(long, global = true)]
    pub part_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Programmer options shared across device commands
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Programmer to use, with options (e.g. dummy:part=ATtiny85,image=fw.bin)
    #[arg(short, long, default_value = "dummy")]
    pub programmer: String,

    /// ISP clock (auto, 0.5k, 1k, 2k, 4k, 8k, 16k, 32k, 93.75k, 187.5k, 375k, 750k, 1.5M)
    #[arg(long, value_parser = parse_sck, default_value = "auto")]
    pub sck: SckOption,

    /// Act as if the slow-clock jumper is fitted (forces 8 kHz)
    #[arg(long)]
    pub slow_jumper: bool,
}

/// Target memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Memory {
    /// Program memory
    Flash,
    /// Data EEPROM
    Eeprom,
}

impl From<Memory> for MemoryKind {
    fn from(memory: Memory) -> Self {
        match memory {
            Memory::Flash => MemoryKind::Flash,
            Memory::Eeprom => MemoryKind::Eeprom,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the connected target
    Probe {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Read memory contents to file
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Memory to read
        #[arg(short, long, value_enum, default_value_t = Memory::Flash)]
        memory: Memory,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write file to memory
    Write {
        #[command(flatten)]
        device: DeviceArgs,

        /// Memory to write
        #[arg(short, long, value_enum, default_value_t = Memory::Flash)]
        memory: Memory,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Skip verification after writing
        #[arg(long)]
        no_verify: bool,

        /// Don't erase the chip before writing flash
        #[arg(long)]
        no_erase: bool,
    },

    /// Verify memory contents against file
    Verify {
        #[command(flatten)]
        device: DeviceArgs,

        /// Memory to verify
        #[arg(short, long, value_enum, default_value_t = Memory::Flash)]
        memory: Memory,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase flash and EEPROM
    Erase {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// List supported programmers
    ListProgrammers,

    /// List known parts
    ListParts {
        /// Filter by part name
        #[arg(long)]
        name: Option<String>,
    },
}

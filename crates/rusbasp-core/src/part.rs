//! AVR part database
//!
//! Part definitions are loaded from RON files at runtime, one file per
//! vendor:
//!
//! ```ron
//! (
//!     vendor: "Atmel",
//!     parts: [
//!         (
//!             name: "ATmega328P",
//!             signature: [0x1E, 0x95, 0x0F],
//!             flash_size: KiB(32),
//!             flash_page_size: 128,
//!             eeprom_size: KiB(1),
//!             chip_erase_delay_us: 9000,
//!         ),
//!     ],
//! )
//! ```

use alloc::{format, string::String, vec::Vec};
use core::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::protocol::MAX_PAGE_SIZE;

/// Error type for part database operations
#[derive(Debug)]
pub enum PartDbError {
    /// I/O error reading files
    Io(io::Error),
    /// RON parsing error
    Parse(ron::error::SpannedError),
    /// Validation error
    Validation(String),
}

impl From<io::Error> for PartDbError {
    fn from(e: io::Error) -> Self {
        PartDbError::Io(e)
    }
}

impl From<ron::error::SpannedError> for PartDbError {
    fn from(e: ron::error::SpannedError) -> Self {
        PartDbError::Parse(e)
    }
}

impl fmt::Display for PartDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartDbError::Io(e) => write!(f, "I/O error: {}", e),
            PartDbError::Parse(e) => write!(f, "Parse error: {}", e),
            PartDbError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for PartDbError {}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
}

impl Size {
    /// Convert to bytes, `None` if the value does not fit in a `u32`
    pub fn to_bytes(self) -> Option<u32> {
        match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct PartDef {
    name: String,
    signature: Vec<u8>,
    flash_size: Size,
    #[serde(default)]
    flash_page_size: u16,
    eeprom_size: Size,
    #[serde(default = "default_chip_erase_delay")]
    chip_erase_delay_us: u32,
}

fn default_chip_erase_delay() -> u32 {
    9_000
}

#[derive(Debug, Clone, serde::Deserialize)]
struct VendorDef {
    vendor: String,
    parts: Vec<PartDef>,
}

// ============================================================================
// Parts
// ============================================================================

/// One AVR part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Vendor name
    pub vendor: String,
    /// Part name
    pub name: String,
    /// Three signature bytes
    pub signature: [u8; 3],
    /// Program memory size in bytes
    pub flash_size: u32,
    /// Program memory page size in bytes, 0 for byte-programmed parts
    pub flash_page_size: u16,
    /// EEPROM size in bytes
    pub eeprom_size: u32,
    /// Time to wait after a chip erase
    pub chip_erase_delay_us: u32,
}

impl Part {
    /// Whether program memory is written page by page
    pub fn is_paged(&self) -> bool {
        self.flash_page_size != 0
    }

    /// Signature formatted as `1E 95 0F`
    pub fn signature_string(&self) -> String {
        let [a, b, c] = self.signature;
        format!("{:02X} {:02X} {:02X}", a, b, c)
    }

    fn from_def(vendor: &str, def: PartDef) -> Result<Self, PartDbError> {
        let signature: [u8; 3] = def.signature.as_slice().try_into().map_err(|_| {
            PartDbError::Validation(format!(
                "{}: signature must be 3 bytes, got {}",
                def.name,
                def.signature.len()
            ))
        })?;

        let flash_size = size_bytes(&def.name, "flash", def.flash_size)?;
        let eeprom_size = size_bytes(&def.name, "EEPROM", def.eeprom_size)?;
        let page = def.flash_page_size;
        if page > MAX_PAGE_SIZE {
            return Err(PartDbError::Validation(format!(
                "{}: page size {} exceeds {}",
                def.name, page, MAX_PAGE_SIZE
            )));
        }
        if page != 0 && flash_size % page as u32 != 0 {
            return Err(PartDbError::Validation(format!(
                "{}: flash size {} is not a multiple of page size {}",
                def.name, flash_size, page
            )));
        }

        Ok(Part {
            vendor: vendor.into(),
            name: def.name,
            signature,
            flash_size,
            flash_page_size: page,
            eeprom_size,
            chip_erase_delay_us: def.chip_erase_delay_us,
        })
    }
}

fn size_bytes(name: &str, what: &str, size: Size) -> Result<u32, PartDbError> {
    size.to_bytes().ok_or_else(|| {
        PartDbError::Validation(format!("{}: {} size {:?} overflows", name, what, size))
    })
}

// ============================================================================
// Part database
// ============================================================================

/// Runtime part database
#[derive(Debug, Clone, Default)]
pub struct PartDatabase {
    parts: Vec<Part>,
}

impl PartDatabase {
    /// Create an empty part database
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Load part definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, PartDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load part definitions from a RON string
    ///
    /// Either all parts of the file are added or none.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, PartDbError> {
        let vendor_def: VendorDef = ron::from_str(content)?;
        let parts = vendor_def
            .parts
            .into_iter()
            .map(|def| Part::from_def(&vendor_def.vendor, def))
            .collect::<Result<Vec<_>, _>>()?;

        let count = parts.len();
        self.parts.extend(parts);
        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, PartDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Load a file or every RON file of a directory
    pub fn load_path(&mut self, path: &Path) -> Result<usize, PartDbError> {
        if path.is_dir() {
            self.load_dir(path)
        } else {
            self.load_file(path)
        }
    }

    /// Get all parts in the database
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Get the number of parts in the database
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Find a part by its signature bytes
    pub fn find_by_signature(&self, signature: [u8; 3]) -> Option<&Part> {
        self.parts.iter().find(|p| p.signature == signature)
    }

    /// Find a part by exact name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Find parts whose name contains `pattern` (case-insensitive)
    pub fn search(&self, pattern: &str) -> Vec<&Part> {
        let pattern = pattern.to_lowercase();
        self.parts
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&pattern))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"(
        vendor: "Atmel",
        parts: [
            (
                name: "ATmega328P",
                signature: [0x1E, 0x95, 0x0F],
                flash_size: KiB(32),
                flash_page_size: 128,
                eeprom_size: KiB(1),
            ),
            (
                name: "AT90S2313",
                signature: [0x1E, 0x91, 0x01],
                flash_size: KiB(2),
                eeprom_size: B(128),
                chip_erase_delay_us: 20000,
            ),
        ],
    )"#;

    #[test]
    fn test_load_and_lookup() {
        let mut db = PartDatabase::new();
        assert_eq!(db.load_ron(SAMPLE).unwrap(), 2);
        assert_eq!(db.len(), 2);

        let part = db.find_by_signature([0x1E, 0x95, 0x0F]).unwrap();
        assert_eq!(part.name, "ATmega328P");
        assert_eq!(part.vendor, "Atmel");
        assert_eq!(part.flash_size, 32 * 1024);
        assert_eq!(part.eeprom_size, 1024);
        assert_eq!(part.chip_erase_delay_us, 9_000);
        assert!(part.is_paged());
        assert_eq!(part.signature_string(), "1E 95 0F");

        let old = db.find_by_name("at90s2313").unwrap();
        assert!(!old.is_paged());
        assert_eq!(old.eeprom_size, 128);
        assert_eq!(old.chip_erase_delay_us, 20_000);

        assert_eq!(db.search("mega").len(), 1);
        assert!(db.find_by_signature([0, 0, 0]).is_none());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let ron = r#"(vendor: "X", parts: [(name: "Bad", signature: [0x1E, 0x95],
            flash_size: KiB(1), eeprom_size: B(0))])"#;
        let mut db = PartDatabase::new();
        assert!(matches!(db.load_ron(ron), Err(PartDbError::Validation(_))));
        assert!(db.is_empty());
    }

    #[test]
    fn test_oversized_kib_rejected() {
        let ron = r#"(vendor: "X", parts: [(name: "Huge", signature: [1, 2, 3],
            flash_size: KiB(4194304), eeprom_size: B(0))])"#;
        let mut db = PartDatabase::new();
        assert!(matches!(db.load_ron(ron), Err(PartDbError::Validation(_))));
        assert!(db.is_empty());
        assert_eq!(Size::KiB(4_194_303).to_bytes(), Some(0xFFFF_FC00));
    }

    #[test]
    fn test_page_size_must_divide_flash() {
        let ron = r#"(vendor: "X", parts: [(name: "Odd", signature: [1, 2, 3],
            flash_size: B(1000), flash_page_size: 64, eeprom_size: B(0))])"#;
        let mut db = PartDatabase::new();
        assert!(matches!(db.load_ron(ron), Err(PartDbError::Validation(_))));
    }

    #[test]
    fn test_parse_error() {
        let mut db = PartDatabase::new();
        assert!(matches!(db.load_ron("(vendor: 1)"), Err(PartDbError::Parse(_))));
    }
}

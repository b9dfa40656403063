//! Emulator configuration from the environment.
//!
//! Read once at startup into a [`Config`]; nothing else touches the
//! environment afterwards.
//!
//! | variable          | meaning                       | default    |
//! |-------------------|-------------------------------|------------|
//! | `GLOBAL_RAM_SIZE` | cell count of RAM             | `1024`     |
//! | `SYSTEM_HW_DIR`   | directory holding disk files  | `hw`       |
//! | `GLOBAL_RAM_FILE` | default RAM-dump path         | unset      |

use crate::emulator::errors::EmuError;
use crate::emulator::registers::RESERVED_CELLS;
use std::env;
use std::path::PathBuf;

/// Default RAM size when `GLOBAL_RAM_SIZE` is unset.
pub const DEFAULT_RAM_SIZE: u32 = 1024;
/// Default hardware directory when `SYSTEM_HW_DIR` is unset.
pub const DEFAULT_HW_DIR: &str = "hw";

/// Resolved emulator configuration.
pub struct Config {
    /// Number of RAM cells.
    pub ram_size: u32,
    /// Directory holding disk files.
    pub hw_dir: PathBuf,
    /// Where to dump RAM on exit, when requested.
    pub ram_dump: Option<PathBuf>,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// A RAM too small to hold the register file is rejected up front;
    /// a malformed `GLOBAL_RAM_SIZE` is rejected rather than defaulted so a
    /// typo does not silently shrink the machine.
    pub fn from_env() -> Result<Self, EmuError> {
        let ram_size = match env::var("GLOBAL_RAM_SIZE") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|_| EmuError::Io {
                path: "GLOBAL_RAM_SIZE".to_string(),
                reason: format!("not a cell count: {raw:?}"),
            })?,
            Err(_) => DEFAULT_RAM_SIZE,
        };

        let hw_dir = env::var("SYSTEM_HW_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_HW_DIR));

        let ram_dump = env::var("GLOBAL_RAM_FILE").ok().map(PathBuf::from);

        Self::new(ram_size, hw_dir, ram_dump)
    }

    /// Builds a configuration, validating the RAM size.
    pub fn new(
        ram_size: u32,
        hw_dir: PathBuf,
        ram_dump: Option<PathBuf>,
    ) -> Result<Self, EmuError> {
        if ram_size <= RESERVED_CELLS {
            return Err(EmuError::InvalidRamSize {
                size: ram_size,
                min: RESERVED_CELLS + 1,
            });
        }
        Ok(Self {
            ram_size,
            hw_dir,
            ram_dump,
        })
    }
}

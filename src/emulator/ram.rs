//! Linear string-cell RAM.
//!
//! RAM is a dense, 1-indexed array of cells, each holding a textual value.
//! The empty string means "no value". Address 0 is never valid, and any
//! access outside `[1, size]` is emulator-fatal: the guest cannot trap it.

use crate::emulator::errors::EmuError;
use std::fmt;
use std::fs;
use std::path::Path;

/// A RAM cell address.
///
/// A distinct type rather than a bare integer so that cell addresses do not
/// get mixed up with cell contents or arithmetic values; indirection is
/// always an explicit parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(pub u32);

impl Addr {
    /// Parses a decimal token into an address.
    ///
    /// Accepts exactly the digits of a non-negative decimal number; anything
    /// else (including the empty string) is rejected. Bounds are checked at
    /// access time, not here.
    pub fn parse(token: &str) -> Result<Addr, EmuError> {
        token
            .trim()
            .parse::<u32>()
            .map(Addr)
            .map_err(|_| EmuError::NotAnAddress {
                token: token.to_string(),
            })
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-size cell array.
pub struct Ram {
    cells: Vec<String>,
}

impl Ram {
    /// Creates a zero-initialized (all cells empty) RAM of `size` cells.
    pub fn new(size: u32) -> Self {
        Self {
            cells: vec![String::new(); size as usize],
        }
    }

    /// Number of cells.
    pub fn size(&self) -> u32 {
        self.cells.len() as u32
    }

    /// Maps an address to a vector index, rejecting anything outside
    /// `[1, size]`.
    fn slot(&self, addr: Addr) -> Result<usize, EmuError> {
        if addr.0 == 0 || addr.0 > self.size() {
            return Err(EmuError::InvalidAddress {
                addr: addr.0,
                size: self.size(),
            });
        }
        Ok((addr.0 - 1) as usize)
    }

    /// Reads the cell at `addr`.
    pub fn read(&self, addr: Addr) -> Result<&str, EmuError> {
        let slot = self.slot(addr)?;
        Ok(&self.cells[slot])
    }

    /// Overwrites the cell at `addr` unconditionally.
    pub fn write(&mut self, addr: Addr, value: impl Into<String>) -> Result<(), EmuError> {
        let slot = self.slot(addr)?;
        self.cells[slot] = value.into();
        Ok(())
    }

    /// Writes all cells to `path`, one per line, in address order.
    pub fn dump(&self, path: &Path) -> Result<(), EmuError> {
        let mut out = String::with_capacity(self.cells.len() * 8);
        for cell in &self.cells {
            out.push_str(cell);
            out.push('\n');
        }
        fs::write(path, out).map_err(|e| EmuError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut ram = Ram::new(64);
        for addr in [1u32, 2, 63, 64] {
            ram.write(Addr(addr), format!("value-{addr}")).unwrap();
            assert_eq!(ram.read(Addr(addr)).unwrap(), format!("value-{addr}"));
        }
    }

    #[test]
    fn cells_start_empty() {
        let ram = Ram::new(8);
        for addr in 1..=8 {
            assert_eq!(ram.read(Addr(addr)).unwrap(), "");
        }
    }

    #[test]
    fn address_zero_is_fatal() {
        let mut ram = Ram::new(8);
        assert!(matches!(
            ram.read(Addr(0)),
            Err(EmuError::InvalidAddress { addr: 0, size: 8 })
        ));
        assert!(matches!(
            ram.write(Addr(0), "x"),
            Err(EmuError::InvalidAddress { addr: 0, size: 8 })
        ));
    }

    #[test]
    fn address_past_end_is_fatal() {
        let mut ram = Ram::new(8);
        assert!(matches!(
            ram.read(Addr(9)),
            Err(EmuError::InvalidAddress { addr: 9, size: 8 })
        ));
        assert!(matches!(
            ram.write(Addr(9), "x"),
            Err(EmuError::InvalidAddress { addr: 9, size: 8 })
        ));
    }

    #[test]
    fn overwrite_is_unconditional() {
        let mut ram = Ram::new(4);
        ram.write(Addr(2), "first").unwrap();
        ram.write(Addr(2), "second").unwrap();
        assert_eq!(ram.read(Addr(2)).unwrap(), "second");
        ram.write(Addr(2), "").unwrap();
        assert_eq!(ram.read(Addr(2)).unwrap(), "");
    }

    #[test]
    fn addr_parse_accepts_decimal() {
        assert_eq!(Addr::parse("17").unwrap(), Addr(17));
        assert_eq!(Addr::parse(" 4 ").unwrap(), Addr(4));
    }

    #[test]
    fn addr_parse_rejects_garbage() {
        for token in ["", "abc", "-1", "1.5", "@3", "*3"] {
            assert!(matches!(
                Addr::parse(token),
                Err(EmuError::NotAnAddress { .. })
            ));
        }
    }

    #[test]
    fn dump_writes_cells_in_order() {
        let mut ram = Ram::new(3);
        ram.write(Addr(1), "one").unwrap();
        ram.write(Addr(3), "three").unwrap();

        let path = std::env::temp_dir().join(format!("cellbox-ram-dump-{}", std::process::id()));
        ram.dump(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "one\n\nthree\n");
        let _ = fs::remove_file(&path);
    }
}

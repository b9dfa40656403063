//! File-backed block devices.
//!
//! A disk is a text file under `SYSTEM_HW_DIR`; its first line is the
//! decimal block count and doubles as read-only block 1. Block `k` lives on
//! line `k`. Writes replace one line, keep every other block intact, and go
//! through a temporary file renamed over the original so a partial write
//! never corrupts the disk.
//!
//! All failures here are guest-visible: the interpreter formats them into
//! `REG_ERROR` and the guest branches with `jump_err`.

use cellbox_derive::Error;
use std::fs;
use std::path::PathBuf;

/// Guest-visible disk failures. The `Display` text is exactly what lands in
/// `REG_ERROR`.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("Disk {0} not found")]
    NotFound(String),
    #[error("Disk {0} has a corrupt header")]
    CorruptHeader(String),
    #[error("Block {0} is out of range")]
    OutOfRange(u64),
    #[error("Block 1 is read-only")]
    ReadOnlyBlock,
    #[error("Invalid block number {0:?}")]
    InvalidBlockNumber(String),
    #[error("Block values cannot contain newlines")]
    EmbeddedNewline,
    #[error("Disk {0} is not writable")]
    NotWritable(String),
}

/// Access to the disks of one emulator instance.
pub struct BlockDevice {
    dir: PathBuf,
}

impl BlockDevice {
    /// Creates a device rooted at the hardware directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The hardware directory this device is rooted at.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn disk_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Loads a disk image and validates its header.
    fn load(&self, name: &str) -> Result<(Vec<String>, u64), DiskError> {
        let text = fs::read_to_string(self.disk_path(name))
            .map_err(|_| DiskError::NotFound(name.to_string()))?;
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let count = lines
            .first()
            .and_then(|header| header.trim().parse::<u64>().ok())
            .ok_or_else(|| DiskError::CorruptHeader(name.to_string()))?;
        Ok((lines, count))
    }

    /// Reads block `block` (a decimal token) of disk `name`.
    ///
    /// Block 1 is the header and reads back the block count. Blocks the
    /// header promises but the file does not yet hold read as empty.
    pub fn read_block(&self, name: &str, block: &str) -> Result<String, DiskError> {
        let block = parse_block_number(block)?;
        let (lines, count) = self.load(name)?;
        if block == 0 || block > count {
            return Err(DiskError::OutOfRange(block));
        }
        Ok(lines
            .get((block - 1) as usize)
            .cloned()
            .unwrap_or_default())
    }

    /// Writes `value` to block `block` of disk `name`, preserving all other
    /// blocks. Block 1 is read-only.
    pub fn write_block(&self, name: &str, block: &str, value: &str) -> Result<(), DiskError> {
        let block = parse_block_number(block)?;
        if block == 1 {
            return Err(DiskError::ReadOnlyBlock);
        }
        if value.contains('\n') {
            return Err(DiskError::EmbeddedNewline);
        }

        let (mut lines, count) = self.load(name)?;
        if block == 0 || block > count {
            return Err(DiskError::OutOfRange(block));
        }

        while (lines.len() as u64) < count {
            lines.push(String::new());
        }
        lines[(block - 1) as usize] = value.to_string();

        let mut image = lines.join("\n");
        image.push('\n');
        self.replace_image(name, &image)
    }

    /// Atomically replaces the disk file: write a temporary, rename it over
    /// the original, and clean the temporary up on every failure path.
    fn replace_image(&self, name: &str, image: &str) -> Result<(), DiskError> {
        let path = self.disk_path(name);
        let tmp = path.with_extension("tmp");
        if fs::write(&tmp, image).is_err() {
            let _ = fs::remove_file(&tmp);
            return Err(DiskError::NotWritable(name.to_string()));
        }
        if fs::rename(&tmp, &path).is_err() {
            let _ = fs::remove_file(&tmp);
            return Err(DiskError::NotWritable(name.to_string()));
        }
        Ok(())
    }
}

fn parse_block_number(token: &str) -> Result<u64, DiskError> {
    token
        .trim()
        .parse::<u64>()
        .map_err(|_| DiskError::InvalidBlockNumber(token.to_string()))
}

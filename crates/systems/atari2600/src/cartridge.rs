//! Atari 2600 cartridge ROM
//!
//! The console exposes 13 address lines, and A12 selects the cartridge, so a
//! cartridge sees a 4K window. Images up to 4096 bytes are copied to the
//! start of that window and the rest reads as zero. A 2K image is mirrored
//! into both halves, as the real 2K boards ignore A11.

use emu_core::logging::{log, LogCategory, LogLevel};
use std::path::Path;
use thiserror::Error;

/// Size of the cartridge window
pub const ROM_SIZE: usize = 4096;
const HALF_ROM_SIZE: usize = ROM_SIZE / 2;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image is {0} bytes, larger than the 4096 byte window")]
    TooLarge(usize),
    #[error("ROM image is empty")]
    Empty,
    #[error("Failed to read ROM image: {0}")]
    Io(#[from] std::io::Error),
}

/// Atari 2600 cartridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cartridge {
    rom: Box<[u8; ROM_SIZE]>,
    /// Bytes in the loaded image
    image_len: usize,
}

impl Cartridge {
    /// Create a cartridge from an image
    pub fn new(image: &[u8]) -> Result<Self, CartridgeError> {
        if image.is_empty() {
            return Err(CartridgeError::Empty);
        }
        if image.len() > ROM_SIZE {
            return Err(CartridgeError::TooLarge(image.len()));
        }

        let mut rom = Box::new([0u8; ROM_SIZE]);
        rom[..image.len()].copy_from_slice(image);
        if image.len() == HALF_ROM_SIZE {
            rom[HALF_ROM_SIZE..].copy_from_slice(image);
        }

        log(LogCategory::Bus, LogLevel::Info, || {
            format!("Cartridge: loaded {} byte image", image.len())
        });

        Ok(Self {
            rom,
            image_len: image.len(),
        })
    }

    /// Load an image from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CartridgeError> {
        let image = std::fs::read(path)?;
        Self::new(&image)
    }

    /// All-zero ROM, used when no image could be loaded
    pub fn blank() -> Self {
        Self {
            rom: Box::new([0u8; ROM_SIZE]),
            image_len: 0,
        }
    }

    /// Read from the 4K window. Only the low 12 bits of `addr` are used.
    pub fn read(&self, addr: u16) -> u8 {
        self.rom[(addr & 0x0FFF) as usize]
    }

    /// Size of the loaded image in bytes
    pub fn size(&self) -> usize {
        self.image_len
    }
}

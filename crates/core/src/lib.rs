//! Core emulator primitives and traits shared by the system crates.

pub mod cpu_6502;
pub mod logging;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A finished picture in 0xAARRGGBB pixels, row-major
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.pixels.get((y * self.width + x) as usize).copied()
        }
    }
}

use serde_json::Value;

/// A CPU-like component that can be stepped; returns cycles consumed.
pub trait Cpu {
    fn reset(&mut self);
    fn step(&mut self) -> u32;
}

/// A media slot a system exposes, such as a cartridge port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    pub id: String,
    /// Display name, e.g. "Cartridge Slot"
    pub name: String,
    /// Accepted file extensions without the dot
    pub extensions: Vec<String>,
    pub required: bool,
}

/// A complete machine that can be driven frame by frame.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return to the power-on state, keeping mounted media.
    fn reset(&mut self);

    /// Emulate until the video chip hands off a frame.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Machine state as JSON. Mounted media is not included.
    fn save_state(&self) -> Value;

    /// Restore a state produced by [`System::save_state`].
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    fn supports_save_states(&self) -> bool {
        false
    }

    fn mount_points(&self) -> Vec<MountPointInfo>;

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

//! Beam-addressed picture produced by the TIA.
//!
//! Each cell holds a resolved colour and the tag of the object that painted
//! it. The tag decides whether a later object may paint over the cell and
//! which collision latch a meeting sets.

use emu_core::types::Frame;
use serde::{Deserialize, Serialize};

/// Colour clocks per scanline, horizontal blank included
pub const FRAME_WIDTH: usize = 228;
/// Scanlines per frame, vertical sync and blank included
pub const FRAME_HEIGHT: usize = 262;

/// What painted a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectTag {
    Background,
    Playfield,
    Ball,
    Missile1,
    Player1,
    Missile0,
    Player0,
}

impl ObjectTag {
    /// Fixed draw priority. Higher wins.
    pub const fn rank(self) -> u8 {
        match self {
            ObjectTag::Background => 0,
            ObjectTag::Playfield => 1,
            ObjectTag::Ball => 2,
            ObjectTag::Missile1 => 3,
            ObjectTag::Player1 => 4,
            ObjectTag::Missile0 => 5,
            ObjectTag::Player0 => 6,
        }
    }

    pub const fn outranks(self, other: ObjectTag) -> bool {
        self.rank() > other.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    /// 0xRRGGBB
    pub color: u32,
    pub tag: ObjectTag,
}

impl Pixel {
    pub const BLACK: Pixel = Pixel {
        color: 0x000000,
        tag: ObjectTag::Background,
    };

    pub const fn new(color: u32, tag: ObjectTag) -> Self {
        Self { color, tag }
    }
}

impl Default for Pixel {
    fn default() -> Self {
        Pixel::BLACK
    }
}

/// A full 228x262 picture, beam blanking areas included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvFrame {
    pixels: Vec<Pixel>,
}

impl Default for TvFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl TvFrame {
    pub fn new() -> Self {
        Self {
            pixels: vec![Pixel::BLACK; FRAME_WIDTH * FRAME_HEIGHT],
        }
    }

    fn index(x: usize, y: usize) -> Option<usize> {
        (x < FRAME_WIDTH && y < FRAME_HEIGHT).then_some(y * FRAME_WIDTH + x)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Pixel> {
        Self::index(x, y).map(|i| self.pixels[i])
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Pixel> {
        Self::index(x, y).map(move |i| &mut self.pixels[i])
    }

    /// Writes outside the frame are dropped.
    pub fn set(&mut self, x: usize, y: usize, pixel: Pixel) {
        if let Some(p) = self.get_mut(x, y) {
            *p = pixel;
        }
    }

    /// Packed ARGB copy for a renderer.
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(FRAME_WIDTH as u32, FRAME_HEIGHT as u32);
        for (out, p) in frame.pixels.iter_mut().zip(&self.pixels) {
            *out = 0xFF00_0000 | p.color;
        }
        frame
    }
}

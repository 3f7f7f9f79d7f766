//! PNG frame dumps

use emu_core::types::Frame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `frame` as an 8-bit RGBA PNG.
pub fn save_png(frame: &Frame, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)?;
    encode_png(frame, BufWriter::new(file))
}

pub fn encode_png<W: Write>(frame: &Frame, out: W) -> anyhow::Result<()> {
    let mut encoder = png::Encoder::new(out, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&to_rgba(frame))?;
    Ok(())
}

/// ARGB words to RGBA bytes
fn to_rgba(frame: &Frame) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(frame.pixels.len() * 4);
    for &pixel in &frame.pixels {
        rgba.push((pixel >> 16) as u8);
        rgba.push((pixel >> 8) as u8);
        rgba.push(pixel as u8);
        rgba.push((pixel >> 24) as u8);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_byte_order() {
        let mut frame = Frame::new(2, 1);
        frame.pixels[0] = 0xFF11_2233;
        frame.pixels[1] = 0xFF00_0000;
        assert_eq!(
            to_rgba(&frame),
            vec![0x11, 0x22, 0x33, 0xFF, 0x00, 0x00, 0x00, 0xFF]
        );
    }

    #[test]
    fn encodes_png_signature() {
        let frame = Frame::new(4, 3);
        let mut bytes = Vec::new();
        encode_png(&frame, &mut bytes).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}

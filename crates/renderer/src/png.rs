//! PNG encoding for rendered frames.
//!
//! Frames are written as 8-bit truecolor PNG (color type 2). Rows are
//! compressed with the Sub filter, which suits the smooth gradients of
//! satellite imagery.

use std::io::Write;
use std::path::Path;

use crate::error::{RenderError, Result};
use crate::frame::RenderedImage;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Bytes per RGB pixel
const BPP: usize = 3;

/// Create an RGB PNG image.
///
/// # Arguments
/// - `pixels`: RGB pixel data (3 bytes per pixel)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> std::result::Result<Vec<u8>, String> {
    if pixels.len() != width * height * BPP {
        return Err(format!(
            "pixel buffer has {} bytes, expected {} for {}x{} RGB",
            pixels.len(),
            width * height * BPP,
            width,
            height
        ));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(2); // color type (RGB)
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    let idat_data =
        deflate_idat_rgb(pixels, width, height).map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Encode a rendered frame and write it to `path`.
pub fn write_png(path: &Path, image: &RenderedImage) -> Result<()> {
    let png = create_png(&image.to_rgb(), image.width, image.height).map_err(RenderError::encode)?;
    std::fs::write(path, png).map_err(|e| RenderError::io(path, e))
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

fn deflate_idat_rgb(
    pixels: &[u8],
    width: usize,
    height: usize,
) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
    let stride = width * BPP;
    let mut filtered = Vec::with_capacity(height * (1 + stride));

    for row in pixels.chunks_exact(stride.max(1)).take(height) {
        filtered.push(1); // filter type: Sub
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= BPP { row[i - BPP] } else { 0 };
            filtered.push(byte.wrapping_sub(left));
        }
    }
    if stride == 0 {
        filtered.resize(height, 0);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&filtered)?;
    Ok(encoder.finish()?)
}

//! Placeholder frames for shots whose visual cannot be resolved.
//!
//! A solid frame whose color is derived from the label, with the label
//! drawn in a built-in 5x7 block font. Output is a pure function of label
//! and size.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_common::hashing::sha256_hex;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const MAX_LABEL_CHARS: usize = 32;
const TEXT_COLOR: Rgb<u8> = Rgb([240, 240, 240]);

/// Background color for `label`: mid-dark so light text stays readable.
pub fn placeholder_color(label: &str) -> Rgb<u8> {
    let digest = Sha256::digest(label.as_bytes());
    Rgb([
        48 + digest[0] % 112,
        48 + digest[1] % 112,
        48 + digest[2] % 112,
    ])
}

/// Draw the placeholder frame in memory.
pub fn render_placeholder(label: &str, width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::from_pixel(width, height, placeholder_color(label));

    let text: Vec<char> = label
        .chars()
        .take(MAX_LABEL_CHARS)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if text.is_empty() {
        return img;
    }

    // One column of spacing between glyphs.
    let cols = text.len() as u32 * (GLYPH_W + 1) - 1;
    let scale = ((width * 3 / 4) / cols).min((height / 4) / GLYPH_H).max(1);
    let text_w = cols * scale;
    let text_h = GLYPH_H * scale;
    let origin_x = width.saturating_sub(text_w) / 2;
    let origin_y = height.saturating_sub(text_h) / 2;

    for (i, &c) in text.iter().enumerate() {
        let gx = origin_x + i as u32 * (GLYPH_W + 1) * scale;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                fill_block(
                    &mut img,
                    gx + col * scale,
                    origin_y + row as u32 * scale,
                    scale,
                );
            }
        }
    }
    img
}

/// File name for `label`'s placeholder: sanitized label plus a short hash,
/// so labels that sanitize alike still get distinct files.
pub fn placeholder_file_name(label: &str) -> String {
    let safe: String = label
        .chars()
        .take(MAX_LABEL_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() { "shot".to_string() } else { safe };
    format!("placeholder_{safe}_{}.png", &sha256_hex(label)[..8])
}

/// Write the placeholder PNG into `dir` and return its path.
pub fn write_placeholder(dir: &Path, label: &str, width: u32, height: u32) -> BeatreelResult<PathBuf> {
    if width == 0 || height == 0 {
        return Err(BeatreelError::validation(format!(
            "placeholder size {width}x{height} is empty"
        )));
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(placeholder_file_name(label));
    render_placeholder(label, width, height)
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| {
            BeatreelError::render(format!(
                "failed to write placeholder {}: {e}",
                path.display()
            ))
        })?;
    Ok(path)
}

fn fill_block(img: &mut RgbImage, x: u32, y: u32, size: u32) {
    for dy in 0..size {
        for dx in 0..size {
            let (px, py) = (x + dx, y + dy);
            if px < img.width() && py < img.height() {
                img.put_pixel(px, py, TEXT_COLOR);
            }
        }
    }
}

/// 5x7 rows, most significant of the low five bits is the leftmost pixel.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ' ' => [0x00; 7],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

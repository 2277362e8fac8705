//! # Text Labels
//!
//! Renders a line of text with the Spleen 12×24 bitmap font, centred on a
//! label-sized canvas, then turns the canvas so the text runs along the
//! length of the tape.
//!
//! ```text
//!  label_length
//! ┌────────────────────┐         ┌──────┐
//! │                    │         │  o   │
//! │      HELLO         │  ──►    │  l   │  96 dots wide,
//! │                    │ rotate  │  l   │  label_length rows
//! └────────────────────┘  90° ↺  │  e   │
//!      96 dots tall              │  H   │
//!                                └──────┘
//! ```
//!
//! Glyphs are scaled by nearest neighbour, so the canvas stays pure black
//! and white and prints without dithering.

use image::imageops;
use image::{GrayImage, Luma};
use spleen_font::{FONT_12X24, PSF2Font};

use super::image::PRINTHEAD_DOTS;
use crate::error::{FicheroError, Result};

/// Native glyph cell of the bundled font.
const GLYPH_WIDTH: u32 = 12;
const GLYPH_HEIGHT: u32 = 24;

/// Render `text` at `font_size` pixels high on a label `label_length` dots
/// long. The returned image is 96 wide and `label_length` tall.
///
/// Text wider than the label is clipped at both ends.
pub fn text_to_image(text: &str, font_size: u32, label_length: u32) -> Result<GrayImage> {
    if font_size == 0 {
        return Err(FicheroError::InvalidCommand("font size must be positive".to_string()));
    }
    if label_length == 0 {
        return Err(FicheroError::InvalidCommand("label length must be positive".to_string()));
    }

    let mut font = PSF2Font::new(FONT_12X24)
        .map_err(|_| FicheroError::Image("bundled font failed to load".to_string()))?;

    let cell_h = font_size;
    let cell_w = (font_size * GLYPH_WIDTH).div_ceil(GLYPH_HEIGHT).max(1);
    let strip = render_strip(&mut font, text, cell_w, cell_h);

    let canvas_w = label_length;
    let canvas_h = PRINTHEAD_DOTS;
    let mut canvas = GrayImage::from_pixel(canvas_w, canvas_h, Luma([255]));

    // Centre the inked pixels, not the glyph cells: cell padding and empty
    // descender rows would pull the text off centre.
    if let Some((x0, y0, x1, y1)) = ink_bounds(&strip) {
        let left = (canvas_w as i64 - (x1 - x0 + 1) as i64) / 2;
        let top = (canvas_h as i64 - (y1 - y0 + 1) as i64) / 2;
        for y in y0..=y1 {
            for x in x0..=x1 {
                if strip.get_pixel(x, y).0[0] != 0 {
                    continue;
                }
                let cx = left + (x - x0) as i64;
                let cy = top + (y - y0) as i64;
                if (0..canvas_w as i64).contains(&cx) && (0..canvas_h as i64).contains(&cy) {
                    canvas.put_pixel(cx as u32, cy as u32, Luma([0]));
                }
            }
        }
    }

    // Counter-clockwise quarter turn: the start of the text ends up at the
    // bottom of the label.
    Ok(imageops::rotate270(&canvas))
}

/// Draw `text` left to right, one `cell_w` × `cell_h` cell per character.
fn render_strip(font: &mut PSF2Font<'_>, text: &str, cell_w: u32, cell_h: u32) -> GrayImage {
    let chars = text.chars().count() as u32;
    let mut strip = GrayImage::from_pixel(cell_w * chars, cell_h, Luma([255]));

    for (n, ch) in text.chars().enumerate() {
        let mut cell = [[false; GLYPH_WIDTH as usize]; GLYPH_HEIGHT as usize];
        let utf8 = ch.to_string();
        let Some(glyph) = font.glyph_for_utf8(utf8.as_bytes()) else {
            continue;
        };
        for (row_y, row) in glyph.enumerate().take(GLYPH_HEIGHT as usize) {
            for (col_x, on) in row.enumerate().take(GLYPH_WIDTH as usize) {
                cell[row_y][col_x] = on;
            }
        }

        let left = n as u32 * cell_w;
        for dy in 0..cell_h {
            let src_y = (dy * GLYPH_HEIGHT / cell_h) as usize;
            for dx in 0..cell_w {
                let src_x = (dx * GLYPH_WIDTH / cell_w) as usize;
                if cell[src_y][src_x] {
                    strip.put_pixel(left + dx, dy, Luma([0]));
                }
            }
        }
    }
    strip
}

/// Inclusive `(x0, y0, x1, y1)` box around the black pixels, if any.
fn ink_bounds(img: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel.0[0] != 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}

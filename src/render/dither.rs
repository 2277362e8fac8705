//! # Floyd–Steinberg Dithering and Bit Packing
//!
//! Converts a greyscale bitmap into the 1-bit rows the printhead burns.
//!
//! ## Error Diffusion
//!
//! Each pixel is snapped to black or white and the difference (the
//! quantisation error) is pushed onto neighbours that have not been visited
//! yet:
//!
//! ```text
//!             ┌───────┬───────┐
//!             │   *   │ 7/16  │
//!     ┌───────┼───────┼───────┤
//!     │ 3/16  │ 5/16  │ 1/16  │
//!     └───────┴───────┴───────┘
//! ```
//!
//! The weights sum to one, so the average tone of the image survives the
//! conversion; only error pushed past the right and bottom edges is lost.
//!
//! ## Bit Packing
//!
//! - Bit 7 (MSB) = leftmost pixel
//! - 1 = black (burn), 0 = white
//!
//! ## Usage Example
//!
//! ```
//! use fichero::render::dither;
//!
//! let row = vec![true, true, false, false, true, false, true, false];
//! let packed = dither::pack_bits(&row, 8);
//! assert_eq!(packed, vec![0b11001010]); // 0xCA
//! ```

use image::{GrayImage, Luma};

/// Pixels strictly below this are black.
pub const THRESHOLD: u8 = 128;

/// Apply Floyd–Steinberg error diffusion. Every output pixel is 0 or 255.
pub fn floyd_steinberg(img: &GrayImage) -> GrayImage {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut field: Vec<f32> = img.pixels().map(|p| p.0[0] as f32).collect();

    for y in 0..h {
        for x in 0..w {
            diffuse(&mut field, w, h, x, y);
        }
    }

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = field[y as usize * w + x as usize];
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// Quantize the pixel at `(x, y)` and push its error onto the unvisited
/// neighbours with weights 7/16, 3/16, 5/16 and 1/16. Weights that would
/// fall outside the image are dropped.
fn diffuse(field: &mut [f32], w: usize, h: usize, x: usize, y: usize) {
    let i = y * w + x;
    let old = field[i];
    let new = if old < THRESHOLD as f32 { 0.0 } else { 255.0 };
    field[i] = new;
    let err = old - new;

    if x + 1 < w {
        field[i + 1] += err * 7.0 / 16.0;
    }
    if y + 1 < h {
        let below = i + w;
        if x > 0 {
            field[below - 1] += err * 3.0 / 16.0;
        }
        field[below] += err * 5.0 / 16.0;
        if x + 1 < w {
            field[below + 1] += err * 1.0 / 16.0;
        }
    }
}

/// Hard threshold without diffusion: each pixel becomes 0 or 255.
pub fn threshold(img: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y).0[0];
        Luma([if v < THRESHOLD { 0 } else { 255 }])
    })
}

/// Row-major burn mask: `true` where the pixel is below [`THRESHOLD`].
pub fn to_bits(img: &GrayImage) -> Vec<bool> {
    img.pixels().map(|p| p.0[0] < THRESHOLD).collect()
}

/// Pack a row-major mask into bytes, `width` pixels per row.
///
/// Each row starts on a byte boundary; a short last byte is padded with
/// white on the right.
///
/// ## Example
///
/// ```
/// use fichero::render::dither::pack_bits;
///
/// // 12 pixels per row pack into 2 bytes (4 bits padding)
/// let rows = vec![true; 24];
/// assert_eq!(pack_bits(&rows, 12), vec![0xFF, 0xF0, 0xFF, 0xF0]);
/// ```
pub fn pack_bits(bits: &[bool], width: usize) -> Vec<u8> {
    if width == 0 {
        return Vec::new();
    }
    let row_bytes = width.div_ceil(8);
    let rows = bits.len().div_ceil(width);
    let mut bytes = vec![0u8; row_bytes * rows];

    for (row, pixels) in bits.chunks(width).enumerate() {
        for (i, &pixel) in pixels.iter().enumerate() {
            if pixel {
                let byte_idx = row * row_bytes + i / 8;
                let bit_idx = 7 - (i % 8); // MSB first
                bytes[byte_idx] |= 1 << bit_idx;
            }
        }
    }

    bytes
}

/// Inverse of [`pack_bits`]: expand packed rows back to a mask of
/// `width` pixels per row, dropping the padding.
pub fn unpack_bits(data: &[u8], width: usize) -> Vec<bool> {
    if width == 0 {
        return Vec::new();
    }
    let row_bytes = width.div_ceil(8);
    data.chunks(row_bytes)
        .flat_map(|row| {
            (0..width).map(move |i| {
                row.get(i / 8)
                    .is_some_and(|byte| byte & (1 << (7 - (i % 8))) != 0)
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([v]))
    }

    fn black_fraction(img: &GrayImage) -> f32 {
        let black = img.pixels().filter(|p| p.0[0] == 0).count();
        black as f32 / (img.width() * img.height()) as f32
    }

    #[test]
    fn test_output_is_binary() {
        let gradient = GrayImage::from_fn(96, 64, |x, y| Luma([((x * 2 + y) % 256) as u8]));
        let out = floyd_steinberg(&gradient);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.dimensions(), gradient.dimensions());
    }

    #[test]
    fn test_tone_is_conserved() {
        // Mean darkness of the output tracks the input within edge losses.
        for level in [32u8, 64, 128, 192, 224] {
            let out = floyd_steinberg(&flat(96, 96, level));
            let expected = 1.0 - level as f32 / 255.0;
            let got = black_fraction(&out);
            assert!(
                (got - expected).abs() < 0.03,
                "level {}: expected ~{:.3} black, got {:.3}",
                level,
                expected,
                got
            );
        }
    }

    #[test]
    fn test_interior_error_fully_distributed() {
        for value in [100.0f32, 200.0, 37.0] {
            let mut field = vec![0.0f32; 9];
            field[4] = value;
            let before = field.clone();
            diffuse(&mut field, 3, 3, 1, 1);

            let err = value - field[4];
            let spread: f32 = [5, 6, 7, 8].iter().map(|&i| field[i] - before[i]).sum();
            assert_eq!(spread, err, "value {}", value);
            // Already-visited pixels are untouched.
            assert_eq!(&field[..4], &before[..4]);
        }
    }

    #[test]
    fn test_extremes_unchanged() {
        assert!(floyd_steinberg(&flat(16, 16, 0)).pixels().all(|p| p.0[0] == 0));
        assert!(floyd_steinberg(&flat(16, 16, 255)).pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_first_pixel_error_goes_right() {
        // 100 → black, +43.75 to the right → 143.75 → white
        let img = GrayImage::from_raw(2, 1, vec![100, 100]).unwrap();
        let out = floyd_steinberg(&img);
        assert_eq!(out.into_raw(), vec![0, 255]);
    }

    #[test]
    fn test_threshold_boundary() {
        let img = GrayImage::from_raw(3, 1, vec![127, 128, 129]).unwrap();
        assert_eq!(threshold(&img).into_raw(), vec![0, 255, 255]);
        assert_eq!(to_bits(&img), vec![true, false, false]);
    }

    #[test]
    fn test_pack_bits_msb_first() {
        assert_eq!(pack_bits(&[true; 8], 8), vec![0xFF]);
        assert_eq!(pack_bits(&[false; 8], 8), vec![0x00]);
        assert_eq!(
            pack_bits(&[true, false, true, false, true, false, true, false], 8),
            vec![0xAA]
        );
    }

    #[test]
    fn test_pack_bits_row_padding() {
        // 9 pixels per row, 2 rows
        let mut bits = vec![true; 9];
        bits.extend([false; 8]);
        bits.push(true);
        assert_eq!(pack_bits(&bits, 9), vec![0xFF, 0x80, 0x00, 0x80]);
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let bits: Vec<bool> = (0..96 * 5).map(|i| (i * 7) % 3 == 0).collect();
        let packed = pack_bits(&bits, 96);
        assert_eq!(packed.len(), 12 * 5);
        assert_eq!(unpack_bits(&packed, 96), bits);

        let odd: Vec<bool> = (0..13 * 3).map(|i| i % 2 == 0).collect();
        assert_eq!(unpack_bits(&pack_bits(&odd, 13), 13), odd);
    }

    #[test]
    fn test_empty() {
        assert!(pack_bits(&[], 96).is_empty());
        assert!(unpack_bits(&[], 96).is_empty());
    }
}

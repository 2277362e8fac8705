//! # Image to Raster
//!
//! Turns any decoded image into the 96-dot rows the printhead expects.
//!
//! ## Pipeline
//!
//! | Step | Operation |
//! |------|-----------|
//! | 1 | greyscale |
//! | 2 | Lanczos3 resize to 96 px wide, aspect preserved |
//! | 3 | crop rows beyond the label length |
//! | 4 | autocontrast, 1% clipped at each end |
//! | 5 | Floyd–Steinberg (optional) |
//! | 6 | threshold at 128, pack MSB-first |

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use log::{debug, warn};

use super::dither;
use crate::error::{FicheroError, Result};
use crate::printer::PrinterConfig;

/// Printhead width in dots.
pub const PRINTHEAD_DOTS: u32 = PrinterConfig::D11S.width_dots as u32;

/// Share of pixels clipped at each end of the histogram by [`autocontrast`].
pub const AUTOCONTRAST_CUTOFF_PERCENT: u64 = 1;

/// Packed 1-bit image, row-major, MSB = leftmost dot, 1 = black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u16,
    pub rows: u16,
    pub data: Vec<u8>,
}

impl Raster {
    pub fn row_bytes(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Expand back to a black/white bitmap, e.g. for saving a preview.
    pub fn to_image(&self) -> GrayImage {
        let bits = dither::unpack_bits(&self.data, self.width as usize);
        GrayImage::from_fn(self.width as u32, self.rows as u32, |x, y| {
            let black = bits
                .get(y as usize * self.width as usize + x as usize)
                .copied()
                .unwrap_or(false);
            Luma([if black { 0 } else { 255 }])
        })
    }
}

/// Prepare `img` for printing.
///
/// The result is exactly [`PRINTHEAD_DOTS`] wide and at most `max_rows`
/// tall. Taller images lose their bottom rows.
///
/// ## Example
///
/// ```
/// use image::{DynamicImage, GrayImage, Luma};
/// use fichero::render::image::prepare;
///
/// let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(192, 100, Luma([0])));
/// let raster = prepare(&img, 240, true).unwrap();
/// assert_eq!((raster.width, raster.rows), (96, 50));
/// assert_eq!(raster.data.len(), 12 * 50);
/// ```
pub fn prepare(img: &DynamicImage, max_rows: u16, dither: bool) -> Result<Raster> {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Err(FicheroError::Image("image has no pixels".to_string()));
    }
    if max_rows == 0 {
        return Err(FicheroError::Image("label length must be at least one row".to_string()));
    }

    let new_h = ((h as f64 * PRINTHEAD_DOTS as f64 / w as f64).round() as u32).max(1);
    let mut resized = imageops::resize(&gray, PRINTHEAD_DOTS, new_h, FilterType::Lanczos3);
    debug!("Resized {}x{} → {}x{}", w, h, PRINTHEAD_DOTS, new_h);

    if new_h > max_rows as u32 {
        warn!(
            "Image height {}px exceeds max {}px, cropping bottom",
            new_h, max_rows
        );
        resized = imageops::crop_imm(&resized, 0, 0, PRINTHEAD_DOTS, max_rows as u32).to_image();
    }

    autocontrast(&mut resized, AUTOCONTRAST_CUTOFF_PERCENT);

    let mono = if dither {
        dither::floyd_steinberg(&resized)
    } else {
        resized
    };

    let rows = mono.height() as u16;
    let data = dither::pack_bits(&dither::to_bits(&mono), PRINTHEAD_DOTS as usize);
    Ok(Raster {
        width: PRINTHEAD_DOTS as u16,
        rows,
        data,
    })
}

/// Stretch the histogram so the darkest and lightest pixels (after
/// discarding `cutoff_percent` of the pixel count at each end) map to 0
/// and 255. A flat image is left untouched.
pub fn autocontrast(img: &mut GrayImage, cutoff_percent: u64) {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }
    let total: u64 = hist.iter().sum();

    let trim = total * cutoff_percent / 100;
    let mut cut = trim;
    for count in hist.iter_mut() {
        if cut > *count {
            cut -= *count;
            *count = 0;
        } else {
            *count -= cut;
            break;
        }
    }
    let mut cut = trim;
    for count in hist.iter_mut().rev() {
        if cut > *count {
            cut -= *count;
            *count = 0;
        } else {
            *count -= cut;
            break;
        }
    }

    let lo = hist.iter().position(|&c| c != 0);
    let hi = hist.iter().rposition(|&c| c != 0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo as i64, hi as i64),
        _ => return,
    };

    // Integer form of `i * 255 / (hi - lo) - lo * scale`, truncated.
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = ((i as i64 - lo) * 255 / (hi - lo)).clamp(0, 255) as u8;
    }
    for p in img.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
}

//! # Rendering Module
//!
//! Turns pictures and text into raster rows for the 96-dot printhead.
//!
//! ## Modules
//!
//! - [`image`]: Resize, autocontrast and pack any decoded image
//! - [`dither`]: Floyd–Steinberg error diffusion and bit packing
//! - [`text`]: Bitmap-font text labels
//!
//! ## Usage Example
//!
//! ```
//! use image::DynamicImage;
//! use fichero::render::{self, text};
//!
//! // Render a label 30mm long (240 dots) and pack it without dithering
//! let label = text::text_to_image("Hello", 30, 240).unwrap();
//! let raster = render::prepare(&DynamicImage::ImageLuma8(label), 240, false).unwrap();
//!
//! assert_eq!(raster.width, 96);
//! assert_eq!(raster.data.len(), raster.row_bytes() * raster.rows as usize);
//! ```

pub mod dither;
pub mod image;
pub mod text;

pub use self::image::{Raster, prepare};

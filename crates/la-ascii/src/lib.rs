/// ASCII conversion engine for lumascii.
///
/// Point-samples a pixel buffer on a fixed stride and quantizes each
/// sample's luminance to a glyph.
pub mod convert;
pub mod luminance;

pub use convert::{convert, convert_with, grid_dimensions};
pub use luminance::{GlyphTable, glyph_index, luminance};

/// Configuration, types, and shared structures for lumascii.
///
/// This crate contains the pixel and grid types, the conversion
/// configuration, and the error types shared across the workspace.

pub mod charset;
pub mod config;
pub mod error;
pub mod frame;

pub use charset::GlyphPreset;
pub use config::ConversionConfig;
pub use error::{CoreError, SourceError};
pub use frame::{CharacterGrid, FrameBuffer, PixelBuffer, PixelLayout};

use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Conversion configuration that the engine refuses to run with
    /// (empty glyph set, zero sparsity).
    #[error("Configuration invalide : {0}")]
    InvalidConfiguration(String),

    /// Pixel data shorter than the advertised dimensions require.
    #[error("Dimensions invalides : {width}×{height} ({len} octets, {expected} attendus)")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
        /// Bytes actually provided.
        len: usize,
        /// Bytes required by `width × height × bytes_per_pixel`.
        expected: usize,
    },

    /// Configuration file could not be read or parsed.
    #[error("Fichier de configuration invalide : {0}")]
    Config(String),
}

/// Failure of a frame source to produce a pixel buffer.
///
/// # Example
/// ```
/// use la_core::error::SourceError;
/// let err = SourceError::unavailable("decode failed");
/// assert_eq!(err.to_string(), "Source indisponible : decode failed");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source failed to decode or capture a buffer.
    #[error("Source indisponible : {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Shorthand for [`SourceError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

impl From<CoreError> for SourceError {
    fn from(err: CoreError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<anyhow::Error> for SourceError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain on a single line.
        Self::Unavailable(format!("{err:#}"))
    }
}

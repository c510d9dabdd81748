use std::fmt;

use crate::error::CoreError;

/// Disposition des canaux d'un pixel dans un buffer brut.
///
/// # Example
/// ```
/// use la_core::frame::PixelLayout;
/// assert_eq!(PixelLayout::Rgba.bytes_per_pixel(), 4);
/// assert_eq!(PixelLayout::Rgb.bytes_per_pixel(), 3);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 bytes per pixel: red, green, blue.
    Rgb,
    /// 4 bytes per pixel: red, green, blue, alpha.
    #[default]
    Rgba,
}

impl PixelLayout {
    /// Number of bytes occupied by one pixel.
    #[inline(always)]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Vue en lecture seule sur des pixels décodés, row-major.
///
/// Emprunte les octets du producteur : un consommateur ne peut pas la
/// conserver au-delà de l'appel qui la reçoit, et le producteur est libre
/// de réécrire sa surface dès que l'emprunt se termine.
///
/// # Example
/// ```
/// use la_core::frame::{PixelBuffer, PixelLayout};
/// let data = [255u8, 0, 0, 0, 255, 0];
/// let pixels = PixelBuffer::new(2, 1, PixelLayout::Rgb, &data).unwrap();
/// assert_eq!(pixels.rgb(1, 0), (0, 255, 0));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct PixelBuffer<'a> {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
    /// Wrap `data` as a `width × height` image in the given layout.
    ///
    /// Trailing bytes beyond the last pixel are ignored.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidDimensions`] if `data` is shorter than
    /// `width × height × bytes_per_pixel`.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::{PixelBuffer, PixelLayout};
    /// assert!(PixelBuffer::new(2, 2, PixelLayout::Rgba, &[0u8; 15]).is_err());
    /// assert!(PixelBuffer::new(0, 0, PixelLayout::Rgba, &[]).is_ok());
    /// ```
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: &'a [u8],
    ) -> Result<Self, CoreError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(layout.bytes_per_pixel()));
        match expected {
            Some(expected) if data.len() >= expected => Ok(Self {
                width,
                height,
                layout,
                data,
            }),
            _ => Err(CoreError::InvalidDimensions {
                width,
                height,
                len: data.len(),
                expected: expected.unwrap_or(usize::MAX),
            }),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout of the underlying bytes.
    #[must_use]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// `true` when the buffer holds no pixel at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Canaux rouge, vert, bleu du pixel (x, y). L'alpha n'est jamais lu.
    #[inline(always)]
    #[must_use]
    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = (y as usize * self.width as usize + x as usize) * self.layout.bytes_per_pixel();
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

/// Buffer de pixels réutilisable, possédé par la source de frames.
///
/// Stocke les pixels en RGBA row-major, 4 bytes par pixel.
///
/// # Example
/// ```
/// use la_core::frame::FrameBuffer;
/// let fb = FrameBuffer::new(10, 10);
/// assert_eq!(fb.data.len(), 400);
/// ```
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    /// Pixels RGBA, row-major, 4 bytes par pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Crée un buffer pré-alloué (noir transparent) aux dimensions données.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::new(100, 50);
    /// assert_eq!(fb.width, 100);
    /// assert_eq!(fb.height, 50);
    /// assert_eq!(fb.data.len(), 100 * 50 * 4);
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    /// Buffer uniforme, pratique pour les tests et les mires.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::filled(2, 2, (255, 255, 255));
    /// assert_eq!(&fb.data[12..16], &[255, 255, 255, 255]);
    /// ```
    #[must_use]
    pub fn filled(width: u32, height: u32, (r, g, b): (u8, u8, u8)) -> Self {
        let mut fb = Self::new(width, height);
        for px in fb.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
        fb
    }

    /// Écrit le pixel (x, y) en RGB opaque.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::FrameBuffer;
    /// let mut fb = FrameBuffer::new(2, 2);
    /// fb.set_rgb(1, 0, (10, 20, 30));
    /// assert_eq!(&fb.data[4..8], &[10, 20, 30, 255]);
    /// ```
    #[inline]
    pub fn set_rgb(&mut self, x: u32, y: u32, (r, g, b): (u8, u8, u8)) {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
    }

    /// Prête une vue [`PixelBuffer`] sur ce buffer.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidDimensions`] if `data` was truncated
    /// below `width × height × 4` bytes.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::new(3, 2);
    /// let view = fb.as_pixels().unwrap();
    /// assert_eq!((view.width(), view.height()), (3, 2));
    /// ```
    pub fn as_pixels(&self) -> Result<PixelBuffer<'_>, CoreError> {
        PixelBuffer::new(self.width, self.height, PixelLayout::Rgba, &self.data)
    }
}

/// Grille de caractères produite par une conversion, row-major.
///
/// Toutes les lignes ont la même longueur. Une grille vide n'a aucune
/// ligne (et aucune colonne).
///
/// # Example
/// ```
/// use la_core::frame::CharacterGrid;
/// let grid = CharacterGrid::from_fn(3, 2, |col, row| if (col + row) % 2 == 0 { '#' } else { '.' });
/// assert_eq!(grid.to_string(), "#.#\n.#.\n");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharacterGrid {
    /// Flat array of glyphs, row-major.
    cells: Vec<char>,
    /// Width in characters (columns).
    width: usize,
    /// Height in characters (rows).
    height: usize,
}

impl CharacterGrid {
    /// Crée une grille remplie d'espaces.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::CharacterGrid;
    /// let grid = CharacterGrid::new(80, 24);
    /// assert_eq!(grid.get(79, 23), Some(' '));
    /// ```
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::from_fn(width, height, |_, _| ' ')
    }

    /// Build a grid by evaluating `glyph(col, row)` for every cell, row by row.
    ///
    /// A zero width or height yields the empty grid.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut glyph: impl FnMut(usize, usize) -> char) -> Self {
        if width == 0 || height == 0 {
            return Self::default();
        }
        let mut cells = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                cells.push(glyph(col, row));
            }
        }
        Self {
            cells,
            width,
            height,
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `true` when the grid has zero rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.height == 0
    }

    /// Glyph at (col, row), or `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<char> {
        (col < self.width && row < self.height).then(|| self.cells[row * self.width + col])
    }

    /// Iterate over rows, top to bottom.
    ///
    /// # Example
    /// ```
    /// use la_core::frame::CharacterGrid;
    /// let grid = CharacterGrid::new(4, 3);
    /// assert_eq!(grid.rows().count(), 3);
    /// assert!(grid.rows().all(|row| row.len() == 4));
    /// ```
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[char]> {
        // chunks_exact(0) panique : une grille vide n'a pas de cellules de toute façon.
        self.cells.chunks_exact(self.width.max(1))
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    /// One `String` per row.
    #[must_use]
    pub fn to_lines(&self) -> Vec<String> {
        self.rows().map(|row| row.iter().collect()).collect()
    }
}

impl fmt::Display for CharacterGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for &ch in row {
                fmt::Write::write_char(f, ch)?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

use la_core::config::ConversionConfig;
use la_core::error::CoreError;

/// Luminance perceptuelle Rec. 601 : `0.299 R + 0.587 G + 0.114 B`, dans `[0, 255]`.
///
/// # Example
/// ```
/// use la_ascii::luminance::luminance;
/// assert_eq!(luminance(0, 0, 0), 0.0);
/// assert_eq!(luminance(255, 255, 255), 255.0);
/// ```
#[inline(always)]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// Index dans la séquence de glyphes *avant* inversion : 0 pour le noir,
/// `glyph_count - 1` pour le blanc.
///
/// `floor(L / 255 × (N − 1))`, borné à `[0, N − 1]`.
///
/// # Example
/// ```
/// use la_ascii::luminance::glyph_index;
/// assert_eq!(glyph_index(0.0, 10), 0);
/// assert_eq!(glyph_index(255.0, 10), 9);
/// assert_eq!(glyph_index(127.5, 3), 1);
/// ```
#[inline(always)]
#[must_use]
pub fn glyph_index(luminance: f64, glyph_count: usize) -> usize {
    let last = glyph_count.saturating_sub(1);
    let idx = ((luminance / 255.0) * last as f64).floor();
    // L == 255 peut déborder d'un cran après arrondi flottant.
    (idx.max(0.0) as usize).min(last)
}

/// Séquence de glyphes pré-découpée en `char`, pour un coût O(1) par pixel.
///
/// Les glyphes sont rangés du plus dense au plus clair. La recherche inverse
/// l'index de luminance : un pixel clair donne un glyphe dense, pour un
/// affichage sur fond sombre.
///
/// # Example
/// ```
/// use la_ascii::luminance::GlyphTable;
/// let table = GlyphTable::new("@%#*+=-:. ").unwrap();
/// assert_eq!(table.glyph_for(255.0), '@');
/// assert_eq!(table.glyph_for(0.0), ' ');
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphTable {
    glyphs: Vec<char>,
}

impl GlyphTable {
    /// Build a table from a dense-to-sparse glyph sequence.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfiguration`] if `characters` is empty.
    pub fn new(characters: &str) -> Result<Self, CoreError> {
        let glyphs: Vec<char> = characters.chars().collect();
        if glyphs.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "le jeu de caractères est vide".to_string(),
            ));
        }
        Ok(Self { glyphs })
    }

    /// Validate `config` and build the table for its glyph sequence.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfiguration`] if the config is invalid.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Self::new(&config.characters)
    }

    /// Number of glyphs. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Always `false`: construction rejects empty sequences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Glyph for a luminance value in `[0, 255]`.
    #[inline(always)]
    #[must_use]
    pub fn glyph_for(&self, luminance: f64) -> char {
        let n = self.glyphs.len();
        let idx = glyph_index(luminance, n);
        self.glyphs[n - 1 - idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_hits_last_index_for_every_palette_size() {
        let white = luminance(255, 255, 255);
        for n in 1..=128 {
            assert_eq!(glyph_index(white, n), n - 1, "palette de {n} glyphes");
        }
    }

    #[test]
    fn out_of_range_luminance_is_clamped() {
        assert_eq!(glyph_index(300.0, 4), 3);
        assert_eq!(glyph_index(-12.0, 4), 0);
        assert_eq!(glyph_index(f64::NAN, 4), 0);
    }

    #[test]
    fn index_is_monotonic_in_luminance() {
        let mut prev = 0;
        for step in 0..=2550 {
            let idx = glyph_index(f64::from(step) / 10.0, 10);
            assert!(idx >= prev, "index non monotone à L = {}", f64::from(step) / 10.0);
            prev = idx;
        }
    }

    #[test]
    fn channel_weights() {
        assert!((luminance(255, 0, 0) - 76.245).abs() < 1e-9);
        assert!((luminance(0, 255, 0) - 149.685).abs() < 1e-9);
        assert!((luminance(0, 0, 255) - 29.07).abs() < 1e-9);
    }

    #[test]
    fn table_inverts_index() {
        let table = GlyphTable::new("#.").unwrap();
        assert_eq!(table.glyph_for(0.0), '.');
        assert_eq!(table.glyph_for(255.0), '#');
        assert_eq!(table.glyph_for(254.0), '.');
    }

    #[test]
    fn single_glyph_table() {
        let table = GlyphTable::new("x").unwrap();
        assert_eq!(table.glyph_for(0.0), 'x');
        assert_eq!(table.glyph_for(255.0), 'x');
    }

    #[test]
    fn empty_table_is_invalid() {
        assert!(matches!(
            GlyphTable::new(""),
            Err(CoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn multibyte_glyphs_are_single_entries() {
        let table = GlyphTable::new("█▓▒░ ").unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.glyph_for(255.0), '█');
    }
}

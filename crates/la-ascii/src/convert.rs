use la_core::config::ConversionConfig;
use la_core::error::CoreError;
use la_core::frame::{CharacterGrid, PixelBuffer};

use crate::luminance::{GlyphTable, luminance};

/// Dimensions `(colonnes, lignes)` de la grille produite pour une image
/// `width × height` échantillonnée au pas `sparsity`.
///
/// La dernière cellule partielle compte : `ceil(width / sparsity)`.
///
/// # Example
/// ```
/// use la_ascii::convert::grid_dimensions;
/// assert_eq!(grid_dimensions(10, 4, 3), (4, 2));
/// assert_eq!(grid_dimensions(0, 4, 3), (0, 2));
/// ```
#[must_use]
pub fn grid_dimensions(width: u32, height: u32, sparsity: u32) -> (usize, usize) {
    let step = sparsity.max(1);
    (width.div_ceil(step) as usize, height.div_ceil(step) as usize)
}

/// Convertit un buffer de pixels en grille de caractères.
///
/// Échantillonne le pixel en haut à gauche de chaque cellule
/// `sparsity × sparsity`, sans moyenne. Fonction pure : mêmes entrées,
/// même grille. Le buffer n'est lu que pendant l'appel.
///
/// # Errors
/// Returns [`CoreError::InvalidConfiguration`] if `config.sparsity` is zero
/// or `config.characters` is empty. A buffer with no pixel is not an error:
/// it yields the empty grid.
///
/// # Example
/// ```
/// use la_core::config::ConversionConfig;
/// use la_core::frame::FrameBuffer;
/// use la_ascii::convert::convert;
///
/// let frame = FrameBuffer::filled(4, 4, (255, 255, 255));
/// let grid = convert(&frame.as_pixels().unwrap(), &ConversionConfig::new(2, "#.")).unwrap();
/// assert_eq!(grid.to_string(), "##\n##\n");
/// ```
pub fn convert(
    buffer: &PixelBuffer<'_>,
    config: &ConversionConfig,
) -> Result<CharacterGrid, CoreError> {
    let table = GlyphTable::from_config(config)?;
    convert_with(buffer, config.sparsity, &table)
}

/// Same as [`convert`], with a glyph table built once by the caller.
///
/// # Errors
/// Returns [`CoreError::InvalidConfiguration`] if `sparsity` is zero.
pub fn convert_with(
    buffer: &PixelBuffer<'_>,
    sparsity: u32,
    table: &GlyphTable,
) -> Result<CharacterGrid, CoreError> {
    if sparsity < 1 {
        return Err(CoreError::InvalidConfiguration(
            "sparsity doit être ≥ 1 (reçu 0)".to_string(),
        ));
    }
    if buffer.is_empty() {
        return Ok(CharacterGrid::default());
    }

    let (cols, rows) = grid_dimensions(buffer.width(), buffer.height(), sparsity);
    log::trace!(
        "convert: {}×{} pas {sparsity} → {cols}×{rows}",
        buffer.width(),
        buffer.height()
    );

    Ok(CharacterGrid::from_fn(cols, rows, |col, row| {
        // col × sparsity < width par construction de `cols`.
        let x = col as u32 * sparsity;
        let y = row as u32 * sparsity;
        let (r, g, b) = buffer.rgb(x, y);
        table.glyph_for(luminance(r, g, b))
    }))
}

#[cfg(test)]
mod tests {
    use la_core::frame::{FrameBuffer, PixelLayout};

    use super::*;

    fn gradient(width: u32, height: u32) -> FrameBuffer {
        let mut fb = FrameBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 7 + y * 13) % 256) as u8;
                fb.set_rgb(x, y, (v, v.wrapping_mul(3), 255 - v));
            }
        }
        fb
    }

    #[test]
    fn two_by_two_scenario() {
        // Colonne 0 noire, colonne 2 blanche ; colonnes impaires jamais lues.
        let mut fb = FrameBuffer::new(4, 4);
        for y in 0..4 {
            fb.set_rgb(0, y, (0, 0, 0));
            fb.set_rgb(1, y, (255, 255, 255));
            fb.set_rgb(2, y, (255, 255, 255));
            fb.set_rgb(3, y, (0, 0, 0));
        }
        let grid = convert(&fb.as_pixels().unwrap(), &ConversionConfig::new(2, "#.")).unwrap();
        assert_eq!((grid.width(), grid.height()), (2, 2));
        assert_eq!(grid.to_lines(), vec![".#".to_string(), ".#".to_string()]);
    }

    #[test]
    fn dimension_law() {
        for (w, h) in [(1, 1), (4, 4), (5, 3), (17, 9), (64, 1)] {
            let fb = gradient(w, h);
            for s in 1..=6 {
                let grid =
                    convert(&fb.as_pixels().unwrap(), &ConversionConfig::new(s, "@%#*+=-:. "))
                        .unwrap();
                assert_eq!(grid.height(), h.div_ceil(s) as usize, "{w}x{h} pas {s}");
                assert_eq!(grid.width(), w.div_ceil(s) as usize, "{w}x{h} pas {s}");
                assert!(grid.rows().all(|r| r.len() == grid.width()));
            }
        }
    }

    #[test]
    fn deterministic() {
        let fb = gradient(33, 21);
        let config = ConversionConfig::new(3, "@%#*+=-:. ");
        let a = convert(&fb.as_pixels().unwrap(), &config).unwrap();
        let b = convert(&fb.as_pixels().unwrap(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn boundary_luminance() {
        let config = ConversionConfig::default();
        let black = FrameBuffer::filled(9, 9, (0, 0, 0));
        let white = FrameBuffer::filled(9, 9, (255, 255, 255));
        let dark = convert(&black.as_pixels().unwrap(), &config).unwrap();
        let bright = convert(&white.as_pixels().unwrap(), &config).unwrap();
        assert!(dark.cells().iter().all(|&c| c == ' '));
        assert!(bright.cells().iter().all(|&c| c == '@'));
    }

    #[test]
    fn single_glyph_degeneracy() {
        let fb = gradient(20, 20);
        let grid = convert(&fb.as_pixels().unwrap(), &ConversionConfig::new(1, "x")).unwrap();
        assert!(grid.cells().iter().all(|&c| c == 'x'));
        assert_eq!(grid.cells().len(), 400);
    }

    #[test]
    fn brighter_is_never_sparser() {
        let glyphs: Vec<char> = "@%#*+=-:. ".chars().collect();
        let config = ConversionConfig::new(1, "@%#*+=-:. ");
        let mut fb = FrameBuffer::new(256, 1);
        for v in 0..=255u8 {
            fb.set_rgb(u32::from(v), 0, (v, v, v));
        }
        let grid = convert(&fb.as_pixels().unwrap(), &config).unwrap();
        let authored: Vec<usize> = grid
            .cells()
            .iter()
            .map(|c| glyphs.iter().position(|g| g == c).unwrap())
            .collect();
        assert!(authored.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn alpha_is_ignored() {
        let opaque = FrameBuffer::filled(2, 2, (200, 10, 90));
        let mut translucent = opaque.clone();
        for px in translucent.data.chunks_exact_mut(4) {
            px[3] = 0;
        }
        let config = ConversionConfig::default();
        assert_eq!(
            convert(&opaque.as_pixels().unwrap(), &config).unwrap(),
            convert(&translucent.as_pixels().unwrap(), &config).unwrap()
        );
    }

    #[test]
    fn rgb_layout_matches_rgba() {
        let fb = gradient(8, 8);
        let rgb: Vec<u8> = fb
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        let view = PixelBuffer::new(8, 8, PixelLayout::Rgb, &rgb).unwrap();
        let config = ConversionConfig::new(2, "@%#*+=-:. ");
        assert_eq!(
            convert(&view, &config).unwrap(),
            convert(&fb.as_pixels().unwrap(), &config).unwrap()
        );
    }

    #[test]
    fn empty_buffer_gives_empty_grid() {
        let config = ConversionConfig::default();
        for (w, h) in [(0, 0), (0, 5), (5, 0)] {
            let view = PixelBuffer::new(w, h, PixelLayout::Rgba, &[]).unwrap();
            assert!(convert(&view, &config).unwrap().is_empty());
        }
    }

    #[test]
    fn invalid_configuration_fails_even_on_empty_buffer() {
        let view = PixelBuffer::new(0, 0, PixelLayout::Rgba, &[]).unwrap();
        assert!(matches!(
            convert(&view, &ConversionConfig::new(0, "#.")),
            Err(CoreError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            convert(&view, &ConversionConfig::new(1, "")),
            Err(CoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn convert_with_reuses_table() {
        let fb = gradient(12, 12);
        let config = ConversionConfig::new(4, "@%#*+=-:. ");
        let table = GlyphTable::from_config(&config).unwrap();
        assert_eq!(
            convert_with(&fb.as_pixels().unwrap(), 4, &table).unwrap(),
            convert(&fb.as_pixels().unwrap(), &config).unwrap()
        );
        assert!(convert_with(&fb.as_pixels().unwrap(), 0, &table).is_err());
    }
}

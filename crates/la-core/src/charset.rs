use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 10 caractères, le jeu par défaut, du plus dense au plus clair.
pub const CHARSET_DEFAULT: &str = "@%#*+=-:. ";

/// Blocs Unicode de largeur décroissante.
pub const CHARSET_DENSE: &str = "█▉▊▋▌▍▎▏ ";

/// Ombrages Unicode, haut contraste.
pub const CHARSET_SIMPLE: &str = "█▓▒░ ";

/// Variante classique sans `%`.
pub const CHARSET_CLASSIC: &str = "@#*+=-:. ";

/// Built-in glyph sequences, all authored dense-to-sparse.
///
/// # Example
/// ```
/// use la_core::charset::GlyphPreset;
/// let preset: GlyphPreset = "simple".parse().unwrap();
/// assert_eq!(preset.glyphs(), "█▓▒░ ");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlyphPreset {
    /// `@%#*+=-:. `
    #[default]
    Default,
    /// Partial block elements.
    Dense,
    /// Shade blocks.
    Simple,
    /// `@#*+=-:. `
    Classic,
}

impl GlyphPreset {
    /// Every preset, in menu order.
    pub const ALL: [Self; 4] = [Self::Default, Self::Dense, Self::Simple, Self::Classic];

    /// The glyph sequence of this preset.
    #[must_use]
    pub const fn glyphs(self) -> &'static str {
        match self {
            Self::Default => CHARSET_DEFAULT,
            Self::Dense => CHARSET_DENSE,
            Self::Simple => CHARSET_SIMPLE,
            Self::Classic => CHARSET_CLASSIC,
        }
    }

    /// Lowercase name, as accepted by [`FromStr`] and the config file.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dense => "dense",
            Self::Simple => "simple",
            Self::Classic => "classic",
        }
    }
}

impl fmt::Display for GlyphPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GlyphPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("preset inconnu '{s}' (attendu : default, dense, simple, classic)")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_end_with_blank() {
        for preset in GlyphPreset::ALL {
            assert_eq!(preset.glyphs().chars().last(), Some(' '), "{preset}");
        }
    }

    #[test]
    fn preset_names_round_trip() {
        for preset in GlyphPreset::ALL {
            assert_eq!(preset.name().parse::<GlyphPreset>(), Ok(preset));
        }
        assert_eq!("Dense".parse::<GlyphPreset>(), Ok(GlyphPreset::Dense));
        assert!("braille".parse::<GlyphPreset>().is_err());
    }

    #[test]
    fn dense_preset_has_nine_glyphs() {
        assert_eq!(CHARSET_DENSE.chars().count(), 9);
        assert_eq!(CHARSET_SIMPLE.chars().count(), 5);
    }
}

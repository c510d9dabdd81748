use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::charset::GlyphPreset;
use crate::error::CoreError;

/// Bornes du curseur `font_size` de l'interface d'origine.
pub const FONT_SIZE_RANGE: (f32, f32) = (4.0, 20.0);

/// Au-delà, la grille devient trop pauvre pour être lisible. Simple avertissement.
pub const SPARSITY_SOFT_MAX: u32 = 10;

/// Paramètres d'une conversion image → grille de caractères.
///
/// Valeur immuable, passée explicitement à chaque appel du moteur.
///
/// # Example
/// ```
/// use la_core::config::ConversionConfig;
/// let config = ConversionConfig::default();
/// assert_eq!(config.sparsity, 4);
/// assert_eq!(config.characters, "@%#*+=-:. ");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Pas d'échantillonnage en pixels, sur les deux axes. Doit être ≥ 1.
    pub sparsity: u32,
    /// Glyphes du plus dense au plus clair. Doit être non vide.
    pub characters: String,
    /// Taille de police suggérée au rendu. Ignorée par le moteur.
    pub font_size: f32,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sparsity: 4,
            characters: GlyphPreset::Default.glyphs().to_string(),
            font_size: 8.0,
        }
    }
}

impl ConversionConfig {
    /// Config with the given stride and glyphs, default font size.
    ///
    /// # Example
    /// ```
    /// use la_core::config::ConversionConfig;
    /// let config = ConversionConfig::new(2, "#.");
    /// assert_eq!(config.glyph_count(), 2);
    /// ```
    #[must_use]
    pub fn new(sparsity: u32, characters: impl Into<String>) -> Self {
        Self {
            sparsity,
            characters: characters.into(),
            ..Self::default()
        }
    }

    /// Number of glyphs (Unicode scalar values) in `characters`.
    #[must_use]
    pub fn glyph_count(&self) -> usize {
        self.characters.chars().count()
    }

    /// Check the invariants the conversion engine relies on.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfiguration`] if `sparsity` is zero or
    /// `characters` is empty.
    ///
    /// # Example
    /// ```
    /// use la_core::config::ConversionConfig;
    /// assert!(ConversionConfig::new(0, "#.").validate().is_err());
    /// assert!(ConversionConfig::new(1, "").validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.sparsity < 1 {
            return Err(CoreError::InvalidConfiguration(format!(
                "sparsity doit être ≥ 1 (reçu {})",
                self.sparsity
            )));
        }
        if self.characters.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "le jeu de caractères est vide".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp the presentation-only fields to their valid ranges.
    /// Called after TOML deserialization. `sparsity` is validated, not clamped.
    pub fn clamp_all(&mut self) {
        if !self.font_size.is_finite() {
            self.font_size = Self::default().font_size;
        }
        self.font_size = self.font_size.clamp(FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1);
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    conversion: Option<ConversionSection>,
}

/// Conversion section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConversionSection {
    // Signé pour pouvoir signaler `sparsity = -1` comme configuration invalide
    // plutôt que comme erreur de parsing.
    sparsity: Option<i64>,
    characters: Option<String>,
    preset: Option<GlyphPreset>,
    font_size: Option<f32>,
}

/// Parse un document TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the document is not valid TOML, has unknown keys, or
/// describes an invalid configuration.
///
/// # Example
/// ```
/// use la_core::config::parse_config;
/// let config = parse_config("[conversion]\nsparsity = 2\npreset = \"classic\"").unwrap();
/// assert_eq!(config.sparsity, 2);
/// assert_eq!(config.characters, "@#*+=-:. ");
/// ```
pub fn parse_config(content: &str) -> Result<ConversionConfig> {
    let file: ConfigFile = toml::from_str(content)
        .map_err(|e| CoreError::Config(e.message().to_string()))?;

    let mut config = ConversionConfig::default();

    if let Some(c) = file.conversion {
        if let Some(v) = c.sparsity {
            config.sparsity = u32::try_from(v).map_err(|_| {
                let why = if v < 1 {
                    format!("sparsity doit être ≥ 1 (reçu {v})")
                } else {
                    format!("sparsity hors limites (reçu {v}, maximum {})", u32::MAX)
                };
                CoreError::InvalidConfiguration(why)
            })?;
        }
        if let Some(v) = c.preset {
            config.characters = v.glyphs().to_string();
        }
        // `characters` explicite l'emporte sur `preset`.
        if let Some(v) = c.characters {
            config.characters = v;
        }
        if let Some(v) = c.font_size {
            config.font_size = v;
        }
    }

    config.clamp_all();
    config.validate()?;
    if config.sparsity > SPARSITY_SOFT_MAX {
        log::warn!(
            "sparsity = {} dépasse {SPARSITY_SOFT_MAX} : la grille sera très grossière",
            config.sparsity
        );
    }
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if the
/// resulting configuration is invalid.
///
/// # Example
/// ```no_run
/// use la_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<ConversionConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Configuration rejetée : {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(parse_config("").unwrap(), ConversionConfig::default());
    }

    #[test]
    fn characters_override_preset() {
        let config =
            parse_config("[conversion]\npreset = \"dense\"\ncharacters = \"#.\"").unwrap();
        assert_eq!(config.characters, "#.");
    }

    #[test]
    fn zero_or_negative_sparsity_is_invalid_configuration() {
        for doc in ["[conversion]\nsparsity = 0", "[conversion]\nsparsity = -3"] {
            let err = parse_config(doc).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<CoreError>(),
                    Some(CoreError::InvalidConfiguration(_))
                ),
                "{doc}: {err:#}"
            );
        }
    }

    #[test]
    fn oversized_sparsity_reports_range() {
        let err = parse_config("[conversion]\nsparsity = 5000000000").unwrap_err();
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("hors limites"), "{msg}");
                assert!(!msg.contains("≥ 1"), "{msg}");
            }
            other => panic!("InvalidConfiguration attendu, reçu {other:?}"),
        }
    }

    #[test]
    fn empty_characters_are_rejected() {
        let err = parse_config("[conversion]\ncharacters = \"\"").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn unknown_keys_are_config_errors() {
        let err = parse_config("[conversion]\nglow = 5").unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::Config(_))));
    }

    #[test]
    fn font_size_is_clamped() {
        let config = parse_config("[conversion]\nfont_size = 99.0").unwrap();
        assert!((config.font_size - FONT_SIZE_RANGE.1).abs() < f32::EPSILON);
        let config = parse_config("[conversion]\nfont_size = 1.0").unwrap();
        assert!((config.font_size - FONT_SIZE_RANGE.0).abs() < f32::EPSILON);
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[conversion]\nsparsity = 7\ncharacters = \"X \"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.sparsity, 7);
        assert_eq!(config.characters, "X ");
    }

    #[test]
    fn load_config_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }
}

use std::path::PathBuf;

use clap::Parser;
use la_core::charset::GlyphPreset;
use la_core::config::ConversionConfig;

/// lumascii : images et vidéos en art ASCII, en temps réel.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source visuelle : chemin vers une image (PNG, JPEG, BMP, GIF).
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Source visuelle : chemin vers une vidéo. Requiert --features video.
    #[arg(long)]
    pub video: Option<PathBuf>,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Jeu de caractères intégré : default, dense, simple, classic.
    #[arg(long)]
    pub preset: Option<GlyphPreset>,

    /// Pas d'échantillonnage en pixels (≥ 1).
    #[arg(long)]
    pub sparsity: Option<u32>,

    /// Glyphes du plus dense au plus clair (prioritaire sur --preset).
    #[arg(long)]
    pub characters: Option<String>,

    /// Taille de police suggérée (4–20). Sans effet dans un terminal.
    #[arg(long)]
    pub font_size: Option<f32>,

    /// Garder la session ouverte et reconvertir quand la config change.
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Vidéo : rejouer depuis le début à la fin du flux.
    #[arg(long = "loop", default_value_t = false)]
    pub looping: bool,

    /// Vidéo : s'arrêter après la première frame affichée.
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Paramètres passés en ligne de commande, réappliqués à chaque rechargement
/// du fichier de configuration.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub preset: Option<GlyphPreset>,
    pub sparsity: Option<u32>,
    pub characters: Option<String>,
    pub font_size: Option<f32>,
}

impl Overrides {
    /// Apply the overrides on top of `config`. `characters` wins over `preset`.
    ///
    /// # Example
    /// ```
    /// use la_app::cli::Overrides;
    /// use la_core::config::ConversionConfig;
    /// let overrides = Overrides { sparsity: Some(1), ..Overrides::default() };
    /// let mut config = ConversionConfig::default();
    /// overrides.apply(&mut config);
    /// assert_eq!(config.sparsity, 1);
    /// ```
    pub fn apply(&self, config: &mut ConversionConfig) {
        if let Some(preset) = self.preset {
            config.characters = preset.glyphs().to_string();
        }
        if let Some(ref characters) = self.characters {
            config.characters.clone_from(characters);
        }
        if let Some(sparsity) = self.sparsity {
            config.sparsity = sparsity;
        }
        if let Some(font_size) = self.font_size {
            config.font_size = font_size;
        }
        config.clamp_all();
    }
}

impl Cli {
    /// Validate that exactly one visual source is provided.
    ///
    /// # Errors
    /// Returns an error if zero or more than one source is specified.
    pub fn validate_source(&self) -> anyhow::Result<()> {
        let count = usize::from(self.image.is_some()) + usize::from(self.video.is_some());

        if count == 0 {
            anyhow::bail!("Aucune source visuelle spécifiée. Utilisez --image ou --video.");
        }
        if count > 1 {
            anyhow::bail!("Une seule source visuelle à la fois. Spécifiez --image OU --video.");
        }
        Ok(())
    }

    /// CLI parameters that override the config file.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            preset: self.preset,
            sparsity: self.sparsity,
            characters: self.characters.clone(),
            font_size: self.font_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_source_is_required() {
        let cli = Cli::parse_from(["lumascii"]);
        assert!(cli.validate_source().is_err());
        let cli = Cli::parse_from(["lumascii", "--image", "a.png", "--video", "b.mp4"]);
        assert!(cli.validate_source().is_err());
        let cli = Cli::parse_from(["lumascii", "--image", "a.png"]);
        assert!(cli.validate_source().is_ok());
    }

    #[test]
    fn preset_flag_parses() {
        let cli = Cli::parse_from(["lumascii", "--image", "a.png", "--preset", "dense"]);
        assert_eq!(cli.preset, Some(GlyphPreset::Dense));
        assert!(Cli::try_parse_from(["lumascii", "--preset", "braille"]).is_err());
    }

    #[test]
    fn characters_override_preset() {
        let cli = Cli::parse_from([
            "lumascii",
            "--image",
            "a.png",
            "--preset",
            "simple",
            "--characters",
            "#.",
            "--sparsity",
            "0",
        ]);
        let mut config = ConversionConfig::default();
        cli.overrides().apply(&mut config);
        assert_eq!(config.characters, "#.");
        // Une sparsity nulle passe ici ; la validation la rejette ensuite.
        assert_eq!(config.sparsity, 0);
        assert!(config.validate().is_err());
    }
}

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use la_core::config::ConversionConfig;
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::cli::Overrides;

/// Relit `path`, réapplique les overrides CLI et publie la config si elle est valide.
///
/// Retourne `true` si une nouvelle config a été publiée. En cas d'erreur,
/// l'ancienne config reste en place.
pub fn reload(path: &Path, overrides: &Overrides, config: &ArcSwap<ConversionConfig>) -> bool {
    let loaded = la_core::config::load_config(path).and_then(|mut new_config| {
        overrides.apply(&mut new_config);
        new_config.validate()?;
        Ok(new_config)
    });
    match loaded {
        Ok(new_config) => {
            config.store(Arc::new(new_config));
            log::info!("Config rechargée depuis {}", path.display());
            true
        }
        Err(e) => {
            log::warn!("Erreur de rechargement config : {e:#}");
            false
        }
    }
}

/// Lance un thread qui surveille le fichier config et met à jour l'ArcSwap.
///
/// Retourne le Watcher (doit rester vivant tant que l'app tourne).
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use arc_swap::ArcSwap;
/// use la_app::cli::Overrides;
/// use la_app::hotreload::spawn_config_watcher;
/// use la_core::config::ConversionConfig;
/// use std::path::Path;
///
/// let config = Arc::new(ArcSwap::from_pointee(ConversionConfig::default()));
/// let _watcher = spawn_config_watcher(Path::new("config/default.toml"), Overrides::default(), &config);
/// ```
pub fn spawn_config_watcher(
    config_path: &Path,
    overrides: Overrides,
    config: &Arc<ArcSwap<ConversionConfig>>,
) -> Result<impl Watcher + use<>> {
    let config = Arc::clone(config);
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_))
        {
            reload(&path, &overrides, &config);
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_publishes_valid_config_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumascii.toml");
        std::fs::write(&path, "[conversion]\nsparsity = 6\ncharacters = \"#.\"").unwrap();

        let config = ArcSwap::from_pointee(ConversionConfig::default());
        let overrides = Overrides {
            sparsity: Some(3),
            ..Overrides::default()
        };
        assert!(reload(&path, &overrides, &config));
        assert_eq!(config.load().sparsity, 3);
        assert_eq!(config.load().characters, "#.");
    }

    #[test]
    fn invalid_reload_keeps_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumascii.toml");
        std::fs::write(&path, "[conversion]\nsparsity = 0").unwrap();

        let config = ArcSwap::from_pointee(ConversionConfig::new(5, "ab"));
        assert!(!reload(&path, &Overrides::default(), &config));
        assert_eq!(**config.load(), ConversionConfig::new(5, "ab"));
    }

    #[test]
    fn override_producing_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumascii.toml");
        std::fs::write(&path, "").unwrap();

        let config = ArcSwap::from_pointee(ConversionConfig::default());
        let overrides = Overrides {
            characters: Some(String::new()),
            ..Overrides::default()
        };
        assert!(!reload(&path, &overrides, &config));
        assert_eq!(**config.load(), ConversionConfig::default());
    }
}

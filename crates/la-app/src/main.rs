use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use arc_swap::ArcSwap;
use clap::Parser;
use la_app::cli::Cli;
use la_app::host::{self, HostOptions, Session};
use la_app::hotreload;
use la_app::terminal::{DisplayMode, TerminalGuard, TerminalRenderer};
use la_core::config::ConversionConfig;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Valider la source
    cli.validate_source()?;

    // 4. Charger la config + overrides CLI
    let config = resolve_config(&cli)?;
    let config = Arc::new(ArcSwap::from_pointee(config));

    // 5. Hot-reload (seulement si la session reste ouverte)
    let _watcher = if cli.watch && cli.config.exists() {
        Some(hotreload::spawn_config_watcher(
            &cli.config,
            cli.overrides(),
            &config,
        )?)
    } else {
        None
    };

    // 6. Arrêt propre sur Ctrl+C (hors mode raw)
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::Relaxed)) {
            log::warn!("Handler Ctrl+C non installé : {e}");
        }
    }

    // 7. Terminal : animé pour la vidéo et --watch, texte brut sinon
    let animated = io::stdout().is_terminal() && (cli.video.is_some() || cli.watch);
    let display = if animated {
        DisplayMode::Animated
    } else {
        DisplayMode::Plain
    };
    let _guard = if animated {
        Some(TerminalGuard::enter()?)
    } else {
        None
    };

    let mut renderer = TerminalRenderer::new(io::stdout(), display);
    renderer.note_font_size(config.load().font_size);
    let mut session = Session::new(Arc::clone(&config), renderer);

    let options = HostOptions {
        watch: cli.watch,
        once: cli.once,
        looping: cli.looping,
        interactive: animated,
    };

    // 8. Boucle hôte
    if let Some(ref path) = cli.image {
        host::run_image(&mut session, path, options, &running)
    } else if let Some(ref path) = cli.video {
        run_video(&mut session, path, options, &running)
    } else {
        Ok(())
    }
}

#[cfg(feature = "video")]
fn run_video<W: io::Write>(
    session: &mut Session<TerminalRenderer<W>>,
    path: &std::path::Path,
    options: HostOptions,
    running: &AtomicBool,
) -> Result<()> {
    host::run_video(session, path, options, running)
}

#[cfg(not(feature = "video"))]
fn run_video<W: io::Write>(
    _session: &mut Session<TerminalRenderer<W>>,
    path: &std::path::Path,
    _options: HostOptions,
    _running: &AtomicBool,
) -> Result<()> {
    anyhow::bail!(
        "Lecture vidéo non disponible ({}) : recompilez avec --features video",
        path.display()
    )
}

/// Charge la config (défauts si le fichier est absent), applique les
/// overrides CLI et refuse une config invalide.
fn resolve_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut config = if cli.config.exists() {
        la_core::config::load_config(&cli.config)?
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        ConversionConfig::default()
    };
    cli.overrides().apply(&mut config);
    config.validate()?;
    Ok(config)
}

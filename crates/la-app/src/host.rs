use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use arc_swap::ArcSwap;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use la_core::config::ConversionConfig;
use la_core::error::SourceError;
use la_core::frame::FrameBuffer;
use la_sched::{Renderer, Scheduler, SchedulerError, SourceId, SourceKind, Step};

/// Intervalle de scrutation de la boucle hôte (clavier, config, arrêt).
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Action demandée au clavier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Quitter la session.
    Quit,
    /// Basculer lecture / pause (vidéo).
    TogglePause,
}

/// Traduit une touche en action. `q`, `Esc` et `Ctrl+C` quittent, espace
/// bascule la pause.
///
/// # Example
/// ```
/// use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
/// use la_app::host::{control_for_key, Control};
/// let key = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
/// assert_eq!(control_for_key(&key), Some(Control::TogglePause));
/// ```
#[must_use]
pub fn control_for_key(key: &KeyEvent) -> Option<Control> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Control::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Control::Quit),
        KeyCode::Char(' ') => Some(Control::TogglePause),
        _ => None,
    }
}

/// Attend au plus `timeout` une action clavier (mode interactif), sinon dort.
fn poll_control(interactive: bool, timeout: Duration) -> Result<Option<Control>> {
    if !interactive {
        thread::sleep(timeout);
        return Ok(None);
    }
    if event::poll(timeout)?
        && let Event::Key(key) = event::read()?
    {
        return Ok(control_for_key(&key));
    }
    Ok(None)
}

/// Comportement de la session hôte.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostOptions {
    /// Rester ouvert et reconvertir à chaque changement de config.
    pub watch: bool,
    /// Vidéo : quitter après la première grille rendue.
    pub once: bool,
    /// Vidéo : reboucler à la fin du flux.
    pub looping: bool,
    /// Lire le clavier via crossterm (terminal en mode raw).
    pub interactive: bool,
}

/// Le scheduler et la config partagée avec le watcher.
pub struct Session<R: Renderer> {
    scheduler: Scheduler<R>,
    config: Arc<ArcSwap<ConversionConfig>>,
    applied: Arc<ConversionConfig>,
}

impl<R: Renderer> Session<R> {
    /// Session démarrant avec la config actuellement publiée.
    pub fn new(config: Arc<ArcSwap<ConversionConfig>>, renderer: R) -> Self {
        let applied = config.load_full();
        let scheduler = Scheduler::new(ConversionConfig::clone(&applied), renderer);
        Self {
            scheduler,
            config,
            applied,
        }
    }

    /// Accès au scheduler (état, stats).
    pub fn scheduler(&self) -> &Scheduler<R> {
        &self.scheduler
    }

    /// Copie la config publiée dans le scheduler si elle a changé.
    /// Retourne `true` en cas de changement.
    pub fn sync_config(&mut self) -> bool {
        let current = self.config.load_full();
        if Arc::ptr_eq(&current, &self.applied) {
            return false;
        }
        self.scheduler.set_config(ConversionConfig::clone(&current));
        self.applied = current;
        true
    }

    /// Passe le résultat d'un décodage d'image au scheduler.
    ///
    /// # Errors
    /// See [`Scheduler::on_image_ready`].
    pub fn convert_image(
        &mut self,
        id: SourceId,
        decoded: &Result<Arc<FrameBuffer>, SourceError>,
    ) -> Result<Step, SchedulerError> {
        let pixels = match decoded {
            Ok(frame) => frame.as_pixels().map_err(SourceError::from),
            Err(e) => Err(e.clone()),
        };
        self.scheduler.on_image_ready(id, pixels)
    }

    /// Reconvertit l'image déjà décodée sous une nouvelle identité de source.
    fn reconvert_image(&mut self, decoded: &Result<Arc<FrameBuffer>, SourceError>) {
        let id = self.scheduler.on_source_changed(SourceKind::Image);
        if let Err(e) = self.convert_image(id, decoded) {
            log::warn!("Reconversion impossible : {e}");
        }
    }

    fn log_stats(&self) {
        let stats = self.scheduler.stats();
        log::info!(
            "Session terminée : {} grilles, {} frames ignorées, {} résultats obsolètes, {} échecs",
            stats.converted,
            stats.dropped,
            stats.discarded,
            stats.failed
        );
    }
}

/// Convertit une image, puis en mode `watch` reconvertit à chaque
/// changement de config jusqu'à l'arrêt.
///
/// # Errors
/// Returns an error if the decoder cannot start, or if the first
/// conversion fails (unreadable image, invalid configuration).
pub fn run_image<R: Renderer>(
    session: &mut Session<R>,
    path: &Path,
    options: HostOptions,
    running: &AtomicBool,
) -> Result<()> {
    let id = session.scheduler.on_source_changed(SourceKind::Image);
    let rx = la_source::image::spawn_image_decoder(path.to_path_buf())?;
    let decoded = rx
        .recv()
        .map_err(|_| anyhow!("Thread de décodage interrompu"))?;

    session.sync_config();
    session.convert_image(id, &decoded)?;

    if options.watch {
        log::info!("Surveillance de la config active. q ou Ctrl+C pour quitter.");
        while running.load(Ordering::Relaxed) {
            if poll_control(options.interactive, POLL_INTERVAL)? == Some(Control::Quit) {
                break;
            }
            if session.sync_config() {
                session.reconvert_image(&decoded);
            }
        }
    }

    session.log_stats();
    Ok(())
}

#[cfg(feature = "video")]
pub use playback::{Flow, Playback, run_video};

#[cfg(feature = "video")]
mod playback {
    use std::collections::VecDeque;

    use flume::{Receiver, RecvTimeoutError, Sender};
    use la_sched::{FrameTicket, Next, State};
    use la_source::video::{VideoCommand, VideoEvent, VideoOptions, spawn_video_thread};

    use super::*;

    /// Suite à donner après un événement vidéo.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Flow {
        /// Continue reading events.
        Continue,
        /// The stream reached its end.
        Ended,
    }

    /// Côté hôte d'une lecture vidéo : le canal d'événements et ceux
    /// mis de côté pendant le rattrapage des frames.
    pub struct Playback {
        id: SourceId,
        events: Receiver<VideoEvent>,
        pending: VecDeque<VideoEvent>,
    }

    impl Playback {
        /// Lecture de la source `id`, alimentée par `events`.
        pub fn new(id: SourceId, events: Receiver<VideoEvent>) -> Self {
            Self {
                id,
                events,
                pending: VecDeque::new(),
            }
        }

        /// Prochain événement, `Ok(None)` après `timeout` sans rien recevoir.
        ///
        /// # Errors
        /// Returns an error once the video thread has hung up.
        pub fn next_event(&mut self, timeout: Duration) -> Result<Option<VideoEvent>> {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.events.recv_timeout(timeout) {
                Ok(event) => Ok(Some(event)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(anyhow!("Thread vidéo arrêté")),
            }
        }

        /// Transmet un événement du thread vidéo au scheduler.
        ///
        /// # Errors
        /// Returns [`SchedulerError::InvalidConfiguration`] if the engine
        /// rejects the configuration.
        pub fn handle<R: Renderer>(
            &mut self,
            session: &mut Session<R>,
            event: VideoEvent,
        ) -> Result<Flow, SchedulerError> {
            let scheduler = &mut session.scheduler;
            match event {
                VideoEvent::Playing => {
                    scheduler.on_video_play(self.id);
                }
                VideoEvent::Paused => {
                    scheduler.on_video_paused(self.id);
                }
                VideoEvent::Ended => {
                    scheduler.on_video_ended(self.id);
                    return Ok(Flow::Ended);
                }
                VideoEvent::FrameError(reason) => {
                    if let Some(ticket) = scheduler.on_frame_displayable(self.id) {
                        scheduler.on_frame_captured(ticket, Err(SourceError::unavailable(reason)))?;
                    }
                }
                VideoEvent::Frame(frame) => {
                    let frame = self.latest_frame(frame);
                    if let Some(ticket) = scheduler.on_frame_displayable(self.id) {
                        self.capture(scheduler, ticket, frame)?;
                    }
                }
            }
            Ok(Flow::Continue)
        }

        /// Avance jusqu'à la frame la plus récente déjà arrivée. Un événement
        /// d'un autre type arrête le rattrapage et passe en tête de file.
        fn latest_frame(&mut self, mut frame: Arc<FrameBuffer>) -> Arc<FrameBuffer> {
            let mut skipped = 0_u32;
            while let Ok(event) = self.events.try_recv() {
                match event {
                    VideoEvent::Frame(newer) => {
                        frame = newer;
                        skipped += 1;
                    }
                    other => {
                        self.pending.push_back(other);
                        break;
                    }
                }
            }
            if skipped > 0 {
                log::trace!("{skipped} frame(s) en retard sautée(s)");
            }
            frame
        }

        /// Capture `frame` sous `ticket`. Tant que le scheduler demande un
        /// ré-échantillonnage, recapture la frame devenue courante entre-temps.
        fn capture<R: Renderer>(
            &mut self,
            scheduler: &mut Scheduler<R>,
            mut ticket: FrameTicket,
            mut frame: Arc<FrameBuffer>,
        ) -> Result<(), SchedulerError> {
            loop {
                let pixels = frame.as_pixels().map_err(SourceError::from);
                match scheduler.on_frame_captured(ticket, pixels)? {
                    Next::Resample(next) => {
                        ticket = next;
                        frame = self.latest_frame(frame);
                    }
                    Next::AwaitFrame | Next::Stop | Next::Discarded => return Ok(()),
                }
            }
        }
    }

    /// Envoie une commande au thread vidéo. Retourne `false` (et le signale)
    /// si le thread ne l'écoute plus.
    fn send_command(commands: &Sender<VideoCommand>, cmd: VideoCommand) -> bool {
        match commands.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Commande vidéo {:?} perdue : thread vidéo arrêté", e.0);
                false
            }
        }
    }

    /// Boucle hôte : clavier, événements vidéo, config.
    fn pump<R: Renderer>(
        session: &mut Session<R>,
        playback: &mut Playback,
        commands: &Sender<VideoCommand>,
        options: HostOptions,
        running: &AtomicBool,
    ) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            match poll_control(options.interactive, Duration::ZERO)? {
                Some(Control::Quit) => break,
                Some(Control::TogglePause) => {
                    let cmd = if matches!(session.scheduler.state(), State::Paused(_)) {
                        VideoCommand::Play
                    } else {
                        VideoCommand::Pause
                    };
                    send_command(commands, cmd);
                }
                None => {}
            }

            let Some(event) = playback.next_event(POLL_INTERVAL)? else {
                continue;
            };
            session.sync_config();
            let flow = playback.handle(session, event)?;

            if options.once && session.scheduler.stats().converted > 0 {
                break;
            }
            if flow == Flow::Ended && !options.watch {
                break;
            }
        }
        Ok(())
    }

    /// Lit la vidéo jusqu'à la fin du flux, `q`, Ctrl+C, ou la première
    /// grille avec `once`.
    ///
    /// # Errors
    /// Returns an error if ffprobe/ffmpeg cannot start the stream or if the
    /// configuration is rejected by the engine.
    pub fn run_video<R: Renderer>(
        session: &mut Session<R>,
        path: &Path,
        options: HostOptions,
        running: &AtomicBool,
    ) -> Result<()> {
        let (event_tx, event_rx) = flume::bounded(3);
        let (cmd_tx, cmd_rx) = flume::bounded(10);

        let id = session.scheduler.on_source_changed(SourceKind::Video);
        let video_options = VideoOptions {
            looping: options.looping,
            autoplay: true,
        };
        let (handle, info) =
            spawn_video_thread(path.to_path_buf(), event_tx, cmd_rx, video_options)?;
        log::info!(
            "Vidéo {id} : {}x{} @ {:.2} fps ({})",
            info.width,
            info.height,
            info.fps,
            path.display()
        );

        let mut playback = Playback::new(id, event_rx);
        let result = pump(session, &mut playback, &cmd_tx, options, running);

        let _ = cmd_tx.send(VideoCommand::Quit);
        // Débloque un éventuel send du thread vidéo sur un canal plein.
        drop(playback);
        if handle.join().is_err() {
            log::error!("Le thread vidéo a paniqué");
        }
        session.log_stats();
        result
    }

    #[cfg(test)]
    mod tests {
        use la_core::frame::CharacterGrid;

        use super::*;

        #[derive(Default)]
        struct Recording {
            grids: Vec<String>,
            errors: usize,
        }

        impl Renderer for Recording {
            fn render(&mut self, _source: SourceId, grid: CharacterGrid) {
                self.grids.push(grid.to_string());
            }

            fn report(&mut self, _source: SourceId, _error: &SchedulerError) {
                self.errors += 1;
            }
        }

        fn session() -> Session<Recording> {
            let config = Arc::new(ArcSwap::from_pointee(ConversionConfig::new(1, "#.")));
            Session::new(config, Recording::default())
        }

        fn frame(rgb: (u8, u8, u8)) -> VideoEvent {
            VideoEvent::Frame(Arc::new(FrameBuffer::filled(2, 1, rgb)))
        }

        fn drain(playback: &mut Playback, session: &mut Session<Recording>) -> Vec<Flow> {
            let mut flows = Vec::new();
            while let Some(event) = playback.next_event(Duration::ZERO).unwrap() {
                flows.push(playback.handle(session, event).unwrap());
            }
            flows
        }

        #[test]
        fn stale_frames_are_skipped_for_the_latest() {
            let mut session = session();
            let id = session.scheduler.on_source_changed(SourceKind::Video);
            let (tx, rx) = flume::unbounded();
            let mut playback = Playback::new(id, rx);

            tx.send(VideoEvent::Playing).unwrap();
            tx.send(frame((0, 0, 0))).unwrap();
            tx.send(frame((0, 0, 0))).unwrap();
            tx.send(frame((255, 255, 255))).unwrap();
            drain(&mut playback, &mut session);

            let grids = &session.scheduler().renderer().grids;
            assert_eq!(grids, &["##\n".to_string()]);
        }

        #[test]
        fn pause_seen_while_catching_up_is_kept_in_order() {
            let mut session = session();
            let id = session.scheduler.on_source_changed(SourceKind::Video);
            let (tx, rx) = flume::unbounded();
            let mut playback = Playback::new(id, rx);

            tx.send(VideoEvent::Playing).unwrap();
            tx.send(frame((255, 255, 255))).unwrap();
            tx.send(VideoEvent::Paused).unwrap();
            tx.send(frame((0, 0, 0))).unwrap();
            drain(&mut playback, &mut session);

            assert_eq!(session.scheduler().renderer().grids, vec!["##\n".to_string()]);
            assert_eq!(session.scheduler().state(), State::Paused(id));
        }

        #[test]
        fn frame_error_is_reported_and_playback_continues() {
            let mut session = session();
            let id = session.scheduler.on_source_changed(SourceKind::Video);
            let (tx, rx) = flume::unbounded();
            let mut playback = Playback::new(id, rx);

            tx.send(VideoEvent::Playing).unwrap();
            tx.send(VideoEvent::FrameError("pipe fermé".into())).unwrap();
            tx.send(frame((0, 0, 0))).unwrap();
            tx.send(VideoEvent::Ended).unwrap();
            let flows = drain(&mut playback, &mut session);

            let renderer = session.scheduler().renderer();
            assert_eq!(renderer.errors, 1);
            assert_eq!(renderer.grids, vec!["..\n".to_string()]);
            assert_eq!(flows.last(), Some(&Flow::Ended));
        }

        #[test]
        fn resample_picks_up_the_frame_current_after_capture() {
            let mut session = session();
            let id = session.scheduler.on_source_changed(SourceKind::Video);
            let (tx, rx) = flume::unbounded();
            let mut playback = Playback::new(id, rx);
            assert!(session.scheduler.on_video_play(id));

            let ticket = session.scheduler.on_frame_displayable(id).unwrap();
            // Signal reçu pendant la capture : fusionné, la frame arrive sur le canal.
            assert_eq!(session.scheduler.on_frame_displayable(id), None);
            tx.send(frame((255, 255, 255))).unwrap();

            let black = Arc::new(FrameBuffer::filled(2, 1, (0, 0, 0)));
            playback.capture(&mut session.scheduler, ticket, black).unwrap();

            assert_eq!(
                session.scheduler().renderer().grids,
                vec!["..\n".to_string(), "##\n".to_string()]
            );
            assert_eq!(session.scheduler().stats().dropped, 1);
        }

        #[test]
        fn command_to_stopped_video_thread_is_reported() {
            let (tx, rx) = flume::bounded(1);
            assert!(send_command(&tx, VideoCommand::Pause));
            drop(rx);
            assert!(!send_command(&tx, VideoCommand::Play));
        }

        #[test]
        fn hot_reloaded_config_applies_to_next_frame() {
            let config = Arc::new(ArcSwap::from_pointee(ConversionConfig::new(1, "#.")));
            let mut session = Session::new(Arc::clone(&config), Recording::default());
            let id = session.scheduler.on_source_changed(SourceKind::Video);
            let (tx, rx) = flume::unbounded();
            let mut playback = Playback::new(id, rx);

            tx.send(VideoEvent::Playing).unwrap();
            tx.send(frame((255, 255, 255))).unwrap();
            drain(&mut playback, &mut session);

            config.store(Arc::new(ConversionConfig::new(2, "@ ")));
            assert!(session.sync_config());
            tx.send(frame((255, 255, 255))).unwrap();
            drain(&mut playback, &mut session);

            assert_eq!(
                session.scheduler().renderer().grids,
                vec!["##\n".to_string(), "@\n".to_string()]
            );
        }
    }
}

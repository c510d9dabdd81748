use std::fmt;

use la_core::config::ConversionConfig;
use la_core::error::SourceError;
use la_core::frame::PixelBuffer;

use crate::error::SchedulerError;
use crate::renderer::Renderer;

/// Identité d'une source. Chaque changement de source en attribue une
/// nouvelle, strictement croissante.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Nature d'une source fraîchement sélectionnée.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// One decoded buffer, converted once.
    Image,
    /// A stream of frames, converted once per displayable frame.
    Video,
}

/// Étiquette de l'unique capture vidéo en cours.
///
/// Retournée par [`Scheduler::on_frame_displayable`], à rendre avec le
/// buffer capturé à [`Scheduler::on_frame_captured`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTicket {
    source: SourceId,
    seq: u64,
}

impl FrameTicket {
    /// Source the capture was started for.
    #[must_use]
    pub fn source(&self) -> SourceId {
        self.source
    }
}

impl fmt::Display for FrameTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.seq)
    }
}

/// État de la machine. Un seul actif à la fois.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// Nothing to convert: no source, a finished image, or a video that
    /// has not started playing yet.
    #[default]
    Idle,
    /// Waiting for the still image's decoded buffer.
    ConvertingImage(SourceId),
    /// Converting once per displayable frame.
    PlayingVideo(SourceId),
    /// Video loaded but not advancing.
    Paused(SourceId),
}

/// Issue d'un chargement d'image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The grid was handed to the renderer.
    Rendered,
    /// The result belonged to a superseded source and was dropped.
    Discarded,
}

/// Ce que l'hôte doit faire après une capture vidéo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Next {
    /// Wait for the next displayable-frame signal.
    AwaitFrame,
    /// A signal arrived during the conversion: capture the current frame now.
    Resample(FrameTicket),
    /// Playback paused or ended: stop the per-frame loop.
    Stop,
    /// The capture belonged to a superseded source and was dropped.
    Discarded,
}

/// Compteurs cumulés depuis la création du scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Grids handed to the renderer.
    pub converted: u64,
    /// Frame signals coalesced because a conversion was in flight.
    pub dropped: u64,
    /// Results thrown away because their source was superseded.
    pub discarded: u64,
    /// Buffers the frame source failed to deliver.
    pub failed: u64,
}

/// Ordonnanceur coopératif mono-thread entre sources de frames et moteur.
///
/// Ne fait aucune entrée/sortie : l'hôte lui transmet les signaux
/// (image prête, frame affichable, lecture, pause) et exécute les captures
/// qu'il demande. Le scheduler convertit, transmet la grille au
/// [`Renderer`], et garantit :
/// - au plus une capture vidéo en vol ; les signaux reçus entre-temps sont
///   fusionnés en un seul ré-échantillonnage, jamais mis en file ;
/// - un résultat arrivant pour une source remplacée n'atteint jamais le rendu.
///
/// # Example
/// ```
/// use la_core::config::ConversionConfig;
/// use la_core::frame::{CharacterGrid, FrameBuffer};
/// use la_sched::{Renderer, Scheduler, SchedulerError, SourceId, SourceKind, Step};
///
/// #[derive(Default)]
/// struct Last(Option<CharacterGrid>);
/// impl Renderer for Last {
///     fn render(&mut self, _: SourceId, grid: CharacterGrid) { self.0 = Some(grid); }
///     fn report(&mut self, _: SourceId, _: &SchedulerError) {}
/// }
///
/// let mut scheduler = Scheduler::new(ConversionConfig::new(2, "#."), Last::default());
/// let id = scheduler.on_source_changed(SourceKind::Image);
/// let frame = FrameBuffer::filled(4, 4, (255, 255, 255));
/// let step = scheduler.on_image_ready(id, frame.as_pixels().map_err(Into::into)).unwrap();
/// assert_eq!(step, Step::Rendered);
/// assert_eq!(scheduler.renderer().0.as_ref().unwrap().to_string(), "##\n##\n");
/// ```
pub struct Scheduler<R> {
    renderer: R,
    config: ConversionConfig,
    state: State,
    current: Option<(SourceId, SourceKind)>,
    next_id: u64,
    in_flight: Option<FrameTicket>,
    next_seq: u64,
    /// Un signal est arrivé pendant la capture en vol.
    resample: bool,
    stats: SchedulerStats,
}

impl<R: Renderer> Scheduler<R> {
    /// Create an idle scheduler.
    pub fn new(config: ConversionConfig, renderer: R) -> Self {
        Self {
            renderer,
            config,
            state: State::Idle,
            current: None,
            next_id: 0,
            in_flight: None,
            next_seq: 0,
            resample: false,
            stats: SchedulerStats::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Identity of the current source, if any.
    #[must_use]
    pub fn current_source(&self) -> Option<SourceId> {
        self.current.map(|(id, _)| id)
    }

    /// Configuration used for the next conversion.
    #[must_use]
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Shared access to the renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Exclusive access to the renderer.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Consume the scheduler and return its renderer.
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Replace the configuration. Applies from the next conversion on;
    /// validation happens in the engine, at conversion time.
    pub fn set_config(&mut self, config: ConversionConfig) {
        if config != self.config {
            log::debug!(
                "Config scheduler : sparsity {} → {}, {} glyphes",
                self.config.sparsity,
                config.sparsity,
                config.glyph_count()
            );
            self.config = config;
        }
    }

    /// Une nouvelle source a été sélectionnée.
    ///
    /// Abandonne toute capture en vol, repasse par `Idle`, puis entre dans
    /// `ConvertingImage` pour une image. Une vidéo reste `Idle` jusqu'à
    /// [`on_video_play`](Self::on_video_play).
    pub fn on_source_changed(&mut self, kind: SourceKind) -> SourceId {
        self.next_id += 1;
        let id = SourceId(self.next_id);

        if let Some(ticket) = self.in_flight.take() {
            log::debug!("Capture {ticket} abandonnée : nouvelle source {id}");
        }
        self.resample = false;
        self.state = State::Idle;
        self.current = Some((id, kind));

        if kind == SourceKind::Image {
            self.state = State::ConvertingImage(id);
        }
        log::info!("Source {id} ({kind:?}) sélectionnée → {:?}", self.state);
        id
    }

    /// Le buffer décodé de l'image `id` est disponible (ou son chargement a échoué).
    ///
    /// # Errors
    /// - [`SchedulerError::SourceUnavailable`] if `result` is an error; the
    ///   failure is also reported to the renderer and the state returns to `Idle`.
    /// - [`SchedulerError::InvalidConfiguration`] if the engine rejects the config.
    pub fn on_image_ready(
        &mut self,
        id: SourceId,
        result: Result<PixelBuffer<'_>, SourceError>,
    ) -> Result<Step, SchedulerError> {
        if let Err(cancelled) = self.claim_image(id) {
            self.discard(&cancelled);
            return Ok(Step::Discarded);
        }
        self.state = State::Idle;

        let pixels = match result {
            Ok(pixels) => pixels,
            Err(reason) => {
                let err = SchedulerError::SourceUnavailable { id, reason };
                log::error!("Erreur chargement image : {err}");
                self.stats.failed += 1;
                self.renderer.report(id, &err);
                return Err(err);
            }
        };

        let grid = la_ascii::convert(&pixels, &self.config)?;
        self.stats.converted += 1;
        log::info!(
            "Image {id} convertie : {}×{} caractères",
            grid.width(),
            grid.height()
        );
        self.renderer.render(id, grid);
        Ok(Step::Rendered)
    }

    /// La vidéo `id` démarre ou reprend. Retourne `true` si l'état a changé.
    pub fn on_video_play(&mut self, id: SourceId) -> bool {
        let is_current_video = self.current == Some((id, SourceKind::Video));
        match self.state {
            State::Idle | State::Paused(_) if is_current_video => {
                self.state = State::PlayingVideo(id);
                log::debug!("Vidéo {id} : lecture");
                true
            }
            _ => false,
        }
    }

    /// La vidéo `id` est mise en pause. Retourne `true` si l'état a changé.
    pub fn on_video_paused(&mut self, id: SourceId) -> bool {
        self.stop_playing(id, "pause")
    }

    /// La vidéo `id` est arrivée à la fin. Retourne `true` si l'état a changé.
    pub fn on_video_ended(&mut self, id: SourceId) -> bool {
        self.stop_playing(id, "fin")
    }

    /// Une nouvelle frame de la vidéo `id` est affichable.
    ///
    /// Retourne un ticket si l'hôte doit capturer la frame courante
    /// maintenant. Retourne `None` si la vidéo ne joue pas, ou si une
    /// capture est déjà en vol : dans ce cas le signal est fusionné et la
    /// frame alors courante sera ré-échantillonnée à la fin de la capture.
    pub fn on_frame_displayable(&mut self, id: SourceId) -> Option<FrameTicket> {
        if self.state != State::PlayingVideo(id) {
            return None;
        }
        if let Some(ticket) = self.in_flight {
            self.stats.dropped += 1;
            self.resample = true;
            log::trace!("Frame ignorée : capture {ticket} encore en vol");
            return None;
        }
        Some(self.begin_capture(id))
    }

    /// La capture `ticket` est terminée (ou a échoué).
    ///
    /// Une capture ratée est signalée au renderer puis ignorée : la vidéo
    /// continue de jouer.
    ///
    /// # Errors
    /// Returns [`SchedulerError::InvalidConfiguration`] if the engine rejects
    /// the config. Source failures are never returned here.
    pub fn on_frame_captured(
        &mut self,
        ticket: FrameTicket,
        result: Result<PixelBuffer<'_>, SourceError>,
    ) -> Result<Next, SchedulerError> {
        if self.in_flight != Some(ticket) {
            self.discard(&SchedulerError::Cancelled(ticket.source));
            return Ok(Next::Discarded);
        }
        self.in_flight = None;
        let id = ticket.source;

        match result {
            Ok(pixels) => {
                let grid = la_ascii::convert(&pixels, &self.config)?;
                self.stats.converted += 1;
                self.renderer.render(id, grid);
            }
            Err(reason) => {
                let err = SchedulerError::SourceUnavailable { id, reason };
                log::warn!("Frame {ticket} ignorée : {err}");
                self.stats.failed += 1;
                self.renderer.report(id, &err);
            }
        }

        Ok(self.after_frame(id))
    }

    fn claim_image(&self, id: SourceId) -> Result<(), SchedulerError> {
        if self.state == State::ConvertingImage(id) {
            Ok(())
        } else {
            Err(SchedulerError::Cancelled(id))
        }
    }

    fn discard(&mut self, cancelled: &SchedulerError) {
        self.stats.discarded += 1;
        log::debug!("{cancelled}");
    }

    fn begin_capture(&mut self, id: SourceId) -> FrameTicket {
        self.next_seq += 1;
        let ticket = FrameTicket {
            source: id,
            seq: self.next_seq,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    fn after_frame(&mut self, id: SourceId) -> Next {
        if self.state != State::PlayingVideo(id) {
            self.resample = false;
            return Next::Stop;
        }
        if std::mem::take(&mut self.resample) {
            Next::Resample(self.begin_capture(id))
        } else {
            Next::AwaitFrame
        }
    }

    fn stop_playing(&mut self, id: SourceId, why: &str) -> bool {
        if self.state == State::PlayingVideo(id) {
            self.state = State::Paused(id);
            self.resample = false;
            log::debug!("Vidéo {id} : {why}");
            true
        } else {
            false
        }
    }
}

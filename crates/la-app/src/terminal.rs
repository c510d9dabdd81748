use std::io::{self, Write};

use crossterm::{QueueableCommand, cursor, style, terminal};
use la_core::frame::CharacterGrid;
use la_sched::{Renderer, SchedulerError, SourceId};

/// Mode d'affichage du renderer terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// Print each grid once, line by line, then move on (pipes, still images).
    Plain,
    /// Redraw in place from the top-left corner, cropped to the terminal size.
    Animated,
}

/// Écrit les grilles dans un terminal (ou tout `Write`).
///
/// # Example
/// ```
/// use la_app::terminal::{DisplayMode, TerminalRenderer};
/// use la_core::config::ConversionConfig;
/// use la_core::frame::FrameBuffer;
/// use la_sched::{Scheduler, SourceKind};
///
/// let renderer = TerminalRenderer::new(Vec::new(), DisplayMode::Plain);
/// let mut scheduler = Scheduler::new(ConversionConfig::new(1, "#."), renderer);
/// let id = scheduler.on_source_changed(SourceKind::Image);
/// let frame = FrameBuffer::filled(2, 1, (255, 255, 255));
/// scheduler.on_image_ready(id, frame.as_pixels().map_err(Into::into)).unwrap();
/// assert_eq!(scheduler.into_renderer().into_inner(), b"##\n");
/// ```
pub struct TerminalRenderer<W: Write> {
    out: W,
    display: DisplayMode,
    /// Dernière erreur signalée, affichée sous la grille en mode animé.
    status: Option<String>,
    font_size_noted: bool,
}

impl<W: Write> TerminalRenderer<W> {
    /// Renderer writing to `out`.
    pub fn new(out: W, display: DisplayMode) -> Self {
        Self {
            out,
            display,
            status: None,
            font_size_noted: false,
        }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Log once that the font size hint cannot be honoured in a terminal.
    pub fn note_font_size(&mut self, font_size: f32) {
        if !self.font_size_noted {
            self.font_size_noted = true;
            log::info!("font_size = {font_size} ignoré : la police dépend du terminal");
        }
    }

    fn write_plain(&mut self, grid: &CharacterGrid) -> io::Result<()> {
        write!(self.out, "{grid}")?;
        self.out.flush()
    }

    fn write_animated(&mut self, grid: &CharacterGrid) -> io::Result<()> {
        let (cols, rows) = terminal::size().unwrap_or((u16::MAX, u16::MAX));
        // Dernière ligne réservée au statut.
        let max_rows = usize::from(rows.saturating_sub(1));
        let max_cols = usize::from(cols);

        self.out.queue(cursor::MoveTo(0, 0))?;
        self.out.queue(terminal::Clear(terminal::ClearType::All))?;
        for (y, row) in grid.rows().take(max_rows).enumerate() {
            let line: String = row.iter().take(max_cols).collect();
            self.out.queue(cursor::MoveTo(0, y as u16))?;
            self.out.queue(style::Print(line))?;
        }
        if let Some(ref status) = self.status {
            let y = grid.height().min(max_rows) as u16;
            self.out.queue(cursor::MoveTo(0, y))?;
            self.out.queue(style::Print(status))?;
        }
        self.out.flush()
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, _source: SourceId, grid: CharacterGrid) {
        let result = match self.display {
            DisplayMode::Plain => self.write_plain(&grid),
            DisplayMode::Animated => self.write_animated(&grid),
        };
        if let Err(e) = result {
            log::warn!("Écriture terminal impossible : {e}");
        }
    }

    fn report(&mut self, source: SourceId, error: &SchedulerError) {
        match self.display {
            DisplayMode::Plain => {
                let _ = writeln!(io::stderr(), "lumascii: source {source}: {error}");
            }
            DisplayMode::Animated => {
                self.status = Some(format!("[{source}] {error}"));
            }
        }
    }
}

/// Coupe le logger global et restaure le niveau précédent au drop.
///
/// Sur l'écran alternatif, les lignes d'env_logger (stderr) écraseraient la
/// grille ; les erreurs passent alors par la ligne de statut.
pub struct LogMute {
    saved: log::LevelFilter,
}

impl LogMute {
    /// Silence every log record until the value is dropped.
    #[must_use]
    pub fn new() -> Self {
        let saved = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        Self { saved }
    }
}

impl Default for LogMute {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogMute {
    fn drop(&mut self) {
        log::set_max_level(self.saved);
    }
}

/// Active l'écran alternatif et le mode raw ; restaure le terminal au drop.
pub struct TerminalGuard {
    _log: LogMute,
}

impl TerminalGuard {
    /// Enter the alternate screen with raw mode and a hidden cursor.
    /// Logging is muted while the guard lives.
    ///
    /// # Errors
    /// Returns an error if the terminal refuses raw mode.
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        out.queue(terminal::EnterAlternateScreen)?;
        out.queue(cursor::Hide)?;
        out.flush()?;
        Ok(Self {
            _log: LogMute::new(),
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut out = io::stdout();
        let _ = out.queue(cursor::Show);
        let _ = out.queue(terminal::LeaveAlternateScreen);
        let _ = out.flush();
        let _ = terminal::disable_raw_mode();
    }
}

use la_core::frame::CharacterGrid;

use crate::error::SchedulerError;
use crate::scheduler::SourceId;

/// Consomme les grilles produites par le scheduler.
///
/// Toute la présentation (mise en page, police, couleurs) vit derrière
/// ce trait ; le scheduler n'en interprète rien.
///
/// # Example
/// ```
/// use la_core::frame::CharacterGrid;
/// use la_sched::{Renderer, SchedulerError, SourceId};
///
/// struct Stdout;
/// impl Renderer for Stdout {
///     fn render(&mut self, _source: SourceId, grid: CharacterGrid) { print!("{grid}"); }
///     fn report(&mut self, source: SourceId, error: &SchedulerError) {
///         eprintln!("{source}: {error}");
///     }
/// }
/// ```
pub trait Renderer {
    /// Display a freshly converted grid. Ownership passes to the renderer.
    fn render(&mut self, source: SourceId, grid: CharacterGrid);

    /// Notify a failure for `source` (failed image load, skipped video frame).
    fn report(&mut self, source: SourceId, error: &SchedulerError);
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, source: SourceId, grid: CharacterGrid) {
        (**self).render(source, grid);
    }

    fn report(&mut self, source: SourceId, error: &SchedulerError) {
        (**self).report(source, error);
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, source: SourceId, grid: CharacterGrid) {
        (**self).render(source, grid);
    }

    fn report(&mut self, source: SourceId, error: &SchedulerError) {
        (**self).report(source, error);
    }
}

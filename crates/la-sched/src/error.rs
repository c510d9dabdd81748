use la_core::error::{CoreError, SourceError};
use thiserror::Error;

use crate::scheduler::SourceId;

/// Errors raised while scheduling conversions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The engine refused the current configuration. Caller bug: fail fast.
    #[error(transparent)]
    InvalidConfiguration(#[from] CoreError),

    /// The frame source could not deliver a buffer.
    #[error("Source {id} indisponible")]
    SourceUnavailable {
        /// Source the failed buffer belonged to.
        id: SourceId,
        /// Failure reported by the frame source.
        #[source]
        reason: SourceError,
    },

    /// Result for a superseded source. Internal only, never rendered.
    #[error("Résultat ignoré : la source {0} a été remplacée")]
    Cancelled(SourceId),
}

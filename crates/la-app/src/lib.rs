/// Application lumascii : CLI, hot-reload de la config, boucle hôte et
/// rendu terminal autour du scheduler.

pub mod cli;
pub mod host;
pub mod hotreload;
pub mod terminal;

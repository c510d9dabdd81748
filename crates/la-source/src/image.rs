use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use la_core::error::SourceError;
use la_core::frame::FrameBuffer;

/// Décode une image (PNG, JPEG, BMP, GIF : première frame) en RGBA.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
///
/// # Example
/// ```no_run
/// use la_source::image::load_image;
/// use std::path::Path;
/// let frame = load_image(Path::new("test.png")).unwrap();
/// ```
pub fn load_image(path: &Path) -> Result<FrameBuffer> {
    let img = image::open(path)
        .with_context(|| format!("Impossible de charger {}", path.display()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("Image décodée : {width}x{height} ({})", path.display());
    Ok(FrameBuffer {
        data: rgba.into_raw(),
        width,
        height,
    })
}

/// Décode l'image sur un thread dédié.
///
/// Le résultat unique arrive sur le canal retourné ; le décodage est le
/// seul point de suspension entre la sélection d'une image et sa conversion.
///
/// # Errors
/// Returns an error if the decoder thread cannot be spawned.
pub fn spawn_image_decoder(
    path: PathBuf,
) -> Result<flume::Receiver<Result<Arc<FrameBuffer>, SourceError>>> {
    let (tx, rx) = flume::bounded(1);
    thread::Builder::new()
        .name("la-image".to_string())
        .spawn(move || {
            let result = load_image(&path)
                .map(Arc::new)
                .map_err(SourceError::from);
            // Receiver dropped = source remplacée entre-temps, rien à faire.
            let _ = tx.send(result);
        })
        .context("Impossible de spawner le thread de décodage")?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("damier.png");
        let img = image::RgbaImage::from_fn(3, 2, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn load_image_decodes_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let frame = load_image(&write_png(dir.path())).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(&frame.data[0..4], &[255, 255, 255, 255]);
        assert_eq!(&frame.data[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_image(&dir.path().join("absent.png")).is_err());
    }

    #[test]
    fn decoder_thread_reports_failures_as_source_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"pas une image").unwrap();
        let rx = spawn_image_decoder(bogus).unwrap();
        assert!(matches!(rx.recv().unwrap(), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn decoder_thread_delivers_frame() {
        let dir = tempfile::tempdir().unwrap();
        let rx = spawn_image_decoder(write_png(dir.path())).unwrap();
        let frame = rx.recv().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
    }
}

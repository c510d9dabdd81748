// Décodage vidéo via ffmpeg en subprocess (std::process::Command).
// Prérequis : `ffmpeg` et `ffprobe` accessibles dans PATH.
//
// Architecture :
//   - `probe_video`        : interroge ffprobe pour obtenir width/height/fps
//   - `spawn_ffmpeg_pipe`  : lance ffmpeg → flux raw RGBA sur stdout
//   - `spawn_video_thread` : thread dédié, lit les frames, gère les commandes
//   - `process_commands`   : dispatche les commandes dans la boucle principale
//   - `find_or_create_slot`: gère le pool Arc<FrameBuffer> zero-alloc

use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use la_core::frame::FrameBuffer;

/// Taille du pool de frames pré-allouées.
/// Doit être > capacité du canal d'événements (3) pour garantir un slot libre.
const POOL_SIZE: usize = 6;

/// Plafond de résolution du pipe : 1920×1080@30 ≈ 250 MB/s, 640×360@30 ≈ 28 MB/s.
pub const MAX_PIPE_SIZE: (u32, u32) = (640, 360);

/// Commandes interactives pour le thread vidéo.
///
/// # Example
/// ```
/// use la_source::video::VideoCommand;
/// let cmd = VideoCommand::Pause;
/// assert!(matches!(cmd, VideoCommand::Pause));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCommand {
    /// Reprendre la lecture (depuis le début si la vidéo était terminée).
    Play,
    /// Mettre en pause.
    Pause,
    /// Arrêter le thread proprement.
    Quit,
}

/// Événements émis par le thread vidéo, dans l'ordre où ils se produisent.
#[derive(Debug, Clone)]
pub enum VideoEvent {
    /// Playback started or resumed.
    Playing,
    /// Playback paused on request.
    Paused,
    /// A new frame is displayable.
    Frame(Arc<FrameBuffer>),
    /// Reading one frame failed; playback continues.
    FrameError(String),
    /// End of stream reached (never sent when looping).
    Ended,
}

/// Métadonnées extraites via ffprobe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Images par seconde (ex: 23.976, 24.0, 30.0, 60.0).
    pub fps: f64,
}

/// Options de lecture.
#[derive(Clone, Copy, Debug)]
pub struct VideoOptions {
    /// Recommencer au début à la fin du flux au lieu d'émettre `Ended`.
    pub looping: bool,
    /// Démarrer la lecture sans attendre `VideoCommand::Play`.
    pub autoplay: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            looping: true,
            autoplay: true,
        }
    }
}

/// État mutable centralisé du thread vidéo.
struct VideoState {
    /// Largeur du pipe ffmpeg.
    w: u32,
    /// Hauteur du pipe ffmpeg.
    h: u32,
    /// Position de lecture en secondes.
    pos_secs: f64,
    /// True si la lecture est en pause.
    is_paused: bool,
    /// True une fois la fin du flux atteinte (sans boucle).
    ended: bool,
    /// FPS cible envoyé à ffmpeg.
    target_fps: u32,
    /// Pool pré-alloué de frames réutilisables (zero-alloc en hot path).
    pool: Vec<Arc<FrameBuffer>>,
}

impl VideoState {
    fn new(info: &VideoInfo, options: VideoOptions) -> Self {
        let (w, h) = fit_within(info.width, info.height, MAX_PIPE_SIZE);
        let target_fps = info.fps.clamp(1.0, 60.0).round() as u32;
        let pool = (0..POOL_SIZE)
            .map(|_| Arc::new(FrameBuffer::new(w, h)))
            .collect();
        Self {
            w,
            h,
            pos_secs: 0.0,
            is_paused: !options.autoplay,
            ended: false,
            target_fps,
            pool,
        }
    }
}

/// Réduit `(width, height)` pour tenir dans `max` en conservant le ratio.
/// Dimensions paires (exigé par la plupart des filtres ffmpeg), jamais nulles.
///
/// # Example
/// ```
/// use la_source::video::fit_within;
/// assert_eq!(fit_within(1920, 1080, (640, 360)), (640, 360));
/// assert_eq!(fit_within(1920, 800, (640, 360)), (640, 266));
/// assert_eq!(fit_within(320, 240, (640, 360)), (320, 240));
/// ```
#[must_use]
pub fn fit_within(width: u32, height: u32, max: (u32, u32)) -> (u32, u32) {
    if width <= max.0 && height <= max.1 {
        return (width, height);
    }
    let scale = (f64::from(max.0) / f64::from(width)).min(f64::from(max.1) / f64::from(height));
    let even = |v: f64| ((v.round() as u32) & !1).max(2);
    (even(f64::from(width) * scale), even(f64::from(height) * scale))
}

/// Parse la sortie `default=noprint_wrappers=1` de ffprobe.
///
/// # Example
/// ```
/// use la_source::video::parse_probe_output;
/// let info = parse_probe_output("width=1280\nheight=720\nr_frame_rate=30000/1001\n");
/// assert_eq!((info.width, info.height), (1280, 720));
/// assert!((info.fps - 29.97).abs() < 0.01);
/// ```
#[must_use]
pub fn parse_probe_output(text: &str) -> VideoInfo {
    let mut width: u32 = 0;
    let mut height: u32 = 0;
    let mut fps: f64 = 30.0;

    for line in text.lines() {
        if let Some(val) = line.strip_prefix("width=") {
            width = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("height=") {
            height = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("r_frame_rate=") {
            // Format: "24/1" ou "30000/1001"
            let mut parts = val.trim().splitn(2, '/');
            let num: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(30.0);
            let den: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1.0);
            if den > 0.0 && num > 0.0 {
                fps = num / den;
            }
        }
    }

    VideoInfo { width, height, fps }
}

/// Interroge `ffprobe` pour obtenir les métadonnées du flux vidéo principal.
///
/// # Errors
/// Retourne une erreur si `ffprobe` est introuvable ou si le fichier
/// ne contient aucun flux vidéo décodable.
pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    let path_str = path.to_str().context("Chemin vidéo invalide (non-UTF8)")?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "default=noprint_wrappers=1",
            "-i",
            path_str,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .context(
            "Impossible de lancer ffprobe. Vérifiez que ffprobe est installé et dans le PATH.",
        )?;

    let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout));
    if info.width == 0 || info.height == 0 {
        anyhow::bail!(
            "ffprobe n'a trouvé aucun flux vidéo dans {}",
            path.display()
        );
    }

    log::info!(
        "probe_video: {}x{} @ {:.3}fps ({})",
        info.width,
        info.height,
        info.fps,
        path.display()
    );
    Ok(info)
}

/// Lance un processus `ffmpeg` qui écrit des frames RGBA brutes sur stdout.
///
/// Chaque frame = `w × h × 4` bytes (RGBA row-major, sans padding).
/// `-ss` avant `-i` = seek rapide keyframe-based.
///
/// Retourne `None` si le spawn échoue (log::warn émis).
#[must_use]
pub fn spawn_ffmpeg_pipe(
    path: &Path,
    w: u32,
    h: u32,
    pos_secs: f64,
    target_fps: u32,
) -> Option<Child> {
    let Some(path_str) = path.to_str() else {
        log::warn!("spawn_ffmpeg_pipe: chemin non-UTF8");
        return None;
    };

    let scale_filter = format!("scale={w}:{h}:flags=bilinear");
    let fps_str = target_fps.to_string();
    let pos_str = format!("{pos_secs:.3}");

    match Command::new("ffmpeg")
        .args([
            "-ss",
            &pos_str,
            "-i",
            path_str,
            "-vf",
            &scale_filter,
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-r",
            &fps_str,
            "-an",
            "-hide_banner",
            "-loglevel",
            "error",
            "pipe:1",
        ])
        .stdout(Stdio::piped())
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => {
            log::debug!("ffmpeg spawné: {w}x{h} @ {target_fps}fps depuis {pos_secs:.1}s");
            Some(child)
        }
        Err(e) => {
            log::warn!("spawn_ffmpeg_pipe: impossible de lancer ffmpeg: {e}");
            None
        }
    }
}

/// Lit exactement `buf.len()` bytes depuis `reader`.
///
/// # Errors
/// Retourne `Ok(true)` si lu avec succès, `Ok(false)` sur EOF avant complétion,
/// `Err` sur erreur I/O fatale.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => return Ok(false),
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn kill(maybe_child: &mut Option<Child>) {
    if let Some(mut c) = maybe_child.take() {
        let _ = c.kill();
        let _ = c.wait();
    }
}

/// Retourne `true` si le thread doit quitter (Quit reçu ou canal déconnecté).
fn process_commands(
    cmd_rx: &Receiver<VideoCommand>,
    event_tx: &Sender<VideoEvent>,
    state: &mut VideoState,
    maybe_child: &mut Option<Child>,
    path: &Path,
) -> bool {
    loop {
        match cmd_rx.try_recv() {
            Ok(VideoCommand::Quit) => {
                kill(maybe_child);
                log::info!("Thread vidéo: Quit reçu, arrêt propre.");
                return true;
            }
            Ok(VideoCommand::Pause) => {
                if !state.is_paused {
                    state.is_paused = true;
                    log::debug!("Thread vidéo: Pause");
                    if event_tx.send(VideoEvent::Paused).is_err() {
                        return true;
                    }
                }
            }
            Ok(VideoCommand::Play) => {
                if state.is_paused || state.ended {
                    if state.ended {
                        // Rejouer une vidéo terminée repart du début.
                        state.ended = false;
                        state.pos_secs = 0.0;
                        kill(maybe_child);
                        *maybe_child =
                            spawn_ffmpeg_pipe(path, state.w, state.h, 0.0, state.target_fps);
                    }
                    state.is_paused = false;
                    log::debug!("Thread vidéo: Play");
                    if event_tx.send(VideoEvent::Playing).is_err() {
                        return true;
                    }
                }
            }
            Err(flume::TryRecvError::Empty) => return false,
            Err(flume::TryRecvError::Disconnected) => {
                kill(maybe_child);
                return true;
            }
        }
    }
}

/// Trouve ou crée un slot libre dans le pool.
///
/// Invariant : retourne un index `i` tel que `Arc::strong_count(&pool[i]) == 1`.
/// Si tous les slots sont pris, alloue un nouveau slot (cas exceptionnel).
fn find_or_create_slot(pool: &mut Vec<Arc<FrameBuffer>>, w: u32, h: u32) -> usize {
    if let Some(i) = pool.iter().position(|a| Arc::strong_count(a) == 1) {
        i
    } else {
        // Pool saturé : allouer plutôt que bloquer le décodage.
        pool.push(Arc::new(FrameBuffer::new(w, h)));
        pool.len() - 1
    }
}

/// Spawne le thread de décodage vidéo via `ffmpeg` subprocess.
///
/// Le thread lit les frames RGBA depuis stdout de ffmpeg et les envoie
/// via `event_tx` au rythme natif de la vidéo. Les commandes
/// (Play/Pause/Quit) sont reçues depuis `cmd_rx`.
///
/// Retourne le handle du thread + les métadonnées du flux.
///
/// # Errors
/// Retourne une erreur si `ffprobe` est introuvable ou si le fichier est invalide.
///
/// # Example
/// ```no_run
/// use la_source::video::{spawn_video_thread, VideoOptions};
/// use std::path::PathBuf;
/// let (tx, rx) = flume::bounded(3);
/// let (cmd_tx, cmd_rx) = flume::bounded(10);
/// let (handle, info) =
///     spawn_video_thread(PathBuf::from("video.mkv"), tx, cmd_rx, VideoOptions::default()).unwrap();
/// ```
pub fn spawn_video_thread(
    path: PathBuf,
    event_tx: Sender<VideoEvent>,
    cmd_rx: Receiver<VideoCommand>,
    options: VideoOptions,
) -> Result<(thread::JoinHandle<()>, VideoInfo)> {
    let info = probe_video(&path)?;

    let handle = thread::Builder::new()
        .name("la-video".to_string())
        .spawn(move || {
            video_loop(&path, &event_tx, &cmd_rx, info, options);
        })
        .context("Impossible de spawner le thread vidéo")?;

    Ok((handle, info))
}

/// Boucle principale du thread vidéo.
fn video_loop(
    path: &Path,
    event_tx: &Sender<VideoEvent>,
    cmd_rx: &Receiver<VideoCommand>,
    info: VideoInfo,
    options: VideoOptions,
) {
    let mut state = VideoState::new(&info, options);
    let frame_period = Duration::from_secs_f64(1.0 / f64::from(state.target_fps));
    let mut maybe_child = spawn_ffmpeg_pipe(path, state.w, state.h, 0.0, state.target_fps);
    let mut last_frame = Instant::now();

    if !state.is_paused && event_tx.send(VideoEvent::Playing).is_err() {
        kill(&mut maybe_child);
        return;
    }

    loop {
        // === Commandes (non-bloquant) ===
        if process_commands(cmd_rx, event_tx, &mut state, &mut maybe_child, path) {
            return;
        }

        // === Pause / fin ===
        if state.is_paused || state.ended {
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        // === Timing FPS ===
        if let Some(remaining) = frame_period.checked_sub(last_frame.elapsed()) {
            thread::sleep(remaining);
            continue;
        }
        last_frame = Instant::now();

        let frame_bytes = state.w as usize * state.h as usize * 4;
        let idx = find_or_create_slot(&mut state.pool, state.w, state.h);

        // Arc::get_mut réussit ssi strong_count == 1 (garanti par find_or_create_slot)
        let Some(fb) = Arc::get_mut(&mut state.pool[idx]) else {
            continue;
        };

        let read_result = match maybe_child.as_mut().and_then(|c| c.stdout.as_mut()) {
            Some(stdout) => read_exact_or_eof(stdout, &mut fb.data[..frame_bytes]),
            None => Err(anyhow::anyhow!("ffmpeg n'est pas lancé")),
        };

        let event = match read_result {
            Ok(true) => {
                state.pos_secs += frame_period.as_secs_f64();
                // Le pool garde sa référence : strong_count → 2 jusqu'à libération par l'hôte.
                VideoEvent::Frame(Arc::clone(&state.pool[idx]))
            }
            Ok(false) if options.looping => {
                log::debug!("Thread vidéo: EOF à {:.1}s, bouclage.", state.pos_secs);
                state.pos_secs = 0.0;
                kill(&mut maybe_child);
                maybe_child = spawn_ffmpeg_pipe(path, state.w, state.h, 0.0, state.target_fps);
                continue;
            }
            Ok(false) => {
                log::info!("Thread vidéo: EOF à {:.1}s.", state.pos_secs);
                state.ended = true;
                kill(&mut maybe_child);
                VideoEvent::Ended
            }
            Err(e) => {
                log::warn!("Thread vidéo: erreur lecture pipe: {e}");
                // Reprise à la position courante ; la frame est perdue.
                kill(&mut maybe_child);
                thread::sleep(Duration::from_millis(100));
                maybe_child =
                    spawn_ffmpeg_pipe(path, state.w, state.h, state.pos_secs, state.target_fps);
                VideoEvent::FrameError(format!("{e:#}"))
            }
        };

        if event_tx.send(event).is_err() {
            break;
        }
    }

    kill(&mut maybe_child);
    log::info!("Thread vidéo terminé proprement.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_output_defaults_fps() {
        let info = parse_probe_output("width=10\nheight=20\n");
        assert_eq!(info, VideoInfo { width: 10, height: 20, fps: 30.0 });
    }

    #[test]
    fn probe_output_without_stream_has_zero_size() {
        let info = parse_probe_output("");
        assert_eq!((info.width, info.height), (0, 0));
    }

    #[test]
    fn fit_keeps_ratio_and_parity() {
        let (w, h) = fit_within(3840, 2160, MAX_PIPE_SIZE);
        assert_eq!((w, h), (640, 360));
        let (w, h) = fit_within(1080, 1920, MAX_PIPE_SIZE);
        assert!(w <= 640 && h <= 360);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
    }

    #[test]
    fn read_exact_or_eof_detects_short_read() {
        let mut buf = [0u8; 4];
        assert!(read_exact_or_eof(&mut &[1u8, 2, 3, 4, 5][..], &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(!read_exact_or_eof(&mut &[1u8, 2][..], &mut buf).unwrap());
    }

    #[test]
    fn pool_reuses_released_slots() {
        let mut pool: Vec<Arc<FrameBuffer>> = (0..2).map(|_| Arc::new(FrameBuffer::new(2, 2))).collect();
        let held = Arc::clone(&pool[0]);
        assert_eq!(find_or_create_slot(&mut pool, 2, 2), 1);
        let held2 = Arc::clone(&pool[1]);
        assert_eq!(find_or_create_slot(&mut pool, 2, 2), 2);
        drop(held);
        assert_eq!(find_or_create_slot(&mut pool, 2, 2), 0);
        drop(held2);
    }
}

/// Frame sources for lumascii (still images, ffmpeg-decoded video).

pub mod image;

#[cfg(feature = "video")]
pub mod video;

/// Default number of movies that may be open for recording at the same time.
pub const MAX_MOVIE_WRITERS: usize = 10;

/// Staging buffers hold BGRA pixels, one byte per channel.
pub const FRAME_CHANNELS: u8 = 4;

/// Display duration of an added frame, in movie frame intervals.
pub const DEFAULT_FRAME_DURATION: u32 = 1;

pub const DEFAULT_FRAMERATE: f64 = 30.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

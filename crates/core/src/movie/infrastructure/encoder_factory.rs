use crate::movie::domain::movie_encoder::{EncoderError, EncoderFactory, MovieEncoder};

use super::ffmpeg_movie_encoder::FfmpegMovieEncoder;

/// Produces ffmpeg-backed encoders; `init` registers ffmpeg's codecs and
/// muxers once per registry lifetime.
#[derive(Debug, Default)]
pub struct FfmpegEncoderFactory;

impl FfmpegEncoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn init(&mut self) -> Result<(), EncoderError> {
        ffmpeg_next::init()?;
        log::debug!("Using ffmpeg backend (libavcodec {})", libavcodec_version());
        Ok(())
    }

    fn create(&self) -> Box<dyn MovieEncoder> {
        Box::new(FfmpegMovieEncoder::new())
    }
}

fn libavcodec_version() -> String {
    let version = ffmpeg_next::codec::version();
    format!(
        "{}.{}.{}",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

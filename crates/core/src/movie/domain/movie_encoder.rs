use std::path::Path;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::movie_params::MovieParams;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
    #[error("encoder is not open")]
    NotOpened,
    #[error("no encoder available for codec '{0}'")]
    CodecNotFound(String),
    #[error("invalid movie option '{0}'")]
    InvalidOption(String),
    #[error("frame is {actual_width}x{actual_height} but the movie is {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

/// Abstracts movie encoding and container writing so the registry can
/// manage writers without depending on a specific codec library.
pub trait MovieEncoder: Send {
    fn open(&mut self, path: &Path, params: &MovieParams) -> Result<(), EncoderError>;

    /// Appends `frame` for `duration_units` movie frame intervals.
    /// `upside_down` marks a buffer whose rows are stored bottom-up.
    fn append(
        &mut self,
        frame: &Frame,
        duration_units: u32,
        upside_down: bool,
    ) -> Result<(), EncoderError>;

    /// Flushes pending packets and finishes the container.
    fn close(&mut self) -> Result<(), EncoderError>;
}

/// Hands out a fresh encoder for every movie the registry creates.
pub trait EncoderFactory: Send {
    /// One-time backend setup. Default: nothing to do.
    fn init(&mut self) -> Result<(), EncoderError> {
        Ok(())
    }

    fn create(&self) -> Box<dyn MovieEncoder>;
}

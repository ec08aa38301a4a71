use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read frame: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame source has no frames")]
    Empty,
}

/// The rendering host as seen from the movie writer.
///
/// A source draws numbered frames into a caller-supplied staging buffer.
/// It never allocates the buffer and never keeps a reference to it.
pub trait FrameSource {
    /// Draws frame `index` into `target`. Returns `false` once the source
    /// has no frame for `index`.
    fn render(&mut self, index: usize, target: &mut Frame) -> Result<bool, FrameSourceError>;

    /// Number of frames this source can produce, if known.
    fn len_hint(&self) -> Option<usize> {
        None
    }

    /// Whether rendered rows end up bottom-up, as with GL readback.
    fn is_bottom_up(&self) -> bool {
        false
    }

    /// Submits pending drawing without waiting for it.
    fn flush(&mut self) {}

    /// Blocks until all pending drawing has completed.
    fn finish(&mut self) {}
}

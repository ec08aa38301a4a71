use ndarray::s;

use crate::graphics::domain::frame_source::{FrameSource, FrameSourceError};
use crate::shared::frame::Frame;

/// Pixels the bar advances per frame.
const BAR_STEP: u32 = 4;

/// Synthetic source: a vertical gray gradient with a white bar sweeping
/// left to right. Useful for checking timing and orientation of a movie.
pub struct TestPatternSource {
    frames: usize,
    bottom_up: bool,
}

impl TestPatternSource {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            bottom_up: false,
        }
    }

    /// Store rows bottom-up, the way GL readback delivers them.
    pub fn with_bottom_up(mut self, bottom_up: bool) -> Self {
        self.bottom_up = bottom_up;
        self
    }

    fn bar_columns(index: usize, width: u32) -> (usize, usize) {
        let bar_width = (width / 8).max(1);
        let start = ((index as u64 * BAR_STEP as u64) % width as u64) as u32;
        let end = (start + bar_width).min(width);
        (start as usize, end as usize)
    }
}

impl FrameSource for TestPatternSource {
    fn render(&mut self, index: usize, target: &mut Frame) -> Result<bool, FrameSourceError> {
        if index >= self.frames {
            return Ok(false);
        }

        let width = target.width();
        let height = target.height() as usize;
        let (bar_start, bar_end) = Self::bar_columns(index, width);
        let mut pixels = target.as_ndarray_mut();

        for y in 0..height {
            let row = if self.bottom_up { height - 1 - y } else { y };
            let shade = (y * 255 / (height - 1).max(1)) as u8;
            pixels.slice_mut(s![row, .., ..]).fill(shade);
        }
        pixels.slice_mut(s![.., bar_start..bar_end, ..]).fill(255);
        pixels.slice_mut(s![.., .., 3]).fill(255);

        Ok(true)
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.frames)
    }

    fn is_bottom_up(&self) -> bool {
        self.bottom_up
    }
}

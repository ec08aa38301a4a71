use std::path::PathBuf;

use crate::graphics::domain::flush_mode::FlushContext;
use crate::graphics::domain::frame_source::FrameSource;
use crate::movie::domain::movie_writer_registry::{MovieHandle, MovieWriterRegistry};
use crate::shared::movie_params::MovieParams;

/// Progress callback: `(frames_done, total_frames)`. `total_frames` is 0
/// when the source length is unknown. Returning `false` stops recording.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

#[derive(Clone, Debug, PartialEq)]
pub struct RecordSummary {
    pub frames: usize,
    /// Output path and frame count of every finalized movie.
    pub movies: Vec<(PathBuf, usize)>,
}

/// Recording pipeline: render → flush → add frame, for every open movie.
///
/// All movies share one set of parameters and receive the same frames.
/// Movies this use case opened are always closed again, also when
/// recording fails half way.
pub struct RecordMovieUseCase<'a> {
    registry: &'a mut MovieWriterRegistry,
    source: Box<dyn FrameSource>,
    flush: FlushContext,
    frame_duration: u32,
    max_frames: Option<usize>,
    progress: Option<ProgressFn>,
}

impl<'a> RecordMovieUseCase<'a> {
    pub fn new(
        registry: &'a mut MovieWriterRegistry,
        source: Box<dyn FrameSource>,
        flush: FlushContext,
        frame_duration: u32,
        max_frames: Option<usize>,
        progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            registry,
            source,
            flush,
            frame_duration,
            max_frames,
            progress,
        }
    }

    pub fn execute(
        &mut self,
        outputs: &[PathBuf],
        params: &MovieParams,
    ) -> Result<RecordSummary, Box<dyn std::error::Error>> {
        if outputs.is_empty() {
            return Err("No output movie given".into());
        }

        let mut handles = Vec::with_capacity(outputs.len());
        for output in outputs {
            match self.registry.create_movie(output, params.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.abort(&handles);
                    return Err(e.into());
                }
            }
        }

        let frames = match self.record(&handles) {
            Ok(frames) => frames,
            Err(e) => {
                self.abort(&handles);
                return Err(e);
            }
        };

        let mut movies = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (&handle, output) in handles.iter().zip(outputs) {
            match self.registry.finalize_movie(handle) {
                Ok(count) => movies.push((output.clone(), count)),
                Err(e) => {
                    log::error!("{e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        Ok(RecordSummary { frames, movies })
    }

    fn record(&mut self, handles: &[MovieHandle]) -> Result<usize, Box<dyn std::error::Error>> {
        let total = match (self.max_frames, self.source.len_hint()) {
            (Some(limit), Some(len)) => limit.min(len),
            (Some(limit), None) => limit,
            (None, Some(len)) => len,
            (None, None) => 0,
        };
        let upside_down = self.source.is_bottom_up();

        let mut index = 0;
        while self.max_frames.map_or(true, |limit| index < limit) {
            for &handle in handles {
                let frame = self.registry.video_frame_mut(handle)?;
                if !self.source.render(index, frame)? {
                    return Ok(index);
                }
                self.flush.flush(self.source.as_mut());
                self.registry
                    .add_video_frame(handle, self.frame_duration, upside_down)?;
            }
            index += 1;

            if let Some(ref progress) = self.progress {
                if !progress(index, total) {
                    log::info!("Recording cancelled after {index} frames");
                    break;
                }
            }
        }
        Ok(index)
    }

    fn abort(&mut self, handles: &[MovieHandle]) {
        for &handle in handles {
            if let Err(e) = self.registry.finalize_movie(handle) {
                log::warn!("Cleanup after failed recording: {e}");
            }
        }
    }
}

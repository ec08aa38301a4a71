use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::movie::domain::movie_encoder::{EncoderError, EncoderFactory, MovieEncoder};
use crate::shared::constants::MAX_MOVIE_WRITERS;
use crate::shared::frame::Frame;
use crate::shared::movie_params::MovieParams;

/// Small integer naming one open movie. Only meaningful while its slot
/// is active; values are reused after the movie is finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovieHandle(pub usize);

impl MovieHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MovieHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum MovieWriterError {
    #[error("invalid movie handle {0}: no movie is open for recording under it")]
    InvalidHandle(MovieHandle),
    #[error("all {capacity} movie writer slots are in use")]
    CapacityExceeded { capacity: usize },
    #[error("invalid movie parameters: {0}")]
    InvalidParameters(&'static str),
    #[error("failed to initialize encoder backend: {0}")]
    BackendInitFailed(#[source] EncoderError),
    #[error("failed to open movie file {path}: {source}")]
    EncoderOpenFailed {
        path: PathBuf,
        #[source]
        source: EncoderError,
    },
    #[error("failed to add frame to movie {handle}: {source}")]
    EncodeFailed {
        handle: MovieHandle,
        #[source]
        source: EncoderError,
    },
    #[error("failed to finalize movie {handle}: {source}")]
    EncoderCloseFailed {
        handle: MovieHandle,
        #[source]
        source: EncoderError,
    },
}

struct MovieWriterSlot {
    path: PathBuf,
    params: MovieParams,
    encoder: Box<dyn MovieEncoder>,
    frame: Frame,
    frames_written: usize,
    duration_written: u64,
}

/// Fixed-capacity table of open movie writers.
///
/// Slots are addressed by [`MovieHandle`]. A slot is either empty or owns
/// one encoder plus the staging buffer the host renders into. Capacity is
/// set at construction and never grows. Every encoder is closed exactly
/// once: by [`finalize_movie`](Self::finalize_movie), by
/// [`delete_all`](Self::delete_all), or when the registry is dropped.
pub struct MovieWriterRegistry {
    factory: Box<dyn EncoderFactory>,
    slots: Vec<Option<MovieWriterSlot>>,
    initialized: bool,
}

impl MovieWriterRegistry {
    pub fn new(factory: Box<dyn EncoderFactory>) -> Self {
        Self::with_capacity(factory, MAX_MOVIE_WRITERS)
    }

    pub fn with_capacity(factory: Box<dyn EncoderFactory>, capacity: usize) -> Self {
        Self {
            factory,
            slots: (0..capacity).map(|_| None).collect(),
            initialized: false,
        }
    }

    /// Initializes the encoder backend. Safe to call repeatedly;
    /// `create_movie` calls it on demand.
    pub fn init(&mut self) -> Result<(), MovieWriterError> {
        if self.initialized {
            return Ok(());
        }
        self.factory
            .init()
            .map_err(MovieWriterError::BackendInitFailed)?;
        self.initialized = true;
        log::debug!(
            "Movie writer backend initialized ({} slots)",
            self.capacity()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Opens a new movie file and returns the handle of the lowest free slot.
    pub fn create_movie(
        &mut self,
        path: &Path,
        params: MovieParams,
    ) -> Result<MovieHandle, MovieWriterError> {
        if path.as_os_str().is_empty() {
            return Err(MovieWriterError::InvalidParameters(
                "movie path must not be empty",
            ));
        }
        params
            .validate()
            .map_err(MovieWriterError::InvalidParameters)?;

        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(MovieWriterError::CapacityExceeded {
                capacity: self.capacity(),
            })?;

        self.init()?;

        let mut encoder = self.factory.create();
        encoder
            .open(path, &params)
            .map_err(|source| MovieWriterError::EncoderOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let handle = MovieHandle(index);
        log::info!(
            "Created movie {handle}: {} ({}x{} @ {} fps)",
            path.display(),
            params.width,
            params.height,
            params.framerate
        );

        self.slots[index] = Some(MovieWriterSlot {
            path: path.to_path_buf(),
            frame: Frame::blank(params.width, params.height),
            params,
            encoder,
            frames_written: 0,
            duration_written: 0,
        });
        Ok(handle)
    }

    /// The staging buffer for the next frame of `handle`.
    ///
    /// The slot keeps ownership; the buffer is reused for every frame and
    /// keeps whatever was last written into it.
    pub fn video_frame_mut(&mut self, handle: MovieHandle) -> Result<&mut Frame, MovieWriterError> {
        self.slot_mut(handle).map(|slot| &mut slot.frame)
    }

    /// Encodes the staging buffer of `handle` for `duration_units` frame
    /// intervals and returns how many frames the movie now holds.
    pub fn add_video_frame(
        &mut self,
        handle: MovieHandle,
        duration_units: u32,
        upside_down: bool,
    ) -> Result<usize, MovieWriterError> {
        let slot = self.slot_mut(handle)?;
        if duration_units == 0 {
            return Err(MovieWriterError::InvalidParameters(
                "frame duration must be at least one frame interval",
            ));
        }

        slot.frame.set_index(slot.frames_written);
        slot.encoder
            .append(&slot.frame, duration_units, upside_down)
            .map_err(|source| MovieWriterError::EncodeFailed { handle, source })?;

        slot.frames_written += 1;
        slot.duration_written += u64::from(duration_units);
        log::debug!(
            "Movie {handle}: frame {} added (duration {duration_units})",
            slot.frames_written
        );
        Ok(slot.frames_written)
    }

    /// Closes the movie and frees its slot. The slot is released even
    /// when the encoder fails to close. Returns the number of frames written.
    pub fn finalize_movie(&mut self, handle: MovieHandle) -> Result<usize, MovieWriterError> {
        let mut slot = self
            .slots
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or(MovieWriterError::InvalidHandle(handle))?;
        Self::close_slot(handle, &mut slot)
    }

    /// Closes every open movie. Close failures are logged, never returned,
    /// so the registry always ends up empty. Returns how many were closed.
    pub fn delete_all(&mut self) -> usize {
        let mut closed = 0;
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if let Some(mut slot) = entry.take() {
                let handle = MovieHandle(index);
                if let Err(e) = Self::close_slot(handle, &mut slot) {
                    log::warn!("Teardown of movie {handle} failed: {e}");
                }
                closed += 1;
            }
        }
        closed
    }

    /// Tears down all movies and releases the backend.
    pub fn shutdown(&mut self) -> usize {
        let closed = self.delete_all();
        if self.initialized {
            self.initialized = false;
            log::debug!("Movie writer backend shut down");
        }
        closed
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn active_handles(&self) -> Vec<MovieHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| MovieHandle(i))
            .collect()
    }

    pub fn is_active(&self, handle: MovieHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn params(&self, handle: MovieHandle) -> Option<&MovieParams> {
        self.slot(handle).map(|s| &s.params)
    }

    pub fn path(&self, handle: MovieHandle) -> Option<&Path> {
        self.slot(handle).map(|s| s.path.as_path())
    }

    pub fn frames_written(&self, handle: MovieHandle) -> Option<usize> {
        self.slot(handle).map(|s| s.frames_written)
    }

    /// Total duration written so far, in movie frame intervals.
    pub fn duration_written(&self, handle: MovieHandle) -> Option<u64> {
        self.slot(handle).map(|s| s.duration_written)
    }

    fn slot(&self, handle: MovieHandle) -> Option<&MovieWriterSlot> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, handle: MovieHandle) -> Result<&mut MovieWriterSlot, MovieWriterError> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(MovieWriterError::InvalidHandle(handle))
    }

    fn close_slot(
        handle: MovieHandle,
        slot: &mut MovieWriterSlot,
    ) -> Result<usize, MovieWriterError> {
        slot.encoder
            .close()
            .map_err(|source| MovieWriterError::EncoderCloseFailed { handle, source })?;
        log::info!(
            "Finalized movie {handle}: {} ({} frames)",
            slot.path.display(),
            slot.frames_written
        );
        Ok(slot.frames_written)
    }
}

impl Drop for MovieWriterRegistry {
    fn drop(&mut self) {
        let open = self.active_count();
        if open > 0 {
            log::warn!("Movie writer registry dropped with {open} open movie(s); finalizing");
            self.delete_all();
        }
    }
}

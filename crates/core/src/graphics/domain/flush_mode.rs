use crate::graphics::domain::frame_source::FrameSource;

/// How pending drawing is flushed before a frame is read back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Submit and return immediately.
    #[default]
    Asynchronous,
    /// Block until the drawing has completed.
    Synchronous,
}

/// Owns the flush mode instead of leaving it in a process-wide global.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushContext {
    mode: FlushMode,
}

impl FlushContext {
    pub fn new(mode: FlushMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FlushMode {
        self.mode
    }

    pub fn is_synchronous(&self) -> bool {
        self.mode == FlushMode::Synchronous
    }

    pub fn set_synchronous(&mut self, synchronous: bool) {
        self.mode = if synchronous {
            FlushMode::Synchronous
        } else {
            FlushMode::Asynchronous
        };
    }

    /// Optionally updates the flag, then reports the value now in effect.
    pub fn set_gl_synchronous(&mut self, synchronous: Option<bool>) -> bool {
        if let Some(synchronous) = synchronous {
            self.set_synchronous(synchronous);
        }
        self.is_synchronous()
    }

    pub fn flush(&self, source: &mut dyn FrameSource) {
        match self.mode {
            FlushMode::Synchronous => source.finish(),
            FlushMode::Asynchronous => source.flush(),
        }
    }
}

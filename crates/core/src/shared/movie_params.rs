/// Parameters fixed at movie creation time.
///
/// `options` is handed to the encoder untouched; see
/// `movie::infrastructure::encoder_options` for the format the ffmpeg
/// encoder understands.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieParams {
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    pub options: String,
}

impl MovieParams {
    pub fn new(width: u32, height: u32, framerate: f64) -> Self {
        Self {
            width,
            height,
            framerate,
            options: String::new(),
        }
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.width == 0 || self.height == 0 {
            return Err("movie width and height must be greater than zero");
        }
        if !(self.framerate.is_finite() && self.framerate > 0.0) {
            return Err("movie framerate must be a positive finite number");
        }
        Ok(())
    }
}

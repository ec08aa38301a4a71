use std::fs;
use std::path::{Path, PathBuf};

use crate::graphics::domain::frame_source::{FrameSource, FrameSourceError};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Plays back a list of image files, one per frame, using the `image` crate.
///
/// Images are resized to the staging buffer when their size differs and
/// converted from RGBA to the buffer's BGRA layout. The last decoded frame
/// is cached so rendering the same index for several movies decodes once.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cached: Option<CachedImage>,
}

struct CachedImage {
    index: usize,
    width: u32,
    height: u32,
    bgra: Vec<u8>,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cached: None,
        }
    }

    /// All image files in `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, FrameSourceError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        if paths.is_empty() {
            return Err(FrameSourceError::Empty);
        }
        paths.sort();
        Ok(Self::new(paths))
    }

    /// Pixel size of the first image, used as the default movie size.
    pub fn first_image_size(&self) -> Result<(u32, u32), FrameSourceError> {
        let first = self.paths.first().ok_or(FrameSourceError::Empty)?;
        Ok(image::image_dimensions(first)?)
    }

    fn decode(path: &Path, width: u32, height: u32) -> Result<Vec<u8>, FrameSourceError> {
        let img = image::open(path)?.to_rgba8();
        let img = if img.dimensions() != (width, height) {
            log::debug!(
                "Resizing {} from {:?} to {width}x{height}",
                path.display(),
                img.dimensions()
            );
            image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        let mut bgra = img.into_raw();
        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        Ok(bgra)
    }
}

impl FrameSource for ImageSequenceSource {
    fn render(&mut self, index: usize, target: &mut Frame) -> Result<bool, FrameSourceError> {
        let Some(path) = self.paths.get(index) else {
            return Ok(false);
        };
        let (width, height) = (target.width(), target.height());

        let hit = matches!(
            &self.cached,
            Some(c) if c.index == index && c.width == width && c.height == height
        );
        if !hit {
            self.cached = Some(CachedImage {
                index,
                width,
                height,
                bgra: Self::decode(path, width, height)?,
            });
        }

        if let Some(cached) = &self.cached {
            target.data_mut().copy_from_slice(&cached.bgra);
        }
        Ok(true)
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.paths.len())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

use crate::TrackError;
use cv_pinhole::ImageSize;
use image::{DynamicImage, GenericImageView};
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One read-only image of a sequence together with its 0-based position in that sequence.
///
/// The pixels sit behind an [`Arc`], so cloning a frame is cheap and never copies the image.
#[derive(Clone)]
pub struct Frame {
    index: usize,
    image: Arc<DynamicImage>,
}

impl Frame {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn size(&self) -> ImageSize {
        let (width, height) = self.image.dimensions();
        ImageSize::new(width, height)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.image.dimensions();
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &width)
            .field("height", &height)
            .finish()
    }
}

/// A finite, ordered sequence of frames with a nominal frame rate.
///
/// The frame rate is only used to put timestamps on frames; tracking itself works purely on
/// frame indices.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    frames: Vec<Frame>,
    frame_rate: f64,
}

impl ImageSequence {
    /// Numbers the images in the order given.
    pub fn new(images: impl IntoIterator<Item = DynamicImage>, frame_rate: f64) -> Self {
        let frames = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| Frame::new(index, image))
            .collect();
        Self { frames, frame_rate }
    }

    /// Loads every image file in the given order.
    pub fn open<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        frame_rate: f64,
    ) -> Result<Self, TrackError> {
        let images = paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref();
                debug!("loading frame {}", path.display());
                image::open(path).map_err(|source| TrackError::Image {
                    path: path.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!("loaded {} frames", images.len());
        Ok(Self::new(images, frame_rate))
    }

    /// Loads every file in `dir`, ordered by file name.
    ///
    /// Frame dumps are usually numbered with zero padding, so name order is playback order.
    pub fn open_dir(dir: impl AsRef<Path>, frame_rate: f64) -> Result<Self, TrackError> {
        let mut paths = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<PathBuf>, _>>()?;
        paths.retain(|path| path.is_file());
        paths.sort();
        Self::open(paths, frame_rate)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// The size of the first frame, which calibration assumes for the whole sequence.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.frames.first().map(Frame::size)
    }

    /// Playback time of a frame in seconds, if the frame rate is usable.
    pub fn timestamp(&self, index: usize) -> Option<f64> {
        if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            Some(index as f64 / self.frame_rate)
        } else {
            None
        }
    }
}

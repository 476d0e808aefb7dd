use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader};
use ndarray::Array4;
use std::path::Path;

use super::error::ClassifierError;
use crate::model_spec::{ModelSpec, CHANNEL_MEAN, CHANNEL_STD};

/// Network input for a single image: (1, 3, H, W), RGB, normalized per channel.
pub type PreprocessedImage = Array4<f32>;

/// Reproduces the validation transform the checkpoint was trained with:
/// RGB conversion, fixed-size bilinear resize, scaling to [0, 1] and
/// per-channel normalization, with a leading batch axis.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    filter: FilterType,
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            mean: CHANNEL_MEAN,
            std: CHANNEL_STD,
            // Triangle is the bilinear filter, widened when downscaling like PIL's resize
            filter: FilterType::Triangle,
        }
    }

    pub fn for_spec(spec: &ModelSpec) -> Self {
        Self::new(spec.input_size as u32)
    }

    /// Decodes the file at `path` and runs the transform on it. The format is
    /// detected from the content, not the extension.
    ///
    /// # Errors
    /// - `ImagePreprocessError` if the file cannot be opened or decoded
    /// - Forwards errors from `preprocess_image()`
    pub fn preprocess_file<P: AsRef<Path>>(&self, path: P) -> Result<PreprocessedImage, ClassifierError> {
        let path = path.as_ref();
        let image = decode(path).map_err(|e| {
            ClassifierError::preprocess(format!("cannot decode {}: {}", path.display(), e), Some(e))
        })?;
        self.preprocess_image(&image)
    }

    /// # Errors
    /// - `ImagePreprocessError` if the image has zero width or height
    pub fn preprocess_image(&self, image: &DynamicImage) -> Result<PreprocessedImage, ClassifierError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::preprocess(
                format!("image has no pixels ({}x{})", image.width(), image.height()),
                None,
            ));
        }

        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, self.size, self.size, self.filter);
        let side = self.size as usize;

        Ok(Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - self.mean[c]) / self.std[c]
        }))
    }
}

fn decode(path: &Path) -> Result<DynamicImage, ImageError> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

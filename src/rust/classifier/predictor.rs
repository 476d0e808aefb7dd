use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

use super::error::ClassifierError;
use super::model::InferenceBackend;
use super::preprocess::{PreprocessedImage, Preprocessor};
use super::utils::{argmax, log_error_chain, softmax};
use crate::classes::BodyPart;
use crate::report::PredictionResult;

/// Runs single-image predictions against an inference backend.
pub struct Predictor<'m, B: InferenceBackend> {
    backend: &'m B,
    preprocessor: Preprocessor,
}

impl<'m, B: InferenceBackend> Predictor<'m, B> {
    pub fn new(backend: &'m B) -> Self {
        Self {
            preprocessor: Preprocessor::for_spec(backend.spec()),
            backend,
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Preprocesses the image at `path` and classifies it.
    ///
    /// # Errors
    /// - `ImagePreprocessError` if the image cannot be decoded or is empty;
    ///   the backend is not called in that case
    /// - Forwards all errors from `predict()`
    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<PredictionResult, ClassifierError> {
        let path = path.as_ref();
        info!("Preprocessing image: {}", path.display());
        let input = self.preprocessor.preprocess_file(path).map_err(|e| {
            log_error_chain("Error preprocessing image", &e);
            e
        })?;
        info!("Image preprocessed, shape: {:?}", input.shape());
        self.predict(input)
    }

    /// Classifies an already preprocessed image. Consumes the tensor.
    ///
    /// # Errors
    /// - `PredictionError` if the tensor shape differs from the spec's input shape
    /// - `PredictionError` if the forward pass fails
    /// - Forwards all errors from `decode_logits()`
    pub fn predict(&self, input: PreprocessedImage) -> Result<PredictionResult, ClassifierError> {
        self.run(input).map_err(|e| {
            log_error_chain("Error during prediction", &e);
            e
        })
    }

    fn run(&self, input: PreprocessedImage) -> Result<PredictionResult, ClassifierError> {
        let expected = self.backend.spec().input_shape();
        if input.shape() != expected.as_slice() {
            return Err(ClassifierError::prediction(
                format!("Input shape {:?} does not match expected {:?}", input.shape(), expected),
                None,
            ));
        }

        info!("Running model prediction on {}...", self.backend.device());
        let logits = self.backend.forward(&input)?;
        drop(input);
        debug!("Logits: {:?}", logits);

        let result = decode_logits(&logits)?;
        info!(
            "Prediction result: {} ({:.1}%)",
            result.predicted_class,
            result.confidence() * 100.0
        );
        Ok(result)
    }
}

/// Turns a (1, num_classes) logits batch into a prediction over the label registry.
///
/// ```
/// use mura_bodypart::classifier::decode_logits;
/// use mura_bodypart::BodyPart;
/// use ndarray::array;
///
/// let result = decode_logits(&array![[2.5f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]).unwrap();
/// assert_eq!(result.predicted_class, BodyPart::XrElbow);
/// assert!((result.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);
/// ```
///
/// # Errors
/// - `PredictionError` if the batch is not `[1, BodyPart::COUNT]`
/// - `PredictionError` if any logit is NaN or infinite
pub fn decode_logits(logits: &Array2<f32>) -> Result<PredictionResult, ClassifierError> {
    let (batch, classes) = logits.dim();
    if batch != 1 || classes != BodyPart::COUNT {
        return Err(ClassifierError::prediction(
            format!(
                "Expected logits of shape [1, {}], got [{}, {}]",
                BodyPart::COUNT,
                batch,
                classes
            ),
            None,
        ));
    }
    if logits.iter().any(|x| !x.is_finite()) {
        return Err(ClassifierError::prediction("Model produced non-finite logits", None));
    }

    let probabilities = softmax(logits.row(0)).to_vec();
    let index = argmax(&probabilities)
        .ok_or_else(|| ClassifierError::prediction("Model produced no scores", None))?;
    let predicted_class = BodyPart::from_index(index)
        .ok_or_else(|| ClassifierError::prediction(format!("No label for output index {}", index), None))?;

    Ok(PredictionResult {
        predicted_class,
        probabilities,
    })
}

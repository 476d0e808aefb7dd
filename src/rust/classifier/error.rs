use ort::Error as OrtError;

/// Longest message a load failure carries, so a corrupt checkpoint cannot
/// produce an unbounded error payload.
pub const MAX_LOAD_ERROR_LEN: usize = 500;

/// Represents the different types of errors that can occur while classifying a radiograph.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The binary was invoked with the wrong arguments
    #[error("{0}")]
    UsageError(String),
    /// The checkpoint path does not point at an existing file
    #[error("Model file not found: {0}")]
    ModelFileNotFound(String),
    /// The checkpoint exists but could not be bound to the expected topology
    #[error("Failed to load model: {0}")]
    ModelLoadFailure(String),
    /// The image could not be read or decoded
    #[error("Error preprocessing image: {message}")]
    ImagePreprocessError {
        message: String,
        #[source]
        source: Option<image::ImageError>,
    },
    /// The forward pass or the decoding of its output failed
    #[error("Error during prediction: {message}")]
    PredictionError {
        message: String,
        #[source]
        source: Option<OrtError>,
    },
}

impl ClassifierError {
    pub fn usage(program: &str) -> Self {
        Self::UsageError(format!("Usage: {} <image_path>", program))
    }

    /// Builds a `ModelLoadFailure`, truncating the message to `MAX_LOAD_ERROR_LEN` characters.
    pub fn load_failure(message: impl std::fmt::Display) -> Self {
        let message = message.to_string();
        let truncated = match message.char_indices().nth(MAX_LOAD_ERROR_LEN) {
            Some((cut, _)) => message[..cut].to_string(),
            None => message,
        };
        Self::ModelLoadFailure(truncated)
    }

    pub fn preprocess(message: impl Into<String>, source: Option<image::ImageError>) -> Self {
        Self::ImagePreprocessError { message: message.into(), source }
    }

    pub fn prediction(message: impl Into<String>, source: Option<OrtError>) -> Self {
        Self::PredictionError { message: message.into(), source }
    }

    /// Name of the error kind as reported in the `type` field of error output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::UsageError(_) => "UsageError",
            Self::ModelFileNotFound(_) => "ModelFileNotFound",
            Self::ModelLoadFailure(_) => "ModelLoadFailure",
            Self::ImagePreprocessError { .. } => "ImagePreprocessError",
            Self::PredictionError { .. } => "PredictionError",
        }
    }

    /// Missing checkpoints are a packaging defect and get reported apart from runtime failures.
    pub fn is_model_file_not_found(&self) -> bool {
        matches!(self, Self::ModelFileNotFound(_))
    }
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::load_failure(err)
    }
}

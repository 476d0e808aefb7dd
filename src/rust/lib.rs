//! Classifies a radiograph into one of seven MURA body-part categories using an
//! ONNX export of a DenseNet-121 based classifier.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mura_bodypart::{ModelLoader, Predictor, RuntimeConfig};
//!
//! let loader = ModelLoader::for_runtime(RuntimeConfig::default());
//! let model = loader.load("mura_bodypart_model.onnx")?;
//!
//! let result = Predictor::new(&model).predict_file("elbow.png")?;
//! println!("Predicted class: {}", result.predicted_class);
//! println!("Probabilities: {:?}", result.probabilities);
//! # Ok(())
//! # }
//! ```
//!
//! Probabilities are always reported in [`BodyPart::ALL`] order.

pub mod classes;
pub mod classifier;
pub mod model_loader;
pub mod model_spec;
pub mod report;
mod runtime;

pub use classes::BodyPart;
pub use classifier::{
    BodyPartModel, ClassifierError, InferenceBackend, ModelInfo, PreprocessedImage, Predictor, Preprocessor,
    MAX_LOAD_ERROR_LEN,
};
pub use model_loader::ModelLoader;
pub use model_spec::ModelSpec;
pub use report::{ErrorReport, PredictionResult};
pub use runtime::{create_session_builder, Device, DevicePreference, RuntimeConfig};

/// Initializes stderr logging at `info` unless `RUST_LOG` says otherwise.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();
}

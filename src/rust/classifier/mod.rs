mod error;
mod model;
mod predictor;
mod preprocess;
mod utils;

pub use error::{ClassifierError, MAX_LOAD_ERROR_LEN};
pub use model::{BodyPartModel, InferenceBackend, ModelInfo};
pub use predictor::{decode_logits, Predictor};
pub use preprocess::{PreprocessedImage, Preprocessor};
pub use utils::{argmax, softmax};

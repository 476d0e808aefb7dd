use std::collections::HashMap;
use std::path::{Path, PathBuf};
use ndarray::{Array2, Ix2};
use ort::session::Session;
use ort::value::Tensor;
use serde::Serialize;

use super::error::ClassifierError;
use super::preprocess::PreprocessedImage;
use crate::model_spec::ModelSpec;
use crate::runtime::Device;

/// Something that turns a preprocessed image batch into raw logits.
///
/// `BodyPartModel` implements it on top of ONNX Runtime; the predictor only
/// depends on this trait, so decoding can be exercised without a checkpoint.
pub trait InferenceBackend {
    /// The topology the backend was validated against
    fn spec(&self) -> &ModelSpec;

    /// Device the forward pass runs on
    fn device(&self) -> Device;

    /// Runs one forward pass and returns logits of shape (batch, num_classes).
    fn forward(&self, input: &PreprocessedImage) -> Result<Array2<f32>, ClassifierError>;
}

/// Summary of a loaded model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub checkpoint_path: String,
    pub spec_version: String,
    pub topology: String,
    pub device: String,
    pub class_labels: Vec<String>,
}

/// A checkpoint bound to the body-part topology, ready for inference.
///
/// ONNX Runtime sessions have no training mode, so dropout is an identity and
/// batch-norm uses its stored statistics; no gradients are ever recorded.
#[derive(Debug)]
pub struct BodyPartModel {
    session: Session,
    input_name: String,
    spec: ModelSpec,
    device: Device,
    checkpoint_path: PathBuf,
}

impl BodyPartModel {
    pub(crate) fn new(session: Session, spec: ModelSpec, device: Device, checkpoint_path: &Path) -> Self {
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input".to_string());
        Self {
            session,
            input_name,
            spec,
            device,
            checkpoint_path: checkpoint_path.to_path_buf(),
        }
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            checkpoint_path: self.checkpoint_path.to_string_lossy().to_string(),
            spec_version: self.spec.version.to_string(),
            topology: self.spec.describe(),
            device: self.device.to_string(),
            class_labels: crate::BodyPart::labels().into_iter().map(String::from).collect(),
        }
    }
}

impl InferenceBackend for BodyPartModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn device(&self) -> Device {
        self.device
    }

    /// The runtime copies the host tensor onto the session's device.
    fn forward(&self, input: &PreprocessedImage) -> Result<Array2<f32>, ClassifierError> {
        let input_dyn = input.view().into_dyn();
        let pixels = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&pixels)
                .map_err(|e| ClassifierError::prediction("Failed to create input tensor", Some(e)))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::prediction("Failed to run model", Some(e)))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::prediction("Failed to extract output tensor", Some(e)))?;

        logits
            .into_dimensionality::<Ix2>()
            .map(|view| view.to_owned())
            .map_err(|e| ClassifierError::prediction(format!("Unexpected output rank: {}", e), None))
    }
}

//! Versioned description of the network a checkpoint must match.
//!
//! The checkpoint is an ONNX export of the trained network, so it carries both
//! the graph and the weights. `ModelSpec` pins the topology the export has to
//! have (backbone, head sizes, class count, input geometry) and is checked
//! against the loaded session before any prediction runs.

use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::ValueType;
use serde::Serialize;
use std::fmt;

use crate::classes::BodyPart;
use crate::classifier::ClassifierError;
use crate::runtime::{create_session_builder, Device, RuntimeConfig};

/// File name of the checkpoint shipped next to the executable.
pub const DEFAULT_CHECKPOINT_NAME: &str = "mura_bodypart_model.onnx";

/// Custom metadata key an export may carry to declare which spec it was built for.
pub const SPEC_METADATA_KEY: &str = "model_spec";

/// Side length of the square network input.
pub const INPUT_SIZE: usize = 224;

/// Per-channel mean of the training-time normalization (RGB).
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation of the training-time normalization (RGB).
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Backbone {
    /// DenseNet-121 pretrained on ImageNet, classifier layer removed
    DenseNet121,
}

impl Backbone {
    pub fn name(&self) -> &'static str {
        match self {
            Backbone::DenseNet121 => "densenet121",
        }
    }

    /// Width of the pooled feature vector fed to the head.
    pub fn feature_dim(&self) -> usize {
        match self {
            Backbone::DenseNet121 => 1024,
        }
    }
}

/// Replacement classifier head: Linear -> ReLU -> Dropout -> Linear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadSpec {
    pub in_features: usize,
    pub hidden_units: usize,
    pub dropout: f32,
    pub num_classes: usize,
}

/// One layer of the reconstructed topology.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Backbone { name: &'static str, features: usize },
    Linear { in_features: usize, out_features: usize },
    Relu,
    /// Identity at inference time
    Dropout { p: f32 },
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Backbone { name, features } => write!(f, "{}(features={})", name, features),
            Layer::Linear { in_features, out_features } => write!(f, "Linear({}, {})", in_features, out_features),
            Layer::Relu => f.write_str("ReLU"),
            Layer::Dropout { p } => write!(f, "Dropout(p={})", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub version: &'static str,
    pub backbone: Backbone,
    pub head: HeadSpec,
    pub input_size: usize,
    /// Expected SHA-256 of the checkpoint file, when pinned
    pub checkpoint_sha256: Option<&'static str>,
}

impl ModelSpec {
    /// The body-part classifier deployed with this binary.
    pub fn mura_bodypart() -> Self {
        Self::with_num_classes(BodyPart::COUNT)
    }

    /// Same topology with a different output width. Only `BodyPart::COUNT`
    /// yields predictions that map onto the label registry.
    pub fn with_num_classes(num_classes: usize) -> Self {
        let backbone = Backbone::DenseNet121;
        Self {
            version: "mura-bodypart-densenet121-v1",
            backbone,
            head: HeadSpec {
                in_features: backbone.feature_dim(),
                hidden_units: 512,
                dropout: 0.3,
                num_classes,
            },
            input_size: INPUT_SIZE,
            checkpoint_sha256: None,
        }
    }

    pub fn with_checkpoint_sha256(mut self, sha256: &'static str) -> Self {
        self.checkpoint_sha256 = Some(sha256);
        self
    }

    pub fn num_classes(&self) -> usize {
        self.head.num_classes
    }

    /// Shape of a single preprocessed image: (batch, channels, height, width).
    pub fn input_shape(&self) -> [usize; 4] {
        [1, 3, self.input_size, self.input_size]
    }

    pub fn layers(&self) -> Vec<Layer> {
        vec![
            Layer::Backbone {
                name: self.backbone.name(),
                features: self.backbone.feature_dim(),
            },
            Layer::Linear {
                in_features: self.head.in_features,
                out_features: self.head.hidden_units,
            },
            Layer::Relu,
            Layer::Dropout { p: self.head.dropout },
            Layer::Linear {
                in_features: self.head.hidden_units,
                out_features: self.head.num_classes,
            },
        ]
    }

    pub fn describe(&self) -> String {
        self.layers()
            .iter()
            .map(|layer| layer.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Creates the session builder the checkpoint gets committed into.
    ///
    /// # Errors
    /// - `ModelLoadFailure` if the runtime cannot be initialized or configured
    pub fn builder(&self, config: &RuntimeConfig, device: Device) -> Result<SessionBuilder, ClassifierError> {
        log::debug!("Building {} on {}: {}", self.version, device, self.describe());
        create_session_builder(config, device)
    }

    /// Checks that a loaded session has the input and output geometry of this
    /// spec, and that its declared spec version matches when it declares one.
    ///
    /// # Errors
    /// - `ModelLoadFailure` naming the first mismatch found
    pub fn validate_session(&self, session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.len() != 1 {
            return Err(ClassifierError::load_failure(format!(
                "Expected 1 model input, found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::load_failure("Model has no outputs"));
        }

        let input = &session.inputs[0];
        let expected_input: Vec<i64> = self.input_shape().iter().map(|&d| d as i64).collect();
        let input_dims = tensor_dimensions(&input.input_type)
            .ok_or_else(|| ClassifierError::load_failure(format!("Input '{}' is not a tensor", input.name)))?;
        check_dimensions("input", &input.name, input_dims, &expected_input)?;

        let output = &session.outputs[0];
        let expected_output = [1, self.num_classes() as i64];
        let output_dims = tensor_dimensions(&output.output_type)
            .ok_or_else(|| ClassifierError::load_failure(format!("Output '{}' is not a tensor", output.name)))?;
        check_dimensions("output", &output.name, output_dims, &expected_output)?;

        if let Ok(metadata) = session.metadata() {
            if let Ok(Some(declared)) = metadata.custom(SPEC_METADATA_KEY) {
                if declared != self.version {
                    return Err(ClassifierError::load_failure(format!(
                        "Checkpoint was exported for '{}', expected '{}'",
                        declared, self.version
                    )));
                }
            }
        }

        Ok(())
    }
}

fn tensor_dimensions(value_type: &ValueType) -> Option<&[i64]> {
    match value_type {
        ValueType::Tensor { dimensions, .. } => Some(dimensions.as_slice()),
        _ => None,
    }
}

/// Dynamic axes (negative sizes) match anything; the batch axis is always allowed to be dynamic.
fn check_dimensions(role: &str, name: &str, actual: &[i64], expected: &[i64]) -> Result<(), ClassifierError> {
    let compatible = actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(&a, &e)| a < 0 || a == e);
    if compatible {
        Ok(())
    } else {
        Err(ClassifierError::load_failure(format!(
            "Shape mismatch for {} '{}': checkpoint has {:?}, expected {:?}",
            role, name, actual, expected
        )))
    }
}

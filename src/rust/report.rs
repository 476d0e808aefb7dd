use serde::{Deserialize, Serialize};
use std::error::Error;
use std::io::{self, Write};

use crate::classes::BodyPart;
use crate::classifier::ClassifierError;

/// Successful classification, written as one JSON line to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_class: BodyPart,
    /// One probability per label, in `BodyPart::ALL` order
    pub probabilities: Vec<f32>,
}

impl PredictionResult {
    /// Probability assigned to the predicted class.
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .get(self.predicted_class.index())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Failure report, written as one JSON object to stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ErrorReport {
    /// Usage and missing-checkpoint failures carry only a message; every other
    /// failure also names its kind.
    pub fn from_error(err: &ClassifierError) -> Self {
        let kind = match err {
            ClassifierError::UsageError(_) | ClassifierError::ModelFileNotFound(_) => None,
            other => Some(other.kind_name().to_string()),
        };
        Self {
            error: err.to_string(),
            kind,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| serde_json::json!({ "error": self.error }).to_string())
    }

    /// Renders `err` the way the binary reports it on stderr: one JSON line,
    /// then, for failures that name their kind, a `Traceback:` block listing
    /// the error and each underlying cause.
    ///
    /// # Errors
    /// - Any I/O error from `out`
    ///
    /// # Example
    /// ```
    /// use mura_bodypart::{ClassifierError, ErrorReport};
    ///
    /// let mut buf = Vec::new();
    /// let err = ClassifierError::ModelFileNotFound("/opt/mura_bodypart_model.onnx".into());
    /// ErrorReport::write_to(&mut buf, &err).unwrap();
    /// assert_eq!(
    ///     String::from_utf8(buf).unwrap(),
    ///     "{\"error\":\"Model file not found: /opt/mura_bodypart_model.onnx\"}\n"
    /// );
    /// ```
    pub fn write_to<W: Write>(out: &mut W, err: &ClassifierError) -> io::Result<()> {
        let report = Self::from_error(err);
        writeln!(out, "{}", report.to_json())?;

        if report.kind.is_some() {
            writeln!(out, "\nTraceback:")?;
            writeln!(out, "{}: {}", err.kind_name(), err)?;
            let mut source = err.source();
            while let Some(cause) = source {
                writeln!(out, "  caused by: {}", cause)?;
                source = cause.source();
            }
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_json_shape() {
        let result = PredictionResult {
            predicted_class: BodyPart::XrElbow,
            probabilities: vec![0.5, 0.1, 0.1, 0.1, 0.1, 0.05, 0.05],
        };
        let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(value["predicted_class"], "XR_ELBOW");
        assert_eq!(value["probabilities"].as_array().unwrap().len(), 7);
        assert_eq!(value.as_object().unwrap().len(), 2);
        assert_eq!(result.confidence(), 0.5);
    }

    #[test]
    fn test_missing_model_report_has_no_type() {
        let report = ErrorReport::from_error(&ClassifierError::ModelFileNotFound("/x/model.onnx".into()));
        assert_eq!(report.to_json(), r#"{"error":"Model file not found: /x/model.onnx"}"#);
    }

    #[test]
    fn test_generic_report_names_kind() {
        let report = ErrorReport::from_error(&ClassifierError::prediction("boom", None));
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["type"], "PredictionError");
        assert_eq!(value["error"], "Error during prediction: boom");
    }

    #[test]
    fn test_preprocess_failure_renders_traceback() {
        let cause = image::ImageError::IoError(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        let err = ClassifierError::preprocess("cannot decode /tmp/scan.png", Some(cause));
        let mut buf = Vec::new();
        ErrorReport::write_to(&mut buf, &err).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        let value: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(value["type"], "ImagePreprocessError");
        assert_eq!(value["error"], "Error preprocessing image: cannot decode /tmp/scan.png");
        assert_eq!(text.lines().filter(|l| l.starts_with('{')).count(), 1);
        assert!(text.contains("\nTraceback:\n"));
        assert!(text.contains("ImagePreprocessError: Error preprocessing image"));
        assert!(text.contains("  caused by: no such file"));
    }

    #[test]
    fn test_missing_model_renders_without_traceback() {
        let err = ClassifierError::ModelFileNotFound("/srv/mura_bodypart_model.onnx".into());
        let mut buf = Vec::new();
        ErrorReport::write_to(&mut buf, &err).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("Traceback"));
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert!(value.get("type").is_none());
    }

    #[test]
    fn test_json_escaping() {
        let report = ErrorReport {
            error: "quote \" and tab \t and \u{1}".to_string(),
            kind: None,
        };
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["error"], "quote \" and tab \t and \u{1}");
    }

    #[test]
    fn test_usage_report() {
        let report = ErrorReport::from_error(&ClassifierError::usage("mura-bodypart"));
        assert_eq!(report.error, "Usage: mura-bodypart <image_path>");
        assert!(report.kind.is_none());
    }
}

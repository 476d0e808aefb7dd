use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anatomical region predicted by the classifier.
///
/// The declaration order is the order of the output layer the checkpoint was
/// trained with: logit `i` belongs to `BodyPart::ALL[i]`. Reordering the
/// variants silently breaks every existing checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyPart {
    XrElbow,
    XrFinger,
    XrForearm,
    XrHand,
    XrHumerus,
    XrShoulder,
    XrWrist,
}

impl BodyPart {
    pub const COUNT: usize = 7;

    /// Every label, in output-layer order.
    pub const ALL: [BodyPart; BodyPart::COUNT] = [
        BodyPart::XrElbow,
        BodyPart::XrFinger,
        BodyPart::XrForearm,
        BodyPart::XrHand,
        BodyPart::XrHumerus,
        BodyPart::XrShoulder,
        BodyPart::XrWrist,
    ];

    /// Maps an output index to its label.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BodyPart::XrElbow => "XR_ELBOW",
            BodyPart::XrFinger => "XR_FINGER",
            BodyPart::XrForearm => "XR_FOREARM",
            BodyPart::XrHand => "XR_HAND",
            BodyPart::XrHumerus => "XR_HUMERUS",
            BodyPart::XrShoulder => "XR_SHOULDER",
            BodyPart::XrWrist => "XR_WRIST",
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|part| part.as_str()).collect()
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyPart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|part| part.as_str() == s)
            .ok_or_else(|| format!("Unknown body part label: {}", s))
    }
}

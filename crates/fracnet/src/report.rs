//! Diagnosis labels and serializable reports.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Probabilities strictly above this are reported as fractures.
pub const FRACTURE_THRESHOLD: f32 = 0.5;

/// The label shown next to a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    /// Probability above [`FRACTURE_THRESHOLD`].
    FractureDetected,
    /// Probability at or below [`FRACTURE_THRESHOLD`].
    NoFracture,
}

impl Diagnosis {
    /// Label a probability.
    pub fn from_probability(probability: f32) -> Self {
        if probability > FRACTURE_THRESHOLD {
            Self::FractureDetected
        } else {
            Self::NoFracture
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::FractureDetected => "Fracture Detected",
            Self::NoFracture => "No Fracture",
        }
    }

    /// `"<label> (<probability>)"` with the probability to two decimals.
    pub fn summary(self, probability: f32) -> String {
        format!("{} ({probability:.2})", self.label())
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the CLI prints for one image in JSON mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Input image.
    pub image: PathBuf,
    /// Fracture probability.
    pub probability: f32,
    /// Label for the probability.
    pub diagnosis: Diagnosis,
    /// Display string, e.g. `Fracture Detected (0.73)`.
    pub summary: String,
    /// Layer the heatmap was computed on.
    pub layer: String,
    /// Whether the heatmap is a blank stand-in for a zero attribution map.
    pub degenerate_heatmap: bool,
    /// Where the overlay was written, if it was.
    pub overlay: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(Diagnosis::from_probability(0.5), Diagnosis::NoFracture);
        assert_eq!(Diagnosis::from_probability(0.5001), Diagnosis::FractureDetected);
        assert_eq!(Diagnosis::from_probability(0.0), Diagnosis::NoFracture);
        assert_eq!(Diagnosis::from_probability(1.0), Diagnosis::FractureDetected);
    }

    #[test]
    fn test_summary_rounds_to_two_decimals() {
        assert_eq!(Diagnosis::FractureDetected.summary(0.7349), "Fracture Detected (0.73)");
        assert_eq!(Diagnosis::NoFracture.summary(0.5), "No Fracture (0.50)");
        assert_eq!(Diagnosis::NoFracture.to_string(), "No Fracture");
    }

    #[test]
    fn test_report_json() {
        let report = PredictionReport {
            image: PathBuf::from("wrist.png"),
            probability: 0.25,
            diagnosis: Diagnosis::NoFracture,
            summary: Diagnosis::NoFracture.summary(0.25),
            layer: "stage4".to_string(),
            degenerate_heatmap: false,
            overlay: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["diagnosis"], "no_fracture");
        assert_eq!(json["summary"], "No Fracture (0.25)");
        assert!(json["overlay"].is_null());
    }
}

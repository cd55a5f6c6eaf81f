//! Whole-solid classification results.

use std::fmt;

use serde::Serialize;

use crate::catalog::LabelCatalog;
use crate::error::{EngineError, EngineResult};

/// A single prediction for an entire solid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Predicted class id.
    pub class_id: usize,
    /// Display name from the catalog, or `Class <id>`.
    pub label: String,
    /// Confidence in percent, `0.0..=100.0`.
    pub confidence: f64,
}

/// Confidence bucket shown next to a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Above 80%.
    High,
    /// Above 60%.
    Medium,
    /// Everything else.
    Low,
}

impl ConfidenceBand {
    /// Band for a confidence in percent.
    pub fn of(confidence: f64) -> Self {
        if confidence > 80.0 {
            ConfidenceBand::High
        } else if confidence > 60.0 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        })
    }
}

impl Classification {
    /// Resolve a predicted id and confidence against `catalog`.
    pub fn resolve(class_id: usize, confidence: f64, catalog: &LabelCatalog) -> Self {
        Self {
            class_id,
            label: catalog.name_or_placeholder(class_id),
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    /// Pick the most likely class from raw logits.
    ///
    /// Softmax is applied, the argmax becomes the class and its probability
    /// the confidence. Ties go to the lowest id.
    pub fn from_logits(logits: &[f64], catalog: &LabelCatalog) -> EngineResult<Self> {
        if logits.is_empty() {
            return Err(EngineError::LabelMapping("no logits to classify".into()));
        }
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(EngineError::LabelMapping("logits must be finite".into()));
        }

        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        let (class_id, best) = exps
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });

        Ok(Self::resolve(class_id, best / sum * 100.0, catalog))
    }

    /// Confidence bucket of this prediction.
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}%)", self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_logits() {
        let catalog = LabelCatalog::from_names(["bracket", "flange", "shaft"], &[]);
        let c = Classification::from_logits(&[0.1, 3.0, 0.2], &catalog).unwrap();
        assert_eq!(c.class_id, 1);
        assert_eq!(c.label, "flange");
        assert!(c.confidence > 80.0 && c.confidence < 100.0);
        assert_eq!(c.band(), ConfidenceBand::High);
    }

    #[test]
    fn test_uniform_logits() {
        let catalog = LabelCatalog::from_names(["a", "b"], &[]);
        let c = Classification::from_logits(&[1.0, 1.0], &catalog).unwrap();
        assert_eq!(c.class_id, 0);
        assert!((c.confidence - 50.0).abs() < 1e-9);
        assert_eq!(c.band(), ConfidenceBand::Low);
    }

    #[test]
    fn test_unknown_class_gets_placeholder() {
        let catalog = LabelCatalog::from_names(["a"], &[]);
        let c = Classification::from_logits(&[0.0, 0.0, 9.0], &catalog).unwrap();
        assert_eq!(c.label, "Class 2");
        assert_eq!(c.to_string(), format!("Class 2 ({:.1}%)", c.confidence));
    }

    #[test]
    fn test_bad_logits() {
        let catalog = LabelCatalog::default();
        assert!(Classification::from_logits(&[], &catalog).is_err());
        assert!(Classification::from_logits(&[f64::NAN], &catalog).is_err());
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(ConfidenceBand::of(80.0), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::of(80.1), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::of(60.0), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::Medium.to_string(), "medium");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{DEFAULT_MAX_BOXES, DEFAULT_MIN_SCORE, MAX_DETECT_BOXES};

// ============================================================================
// Prediction records as returned by the pretrained detector
// ============================================================================

/// Axis-aligned box in displayed-image pixels, origin at the top-left corner.
///
/// On the wire this is the detector's `[x, y, width, height]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// One detected object: where it is, what it is, how sure the model is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub bbox: BoundingBox,
    #[serde(rename = "class")]
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

impl Prediction {
    #[must_use]
    pub fn new(bbox: impl Into<BoundingBox>, label: impl Into<String>, score: f64) -> Self {
        Self {
            bbox: bbox.into(),
            label: label.into(),
            score,
        }
    }

    #[must_use]
    pub fn percent(&self) -> u32 {
        score_percent(self.score)
    }

    /// Result-list line, e.g. `cat – 92%`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} – {}%", self.label, self.percent())
    }
}

/// Whole-number percentage for a confidence score.
///
/// Rounds half away from zero, so `0.005` gives `1` and `0.125` gives `13`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn score_percent(score: f64) -> u32 {
    // float-to-int `as` saturates: NaN and negatives become 0
    (score * 100.0).round() as u32
}

// ============================================================================
// Detector handle and options
// ============================================================================

/// Opaque handle to a loaded detector instance, minted by the shell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectorHandle(pub String);

impl DetectorHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    pub max_boxes: u32,
    pub min_score: f64,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            max_boxes: DEFAULT_MAX_BOXES,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectOptionsError {
    #[error("max_boxes must be in 1..={max}, got {value}")]
    MaxBoxesOutOfRange { value: u32, max: u32 },

    #[error("min_score must be in [0, 1], got {0}")]
    MinScoreOutOfRange(f64),
}

impl DetectOptions {
    pub fn validate(&self) -> Result<(), DetectOptionsError> {
        if self.max_boxes == 0 || self.max_boxes > MAX_DETECT_BOXES {
            return Err(DetectOptionsError::MaxBoxesOutOfRange {
                value: self.max_boxes,
                max: MAX_DETECT_BOXES,
            });
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(DetectOptionsError::MinScoreOutOfRange(self.min_score));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percent_rounds_half_away_from_zero() {
        assert_eq!(score_percent(0.873), 87);
        assert_eq!(score_percent(0.005), 1);
        assert_eq!(score_percent(0.5), 50);
        assert_eq!(score_percent(0.125), 13);
        assert_eq!(score_percent(0.92), 92);
        assert_eq!(score_percent(1.0), 100);
        assert_eq!(score_percent(0.0), 0);
    }

    #[test]
    fn test_percent_of_garbage_scores() {
        assert_eq!(score_percent(f64::NAN), 0);
        assert_eq!(score_percent(-0.3), 0);
    }

    #[test]
    fn test_summary_line() {
        let p = Prediction::new([10.0, 10.0, 50.0, 20.0], "cat", 0.92);
        assert_eq!(p.summary(), "cat – 92%");
    }

    #[test]
    fn test_prediction_wire_shape() {
        let json = r#"{"bbox":[10,10,50,20],"class":"cat","score":0.92}"#;
        let p: Prediction = serde_json::from_str(json).unwrap();
        assert_eq!(p.bbox, BoundingBox::new(10.0, 10.0, 50.0, 20.0));
        assert_eq!(p.label, "cat");

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["class"], "cat");
        assert_eq!(back["bbox"][2], 50.0);
    }

    #[test]
    fn test_default_options_are_valid() {
        assert!(DetectOptions::default().validate().is_ok());
    }

    #[test]
    fn test_options_bounds() {
        let zero = DetectOptions {
            max_boxes: 0,
            ..DetectOptions::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(DetectOptionsError::MaxBoxesOutOfRange { value: 0, .. })
        ));

        let too_sure = DetectOptions {
            min_score: 1.5,
            ..DetectOptions::default()
        };
        assert_eq!(
            too_sure.validate(),
            Err(DetectOptionsError::MinScoreOutOfRange(1.5))
        );
    }

    proptest! {
        #[test]
        fn percent_stays_within_bounds(score in 0.0f64..=1.0) {
            let pct = score_percent(score);
            prop_assert!(pct <= 100);
            prop_assert!((f64::from(pct) - score * 100.0).abs() <= 0.5);
        }
    }
}

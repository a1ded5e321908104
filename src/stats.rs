//! Timing-sample statistics and the stability classifier.

use serde::{Deserialize, Serialize};

/// Qualitative trust label for one timing measurement, derived from its
/// coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityRating {
    Good,
    Fair,
    Poor,
}

/// CV below this: the measurement can be trusted.
pub const CV_GOOD: f64 = 0.05;
/// CV at or above this: the measurement should not be trusted.
pub const CV_POOR: f64 = 0.15;

/// Pure classification rule: good iff cv < 0.05, fair iff 0.05 <= cv < 0.15,
/// poor otherwise.
pub fn rating(cv: f64) -> StabilityRating {
    if cv < CV_GOOD {
        StabilityRating::Good
    } else if cv < CV_POOR {
        StabilityRating::Fair
    } else {
        StabilityRating::Poor
    }
}

/// Summary statistics for one variant's timing sample set. Computed once per
/// measurement, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// stddev / mean; undefined when the mean is not positive.
    pub cv: Option<f64>,
    /// Absent exactly when `cv` is undefined.
    pub rating: Option<StabilityRating>,
}

impl StabilityMetrics {
    /// Derive CV and rating from the summary reported by the timing tool.
    ///
    /// A non-positive mean leaves the timing fields intact but makes the CV
    /// undefined rather than infinite, so no rating is attached.
    pub fn from_summary(mean: f64, stddev: f64, min: f64, max: f64, median: f64) -> Self {
        let cv = (mean > 0.0).then(|| stddev / mean);
        Self {
            mean,
            stddev,
            min,
            max,
            median,
            cv,
            rating: cv.map(rating),
        }
    }
}

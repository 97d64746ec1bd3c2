//! Label-to-gain mapping used by NDCG and LambdaRank.

use serde::{Deserialize, Serialize};

/// Errors raised by an invalid gain table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GainError {
    #[error("gain table is empty")]
    Empty,

    #[error("gain for label {label} is {value}, gains must be finite and non-negative")]
    Invalid { label: u32, value: f64 },

    #[error("gain for label {label} is lower than for label {}", .label - 1)]
    Decreasing { label: u32 },
}

/// Gain of each ordinal relevance label, indexed by label.
///
/// Gains are finite, non-negative and non-decreasing in label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LabelGain(Vec<f64>);

impl LabelGain {
    pub fn new(gains: Vec<f64>) -> Result<Self, GainError> {
        if gains.is_empty() {
            return Err(GainError::Empty);
        }
        for (label, &value) in gains.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(GainError::Invalid {
                    label: label as u32,
                    value,
                });
            }
            if label > 0 && value < gains[label - 1] {
                return Err(GainError::Decreasing {
                    label: label as u32,
                });
            }
        }
        Ok(Self(gains))
    }

    /// Gain of a label. Labels beyond the table are clamped to the last entry.
    #[inline]
    pub fn gain(&self, label: u32) -> f64 {
        let idx = (label as usize).min(self.0.len() - 1);
        self.0[idx]
    }

    /// Largest label the table defines.
    #[inline]
    pub fn max_label(&self) -> u32 {
        (self.0.len() - 1) as u32
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Graded relevance 0/1/2 mapped to gains 0/1/3.
impl Default for LabelGain {
    fn default() -> Self {
        Self(vec![0.0, 1.0, 3.0])
    }
}

impl TryFrom<Vec<f64>> for LabelGain {
    type Error = GainError;

    fn try_from(gains: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(gains)
    }
}

impl From<LabelGain> for Vec<f64> {
    fn from(gain: LabelGain) -> Self {
        gain.0
    }
}

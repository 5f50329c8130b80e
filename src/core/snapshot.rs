#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::algorithm::AlgorithmKind;
use crate::dataset::LabelMap;

/// Line `a·x + b·y = c` in the form the classifier emits:
/// `y = (a·x + c) / b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineCoefficients {
    pub x_coefficient: i64,
    pub y_coefficient: i64,
    pub constant: i64,
}

impl LineCoefficients {
    pub fn new(x_coefficient: i64, y_coefficient: i64, constant: i64) -> Self {
        Self {
            x_coefficient,
            y_coefficient,
            constant,
        }
    }

    /// `None` when the line is vertical (`b == 0`).
    pub fn y_at(&self, x: f64) -> Option<f64> {
        if self.y_coefficient == 0 {
            return None;
        }
        Some((x * self.x_coefficient as f64 + self.constant as f64) / self.y_coefficient as f64)
    }
}

/// One checkpoint of a run.
///
/// Snapshots are moved through the channel by value: once published, the
/// producer no longer owns them and the consumer only reads them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum ResultSnapshot {
    Classification {
        iteration: usize,
        line: LineCoefficients,
    },
    Clustering {
        iteration: usize,
        labels: LabelMap,
    },
}

impl ResultSnapshot {
    pub fn iteration(&self) -> usize {
        match self {
            ResultSnapshot::Classification { iteration, .. }
            | ResultSnapshot::Clustering { iteration, .. } => *iteration,
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            ResultSnapshot::Classification { .. } => AlgorithmKind::Classification,
            ResultSnapshot::Clustering { .. } => AlgorithmKind::Clustering,
        }
    }
}

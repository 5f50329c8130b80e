//! Run configuration: raw UI input and its validated, immutable form.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::algorithm::AlgorithmKind;
use crate::error::ConfigError;

pub const MIN_CLUSTERS: usize = 2;
pub const MAX_CLUSTERS: usize = 4;

/// Continuous-mode delay between two rendered snapshots.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Stochastic early-stop hook.
///
/// Once more than `after_fraction` of the iterations have run, each iteration
/// publishes and stops with probability `probability`. Whether this is a
/// heuristic or a leftover is unresolved, so it stays configurable and can be
/// switched off with `RunRequest::with_early_stop(None)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EarlyStop {
    pub after_fraction: f64,
    pub probability: f64,
}

impl Default for EarlyStop {
    fn default() -> Self {
        Self {
            after_fraction: 0.6,
            probability: 0.05,
        }
    }
}

impl EarlyStop {
    fn is_valid(&self) -> bool {
        let unit = 0.0..=1.0;
        unit.contains(&self.after_fraction) && unit.contains(&self.probability)
    }

    /// Whether `iteration` (1-based) is past the threshold.
    pub fn eligible(&self, iteration: usize, max_iterations: usize) -> bool {
        iteration as f64 > max_iterations as f64 * self.after_fraction
    }
}

/// Unvalidated input, as typed into the run-configuration form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunRequest {
    pub max_iterations: i64,
    pub update_interval: i64,
    pub continuous: bool,
    pub cluster_count: i64,
    pub pacing: Duration,
    pub early_stop: Option<EarlyStop>,
    pub seed: Option<u64>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            update_interval: 5,
            continuous: false,
            cluster_count: MIN_CLUSTERS as i64,
            pacing: DEFAULT_PACING,
            early_stop: Some(EarlyStop::default()),
            seed: None,
        }
    }
}

impl RunRequest {
    pub fn new(max_iterations: i64, update_interval: i64) -> Self {
        Self {
            max_iterations,
            update_interval,
            ..Self::default()
        }
    }

    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn with_cluster_count(mut self, k: i64) -> Self {
        self.cluster_count = k;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_early_stop(mut self, hook: Option<EarlyStop>) -> Self {
        self.early_stop = hook;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject invalid values, then clamp the cluster count into range.
    pub fn validate(&self, kind: AlgorithmKind) -> Result<RunConfig, ConfigError> {
        if self.max_iterations < 0 {
            return Err(ConfigError::NegativeIterations(self.max_iterations));
        }
        if self.update_interval < 0 {
            return Err(ConfigError::NegativeInterval(self.update_interval));
        }
        if self.max_iterations == 0 && self.update_interval == 0 {
            return Err(ConfigError::NoRunConfiguration);
        }
        if let Some(hook) = self.early_stop.filter(|h| !h.is_valid()) {
            return Err(ConfigError::InvalidEarlyStop {
                after_fraction: hook.after_fraction,
                probability: hook.probability,
            });
        }
        let cluster_count = match kind {
            AlgorithmKind::Clustering => clamp_cluster_count(self.cluster_count)
                .ok_or(ConfigError::InvalidClusterCount(self.cluster_count))?,
            AlgorithmKind::Classification => MIN_CLUSTERS,
        };

        Ok(RunConfig {
            max_iterations: self.max_iterations as usize,
            update_interval: self.update_interval as usize,
            continuous: self.continuous,
            cluster_count,
            pacing: self.pacing,
            early_stop: self.early_stop,
            seed: self.seed,
        })
    }
}

/// `None` for non-positive requests; otherwise clamped into
/// `[MIN_CLUSTERS, MAX_CLUSTERS]`.
pub fn clamp_cluster_count(requested: i64) -> Option<usize> {
    if requested < 1 {
        return None;
    }
    Some((requested as u64).clamp(MIN_CLUSTERS as u64, MAX_CLUSTERS as u64) as usize)
}

/// Validated configuration; fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RunConfig {
    max_iterations: usize,
    update_interval: usize,
    continuous: bool,
    cluster_count: usize,
    pacing: Duration,
    early_stop: Option<EarlyStop>,
    seed: Option<u64>,
}

impl RunConfig {
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// `0` disables periodic publishing.
    pub fn update_interval(&self) -> usize {
        self.update_interval
    }

    pub fn continuous(&self) -> bool {
        self.continuous
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn early_stop(&self) -> Option<EarlyStop> {
        self.early_stop
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Periodic checkpoint at `iteration`?
    pub fn publishes_at(&self, iteration: usize) -> bool {
        self.update_interval > 0 && iteration % self.update_interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_count_is_clamped() {
        assert_eq!(clamp_cluster_count(1), Some(2));
        assert_eq!(clamp_cluster_count(10), Some(4));
        assert_eq!(clamp_cluster_count(3), Some(3));
        assert_eq!(clamp_cluster_count(0), None);
        assert_eq!(clamp_cluster_count(-2), None);
    }

    #[test]
    fn negative_values_are_rejected() {
        let kind = AlgorithmKind::Classification;
        assert_eq!(
            RunRequest::new(-1, 5).validate(kind),
            Err(ConfigError::NegativeIterations(-1))
        );
        assert_eq!(
            RunRequest::new(10, -5).validate(kind),
            Err(ConfigError::NegativeInterval(-5))
        );
        assert_eq!(
            RunRequest::new(0, 0).validate(kind),
            Err(ConfigError::NoRunConfiguration)
        );
    }

    #[test]
    fn cluster_count_only_checked_for_clustering() {
        let req = RunRequest::new(10, 2).with_cluster_count(0);
        assert!(req.validate(AlgorithmKind::Classification).is_ok());
        assert_eq!(
            req.validate(AlgorithmKind::Clustering),
            Err(ConfigError::InvalidClusterCount(0))
        );

        let cfg = RunRequest::new(10, 2)
            .with_cluster_count(9)
            .validate(AlgorithmKind::Clustering)
            .unwrap();
        assert_eq!(cfg.cluster_count(), MAX_CLUSTERS);
    }

    #[test]
    fn zero_interval_never_publishes_periodically() {
        let cfg = RunRequest::new(10, 0)
            .validate(AlgorithmKind::Classification)
            .unwrap();
        assert!((1..=10).all(|i| !cfg.publishes_at(i)));

        let cfg = RunRequest::new(23, 5)
            .validate(AlgorithmKind::Classification)
            .unwrap();
        let at: Vec<usize> = (1..=23).filter(|&i| cfg.publishes_at(i)).collect();
        assert_eq!(at, vec![5, 10, 15, 20]);
    }

    #[test]
    fn early_stop_out_of_range_is_rejected() {
        let kind = AlgorithmKind::Classification;
        let with = |after_fraction, probability| {
            RunRequest::new(100, 10)
                .with_early_stop(Some(EarlyStop {
                    after_fraction,
                    probability,
                }))
                .validate(kind)
        };

        for (after, p) in [
            (-1.0, 0.5),
            (0.6, f64::NAN),
            (f64::NAN, 0.05),
            (1.5, 0.05),
            (0.6, -0.1),
            (0.6, 1.01),
            (f64::INFINITY, 0.05),
        ] {
            assert!(
                matches!(with(after, p), Err(ConfigError::InvalidEarlyStop { .. })),
                "accepted ({after}, {p})"
            );
        }

        assert!(with(0.0, 0.0).is_ok());
        assert!(with(1.0, 1.0).is_ok());
        assert!(RunRequest::new(100, 10)
            .with_early_stop(None)
            .validate(kind)
            .is_ok());
    }

    #[test]
    fn early_stop_threshold() {
        let hook = EarlyStop::default();
        assert!(!hook.eligible(13, 23));
        assert!(hook.eligible(14, 23));
    }
}

//! Iterative approximation algorithms run by the producer thread.
//!
//! Both algorithms are mocks: the classifier draws a random separating line,
//! the clusterer scatters samples across `k` random clusters. What matters is
//! the checkpoint protocol in [`IterativeAlgorithm::run`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::ResultChannel;
use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::prng::Prng;
use crate::snapshot::{LineCoefficients, ResultSnapshot};

// Keeps the early-stop draws independent of the algorithm's own stream.
const HOOK_SALT: u64 = 0xA076_1D64_78BD_642F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AlgorithmKind {
    Classification,
    Clustering,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmKind::Classification => f.write_str("classification"),
            AlgorithmKind::Clustering => f.write_str("clustering"),
        }
    }
}

/// How a producer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// All iterations ran.
    Completed { iterations: usize },
    /// The early-stop hook fired at `iteration`.
    EarlyStopped { iteration: usize },
    /// Halt requested; observed at the top of `iteration`.
    Halted { iteration: usize },
}

impl RunEnd {
    /// Natural completion (including early stop): `done` must be raised.
    pub fn finished(&self) -> bool {
        !matches!(self, RunEnd::Halted { .. })
    }
}

/// What the producer thread lends to a running algorithm.
pub struct ProducerContext<'a> {
    channel: &'a ResultChannel,
    halt: &'a AtomicBool,
}

impl<'a> ProducerContext<'a> {
    pub fn new(channel: &'a ResultChannel, halt: &'a AtomicBool) -> Self {
        Self { channel, halt }
    }

    pub fn halted(&self) -> bool {
        self.halt.load(Ordering::Acquire)
    }

    pub fn publish(&self, snapshot: ResultSnapshot) {
        let iteration = snapshot.iteration();
        let depth = self.channel.add(snapshot);
        debug!(iteration, depth, "producer published snapshot");
    }
}

pub trait IterativeAlgorithm: Send {
    fn kind(&self) -> AlgorithmKind;

    fn config(&self) -> &RunConfig;

    /// Recompute the result for 1-based `iteration`.
    fn step(&mut self, iteration: usize);

    /// Immutable copy of the current result.
    fn snapshot(&self, iteration: usize) -> ResultSnapshot;

    /// Iterate, publishing at every checkpoint, until done or halted.
    fn run(&mut self, ctx: &ProducerContext<'_>) -> RunEnd {
        let cfg = self.config().clone();
        let max = cfg.max_iterations();
        let mut hook_rng = match cfg.seed() {
            Some(seed) => Prng::new(seed ^ HOOK_SALT),
            None => Prng::from_clock(),
        };

        for i in 1..=max {
            if ctx.halted() {
                return RunEnd::Halted { iteration: i };
            }

            self.step(i);

            let periodic = cfg.publishes_at(i);
            if periodic {
                ctx.publish(self.snapshot(i));
            }

            if let Some(hook) = cfg.early_stop() {
                if hook.eligible(i, max) && hook_rng.chance(hook.probability) {
                    if !periodic {
                        ctx.publish(self.snapshot(i));
                    }
                    return RunEnd::EarlyStopped { iteration: i };
                }
            }
        }
        RunEnd::Completed { iterations: max }
    }
}

/// Build the algorithm for `kind`.
pub fn build(
    kind: AlgorithmKind,
    dataset: Arc<RwLock<Dataset>>,
    config: RunConfig,
) -> Box<dyn IterativeAlgorithm> {
    match kind {
        AlgorithmKind::Classification => Box::new(RandomClassifier::new(config)),
        AlgorithmKind::Clustering => Box::new(RandomClusterer::new(dataset, config)),
    }
}

fn seeded(config: &RunConfig) -> Prng {
    config.seed().map(Prng::new).unwrap_or_else(Prng::from_clock)
}

pub struct RandomClassifier {
    config: RunConfig,
    rng: Prng,
    output: LineCoefficients,
}

impl RandomClassifier {
    pub fn new(config: RunConfig) -> Self {
        let rng = seeded(&config);
        Self {
            config,
            rng,
            output: LineCoefficients::new(0, 10, 0),
        }
    }
}

impl IterativeAlgorithm for RandomClassifier {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Classification
    }

    fn config(&self) -> &RunConfig {
        &self.config
    }

    fn step(&mut self, _iteration: usize) {
        let r = self.rng.next_f64_01();
        let x_coefficient = -(((2.0 * r - 1.0) * 10.0).round() as i64);
        let constant = self.rng.gen_range_inclusive(0, 10);
        self.output = LineCoefficients::new(x_coefficient, 10, constant);
    }

    fn snapshot(&self, iteration: usize) -> ResultSnapshot {
        ResultSnapshot::Classification {
            iteration,
            line: self.output,
        }
    }
}

pub struct RandomClusterer {
    dataset: Arc<RwLock<Dataset>>,
    config: RunConfig,
    rng: Prng,
}

impl RandomClusterer {
    pub fn new(dataset: Arc<RwLock<Dataset>>, config: RunConfig) -> Self {
        let rng = seeded(&config);
        Self {
            dataset,
            config,
            rng,
        }
    }
}

impl IterativeAlgorithm for RandomClusterer {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Clustering
    }

    fn config(&self) -> &RunConfig {
        &self.config
    }

    fn step(&mut self, _iteration: usize) {
        let k = self.config.cluster_count();
        let rng = &mut self.rng;
        self.dataset
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .relabel_with(|_| rng.gen_range_usize(0, k).to_string());
    }

    fn snapshot(&self, iteration: usize) -> ResultSnapshot {
        let labels = self
            .dataset
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .label_map();
        ResultSnapshot::Clustering { iteration, labels }
    }
}

//! Named 2-D samples and the tab-separated ingestion format.
//!
//! One sample per line: `@name \t label \t x,y`. Names must start with `@` and
//! be unique. All malformed lines are collected and reported together.

use std::path::Path;

use hashbrown::{HashMap, HashSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, LineError, LineErrorKind};

pub const NAME_MARKER: char = '@';

/// Distinct labels kept by ingestion; anything beyond is truncated.
pub const MAX_LABELS: usize = 10;

/// Name → label, copied out of a dataset at a checkpoint.
pub type LabelMap = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    pub name: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    fn of(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let mut b = Bounds::point(first.x, first.y);
        for s in &samples[1..] {
            b.include(s.x, s.y);
        }
        Some(b)
    }

    fn point(x: f64, y: f64) -> Self {
        Bounds {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn padded(&self, by: f64) -> Self {
        Bounds {
            min_x: self.min_x - by,
            max_x: self.max_x + by,
            min_y: self.min_y - by,
            max_y: self.max_y + by,
        }
    }
}

/// Raised when a file carries more than [`MAX_LABELS`] distinct labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityWarning {
    pub labels_found: usize,
    pub samples_dropped: usize,
}

impl CapacityWarning {
    pub fn notice(&self) -> (&'static str, String) {
        (
            "Too Many Labels",
            format!(
                "Loaded data has {} labels. Only the first {} were kept ({} instance(s) dropped).",
                self.labels_found, MAX_LABELS, self.samples_dropped
            ),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub dataset: Dataset,
    pub warning: Option<CapacityWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
    index: HashMap<String, usize>,
    bounds: Option<Bounds>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the tab-separated format.
    pub fn from_tsd(text: &str) -> Result<Ingested, IngestError> {
        let mut dataset = Dataset::new();
        let mut errors = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let parsed = parse_line(line).and_then(|sample| dataset.insert(sample));
            if let Err(kind) = parsed {
                errors.push(LineError {
                    line: idx + 1,
                    kind,
                });
            }
        }

        if !errors.is_empty() {
            return Err(IngestError { errors });
        }

        let warning = dataset.truncate_labels(MAX_LABELS);
        Ok(Ingested { dataset, warning })
    }

    /// Append a sample. Duplicate names are rejected.
    pub fn insert(&mut self, sample: Sample) -> Result<(), LineErrorKind> {
        if self.index.contains_key(&sample.name) {
            return Err(LineErrorKind::DuplicateName(sample.name));
        }
        self.bounds = Some(match self.bounds {
            Some(mut b) => {
                b.include(sample.x, sample.y);
                b
            }
            None => Bounds::point(sample.x, sample.y),
        });
        self.index.insert(sample.name.clone(), self.samples.len());
        self.samples.push(sample);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.index.get(name).map(|&i| &self.samples[i])
    }

    /// `None` for an empty dataset.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn set_label(&mut self, name: &str, label: impl Into<String>) -> bool {
        match self.index.get(name) {
            Some(&i) => {
                self.samples[i].label = label.into();
                true
            }
            None => false,
        }
    }

    /// Reassign every label in place.
    pub fn relabel_with(&mut self, mut f: impl FnMut(&Sample) -> String) {
        for s in &mut self.samples {
            s.label = f(s);
        }
    }

    /// Deep copy of the current name → label assignment.
    pub fn label_map(&self) -> LabelMap {
        self.samples
            .iter()
            .map(|s| (s.name.clone(), s.label.clone()))
            .collect()
    }

    /// Distinct labels in first-seen order.
    pub fn distinct_labels(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.samples
            .iter()
            .map(|s| s.label.as_str())
            .filter(|l| seen.insert(*l))
            .collect()
    }

    /// The mock classifier separates at most two classes.
    pub fn supports_classification(&self) -> bool {
        self.distinct_labels().len() <= 2
    }

    pub fn summary(&self, source: Option<&Path>) -> String {
        let labels = self.distinct_labels();
        let mut out = format!("{} instances with {} labels", self.len(), labels.len());
        match source {
            Some(path) => out.push_str(&format!(" loaded from:\n{}", path.display())),
            None => out.push('.'),
        }
        out.push_str("\nThe labels are:\n");
        out.push_str(&labels.join(", "));
        out
    }

    fn truncate_labels(&mut self, keep: usize) -> Option<CapacityWarning> {
        let labels: Vec<String> = self
            .distinct_labels()
            .into_iter()
            .map(str::to_string)
            .collect();
        if labels.len() <= keep {
            return None;
        }

        let kept: HashSet<&str> = labels[..keep].iter().map(String::as_str).collect();
        let before = self.samples.len();
        let samples: Vec<Sample> = std::mem::take(&mut self.samples)
            .into_iter()
            .filter(|s| kept.contains(s.label.as_str()))
            .collect();

        self.index = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        self.bounds = Bounds::of(&samples);
        self.samples = samples;

        Some(CapacityWarning {
            labels_found: labels.len(),
            samples_dropped: before - self.samples.len(),
        })
    }
}

fn parse_line(line: &str) -> Result<Sample, LineErrorKind> {
    let mut fields = line.split('\t');

    let name = fields.next().unwrap_or_default().trim();
    if !name.starts_with(NAME_MARKER) {
        return Err(LineErrorKind::InvalidName(name.to_string()));
    }
    let label = fields.next().ok_or(LineErrorKind::MissingField)?.trim();
    let coords = fields.next().ok_or(LineErrorKind::MissingField)?;

    let pair = coords.trim().trim_matches('"');
    let (x, y) = pair
        .split_once(',')
        .and_then(|(x, y)| Some((x.trim().parse::<f64>().ok()?, y.trim().parse::<f64>().ok()?)))
        .ok_or_else(|| LineErrorKind::InvalidCoordinates(coords.trim().to_string()))?;

    Ok(Sample {
        name: name.to_string(),
        label: label.to_string(),
        x,
        y,
    })
}

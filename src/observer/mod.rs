use crate::dataset::{Bounds, Dataset, Sample};
use crate::snapshot::{LineCoefficients, ResultSnapshot};
use crate::ui::{RenderCommand, Series, REGRESSION_SERIES};

/// Axis padding around the data, in data units.
pub const FRAME_PADDING: f64 = 1.0;

/// A frozen, read-only copy of the dataset geometry taken when a run starts.
///
/// Design intent:
/// - The consumer thread turns snapshots into render commands without ever
///   touching the live dataset the producer is relabelling.
/// - Positions and bounds never change during a run, only labels do, and
///   labels arrive inside the snapshots.
#[derive(Debug, Clone)]
pub struct DatasetView {
    samples: Vec<Sample>,
    bounds: Bounds,
}

impl DatasetView {
    /// `None` for an empty dataset.
    pub fn capture(dataset: &Dataset) -> Option<Self> {
        Some(Self {
            bounds: dataset.bounds()?,
            samples: dataset.samples().to_vec(),
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn frame(&self) -> RenderCommand {
        RenderCommand::Frame {
            bounds: self.bounds.padded(FRAME_PADDING),
        }
    }

    /// Points grouped by the labels they were loaded with.
    pub fn initial_partition(&self) -> RenderCommand {
        RenderCommand::Partition {
            series: partition(self.samples.iter().map(|s| (s, s.label.as_str()))),
        }
    }

    /// `None` if the snapshot cannot be drawn (a vertical line).
    pub fn project(&self, snapshot: &ResultSnapshot) -> Option<RenderCommand> {
        match snapshot {
            ResultSnapshot::Classification { line, .. } => {
                regression(line, &self.bounds).map(|series| RenderCommand::ReplaceSeries { series })
            }
            ResultSnapshot::Clustering { labels, .. } => {
                let labelled = self.samples.iter().map(|s| {
                    let label = labels.get(&s.name).map_or(s.label.as_str(), String::as_str);
                    (s, label)
                });
                Some(RenderCommand::Partition {
                    series: partition(labelled),
                })
            }
        }
    }
}

/// Two-point segment across the data's x range.
fn regression(line: &LineCoefficients, bounds: &Bounds) -> Option<Series> {
    let y1 = line.y_at(bounds.min_x)?;
    let y2 = line.y_at(bounds.max_x)?;
    Some(Series {
        name: REGRESSION_SERIES.to_string(),
        points: vec![(bounds.min_x, y1), (bounds.max_x, y2)],
    })
}

/// One series per label, in first-seen order.
fn partition<'a>(labelled: impl Iterator<Item = (&'a Sample, &'a str)>) -> Vec<Series> {
    let mut out: Vec<Series> = Vec::new();
    for (sample, label) in labelled {
        let point = (sample.x, sample.y);
        match out.iter_mut().find(|s| s.name == label) {
            Some(series) => series.points.push(point),
            None => out.push(Series {
                name: label.to_string(),
                points: vec![point],
            }),
        }
    }
    out
}

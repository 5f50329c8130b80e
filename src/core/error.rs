use thiserror::Error;

/// Rejected run configuration. The run never starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max iterations must be non-negative, got {0}")]
    NegativeIterations(i64),

    #[error("update interval must be non-negative, got {0}")]
    NegativeInterval(i64),

    /// Zero and negative counts are rejected; positive counts are clamped.
    #[error("cluster count must be a positive integer, got {0}")]
    InvalidClusterCount(i64),

    /// Early-stop fraction and probability must both lie in `[0, 1]`.
    #[error("invalid early stop: after_fraction {after_fraction}, probability {probability}")]
    InvalidEarlyStop {
        after_fraction: f64,
        probability: f64,
    },

    #[error("no run configuration found: max iterations and update interval are both zero")]
    NoRunConfiguration,

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("classification needs at most 2 distinct labels, dataset has {labels}")]
    TooManyLabels { labels: usize },
}

/// What went wrong on a single ingestion line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineErrorKind {
    #[error("invalid name '{0}', all data instance names must start with the @ character")]
    InvalidName(String),

    #[error("instance '{0}' already exists")]
    DuplicateName(String),

    #[error("correct input must be [@instance \\t label \\t x,y]")]
    MissingField,

    #[error("invalid coordinate pair '{0}'")]
    InvalidCoordinates(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error in line {line}: {kind}")]
pub struct LineError {
    /// 1-based line number.
    pub line: usize,
    pub kind: LineErrorKind,
}

/// Every malformed line of one ingestion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} malformed line(s){}", .errors.len(), join_lines(.errors))]
pub struct IngestError {
    pub errors: Vec<LineError>,
}

fn join_lines(errors: &[LineError]) -> String {
    errors.iter().map(|e| format!("\n{e}")).collect()
}

/// Errors returned by [`crate::controller::ExecutionController`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("an algorithm is already running")]
    AlreadyRunning,

    #[error("no paused run to advance")]
    NotPaused,

    #[error(transparent)]
    Ingestion(#[from] IngestError),

    #[error("could not start worker thread: {0}")]
    Spawn(String),
}

impl ControlError {
    /// `(title, message)` for the notification sink.
    pub fn notice(&self) -> (&'static str, String) {
        let title = match self {
            ControlError::Config(_) | ControlError::Spawn(_) => "Cannot Run",
            ControlError::AlreadyRunning => "Algorithm Running",
            ControlError::NotPaused => "Nothing To Advance",
            ControlError::Ingestion(_) => "Invalid Data",
        };
        (title, self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_error_lists_every_line() {
        let err = IngestError {
            errors: vec![
                LineError {
                    line: 2,
                    kind: LineErrorKind::InvalidName("a".into()),
                },
                LineError {
                    line: 5,
                    kind: LineErrorKind::MissingField,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 malformed line(s)"));
        assert!(text.contains("error in line 2"));
        assert!(text.contains("error in line 5"));
    }

    #[test]
    fn notice_titles() {
        let (title, msg) = ControlError::from(ConfigError::NegativeIterations(-1)).notice();
        assert_eq!(title, "Cannot Run");
        assert!(msg.contains("-1"));
        assert_eq!(ControlError::AlreadyRunning.notice().0, "Algorithm Running");
    }
}

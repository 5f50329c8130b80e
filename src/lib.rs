//! # vilij
//!
//! Threaded execution pipeline for iterative 2-D data algorithms.
//!
//! A producer thread runs a classification or clustering algorithm and
//! publishes intermediate results into a [`channel::ResultChannel`]. A
//! consumer thread drains it, turns each result into a render command, and
//! paces delivery either one step at a time or continuously. The
//! [`controller::ExecutionController`] owns the pair and tears it down
//! cooperatively.
//!
//! ## Quick Start
//!
//! ```
//! use vilij::prelude::*;
//!
//! let dataset = Dataset::from_tsd("@a\tred\t0,0\n@b\tblue\t3,2\n")
//!     .unwrap()
//!     .dataset;
//! let (ui, inbox) = ui_queue();
//! let mut controller = ExecutionController::new(dataset, ui);
//!
//! let request = RunRequest::new(10, 5).with_seed(7);
//! controller.start(&request, AlgorithmKind::Classification).unwrap();
//!
//! // The UI thread pumps `inbox` into its renderer; here we just stop.
//! controller.request_cancel();
//! # drop(inbox);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialization of snapshots, UI events and requests
//!
//! ## Modules
//!
//! - [`dataset`]: Tab-separated ingestion and the labelled point set
//! - [`algorithm`]: Iterative algorithms and their producer loop
//! - [`channel`]: Interruptible FIFO between producer and consumer
//! - [`pipeline`]: Worker threads and shared run state
//! - [`controller`]: Run lifecycle
//! - [`ui`]: Event marshalling onto the UI thread
//! - [`observer`]: Snapshot to render-command projection

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/dataset.rs"]
pub mod dataset;

#[path = "core/snapshot.rs"]
pub mod snapshot;

#[path = "core/channel.rs"]
pub mod channel;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/algorithm.rs"]
pub mod algorithm;

#[path = "core/ui.rs"]
pub mod ui;

#[path = "core/pipeline.rs"]
pub mod pipeline;

#[path = "core/controller.rs"]
pub mod controller;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use vilij::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algorithm::{AlgorithmKind, IterativeAlgorithm, ProducerContext, RunEnd};
    pub use crate::channel::{Interrupt, ResultChannel};
    pub use crate::config::{EarlyStop, RunConfig, RunRequest};
    pub use crate::controller::ExecutionController;
    pub use crate::dataset::{Bounds, CapacityWarning, Dataset, Ingested, Sample};
    pub use crate::error::{ConfigError, ControlError, IngestError};
    pub use crate::pipeline::{ExecutionState, Teardown};
    pub use crate::snapshot::{LineCoefficients, ResultSnapshot};
    pub use crate::ui::{
        ui_queue, Confirmation, NotificationSink, RenderCommand, Renderer, Series, UiEvent,
        UiHandle, UiInbox,
    };
}

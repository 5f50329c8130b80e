//! The only component the rest of the application talks to.
//!
//! The controller owns the shared channel, flags and resume gate, spawns at
//! most one producer/consumer pair at a time, and tears it down
//! cooperatively. Calls are expected from the UI thread.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::algorithm::{self, AlgorithmKind};
use crate::channel::{Interrupt, ResultChannel};
use crate::config::{RunConfig, RunRequest};
use crate::dataset::{CapacityWarning, Dataset};
use crate::error::{ConfigError, ControlError, Result};
use crate::observer::DatasetView;
pub use crate::pipeline::{ExecutionState, Teardown};
use crate::pipeline::{
    panic_message, spawn_producer, Consumer, ProducerHandle, ResumeGate, Signals, RUN_FAILED_TITLE,
};
use crate::ui::{Confirmation, NotificationSink, UiHandle};

pub const STOP_RUN_TITLE: &str = "Algorithm Running";
pub const STOP_RUN_MESSAGE: &str =
    "An algorithm is still running. Stop it and discard its progress?";

struct ActiveRun {
    producer: ProducerHandle,
    consumer: JoinHandle<Teardown>,
}

pub struct ExecutionController {
    dataset: Arc<RwLock<Dataset>>,
    channel: Arc<ResultChannel>,
    signals: Arc<Signals>,
    gate: Arc<ResumeGate>,
    ui: UiHandle,
    config: Option<RunConfig>,
    is_first_run: bool,
    active: Option<ActiveRun>,
}

impl ExecutionController {
    pub fn new(dataset: Dataset, ui: UiHandle) -> Self {
        Self {
            dataset: Arc::new(RwLock::new(dataset)),
            channel: Arc::new(ResultChannel::new()),
            signals: Arc::new(Signals::default()),
            gate: Arc::new(ResumeGate::default()),
            ui,
            config: None,
            is_first_run: true,
            active: None,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.signals.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// `true` until a run is launched, and again once it has been torn down.
    pub fn is_first_run(&self) -> bool {
        self.is_first_run
    }

    /// Configuration of the current or most recent run.
    pub fn config(&self) -> Option<&RunConfig> {
        self.config.as_ref()
    }

    /// Copy of the live dataset, labels included.
    pub fn dataset(&self) -> Dataset {
        self.dataset
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the dataset with freshly ingested text.
    pub fn load(&mut self, text: &str) -> Result<Option<CapacityWarning>> {
        if self.is_running() {
            return Err(ControlError::AlreadyRunning);
        }
        let ingested = Dataset::from_tsd(text)?;
        self.reap();
        *self.dataset.write().unwrap_or_else(PoisonError::into_inner) = ingested.dataset;
        Ok(ingested.warning)
    }

    /// Validate `request`, then launch a producer/consumer pair.
    pub fn start(&mut self, request: &RunRequest, kind: AlgorithmKind) -> Result<()> {
        if self.is_running() {
            return Err(ControlError::AlreadyRunning);
        }
        let config = request.validate(kind)?;
        let view = {
            let dataset = self.dataset.read().unwrap_or_else(PoisonError::into_inner);
            if kind == AlgorithmKind::Classification && !dataset.supports_classification() {
                return Err(ConfigError::TooManyLabels {
                    labels: dataset.distinct_labels().len(),
                }
                .into());
            }
            DatasetView::capture(&dataset).ok_or(ConfigError::EmptyDataset)?
        };

        // Previous pair (if any) is joined here, so nothing writes to the
        // channel while it is cleared.
        self.reap();
        self.channel.clear();
        self.gate.reset();
        self.signals.reset();

        self.ui.render(view.frame());
        self.ui.render(view.initial_partition());
        self.signals.set_state(ExecutionState::Running);
        self.ui.state(ExecutionState::Running);

        let algo = algorithm::build(kind, Arc::clone(&self.dataset), config.clone());
        let producer = spawn_producer(algo, Arc::clone(&self.channel), Arc::clone(&self.signals))
            .map_err(|e| self.abort_launch(None, e))?;

        let consumer = Consumer {
            channel: Arc::clone(&self.channel),
            signals: Arc::clone(&self.signals),
            gate: Arc::clone(&self.gate),
            producer: producer.token(),
            view,
            ui: self.ui.clone(),
            continuous: config.continuous(),
            pacing: config.pacing(),
        };
        let consumer = match consumer.spawn() {
            Ok(handle) => handle,
            Err(e) => return Err(self.abort_launch(Some(producer), e)),
        };

        info!(
            %kind,
            max_iterations = config.max_iterations(),
            update_interval = config.update_interval(),
            continuous = config.continuous(),
            cluster_count = config.cluster_count(),
            "run started"
        );
        self.active = Some(ActiveRun { producer, consumer });
        self.config = Some(config);
        self.is_first_run = false;
        Ok(())
    }

    fn abort_launch(&self, producer: Option<ProducerHandle>, err: io::Error) -> ControlError {
        warn!(%err, "could not spawn worker thread");
        if let Some(producer) = producer {
            producer.halt();
            producer.join();
        }
        self.signals.reset();
        self.channel.clear();
        self.signals.set_state(ExecutionState::Idle);
        self.ui.state(ExecutionState::Idle);
        ControlError::Spawn(err.to_string())
    }

    /// Release a paused consumer for exactly one more snapshot.
    pub fn advance_one_step(&self) -> Result<()> {
        if self.state() != ExecutionState::Paused {
            return Err(ControlError::NotPaused);
        }
        self.gate.resume();
        Ok(())
    }

    /// The single "Run" button: launch on first use, then step.
    pub fn run_or_advance(&mut self, request: &RunRequest, kind: AlgorithmKind) -> Result<()> {
        if self.is_first_run || self.state() == ExecutionState::Done {
            self.start(request, kind)
        } else {
            self.advance_one_step()
        }
    }

    /// Stop the current run and wait until both workers have exited.
    ///
    /// Returns the consumer's teardown, or `None` if there was nothing to
    /// cancel.
    pub fn request_cancel(&mut self) -> Option<Teardown> {
        let run = self.active.take()?;

        if self.state().is_active() {
            self.signals.set_state(ExecutionState::Cancelling);
            self.ui.state(ExecutionState::Cancelling);
            self.signals.cancel.store(true, Ordering::Release);
            if !self.signals.is_done() {
                run.producer.halt();
            }
            self.channel.interrupt(Interrupt::Reset);
            self.gate.interrupt(Interrupt::Reset);
        }

        let teardown = self.join(run);
        self.signals.reset();
        if self.state() != ExecutionState::Idle {
            self.signals.set_state(ExecutionState::Idle);
            self.ui.state(ExecutionState::Idle);
        }
        self.is_first_run = true;
        Some(teardown)
    }

    /// Ask before stopping an active run; cancels only on `Yes`.
    pub fn confirm_and_cancel(&mut self, sink: &mut dyn NotificationSink) -> bool {
        if !self.is_running() {
            return false;
        }
        match sink.confirm(STOP_RUN_TITLE, STOP_RUN_MESSAGE) {
            Some(Confirmation::Yes) => self.request_cancel().is_some(),
            _ => false,
        }
    }

    /// Reap a finished run and return to Idle.
    pub fn acknowledge(&mut self) -> Option<Teardown> {
        if self.state() != ExecutionState::Done {
            return None;
        }
        let teardown = self.reap();
        self.signals.set_state(ExecutionState::Idle);
        self.ui.state(ExecutionState::Idle);
        teardown
    }

    fn reap(&mut self) -> Option<Teardown> {
        let run = self.active.take()?;
        let teardown = self.join(run);
        self.is_first_run = true;
        Some(teardown)
    }

    fn join(&self, run: ActiveRun) -> Teardown {
        let teardown = run.consumer.join().unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            self.ui.notice(RUN_FAILED_TITLE, reason.clone());
            Teardown::Unexpected { reason }
        });
        run.producer.join();
        teardown
    }
}

impl Drop for ExecutionController {
    fn drop(&mut self) {
        self.request_cancel();
    }
}

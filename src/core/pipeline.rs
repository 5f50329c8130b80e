//! Producer and consumer threads plus the primitives they share.
//!
//! Cancellation is cooperative: the producer polls its [`HaltToken`] at the top
//! of every iteration, and the consumer's two blocking points (the channel and
//! the [`ResumeGate`]) are woken by an explicit [`Interrupt`]. No thread is
//! ever killed.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::algorithm::{IterativeAlgorithm, ProducerContext};
use crate::channel::{Interrupt, ResultChannel};
use crate::observer::DatasetView;
use crate::ui::UiHandle;

pub const RUN_FINISHED_TITLE: &str = "Run Finished";
pub const RUN_FINISHED_MESSAGE: &str = "The algorithm has finished running.";
pub const RUN_FAILED_TITLE: &str = "Run Finished Unexpectedly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Paused,
    Cancelling,
    Done,
}

impl ExecutionState {
    /// A producer/consumer pair exists and has not finished.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExecutionState::Running | ExecutionState::Paused | ExecutionState::Cancelling
        )
    }
}

/// How the consumer left its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teardown {
    /// Producer finished and every snapshot was delivered.
    Completed { delivered: usize },
    /// Explicit cancel/reset; nothing is surfaced to the user.
    Cancelled { delivered: usize },
    /// Anything else, e.g. a producer panic.
    Unexpected { reason: String },
}

/// Flags shared by the controller and both workers.
#[derive(Debug, Default)]
pub(crate) struct Signals {
    /// Set by the producer strictly after its last publish.
    pub done: AtomicBool,
    /// Set by the controller to request teardown.
    pub cancel: AtomicBool,
    fault: Mutex<Option<String>>,
    state: Mutex<ExecutionState>,
}

impl Signals {
    pub fn state(&self) -> ExecutionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_state(&self, next: ExecutionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn record_fault(&self, reason: String) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
    }

    pub fn fault(&self) -> Option<String> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Back to a blank slate for the next run.
    pub fn reset(&self) {
        self.done.store(false, Ordering::Release);
        self.cancel.store(false, Ordering::Release);
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[derive(Debug, Default)]
struct GateInner {
    resume: bool,
    interrupt: Option<Interrupt>,
}

/// Pause/resume hand-off for step mode, also used for the interruptible
/// continuous-mode sleep.
#[derive(Debug, Default)]
pub(crate) struct ResumeGate {
    inner: Mutex<GateInner>,
    cv: Condvar,
}

impl ResumeGate {
    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until resumed or interrupted. Interruption wins over a pending
    /// resume.
    pub fn wait(&self) -> Result<(), Interrupt> {
        let mut inner = self.lock();
        loop {
            if let Some(reason) = inner.interrupt {
                return Err(reason);
            }
            if inner.resume {
                inner.resume = false;
                return Ok(());
            }
            inner = self.cv.wait(inner).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sleep for `pacing`, returning early on interruption.
    pub fn sleep(&self, pacing: Duration) -> Result<(), Interrupt> {
        let inner = self.lock();
        let (inner, _) = self
            .cv
            .wait_timeout_while(inner, pacing, |g| g.interrupt.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        match inner.interrupt {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    pub fn resume(&self) {
        self.lock().resume = true;
        self.cv.notify_all();
    }

    pub fn interrupt(&self, reason: Interrupt) {
        self.lock().interrupt = Some(reason);
        self.cv.notify_all();
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.resume = false;
        inner.interrupt = None;
    }
}

/// Cooperative stop request for one producer.
#[derive(Debug, Clone, Default)]
pub struct HaltToken(Arc<AtomicBool>);

impl HaltToken {
    pub fn halt(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The controller's direct handle on its producer thread.
#[derive(Debug)]
pub(crate) struct ProducerHandle {
    halt: HaltToken,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    pub fn token(&self) -> HaltToken {
        self.halt.clone()
    }

    pub fn halt(&self) {
        self.halt.halt();
    }

    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            // Producer panics are caught inside the thread.
            let _ = thread.join();
        }
    }
}

/// Run `algo` on a dedicated thread.
pub(crate) fn spawn_producer(
    mut algo: Box<dyn IterativeAlgorithm>,
    channel: Arc<ResultChannel>,
    signals: Arc<Signals>,
) -> io::Result<ProducerHandle> {
    let halt = HaltToken::default();
    let token = halt.clone();
    let thread = thread::Builder::new()
        .name("vilij-producer".to_string())
        .spawn(move || {
            let kind = algo.kind();
            info!(%kind, "producer started");
            let ctx = ProducerContext::new(&channel, &token.0);
            match panic::catch_unwind(AssertUnwindSafe(|| algo.run(&ctx))) {
                Ok(end) if end.finished() => {
                    signals.done.store(true, Ordering::Release);
                    channel.interrupt(Interrupt::Closed);
                    info!(?end, "producer finished");
                }
                Ok(end) => info!(?end, "producer halted"),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(%reason, "producer panicked");
                    signals.record_fault(reason);
                    channel.interrupt(Interrupt::Closed);
                }
            }
        })?;

    Ok(ProducerHandle {
        halt,
        thread: Some(thread),
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker thread panicked".to_string()
    }
}

/// Drains the channel, posts render commands to the UI queue and paces.
pub(crate) struct Consumer {
    pub channel: Arc<ResultChannel>,
    pub signals: Arc<Signals>,
    pub gate: Arc<ResumeGate>,
    pub producer: HaltToken,
    pub view: DatasetView,
    pub ui: UiHandle,
    pub continuous: bool,
    pub pacing: Duration,
}

impl Consumer {
    pub fn spawn(self) -> io::Result<JoinHandle<Teardown>> {
        thread::Builder::new()
            .name("vilij-consumer".to_string())
            .spawn(move || self.run())
    }

    fn run(self) -> Teardown {
        let mut delivered = 0;

        let teardown = loop {
            if let Some(teardown) = self.pending_teardown(delivered) {
                break teardown;
            }

            let snapshot = match self.channel.take() {
                Ok(snapshot) => snapshot,
                Err(interrupt) => {
                    debug!(?interrupt, "consumer wait interrupted");
                    match self.pending_teardown(delivered) {
                        Some(teardown) => break teardown,
                        None => {
                            break Teardown::Unexpected {
                                reason: format!("wait interrupted ({interrupt:?}) mid-run"),
                            }
                        }
                    }
                }
            };

            match self.view.project(&snapshot) {
                Some(command) => {
                    self.ui.render(command);
                }
                None => warn!(iteration = snapshot.iteration(), "snapshot cannot be drawn"),
            }
            delivered += 1;
            debug!(
                iteration = snapshot.iteration(),
                queued = self.channel.len(),
                "consumer delivered snapshot"
            );

            let paced = if self.continuous {
                self.gate.sleep(self.pacing)
            } else {
                self.transition(ExecutionState::Paused);
                let resumed = self.gate.wait();
                if resumed.is_ok() {
                    self.transition(ExecutionState::Running);
                }
                resumed
            };
            if let Err(interrupt) = paced {
                debug!(?interrupt, "consumer pacing interrupted");
            }
        };

        self.finish(teardown)
    }

    fn pending_teardown(&self, delivered: usize) -> Option<Teardown> {
        if self.signals.is_cancelled() {
            return Some(Teardown::Cancelled { delivered });
        }
        if let Some(reason) = self.signals.fault() {
            return Some(Teardown::Unexpected { reason });
        }
        if self.signals.is_done() && self.channel.is_empty() {
            return Some(Teardown::Completed { delivered });
        }
        None
    }

    fn transition(&self, state: ExecutionState) {
        self.signals.set_state(state);
        self.ui.state(state);
    }

    fn finish(self, teardown: Teardown) -> Teardown {
        if !self.signals.is_done() {
            self.producer.halt();
        }

        match &teardown {
            Teardown::Cancelled { delivered } => {
                self.signals.reset();
                self.transition(ExecutionState::Idle);
                info!(delivered, "run cancelled");
            }
            Teardown::Completed { delivered } => {
                self.ui.notice(RUN_FINISHED_TITLE, RUN_FINISHED_MESSAGE);
                self.transition(ExecutionState::Done);
                info!(delivered, "run finished");
            }
            Teardown::Unexpected { reason } => {
                self.ui.notice(RUN_FAILED_TITLE, reason.clone());
                self.transition(ExecutionState::Done);
                warn!(%reason, "run finished unexpectedly");
            }
        }
        teardown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmKind;
    use crate::config::{RunConfig, RunRequest};
    use crate::dataset::Dataset;
    use crate::snapshot::{LineCoefficients, ResultSnapshot};
    use crate::ui::{ui_queue, UiEvent};
    use std::time::Instant;

    struct Exploding {
        config: RunConfig,
        explode_at: usize,
    }

    impl IterativeAlgorithm for Exploding {
        fn kind(&self) -> AlgorithmKind {
            AlgorithmKind::Classification
        }

        fn config(&self) -> &RunConfig {
            &self.config
        }

        fn step(&mut self, iteration: usize) {
            if iteration == self.explode_at {
                panic!("diverged at {iteration}");
            }
        }

        fn snapshot(&self, iteration: usize) -> ResultSnapshot {
            ResultSnapshot::Classification {
                iteration,
                line: LineCoefficients::new(1, 10, 0),
            }
        }
    }

    fn view() -> DatasetView {
        let ds = Dataset::from_tsd("@a\tx\t0,0\n@b\ty\t4,2").unwrap().dataset;
        DatasetView::capture(&ds).unwrap()
    }

    #[test]
    fn gate_resume_before_wait_is_not_lost() {
        let gate = ResumeGate::default();
        gate.resume();
        assert_eq!(gate.wait(), Ok(()));
    }

    #[test]
    fn gate_interrupt_wins_and_wakes_sleep() {
        let gate = Arc::new(ResumeGate::default());
        let sleeper = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let started = Instant::now();
                (gate.sleep(Duration::from_secs(30)), started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        gate.interrupt(Interrupt::Reset);
        let (res, waited) = sleeper.join().unwrap();
        assert_eq!(res, Err(Interrupt::Reset));
        assert!(waited < Duration::from_secs(5));

        gate.resume();
        assert_eq!(gate.wait(), Err(Interrupt::Reset));
        gate.reset();
        assert_eq!(gate.sleep(Duration::from_millis(1)), Ok(()));
    }

    #[test]
    fn producer_panic_becomes_unexpected_teardown() {
        let config = RunRequest::new(10, 1)
            .with_continuous(true)
            .with_pacing(Duration::from_millis(1))
            .with_early_stop(None)
            .validate(AlgorithmKind::Classification)
            .unwrap();
        let channel = Arc::new(ResultChannel::new());
        let signals = Arc::new(Signals::default());
        let gate = Arc::new(ResumeGate::default());
        let (ui, inbox) = ui_queue();

        let producer = spawn_producer(
            Box::new(Exploding {
                config,
                explode_at: 4,
            }),
            Arc::clone(&channel),
            Arc::clone(&signals),
        )
        .unwrap();
        let consumer = Consumer {
            channel: Arc::clone(&channel),
            signals: Arc::clone(&signals),
            gate,
            producer: producer.token(),
            view: view(),
            ui,
            continuous: true,
            pacing: Duration::from_millis(1),
        }
        .spawn()
        .unwrap();

        let teardown = consumer.join().unwrap();
        producer.join();

        match teardown {
            Teardown::Unexpected { reason } => assert!(reason.contains("diverged at 4")),
            other => panic!("unexpected teardown {other:?}"),
        }
        assert!(!signals.is_done());
        assert_eq!(signals.state(), ExecutionState::Done);

        let notices: Vec<String> = std::iter::from_fn(|| inbox.try_next())
            .filter_map(|e| match e {
                UiEvent::Notice { title, .. } => Some(title),
                _ => None,
            })
            .collect();
        assert_eq!(notices, vec![RUN_FAILED_TITLE.to_string()]);
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let p: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(p.as_ref()), "static");
        let p: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");
        let p: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(p.as_ref()), "worker thread panicked");
    }
}

//! The UI thread's side of the pipeline.
//!
//! Worker threads never call into the renderer. They post [`UiEvent`]s through
//! a [`UiHandle`]; the UI thread owns the [`UiInbox`] and pumps events into its
//! [`Renderer`] and [`NotificationSink`] from its own loop.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::Bounds;
use crate::pipeline::ExecutionState;

/// Name of the classifier's line series; a new one replaces the old.
pub const REGRESSION_SERIES: &str = "Regression";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "command"))]
pub enum RenderCommand {
    /// Fixed axis ranges for the run.
    Frame { bounds: Bounds },
    /// Replace the series of the same name.
    ReplaceSeries { series: Series },
    /// Redraw every point grouped by label.
    Partition { series: Vec<Series> },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event"))]
pub enum UiEvent {
    Render { command: RenderCommand },
    Notice { title: String, message: String },
    State { state: ExecutionState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Confirmation {
    Yes,
    No,
    Cancel,
}

pub trait Renderer {
    fn frame(&mut self, bounds: Bounds);

    fn replace_series(&mut self, series: Series);

    fn show_partition(&mut self, series: Vec<Series>);

    fn state_changed(&mut self, _state: ExecutionState) {}
}

pub trait NotificationSink {
    fn notify(&mut self, title: &str, message: &str);

    /// `None` when the dialog is dismissed without a choice.
    fn confirm(&mut self, title: &str, message: &str) -> Option<Confirmation>;
}

/// Create the UI queue. The inbox stays on the UI thread.
pub fn ui_queue() -> (UiHandle, UiInbox) {
    let (tx, rx) = mpsc::channel();
    (UiHandle { tx }, UiInbox { rx })
}

#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: Sender<UiEvent>,
}

impl UiHandle {
    /// `false` once the UI side has gone away.
    pub fn post(&self, event: UiEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn render(&self, command: RenderCommand) -> bool {
        self.post(UiEvent::Render { command })
    }

    pub fn notice(&self, title: &str, message: impl Into<String>) -> bool {
        self.post(UiEvent::Notice {
            title: title.to_string(),
            message: message.into(),
        })
    }

    pub fn state(&self, state: ExecutionState) -> bool {
        self.post(UiEvent::State { state })
    }
}

#[derive(Debug)]
pub struct UiInbox {
    rx: Receiver<UiEvent>,
}

impl UiInbox {
    /// Apply every queued event; returns how many were handled.
    pub fn pump(&self, renderer: &mut dyn Renderer, sink: &mut dyn NotificationSink) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            dispatch(event, renderer, sink);
            handled += 1;
        }
        handled
    }

    pub fn try_next(&self) -> Option<UiEvent> {
        self.rx.try_recv().ok()
    }

    /// Block for the next event; `None` on timeout or when every handle is gone.
    pub fn next_timeout(&self, timeout: Duration) -> Option<UiEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

pub fn dispatch(event: UiEvent, renderer: &mut dyn Renderer, sink: &mut dyn NotificationSink) {
    match event {
        UiEvent::Render { command } => match command {
            RenderCommand::Frame { bounds } => renderer.frame(bounds),
            RenderCommand::ReplaceSeries { series } => renderer.replace_series(series),
            RenderCommand::Partition { series } => renderer.show_partition(series),
        },
        UiEvent::Notice { title, message } => sink.notify(&title, &message),
        UiEvent::State { state } => renderer.state_changed(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Chart {
        frames: usize,
        series: Vec<Series>,
        partitions: usize,
        states: Vec<ExecutionState>,
    }

    impl Renderer for Chart {
        fn frame(&mut self, _bounds: Bounds) {
            self.frames += 1;
        }

        fn replace_series(&mut self, series: Series) {
            self.series.retain(|s| s.name != series.name);
            self.series.push(series);
        }

        fn show_partition(&mut self, _series: Vec<Series>) {
            self.partitions += 1;
        }

        fn state_changed(&mut self, state: ExecutionState) {
            self.states.push(state);
        }
    }

    #[derive(Default)]
    struct Dialogs(Vec<(String, String)>);

    impl NotificationSink for Dialogs {
        fn notify(&mut self, title: &str, message: &str) {
            self.0.push((title.to_string(), message.to_string()));
        }

        fn confirm(&mut self, _title: &str, _message: &str) -> Option<Confirmation> {
            None
        }
    }

    fn regression(y: f64) -> Series {
        Series {
            name: REGRESSION_SERIES.to_string(),
            points: vec![(0.0, y), (1.0, y)],
        }
    }

    #[test]
    fn pump_routes_every_event() {
        let (handle, inbox) = ui_queue();
        let worker = handle.clone();
        std::thread::spawn(move || {
            worker.render(RenderCommand::ReplaceSeries {
                series: regression(1.0),
            });
            worker.render(RenderCommand::ReplaceSeries {
                series: regression(2.0),
            });
            worker.state(ExecutionState::Paused);
            worker.notice("Done", "finished");
        })
        .join()
        .unwrap();

        let mut chart = Chart::default();
        let mut dialogs = Dialogs::default();
        assert_eq!(inbox.pump(&mut chart, &mut dialogs), 4);

        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].points[0].1, 2.0);
        assert_eq!(chart.states, vec![ExecutionState::Paused]);
        assert_eq!(dialogs.0, vec![("Done".to_string(), "finished".to_string())]);
        assert!(inbox.try_next().is_none());
    }

    #[test]
    fn post_fails_once_inbox_is_dropped() {
        let (handle, inbox) = ui_queue();
        drop(inbox);
        assert!(!handle.state(ExecutionState::Idle));
    }
}

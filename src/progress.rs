//! Progress reporting for operations of unknown duration.
//!
//! The work runs on its own tokio task. The calling task ticks on a fixed
//! interval and nudges a counter forward by one step per tick; when the
//! worker's `JoinHandle` resolves the counter is forced to 100. The counter
//! is a liveness indicator, not a measure of real completion.
//!
//! Updates flow to the renderer as [`ProgressEvent`]s over an unbounded
//! channel. Only the ticking task writes progress; the worker just finishes.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::error::ProbeError;

/// Value reported once an operation has finished.
pub const COMPLETE: u8 = 100;

/// Highest value a tick can reach. 100 is reserved for completion.
const TICK_CEILING: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A new task appears at 0%.
    Started { task: usize, description: String },
    Update { task: usize, percent: u8 },
    Relabel { task: usize, description: String },
    /// Always preceded by an `Update` to 100.
    Finished { task: usize },
}

/// Sending half of the progress channel. A disabled sink drops events.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is drawing; progress is best effort.
            let _ = tx.send(event);
        }
    }

    pub fn start(&self, task: usize, description: &str) {
        self.emit(ProgressEvent::Started {
            task,
            description: description.to_string(),
        });
    }

    pub fn update(&self, task: usize, percent: u8) {
        self.emit(ProgressEvent::Update {
            task,
            percent: percent.min(COMPLETE),
        });
    }

    pub fn relabel(&self, task: usize, description: &str) {
        self.emit(ProgressEvent::Relabel {
            task,
            description: description.to_string(),
        });
    }

    pub fn finish(&self, task: usize) {
        self.update(task, COMPLETE);
        self.emit(ProgressEvent::Finished { task });
    }
}

/// Polling progress: drives a tick counter while a worker runs.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sink: ProgressSink,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(sink: ProgressSink, interval: Duration) -> Self {
        Self {
            sink,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn sink(&self) -> &ProgressSink {
        &self.sink
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `work` on a separate task and report progress until it is done.
    ///
    /// Returns the worker's output, or `ProbeError::Worker` if it panicked.
    /// Whatever happens, the task is reported at 100% before returning.
    pub async fn track<F, T>(&self, task: usize, work: F) -> Result<T, ProbeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut worker = tokio::spawn(work);

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks: u32 = 0;
        let joined = loop {
            tokio::select! {
                biased;
                res = &mut worker => break res,
                _ = ticker.tick() => {
                    ticks = ticks.saturating_add(1);
                    self.sink.update(task, tick_percent(ticks));
                }
            }
        };

        debug!(task, ticks, "worker finished");
        self.sink.finish(task);

        joined.map_err(|e| ProbeError::Worker(e.to_string()))
    }
}

/// Display value for a tick count.
pub fn tick_percent(ticks: u32) -> u8 {
    ticks.min(TICK_CEILING) as u8
}

/// Deterministic progress advanced in explicit steps as phases complete.
pub struct PhasedProgress<'a> {
    sink: &'a ProgressSink,
    task: usize,
    percent: u32,
}

impl<'a> PhasedProgress<'a> {
    pub fn new(sink: &'a ProgressSink, task: usize) -> Self {
        Self {
            sink,
            task,
            percent: 0,
        }
    }

    /// Advance by `step` points and show `description`.
    pub fn advance(&mut self, step: u8, description: &str) {
        self.percent = (self.percent + u32::from(step)).min(u32::from(COMPLETE));
        self.sink.relabel(self.task, description);
        self.sink.update(self.task, self.percent as u8);
    }

    pub fn percent(&self) -> u8 {
        self.percent as u8
    }

    /// Snap to 100 and close the task.
    pub fn complete(self, description: &str) {
        self.sink.relabel(self.task, description);
        self.sink.finish(self.task);
    }
}

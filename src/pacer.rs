//! Typewriter-style output stage.
//!
//! Text arrives from the network in bursts; [`PacedEmitter`] queues it one
//! `char` at a time on a bounded channel and a single consumer task writes each
//! character to the display, then waits for the next tick. Order is FIFO and
//! nothing is dropped unless the call is cancelled.

use std::io::Write;
use std::time::Duration;

use perplexity_api::{await_or_cancel, is_cancelled, CancellationSignal, PerplexityApiError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3);

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";

#[derive(Debug, Clone)]
pub struct PacerConfig {
    /// Channel capacity in characters.
    pub capacity: usize,
    /// Delay between two written characters.
    pub interval: Duration,
    /// Hide the terminal cursor while the consumer runs.
    pub hide_cursor: bool,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            interval: DEFAULT_INTERVAL,
            hide_cursor: false,
        }
    }
}

impl PacerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_hidden_cursor(mut self, hide_cursor: bool) -> Self {
        self.hide_cursor = hide_cursor;
        self
    }
}

/// What the consumer task did before it exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerReport {
    pub written: usize,
    /// Characters still queued when cancellation stopped the consumer.
    pub discarded: usize,
    pub cancelled: bool,
    /// A display write failed; later characters were consumed but not shown.
    pub display_failed: bool,
}

/// Producer handle of the pacing stage. Must be closed with
/// [`PacedEmitter::finish`], which joins the consumer task.
#[derive(Debug)]
pub struct PacedEmitter {
    sender: Option<mpsc::Sender<char>>,
    task: JoinHandle<PacerReport>,
    cancel: CancellationSignal,
}

impl PacedEmitter {
    /// Spawns the consumer task on the current tokio runtime.
    pub fn spawn<W>(sink: W, config: PacerConfig, cancel: CancellationSignal) -> Self
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let task = tokio::spawn(run_consumer(sink, receiver, config, cancel.clone()));
        Self {
            sender: Some(sender),
            task,
            cancel,
        }
    }

    /// Queues every character of `text`, waiting for capacity when the buffer
    /// is full.
    pub async fn emit(&self, text: &str) -> Result<(), PerplexityApiError> {
        for ch in text.chars() {
            self.emit_char(ch).await?;
        }
        Ok(())
    }

    pub async fn emit_char(&self, ch: char) -> Result<(), PerplexityApiError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(PerplexityApiError::JoinError(
                "output channel already closed".to_owned(),
            ));
        };

        match await_or_cancel(sender.send(ch), Some(&self.cancel)).await? {
            Ok(()) => Ok(()),
            Err(_) if is_cancelled(Some(&self.cancel)) => Err(PerplexityApiError::Cancelled),
            Err(_) => Err(PerplexityApiError::JoinError(
                "output task exited early".to_owned(),
            )),
        }
    }

    /// Closes the channel and waits for the consumer to drain and exit.
    pub async fn finish(self) -> Result<PacerReport, PerplexityApiError> {
        let Self { sender, task, .. } = self;
        drop(sender);
        let report = task
            .await
            .map_err(|error| PerplexityApiError::JoinError(error.to_string()))?;
        tracing::debug!(
            written = report.written,
            discarded = report.discarded,
            cancelled = report.cancelled,
            "output task joined"
        );
        Ok(report)
    }
}

async fn run_consumer<W: Write>(
    mut sink: W,
    mut receiver: mpsc::Receiver<char>,
    config: PacerConfig,
    cancel: CancellationSignal,
) -> PacerReport {
    let mut report = PacerReport::default();
    let mut ticker = tokio::time::interval(config.interval.max(Duration::from_micros(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if config.hide_cursor {
        write_display(&mut sink, HIDE_CURSOR, &mut report);
    }

    loop {
        let next = match await_or_cancel(receiver.recv(), Some(&cancel)).await {
            Ok(next) => next,
            Err(_) => {
                report.cancelled = true;
                break;
            }
        };
        let Some(ch) = next else {
            break;
        };

        if report.display_failed {
            continue;
        }
        let mut encoded = [0u8; 4];
        if write_display(&mut sink, ch.encode_utf8(&mut encoded), &mut report) {
            report.written += 1;
        }

        if await_or_cancel(ticker.tick(), Some(&cancel)).await.is_err() {
            report.cancelled = true;
            break;
        }
    }

    if report.cancelled {
        receiver.close();
        while receiver.try_recv().is_ok() {
            report.discarded += 1;
        }
    }

    if config.hide_cursor && !report.display_failed {
        write_display(&mut sink, SHOW_CURSOR, &mut report);
    }

    report
}

/// Writes and flushes `text`; returns false and records the failure otherwise.
fn write_display<W: Write>(sink: &mut W, text: &str, report: &mut PacerReport) -> bool {
    match sink
        .write_all(text.as_bytes())
        .and_then(|()| sink.flush())
    {
        Ok(()) => true,
        Err(error) => {
            if !report.display_failed {
                tracing::warn!(%error, "display write failed; discarding further output");
            }
            report.display_failed = true;
            false
        }
    }
}

//! Progress and log notifications for long-running pipeline operations,
//! plus cooperative cancellation.
//!
//! Every long-running operation takes a [`Reporter`]. Events are
//! fire-and-forget: nothing waits for a caller to consume them, and a caller
//! that stops listening never stalls the pipeline.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::info;

use crate::error::{FaultsenseError, Result};

/// One notification from a running pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Completion percentage (0-100) and stage description.
    Progress { percent: u8, stage: String },
    /// Free-text diagnostic line.
    Log(String),
}

/// Receiver side of pipeline events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Sink that forwards events over a channel.
///
/// Sending on a channel whose receiver is gone is silently ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<PipelineEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: Sender<PipelineEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: PipelineEvent) {
        self(event);
    }
}

/// Shared cancellation flag, checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns [`FaultsenseError::Cancelled`] once [`cancel`](Self::cancel)
    /// has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FaultsenseError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Emits progress and log events for one pipeline run.
///
/// Percentages are clamped to 0-100 and never go backwards within a run.
pub struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    last_percent: AtomicU8,
    cancel: Option<CancellationToken>,
}

impl<'a> Reporter<'a> {
    #[must_use]
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last_percent: AtomicU8::new(0),
            cancel: None,
        }
    }

    /// Reporter that goes nowhere.
    #[must_use]
    pub fn silent() -> Reporter<'static> {
        Reporter::new(&NullSink)
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn progress(&self, percent: u8, stage: impl Into<String>) {
        let requested = percent.min(100);
        let previous = self.last_percent.fetch_max(requested, Ordering::SeqCst);
        self.sink.emit(PipelineEvent::Progress {
            percent: previous.max(requested),
            stage: stage.into(),
        });
    }

    /// Emit a log line. Also recorded through `tracing`.
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        info!(target: "faultsense::pipeline", "{line}");
        self.sink.emit(PipelineEvent::Log(line));
    }

    /// # Errors
    ///
    /// Returns [`FaultsenseError::Cancelled`] if the attached token was
    /// cancelled.
    pub fn checkpoint(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let seen = Mutex::new(Vec::new());
        let sink = |e: PipelineEvent| {
            if let PipelineEvent::Progress { percent, .. } = e {
                seen.lock().unwrap().push(percent);
            }
        };
        let reporter = Reporter::new(&sink);
        reporter.progress(10, "loading");
        reporter.progress(60, "mining");
        reporter.progress(40, "late message");
        reporter.progress(250, "done");
        assert_eq!(*seen.lock().unwrap(), vec![10, 60, 60, 100]);
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = ChannelSink::new(tx);
        let reporter = Reporter::new(&sink);
        reporter.log("first");
        assert_eq!(rx.recv().unwrap(), PipelineEvent::Log("first".to_string()));
        drop(rx);
        reporter.log("nobody listening");
    }

    #[test]
    fn test_cancellation_checkpoint() {
        let token = CancellationToken::new();
        let reporter = Reporter::silent().with_cancellation(token.clone());
        assert!(reporter.checkpoint().is_ok());
        token.cancel();
        assert!(matches!(
            reporter.checkpoint(),
            Err(FaultsenseError::Cancelled)
        ));
    }

    #[test]
    fn test_silent_reporter_without_token() {
        let reporter = Reporter::silent();
        reporter.progress(50, "halfway");
        assert!(reporter.checkpoint().is_ok());
    }
}

//! Progress reporting for the search loop.

use std::sync::Arc;

/// Receives loop progress. `finish` is called exactly once per `start`.
pub trait ProgressSink: Send + Sync {
    /// A loop of at most `total` iterations is starting.
    fn start(&self, total: usize);
    /// `done` iterations have completed.
    fn advance(&self, done: usize);
    /// The loop has stopped, for whatever reason.
    fn finish(&self);
}

/// Default sink: reports through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn start(&self, total: usize) {
        tracing::debug!(total, "search progress started");
    }

    fn advance(&self, done: usize) {
        tracing::trace!(done, "search iteration");
    }

    fn finish(&self) {
        tracing::debug!("search progress finished");
    }
}

/// Finishes the sink when dropped, so every loop exit releases it.
pub(crate) struct ProgressGuard {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressGuard {
    /// Start `sink` when `enabled`; otherwise the guard is inert.
    pub(crate) fn start(sink: &Arc<dyn ProgressSink>, enabled: bool, total: usize) -> Self {
        let sink = enabled.then(|| Arc::clone(sink));
        if let Some(sink) = &sink {
            sink.start(total);
        }
        Self { sink }
    }

    pub(crate) fn advance(&self, done: usize) {
        if let Some(sink) = &self.sink {
            sink.advance(done);
        }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.finish();
        }
    }
}

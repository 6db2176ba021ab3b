// src/log.rs

/// Receives the human-readable progress lines of a batch or restore.
///
/// Every operation takes its sink as an argument so callers decide where lines
/// go: the terminal, a worker channel, or a buffer in tests.
pub trait LogSink {
    fn log(&self, message: &str);

    /// Called after each feature of a batch completes.
    fn progress(&self, _completed: usize, _total: usize) {}
}

/// Forwards progress lines to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn progress(&self, completed: usize, total: usize) {
        tracing::debug!("Progress {}/{}", completed, total);
    }
}

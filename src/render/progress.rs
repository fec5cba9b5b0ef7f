//! Progress reporting and cancellation for long-running renders

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, SonoscapeError};

/// Receives human-readable status messages from a render
pub trait ProgressSink {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str),
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Forwards progress messages to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str) {
        info!(target: "sonoscape::progress", "{}", message);
    }
}

/// Discards progress messages
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _message: &str) {}
}

/// Shared cancellation flag
///
/// Clones observe the same flag. Cancellation is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SonoscapeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let messages = Mutex::new(Vec::new());
        let sink = |m: &str| messages.lock().unwrap().push(m.to_string());
        sink.report("Rendering audio...");
        assert_eq!(messages.lock().unwrap().as_slice(), ["Rendering audio..."]);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());

        token.cancel();
        assert!(worker.is_cancelled());
        assert_eq!(worker.check().unwrap_err().error_code(), "CANCELLED");
    }
}

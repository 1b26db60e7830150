//! Detached hook execution
//!
//! Post-write hooks run on their own Tokio task. Their errors and panics are
//! handed to an [`ErrorSink`] and never reach the request that triggered them.

use crate::HookError;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

/// Receiver of failures from detached hooks
pub trait ErrorSink: Send + Sync + 'static {
    /// A hook returned an error
    fn hook_failed(&self, hook: &str, error: HookError);

    /// A hook panicked
    fn hook_panicked(&self, hook: &str, message: String);
}

/// Reports hook failures as `tracing` error events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn hook_failed(&self, hook: &str, error: HookError) {
        error!(hook, %error, "hook failed");
    }

    fn hook_panicked(&self, hook: &str, message: String) {
        error!(hook, panic = %message, "hook panicked");
    }
}

/// Run `future` as a detached task
///
/// The returned handle resolves once the hook finished and its outcome was
/// reported; callers are free to drop it.
pub fn spawn_detached<F>(hook: &'static str, sink: Arc<dyn ErrorSink>, future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), HookError>> + Send + 'static,
{
    let task = tokio::spawn(future);
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => sink.hook_failed(hook, error),
            Err(join_error) if join_error.is_panic() => {
                sink.hook_panicked(hook, panic_message(join_error.into_panic()));
            }
            Err(join_error) => sink.hook_failed(hook, Box::new(join_error)),
        }
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&'static str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink remembering every report
    #[derive(Default)]
    pub struct CollectingSink {
        pub reports: Mutex<Vec<String>>,
    }

    impl ErrorSink for CollectingSink {
        fn hook_failed(&self, hook: &str, error: HookError) {
            if let Ok(mut reports) = self.reports.lock() {
                reports.push(format!("{}: error: {}", hook, error));
            }
        }

        fn hook_panicked(&self, hook: &str, message: String) {
            if let Ok(mut reports) = self.reports.lock() {
                reports.push(format!("{}: panic: {}", hook, message));
            }
        }
    }

    impl CollectingSink {
        pub fn reports(&self) -> Vec<String> {
            self.reports.lock().map(|reports| reports.clone()).unwrap_or_default()
        }
    }
}

//! Lifecycle notifications for queued jobs.

use async_trait::async_trait;
use futures::FutureExt;
use metrics::counter;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

use super::{JobError, JobRecord};

/// Failure raised by a [`NotificationHook`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification hook {hook} failed: {message}")]
    HookFailed { hook: String, message: String },

    #[error("notification hook {hook} panicked")]
    Panicked { hook: String },
}

impl NotificationError {
    pub fn failed(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Observer of job lifecycle events. Every callback is optional.
#[async_trait]
pub trait NotificationHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn dispatched(&self, _record: &JobRecord) -> Result<(), NotificationError> {
        Ok(())
    }

    async fn dequeued(&self, _record: &JobRecord) -> Result<(), NotificationError> {
        Ok(())
    }

    async fn succeeded(&self, _record: &JobRecord) -> Result<(), NotificationError> {
        Ok(())
    }

    async fn failed(&self, _record: &JobRecord, _error: &JobError) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// A lifecycle event delivered to every hook.
#[derive(Debug, Clone, Copy)]
pub enum JobEvent<'a> {
    Dispatched,
    Dequeued,
    Succeeded,
    Failed(&'a JobError),
}

impl JobEvent<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Dequeued => "dequeued",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Sequential, failure-isolated fan-out to registered hooks.
#[derive(Default)]
pub struct NotificationHub {
    hooks: RwLock<Vec<Arc<dyn NotificationHook>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks are invoked in registration order.
    pub fn add_hook(&self, hook: Arc<dyn NotificationHook>) {
        tracing::debug!(hook = hook.name(), "Notification hook added");
        self.hooks.write().push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Deliver `event` to every hook.
    ///
    /// A hook that errors or panics is logged and skipped; delivery to the
    /// remaining hooks continues and nothing is returned to the caller.
    pub async fn notify(&self, record: &JobRecord, event: JobEvent<'_>) {
        let hooks: Vec<_> = self.hooks.read().clone();

        for hook in hooks {
            let call = async {
                match event {
                    JobEvent::Dispatched => hook.dispatched(record).await,
                    JobEvent::Dequeued => hook.dequeued(record).await,
                    JobEvent::Succeeded => hook.succeeded(record).await,
                    JobEvent::Failed(error) => hook.failed(record, error).await,
                }
            };

            let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Panicked {
                    hook: hook.name().to_string(),
                }),
            };

            if let Err(e) = outcome {
                tracing::warn!(
                    hook = hook.name(),
                    event = event.as_str(),
                    job_id = %record.id,
                    error = %e,
                    "Notification hook failed"
                );
                counter!("tempo_notification_failures_total", "event" => event.as_str()).increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationHook for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn dequeued(&self, _record: &JobRecord) -> Result<(), NotificationError> {
            self.seen.lock().push(format!("{}:dequeued", self.name));
            Ok(())
        }

        async fn failed(&self, _record: &JobRecord, error: &JobError) -> Result<(), NotificationError> {
            self.seen.lock().push(format!("{}:failed:{}", self.name, error.message));
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl NotificationHook for Broken {
        async fn dequeued(&self, _record: &JobRecord) -> Result<(), NotificationError> {
            Err(NotificationError::failed("broken", "always fails"))
        }

        async fn failed(&self, _record: &JobRecord, _error: &JobError) -> Result<(), NotificationError> {
            panic!("hook blew up");
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_are_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hub = NotificationHub::new();
        hub.add_hook(Arc::new(Recorder { name: "a", seen: seen.clone() }));
        hub.add_hook(Arc::new(Broken));
        hub.add_hook(Arc::new(Recorder { name: "b", seen: seen.clone() }));

        let record = JobRecord::new("echo", Vec::new(), 0);
        hub.notify(&record, JobEvent::Dequeued).await;
        hub.notify(&record, JobEvent::Failed(&JobError::fatal("boom"))).await;

        assert_eq!(
            *seen.lock(),
            vec![
                "a:dequeued".to_string(),
                "b:dequeued".to_string(),
                "a:failed:boom".to_string(),
                "b:failed:boom".to_string(),
            ]
        );
    }
}

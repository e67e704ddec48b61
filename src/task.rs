//! Scoped Background Tasks
//!
//! A spawned tokio task whose lifetime is bound to its handle: dropping the
//! handle aborts the task. Used for every polling loop so nothing outlives
//! its consumer.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct ScopedTask {
    handle: Option<JoinHandle<()>>,
    name: &'static str,
}

impl ScopedTask {
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!("Starting background task '{}'", name);
        Self {
            handle: Some(tokio::spawn(future)),
            name,
        }
    }

    /// Run `tick` every `period`, first run immediately
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(name, async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Abort now instead of waiting for drop
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Stopped background task '{}'", self.name);
        }
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_until_dropped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let task = ScopedTask::every("counter", Duration::from_secs(15), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        drop(task);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut task = ScopedTask::spawn("idle", std::future::pending());
        assert!(!task.is_finished());
        task.cancel();
        task.cancel();
        assert!(task.is_finished());
        assert_eq!(task.name(), "idle");
    }
}

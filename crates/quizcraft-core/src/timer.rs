//! Periodic countdown task.
//!
//! A [`CountdownTimer`] owns a tokio task that invokes a callback once per
//! period until the callback asks it to stop, the timer is cancelled, or
//! the timer is dropped. Dropping always aborts the task, so a timer can
//! never outlive whatever holds it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default countdown period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a running countdown task.
#[derive(Debug)]
pub struct CountdownTimer {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Spawn a timer. `on_tick` runs after every full `period` and returns
    /// `false` to stop the timer. Must be called within a tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_tick().await {
                    tracing::debug!("countdown timer stopped");
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// True while the task is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

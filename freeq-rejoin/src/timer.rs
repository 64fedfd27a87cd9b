//! Recurring timer on the tokio runtime.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::RejoinError;

/// Handle to a timer started with [`spawn_recurring`]. Dropping it cancels
/// the timer.
pub struct TimerHandle {
    /// Set once cancelled. Ticks run while holding this lock.
    cancelled: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer. When this returns no tick is running and none will
    /// start. Must not be called from inside the timer's own callback.
    pub fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.task.abort();
    }

    /// The timer has stopped, either cancelled or by its callback breaking.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Call `callback` every `period`, first after one full period has passed.
/// The callback returns `ControlFlow::Break` to stop rescheduling.
///
/// Runs on the tokio runtime of the calling thread; fails if there is none.
/// `period` must be non-zero.
pub fn spawn_recurring<F>(
    name: &'static str,
    period: Duration,
    mut callback: F,
) -> Result<TimerHandle, RejoinError>
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| RejoinError::NoRuntime(e.to_string()))?;
    let cancelled = Arc::new(Mutex::new(false));
    let guard = Arc::clone(&cancelled);
    let task = runtime.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // skip first immediate tick
        loop {
            interval.tick().await;
            let flow = {
                let cancelled = guard.lock();
                if *cancelled {
                    break;
                }
                callback()
            };
            if flow.is_break() {
                tracing::debug!(timer = name, "timer stopped by callback");
                break;
            }
        }
    });
    tracing::debug!(timer = name, period_secs = period.as_secs(), "timer started");
    Ok(TimerHandle { cancelled, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ticks_every_period_until_break() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = spawn_recurring("test", Duration::from_secs(300), move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "no tick before the first period");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_secs(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_further_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = spawn_recurring("test", Duration::from_secs(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = spawn_recurring("test", Duration::from_secs(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .unwrap();
        drop(handle);
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fails_without_runtime() {
        let result = spawn_recurring("test", Duration::from_secs(10), || ControlFlow::Continue(()));
        assert!(matches!(result, Err(RejoinError::NoRuntime(_))));
    }
}

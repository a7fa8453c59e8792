//! Repeating timers and the main-thread task queue.
//!
//! Timers run on the tokio runtime. Work that must be serialized with the
//! host's game loop goes through [`Scheduler::run_task`] and is executed when
//! the host calls [`Scheduler::process_main_queue`] from its tick.

use digging::{TaskHandle, TickScheduler};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

type MainTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is shutting down")]
    ShuttingDown,
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

pub struct Scheduler {
    handle: Handle,
    period: Duration,
    shutdown: CancellationToken,
    active_timers: Arc<AtomicUsize>,
    main_tx: mpsc::UnboundedSender<MainTask>,
    main_rx: Mutex<mpsc::UnboundedReceiver<MainTask>>,
}

impl Scheduler {
    /// Create a scheduler on the current tokio runtime
    pub fn new(period: Duration) -> Result<Self, SchedulerError> {
        let handle = Handle::try_current().map_err(|e| SchedulerError::RuntimeError(e.to_string()))?;
        Ok(Self::with_handle(handle, period))
    }

    pub fn with_handle(handle: Handle, period: Duration) -> Self {
        let (main_tx, main_rx) = mpsc::unbounded_channel();

        Self {
            handle,
            period,
            shutdown: CancellationToken::new(),
            active_timers: Arc::new(AtomicUsize::new(0)),
            main_tx,
            main_rx: Mutex::new(main_rx),
        }
    }

    /// Interval between two runs of a repeating task
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn active_timers(&self) -> usize {
        self.active_timers.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run `task` every period, starting one period from now
    pub fn repeat<F>(&self, mut task: F) -> Result<AbortHandle, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }

        let period = self.period;
        let shutdown = self.shutdown.clone();
        let active = TimerGuard::new(Arc::clone(&self.active_timers));

        let join = self.handle.spawn(async move {
            let _active = active;
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => task(),
                }
            }
        });

        Ok(join.abort_handle())
    }

    /// Queue `task` for the next [`process_main_queue`](Self::process_main_queue)
    pub fn run_task<F>(&self, task: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }

        self.main_tx.send(Box::new(task)).map_err(|_| SchedulerError::ShuttingDown)
    }

    /// Run every queued task in submission order; returns how many ran
    pub fn process_main_queue(&self) -> usize {
        let mut queue = self.main_rx.lock();
        let mut processed = 0;

        while let Ok(task) = queue.try_recv() {
            task();
            processed += 1;
        }

        if processed > 0 {
            tracing::trace!("Processed {} main thread tasks", processed);
        }

        processed
    }

    /// Stop all timers and refuse new work. Queued main tasks are dropped.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }

        self.shutdown.cancel();

        let dropped = {
            let mut queue = self.main_rx.lock();
            let mut dropped = 0;
            while queue.try_recv().is_ok() {
                dropped += 1;
            }
            dropped
        };

        tracing::debug!("Scheduler shut down, dropped {} queued tasks", dropped);
    }
}

impl TickScheduler for Scheduler {
    fn run_task_timer(&self, task: Box<dyn FnMut() + Send + 'static>) -> Box<dyn TaskHandle> {
        match self.repeat(task) {
            Ok(handle) => Box::new(handle),
            Err(error) => {
                tracing::debug!("Timer not started: {}", error);
                Box::new(NoopTask)
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("period", &self.period)
            .field("active_timers", &self.active_timers())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Handle returned when no timer was started
struct NoopTask;

impl TaskHandle for NoopTask {
    fn cancel(&self) {}
}

/// Counts a running timer for as long as its task future is alive
struct TimerGuard(Arc<AtomicUsize>);

impl TimerGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

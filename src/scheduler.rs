//! Scheduler abstraction consumed by every time- or thread-hopping operator.
//!
//! The crate owns no event loop. Operators hand a [`Task`] to a [`Scheduler`]
//! together with an optional delay and get back a [`TaskHandle`], which is a
//! [`Subscription`] that cancels the task if it has not started yet.
//!
//! Provided schedulers:
//!
//! | Scheduler | Runs tasks on |
//! |-----------|---------------|
//! | [`TestScheduler`] | the test thread, under virtual time |
//! | [`NewThreadScheduler`] | a fresh OS thread per task |
//! | `ThreadPoolScheduler` | a `futures` thread pool (feature `futures-scheduler`) |
//! | `TokioScheduler` | a tokio runtime (feature `tokio-scheduler`) |

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

pub use std::time::{Duration, Instant};

use tracing::trace;

use crate::subscription::Subscription;

pub mod test_scheduler;
mod thread_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use test_scheduler::TestScheduler;
pub use thread_scheduler::NewThreadScheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool_scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks now or after a delay on some execution context.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Schedules `task` to run once, after `delay` if one is given.
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle;
}

// ==================== TaskHandle ====================

#[derive(Debug, Default)]
struct TaskFlags {
  cancelled: AtomicBool,
  finished: AtomicBool,
}

/// Cancellation handle of a scheduled task.
///
/// Unsubscribing before the task starts prevents it from running. A task that
/// already started runs to completion; operators make such late runs
/// unobservable on their side.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle(Arc<TaskFlags>);

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  /// A handle for work that already happened.
  pub fn finished() -> Self {
    let handle = Self::new();
    handle.mark_finished();
    handle
  }

  pub fn mark_finished(&self) { self.0.finished.store(true, Ordering::Release); }

  pub fn is_finished(&self) -> bool { self.0.finished.load(Ordering::Acquire) }

  pub fn is_cancelled(&self) -> bool { self.0.cancelled.load(Ordering::Acquire) }

  /// Runs `task` unless the handle was cancelled, then marks it finished.
  ///
  /// Scheduler implementations call this from whatever context they run on.
  pub fn execute(&self, task: Task) {
    if self.is_cancelled() {
      trace!("skipping cancelled task");
    } else {
      task();
    }
    self.mark_finished();
  }
}

impl Subscription for TaskHandle {
  fn unsubscribe(&self) { self.0.cancelled.store(true, Ordering::Release); }

  fn is_closed(&self) -> bool { self.is_cancelled() || self.is_finished() }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  #[rxsingle_macro::test]
  fn cancelled_task_is_skipped() {
    let runs = Arc::new(AtomicUsize::new(0));
    let handle = TaskHandle::new();
    handle.unsubscribe();
    let c_runs = runs.clone();
    handle.execute(Box::new(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(handle.is_finished());
  }

  #[rxsingle_macro::test]
  fn finished_handle_is_closed() {
    let handle = TaskHandle::finished();
    assert!(handle.is_closed());
    assert!(!handle.is_cancelled());
  }
}

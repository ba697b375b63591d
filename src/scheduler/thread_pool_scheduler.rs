use std::io;

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;
use tracing::trace;

use super::{Duration, Scheduler, Task, TaskHandle};

static DEFAULT_POOL: Lazy<ThreadPool> =
  Lazy::new(|| ThreadPool::new().expect("failed to build the default thread pool"));

/// Runs tasks on a `futures` thread pool; delays are `futures-time` sleeps
/// so no pool thread is blocked while waiting.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

impl ThreadPoolScheduler {
  /// A scheduler on a dedicated pool.
  pub fn new() -> io::Result<Self> { Ok(Self { pool: ThreadPool::new()? }) }

  /// A scheduler on an existing pool.
  pub fn with_pool(pool: ThreadPool) -> Self { Self { pool } }
}

impl Default for ThreadPoolScheduler {
  /// Shares one process-wide pool, created on first use.
  fn default() -> Self { Self { pool: DEFAULT_POOL.clone() } }
}

impl Scheduler for ThreadPoolScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    self.pool.spawn_ok(async move {
      if let Some(delay) = delay {
        if c_handle.is_cancelled() {
          trace!("pool task cancelled before its delay");
          c_handle.mark_finished();
          return;
        }
        futures_time::task::sleep(delay.into()).await;
      }
      c_handle.execute(task);
    });
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;

  use super::*;

  #[rxsingle_macro::test]
  fn delayed_task_runs() {
    let (tx, rx) = channel();
    ThreadPoolScheduler::default().schedule(
      Box::new(move || tx.send(7).unwrap()),
      Some(Duration::from_millis(5)),
    );
    assert_eq!(rx.recv().unwrap(), 7);
  }
}

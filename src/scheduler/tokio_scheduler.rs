use tokio::runtime::Handle;

use super::{Duration, Scheduler, Task, TaskHandle};

/// Spawns tasks on a tokio runtime, using `tokio::time` for delays.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { Self { handle } }

  /// Binds to the runtime of the calling context.
  ///
  /// Panics when called outside a tokio runtime, like [`Handle::current`].
  pub fn current() -> Self { Self { handle: Handle::current() } }
}

impl Scheduler for TokioScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    self.handle.spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      c_handle.execute(task);
    });
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  };

  use super::*;

  #[rxsingle_macro::test(threaded)]
  async fn runs_after_delay() {
    let ran = Arc::new(AtomicBool::new(false));
    let c_ran = ran.clone();
    TokioScheduler::current().schedule(
      Box::new(move || c_ran.store(true, Ordering::SeqCst)),
      Some(Duration::from_millis(5)),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(ran.load(Ordering::SeqCst));
  }
}

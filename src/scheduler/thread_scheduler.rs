use std::thread;

use tracing::trace;

use super::{Duration, Scheduler, Task, TaskHandle};

/// Runs every task on a freshly spawned OS thread.
///
/// Delayed tasks sleep on their own thread, so a cancelled delayed task still
/// holds a thread until the delay elapses; it just does nothing afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewThreadScheduler;

impl Scheduler for NewThreadScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    thread::spawn(move || {
      if let Some(delay) = delay {
        thread::sleep(delay);
      }
      trace!("new thread task started");
      c_handle.execute(task);
    });
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;

  use super::*;
  use crate::subscription::Subscription;

  #[rxsingle_macro::test]
  fn runs_on_another_thread() {
    let (tx, rx) = channel();
    let caller = thread::current().id();
    NewThreadScheduler.schedule(
      Box::new(move || tx.send(thread::current().id()).unwrap()),
      Some(Duration::from_millis(1)),
    );
    assert_ne!(rx.recv().unwrap(), caller);
  }

  #[rxsingle_macro::test]
  fn cancel_before_delay_elapses() {
    let (tx, rx) = channel::<()>();
    let handle = NewThreadScheduler.schedule(
      Box::new(move || tx.send(()).unwrap()),
      Some(Duration::from_millis(50)),
    );
    handle.unsubscribe();
    // The sender is dropped without sending once the skipped task is freed.
    assert!(rx.recv().is_err());
  }
}

//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Virtual time only advances when the test says so, which makes `delay`,
//! `timeout`, `timer` and friends fully deterministic:
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxsingle::prelude::*;
//!
//! TestScheduler::init();
//! let got = Arc::new(Mutex::new(None));
//! let c_got = got.clone();
//! single::just::<_, ()>(42)
//!   .delay(Duration::from_millis(100), TestScheduler)
//!   .subscribe(move |v| *c_got.lock().unwrap() = Some(v), |_| {});
//!
//! assert_eq!(*got.lock().unwrap(), None);
//! TestScheduler::advance_by(Duration::from_millis(100));
//! assert_eq!(*got.lock().unwrap(), Some(42));
//! ```
//!
//! # Thread Safety
//!
//! State lives in thread-local storage, so every test thread has its own
//! virtual clock and queue and parallel tests stay isolated. Tasks must be
//! `Send` only because the [`Scheduler`] trait says so; they always run on the
//! thread that advances time.

use std::{cell::RefCell, cmp::Reverse, collections::BinaryHeap};

use super::{Duration, Scheduler, Task, TaskHandle};

/// A queued task. The heap orders by `(due, seq)`, so equal instants run in
/// scheduling order.
struct Pending {
  key: Reverse<(Duration, u64)>,
  task: Task,
  handle: TaskHandle,
}

impl PartialEq for Pending {
  fn eq(&self, other: &Self) -> bool { self.key == other.key }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for Pending {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.key.cmp(&other.key) }
}

impl Pending {
  fn due(&self) -> Duration { self.key.0 .0 }
}

#[derive(Default)]
struct Clock {
  now: Duration,
  queue: BinaryHeap<Pending>,
  seq: u64,
  ready: bool,
}

thread_local! {
  static CLOCK: RefCell<Clock> = RefCell::new(Clock::default());
}

fn with_clock<R>(f: impl FnOnce(&mut Clock) -> R) -> R {
  CLOCK.with(|clock| {
    let mut clock = clock.borrow_mut();
    assert!(clock.ready, "TestScheduler::init() must be called on this thread first");
    f(&mut clock)
  })
}

/// A virtual time scheduler for deterministic testing.
///
/// Zero-sized; all instances on a thread share the same clock and queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestScheduler;

impl TestScheduler {
  /// Resets the clock to zero and drops every queued task. Call it at the
  /// start of each test.
  pub fn init() {
    CLOCK.with(|clock| *clock.borrow_mut() = Clock { ready: true, ..Clock::default() });
  }

  pub fn now() -> Duration { with_clock(|clock| clock.now) }

  /// Number of queued tasks, cancelled ones included until they are reached.
  pub fn pending_count() -> usize { with_clock(|clock| clock.queue.len()) }

  pub fn is_empty() -> bool { Self::pending_count() == 0 }

  /// Pops the next task due at or before `limit` and moves the clock to it.
  fn next_due(limit: Option<Duration>) -> Option<Pending> {
    with_clock(|clock| {
      let due = clock.queue.peek()?.due();
      if limit.is_some_and(|limit| due > limit) {
        return None;
      }
      clock.now = due;
      clock.queue.pop()
    })
  }

  fn run_until(limit: Option<Duration>) {
    // Each task runs with the clock released, so it may schedule more work.
    while let Some(Pending { task, handle, .. }) = Self::next_due(limit) {
      handle.execute(task);
    }
  }

  /// Advances virtual time by `duration`, running every task that becomes
  /// due, in time order and FIFO within the same instant.
  pub fn advance_by(duration: Duration) {
    let target = Self::now() + duration;
    Self::run_until(Some(target));
    with_clock(|clock| clock.now = target);
  }

  /// Runs every pending task, jumping the clock to each task's time.
  pub fn flush() { Self::run_until(None) }
}

impl Scheduler for TestScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    with_clock(|clock| {
      let due = clock.now + delay.unwrap_or_default();
      let seq = clock.seq;
      clock.seq += 1;
      let handle = TaskHandle::new();
      clock.queue.push(Pending { key: Reverse((due, seq)), task, handle: handle.clone() });
      handle
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{
    mem,
    sync::{Arc, Mutex},
  };

  use super::*;
  use crate::subscription::Subscription;

  fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let c_log = log.clone();
    let make = move |name: &'static str| -> Task {
      let log = c_log.clone();
      Box::new(move || log.lock().unwrap().push(name))
    };
    (log, make)
  }

  #[rxsingle_macro::test]
  fn zero_sized_and_copy() {
    assert_eq!(mem::size_of::<TestScheduler>(), 0);
    let s1 = TestScheduler;
    let _s2 = s1;
    let _s3 = s1;
  }

  #[rxsingle_macro::test]
  fn init_resets_clock() {
    TestScheduler::init();
    TestScheduler::advance_by(Duration::from_millis(100));
    assert_eq!(TestScheduler::now(), Duration::from_millis(100));
    TestScheduler::init();
    assert_eq!(TestScheduler::now(), Duration::ZERO);
    assert!(TestScheduler::is_empty());
  }

  #[rxsingle_macro::test]
  fn time_order_then_fifo() {
    TestScheduler::init();
    let (log, task) = recorder();
    TestScheduler.schedule(task("late"), Some(Duration::from_millis(20)));
    TestScheduler.schedule(task("first"), Some(Duration::from_millis(10)));
    TestScheduler.schedule(task("second"), Some(Duration::from_millis(10)));
    TestScheduler.schedule(task("now"), None);

    TestScheduler::advance_by(Duration::from_millis(10));
    assert_eq!(*log.lock().unwrap(), vec!["now", "first", "second"]);
    TestScheduler::flush();
    assert_eq!(log.lock().unwrap().last(), Some(&"late"));
    assert_eq!(TestScheduler::now(), Duration::from_millis(20));
  }

  #[rxsingle_macro::test]
  fn cancelled_task_never_runs() {
    TestScheduler::init();
    let (log, task) = recorder();
    let handle = TestScheduler.schedule(task("cancelled"), Some(Duration::from_millis(5)));
    handle.unsubscribe();
    TestScheduler::flush();
    assert!(log.lock().unwrap().is_empty());
    assert!(handle.is_closed());
  }

  #[rxsingle_macro::test]
  fn task_may_schedule_more() {
    TestScheduler::init();
    let (log, task) = recorder();
    let inner = task("inner");
    TestScheduler.schedule(
      Box::new(move || {
        TestScheduler.schedule(inner, Some(Duration::from_millis(5)));
      }),
      Some(Duration::from_millis(5)),
    );
    TestScheduler::advance_by(Duration::from_millis(5));
    assert!(log.lock().unwrap().is_empty());
    TestScheduler::advance_by(Duration::from_millis(5));
    assert_eq!(*log.lock().unwrap(), vec!["inner"]);
  }

  #[rxsingle_macro::test]
  fn uninitialized_thread_panics() {
    assert!(std::thread::spawn(TestScheduler::now).join().is_err());
  }
}

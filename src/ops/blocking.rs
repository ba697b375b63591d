//! Parks the calling thread until a source terminates.
//!
//! Useful at the edge of a program and in tests; nothing inside the crate
//! blocks. The waiting thread sleeps on a `Condvar` and is woken by whichever
//! thread delivers the terminal signal. With a deadline, giving up disposes
//! the subscription so the upstream stops working for nobody.

use std::{
  sync::{Arc, Condvar, Mutex},
  time::Instant,
};

use tracing::debug;

use crate::{
  observer::{CompletableObserver, MaybeObserver, SingleObserver},
  scheduler::Duration,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

struct Latch<T> {
  outcome: Mutex<Option<T>>,
  ready: Condvar,
  subscription: SubscriptionCell,
}

impl<T> Latch<T> {
  fn start(subscribe: impl FnOnce(LatchObserver<T>)) -> Arc<Self> {
    let latch = Arc::new(Latch {
      outcome: Mutex::new(None),
      ready: Condvar::new(),
      subscription: SubscriptionCell::new(),
    });
    subscribe(LatchObserver(latch.clone()));
    latch
  }

  fn release(&self, outcome: T) {
    *self.outcome.lock().unwrap() = Some(outcome);
    self.ready.notify_all();
  }
}

/// Stores the outcome of the source it observes into its latch.
pub struct LatchObserver<T>(Arc<Latch<T>>);

impl<Item, Err> SingleObserver<Item, Err> for LatchObserver<Result<Item, Err>>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.0.subscription.try_set(subscription);
  }

  fn on_success(self, value: Item) { self.0.release(Ok(value)) }

  fn on_error(self, err: Err) { self.0.release(Err(err)) }
}

impl<Item, Err> MaybeObserver<Item, Err> for LatchObserver<Result<Option<Item>, Err>>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.0.subscription.try_set(subscription);
  }

  fn on_success(self, value: Item) { self.0.release(Ok(Some(value))) }

  fn on_complete(self) { self.0.release(Ok(None)) }

  fn on_error(self, err: Err) { self.0.release(Err(err)) }
}

impl<Err: Send + 'static> CompletableObserver<Err> for LatchObserver<Result<(), Err>> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.0.subscription.try_set(subscription);
  }

  fn on_complete(self) { self.0.release(Ok(())) }

  fn on_error(self, err: Err) { self.0.release(Err(err)) }
}

/// Runs `subscribe` with a fresh latch observer and waits for its outcome.
pub(crate) fn wait<T>(subscribe: impl FnOnce(LatchObserver<T>)) -> T {
  let latch = Latch::start(subscribe);
  let mut outcome = latch.outcome.lock().unwrap();
  loop {
    if let Some(value) = outcome.take() {
      return value;
    }
    outcome = latch.ready.wait(outcome).unwrap();
  }
}

/// Like [`wait`], but returns `None` once `timeout` elapsed. The
/// subscription is disposed in that case.
pub(crate) fn wait_timeout<T>(
  subscribe: impl FnOnce(LatchObserver<T>),
  timeout: Duration,
) -> Option<T> {
  let deadline = Instant::now() + timeout;
  let latch = Latch::start(subscribe);
  let mut outcome = latch.outcome.lock().unwrap();
  loop {
    if let Some(value) = outcome.take() {
      return Some(value);
    }
    let now = Instant::now();
    if now >= deadline {
      break;
    }
    outcome = latch.ready.wait_timeout(outcome, deadline - now).unwrap().0;
  }
  drop(outcome);
  debug!(?timeout, "blocking wait timed out, disposing upstream");
  latch.subscription.unsubscribe();
  None
}

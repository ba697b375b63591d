//! Timeout operator.
//!
//! Races the upstream terminal signal against a timer on the scheduler. The
//! timer winning disposes the upstream and switches to a fallback source;
//! without an explicit fallback it is [`TimeoutFailure`], which fails with
//! [`TimeoutError`].
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Timeout;
//! impl From<TimeoutError> for Timeout {
//!   fn from(_: TimeoutError) -> Self { Timeout }
//! }
//!
//! TestScheduler::init();
//! let got = std::sync::Arc::new(std::sync::Mutex::new(None));
//! let c_got = got.clone();
//! single::never::<i32, Timeout>()
//!   .timeout(Duration::from_millis(50), TestScheduler)
//!   .subscribe(|_| {}, move |e| *c_got.lock().unwrap() = Some(e));
//!
//! TestScheduler::advance_by(Duration::from_millis(50));
//! assert_eq!(*got.lock().unwrap(), Some(Timeout));
//! ```

use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use tracing::debug;

use crate::{
  cell::OnceSlot,
  error::TimeoutError,
  maybe::MaybeSource,
  observer::MaybeObserver,
  scheduler::{Duration, Scheduler},
  subscription::{disposed, BoxedSubscription, Subscription, SubscriptionCell},
};

/// Fails every subscriber with `TimeoutError { bound }`.
pub struct TimeoutFailure<Item, Err> {
  bound: Duration,
  _p: PhantomData<fn() -> (Item, Err)>,
}

impl<Item, Err> TimeoutFailure<Item, Err> {
  pub fn new(bound: Duration) -> Self { Self { bound, _p: PhantomData } }
}

impl<Item, Err> MaybeSource for TimeoutFailure<Item, Err>
where
  Item: Send + 'static,
  Err: From<TimeoutError> + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    observer.on_subscribe(disposed());
    observer.on_error(TimeoutError { bound: self.bound }.into());
  }
}

pub struct Timeout<S, Sch, F> {
  source: S,
  bound: Duration,
  scheduler: Sch,
  fallback: Arc<F>,
}

impl<S, Sch, F> Timeout<S, Sch, F> {
  pub(crate) fn new(source: S, bound: Duration, scheduler: Sch, fallback: F) -> Self {
    Self { source, bound, scheduler, fallback: Arc::new(fallback) }
  }
}

impl<S, Sch, F> MaybeSource for Timeout<S, Sch, F>
where
  S: MaybeSource,
  Sch: Scheduler,
  F: MaybeSource<Item = S::Item, Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state = Arc::new(TimeoutState {
      downstream: OnceSlot::empty(),
      upstream: SubscriptionCell::new(),
      timer: SubscriptionCell::new(),
      fallback: SubscriptionCell::new(),
      done: AtomicBool::new(false),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }

    let c_state = state.clone();
    let fallback = self.fallback.clone();
    let bound = self.bound;
    let handle = self.scheduler.schedule(
      Box::new(move || c_state.fire(bound, &*fallback)),
      Some(self.bound),
    );
    state.timer.try_set(Arc::new(handle));

    self.source.actual_subscribe(TimeoutObserver { state });
  }
}

struct TimeoutState<O> {
  downstream: OnceSlot<O>,
  upstream: SubscriptionCell,
  timer: SubscriptionCell,
  fallback: SubscriptionCell,
  /// Set by whichever of upstream terminal and timer comes first.
  done: AtomicBool,
}

impl<O> TimeoutState<O> {
  fn win(&self) -> bool { !self.done.swap(true, Ordering::AcqRel) }
}

impl<O: Send> TimeoutState<O> {
  fn fire<F>(self: &Arc<Self>, bound: Duration, fallback: &F)
  where
    F: MaybeSource,
    O: MaybeObserver<F::Item, F::Err>,
  {
    if !self.win() {
      return;
    }
    self.upstream.unsubscribe();
    if self.downstream.is_closed() {
      return;
    }
    debug!(?bound, "timeout fired, switching to fallback");
    fallback.actual_subscribe(FallbackObserver { state: self.clone() });
  }
}

impl<O: Send> Subscription for TimeoutState<O> {
  fn unsubscribe(&self) {
    self.done.store(true, Ordering::Release);
    drop(self.downstream.take());
    self.upstream.unsubscribe();
    self.timer.unsubscribe();
    self.fallback.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct TimeoutObserver<O> {
  state: Arc<TimeoutState<O>>,
}

impl<O> TimeoutObserver<O> {
  fn finish(&self) -> Option<O> {
    if !self.state.win() {
      return None;
    }
    self.state.timer.unsubscribe();
    self.state.downstream.take()
  }
}

impl<Item, Err, O> MaybeObserver<Item, Err> for TimeoutObserver<O>
where
  O: MaybeObserver<Item, Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    if let Some(observer) = self.finish() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.finish() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.finish() {
      observer.on_error(err);
    }
  }
}

struct FallbackObserver<O> {
  state: Arc<TimeoutState<O>>,
}

impl<Item, Err, O> MaybeObserver<Item, Err> for FallbackObserver<O>
where
  O: MaybeObserver<Item, Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.fallback.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_error(err);
    }
  }
}

//! Cold sources shared by the `single`, `maybe` and `completable` factory
//! functions.
//!
//! Each source here implements [`MaybeSource`] only; the contract modules wrap
//! them in the matching adapter. `Empty` and `Never` carry no data and are
//! `Copy`, so every call to `maybe::empty()` hands out the same zero-sized
//! value.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::MaybeObserver,
  scheduler::{Duration, Scheduler},
  subscription::{disposed, Subscription, SubscriptionCell},
};

// ==================== Just ====================

/// Succeeds with a clone of its value on every subscription.
pub struct Just<Item, Err> {
  value: Item,
  _p: PhantomData<fn() -> Err>,
}

impl<Item, Err> Just<Item, Err> {
  pub(crate) fn new(value: Item) -> Self { Self { value, _p: PhantomData } }
}

impl<Item: Clone, Err> Clone for Just<Item, Err> {
  fn clone(&self) -> Self { Self::new(self.value.clone()) }
}

impl<Item, Err> MaybeSource for Just<Item, Err>
where
  Item: Clone + Send + Sync + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    observer.on_subscribe(disposed());
    observer.on_success(self.value.clone());
  }
}

// ==================== Fail ====================

/// Fails with a clone of its error on every subscription.
pub struct Fail<Item, Err> {
  err: Err,
  _p: PhantomData<fn() -> Item>,
}

impl<Item, Err> Fail<Item, Err> {
  pub(crate) fn new(err: Err) -> Self { Self { err, _p: PhantomData } }
}

impl<Item, Err: Clone> Clone for Fail<Item, Err> {
  fn clone(&self) -> Self { Self::new(self.err.clone()) }
}

impl<Item, Err> MaybeSource for Fail<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    observer.on_subscribe(disposed());
    observer.on_error(self.err.clone());
  }
}

// ==================== Empty / Never ====================

pub struct Empty<Item, Err>(PhantomData<fn() -> (Item, Err)>);

pub struct Never<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Empty<Item, Err> {
  pub(crate) const fn new() -> Self { Self(PhantomData) }
}

impl<Item, Err> Never<Item, Err> {
  pub(crate) const fn new() -> Self { Self(PhantomData) }
}

// Derives would demand `Item: Copy`.
impl<Item, Err> Clone for Empty<Item, Err> {
  fn clone(&self) -> Self { *self }
}
impl<Item, Err> Copy for Empty<Item, Err> {}

impl<Item, Err> Clone for Never<Item, Err> {
  fn clone(&self) -> Self { *self }
}
impl<Item, Err> Copy for Never<Item, Err> {}

impl<Item, Err> MaybeSource for Empty<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    observer.on_subscribe(disposed());
    observer.on_complete();
  }
}

impl<Item, Err> MaybeSource for Never<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  /// Keeps nothing: the observer is dropped right away and no signal ever
  /// arrives.
  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    observer.on_subscribe(Arc::new(SubscriptionCell::new()));
  }
}

// ==================== Defer ====================

/// Calls the factory on every subscription and subscribes to what it returns.
pub struct Defer<F, R, M> {
  factory: Arc<F>,
  lift: fn(R) -> M,
}

impl<F, R, M> Defer<F, R, M> {
  pub(crate) fn new(factory: F, lift: fn(R) -> M) -> Self {
    Self { factory: Arc::new(factory), lift }
  }
}

impl<F, R, M> Clone for Defer<F, R, M> {
  fn clone(&self) -> Self { Self { factory: self.factory.clone(), lift: self.lift } }
}

impl<F, R, M> MaybeSource for Defer<F, R, M>
where
  F: Fn() -> R + Send + Sync + 'static,
  R: 'static,
  M: MaybeSource,
{
  type Item = M::Item;
  type Err = M::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    (self.lift)((self.factory)()).actual_subscribe(observer)
  }
}

// ==================== Timer ====================

/// Succeeds with `0` once `delay` has elapsed on the scheduler.
pub struct Timer<Err, Sch> {
  delay: Duration,
  scheduler: Sch,
  _p: PhantomData<fn() -> Err>,
}

impl<Err, Sch> Timer<Err, Sch> {
  pub(crate) fn new(delay: Duration, scheduler: Sch) -> Self {
    Self { delay, scheduler, _p: PhantomData }
  }
}

impl<Err, Sch: Clone> Clone for Timer<Err, Sch> {
  fn clone(&self) -> Self { Self::new(self.delay, self.scheduler.clone()) }
}

impl<Err, Sch> MaybeSource for Timer<Err, Sch>
where
  Err: Send + 'static,
  Sch: Scheduler,
{
  type Item = u64;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state =
      Arc::new(TimerState { downstream: OnceSlot::empty(), task: SubscriptionCell::new() });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    let c_state = state.clone();
    let handle = self.scheduler.schedule(
      Box::new(move || {
        if let Some(observer) = c_state.downstream.take() {
          observer.on_success(0);
        }
      }),
      Some(self.delay),
    );
    state.task.try_set(Arc::new(handle));
  }
}

struct TimerState<O> {
  downstream: OnceSlot<O>,
  task: SubscriptionCell,
}

impl<O: Send> Subscription for TimerState<O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.task.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

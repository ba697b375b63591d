//! Sequential chaining across contracts: `flat_map`, `try_flat_map`,
//! `flat_map_*` and `and_then_*`.
//!
//! The downstream observer is moved from the outer observer into the inner
//! one, so only one party ever owns it. Disposal goes through a serial
//! [`SubscriptionCell`] that first holds the upstream subscription and is
//! then replaced with the inner one.

use std::sync::Arc;

use crate::{
  adapter::SingleAsMaybe,
  cell::OnceSlot,
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{MaybeObserver, Observer},
  single::SingleSource,
  subscription::{disposed, BoxedSubscription, Subscription, SubscriptionCell},
};

/// Shared handle the downstream holds: first the upstream subscription, then
/// the inner one.
type Serial = Arc<SubscriptionCell>;

fn start_serial(serial: &mut Option<Serial>, subscription: BoxedSubscription) -> Serial {
  let cell = serial.get_or_insert_with(|| Arc::new(SubscriptionCell::new())).clone();
  cell.replace(subscription);
  cell
}

// ==================== FlatMap ====================

/// Maps the value to another source and mirrors it.
///
/// `lift` turns the mapper's output into a Maybe, so Single and Completable
/// inner sources share the implementation.
pub struct FlatMap<S, F, R, M> {
  source: S,
  f: Arc<F>,
  lift: fn(R) -> M,
}

impl<S, F, R, M> FlatMap<S, F, R, M> {
  pub(crate) fn new(source: S, f: F, lift: fn(R) -> M) -> Self {
    Self { source, f: Arc::new(f), lift }
  }
}

impl<S, F, R, M> MaybeSource for FlatMap<S, F, R, M>
where
  S: MaybeSource,
  F: Fn(S::Item) -> R + Send + Sync + 'static,
  R: 'static,
  M: MaybeSource<Err = S::Err>,
{
  type Item = M::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(FlatMapObserver {
      observer,
      f: self.f.clone(),
      lift: self.lift,
      serial: None,
    })
  }
}

pub struct FlatMapObserver<O, F, R, M> {
  observer: O,
  f: Arc<F>,
  lift: fn(R) -> M,
  serial: Option<Serial>,
}

impl<Item, Err, O, F, R, M> MaybeObserver<Item, Err> for FlatMapObserver<O, F, R, M>
where
  O: MaybeObserver<M::Item, Err>,
  F: Fn(Item) -> R + Send + Sync + 'static,
  R: 'static,
  M: MaybeSource<Err = Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    let first = self.serial.is_none();
    let serial = start_serial(&mut self.serial, subscription);
    if first {
      self.observer.on_subscribe(serial);
    }
  }

  fn on_success(self, value: Item) {
    let Some(serial) = self.serial else { return };
    if serial.is_closed() {
      return;
    }
    let inner = (self.lift)((self.f)(value));
    inner.actual_subscribe(InnerObserver { observer: self.observer, serial });
  }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

/// Mirrors the inner source into the downstream.
pub struct InnerObserver<O> {
  observer: O,
  serial: Serial,
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for InnerObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.serial.replace(subscription); }
  fn on_success(self, value: Item) { self.observer.on_success(value) }
  fn on_complete(self) { self.observer.on_complete() }
  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

// ==================== Attempt ====================

/// What a fallible mapper produced: the next source, or its error.
///
/// `try_flat_map` lifts the mapper's `Result` into this, so a failed mapping
/// reaches the downstream as the terminal error through the same path as an
/// inner source would.
pub enum Attempt<M: MaybeSource> {
  Next(M),
  Failed(OnceSlot<M::Err>),
}

pub(crate) fn attempt<M: MaybeSource>(result: Result<M, M::Err>) -> Attempt<M> {
  match result {
    Ok(source) => Attempt::Next(source),
    Err(err) => Attempt::Failed(OnceSlot::new(err)),
  }
}

pub(crate) fn attempt_single<R: SingleSource>(
  result: Result<R, R::Err>,
) -> Attempt<SingleAsMaybe<R>> {
  attempt(result.map(SingleAsMaybe))
}

impl<M: MaybeSource> MaybeSource for Attempt<M> {
  type Item = M::Item;
  type Err = M::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    match self {
      Attempt::Next(source) => source.actual_subscribe(observer),
      Attempt::Failed(err) => {
        observer.on_subscribe(disposed());
        if let Some(err) = err.take() {
          observer.on_error(err);
        }
      }
    }
  }
}

// ==================== AndThen ====================

/// Subscribes `next` once the source terminates without error, whether it
/// carried a value or not.
pub struct AndThen<S, N> {
  source: S,
  next: Arc<N>,
}

impl<S, N> AndThen<S, N> {
  pub(crate) fn new(source: S, next: N) -> Self { Self { source, next: Arc::new(next) } }
}

impl<S, N> MaybeSource for AndThen<S, N>
where
  S: MaybeSource,
  N: MaybeSource<Err = S::Err>,
{
  type Item = N::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self
      .source
      .actual_subscribe(AndThenObserver { observer, next: self.next.clone(), serial: None })
  }
}

pub struct AndThenObserver<O, N> {
  observer: O,
  next: Arc<N>,
  serial: Option<Serial>,
}

impl<O, N> AndThenObserver<O, N>
where
  N: MaybeSource,
  O: MaybeObserver<N::Item, N::Err>,
{
  fn subscribe_next(self) {
    let Some(serial) = self.serial else { return };
    if !serial.is_closed() {
      self.next.actual_subscribe(InnerObserver { observer: self.observer, serial });
    }
  }
}

impl<Item, O, N> MaybeObserver<Item, N::Err> for AndThenObserver<O, N>
where
  N: MaybeSource,
  O: MaybeObserver<N::Item, N::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    let first = self.serial.is_none();
    let serial = start_serial(&mut self.serial, subscription);
    if first {
      self.observer.on_subscribe(serial);
    }
  }

  fn on_success(self, _: Item) { self.subscribe_next() }

  fn on_complete(self) { self.subscribe_next() }

  fn on_error(self, err: N::Err) { self.observer.on_error(err) }
}

// ==================== FlatMapObservable ====================

/// Maps the value to a multi-value source and mirrors its items.
///
/// An empty upstream completes the output without items.
pub struct FlatMapObservable<S, F> {
  source: S,
  f: Arc<F>,
}

impl<S, F> FlatMapObservable<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self { Self { source, f: Arc::new(f) } }
}

impl<S, F, R> ObservableSource for FlatMapObservable<S, F>
where
  S: MaybeSource,
  F: Fn(S::Item) -> R + Send + Sync + 'static,
  R: ObservableSource<Err = S::Err>,
{
  type Item = R::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(FlatMapObservableObserver {
      observer,
      f: self.f.clone(),
      serial: None,
    })
  }
}

pub struct FlatMapObservableObserver<O, F> {
  observer: O,
  f: Arc<F>,
  serial: Option<Serial>,
}

impl<Item, Err, O, F, R> MaybeObserver<Item, Err> for FlatMapObservableObserver<O, F>
where
  O: Observer<R::Item, Err>,
  F: Fn(Item) -> R + Send + Sync + 'static,
  R: ObservableSource<Err = Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    let first = self.serial.is_none();
    let serial = start_serial(&mut self.serial, subscription);
    if first {
      self.observer.on_subscribe(serial);
    }
  }

  fn on_success(self, value: Item) {
    let Some(serial) = self.serial else { return };
    if serial.is_closed() {
      return;
    }
    (self.f)(value).actual_subscribe(InnerStreamObserver { observer: self.observer, serial });
  }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

pub struct InnerStreamObserver<O> {
  observer: O,
  serial: Serial,
}

impl<Item, Err, O: Observer<Item, Err>> Observer<Item, Err> for InnerStreamObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.serial.replace(subscription); }
  fn on_next(&mut self, value: Item) { self.observer.on_next(value) }
  fn on_complete(self) { self.observer.on_complete() }
  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

//! `map`, `try_map` and `filter` on the single-shot contracts.
//!
//! These are pass-through operators: the observer wrapper is moved upstream
//! and nothing is shared, so there is no race to resolve.

use std::sync::Arc;

use crate::{
  maybe::MaybeSource,
  observer::MaybeObserver,
  subscription::BoxedSubscription,
};

// ==================== Map ====================

/// Transforms the value with `f`.
pub struct Map<S, F> {
  pub(crate) source: S,
  pub(crate) f: Arc<F>,
}

impl<S, F> Map<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self { Self { source, f: Arc::new(f) } }
}

impl<S, F, R> MaybeSource for Map<S, F>
where
  S: MaybeSource,
  F: Fn(S::Item) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  type Item = R;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(MapObserver { observer, f: self.f.clone() })
  }
}

pub struct MapObserver<O, F> {
  observer: O,
  f: Arc<F>,
}

impl<Item, Err, R, O, F> MaybeObserver<Item, Err> for MapObserver<O, F>
where
  O: MaybeObserver<R, Err>,
  F: Fn(Item) -> R + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  fn on_success(self, value: Item) { self.observer.on_success((self.f)(value)) }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

// ==================== TryMap ====================

/// Transforms the value with a fallible `f`; a failure becomes the terminal
/// error.
pub struct TryMap<S, F> {
  pub(crate) source: S,
  pub(crate) f: Arc<F>,
}

impl<S, F> TryMap<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self { Self { source, f: Arc::new(f) } }
}

impl<S, F, R> MaybeSource for TryMap<S, F>
where
  S: MaybeSource,
  F: Fn(S::Item) -> Result<R, S::Err> + Send + Sync + 'static,
  R: Send + 'static,
{
  type Item = R;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(TryMapObserver { observer, f: self.f.clone() })
  }
}

pub struct TryMapObserver<O, F> {
  observer: O,
  f: Arc<F>,
}

impl<Item, Err, R, O, F> MaybeObserver<Item, Err> for TryMapObserver<O, F>
where
  O: MaybeObserver<R, Err>,
  F: Fn(Item) -> Result<R, Err> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  fn on_success(self, value: Item) {
    match (self.f)(value) {
      Ok(mapped) => self.observer.on_success(mapped),
      Err(err) => self.observer.on_error(err),
    }
  }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

// ==================== Filter ====================

/// Keeps the value when `predicate` holds, otherwise completes empty.
pub struct Filter<S, F> {
  pub(crate) source: S,
  pub(crate) predicate: Arc<F>,
}

impl<S, F> Filter<S, F> {
  pub(crate) fn new(source: S, predicate: F) -> Self {
    Self { source, predicate: Arc::new(predicate) }
  }
}

impl<S, F> MaybeSource for Filter<S, F>
where
  S: MaybeSource,
  F: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self
      .source
      .actual_subscribe(FilterObserver { observer, predicate: self.predicate.clone() })
  }
}

pub struct FilterObserver<O, F> {
  observer: O,
  predicate: Arc<F>,
}

impl<Item, Err, O, F> MaybeObserver<Item, Err> for FilterObserver<O, F>
where
  O: MaybeObserver<Item, Err>,
  F: Fn(&Item) -> bool + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  fn on_success(self, value: Item) {
    if (self.predicate)(&value) {
      self.observer.on_success(value)
    } else {
      self.observer.on_complete()
    }
  }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

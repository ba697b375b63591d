//! The unbounded multi-value contract.
//!
//! Observables show up where a single-shot contract fans out into a stream
//! (`concat`, `repeat`, `to_observable`, `flat_map_observable`) and as the
//! control sequence of `retry_when`/`repeat_when`. The operator set is small:
//! per-item transforms, `take`, `ignore_elements` and the ordering engine.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxsingle::prelude::*;
//!
//! let sorted = Arc::new(Mutex::new(Vec::new()));
//! let c_sorted = sorted.clone();
//! observable::from_iter::<_, ()>(vec![(1, "a"), (0, "b"), (1, "c")])
//!   .order_by(|pair| pair.0)
//!   .subscribe(move |pair| c_sorted.lock().unwrap().push(pair.1), || {}, |_| {});
//! assert_eq!(*sorted.lock().unwrap(), vec!["b", "a", "c"]);
//! ```

mod create;
mod from_iter;

pub use create::{Create, ObservableEmitter};
pub use from_iter::FromIter;

use crate::{
  factory::{Empty, Fail, Just, Never},
  observer::{FnStreamObserver, Observer, Tracked},
  ops::{
    box_it::BoxedObservable,
    ignore_elements::IgnoreElements,
    order_by::{self, OrderBy},
    stream::{StreamFilter, StreamMap, StreamTryMap},
    take::Take,
    to_observable::ToObservable,
  },
  subscription::BoxedSubscription,
};

/// A source of any number of items followed by at most one terminal signal.
pub trait ObservableSource: Send + Sync + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  /// Subscribes `observer`. Implementations call `on_subscribe` first, then
  /// `on_next` any number of times and at most one terminal method.
  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>;
}

/// Operators available on every [`ObservableSource`].
pub trait ObservableExt: ObservableSource + Sized {
  // ==================== Per-item ====================

  fn map<F, R>(self, f: F) -> StreamMap<Self, F>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
  {
    StreamMap::new(self, f)
  }

  /// A failing `f` disposes the upstream and ends the stream with its error.
  fn try_map<F, R>(self, f: F) -> StreamTryMap<Self, F>
  where
    F: Fn(Self::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
  {
    StreamTryMap::new(self, f)
  }

  fn filter<F>(self, predicate: F) -> StreamFilter<Self, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    StreamFilter::new(self, predicate)
  }

  /// Completes right after the `count`th item.
  fn take(self, count: usize) -> Take<Self> { Take::new(self, count) }

  /// Drops every item and keeps the terminal signal, as a Completable.
  fn ignore_elements(self) -> IgnoreElements<Self> { IgnoreElements::new(self) }

  // ==================== Ordering ====================

  /// Buffers every item and replays them sorted by `key` once the upstream
  /// completes. Equal keys keep their arrival order.
  fn order_by<K, F>(self, key: F) -> OrderBy<Self>
  where
    K: Ord,
    F: Fn(&Self::Item) -> K + Send + Sync + 'static,
  {
    OrderBy::new(self, order_by::by_key(key))
  }

  fn order_by_descending<K, F>(self, key: F) -> OrderBy<Self>
  where
    K: Ord,
    F: Fn(&Self::Item) -> K + Send + Sync + 'static,
  {
    OrderBy::new(self, order_by::by_key_descending(key))
  }

  /// Like [`order_by`](ObservableExt::order_by) with a fallible key; its
  /// error terminates the output.
  fn try_order_by<K, F>(self, key: F) -> OrderBy<Self>
  where
    K: Ord,
    F: Fn(&Self::Item) -> Result<K, Self::Err> + Send + Sync + 'static,
  {
    OrderBy::new(self, order_by::by_fallible_key(key))
  }

  fn order_by_with<F>(self, compare: F) -> OrderBy<Self>
  where
    F: Fn(&Self::Item, &Self::Item) -> Result<std::cmp::Ordering, Self::Err>
      + Send
      + Sync
      + 'static,
  {
    OrderBy::new(self, order_by::by_comparator(compare))
  }

  // ==================== Conversion ====================

  fn box_it(self) -> BoxedObservable<Self::Item, Self::Err> { BoxedObservable::new(self) }

  // ==================== Subscribing ====================

  fn subscribe_with<O>(self, observer: O) -> BoxedSubscription
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let (tracked, handle) = Tracked::new(observer);
    self.actual_subscribe(tracked);
    handle
  }

  fn subscribe<N, C, E>(self, on_next: N, on_complete: C, on_error: E) -> BoxedSubscription
  where
    N: FnMut(Self::Item) + Send + 'static,
    C: FnOnce() + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
  {
    self.subscribe_with(FnStreamObserver { on_next, on_complete, on_error })
  }
}

impl<S: ObservableSource> ObservableExt for S {}

// ============================================================================
// Factories
// ============================================================================

pub fn from_iter<I, Err>(iter: I) -> FromIter<I, Err>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: Send + 'static,
  Err: Send + 'static,
{
  FromIter::new(iter)
}

/// Bridges a callback API; see [`ObservableEmitter`].
pub fn create<Item, Err, F>(f: F) -> Create<F, Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
  F: Fn(ObservableEmitter<Item, Err>) + Send + Sync + 'static,
{
  Create::new(f)
}

/// One item, then completion.
pub fn just<Item, Err>(value: Item) -> ToObservable<Just<Item, Err>>
where
  Item: Clone + Send + Sync + 'static,
  Err: Send + 'static,
{
  ToObservable::new(Just::new(value))
}

pub fn empty<Item, Err>() -> ToObservable<Empty<Item, Err>>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  ToObservable::new(Empty::new())
}

pub fn error<Item, Err>(err: Err) -> ToObservable<Fail<Item, Err>>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  ToObservable::new(Fail::new(err))
}

pub fn never<Item, Err>() -> ToObservable<Never<Item, Err>>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  ToObservable::new(Never::new())
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn callbacks_see_items_then_completion() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (c_next, c_done) = (log.clone(), log.clone());
    observable::from_iter::<_, ()>(1..=2).subscribe(
      move |v| c_next.lock().unwrap().push(v),
      move || c_done.lock().unwrap().push(0),
      |_| {},
    );
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 0]);
  }

  #[rxsingle_macro::test]
  fn trivial_factories() {
    let spy = TestObserver::<i32, &str>::new();
    observable::just(1).subscribe_with(spy.clone());
    observable::empty().subscribe_with(spy.clone());
    observable::error("e").subscribe_with(spy.clone());
    observable::never().subscribe_with(spy.clone());
    assert_eq!(
      spy.events(),
      vec![Event::Next(1), Event::Complete, Event::Complete, Event::Error("e")]
    );
    assert_eq!(spy.subscribe_count(), 4);
  }
}

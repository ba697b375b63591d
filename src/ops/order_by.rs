//! Sorting operator for the multi-value contract.
//!
//! The operator moves through three states:
//!
//! ```text
//!   Collecting --upstream complete--> Draining --heap empty--> Terminated
//!        \--upstream error------------------------------------^
//! ```
//!
//! While collecting, each item is appended as `(index, value)` without any
//! heap work. Completion heapifies the buffer in O(n) and pops it empty into
//! the downstream. An upstream error drops the buffer and is forwarded alone.
//!
//! Comparators are collected by [`OrderBy`] (`order_by` then any number of
//! `then_by`) and folded into one composite comparator per subscription.
//! A comparator or key failure ends the output with that error. If it
//! happens while draining, the items popped so far have already been
//! delivered, so the downstream sees a sorted prefix followed by the error.

use std::{cmp::Ordering, sync::Arc};

use tracing::trace;

use crate::{
  observable::ObservableSource,
  observer::Observer,
  ops::merge_heap::MergeHeap,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

type Comparator<T, Err> = Arc<dyn Fn(&T, &T) -> Result<Ordering, Err> + Send + Sync>;

pub(crate) fn by_key<T, Err, K, F>(key: F) -> Comparator<T, Err>
where
  K: Ord,
  F: Fn(&T) -> K + Send + Sync + 'static,
{
  Arc::new(move |a, b| Ok(key(a).cmp(&key(b))))
}

pub(crate) fn by_key_descending<T, Err, K, F>(key: F) -> Comparator<T, Err>
where
  K: Ord,
  F: Fn(&T) -> K + Send + Sync + 'static,
{
  Arc::new(move |a, b| Ok(key(b).cmp(&key(a))))
}

pub(crate) fn by_fallible_key<T, Err, K, F>(key: F) -> Comparator<T, Err>
where
  K: Ord,
  F: Fn(&T) -> Result<K, Err> + Send + Sync + 'static,
{
  Arc::new(move |a, b| Ok(key(a)?.cmp(&key(b)?)))
}

pub(crate) fn by_comparator<T, Err, F>(compare: F) -> Comparator<T, Err>
where
  F: Fn(&T, &T) -> Result<Ordering, Err> + Send + Sync + 'static,
{
  Arc::new(compare)
}

/// Left to right, the first non-equal result wins.
fn compose<T: 'static, Err: 'static>(chain: Vec<Comparator<T, Err>>) -> Comparator<T, Err> {
  if chain.len() == 1 {
    return chain[0].clone();
  }
  Arc::new(move |a, b| {
    for compare in chain.iter() {
      match compare(a, b)? {
        Ordering::Equal => continue,
        ord => return Ok(ord),
      }
    }
    Ok(Ordering::Equal)
  })
}

/// Builder and source of a sorted stream; see the module docs.
pub struct OrderBy<S: ObservableSource> {
  source: S,
  comparators: Vec<Comparator<S::Item, S::Err>>,
}

impl<S: ObservableSource> OrderBy<S> {
  pub(crate) fn new(source: S, first: Comparator<S::Item, S::Err>) -> Self {
    Self { source, comparators: vec![first] }
  }

  fn then(mut self, next: Comparator<S::Item, S::Err>) -> Self {
    self.comparators.push(next);
    self
  }

  /// Breaks ties of the previous keys by `key`, ascending.
  pub fn then_by<K, F>(self, key: F) -> Self
  where
    K: Ord,
    F: Fn(&S::Item) -> K + Send + Sync + 'static,
  {
    self.then(by_key(key))
  }

  pub fn then_by_descending<K, F>(self, key: F) -> Self
  where
    K: Ord,
    F: Fn(&S::Item) -> K + Send + Sync + 'static,
  {
    self.then(by_key_descending(key))
  }

  pub fn try_then_by<K, F>(self, key: F) -> Self
  where
    K: Ord,
    F: Fn(&S::Item) -> Result<K, S::Err> + Send + Sync + 'static,
  {
    self.then(by_fallible_key(key))
  }

  pub fn then_by_with<F>(self, compare: F) -> Self
  where
    F: Fn(&S::Item, &S::Item) -> Result<Ordering, S::Err> + Send + Sync + 'static,
  {
    self.then(by_comparator(compare))
  }
}

impl<S: ObservableSource + Clone> Clone for OrderBy<S> {
  fn clone(&self) -> Self {
    Self { source: self.source.clone(), comparators: self.comparators.clone() }
  }
}

impl<S: ObservableSource> ObservableSource for OrderBy<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(OrderByObserver {
      downstream: Some(observer),
      buffer: Vec::new(),
      next_index: 0,
      compare: compose(self.comparators.clone()),
      gate: Arc::new(SubscriptionCell::new()),
    })
  }
}

pub struct OrderByObserver<O, T, Err> {
  downstream: Option<O>,
  buffer: Vec<(u64, T)>,
  next_index: u64,
  compare: Comparator<T, Err>,
  /// Holds the upstream handle; the downstream disposing it also stops a
  /// drain in progress.
  gate: Arc<SubscriptionCell>,
}

impl<T, Err, O> Observer<T, Err> for OrderByObserver<O, T, Err>
where
  T: Send + 'static,
  Err: Send + 'static,
  O: Observer<T, Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.gate.try_set(subscription);
    if let Some(observer) = self.downstream.as_mut() {
      observer.on_subscribe(self.gate.clone());
    }
  }

  fn on_next(&mut self, value: T) {
    self.buffer.push((self.next_index, value));
    self.next_index += 1;
  }

  fn on_complete(self) {
    let Some(mut observer) = self.downstream else { return };
    let compare = &*self.compare;
    let mut heap = match MergeHeap::heapify(self.buffer, compare) {
      Ok(heap) => heap,
      Err(err) => return observer.on_error(err),
    };
    trace!(items = heap.len(), "draining sorted buffer");
    loop {
      if self.gate.is_closed() {
        return;
      }
      match heap.pop(compare) {
        Ok(Some(value)) => observer.on_next(value),
        Ok(None) => return observer.on_complete(),
        Err(err) => return observer.on_error(err),
      }
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.downstream {
      observer.on_error(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering as AtomicOrdering},
    Arc,
  };

  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn equal_keys_keep_arrival_order() {
    let spy = TestObserver::<(i32, &str), ()>::new();
    observable::from_iter(vec![(1, "a"), (0, "b"), (1, "c"), (0, "d")])
      .order_by(|pair| pair.0)
      .subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec![(0, "b"), (0, "d"), (1, "a"), (1, "c")]);
    assert_eq!(spy.events().last(), Some(&Event::Complete));
  }

  #[rxsingle_macro::test]
  fn multi_key_ordering() {
    let spy = TestObserver::<(i32, i32, i32), ()>::new();
    observable::from_iter(vec![(0, 5, 5), (1, 1, 0), (1, 1, 1)])
      .order_by_descending(|t| t.0)
      .then_by(|t| t.1)
      .then_by_descending(|t| t.2)
      .subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec![(1, 1, 1), (1, 1, 0), (0, 5, 5)]);

    let spy = TestObserver::<(i32, i32, i32), ()>::new();
    observable::from_iter(vec![(2, 0, 1), (1, 0, 0), (1, 0, 7), (1, 0, 3)])
      .order_by(|t| t.0)
      .then_by(|t| t.1)
      .then_by_descending(|t| t.2)
      .subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec![(1, 0, 7), (1, 0, 3), (1, 0, 0), (2, 0, 1)]);
  }

  #[rxsingle_macro::test]
  fn empty_input_only_completes() {
    let spy = TestObserver::<i32, ()>::new();
    observable::empty().order_by(|v: &i32| *v).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn upstream_error_drops_the_buffer() {
    let subject = PublishSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().order_by(|v| *v).subscribe_with(spy.clone());
    subject.on_next(2);
    subject.on_next(1);
    subject.on_error("upstream");
    assert_eq!(spy.events(), vec![Event::Error("upstream")]);
  }

  #[rxsingle_macro::test]
  fn key_failure_is_the_terminal_error() {
    let spy = TestObserver::<i32, &str>::new();
    observable::from_iter(vec![3, -1, 2])
      .try_order_by(|v| if *v < 0 { Err("negative key") } else { Ok(*v) })
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("negative key")]);
  }

  #[rxsingle_macro::test]
  fn comparator_failure_mid_drain_keeps_the_sorted_prefix() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c_calls = calls.clone();
    let spy = TestObserver::<i32, &str>::new();
    observable::from_iter((0..100).rev())
      .order_by_with(move |a: &i32, b: &i32| {
        if c_calls.fetch_add(1, AtomicOrdering::SeqCst) >= 400 {
          Err("comparator gave up")
        } else {
          Ok(a.cmp(b))
        }
      })
      .subscribe_with(spy.clone());

    // Heapifying 100 items takes fewer than 400 comparisons, so the failure
    // lands while draining. Current behavior: the sorted prefix already sent
    // stays delivered and the error follows it; the output is not
    // all-or-nothing.
    let values = spy.values();
    assert!(!values.is_empty() && values.len() < 100);
    assert_eq!(values, (0..values.len() as i32).collect::<Vec<_>>());
    assert_eq!(spy.events().last(), Some(&Event::Error("comparator gave up")));
  }

  #[rxsingle_macro::test]
  fn dispose_while_collecting_reaches_the_upstream() {
    let subject = PublishSubject::<i32, ()>::new();
    let spy = TestObserver::<i32, ()>::new();
    subject.clone().order_by(|v| *v).subscribe_with(spy.clone());
    spy.dispose();
    assert!(!subject.has_observers());
  }

  #[rxsingle_macro::test]
  fn then_by_with_custom_comparator() {
    let spy = TestObserver::<&str, ()>::new();
    observable::from_iter(vec!["bb", "a", "ccc", "dd"])
      .order_by(|s| s.len())
      .then_by_with(|a: &&str, b: &&str| Ok(b.cmp(a)))
      .subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec!["a", "dd", "bb", "ccc"]);
  }
}

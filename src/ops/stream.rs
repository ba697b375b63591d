//! Per-item operators of the multi-value contract.
//!
//! `StreamMap` and `StreamFilter` are plain pass-through wrappers.
//! `StreamTryMap` keeps the upstream handle so a failing mapper can dispose
//! it before reporting the error.

use std::sync::Arc;

use crate::{
  observable::ObservableSource,
  observer::Observer,
  subscription::BoxedSubscription,
};

// ==================== StreamMap ====================

pub struct StreamMap<S, F> {
  source: S,
  f: Arc<F>,
}

impl<S, F> StreamMap<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self { Self { source, f: Arc::new(f) } }
}

impl<S, F, R> ObservableSource for StreamMap<S, F>
where
  S: ObservableSource,
  F: Fn(S::Item) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  type Item = R;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(StreamMapObserver { observer, f: self.f.clone() })
  }
}

pub struct StreamMapObserver<O, F> {
  observer: O,
  f: Arc<F>,
}

impl<Item, Err, R, O, F> Observer<Item, Err> for StreamMapObserver<O, F>
where
  O: Observer<R, Err>,
  F: Fn(Item) -> R + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  fn on_next(&mut self, value: Item) { self.observer.on_next((self.f)(value)) }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

// ==================== StreamTryMap ====================

pub struct StreamTryMap<S, F> {
  source: S,
  f: Arc<F>,
}

impl<S, F> StreamTryMap<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self { Self { source, f: Arc::new(f) } }
}

impl<S, F, R> ObservableSource for StreamTryMap<S, F>
where
  S: ObservableSource,
  F: Fn(S::Item) -> Result<R, S::Err> + Send + Sync + 'static,
  R: Send + 'static,
{
  type Item = R;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(StreamTryMapObserver {
      downstream: Some(observer),
      upstream: None,
      f: self.f.clone(),
    })
  }
}

pub struct StreamTryMapObserver<O, F> {
  downstream: Option<O>,
  upstream: Option<BoxedSubscription>,
  f: Arc<F>,
}

impl<Item, Err, R, O, F> Observer<Item, Err> for StreamTryMapObserver<O, F>
where
  O: Observer<R, Err>,
  F: Fn(Item) -> Result<R, Err> + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    if let Some(observer) = self.downstream.as_mut() {
      observer.on_subscribe(subscription);
    }
  }

  fn on_next(&mut self, value: Item) {
    let Some(observer) = self.downstream.as_mut() else { return };
    match (self.f)(value) {
      Ok(mapped) => observer.on_next(mapped),
      Err(err) => {
        if let Some(upstream) = self.upstream.take() {
          upstream.unsubscribe();
        }
        if let Some(observer) = self.downstream.take() {
          observer.on_error(err);
        }
      }
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.downstream {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.downstream {
      observer.on_error(err);
    }
  }
}

// ==================== StreamFilter ====================

pub struct StreamFilter<S, F> {
  source: S,
  predicate: Arc<F>,
}

impl<S, F> StreamFilter<S, F> {
  pub(crate) fn new(source: S, predicate: F) -> Self {
    Self { source, predicate: Arc::new(predicate) }
  }
}

impl<S, F> ObservableSource for StreamFilter<S, F>
where
  S: ObservableSource,
  F: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self
      .source
      .actual_subscribe(StreamFilterObserver { observer, predicate: self.predicate.clone() })
  }
}

pub struct StreamFilterObserver<O, F> {
  observer: O,
  predicate: Arc<F>,
}

impl<Item, Err, O, F> Observer<Item, Err> for StreamFilterObserver<O, F>
where
  O: Observer<Item, Err>,
  F: Fn(&Item) -> bool + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  fn on_next(&mut self, value: Item) {
    if (self.predicate)(&value) {
      self.observer.on_next(value);
    }
  }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn map_and_filter_compose() {
    let spy = TestObserver::<i32, ()>::new();
    observable::from_iter(1..=6)
      .filter(|v| v % 2 == 0)
      .map(|v| v * 10)
      .subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec![20, 40, 60]);
    assert_eq!(spy.terminal_count(), 1);
  }

  #[rxsingle_macro::test]
  fn try_map_failure_disposes_the_upstream() {
    let subject = PublishSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject
      .clone()
      .try_map(|v| if v < 0 { Err("negative") } else { Ok(v) })
      .subscribe_with(spy.clone());
    subject.on_next(1);
    subject.on_next(-1);
    subject.on_next(2);
    assert_eq!(spy.events(), vec![Event::Next(1), Event::Error("negative")]);
    assert!(!subject.has_observers());
  }
}

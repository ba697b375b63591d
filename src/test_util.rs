//! Recording observer shared by the unit tests.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

use crate::{
  error::{CompositeError, NoSuchElementError, TimeoutError},
  observer::{CompletableObserver, MaybeObserver, Observer, SingleObserver},
  subscription::{BoxedSubscription, Subscription},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T, E> {
  Next(T),
  Success(T),
  Complete,
  Error(E),
}

/// Error type for tests of operators that build their own errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
  Upstream(&'static str),
  Timeout,
  Missing,
  Many(Vec<Failure>),
}

impl From<TimeoutError> for Failure {
  fn from(_: TimeoutError) -> Self { Failure::Timeout }
}

impl From<NoSuchElementError> for Failure {
  fn from(_: NoSuchElementError) -> Self { Failure::Missing }
}

impl From<CompositeError<Failure>> for Failure {
  fn from(errors: CompositeError<Failure>) -> Self { Failure::Many(errors.into_errors()) }
}

/// Implements every observer contract and records what it sees.
///
/// Clones share their log, so a test keeps one clone as a spy and
/// subscribes the other.
pub struct TestObserver<T, E> {
  events: Arc<Mutex<Vec<Event<T, E>>>>,
  subscription: Arc<Mutex<Option<BoxedSubscription>>>,
  subscribed: Arc<AtomicUsize>,
  /// Disposes its subscription once this many events were recorded.
  dispose_after: Option<usize>,
}

impl<T, E> Clone for TestObserver<T, E> {
  fn clone(&self) -> Self {
    Self {
      events: self.events.clone(),
      subscription: self.subscription.clone(),
      subscribed: self.subscribed.clone(),
      dispose_after: self.dispose_after,
    }
  }
}

impl<T, E> Default for TestObserver<T, E> {
  fn default() -> Self {
    Self {
      events: Arc::new(Mutex::new(Vec::new())),
      subscription: Arc::new(Mutex::new(None)),
      subscribed: Arc::new(AtomicUsize::new(0)),
      dispose_after: None,
    }
  }
}

impl<T: Clone, E: Clone> TestObserver<T, E> {
  pub fn new() -> Self { Self::default() }

  /// An observer that disposes itself after recording `events` events;
  /// `0` disposes right inside `on_subscribe`.
  pub fn disposing_after(events: usize) -> Self {
    Self { dispose_after: Some(events), ..Self::default() }
  }

  pub fn events(&self) -> Vec<Event<T, E>> { self.events.lock().unwrap().clone() }

  /// Values from `on_next` and `on_success`, in order.
  pub fn values(&self) -> Vec<T> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Next(v) | Event::Success(v) => Some(v),
        _ => None,
      })
      .collect()
  }

  pub fn is_empty(&self) -> bool { self.events.lock().unwrap().is_empty() }

  pub fn terminal_count(&self) -> usize {
    self
      .events
      .lock()
      .unwrap()
      .iter()
      .filter(|e| !matches!(e, Event::Next(_)))
      .count()
  }

  pub fn subscribe_count(&self) -> usize { self.subscribed.load(Ordering::SeqCst) }

  /// Disposes the subscription received through `on_subscribe`.
  pub fn dispose(&self) {
    let subscription = self.subscription.lock().unwrap().clone();
    if let Some(subscription) = subscription {
      subscription.unsubscribe();
    }
  }

  pub fn subscription(&self) -> Option<BoxedSubscription> {
    self.subscription.lock().unwrap().clone()
  }

  fn record(&self, event: Event<T, E>) {
    let recorded = {
      let mut events = self.events.lock().unwrap();
      events.push(event);
      events.len()
    };
    if self.dispose_after == Some(recorded) {
      self.dispose();
    }
  }

  fn subscribed(&self, subscription: BoxedSubscription) {
    self.subscribed.fetch_add(1, Ordering::SeqCst);
    *self.subscription.lock().unwrap() = Some(subscription.clone());
    if self.dispose_after == Some(0) {
      subscription.unsubscribe();
    }
  }
}

impl<T, E> SingleObserver<T, E> for TestObserver<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.subscribed(subscription) }
  fn on_success(self, value: T) { self.record(Event::Success(value)) }
  fn on_error(self, err: E) { self.record(Event::Error(err)) }
}

impl<T, E> MaybeObserver<T, E> for TestObserver<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.subscribed(subscription) }
  fn on_success(self, value: T) { self.record(Event::Success(value)) }
  fn on_complete(self) { self.record(Event::Complete) }
  fn on_error(self, err: E) { self.record(Event::Error(err)) }
}

impl<E> CompletableObserver<E> for TestObserver<(), E>
where
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.subscribed(subscription) }
  fn on_complete(self) { self.record(Event::Complete) }
  fn on_error(self, err: E) { self.record(Event::Error(err)) }
}

impl<T, E> Observer<T, E> for TestObserver<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.subscribed(subscription) }
  fn on_next(&mut self, value: T) { self.record(Event::Next(value)) }
  fn on_complete(self) { self.record(Event::Complete) }
  fn on_error(self, err: E) { self.record(Event::Error(err)) }
}

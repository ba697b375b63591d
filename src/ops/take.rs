use crate::{
  observable::ObservableSource,
  observer::Observer,
  subscription::{disposed, BoxedSubscription},
};

/// Emits only the first `count` items of the source, then completes.
///
/// The completion goes out in the same call as the `count`th item and the
/// upstream is disposed in between, so the source is not asked for more.
/// `take(0)` completes on subscribe without touching the source.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxsingle::prelude::*;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let c_seen = seen.clone();
/// observable::from_iter::<_, ()>(0..10).take(3).subscribe(
///   move |v| c_seen.lock().unwrap().push(v),
///   || {},
///   |_| {},
/// );
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
/// ```
#[derive(Clone)]
pub struct Take<S> {
  source: S,
  count: usize,
}

impl<S> Take<S> {
  pub(crate) fn new(source: S, count: usize) -> Self { Self { source, count } }
}

impl<S: ObservableSource> ObservableSource for Take<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    if self.count == 0 {
      observer.on_subscribe(disposed());
      observer.on_complete();
      return;
    }
    self.source.actual_subscribe(TakeObserver {
      downstream: Some(observer),
      upstream: None,
      remaining: self.count,
    })
  }
}

pub struct TakeObserver<O> {
  downstream: Option<O>,
  upstream: Option<BoxedSubscription>,
  remaining: usize,
}

impl<Item, Err, O: Observer<Item, Err>> Observer<Item, Err> for TakeObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    if let Some(observer) = self.downstream.as_mut() {
      observer.on_subscribe(subscription);
    }
  }

  fn on_next(&mut self, value: Item) {
    let Some(observer) = self.downstream.as_mut() else { return };
    self.remaining -= 1;
    observer.on_next(value);
    if self.remaining == 0 {
      if let Some(upstream) = self.upstream.take() {
        upstream.unsubscribe();
      }
      if let Some(observer) = self.downstream.take() {
        observer.on_complete();
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

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn base_function() {
    let spy = TestObserver::<i32, ()>::new();
    observable::from_iter(0..100).take(5).subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec![0, 1, 2, 3, 4]);
    assert_eq!(spy.terminal_count(), 1);
  }

  #[rxsingle_macro::test]
  fn fewer_items_than_count() {
    let spy = TestObserver::<i32, ()>::new();
    observable::from_iter(0..2).take(5).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Next(0), Event::Next(1), Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn zero_completes_without_subscribing() {
    let subject = PublishSubject::<i32, ()>::new();
    let spy = TestObserver::<i32, ()>::new();
    subject.clone().take(0).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
    assert!(!subject.has_observers());
  }

  #[rxsingle_macro::test]
  fn leaves_the_subject_after_the_last_item() {
    let subject = PublishSubject::<i32, ()>::new();
    let spy = TestObserver::<i32, ()>::new();
    subject.clone().take(2).subscribe_with(spy.clone());
    subject.on_next(1);
    subject.on_next(2);
    subject.on_next(3);
    assert_eq!(spy.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
    assert!(!subject.has_observers());
  }
}

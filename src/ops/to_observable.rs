//! Views a single-shot source as a stream of at most one item.

use crate::{
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{MaybeObserver, Observer},
  subscription::BoxedSubscription,
};

/// A value becomes one item followed by completion; an empty completion
/// stays a bare completion.
#[derive(Clone)]
pub struct ToObservable<M>(M);

impl<M> ToObservable<M> {
  pub(crate) fn new(source: M) -> Self { Self(source) }
}

impl<M: MaybeSource> ObservableSource for ToObservable<M> {
  type Item = M::Item;
  type Err = M::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self.0.actual_subscribe(ToObservableObserver(observer))
  }
}

pub struct ToObservableObserver<O>(O);

impl<Item, Err, O: Observer<Item, Err>> MaybeObserver<Item, Err> for ToObservableObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }

  fn on_success(mut self, value: Item) {
    self.0.on_next(value);
    self.0.on_complete();
  }

  fn on_complete(self) { self.0.on_complete() }

  fn on_error(self, err: Err) { self.0.on_error(err) }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn error_passes_through() {
    let spy = TestObserver::<i32, &str>::new();
    single::error("bad").to_observable().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("bad")]);
  }

  #[rxsingle_macro::test]
  fn dispose_reaches_the_source() {
    let subject = MaybeSubject::<i32, ()>::new();
    let spy = TestObserver::<i32, ()>::new();
    subject.clone().to_observable().subscribe_with(spy.clone());
    assert!(subject.has_observers());
    spy.dispose();
    assert!(!subject.has_observers());
  }
}

use std::{marker::PhantomData, sync::Arc};

use crate::{
  observable::ObservableSource,
  observer::Observer,
  subscription::{BooleanSubscription, Subscription},
};

/// Emits every element of an iterator, then completes.
///
/// The iterator is cloned per subscription, so each subscriber walks the
/// whole sequence. Disposing stops the walk before the next element.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxsingle::prelude::*;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let c_seen = seen.clone();
/// observable::from_iter::<_, ()>(vec![3, 1, 2]).subscribe(
///   move |v| c_seen.lock().unwrap().push(v),
///   || {},
///   |_| {},
/// );
/// assert_eq!(*seen.lock().unwrap(), vec![3, 1, 2]);
/// ```
pub struct FromIter<I, Err> {
  iter: I,
  _p: PhantomData<fn() -> Err>,
}

impl<I, Err> FromIter<I, Err> {
  pub(crate) fn new(iter: I) -> Self { Self { iter, _p: PhantomData } }
}

impl<I: Clone, Err> Clone for FromIter<I, Err> {
  fn clone(&self) -> Self { Self::new(self.iter.clone()) }
}

impl<I, Err> ObservableSource for FromIter<I, Err>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = I::Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let subscription = Arc::new(BooleanSubscription::new());
    observer.on_subscribe(subscription.clone());
    for value in self.iter.clone() {
      if subscription.is_closed() {
        return;
      }
      observer.on_next(value);
    }
    if !subscription.is_closed() {
      observer.on_complete();
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
  fn every_subscriber_gets_the_whole_sequence() {
    let source = observable::from_iter(0..3);
    for _ in 0..2 {
      let spy = TestObserver::<i32, ()>::new();
      source.clone().subscribe_with(spy.clone());
      assert_eq!(
        spy.events(),
        vec![Event::Next(0), Event::Next(1), Event::Next(2), Event::Complete]
      );
    }
  }

  #[rxsingle_macro::test]
  fn empty_iterator_only_completes() {
    let spy = TestObserver::<u8, ()>::new();
    observable::from_iter(Vec::new()).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }
}

//! Error recovery: `on_error_resume_next`, `on_error_return` and
//! `on_error_complete`.

use std::sync::Arc;

use crate::{
  maybe::MaybeSource,
  observer::MaybeObserver,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

// ==================== OnErrorResumeNext ====================

/// Switches to the source returned by `f` when the upstream fails.
///
/// `lift` turns the resume source into a Maybe, like `FlatMap`.
pub struct OnErrorResumeNext<S, F, R, M> {
  source: S,
  f: Arc<F>,
  lift: fn(R) -> M,
}

impl<S, F, R, M> OnErrorResumeNext<S, F, R, M> {
  pub(crate) fn new(source: S, f: F, lift: fn(R) -> M) -> Self {
    Self { source, f: Arc::new(f), lift }
  }
}

impl<S, F, R, M> MaybeSource for OnErrorResumeNext<S, F, R, M>
where
  S: MaybeSource,
  F: Fn(S::Err) -> R + Send + Sync + 'static,
  R: 'static,
  M: MaybeSource<Item = S::Item>,
{
  type Item = S::Item;
  type Err = M::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(ResumeObserver {
      observer,
      f: self.f.clone(),
      lift: self.lift,
      serial: None,
    })
  }
}

pub struct ResumeObserver<O, F, R, M> {
  observer: O,
  f: Arc<F>,
  lift: fn(R) -> M,
  serial: Option<Arc<SubscriptionCell>>,
}

impl<Item, Err, O, F, R, M> MaybeObserver<Item, Err> for ResumeObserver<O, F, R, M>
where
  O: MaybeObserver<Item, M::Err>,
  F: Fn(Err) -> R + Send + Sync + 'static,
  R: 'static,
  M: MaybeSource<Item = Item>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    match &self.serial {
      Some(serial) => {
        serial.replace(subscription);
      }
      None => {
        let serial = Arc::new(SubscriptionCell::new());
        serial.replace(subscription);
        self.serial = Some(serial.clone());
        self.observer.on_subscribe(serial);
      }
    }
  }

  fn on_success(self, value: Item) { self.observer.on_success(value) }

  fn on_complete(self) { self.observer.on_complete() }

  fn on_error(self, err: Err) {
    let Some(serial) = self.serial else { return };
    if serial.is_closed() {
      return;
    }
    let resume = (self.lift)((self.f)(err));
    resume.actual_subscribe(ResumedObserver { observer: self.observer, serial });
  }
}

pub struct ResumedObserver<O> {
  observer: O,
  serial: Arc<SubscriptionCell>,
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for ResumedObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.serial.replace(subscription); }
  fn on_success(self, value: Item) { self.observer.on_success(value) }
  fn on_complete(self) { self.observer.on_complete() }
  fn on_error(self, err: Err) { self.observer.on_error(err) }
}

// ==================== OnErrorReturn ====================

/// Replaces an upstream error with the value computed by `f`.
pub struct OnErrorReturn<S, F> {
  source: S,
  f: Arc<F>,
}

impl<S, F> OnErrorReturn<S, F> {
  pub(crate) fn new(source: S, f: F) -> Self { Self { source, f: Arc::new(f) } }
}

impl<S, F> MaybeSource for OnErrorReturn<S, F>
where
  S: MaybeSource,
  F: Fn(S::Err) -> S::Item + Send + Sync + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(ReturnObserver { observer, f: self.f.clone() })
  }
}

pub struct ReturnObserver<O, F> {
  observer: O,
  f: Arc<F>,
}

impl<Item, Err, O, F> MaybeObserver<Item, Err> for ReturnObserver<O, F>
where
  O: MaybeObserver<Item, Err>,
  F: Fn(Err) -> Item + Send + Sync + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }
  fn on_success(self, value: Item) { self.observer.on_success(value) }
  fn on_complete(self) { self.observer.on_complete() }
  fn on_error(self, err: Err) { self.observer.on_success((self.f)(err)) }
}

// ==================== OnErrorComplete ====================

/// Turns an upstream error into an empty completion.
pub struct OnErrorComplete<S> {
  source: S,
}

impl<S> OnErrorComplete<S> {
  pub(crate) fn new(source: S) -> Self { Self { source } }
}

impl<S: MaybeSource> MaybeSource for OnErrorComplete<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.source.actual_subscribe(CompleteObserver(observer))
  }
}

pub struct CompleteObserver<O>(O);

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for CompleteObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }
  fn on_success(self, value: Item) { self.0.on_success(value) }
  fn on_complete(self) { self.0.on_complete() }
  fn on_error(self, _: Err) { self.0.on_complete() }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn resume_with_fallback_single() {
    let spy = TestObserver::<i32, String>::new();
    single::error::<i32, _>("down")
      .on_error_resume_next(|e: &str| single::just(e.len() as i32))
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Success(4)]);
  }

  #[rxsingle_macro::test]
  fn return_value_on_error() {
    let spy = TestObserver::<i32, &str>::new();
    single::error::<i32, &str>("down").on_error_return(|_| -1).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Success(-1)]);
  }

  #[rxsingle_macro::test]
  fn complete_on_error() {
    let spy = TestObserver::<(), &str>::new();
    completable::error::<&str>("down").on_error_complete().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);

    let spy = TestObserver::<i32, &str>::new();
    single::error::<i32, &str>("down").on_error_complete().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn dispose_before_the_error_skips_the_fallback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c_calls = calls.clone();
    let spy = TestObserver::<i32, &str>::disposing_after(0);
    maybe::error::<i32, &str>("down")
      .on_error_resume_next(move |_| {
        c_calls.fetch_add(1, Ordering::SeqCst);
        maybe::just(0)
      })
      .subscribe_with(spy.clone());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(spy.is_empty());
  }
}

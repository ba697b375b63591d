//! Waits for a value from every source and combines them.
//!
//! Without delay-errors the first error or empty completion disposes the
//! other sources and terminates at once. With it, every source runs to the
//! end; the errors are then folded into one, and an empty source makes the
//! result complete empty. An empty list of sources completes.

use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc, Mutex,
};

use crate::{
  cell::OnceSlot,
  error::{fold_errors, CompositeError},
  maybe::MaybeSource,
  observer::MaybeObserver,
  ops::map::TryMap,
  subscription::{BoxedSubscription, Subscription, SubscriptionList},
};

pub struct Zip<S: MaybeSource, F> {
  sources: Vec<S>,
  zipper: Arc<F>,
  combine: Option<fn(CompositeError<S::Err>) -> S::Err>,
}

impl<S: MaybeSource, F> Zip<S, F> {
  pub(crate) fn new(sources: Vec<S>, zipper: F) -> Self {
    Self { sources, zipper: Arc::new(zipper), combine: None }
  }

  pub(crate) fn delay_errors(sources: Vec<S>, zipper: F) -> Self
  where
    S::Err: From<CompositeError<S::Err>>,
  {
    let combine: fn(CompositeError<S::Err>) -> S::Err = S::Err::from;
    Self { combine: Some(combine), ..Self::new(sources, zipper) }
  }
}

/// A [`Zip`] whose zipper may fail; its error becomes the terminal error.
pub type TryZip<S, F, R> = TryMap<Zip<S, F>, Unwrap<R, <S as MaybeSource>::Err>>;

pub type Unwrap<R, Err> = fn(Result<R, Err>) -> Result<R, Err>;

impl<S, F, R> Zip<S, F>
where
  S: MaybeSource,
  F: Fn(Vec<S::Item>) -> Result<R, S::Err> + Send + Sync + 'static,
  R: Send + 'static,
{
  pub(crate) fn fallible(self) -> TryZip<S, F, R> {
    let unwrap: Unwrap<R, S::Err> = std::convert::identity;
    TryMap::new(self, unwrap)
  }
}

impl<S, F, R> MaybeSource for Zip<S, F>
where
  S: MaybeSource,
  F: Fn(Vec<S::Item>) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  type Item = R;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let len = self.sources.len();
    let state = Arc::new(ZipState {
      downstream: OnceSlot::empty(),
      values: (0..len).map(|_| OnceSlot::empty()).collect(),
      remaining: AtomicUsize::new(len),
      subscriptions: SubscriptionList::new(len),
      zipper: self.zipper.clone(),
      combine: self.combine,
      errors: Mutex::new(Vec::new()),
      empty: AtomicBool::new(false),
    });
    observer.on_subscribe(state.clone());
    if len == 0 {
      observer.on_complete();
      return;
    }
    if state.downstream.put(observer).is_err() {
      return;
    }
    for (index, source) in self.sources.iter().enumerate() {
      if state.downstream.is_closed() {
        break;
      }
      source.actual_subscribe(ZipObserver { state: state.clone(), index });
    }
  }
}

struct ZipState<O, Item, Err, F> {
  downstream: OnceSlot<O>,
  values: Box<[OnceSlot<Item>]>,
  remaining: AtomicUsize,
  subscriptions: SubscriptionList,
  zipper: Arc<F>,
  combine: Option<fn(CompositeError<Err>) -> Err>,
  errors: Mutex<Vec<Err>>,
  empty: AtomicBool,
}

impl<O, Item, Err, F, R> ZipState<O, Item, Err, F>
where
  O: MaybeObserver<R, Err>,
  F: Fn(Vec<Item>) -> R,
{
  /// Fail-fast termination: whoever takes the downstream first.
  fn cut_short(&self, index: usize) -> Option<O> {
    let observer = self.downstream.take()?;
    self.subscriptions.unsubscribe_except(index);
    Some(observer)
  }

  /// Counts one more finished source and delivers once all are done.
  fn arrive(&self) {
    if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
      return;
    }
    let Some(observer) = self.downstream.take() else { return };
    let errors = std::mem::take(&mut *self.errors.lock().unwrap());
    if let Some(err) = self.combine.and_then(|combine| fold_errors(errors, combine)) {
      observer.on_error(err);
    } else if self.empty.load(Ordering::Acquire) {
      observer.on_complete();
    } else {
      let values = self.values.iter().filter_map(OnceSlot::take).collect();
      observer.on_success((self.zipper)(values));
    }
  }
}

impl<O: Send, Item: Send, Err: Send, F: Send + Sync> Subscription for ZipState<O, Item, Err, F> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.subscriptions.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct ZipObserver<O, Item, Err, F> {
  state: Arc<ZipState<O, Item, Err, F>>,
  index: usize,
}

impl<O, Item, Err, F, R> MaybeObserver<Item, Err> for ZipObserver<O, Item, Err, F>
where
  O: MaybeObserver<R, Err>,
  F: Fn(Vec<Item>) -> R + Send + Sync + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.subscriptions.get(self.index).try_set(subscription);
  }

  fn on_success(self, value: Item) {
    let _ = self.state.values[self.index].put(value);
    self.state.arrive();
  }

  fn on_complete(self) {
    if self.state.combine.is_some() {
      self.state.empty.store(true, Ordering::Release);
      self.state.arrive();
    } else if let Some(observer) = self.state.cut_short(self.index) {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if self.state.combine.is_some() {
      self.state.errors.lock().unwrap().push(err);
      self.state.arrive();
    } else if let Some(observer) = self.state.cut_short(self.index) {
      observer.on_error(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Failure, TestObserver},
  };

  #[rxsingle_macro::test]
  fn combines_every_value() {
    let first = SingleSubject::<i32, Failure>::new();
    let spy = TestObserver::<i32, Failure>::new();
    let sources = vec![first.clone().box_it(), single::just(2).box_it()];
    single::zip(sources, |v: Vec<i32>| v.iter().sum::<i32>()).subscribe_with(spy.clone());
    assert!(spy.is_empty());
    first.on_success(40);
    assert_eq!(spy.events(), vec![Event::Success(42)]);
  }

  #[rxsingle_macro::test]
  fn first_error_disposes_the_others() {
    let pending = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<usize, &str>::new();
    maybe::zip(vec![pending.clone().box_it(), maybe::error("no").box_it()], |v: Vec<i32>| v.len())
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("no")]);
    assert!(!pending.has_observers());
  }

  #[rxsingle_macro::test]
  fn empty_maybe_completes_the_zip() {
    let spy = TestObserver::<usize, &str>::new();
    maybe::zip(vec![maybe::just(1).box_it(), maybe::empty().box_it()], |v: Vec<i32>| v.len())
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn delayed_errors_are_collected() {
    let spy = TestObserver::<usize, Failure>::new();
    maybe::zip_delay_errors(
      vec![
        maybe::error(Failure::Upstream("l")).box_it(),
        maybe::just(1).box_it(),
        maybe::error(Failure::Upstream("r")).box_it(),
      ],
      |v: Vec<i32>| v.len(),
    )
    .subscribe_with(spy.clone());
    assert_eq!(
      spy.events(),
      vec![Event::Error(Failure::Many(vec![Failure::Upstream("l"), Failure::Upstream("r")]))]
    );
  }

  #[rxsingle_macro::test]
  fn zipping_no_singles_has_no_element() {
    let spy = TestObserver::<usize, Failure>::new();
    single::zip(Vec::<SingleSubject<i32, Failure>>::new(), |v: Vec<i32>| v.len())
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error(Failure::Missing)]);
  }

  #[rxsingle_macro::test]
  fn failing_zipper_is_the_terminal_error() {
    let last = SingleSubject::<i32, Failure>::new();
    let spy = TestObserver::<i32, Failure>::new();
    single::try_zip(vec![single::just(1).box_it(), last.clone().box_it()], |v: Vec<i32>| {
      if v.contains(&0) {
        Err(Failure::Upstream("zero"))
      } else {
        Ok(v.iter().product())
      }
    })
    .subscribe_with(spy.clone());
    assert!(spy.is_empty());
    last.on_success(0);
    assert_eq!(spy.events(), vec![Event::Error(Failure::Upstream("zero"))]);

    let spy = TestObserver::<i32, &str>::new();
    maybe::try_zip(vec![maybe::just(3), maybe::just(4)], |v: Vec<i32>| Ok(v.iter().product()))
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Success(12)]);
  }

  #[rxsingle_macro::test]
  fn fallible_zip_still_fails_fast_on_an_upstream_error() {
    let pending = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    maybe::try_zip(vec![pending.clone().box_it(), maybe::error("gone").box_it()], |v: Vec<i32>| {
      Ok(v[0])
    })
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("gone")]);
    assert!(!pending.has_observers());
  }
}

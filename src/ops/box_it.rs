//! Type-erased sources.
//!
//! Every operator produces its own concrete type, so sources built from
//! different chains cannot sit in one `Vec`. `box_it()` erases the type
//! behind an object-safe mirror of the source trait. The boxed handles are
//! reference-counted and cheap to clone.

use std::sync::Arc;

use crate::{
  completable::CompletableSource,
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{
    BoxedCompletableObserver, BoxedMaybeObserver, BoxedObserver, BoxedSingleObserver,
    CompletableObserver, MaybeObserver, Observer, SingleObserver,
  },
  single::SingleSource,
};

// ============================================================================
// Object-safe source traits
// ============================================================================

pub trait DynSingleSource<Item, Err>: Send + Sync {
  fn dyn_subscribe(&self, observer: BoxedSingleObserver<Item, Err>);
}

pub trait DynMaybeSource<Item, Err>: Send + Sync {
  fn dyn_subscribe(&self, observer: BoxedMaybeObserver<Item, Err>);
}

pub trait DynCompletableSource<Err>: Send + Sync {
  fn dyn_subscribe(&self, observer: BoxedCompletableObserver<Err>);
}

pub trait DynObservableSource<Item, Err>: Send + Sync {
  fn dyn_subscribe(&self, observer: BoxedObserver<Item, Err>);
}

impl<S: SingleSource> DynSingleSource<S::Item, S::Err> for S {
  fn dyn_subscribe(&self, observer: BoxedSingleObserver<S::Item, S::Err>) {
    self.actual_subscribe(observer)
  }
}

impl<S: MaybeSource> DynMaybeSource<S::Item, S::Err> for S {
  fn dyn_subscribe(&self, observer: BoxedMaybeObserver<S::Item, S::Err>) {
    self.actual_subscribe(observer)
  }
}

impl<S: CompletableSource> DynCompletableSource<S::Err> for S {
  fn dyn_subscribe(&self, observer: BoxedCompletableObserver<S::Err>) {
    self.actual_subscribe(observer)
  }
}

impl<S: ObservableSource> DynObservableSource<S::Item, S::Err> for S {
  fn dyn_subscribe(&self, observer: BoxedObserver<S::Item, S::Err>) {
    self.actual_subscribe(observer)
  }
}

// ============================================================================
// Boxed handles
// ============================================================================

/// A type-erased [`SingleSource`].
pub struct BoxedSingle<Item, Err>(Arc<dyn DynSingleSource<Item, Err>>);

/// A type-erased [`MaybeSource`].
pub struct BoxedMaybe<Item, Err>(Arc<dyn DynMaybeSource<Item, Err>>);

/// A type-erased [`CompletableSource`].
pub struct BoxedCompletable<Err>(Arc<dyn DynCompletableSource<Err>>);

/// A type-erased [`ObservableSource`].
pub struct BoxedObservable<Item, Err>(Arc<dyn DynObservableSource<Item, Err>>);

impl<Item, Err> BoxedSingle<Item, Err> {
  pub fn new(source: impl SingleSource<Item = Item, Err = Err>) -> Self { Self(Arc::new(source)) }
}

impl<Item, Err> BoxedMaybe<Item, Err> {
  pub fn new(source: impl MaybeSource<Item = Item, Err = Err>) -> Self { Self(Arc::new(source)) }
}

impl<Err> BoxedCompletable<Err> {
  pub fn new(source: impl CompletableSource<Err = Err>) -> Self { Self(Arc::new(source)) }
}

impl<Item, Err> BoxedObservable<Item, Err> {
  pub fn new(source: impl ObservableSource<Item = Item, Err = Err>) -> Self {
    Self(Arc::new(source))
  }
}

impl<Item, Err> Clone for BoxedSingle<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item, Err> Clone for BoxedMaybe<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Err> Clone for BoxedCompletable<Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item, Err> Clone for BoxedObservable<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item, Err> SingleSource for BoxedSingle<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: SingleObserver<Self::Item, Self::Err>,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }
}

impl<Item, Err> MaybeSource for BoxedMaybe<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }
}

impl<Err: Send + 'static> CompletableSource for BoxedCompletable<Err> {
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: CompletableObserver<Self::Err>,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }
}

impl<Item, Err> ObservableSource for BoxedObservable<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn different_chains_share_one_type() {
    let sources: Vec<BoxedSingle<i32, &str>> = vec![
      single::just(1).box_it(),
      single::just(1).map(|v: i32| v + 1).box_it(),
      single::error("nope").box_it(),
    ];
    let spies: Vec<_> = sources
      .into_iter()
      .map(|source| {
        let spy = TestObserver::<i32, &str>::new();
        source.subscribe_with(spy.clone());
        spy
      })
      .collect();
    let events: Vec<_> = spies.iter().map(|p| p.events()).collect();
    assert_eq!(
      events,
      vec![vec![Event::Success(1)], vec![Event::Success(2)], vec![Event::Error("nope")]]
    );
  }

  #[rxsingle_macro::test]
  fn clones_share_the_source() {
    let subject = MaybeSubject::<i32, &str>::new();
    let boxed = subject.clone().box_it();
    let first = TestObserver::<i32, &str>::new();
    let second = TestObserver::<i32, &str>::new();
    boxed.clone().subscribe_with(first.clone());
    boxed.subscribe_with(second.clone());
    subject.on_complete();
    assert_eq!(first.events(), vec![Event::Complete]);
    assert_eq!(second.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn boxed_observable_keeps_streaming() {
    let spy = TestObserver::<u8, ()>::new();
    let boxed: BoxedObservable<u8, ()> = observable::from_iter(vec![1, 2]).box_it();
    boxed.subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
  }
}

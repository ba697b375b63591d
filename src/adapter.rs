//! Views of one contract through another.
//!
//! The racing and composition operators are written once against
//! [`MaybeSource`], the widest of the three single-shot contracts. Single and
//! Completable reach them through these adapters:
//!
//! - [`SingleAsMaybe`] / [`CompletableAsMaybe`] lift a source into a Maybe.
//! - [`MaybeAsSingle`] narrows back when the operator cannot produce an empty
//!   completion from single-valued inputs.
//! - [`MaybeToSingle`] narrows back when it can; empty becomes
//!   [`NoSuchElementError`].
//! - [`MaybeAsCompletable`] drops the value.

use crate::{
  completable::CompletableSource,
  error::NoSuchElementError,
  maybe::MaybeSource,
  observer::{CompletableObserver, MaybeObserver, SingleObserver},
  single::SingleSource,
  subscription::BoxedSubscription,
};

// ==================== Sources ====================

/// A Single seen as a Maybe that never completes empty.
#[derive(Clone)]
pub struct SingleAsMaybe<S>(pub S);

impl<S: SingleSource> MaybeSource for SingleAsMaybe<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.0.actual_subscribe(AsSingleObserver(observer))
  }
}

/// A Completable seen as a Maybe of `()` that always completes empty.
#[derive(Clone)]
pub struct CompletableAsMaybe<S>(pub S);

impl<S: CompletableSource> MaybeSource for CompletableAsMaybe<S> {
  type Item = ();
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    self.0.actual_subscribe(AsCompletableObserver(observer))
  }
}

/// A Maybe known to terminate with a value or an error, seen as a Single.
///
/// Only built by operators whose inputs are all singles, so an empty
/// completion cannot happen.
#[derive(Clone)]
pub struct MaybeAsSingle<M>(pub M);

impl<M: MaybeSource> SingleSource for MaybeAsSingle<M> {
  type Item = M::Item;
  type Err = M::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: SingleObserver<Self::Item, Self::Err>,
  {
    self.0.actual_subscribe(AsMaybeObserver(observer))
  }
}

/// A Maybe seen as a Single; completing empty fails with
/// [`NoSuchElementError`].
#[derive(Clone)]
pub struct MaybeToSingle<M>(pub M);

impl<M> SingleSource for MaybeToSingle<M>
where
  M: MaybeSource,
  M::Err: From<NoSuchElementError>,
{
  type Item = M::Item;
  type Err = M::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: SingleObserver<Self::Item, Self::Err>,
  {
    self.0.actual_subscribe(OrNoSuchElement(observer))
  }
}

/// A Maybe seen as a Completable; a value counts as completion.
#[derive(Clone)]
pub struct MaybeAsCompletable<M>(pub M);

impl<M: MaybeSource> CompletableSource for MaybeAsCompletable<M> {
  type Err = M::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: CompletableObserver<Self::Err>,
  {
    self.0.actual_subscribe(IgnoreValue(observer))
  }
}

// ==================== Observers ====================

/// A Maybe observer receiving from a Single.
pub struct AsSingleObserver<O>(pub O);

impl<Item, Err, O: MaybeObserver<Item, Err>> SingleObserver<Item, Err> for AsSingleObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }
  fn on_success(self, value: Item) { self.0.on_success(value) }
  fn on_error(self, err: Err) { self.0.on_error(err) }
}

/// A Maybe observer receiving from a Completable.
pub struct AsCompletableObserver<O>(pub O);

impl<Err, O: MaybeObserver<(), Err>> CompletableObserver<Err> for AsCompletableObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }
  fn on_complete(self) { self.0.on_complete() }
  fn on_error(self, err: Err) { self.0.on_error(err) }
}

/// A Single observer receiving from a Maybe that cannot complete empty.
pub struct AsMaybeObserver<O>(pub O);

impl<Item, Err, O: SingleObserver<Item, Err>> MaybeObserver<Item, Err> for AsMaybeObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }
  fn on_success(self, value: Item) { self.0.on_success(value) }
  fn on_complete(self) { unreachable!("a single-valued source completed without a value") }
  fn on_error(self, err: Err) { self.0.on_error(err) }
}

/// A Single observer receiving from any Maybe.
pub struct OrNoSuchElement<O>(pub O);

impl<Item, Err, O> MaybeObserver<Item, Err> for OrNoSuchElement<O>
where
  O: SingleObserver<Item, Err>,
  Err: From<NoSuchElementError>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }
  fn on_success(self, value: Item) { self.0.on_success(value) }
  fn on_complete(self) { self.0.on_error(NoSuchElementError.into()) }
  fn on_error(self, err: Err) { self.0.on_error(err) }
}

/// A Completable observer receiving from a Maybe.
pub struct IgnoreValue<O>(pub O);

impl<Item, Err, O: CompletableObserver<Err>> MaybeObserver<Item, Err> for IgnoreValue<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }
  fn on_success(self, _: Item) { self.0.on_complete() }
  fn on_complete(self) { self.0.on_complete() }
  fn on_error(self, err: Err) { self.0.on_error(err) }
}

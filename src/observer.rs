//! Observer traits and implementations
//!
//! An observer is the consumer side of a subscription. Every contract starts
//! with `on_subscribe`, which hands the observer the subscription it can use
//! to cancel, followed by at most one terminal signal. Terminal methods
//! consume `self`, so a second terminal call on the same observer does not
//! type-check.
//!
//! | Contract | Terminal signals |
//! |----------|------------------|
//! | [`SingleObserver`] | `on_success` or `on_error` |
//! | [`MaybeObserver`] | `on_success`, `on_complete` or `on_error` |
//! | [`CompletableObserver`] | `on_complete` or `on_error` |
//! | [`Observer`] | any number of `on_next`, then `on_complete` or `on_error` |

use std::sync::Arc;

use crate::subscription::{BoxedSubscription, SubscriptionCell};

// ============================================================================
// Observer Traits
// ============================================================================

/// Consumer of a source that yields exactly one value or an error.
pub trait SingleObserver<Item, Err>: Send + 'static {
  /// Receives the subscription before any other signal.
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  fn on_success(self, value: Item);

  fn on_error(self, err: Err);
}

/// Consumer of a source that yields zero or one value, or an error.
pub trait MaybeObserver<Item, Err>: Send + 'static {
  /// Receives the subscription before any other signal.
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  fn on_success(self, value: Item);

  /// The source finished without a value.
  fn on_complete(self);

  fn on_error(self, err: Err);
}

/// Consumer of a source that only signals termination.
pub trait CompletableObserver<Err>: Send + 'static {
  /// Receives the subscription before any other signal.
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  fn on_complete(self);

  fn on_error(self, err: Err);
}

/// Consumer of an unbounded multi-value source.
pub trait Observer<Item, Err>: Send + 'static {
  /// Receives the subscription before any other signal.
  fn on_subscribe(&mut self, subscription: BoxedSubscription);

  fn on_next(&mut self, value: Item);

  fn on_complete(self);

  fn on_error(self, err: Err);
}

// ============================================================================
// Object-safe mirrors
// ============================================================================

/// Object-safe mirror of [`SingleObserver`], implemented for every observer.
pub trait DynSingleObserver<Item, Err>: Send {
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription);
  fn box_on_success(self: Box<Self>, value: Item);
  fn box_on_error(self: Box<Self>, err: Err);
}

/// Object-safe mirror of [`MaybeObserver`], implemented for every observer.
pub trait DynMaybeObserver<Item, Err>: Send {
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription);
  fn box_on_success(self: Box<Self>, value: Item);
  fn box_on_complete(self: Box<Self>);
  fn box_on_error(self: Box<Self>, err: Err);
}

/// Object-safe mirror of [`CompletableObserver`], implemented for every
/// observer.
pub trait DynCompletableObserver<Err>: Send {
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription);
  fn box_on_complete(self: Box<Self>);
  fn box_on_error(self: Box<Self>, err: Err);
}

/// Object-safe mirror of [`Observer`], implemented for every observer.
pub trait DynObserver<Item, Err>: Send {
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription);
  fn box_on_next(&mut self, value: Item);
  fn box_on_complete(self: Box<Self>);
  fn box_on_error(self: Box<Self>, err: Err);
}

pub type BoxedSingleObserver<Item, Err> = Box<dyn DynSingleObserver<Item, Err>>;
pub type BoxedMaybeObserver<Item, Err> = Box<dyn DynMaybeObserver<Item, Err>>;
pub type BoxedCompletableObserver<Err> = Box<dyn DynCompletableObserver<Err>>;
pub type BoxedObserver<Item, Err> = Box<dyn DynObserver<Item, Err>>;

impl<T, Item, Err> DynSingleObserver<Item, Err> for T
where
  T: SingleObserver<Item, Err>,
{
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.on_subscribe(subscription)
  }
  fn box_on_success(self: Box<Self>, value: Item) { self.on_success(value) }
  fn box_on_error(self: Box<Self>, err: Err) { self.on_error(err) }
}

impl<T, Item, Err> DynMaybeObserver<Item, Err> for T
where
  T: MaybeObserver<Item, Err>,
{
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.on_subscribe(subscription)
  }
  fn box_on_success(self: Box<Self>, value: Item) { self.on_success(value) }
  fn box_on_complete(self: Box<Self>) { self.on_complete() }
  fn box_on_error(self: Box<Self>, err: Err) { self.on_error(err) }
}

impl<T, Err> DynCompletableObserver<Err> for T
where
  T: CompletableObserver<Err>,
{
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.on_subscribe(subscription)
  }
  fn box_on_complete(self: Box<Self>) { self.on_complete() }
  fn box_on_error(self: Box<Self>, err: Err) { self.on_error(err) }
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  fn box_on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.on_subscribe(subscription)
  }
  fn box_on_next(&mut self, value: Item) { self.on_next(value) }
  fn box_on_complete(self: Box<Self>) { self.on_complete() }
  fn box_on_error(self: Box<Self>, err: Err) { self.on_error(err) }
}

impl<Item: 'static, Err: 'static> SingleObserver<Item, Err> for BoxedSingleObserver<Item, Err> {
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    (**self).box_on_subscribe(subscription)
  }
  #[inline]
  fn on_success(self, value: Item) { self.box_on_success(value) }
  #[inline]
  fn on_error(self, err: Err) { self.box_on_error(err) }
}

impl<Item: 'static, Err: 'static> MaybeObserver<Item, Err> for BoxedMaybeObserver<Item, Err> {
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    (**self).box_on_subscribe(subscription)
  }
  #[inline]
  fn on_success(self, value: Item) { self.box_on_success(value) }
  #[inline]
  fn on_complete(self) { self.box_on_complete() }
  #[inline]
  fn on_error(self, err: Err) { self.box_on_error(err) }
}

impl<Err: 'static> CompletableObserver<Err> for BoxedCompletableObserver<Err> {
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    (**self).box_on_subscribe(subscription)
  }
  #[inline]
  fn on_complete(self) { self.box_on_complete() }
  #[inline]
  fn on_error(self, err: Err) { self.box_on_error(err) }
}

impl<Item: 'static, Err: 'static> Observer<Item, Err> for BoxedObserver<Item, Err> {
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    (**self).box_on_subscribe(subscription)
  }
  #[inline]
  fn on_next(&mut self, value: Item) { (**self).box_on_next(value) }
  #[inline]
  fn on_complete(self) { self.box_on_complete() }
  #[inline]
  fn on_error(self, err: Err) { self.box_on_error(err) }
}

// ============================================================================
// Tracked - remembers the subscription for `subscribe_with`
// ============================================================================

/// Wraps the final observer of a `subscribe_*` call and stores the
/// subscription it receives into a cell the caller holds.
///
/// Disposing the caller's cell before `on_subscribe` arrives (e.g. under
/// `subscribe_on`) cancels the subscription as soon as it shows up.
pub(crate) struct Tracked<O> {
  pub(crate) inner: O,
  pub(crate) handle: Arc<SubscriptionCell>,
}

impl<O> Tracked<O> {
  pub(crate) fn new(inner: O) -> (Self, Arc<SubscriptionCell>) {
    let handle = Arc::new(SubscriptionCell::new());
    (Self { inner, handle: handle.clone() }, handle)
  }

  fn track(&self, subscription: &BoxedSubscription) { self.handle.try_set(subscription.clone()); }
}

impl<Item, Err, O: SingleObserver<Item, Err>> SingleObserver<Item, Err> for Tracked<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.track(&subscription);
    self.inner.on_subscribe(subscription);
  }
  fn on_success(self, value: Item) { self.inner.on_success(value) }
  fn on_error(self, err: Err) { self.inner.on_error(err) }
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for Tracked<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.track(&subscription);
    self.inner.on_subscribe(subscription);
  }
  fn on_success(self, value: Item) { self.inner.on_success(value) }
  fn on_complete(self) { self.inner.on_complete() }
  fn on_error(self, err: Err) { self.inner.on_error(err) }
}

impl<Err, O: CompletableObserver<Err>> CompletableObserver<Err> for Tracked<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.track(&subscription);
    self.inner.on_subscribe(subscription);
  }
  fn on_complete(self) { self.inner.on_complete() }
  fn on_error(self, err: Err) { self.inner.on_error(err) }
}

impl<Item, Err, O: Observer<Item, Err>> Observer<Item, Err> for Tracked<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.track(&subscription);
    self.inner.on_subscribe(subscription);
  }
  fn on_next(&mut self, value: Item) { self.inner.on_next(value) }
  fn on_complete(self) { self.inner.on_complete() }
  fn on_error(self, err: Err) { self.inner.on_error(err) }
}

// ============================================================================
// Closure observers
// ============================================================================

/// Observer built from callbacks, used by the `subscribe` helpers.
///
/// The slots that a contract does not use stay `()`.
#[derive(Clone)]
pub struct FnObserver<N, C, E> {
  pub on_value: N,
  pub on_complete: C,
  pub on_error: E,
}

impl<Item, Err, N, E> SingleObserver<Item, Err> for FnObserver<N, (), E>
where
  N: FnOnce(Item) + Send + 'static,
  E: FnOnce(Err) + Send + 'static,
{
  fn on_subscribe(&mut self, _: BoxedSubscription) {}
  fn on_success(self, value: Item) { (self.on_value)(value) }
  fn on_error(self, err: Err) { (self.on_error)(err) }
}

impl<Item, Err, N, C, E> MaybeObserver<Item, Err> for FnObserver<N, C, E>
where
  N: FnOnce(Item) + Send + 'static,
  C: FnOnce() + Send + 'static,
  E: FnOnce(Err) + Send + 'static,
{
  fn on_subscribe(&mut self, _: BoxedSubscription) {}
  fn on_success(self, value: Item) { (self.on_value)(value) }
  fn on_complete(self) { (self.on_complete)() }
  fn on_error(self, err: Err) { (self.on_error)(err) }
}

impl<Err, C, E> CompletableObserver<Err> for FnObserver<(), C, E>
where
  C: FnOnce() + Send + 'static,
  E: FnOnce(Err) + Send + 'static,
{
  fn on_subscribe(&mut self, _: BoxedSubscription) {}
  fn on_complete(self) { (self.on_complete)() }
  fn on_error(self, err: Err) { (self.on_error)(err) }
}

/// Multi-value flavor of [`FnObserver`]; `on_next` is called repeatedly.
#[derive(Clone)]
pub struct FnStreamObserver<N, C, E> {
  pub on_next: N,
  pub on_complete: C,
  pub on_error: E,
}

impl<Item, Err, N, C, E> Observer<Item, Err> for FnStreamObserver<N, C, E>
where
  N: FnMut(Item) + Send + 'static,
  C: FnOnce() + Send + 'static,
  E: FnOnce(Err) + Send + 'static,
{
  fn on_subscribe(&mut self, _: BoxedSubscription) {}
  fn on_next(&mut self, value: Item) { (self.on_next)(value) }
  fn on_complete(self) { (self.on_complete)() }
  fn on_error(self, err: Err) { (self.on_error)(err) }
}

//! Bridges callback-style code into a source.
//!
//! `create(f)` calls `f` with an emitter on every subscription. The emitter
//! can be moved to another thread or stored; it holds the downstream observer
//! until the first terminal call or until the subscriber disposes. Every
//! later call is a no-op.
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! let value = single::create::<_, (), _>(|emitter| {
//!   emitter.on_success(1);
//!   emitter.on_success(2);
//! })
//! .blocking_get();
//! assert_eq!(value, Ok(1));
//! ```

use std::{marker::PhantomData, sync::Arc};

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::{BoxedMaybeObserver, MaybeObserver},
  subscription::{Subscription, SubscriptionCell},
};

struct EmitterState<Item, Err> {
  downstream: OnceSlot<BoxedMaybeObserver<Item, Err>>,
  hook: SubscriptionCell,
}

impl<Item, Err> EmitterState<Item, Err> {
  /// Takes the observer and runs the registered hook after `deliver`.
  fn finish(&self, deliver: impl FnOnce(BoxedMaybeObserver<Item, Err>)) {
    if let Some(observer) = self.downstream.take() {
      deliver(observer);
      self.hook.unsubscribe();
    }
  }
}

impl<Item: Send, Err: Send> Subscription for EmitterState<Item, Err> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.hook.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

/// Shared core of the three emitter flavors.
struct Emitter<Item, Err>(Arc<EmitterState<Item, Err>>);

impl<Item, Err> Clone for Emitter<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item, Err> Emitter<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_success(&self, value: Item) { self.0.finish(|observer| observer.on_success(value)) }

  fn on_complete(&self) { self.0.finish(|observer| observer.on_complete()) }

  fn on_error(&self, err: Err) { self.0.finish(|observer| observer.on_error(err)) }

  fn set_subscription(&self, subscription: impl Subscription + 'static) {
    self.0.hook.try_set(Arc::new(subscription));
  }

  fn is_disposed(&self) -> bool { self.0.downstream.is_closed() }
}

macro_rules! emitter_methods {
  () => {
    /// Registers the cancel action that runs once the emitter is done,
    /// either by a terminal call or by dispose.
    ///
    /// Only the first registration is kept; a later one is cancelled
    /// immediately.
    pub fn set_subscription(&self, subscription: impl Subscription + 'static) {
      self.0.set_subscription(subscription)
    }

    /// True once a terminal signal went out or the subscriber disposed.
    pub fn is_disposed(&self) -> bool { self.0.is_disposed() }

    pub fn on_error(&self, err: Err) { self.0.on_error(err) }
  };
}

/// Emitter handed to `single::create`.
pub struct SingleEmitter<Item, Err>(Emitter<Item, Err>);

/// Emitter handed to `maybe::create`.
pub struct MaybeEmitter<Item, Err>(Emitter<Item, Err>);

/// Emitter handed to `completable::create`.
pub struct CompletableEmitter<Err>(Emitter<(), Err>);

impl<Item, Err> Clone for SingleEmitter<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item, Err> Clone for MaybeEmitter<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Err> Clone for CompletableEmitter<Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item: Send + 'static, Err: Send + 'static> SingleEmitter<Item, Err> {
  pub fn on_success(&self, value: Item) { self.0.on_success(value) }

  emitter_methods!();
}

impl<Item: Send + 'static, Err: Send + 'static> MaybeEmitter<Item, Err> {
  pub fn on_success(&self, value: Item) { self.0.on_success(value) }

  pub fn on_complete(&self) { self.0.on_complete() }

  emitter_methods!();
}

impl<Err: Send + 'static> CompletableEmitter<Err> {
  pub fn on_complete(&self) { self.0.on_complete() }

  emitter_methods!();
}

/// Ties an emitter flavor to the item type it emits.
pub trait EmitterKind: Send + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;
}

impl<Item: Send + 'static, Err: Send + 'static> EmitterKind for SingleEmitter<Item, Err> {
  type Item = Item;
  type Err = Err;
}

impl<Item: Send + 'static, Err: Send + 'static> EmitterKind for MaybeEmitter<Item, Err> {
  type Item = Item;
  type Err = Err;
}

impl<Err: Send + 'static> EmitterKind for CompletableEmitter<Err> {
  type Item = ();
  type Err = Err;
}

/// A source that runs `f` with a fresh emitter on every subscription.
pub struct Create<F, E: EmitterKind> {
  f: Arc<F>,
  wrap: fn(Emitter<E::Item, E::Err>) -> E,
  _p: PhantomData<fn() -> E>,
}

impl<F, E: EmitterKind> Create<F, E> {
  fn with(f: F, wrap: fn(Emitter<E::Item, E::Err>) -> E) -> Self {
    Self { f: Arc::new(f), wrap, _p: PhantomData }
  }
}

impl<F, Item: Send + 'static, Err: Send + 'static> Create<F, SingleEmitter<Item, Err>> {
  pub(crate) fn single(f: F) -> Self { Self::with(f, SingleEmitter) }
}

impl<F, Item: Send + 'static, Err: Send + 'static> Create<F, MaybeEmitter<Item, Err>> {
  pub(crate) fn maybe(f: F) -> Self { Self::with(f, MaybeEmitter) }
}

impl<F, Err: Send + 'static> Create<F, CompletableEmitter<Err>> {
  pub(crate) fn completable(f: F) -> Self { Self::with(f, CompletableEmitter) }
}

impl<F, E: EmitterKind> Clone for Create<F, E> {
  fn clone(&self) -> Self { Self { f: self.f.clone(), wrap: self.wrap, _p: PhantomData } }
}

impl<F, E> MaybeSource for Create<F, E>
where
  F: Fn(E) + Send + Sync + 'static,
  E: EmitterKind,
{
  type Item = E::Item;
  type Err = E::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state: Arc<EmitterState<E::Item, E::Err>> =
      Arc::new(EmitterState { downstream: OnceSlot::empty(), hook: SubscriptionCell::new() });
    observer.on_subscribe(state.clone());
    if state.downstream.put(Box::new(observer)).is_err() {
      return;
    }
    (self.f)((self.wrap)(Emitter(state)));
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  };

  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn only_the_first_terminal_call_counts() {
    let spy = TestObserver::<i32, &str>::new();
    maybe::create(|emitter| {
      emitter.on_complete();
      emitter.on_success(1);
      emitter.on_error("late");
    })
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn hook_runs_once_on_terminal() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let spy = TestObserver::<(), &str>::new();
    completable::create(move |emitter| {
      let c_runs = c_runs.clone();
      emitter.set_subscription(FnSubscription::new(move || {
        c_runs.fetch_add(1, Ordering::SeqCst);
      }));
      emitter.on_complete();
      emitter.on_error("ignored");
    })
    .subscribe_with(spy.clone());
    spy.dispose();
    assert_eq!(spy.events(), vec![Event::Complete]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[rxsingle_macro::test]
  fn dispose_runs_the_hook_and_silences_the_emitter() {
    let stash = Arc::new(Mutex::new(None));
    let c_stash = stash.clone();
    let cancelled = Arc::new(AtomicUsize::new(0));
    let c_cancelled = cancelled.clone();
    let spy = TestObserver::<i32, &str>::new();
    single::create(move |emitter| {
      let c_cancelled = c_cancelled.clone();
      emitter.set_subscription(FnSubscription::new(move || {
        c_cancelled.fetch_add(1, Ordering::SeqCst);
      }));
      *c_stash.lock().unwrap() = Some(emitter);
    })
    .subscribe_with(spy.clone());

    spy.dispose();
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    let emitter = stash.lock().unwrap().take().unwrap();
    assert!(emitter.is_disposed());
    emitter.on_success(5);
    assert!(spy.is_empty());
  }

  #[rxsingle_macro::test]
  fn emitter_can_signal_from_another_thread() {
    let value = single::create::<_, (), _>(|emitter| {
      std::thread::spawn(move || emitter.on_success("threaded"));
    })
    .blocking_get();
    assert_eq!(value, Ok("threaded"));
  }
}

//! Ends the source early when another source signals first.
//!
//! A value or a completion from `other` disposes the main source and
//! completes the output; an error from `other` is forwarded. Whichever side
//! terminates first disposes the other one.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::MaybeObserver,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct TakeUntil<S, U> {
  source: S,
  other: U,
}

impl<S, U> TakeUntil<S, U> {
  pub(crate) fn new(source: S, other: U) -> Self { Self { source, other } }
}

impl<S, U> MaybeSource for TakeUntil<S, U>
where
  S: MaybeSource,
  U: MaybeSource<Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state = Arc::new(TakeUntilState {
      downstream: OnceSlot::empty(),
      main: SubscriptionCell::new(),
      other: SubscriptionCell::new(),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    self.other.actual_subscribe(OtherObserver { state: state.clone(), _item: PhantomData });
    if !state.downstream.is_closed() {
      self.source.actual_subscribe(MainObserver { state });
    }
  }
}

struct TakeUntilState<O> {
  downstream: OnceSlot<O>,
  main: SubscriptionCell,
  other: SubscriptionCell,
}

impl<O: Send> Subscription for TakeUntilState<O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.main.unsubscribe();
    self.other.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct MainObserver<O> {
  state: Arc<TakeUntilState<O>>,
}

impl<O> MainObserver<O> {
  fn win(&self) -> Option<O> {
    let observer = self.state.downstream.take()?;
    self.state.other.unsubscribe();
    Some(observer)
  }
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for MainObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.main.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    if let Some(observer) = self.win() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.win() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.win() {
      observer.on_error(err);
    }
  }
}

pub struct OtherObserver<O, Item> {
  state: Arc<TakeUntilState<O>>,
  _item: PhantomData<fn() -> Item>,
}

impl<O, Item> OtherObserver<O, Item> {
  fn win(&self) -> Option<O> {
    let observer = self.state.downstream.take()?;
    self.state.main.unsubscribe();
    Some(observer)
  }
}

impl<Item, U, Err, O> MaybeObserver<U, Err> for OtherObserver<O, Item>
where
  O: MaybeObserver<Item, Err>,
  Item: 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.other.try_set(subscription);
  }

  fn on_success(self, _: U) {
    if let Some(observer) = self.win() {
      observer.on_complete();
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.win() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.win() {
      observer.on_error(err);
    }
  }
}

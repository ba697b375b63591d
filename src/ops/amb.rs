//! Mirrors whichever source signals first.
//!
//! Every source is subscribed in order until one of them has won. The first
//! terminal signal claims the winner index with a compare-and-swap; the
//! winner disposes every other source and forwards its signal. Losers are
//! ignored.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::MaybeObserver,
  subscription::{BoxedSubscription, Subscription, SubscriptionList},
};

const NO_WINNER: usize = usize::MAX;

/// The first of `sources` to terminate wins. An empty list completes.
pub struct Amb<S> {
  sources: Vec<S>,
}

impl<S> Amb<S> {
  pub(crate) fn new(sources: Vec<S>) -> Self { Self { sources } }
}

impl<S: MaybeSource> MaybeSource for Amb<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state = Arc::new(AmbState {
      downstream: OnceSlot::empty(),
      winner: AtomicUsize::new(NO_WINNER),
      subscriptions: SubscriptionList::new(self.sources.len()),
    });
    observer.on_subscribe(state.clone());
    if self.sources.is_empty() {
      observer.on_complete();
      return;
    }
    if state.downstream.put(observer).is_err() {
      return;
    }
    for (index, source) in self.sources.iter().enumerate() {
      if state.winner.load(Ordering::Acquire) != NO_WINNER || state.downstream.is_closed() {
        break;
      }
      source.actual_subscribe(AmbObserver { state: state.clone(), index });
    }
  }
}

struct AmbState<O> {
  downstream: OnceSlot<O>,
  winner: AtomicUsize,
  subscriptions: SubscriptionList,
}

impl<O: Send> Subscription for AmbState<O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.subscriptions.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct AmbObserver<O> {
  state: Arc<AmbState<O>>,
  index: usize,
}

impl<O> AmbObserver<O> {
  fn win(&self) -> Option<O> {
    self
      .state
      .winner
      .compare_exchange(NO_WINNER, self.index, Ordering::AcqRel, Ordering::Acquire)
      .ok()?;
    self.state.subscriptions.unsubscribe_except(self.index);
    self.state.downstream.take()
  }
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for AmbObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.subscriptions.get(self.index).try_set(subscription);
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

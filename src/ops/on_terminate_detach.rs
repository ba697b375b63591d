//! Drops the references between upstream and downstream as soon as the
//! subscription is over, so neither side keeps the other alive.
//!
//! On a terminal signal the upstream subscription is released without being
//! cancelled. On dispose it is cancelled and released, and the downstream
//! observer is dropped right away even if the upstream still holds on to
//! its own observer.

use std::sync::Arc;

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::MaybeObserver,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct OnTerminateDetach<S> {
  source: S,
}

impl<S> OnTerminateDetach<S> {
  pub(crate) fn new(source: S) -> Self { Self { source } }
}

impl<S: MaybeSource> MaybeSource for OnTerminateDetach<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state =
      Arc::new(DetachState { downstream: OnceSlot::empty(), upstream: SubscriptionCell::new() });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    self.source.actual_subscribe(DetachObserver { state });
  }
}

struct DetachState<O> {
  downstream: OnceSlot<O>,
  upstream: SubscriptionCell,
}

impl<O: Send> Subscription for DetachState<O> {
  fn unsubscribe(&self) {
    self.upstream.unsubscribe();
    drop(self.downstream.take());
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct DetachObserver<O> {
  state: Arc<DetachState<O>>,
}

impl<O> DetachObserver<O> {
  fn detach(&self) -> Option<O> {
    let observer = self.state.downstream.take()?;
    self.state.upstream.detach();
    Some(observer)
  }
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for DetachObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    if let Some(observer) = self.detach() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.detach() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.detach() {
      observer.on_error(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  };

  use crate::{prelude::*, test_util::TestObserver};

  #[rxsingle_macro::test]
  fn dispose_releases_the_downstream() {
    let stash = Arc::new(Mutex::new(Vec::new()));
    let c_stash = stash.clone();
    let token = Arc::new(());
    let c_token = token.clone();
    let subscription =
      maybe::create::<i32, (), _>(move |emitter| c_stash.lock().unwrap().push(emitter))
        .on_terminate_detach()
        .subscribe(move |_| drop(c_token), || {}, |_| {});

    assert_eq!(Arc::strong_count(&token), 2);
    subscription.unsubscribe();
    assert_eq!(Arc::strong_count(&token), 1);
    assert_eq!(stash.lock().unwrap().len(), 1);
  }

  #[rxsingle_macro::test]
  fn dispose_after_the_terminal_signal_is_a_no_op() {
    let cancelled = Arc::new(AtomicUsize::new(0));
    let c_cancelled = cancelled.clone();
    let spy = TestObserver::<i32, &str>::new();
    single::create(move |emitter| {
      let c_cancelled = c_cancelled.clone();
      emitter.set_subscription(FnSubscription::new(move || {
        c_cancelled.fetch_add(1, Ordering::SeqCst);
      }));
      emitter.on_success(1);
    })
    .on_terminate_detach()
    .subscribe_with(spy.clone());

    assert_eq!(spy.values(), vec![1]);
    spy.dispose();
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
  }
}

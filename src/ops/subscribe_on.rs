//! `subscribe_on` and `delay_subscription`.
//!
//! Both move the upstream subscribe call into a scheduler task; the latter
//! also waits before running it. Disposing before the task runs cancels it,
//! so the upstream is never touched.

use std::sync::Arc;

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::MaybeObserver,
  scheduler::{Duration, Scheduler},
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct SubscribeOn<S, Sch> {
  source: Arc<S>,
  scheduler: Sch,
  delay: Option<Duration>,
}

impl<S, Sch> SubscribeOn<S, Sch> {
  pub(crate) fn new(source: S, scheduler: Sch, delay: Option<Duration>) -> Self {
    Self { source: Arc::new(source), scheduler, delay }
  }
}

impl<S, Sch> MaybeSource for SubscribeOn<S, Sch>
where
  S: MaybeSource,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state = Arc::new(SubscribeOnState {
      downstream: OnceSlot::empty(),
      upstream: SubscriptionCell::new(),
      task: SubscriptionCell::new(),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }

    let source = self.source.clone();
    let c_state = state.clone();
    let handle = self.scheduler.schedule(
      Box::new(move || {
        if !c_state.downstream.is_closed() {
          source.actual_subscribe(SubscribeOnObserver { state: c_state });
        }
      }),
      self.delay,
    );
    state.task.try_set(Arc::new(handle));
  }
}

struct SubscribeOnState<O> {
  downstream: OnceSlot<O>,
  upstream: SubscriptionCell,
  task: SubscriptionCell,
}

impl<O: Send> Subscription for SubscribeOnState<O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.task.unsubscribe();
    self.upstream.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct SubscribeOnObserver<O> {
  state: Arc<SubscribeOnState<O>>,
}

impl<Item, Err, O: MaybeObserver<Item, Err>> MaybeObserver<Item, Err> for SubscribeOnObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_error(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      mpsc::channel,
    },
    thread,
  };

  use super::*;
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn subscribe_happens_on_the_scheduler() {
    let (tx, rx) = channel();
    let caller = thread::current().id();
    single::defer(move || {
      tx.send(thread::current().id()).unwrap();
      single::just::<_, ()>(1)
    })
    .subscribe_on(NewThreadScheduler)
    .subscribe(|_| {}, |_| {});
    assert_ne!(rx.recv().unwrap(), caller);
  }

  #[rxsingle_macro::test]
  fn delayed_subscription_can_be_cancelled() {
    TestScheduler::init();
    let subscribed = Arc::new(AtomicUsize::new(0));
    let c_subscribed = subscribed.clone();
    let spy = TestObserver::<i32, &str>::new();
    maybe::defer(move || {
      c_subscribed.fetch_add(1, Ordering::SeqCst);
      maybe::just::<_, &str>(1)
    })
    .delay_subscription(Duration::from_millis(10), TestScheduler)
    .subscribe_with(spy.clone());

    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
    spy.dispose();
    TestScheduler::flush();
    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
    assert!(spy.is_empty());
  }

  #[rxsingle_macro::test]
  fn delayed_subscription_runs_after_the_delay() {
    TestScheduler::init();
    let spy = TestObserver::<(), &str>::new();
    completable::complete::<&str>()
      .delay_subscription(Duration::from_millis(10), TestScheduler)
      .subscribe_with(spy.clone());
    TestScheduler::advance_by(Duration::from_millis(9));
    assert!(spy.is_empty());
    TestScheduler::advance_by(Duration::from_millis(1));
    assert_eq!(spy.events(), vec![Event::Complete]);
  }
}

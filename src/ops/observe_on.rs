//! Moves terminal delivery onto a scheduler.
//!
//! The upstream signal is parked in a take-once slot and a delivery task is
//! installed in the task cell. The task and dispose both go through the
//! downstream slot, so delivery happens at most once and never after
//! dispose.

use std::sync::Arc;

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  notification::Notification,
  observer::MaybeObserver,
  scheduler::Scheduler,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct ObserveOn<S, Sch> {
  source: S,
  scheduler: Sch,
}

impl<S, Sch> ObserveOn<S, Sch> {
  pub(crate) fn new(source: S, scheduler: Sch) -> Self { Self { source, scheduler } }
}

impl<S, Sch> MaybeSource for ObserveOn<S, Sch>
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
    let state = Arc::new(ObserveOnState {
      downstream: OnceSlot::empty(),
      value: OnceSlot::empty(),
      upstream: SubscriptionCell::new(),
      task: SubscriptionCell::new(),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    self
      .source
      .actual_subscribe(ObserveOnObserver { state, scheduler: self.scheduler.clone() });
  }
}

struct ObserveOnState<O, Item, Err> {
  downstream: OnceSlot<O>,
  value: OnceSlot<Notification<Item, Err>>,
  upstream: SubscriptionCell,
  task: SubscriptionCell,
}

impl<O, Item, Err> ObserveOnState<O, Item, Err>
where
  O: MaybeObserver<Item, Err>,
{
  fn drain(&self) {
    if let Some(observer) = self.downstream.take() {
      if let Some(notification) = self.value.take() {
        notification.deliver(observer);
      }
    }
  }
}

impl<O: Send, Item: Send, Err: Send> Subscription for ObserveOnState<O, Item, Err> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    drop(self.value.take());
    self.upstream.unsubscribe();
    self.task.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct ObserveOnObserver<O, Item, Err, Sch> {
  state: Arc<ObserveOnState<O, Item, Err>>,
  scheduler: Sch,
}

impl<O, Item, Err, Sch> ObserveOnObserver<O, Item, Err, Sch>
where
  O: MaybeObserver<Item, Err>,
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
{
  fn capture(self, notification: Notification<Item, Err>) {
    if self.state.value.put(notification).is_err() {
      return;
    }
    let state = self.state.clone();
    let handle = self.scheduler.schedule(Box::new(move || state.drain()), None);
    self.state.task.try_set(Arc::new(handle));
  }
}

impl<O, Item, Err, Sch> MaybeObserver<Item, Err> for ObserveOnObserver<O, Item, Err, Sch>
where
  O: MaybeObserver<Item, Err>,
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.try_set(subscription);
  }

  fn on_success(self, value: Item) { self.capture(Notification::Success(value)) }

  fn on_complete(self) { self.capture(Notification::Complete) }

  fn on_error(self, err: Err) { self.capture(Notification::Error(err)) }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{mpsc::channel, Mutex},
    thread,
  };

  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn delivery_waits_for_the_scheduler() {
    TestScheduler::init();
    let spy = TestObserver::<i32, &str>::new();
    single::just::<_, &str>(5).observe_on(TestScheduler).subscribe_with(spy.clone());
    assert!(spy.is_empty());
    TestScheduler::flush();
    assert_eq!(spy.events(), vec![Event::Success(5)]);
  }

  #[rxsingle_macro::test]
  fn dispose_before_the_task_runs() {
    TestScheduler::init();
    let spy = TestObserver::<i32, &str>::new();
    maybe::just::<_, &str>(5).observe_on(TestScheduler).subscribe_with(spy.clone());
    spy.dispose();
    TestScheduler::flush();
    assert!(spy.is_empty());
  }

  #[rxsingle_macro::test]
  fn delivers_on_the_scheduler_thread() {
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    let caller = thread::current().id();
    completable::complete::<()>()
      .observe_on(NewThreadScheduler)
      .subscribe(move || tx.lock().unwrap().send(thread::current().id()).unwrap(), |_| {});
    assert_ne!(rx.recv().unwrap(), caller);
  }
}
